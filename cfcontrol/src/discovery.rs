//! Chromecast device discovery via mDNS.
//!
//! Chromecast devices advertise themselves using mDNS (Multicast DNS) on
//! the `_googlecast._tcp.local` service. The friendly name lives in the
//! `fn` TXT record, which is how a device configured as "Living Room" is
//! matched to the name the user asked for.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use futures_util::{StreamExt, pin_mut};
use tracing::{debug, warn};

use crate::error::ControlError;

const SERVICE_NAME: &str = "_googlecast._tcp.local";

/// How often the mDNS query is re-sent while listening.
const QUERY_INTERVAL: Duration = Duration::from_secs(2);

/// Information about a discovered Chromecast device from mDNS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CastHost {
    pub friendly_name: String,
    pub host: String,
    pub port: u16,
    pub uuid: String,
    pub model: Option<String>,
}

/// Finds the cast device named `friendly_name` on the local network.
///
/// Listens for mDNS announcements until a device whose `fn` TXT record
/// matches, or until `timeout` elapses, in which case the result is
/// [`ControlError::DeviceNotFound`].
pub async fn discover_cast_host(
    friendly_name: &str,
    timeout: Duration,
) -> Result<CastHost, ControlError> {
    debug!("Looking for cast device '{}'", friendly_name);

    let stream = mdns::discover::all(SERVICE_NAME, QUERY_INTERVAL)
        .map_err(|e| ControlError::Discovery(e.to_string()))?
        .listen();
    pin_mut!(stream);

    let search = async {
        while let Some(response) = stream.next().await {
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!("Ignoring bad mDNS response: {}", e);
                    continue;
                }
            };

            if let Some(host) = parse_cast_response(&response) {
                if host.friendly_name == friendly_name {
                    debug!("Found '{}' at {}:{}", host.friendly_name, host.host, host.port);
                    return Some(host);
                }
                debug!("Ignoring cast device '{}'", host.friendly_name);
            }
        }
        None
    };

    match tokio::time::timeout(timeout, search).await {
        Ok(Some(host)) => Ok(host),
        _ => Err(ControlError::DeviceNotFound(friendly_name.to_string())),
    }
}

/// Extracts a [`CastHost`] from an mDNS service discovery response.
pub fn parse_cast_response(response: &mdns::Response) -> Option<CastHost> {
    let service_name = response
        .records()
        .filter_map(|r| {
            if let mdns::RecordKind::PTR(ref name) = r.kind {
                Some(name.clone())
            } else {
                None
            }
        })
        .next()?;

    // Extract IP addresses, preferring IPv4
    let addresses: Vec<IpAddr> = response
        .records()
        .filter_map(|r| match r.kind {
            mdns::RecordKind::A(addr) => Some(IpAddr::V4(addr)),
            mdns::RecordKind::AAAA(addr) => Some(IpAddr::V6(addr)),
            _ => None,
        })
        .collect();

    if addresses.is_empty() {
        warn!("No IP address found for cast device: {}", service_name);
        return None;
    }

    let host = addresses
        .iter()
        .find(|addr| matches!(addr, IpAddr::V4(_)))
        .or_else(|| addresses.first())
        .map(|addr| addr.to_string())?;

    // Extract port from SRV record
    let port = response
        .records()
        .filter_map(|r| {
            if let mdns::RecordKind::SRV { port, .. } = r.kind {
                Some(port)
            } else {
                None
            }
        })
        .next()
        .unwrap_or(crate::chromecast::DEFAULT_CHROMECAST_PORT);

    let txt_records = parse_txt_records(response.records().filter_map(|r| {
        if let mdns::RecordKind::TXT(ref data) = r.kind {
            Some(data.clone())
        } else {
            None
        }
    }));

    let model = txt_records.get("md").cloned();
    let uuid = txt_records
        .get("id")
        .cloned()
        .unwrap_or_else(|| format!("chromecast-{}-{}", host, port));

    let friendly_name = txt_records
        .get("fn")
        .cloned()
        .unwrap_or_else(|| friendly_name_from_service(&service_name));

    debug!(
        "Discovered cast device: {} at {}:{} (UUID: {}, Model: {:?})",
        friendly_name, host, port, uuid, model
    );

    Some(CastHost {
        friendly_name,
        host,
        port,
        uuid,
        model,
    })
}

/// Splits "key=value" TXT record entries into a map.
fn parse_txt_records(txt: impl Iterator<Item = Vec<String>>) -> HashMap<String, String> {
    txt.flatten()
        .filter_map(|s| {
            let parts: Vec<&str> = s.splitn(2, '=').collect();
            if parts.len() == 2 {
                Some((parts[0].to_string(), parts[1].to_string()))
            } else {
                None
            }
        })
        .collect()
}

/// Fallback friendly name extracted from the service instance name,
/// removing the 32-char hex UUID suffix if present.
fn friendly_name_from_service(service_name: &str) -> String {
    service_name
        .split("._googlecast._tcp.local")
        .next()
        .unwrap_or("Unknown Chromecast")
        .split('-')
        .take_while(|part| part.len() != 32)
        .collect::<Vec<_>>()
        .join("-")
        .trim()
        .to_string()
}
