//! Collaborator seams of the session layer.
//!
//! Device discovery, upstream fetching and frame parsing are behind small
//! traits so sessions can be exercised without a network or a cast device.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cfbuffer::SharedBuffer;
use cfcontrol::{ChromecastTarget, MediaTarget, discover_cast_host};
use cfmp3::{FrameParser, Mp3FrameScanner};

/// Resolves a cast device name to a connected [`MediaTarget`].
#[async_trait]
pub trait TargetConnector: Send + Sync {
    async fn connect(&self, device_name: &str) -> Result<Arc<dyn MediaTarget>>;
}

/// Production connector: mDNS discovery plus a Chromecast backend.
pub struct CastConnector {
    pub discovery_timeout: Duration,
}

impl Default for CastConnector {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl TargetConnector for CastConnector {
    async fn connect(&self, device_name: &str) -> Result<Arc<dyn MediaTarget>> {
        let host = discover_cast_host(device_name, self.discovery_timeout).await?;
        Ok(Arc::new(ChromecastTarget::from_cast_host(&host)))
    }
}

/// Starts the capture of an upstream stream into a [`SharedBuffer`].
pub trait StreamFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> SharedBuffer;
}

/// Production fetcher backed by a shared reqwest client.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl StreamFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> SharedBuffer {
        cfbuffer::stream_url_with_client(self.client.clone(), url)
    }
}

/// Builds a fresh frame parser for each offset resolution.
pub trait ParserFactory: Send + Sync {
    fn new_parser(&self) -> Box<dyn FrameParser + Send>;
}

/// Production factory: MPEG audio frame scanning.
#[derive(Clone, Copy, Default)]
pub struct Mp3Parsers;

impl ParserFactory for Mp3Parsers {
    fn new_parser(&self) -> Box<dyn FrameParser + Send> {
        Box::new(Mp3FrameScanner::new())
    }
}
