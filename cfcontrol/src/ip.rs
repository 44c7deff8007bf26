use std::net::UdpSocket;

use get_if_addrs::get_if_addrs;

/// Devine l'adresse IP locale de la machine.
///
/// Crée un socket UDP vers un serveur DNS public (8.8.8.8) pour identifier
/// l'interface réseau qui serait utilisée pour communiquer avec Internet.
/// Aucune véritable connexion n'est établie (UDP est sans connexion).
///
/// Falls back to the first non-loopback interface address, then to
/// `127.0.0.1`. Cast devices fetch the stream from this address, so a
/// loopback fallback means the device cannot reach us.
pub fn guess_local_ip() -> String {
    if let Ok(socket) = UdpSocket::bind("0.0.0.0:0") {
        if socket.connect("8.8.8.8:80").is_ok() {
            if let Ok(local_addr) = socket.local_addr() {
                return local_addr.ip().to_string();
            }
        }
    }

    first_interface_ip().unwrap_or_else(|| "127.0.0.1".to_string())
}

/// First non-loopback IPv4 address among the network interfaces.
fn first_interface_ip() -> Option<String> {
    let interfaces = get_if_addrs().ok()?;
    interfaces
        .iter()
        .map(|iface| iface.ip())
        .find(|ip| !ip.is_loopback() && ip.is_ipv4())
        .map(|ip| ip.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    #[test]
    fn guess_local_ip_returns_valid_ipv4() {
        let ip = guess_local_ip();
        let parsed = ip.parse::<IpAddr>().expect("should return a valid IP");
        assert!(parsed.is_ipv4());
    }

    #[test]
    fn guess_local_ip_not_empty() {
        assert!(!guess_local_ip().is_empty());
    }
}
