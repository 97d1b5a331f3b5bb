//! Trust-proxy chain resolution: derive the true client IP from
//! `X-Forwarded-For` only when the immediate peer is a trusted proxy (§4.8).

use std::net::IpAddr;

use ipnet::IpNet;

fn is_trusted(ip: IpAddr, trusted_proxies: &[String]) -> bool {
    trusted_proxies.iter().any(|entry| {
        if let Ok(net) = entry.parse::<IpNet>() {
            net.contains(&ip)
        } else {
            entry.parse::<IpAddr>().map(|trusted| trusted == ip).unwrap_or(false)
        }
    })
}

/// Given the socket peer address and an optional inbound `X-Forwarded-For`
/// header, return the client IP the gateway should treat as authoritative.
///
/// Walks the chain right-to-left (closest hop first, per the conventional
/// append order), skipping entries while the current hop is a trusted
/// proxy, and returns the first untrusted hop. If the immediate peer isn't
/// trusted, the header is ignored entirely and the peer address wins.
pub fn client_ip_from_chain(peer: IpAddr, forwarded_for: Option<&str>, trusted_proxies: &[String]) -> IpAddr {
    if !is_trusted(peer, trusted_proxies) {
        return peer;
    }

    let Some(chain) = forwarded_for else { return peer };
    let hops: Vec<IpAddr> = chain.split(',').filter_map(|s| s.trim().parse().ok()).collect();

    let mut last_trusted = peer;
    for hop in hops.into_iter().rev() {
        if is_trusted(hop, trusted_proxies) {
            last_trusted = hop;
            continue;
        }
        return hop;
    }
    last_trusted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untrusted_peer_ignores_header() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        let ip = client_ip_from_chain(peer, Some("1.2.3.4"), &["10.0.0.0/8".into()]);
        assert_eq!(ip, peer);
    }

    #[test]
    fn trusted_peer_uses_first_untrusted_hop() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let ip = client_ip_from_chain(peer, Some("203.0.113.9, 10.0.0.2"), &["10.0.0.0/8".into()]);
        assert_eq!(ip, "203.0.113.9".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn no_header_falls_back_to_peer() {
        let peer: IpAddr = "10.0.0.1".parse().unwrap();
        let ip = client_ip_from_chain(peer, None, &["10.0.0.0/8".into()]);
        assert_eq!(ip, peer);
    }
}
