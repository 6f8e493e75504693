use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use axum::http::HeaderMap;

use super::{ClientAddress, HeaderCandidate, IpLocality, ResolutionSource};
use crate::config::Deployment;

/// 无法解析客户端地址时使用的共享键
pub const FALLBACK_ADDRESS: &str = "unknown";

/// 按优先级排列的转发头，前面的优先
pub const FORWARDING_HEADERS: [&str; 7] = [
    "cf-connecting-ip",
    "true-client-ip",
    "x-real-ip",
    "x-forwarded-for",
    "x-client-ip",
    "x-cluster-client-ip",
    "forwarded",
];

/// 严格校验 IPv4 点分十进制或 IPv6 字面量
pub fn is_valid_ip(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
}

fn literal_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
}

/// 解析 `Forwarded` 头的 `for=` 节点，允许引号、方括号和端口
pub fn parse_forwarded_node(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');
    if value.is_empty() {
        return None;
    }

    let ip = if let Some(rest) = value.strip_prefix('[') {
        // [2001:db8::1]:8080
        let end = rest.find(']')?;
        rest[..end].parse::<Ipv6Addr>().ok().map(IpAddr::V6)?
    } else if let Ok(ip) = value.parse::<IpAddr>() {
        ip
    } else {
        // 1.2.3.4:8080
        value.parse::<SocketAddr>().ok()?.ip()
    };

    Some(ip.to_canonical())
}

fn forwarded_for(value: &str) -> Option<IpAddr> {
    value
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            key.trim().eq_ignore_ascii_case("for").then_some(val)
        })
        .find_map(parse_forwarded_node)
}

fn header_ip(header: &str, value: &str) -> Option<IpAddr> {
    match header {
        "x-forwarded-for" => value.split(',').find_map(literal_ip),
        "forwarded" => forwarded_for(value),
        _ => literal_ip(value),
    }
}

/// 判断地址属于回环、内网还是公网
pub fn classify(ip: IpAddr) -> IpLocality {
    match ip.to_canonical() {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                IpLocality::Loopback
            } else if v4.is_private() || v4.is_link_local() || v4.is_unspecified() {
                IpLocality::Private
            } else {
                IpLocality::Public
            }
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            let unique_local = first & 0xfe00 == 0xfc00;
            let link_local = first & 0xffc0 == 0xfe80;
            if v6.is_loopback() {
                IpLocality::Loopback
            } else if unique_local || link_local || v6.is_unspecified() {
                IpLocality::Private
            } else {
                IpLocality::Public
            }
        }
    }
}

/// 从请求头和连接信息中解析客户端地址
///
/// 依次检查 [`FORWARDING_HEADERS`]，第一个合法字面量胜出；都没有时使用
/// 连接的对端地址，再没有则返回 `unknown` 哨兵地址。
pub fn resolve(headers: &HeaderMap, peer: Option<SocketAddr>) -> ClientAddress {
    let candidates: Vec<HeaderCandidate> = FORWARDING_HEADERS
        .iter()
        .filter_map(|&header| {
            headers
                .get(header)
                .and_then(|v| v.to_str().ok())
                .map(|value| HeaderCandidate {
                    header,
                    value: value.to_string(),
                })
        })
        .collect();

    let chosen = candidates
        .iter()
        .find_map(|c| header_ip(c.header, &c.value).map(|ip| (ip, ResolutionSource::Header(c.header))))
        .or_else(|| peer.map(|p| (p.ip().to_canonical(), ResolutionSource::Peer)));

    let address = match chosen {
        Some((ip, source)) => ClientAddress {
            raw: ip.to_string(),
            ip: Some(ip),
            locality: classify(ip),
            source,
            candidates,
        },
        None => ClientAddress::unknown(candidates),
    };

    tracing::debug!(
        ip = %address.raw,
        source = ?address.source,
        locality = ?address.locality,
        candidates = address.candidates.len(),
        "Resolved client address"
    );

    address
}

/// 生产环境下不把内网或未解析的地址写入日志和存储键
pub fn production_safe(address: &ClientAddress, deployment: Deployment) -> String {
    match deployment {
        Deployment::Local => address.raw.clone(),
        Deployment::Production if address.is_public() => address.raw.clone(),
        Deployment::Production => FALLBACK_ADDRESS.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn accepts_ip_literals() {
        for ip in ["1.2.3.4", "255.255.255.255", "0.0.0.0", "::1", "2001:db8::1", "fe80::1"] {
            assert!(is_valid_ip(ip), "{ip} should be valid");
        }
    }

    #[test]
    fn rejects_non_literals() {
        for value in ["999.1.1.1", "abc", "", "1.2.3", "1.2.3.4.5", "2001:::1", " 1.2.3.4"] {
            assert!(!is_valid_ip(value), "{value:?} should be rejected");
        }
    }

    #[test]
    fn forwarded_node_strips_ports_and_brackets() {
        assert_eq!(
            parse_forwarded_node("203.0.113.9:4711"),
            Some("203.0.113.9".parse().unwrap())
        );
        assert_eq!(
            parse_forwarded_node("\"[2001:db8::7]:80\""),
            Some("2001:db8::7".parse().unwrap())
        );
        assert_eq!(
            parse_forwarded_node("::ffff:198.51.100.4"),
            Some("198.51.100.4".parse().unwrap())
        );
        assert_eq!(parse_forwarded_node("_hidden"), None);
    }

    #[test]
    fn port_suffixed_header_falls_through() {
        let map = headers(&[
            ("x-real-ip", "203.0.113.5:8080"),
            ("x-forwarded-for", "198.51.100.9"),
        ]);
        let address = resolve(&map, None);
        assert_eq!(address.raw, "198.51.100.9");
        assert_eq!(address.source, ResolutionSource::Header("x-forwarded-for"));

        let map = headers(&[("true-client-ip", "\"8.8.8.8\""), ("x-client-ip", "[2001:db8::1]")]);
        let address = resolve(&map, None);
        assert_eq!(address.source, ResolutionSource::Fallback);
    }

    #[test]
    fn classifies_ranges() {
        assert_eq!(classify("127.0.0.1".parse().unwrap()), IpLocality::Loopback);
        assert_eq!(classify("::1".parse().unwrap()), IpLocality::Loopback);
        assert_eq!(classify("10.1.2.3".parse().unwrap()), IpLocality::Private);
        assert_eq!(classify("172.16.0.1".parse().unwrap()), IpLocality::Private);
        assert_eq!(classify("192.168.1.1".parse().unwrap()), IpLocality::Private);
        assert_eq!(classify("fd00::1".parse().unwrap()), IpLocality::Private);
        assert_eq!(classify("fe80::1".parse().unwrap()), IpLocality::Private);
        assert_eq!(classify("8.8.8.8".parse().unwrap()), IpLocality::Public);
        assert_eq!(classify("2606:4700::1111".parse().unwrap()), IpLocality::Public);
    }

    #[test]
    fn first_valid_header_wins() {
        let map = headers(&[
            ("x-real-ip", "not-an-ip"),
            ("x-forwarded-for", "garbage, 198.51.100.7, 10.0.0.1"),
            ("x-client-ip", "203.0.113.1"),
        ]);
        let address = resolve(&map, None);
        assert_eq!(address.raw, "198.51.100.7");
        assert_eq!(address.source, ResolutionSource::Header("x-forwarded-for"));
        assert_eq!(address.locality, IpLocality::Public);
        assert_eq!(address.candidates.len(), 3);
        assert_eq!(address.candidates[0].header, "x-real-ip");
    }

    #[test]
    fn cloudflare_header_takes_priority() {
        let map = headers(&[
            ("x-forwarded-for", "198.51.100.7"),
            ("cf-connecting-ip", "2001:db8::42"),
        ]);
        let address = resolve(&map, None);
        assert_eq!(address.raw, "2001:db8::42");
        assert!(address.is_ipv6());
    }

    #[test]
    fn forwarded_header_is_parsed() {
        let map = headers(&[("forwarded", "for=\"[2001:db8:cafe::17]:4711\";proto=https")]);
        let address = resolve(&map, None);
        assert_eq!(address.raw, "2001:db8:cafe::17");
        assert_eq!(address.source, ResolutionSource::Header("forwarded"));
    }

    #[test]
    fn falls_back_to_peer_then_sentinel() {
        let map = headers(&[("x-real-ip", "nope")]);
        let peer: SocketAddr = "192.168.0.10:5555".parse().unwrap();

        let address = resolve(&map, Some(peer));
        assert_eq!(address.raw, "192.168.0.10");
        assert_eq!(address.source, ResolutionSource::Peer);
        assert_eq!(address.locality, IpLocality::Private);

        let address = resolve(&map, None);
        assert_eq!(address.raw, FALLBACK_ADDRESS);
        assert_eq!(address.source, ResolutionSource::Fallback);
        assert_eq!(address.locality, IpLocality::Unknown);
        assert!(address.ip.is_none());
        assert_eq!(address.candidates.len(), 1);
    }

    #[test]
    fn production_safe_collapses_non_public() {
        let private = resolve(&headers(&[("x-real-ip", "10.0.0.5")]), None);
        let public = resolve(&headers(&[("x-real-ip", "8.8.4.4")]), None);
        let unknown = resolve(&HeaderMap::new(), None);

        assert_eq!(production_safe(&private, Deployment::Local), "10.0.0.5");
        assert_eq!(production_safe(&unknown, Deployment::Local), FALLBACK_ADDRESS);
        assert_eq!(production_safe(&private, Deployment::Production), FALLBACK_ADDRESS);
        assert_eq!(production_safe(&unknown, Deployment::Production), FALLBACK_ADDRESS);
        assert_eq!(production_safe(&public, Deployment::Production), "8.8.4.4");
    }
}
