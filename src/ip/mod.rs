// 客户端地址解析
// 从代理转发头和连接信息中选出唯一的客户端地址，用作限流的键

mod resolver;

use std::net::IpAddr;

use serde::Serialize;

pub use resolver::{
    FALLBACK_ADDRESS, FORWARDING_HEADERS, classify, is_valid_ip, parse_forwarded_node, production_safe,
    resolve,
};

/// 地址所属网络范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IpLocality {
    Loopback,
    Private,
    Public,
    /// 没有解析出任何有效地址
    Unknown,
}

/// 最终地址的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    Header(&'static str),
    Peer,
    Fallback,
}

/// 请求中出现过的转发头，仅用于诊断
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderCandidate {
    pub header: &'static str,
    pub value: String,
}

/// 解析后的客户端地址
#[derive(Debug, Clone, Serialize)]
pub struct ClientAddress {
    pub raw: String,
    pub ip: Option<IpAddr>,
    pub locality: IpLocality,
    pub source: ResolutionSource,
    pub candidates: Vec<HeaderCandidate>,
}

impl ClientAddress {
    pub fn unknown(candidates: Vec<HeaderCandidate>) -> Self {
        Self {
            raw: FALLBACK_ADDRESS.to_string(),
            ip: None,
            locality: IpLocality::Unknown,
            source: ResolutionSource::Fallback,
            candidates,
        }
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self.ip, Some(IpAddr::V6(_)))
    }

    pub fn is_public(&self) -> bool {
        self.locality == IpLocality::Public
    }
}
