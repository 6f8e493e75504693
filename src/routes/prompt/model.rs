use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct OptimizeRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeResponse {
    pub optimized_prompt: String,
    pub from_cache: bool,
    // 命中缓存时不扣额度，不返回剩余次数
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_count: Option<u32>,
}
