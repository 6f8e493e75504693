use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::ip;

/// 解析客户端地址并放入请求扩展，供后续处理函数使用
pub async fn resolve_client(mut req: Request<Body>, next: Next) -> Response {
    // 从连接信息获取原始IP，测试环境下可能不存在
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);

    let address = ip::resolve(req.headers(), peer);
    req.extensions_mut().insert(address);

    next.run(req).await
}
