//! API 路由模块
//!
//! # 结构
//!
//! - [`ui`] - 页面外壳
//! - [`health`] - 健康检查
//! - [`files`] - 上传、下载和文件列表
//! - [`status`] - 打印系统状态快照与事件流
//! - [`config`] - 配置读写
//! - [`print`] - 预览与打印提交
//! - [`system`] - AirPrint 重发布与主机重启

use axum::Router;
use axum::extract::DefaultBodyLimit;
use http::{HeaderName, HeaderValue};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

pub mod config;
pub mod files;
pub mod health;
pub mod print;
pub mod status;
pub mod system;
pub mod ui;

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        Some(RequestId::new(HeaderValue::from_str(&id).unwrap()))
    }
}

/// Hard cap on request bodies; the effective per-upload limit comes from
/// `app.max_upload_mb` and is enforced in the upload handler.
const MAX_BODY_BYTES: usize = 500 * 1024 * 1024;

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router(state: &ServerState) -> Router<ServerState> {
    Router::new()
        // UI shell - public
        .merge(ui::router())
        // Health - public
        .merge(health::router())
        // Uploads - public
        .merge(files::router())
        // Status snapshot + event stream - public
        .merge(status::router())
        // Config read (public) / write (token)
        .merge(config::router())
        // Preview (public) / print submission (token)
        .merge(print::router(state))
        // AirPrint + host restart - token required
        .merge(system::router(state))
}

/// Build a fully configured application with all middleware
pub fn build_app(state: &ServerState) -> Router<ServerState> {
    build_router(state)
        // ========== Tower HTTP Middleware ==========
        // CORS - Handle cross-origin requests
        .layer(CorsLayer::permissive())
        // Compression - Gzip compress responses
        .layer(CompressionLayer::new())
        // Trace - Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        // Request ID - Generate unique ID for each request
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
        // Propagate request ID to response
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
