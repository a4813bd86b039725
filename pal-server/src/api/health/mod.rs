//! Health routes
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /healthz | GET | 存活与打印系统可达性 | 无 |

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::core::ServerState;

/// 健康检查路由 - 公共路由 (无需认证)
pub fn router() -> Router<ServerState> {
    Router::new().route("/healthz", get(healthz))
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    /// Whether the CUPS scheduler responds at all
    cups: bool,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        cups: pal_printer::cups_available().await,
    })
}
