//! UI shell
//!
//! One server-rendered page; everything else happens over the JSON API
//! and the `/events` stream.

use axum::{Router, extract::State, response::Html, routing::get};

use crate::core::ServerState;

const INDEX_TEMPLATE: &str = include_str!("index.html");

pub fn router() -> Router<ServerState> {
    Router::new().route("/", get(index))
}

async fn index(State(state): State<ServerState>) -> Html<String> {
    let config = state.config();
    let bootstrap = serde_json::json!({
        "ui": config.ui,
        "default_mode": config.printing.default_mode,
    });
    let page = INDEX_TEMPLATE.replace(
        "__PP_BOOTSTRAP__",
        &bootstrap.to_string().replace("</", "<\\/"),
    );
    Html(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_has_bootstrap_placeholder() {
        assert!(INDEX_TEMPLATE.contains("__PP_BOOTSTRAP__"));
    }
}
