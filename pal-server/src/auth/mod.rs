//! Shared-token authentication
//!
//! Optional shared secret for the mutating endpoints. The token arrives
//! either in the `X-PrinterPal-Token` header or a `token` query
//! parameter and is compared against `security.token`. When a token is
//! required but none is configured, the endpoint reports unavailable
//! instead of silently permitting access.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::core::error::AppError;
use crate::core::state::ServerState;

pub const TOKEN_HEADER: &str = "x-printerpal-token";

fn query_token(query: Option<&str>) -> Option<String> {
    let query = query?;
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix("token=") {
            // The raw query is still percent-encoded here
            let decoded = urlencoding::decode(value)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| value.to_string());
            return Some(decoded);
        }
    }
    None
}

/// Decide whether a request with the given credentials may pass.
pub fn check_token(
    require_token: bool,
    expected: &str,
    header: Option<&str>,
    query: Option<&str>,
) -> Result<(), AppError> {
    if !require_token {
        return Ok(());
    }
    let expected = expected.trim();
    if expected.is_empty() {
        return Err(AppError::AuthUnavailable);
    }
    let provided = header
        .map(|h| h.to_string())
        .or_else(|| query_token(query));
    match provided {
        Some(token) if token == expected => Ok(()),
        _ => Err(AppError::Unauthorized),
    }
}

/// Axum middleware for the protected sub-router.
pub async fn require_token(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let config = state.config();
    let header = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    check_token(
        config.security.require_token,
        &config.security.token,
        header,
        request.uri().query(),
    )?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_required_passes() {
        assert!(check_token(false, "", None, None).is_ok());
        assert!(check_token(false, "secret", Some("wrong"), None).is_ok());
    }

    #[test]
    fn test_required_but_unconfigured_unavailable() {
        let err = check_token(true, "  ", Some("anything"), None).unwrap_err();
        assert!(matches!(err, AppError::AuthUnavailable));
    }

    #[test]
    fn test_header_token() {
        assert!(check_token(true, "s3cret", Some("s3cret"), None).is_ok());
        assert!(matches!(
            check_token(true, "s3cret", Some("nope"), None).unwrap_err(),
            AppError::Unauthorized
        ));
    }

    #[test]
    fn test_query_token_percent_decoded() {
        // Tokens with URL-reserved characters arrive percent-encoded
        assert!(check_token(true, "p@ss/word", None, Some("token=p%40ss%2Fword")).is_ok());
        assert!(check_token(true, "a b", None, Some("token=a%20b")).is_ok());
    }

    #[test]
    fn test_query_token() {
        assert!(check_token(true, "s3cret", None, Some("a=1&token=s3cret")).is_ok());
        assert!(matches!(
            check_token(true, "s3cret", None, Some("token=nope")).unwrap_err(),
            AppError::Unauthorized
        ));
        assert!(matches!(
            check_token(true, "s3cret", None, None).unwrap_err(),
            AppError::Unauthorized
        ));
    }
}
