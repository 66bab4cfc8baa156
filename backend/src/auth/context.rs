//! Explicit per-request session context.

use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::AppState;

/// Session material captured from one request.
///
/// Resolvers receive this explicitly instead of reading cookies from
/// ambient state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    access_token: Option<String>,
    tenant_session: Option<String>,
}

impl RequestContext {
    /// A context with no session at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            access_token: Some(token.into()),
            tenant_session: None,
        }
    }

    /// Capture session material from request headers.
    ///
    /// A `Bearer` authorization header wins over the access-token cookie.
    pub fn from_headers(headers: &HeaderMap, access_cookie: &str, tenant_cookie: &str) -> Self {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);

        Self {
            access_token: bearer.or_else(|| cookie_value(headers, access_cookie)),
            tenant_session: cookie_value(headers, tenant_cookie),
        }
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn tenant_session(&self) -> Option<&str> {
        self.tenant_session.as_deref()
    }
}

/// First non-empty value of cookie `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        Ok(RequestContext::from_headers(
            &parts.headers,
            &state.config.provider.access_token_cookie,
            &state.config.tenant.cookie_name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.append(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_bearer_header_is_used() {
        let ctx = RequestContext::from_headers(
            &headers(&[("authorization", "Bearer abc")]),
            "sb-access-token",
            "tenant_session",
        );
        assert_eq!(ctx.access_token(), Some("abc"));
        assert_eq!(ctx.tenant_session(), None);
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let ctx = RequestContext::from_headers(
            &headers(&[
                ("authorization", "Bearer from-header"),
                ("cookie", "sb-access-token=from-cookie"),
            ]),
            "sb-access-token",
            "tenant_session",
        );
        assert_eq!(ctx.access_token(), Some("from-header"));
    }

    #[test]
    fn test_cookie_fallback() {
        let ctx = RequestContext::from_headers(
            &headers(&[("cookie", "theme=dark; sb-access-token=tok; tenant_session=sess")]),
            "sb-access-token",
            "tenant_session",
        );
        assert_eq!(ctx.access_token(), Some("tok"));
        assert_eq!(ctx.tenant_session(), Some("sess"));
    }

    #[test]
    fn test_basic_auth_is_ignored() {
        let ctx = RequestContext::from_headers(
            &headers(&[("authorization", "Basic dXNlcjpwYXNz")]),
            "sb-access-token",
            "tenant_session",
        );
        assert_eq!(ctx, RequestContext::anonymous());
    }

    #[test]
    fn test_empty_bearer_is_ignored() {
        let ctx = RequestContext::from_headers(
            &headers(&[("authorization", "Bearer   ")]),
            "sb-access-token",
            "tenant_session",
        );
        assert_eq!(ctx.access_token(), None);
    }

    #[test]
    fn test_cookie_value_across_multiple_headers() {
        let map = headers(&[("cookie", "a=1"), ("cookie", "b=2; c=3")]);
        assert_eq!(cookie_value(&map, "c"), Some("3".to_string()));
        assert_eq!(cookie_value(&map, "missing"), None);
    }

    #[test]
    fn test_cookie_name_must_match_exactly() {
        let map = headers(&[("cookie", "xsb-access-token=nope; sb-access-token=")]);
        assert_eq!(cookie_value(&map, "sb-access-token"), None);
    }
}
