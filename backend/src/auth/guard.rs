//! Route guard for page paths.
//!
//! Public paths pass straight through. Protected paths need a session;
//! admin paths additionally need `permission = "admin"`.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use gate_common::Principal;

use crate::config::RoutesConfig;
use crate::AppState;

use super::context::RequestContext;
use super::permission::is_admin_user;
use super::session::get_authenticated_server_user;

/// How a path is treated by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    Admin,
}

/// Outcome of guarding one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allow,
    RedirectToLogin,
    RedirectToDashboard,
}

pub struct RouteRules<'a> {
    config: &'a RoutesConfig,
}

impl<'a> RouteRules<'a> {
    pub fn new(config: &'a RoutesConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if path.starts_with(&self.config.admin_prefix) {
            RouteClass::Admin
        } else if self.config.protected.iter().any(|route| path.starts_with(route.as_str())) {
            RouteClass::Protected
        } else {
            RouteClass::Public
        }
    }

    /// Pure decision table. `is_admin` is only consulted for admin paths.
    pub fn decide(&self, path: &str, principal: Option<&Principal>, is_admin: bool) -> RouteDecision {
        match (self.classify(path), principal) {
            (RouteClass::Public, _) => RouteDecision::Allow,
            (_, None) => RouteDecision::RedirectToLogin,
            (RouteClass::Admin, Some(_)) if !is_admin => RouteDecision::RedirectToDashboard,
            _ => RouteDecision::Allow,
        }
    }

    /// Redirect target for a decision, keeping the original query string.
    pub fn location(&self, decision: &RouteDecision, query: Option<&str>) -> Option<String> {
        let path = match decision {
            RouteDecision::Allow => return None,
            RouteDecision::RedirectToLogin => &self.config.login_path,
            RouteDecision::RedirectToDashboard => &self.config.dashboard_path,
        };
        Some(match query {
            Some(q) if !q.is_empty() => format!("{}?{}", path, q),
            _ => path.clone(),
        })
    }
}

/// Run both resolvers as needed for `path`.
///
/// Public paths never reach the identity provider.
pub async fn evaluate(state: &AppState, context: &RequestContext, path: &str) -> RouteDecision {
    let rules = RouteRules::new(&state.config.routes);
    let class = rules.classify(path);
    if class == RouteClass::Public {
        return RouteDecision::Allow;
    }

    let principal = get_authenticated_server_user(&state.auth_clients, context).await.ok();
    let is_admin = match (&principal, class) {
        (Some(p), RouteClass::Admin) => is_admin_user(state.users.as_ref(), &p.id).await,
        _ => false,
    };

    let decision = rules.decide(path, principal.as_ref(), is_admin);
    if decision != RouteDecision::Allow {
        tracing::info!(
            path,
            user_id = principal.as_ref().map(|p| p.id.as_str()),
            ?decision,
            "Route guard redirect"
        );
    }
    decision
}

/// Middleware that redirects requests failing the route guard.
pub async fn enforce_routes(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let decision = evaluate(&state, &context, &path).await;

    match RouteRules::new(&state.config.routes).location(&decision, request.uri().query()) {
        Some(location) => Redirect::temporary(&location).into_response(),
        None => next.run(request).await,
    }
}
