use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use uuid::Uuid;

use presswork_core::domain::actor::{Actor, ActorRole};
use presswork_core::errors::InterfaceError;

use crate::routes::{ApiError, AppState};
use crate::service::RequestContext;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub fn correlation_id(headers: &HeaderMap) -> String {
    header_value(headers, CORRELATION_ID_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4().simple()))
}

/// Resolves the calling actor and checks that their role may manage quotations.
pub fn authorize(
    headers: &HeaderMap,
    api_token: Option<&str>,
    correlation_id: &str,
) -> Result<Actor, InterfaceError> {
    if let Some(expected) = api_token {
        let presented = header_value(headers, header::AUTHORIZATION.as_str())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);
        if presented != Some(expected) {
            return Err(InterfaceError::Unauthorized {
                message: "a valid bearer token is required".to_string(),
                correlation_id: correlation_id.to_string(),
            });
        }
    }

    let (Some(id), Some(raw_role)) =
        (header_value(headers, ACTOR_ID_HEADER), header_value(headers, ACTOR_ROLE_HEADER))
    else {
        return Err(InterfaceError::Unauthorized {
            message: format!("`{ACTOR_ID_HEADER}` and `{ACTOR_ROLE_HEADER}` headers are required"),
            correlation_id: correlation_id.to_string(),
        });
    };

    match ActorRole::parse(raw_role) {
        Some(role) if role.can_manage_quotations() => Ok(Actor::new(id, role)),
        _ => Err(InterfaceError::Forbidden {
            message: format!("role `{raw_role}` may not manage quotations"),
            correlation_id: correlation_id.to_string(),
        }),
    }
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let correlation_id = correlation_id(&parts.headers);
        let actor = authorize(&parts.headers, state.api_token(), &correlation_id)?;
        Ok(RequestContext::new(actor, correlation_id))
    }
}
