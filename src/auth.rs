use reqwest::Url;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use tracing::debug;

use std::sync::Arc;

use crate::config::PortalConfig;
use crate::gateway::{GatewayError, GatewayResult, Session, SqliteBackend};

fn invalid_url(e: impl std::fmt::Display) -> GatewayError {
    GatewayError::Validation(format!("Invalid sign-in URL: {}", e))
}

/// The OAuth redirect for signing in with `provider`. After sign-in the
/// provider returns to `<origin>/auth/callback`, which forwards to `next`.
pub fn sign_in_redirect(
    identity_url: &str,
    origin: &str,
    provider: &str,
    next: &str,
) -> GatewayResult<String> {
    let callback = Url::parse_with_params(
        &format!("{}/auth/callback", origin.trim_end_matches('/')),
        &[("next", next), ("source", "signup")],
    )
    .map_err(invalid_url)?;
    let url = Url::parse_with_params(
        &format!("{}/authorize", identity_url.trim_end_matches('/')),
        &[("provider", provider), ("redirect_to", callback.as_str())],
    )
    .map_err(invalid_url)?;

    Ok(url.to_string())
}

/// Where to send a user whose session is missing or expired.
pub fn login_redirect(next: &str) -> String {
    format!("/login?next={}", next)
}

fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Session {
    type Error = GatewayError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(token) = bearer_token(request) else {
            return Outcome::Error((Status::Unauthorized, GatewayError::Unauthenticated));
        };
        let Some(backend) = request.rocket().state::<Arc<SqliteBackend>>() else {
            return Outcome::Error((
                Status::InternalServerError,
                GatewayError::Storage("backend not configured".to_string()),
            ));
        };

        match backend.authenticate(token) {
            Ok(session) => Outcome::Success(session),
            Err(e) => {
                debug!(error = %e, "rejected bearer token");
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

/// Proof that the request carried the configured admin token.
pub struct AdminToken;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = GatewayError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let authorized = match (bearer_token(request), request.rocket().state::<PortalConfig>()) {
            (Some(token), Some(config)) => config.admin_token_matches(token),
            _ => false,
        };

        if authorized {
            Outcome::Success(AdminToken)
        } else {
            Outcome::Error((Status::Unauthorized, GatewayError::Unauthenticated))
        }
    }
}
