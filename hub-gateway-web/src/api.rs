use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, TimeZone, Utc};
use hub_gateway_error::WebError;
use hub_gateway_models::constants::{
    CONNECTION_STRING_HEADER, DEFAULT_TOKEN_LIFETIME_MINUTES, SAS_TOKEN_EXPIRATION_HEADER,
    SAS_TOKEN_HEADER,
};
use tracing::debug;

use crate::AppState;

type WebResult<T> = Result<T, WebError>;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/{device_id}", web::post().to(send_message))
        .route("/api", web::post().to(missing_device_id))
        .route("/api/", web::post().to(missing_device_id));
}

async fn missing_device_id() -> WebResult<HttpResponse> {
    Err(WebError::validation("missing deviceId"))
}

/// Send one message to a device. Authentication is picked from the request
/// headers: a connection string wins over a token, and a request with
/// neither falls back to the configured shared access policy.
async fn send_message(
    state: web::Data<AppState>,
    request: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
) -> WebResult<HttpResponse> {
    let device_id = path.into_inner();
    if device_id.trim().is_empty() {
        return Err(WebError::validation("missing deviceId"));
    }
    if body.is_empty() {
        return Err(WebError::validation("missing payload"));
    }
    debug!(device_id = %device_id, bytes = body.len(), "send requested");

    if let Some(connection_string) = header(&request, CONNECTION_STRING_HEADER) {
        if !state.settings.hub.connection_string_enabled {
            return Err(WebError::validation("device connection string not enabled"));
        }
        state
            .gateway
            .send_by_connection_string(&connection_string, &device_id, body)
            .await?;
        return Ok(HttpResponse::Ok().finish());
    }

    if let Some(token) = header(&request, SAS_TOKEN_HEADER) {
        let expires_at = token_expiration(&request, &token)?;
        state
            .gateway
            .send_by_token(&device_id, body, &token, expires_at)
            .await?;
        return Ok(HttpResponse::Ok().finish());
    }

    if !state.settings.hub.shared_access_enabled {
        return Err(WebError::validation("shared access not enabled"));
    }
    state.gateway.send_by_shared_access(&device_id, body).await?;
    Ok(HttpResponse::Ok().finish())
}

/// Expiration for a token request: the explicit header when present, else
/// the `se=` field of the token itself, else a default lifetime from now.
fn token_expiration(request: &HttpRequest, token: &str) -> Result<DateTime<Utc>, WebError> {
    if let Some(raw) = header(request, SAS_TOKEN_EXPIRATION_HEADER) {
        let seconds: i64 = raw
            .parse()
            .map_err(|_| WebError::validation("invalid token expiration"))?;
        let expires_at = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| WebError::validation("invalid token expiration"))?;
        if expires_at <= Utc::now() {
            return Err(WebError::validation("token already expired"));
        }
        return Ok(expires_at);
    }
    Ok(expiration_from_token(token).unwrap_or_else(|| {
        Utc::now() + chrono::Duration::minutes(DEFAULT_TOKEN_LIFETIME_MINUTES)
    }))
}

/// Parse the `se=` (expiry, epoch seconds) field of a shared access signature.
/// Fields are matched by key, so an `se` embedded in another value is ignored.
fn expiration_from_token(token: &str) -> Option<DateTime<Utc>> {
    token
        .split('&')
        .find_map(|field| {
            let (key, value) = field.split_once('=')?;
            (key.trim() == "se").then_some(value)
        })
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
}

fn header(request: &HttpRequest, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}
