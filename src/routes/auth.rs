// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava OAuth authentication routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE};
use crate::services::strava::{StravaClient, StravaSession};
use crate::models::AthleteTokens;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/strava", get(auth_start))
        .route("/auth/strava/callback", get(auth_callback))
        .route("/auth/logout", get(logout))
}

/// Query parameters for starting OAuth flow.
#[derive(Deserialize)]
pub struct AuthStartParams {
    /// Frontend URL to redirect back to after OAuth completes.
    /// If not provided, uses the configured frontend URL.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start OAuth flow - redirect to Strava authorization.
async fn auth_start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthStartParams>,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    // Encode frontend URL + timestamp in state, signed so the callback can
    // trust where to send the browser afterwards
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {e}")))?
        .as_millis();

    let oauth_state = sign_state(&frontend_url, timestamp, &state.config.secret_key)?;

    let auth_url = format!(
        "https://www.strava.com/oauth/authorize?\
         client_id={}&\
         redirect_uri={}&\
         response_type=code&\
         scope=activity:read_all&\
         state={}",
        state.config.strava_client_id,
        urlencoding::encode(&state.config.strava_redirect_uri),
        oauth_state
    );

    tracing::info!(
        client_id = %state.config.strava_client_id,
        frontend_url = %frontend_url,
        "Starting OAuth flow, redirecting to Strava"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange code for tokens, create session.
///
/// Registers the athlete, stores their tokens, and runs a best-effort sync.
/// A sync failure is logged and ignored: it must never block the login.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect)> {
    // Decode and verify frontend URL from the state parameter
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|raw| verify_and_decode_state(raw, &state.config.secret_key))
        .unwrap_or_else(|| {
            tracing::warn!(
                "Invalid or missing state parameter, falling back to default frontend URL"
            );
            state.config.frontend_url.clone()
        });

    // Check for OAuth errors (user denied, etc.)
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        let redirect = format!("{frontend_url}?error={}", urlencoding::encode(&error));
        return Ok((jar, Redirect::temporary(&redirect)));
    }
    let code = params.code.ok_or_else(|| {
        AppError::BadRequest("Missing authorization code in callback".to_string())
    })?;

    tracing::info!("Exchanging authorization code for tokens");

    let client = StravaClient::new(
        state.config.strava_client_id.clone(),
        state.config.strava_client_secret.clone(),
    );
    let token_response = client.exchange_code(&code).await?;
    let athlete_id = token_response.athlete.id;

    // Register athlete (upsert) and store tokens
    state
        .db
        .upsert_athlete(
            athlete_id,
            token_response.athlete.firstname.as_deref(),
            token_response.athlete.lastname.as_deref(),
        )
        .await?;

    let tokens = AthleteTokens {
        access_token: token_response.access_token,
        refresh_token: token_response.refresh_token,
        expires_at: token_response.expires_at,
    };
    state.db.set_tokens(athlete_id, &tokens).await?;

    tracing::info!(athlete_id, "OAuth successful, athlete and tokens stored");

    // Smart sync: skipped when fresh, and never fatal to the login
    let mut session = StravaSession::new(client, tokens);
    let sync_result = state.sync_service.sync_athlete(athlete_id, &mut session).await;
    tracing::info!(
        athlete_id,
        synced = sync_result.synced,
        new_activities = sync_result.new_activities,
        error = ?sync_result.error,
        "Post-login sync finished"
    );

    // Create JWT session cookie
    let jwt = create_jwt(athlete_id, &state.config.secret_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {e}")))?;

    let cookie = Cookie::build((SESSION_COOKIE, jwt))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::temporary(&frontend_url)))
}

/// Logout - clear the session cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    (jar, Redirect::temporary(&state.config.frontend_url))
}

/// Sign "frontend_url|timestamp_hex" with HMAC-SHA256 and base64-encode.
fn sign_state(frontend_url: &str, timestamp: u128, secret: &[u8]) -> Result<String> {
    let state_payload = format!("{frontend_url}|{timestamp:x}");

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {e}")))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{state_payload}|{}", hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify HMAC signature and decode the frontend URL from the OAuth state
/// parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{frontend_url}|{timestamp_hex}");

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}
