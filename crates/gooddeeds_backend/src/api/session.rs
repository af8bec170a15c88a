//! Session routes: who is signed in, sign in, sign out.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db,
    middleware::{self, ApiError},
    session_auth::{self, AuthContext},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(current).post(sign_in).delete(sign_out))
}

/// Get the user attached to the session, or null when nobody is signed in
pub async fn current(
    auth: AuthContext,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let user = match auth.current_user.as_ref() {
        Some(identity) => db::find_user(&state.db_conn, &identity.id).await.map_err(|err| {
            warn!("user lookup failed: {err}");
            ApiError::try_later("Session could not be read")
        })?,
        None => None,
    };
    Ok(Json(json!({ "user": user })))
}

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Sign in a user
pub async fn sign_in(
    mut auth: AuthContext,
    State(state): State<AppState>,
    Json(payload): Json<SignInBody>,
) -> Result<impl IntoResponse, ApiError> {
    middleware::is_user_logged_out(auth.current_user.as_ref())?;

    let (Some(username), Some(password)) = (payload.username.as_deref(), payload.password.as_deref())
    else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "The username or password you entered is incorrect.",
        ));
    };

    let found = db::find_user(&state.db_conn, username).await.map_err(|err| {
        warn!("user lookup failed: {err}");
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "The username or password you entered is incorrect.",
        )
    })?;
    let user = middleware::is_valid_login(found.as_ref(), password)?.clone();

    session_auth::login(&mut auth, &state.auth_store, &user.username)
        .await
        .map_err(|err| {
            warn!("{err}");
            ApiError::try_later("Sign in could not be completed")
        })?;

    debug!("signed in {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "You have successfully signed in!",
            "user": user,
        })),
    ))
}

/// Sign out the current user
pub async fn sign_out(mut auth: AuthContext) -> Result<Json<Value>, ApiError> {
    let identity = middleware::is_user_logged_in(auth.current_user.as_ref())?;

    auth.logout().await;
    debug!("signed out {}", identity.id);

    Ok(Json(json!({ "message": "You are signed out." })))
}
