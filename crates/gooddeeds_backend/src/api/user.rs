//! User routes: signup, profile reads, and reward acquisition.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;

use crate::{
    db, kudos,
    middleware::{self, ApiError},
    models::{RewardGrant, User},
    session_auth::{self, AuthContext},
    AppState,
};

/// Kudos a fresh account starts with
const STARTING_KUDOS: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).patch(acquire_reward))
        .route("/:username", get(profile))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
}

/// Create a user and sign them in
pub async fn create(
    mut auth: AuthContext,
    State(state): State<AppState>,
    Json(payload): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let username = middleware::is_username_valid(payload.username.as_deref())?.to_string();
    let password = middleware::is_password_valid(payload.password.as_deref())?.to_string();

    let existing = db::find_user(&state.db_conn, &username).await.map_err(|err| {
        warn!("user lookup failed: {err}");
        ApiError::try_later("User could not be created")
    })?;
    middleware::is_username_unique(existing.as_ref(), &username)?;

    let phone_number = middleware::is_phone_number_valid(payload.phone_number.as_deref())?;
    let by_phone = db::find_user_by_phone(&state.db_conn, &phone_number)
        .await
        .map_err(|err| {
            warn!("phone lookup failed: {err}");
            ApiError::try_later("User could not be created")
        })?;
    middleware::is_phone_number_unregistered(by_phone.as_ref())?;

    let user = User {
        username: username.clone(),
        password,
        email: payload.email,
        phone_number,
        kudos: STARTING_KUDOS,
        feedback_received: Vec::new(),
        feedback_given: Vec::new(),
        rewards: Vec::new(),
    };

    let created: Option<User> = state
        .db_conn
        .create(("Users", username.as_str()))
        .content(&user)
        .await
        .map_err(|err| {
            warn!("user create failed: {err}");
            ApiError::try_later("User could not be created")
        })?;
    let Some(created) = created else {
        return Err(ApiError::try_later("User could not be created"));
    };

    session_auth::login(&mut auth, &state.auth_store, &created.username)
        .await
        .map_err(|err| {
            warn!("{err}");
            ApiError::try_later("User could not be created")
        })?;

    debug!("signed up {}", created.username);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "You have successfully signed up!",
            "user": created,
        })),
    ))
}

/// Get the user with a given username
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<User>, ApiError> {
    let found = db::find_user(&state.db_conn, &username).await.map_err(|err| {
        warn!("user lookup failed: {err}");
        ApiError::new(StatusCode::NOT_FOUND, "User could not be found!")
    })?;
    let user = middleware::does_username_exist(found)?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct AcquireBody {
    #[serde(rename = "rewardID")]
    pub reward_id: Option<String>,
}

/// Spend kudos to acquire a reward for the signed in user
pub async fn acquire_reward(
    auth: AuthContext,
    State(state): State<AppState>,
    Json(payload): Json<AcquireBody>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let identity = middleware::is_user_logged_in(auth.current_user.as_ref())?;

    let reward_id = payload.reward_id.ok_or_else(|| {
        ApiError::new(StatusCode::BAD_REQUEST, "You must specify a reward to acquire!")
    })?;
    let found = db::find_reward(&state.db_conn, &reward_id).await.map_err(|err| {
        warn!("reward lookup failed: {err}");
        ApiError::new(StatusCode::NOT_FOUND, "Reward could not be found!")
    })?;
    let reward = middleware::does_reward_exist(found)?;

    let user = db::find_user(&state.db_conn, &identity.id)
        .await
        .map_err(|err| {
            warn!("user lookup failed: {err}");
            ApiError::try_later("Reward could not be acquired")
        })?
        .ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, "You must be logged in first!")
        })?;
    middleware::can_acquire_reward(&user, &reward)?;

    let new_kudos = kudos::debit(&state.db_conn, &user.username, reward.kudos_value)
        .await
        .map_err(|err| {
            warn!("kudos debit failed: {err}");
            ApiError::try_later("Reward could not be acquired")
        })?;

    let grant = RewardGrant::grant(&reward, now);

    let mut grants = user.rewards.clone();
    grants.push(grant.clone());
    let _updated: Option<User> = state
        .db_conn
        .update(("Users", user.username.as_str()))
        .merge(json!({ "rewards": grants }))
        .await
        .map_err(|err| {
            warn!("grant update failed: {err}");
            ApiError::try_later("Reward could not be acquired")
        })?;

    debug!("{} acquired reward {}", user.username, reward.reward_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "You have successfully acquired your reward!",
            "userReward": grant,
            "kudos": new_kudos,
        })),
    ))
}
