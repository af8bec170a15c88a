//! Reward routes: the catalog and per-user grant listings.

use axum::{
    extract::{Json, Query, State},
    routing::get,
    Router,
};
use chrono::Utc;
use log::warn;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db,
    middleware::{self, ApiError},
    models::RewardGrant,
    session_auth::AuthContext,
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub by_user: Option<bool>,
    pub unredeemed_only: Option<bool>,
    pub unexpired_only: Option<bool>,
}

/// Get the full catalog, or the signed in user's grants with optional
/// redemption/expiry filters
pub async fn list(
    auth: AuthContext,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let by_user = query.by_user.unwrap_or(false);
    let unredeemed_only = query.unredeemed_only.unwrap_or(false);
    let unexpired_only = query.unexpired_only.unwrap_or(false);

    middleware::is_user_logged_in_rewards(by_user, auth.current_user.as_ref())?;
    middleware::by_user_valid_filtering(by_user, unredeemed_only, unexpired_only)?;

    if by_user {
        let identity = middleware::is_user_logged_in(auth.current_user.as_ref())?;
        let user = db::find_user(&state.db_conn, &identity.id)
            .await
            .map_err(|err| {
                warn!("user lookup failed: {err}");
                ApiError::try_later("Rewards could not be listed")
            })?
            .ok_or_else(|| ApiError::try_later("Rewards could not be listed"))?;

        let mut grants: Vec<RewardGrant> = user.rewards;
        if unredeemed_only {
            grants.retain(|grant| !grant.redeemed);
        }
        if unexpired_only {
            grants.retain(|grant| grant.expiry_date > now);
        }

        return Ok(Json(json!({
            "message": "You have successfully got the user rewards",
            "rewards": grants,
        })));
    }

    let rewards = db::all_rewards(&state.db_conn).await.map_err(|err| {
        warn!("reward listing failed: {err}");
        ApiError::try_later("Rewards could not be listed")
    })?;

    Ok(Json(json!({
        "message": "You have successfully got all the rewards",
        "rewards": rewards,
    })))
}
