//! Feedback routes.

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;

use crate::{
    db,
    middleware::{self, ApiError},
    models::{Deed, Feedback, User},
    session_auth::AuthContext,
    utils, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create).get(list))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
    /// Username of the user the feedback is for
    pub username: Option<String>,
    pub review: Option<String>,
    pub mood: Option<String>,
    pub deed_id: Option<String>,
}

/// Create feedback and thread it through the giver, receiver, and deed
pub async fn create(
    auth: AuthContext,
    State(state): State<AppState>,
    Json(payload): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = middleware::is_user_logged_in(auth.current_user.as_ref())?;
    let review = middleware::is_feedback_review_valid(payload.review.as_deref())?.to_string();
    let mood = payload.mood.ok_or_else(|| {
        ApiError::new(StatusCode::BAD_REQUEST, "You must specify a mood!")
    })?;
    let to_username = payload.username.ok_or_else(|| {
        ApiError::new(StatusCode::BAD_REQUEST, "You must specify who the feedback is for!")
    })?;
    let deed_id = payload.deed_id.ok_or_else(|| {
        ApiError::new(StatusCode::BAD_REQUEST, "You must specify the deed the feedback is about!")
    })?;

    let giver = db::find_user(&state.db_conn, &identity.id)
        .await
        .map_err(|err| {
            warn!("user lookup failed: {err}");
            ApiError::try_later("Feedback could not be created")
        })?
        .ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, "You must be logged in first!")
        })?;
    let receiver = middleware::does_username_exist(
        db::find_user(&state.db_conn, &to_username).await.map_err(|err| {
            warn!("user lookup failed: {err}");
            ApiError::new(StatusCode::NOT_FOUND, "User could not be found!")
        })?,
    )?;
    let deed = middleware::does_deed_exist(
        db::find_deed(&state.db_conn, &deed_id).await.map_err(|err| {
            warn!("deed lookup failed: {err}");
            ApiError::new(
                StatusCode::NOT_FOUND,
                "Deed was not found. Please try again later!",
            )
        })?,
    )?;

    let feedback = Feedback {
        feedback_id: utils::generate_id(),
        from_user: giver.username.clone(),
        to_user: receiver.username.clone(),
        deed: deed.deed_id.clone(),
        mood,
        review,
    };

    let created: Option<Feedback> = state
        .db_conn
        .create(("Feedback", feedback.feedback_id.as_str()))
        .content(&feedback)
        .await
        .map_err(|err| {
            warn!("feedback create failed: {err}");
            ApiError::try_later("Feedback could not be created")
        })?;
    let Some(created) = created else {
        return Err(ApiError::try_later("Feedback could not be created"));
    };

    // cross references: receiver's received list, giver's given list, and
    // the deed's list of users who have weighed in
    let mut received = receiver.feedback_received.clone();
    received.push(created.feedback_id.clone());
    let _receiver: Option<User> = state
        .db_conn
        .update(("Users", receiver.username.as_str()))
        .merge(json!({ "feedback_received": received }))
        .await
        .map_err(|err| {
            warn!("receiver update failed: {err}");
            ApiError::try_later("Feedback could not be created")
        })?;

    let mut given = giver.feedback_given.clone();
    given.push(created.feedback_id.clone());
    let _giver: Option<User> = state
        .db_conn
        .update(("Users", giver.username.as_str()))
        .merge(json!({ "feedback_given": given }))
        .await
        .map_err(|err| {
            warn!("giver update failed: {err}");
            ApiError::try_later("Feedback could not be created")
        })?;

    let mut reviewers = deed.given_feedback.clone();
    if !reviewers.contains(&giver.username) {
        reviewers.push(giver.username.clone());
    }
    let _deed: Option<Deed> = state
        .db_conn
        .update(("Deed", deed.deed_id.as_str()))
        .merge(json!({ "given_feedback": reviewers }))
        .await
        .map_err(|err| {
            warn!("deed update failed: {err}");
            ApiError::try_later("Feedback could not be created")
        })?;

    debug!(
        "feedback {} from {} to {}",
        created.feedback_id, created.from_user, created.to_user
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "You have successfully given feedback!",
            "feedback": created,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Username that gave the feedback
    pub from: Option<String>,
    /// Username that received the feedback
    pub to: Option<String>,
}

/// Get feedback by direction: either given by `from` or received by `to`
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Feedback>>, ApiError> {
    let mut res = match (query.from, query.to) {
        (Some(from), _) => state
            .db_conn
            .query("SELECT * FROM Feedback WHERE from_user = $username")
            .bind(("username", from))
            .await,
        (None, Some(to)) => state
            .db_conn
            .query("SELECT * FROM Feedback WHERE to_user = $username")
            .bind(("username", to))
            .await,
        (None, None) => {
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "Did not specify the direction of feedback associated with the user (i.e. giver or receiver)",
            ));
        }
    }
    .map_err(|err| {
        warn!("feedback query failed: {err}");
        ApiError::try_later("Feedback could not be listed")
    })?;

    let feedbacks: Vec<Feedback> = res.take(0).map_err(|err| {
        warn!("feedback decode failed: {err}");
        ApiError::try_later("Feedback could not be listed")
    })?;

    Ok(Json(feedbacks))
}
