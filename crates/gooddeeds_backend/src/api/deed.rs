//! Deed routes: creation, listing, updates, and deletion.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{patch, post},
    Router,
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    db, geo, kudos, lifecycle,
    middleware::{self, ApiError},
    models::Deed,
    session_auth::AuthContext,
    utils, AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create).get(list))
        .route("/:id", patch(update).delete(delete_deed))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBody {
    pub date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub estimated_hours: Option<i64>,
    pub helpers_needed: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
    pub title: Option<String>,
}

/// Create a new deed, debiting the requester its kudos cost up front
pub async fn create(
    auth: AuthContext,
    State(state): State<AppState>,
    Json(payload): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    let identity = middleware::is_user_logged_in(auth.current_user.as_ref())?;
    let title = middleware::is_deed_title_valid(payload.title.as_deref())?.to_string();
    let description =
        middleware::is_deed_description_valid(payload.description.as_deref())?.to_string();
    let date = middleware::is_deed_date_valid(payload.date, now)?;
    let difficulty = middleware::is_deed_difficulty_valid(payload.difficulty.as_deref())?;
    let estimated_hours = middleware::is_deed_estimated_hours_valid(payload.estimated_hours)?;
    let helpers_needed = middleware::is_deed_helper_amount_valid(payload.helpers_needed)?;
    let location = middleware::is_deed_location_valid(payload.location.as_deref())?.to_string();
    let (latitude, longitude) =
        middleware::is_deed_position_valid(payload.latitude, payload.longitude)?;

    let user = db::find_user(&state.db_conn, &identity.id)
        .await
        .map_err(|err| {
            warn!("user lookup failed: {err}");
            ApiError::try_later("Deed could not be created")
        })?
        .ok_or_else(|| {
            ApiError::new(StatusCode::UNAUTHORIZED, "You must be logged in first!")
        })?;

    let deeds = db::all_deeds(&state.db_conn).await.map_err(|err| {
        warn!("deed listing failed: {err}");
        ApiError::try_later("Deed could not be created")
    })?;

    let cost = kudos::deed_cost(difficulty, estimated_hours, helpers_needed);
    middleware::can_create_deed(&user, &deeds, cost, now)?;

    // Two-step protocol: the debit lands first, the deed is created second.
    // A failed create leaves the debit standing.
    let new_kudos = kudos::debit(&state.db_conn, &user.username, cost)
        .await
        .map_err(|err| {
            warn!("kudos debit failed: {err}");
            ApiError::try_later("Deed could not be created")
        })?;

    let markers: Vec<(f64, f64)> = deeds
        .iter()
        .map(|deed| (deed.latitude, deed.longitude))
        .collect();
    let (latitude, longitude) = geo::deconflict(&markers, latitude, longitude);

    let deed = Deed {
        deed_id: utils::generate_id(),
        requester: user.username.clone(),
        date,
        title,
        description,
        difficulty,
        estimated_hours,
        helpers_needed,
        helpers: Vec::new(),
        kudos: kudos::per_helper_kudos(difficulty, estimated_hours),
        latitude,
        longitude,
        location,
        given_feedback: Vec::new(),
        completed: false,
    };

    let created: Option<Deed> = state
        .db_conn
        .create(("Deed", deed.deed_id.as_str()))
        .content(&deed)
        .await
        .map_err(|err| {
            warn!("deed create failed: {err}");
            ApiError::try_later("Deed could not be created")
        })?;
    let Some(created) = created else {
        return Err(ApiError::try_later("Deed could not be created"));
    };

    debug!("created deed {} for {}", created.deed_id, created.requester);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "You have successfully created your deed!",
            "deed": created,
            "kudos": new_kudos,
        })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub requester: Option<String>,
    pub helper: Option<String>,
    #[serde(rename = "forProfile")]
    pub for_profile: Option<bool>,
}

/// Get all deeds, plus the subset for the requested view
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();

    if let Some(username) = query.requester.as_ref().or(query.helper.as_ref()) {
        let referenced = db::find_user(&state.db_conn, username).await.map_err(|err| {
            warn!("user lookup failed: {err}");
            ApiError::new(
                StatusCode::NOT_FOUND,
                "User was not found. Please try to view a different user!",
            )
        })?;
        middleware::is_user_id_valid(referenced)?;
    }

    let deeds = db::all_deeds(&state.db_conn).await.map_err(|err| {
        warn!("deed listing failed: {err}");
        ApiError::try_later("Deeds could not be listed")
    })?;

    let filtered: Vec<&Deed> = if let Some(requester) = query.requester.as_deref() {
        if query.for_profile.unwrap_or(false) {
            deeds
                .iter()
                .filter(|deed| {
                    deed.requester == requester && lifecycle::visible_on_profile(deed, now)
                })
                .collect()
        } else {
            deeds.iter().filter(|deed| deed.requester == requester).collect()
        }
    } else if let Some(helper) = query.helper.as_deref() {
        deeds
            .iter()
            .filter(|deed| lifecycle::has_helper(deed, helper))
            .collect()
    } else {
        deeds
            .iter()
            .filter(|deed| lifecycle::open_for_home(deed, now))
            .collect()
    };

    Ok(Json(json!({
        "message": "You have successfully got all the deeds",
        "deeds": deeds,
        "filteredDeeds": filtered,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBody {
    pub date: Option<DateTime<Utc>>,
    pub description: Option<String>,
    pub difficulty: Option<String>,
    pub estimated_hours: Option<i64>,
    pub helpers_needed: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location: Option<String>,
    pub title: Option<String>,
    pub completed: Option<bool>,
    /// Username the requester is leaving feedback about; recording one
    /// settles the deed's feedback and, with `completed`, pays helpers
    pub reviewee: Option<String>,
    pub new_helper: Option<String>,
    pub remove_helper: Option<String>,
    pub remove_self: Option<bool>,
}

/// Update the deed with a specific id
pub async fn update(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateBody>,
) -> Result<Json<Value>, ApiError> {
    let now = Utc::now();
    let identity = middleware::is_user_logged_in(auth.current_user.as_ref())?;

    let found = db::find_deed(&state.db_conn, &id).await.map_err(|err| {
        warn!("deed lookup failed: {err}");
        ApiError::new(
            StatusCode::NOT_FOUND,
            "Deed was not found. Please try again later!",
        )
    })?;
    let mut deed = middleware::does_deed_exist(found)?;

    // any supplied field must be valid on its own before anything mutates
    if payload.title.is_some() {
        middleware::is_deed_title_valid(payload.title.as_deref())?;
    }
    if payload.description.is_some() {
        middleware::is_deed_description_valid(payload.description.as_deref())?;
    }
    if payload.location.is_some() {
        middleware::is_deed_location_valid(payload.location.as_deref())?;
    }
    if payload.date.is_some() {
        middleware::is_deed_date_valid(payload.date, now)?;
    }
    let new_difficulty = match payload.difficulty.as_deref() {
        Some(raw) => middleware::is_deed_difficulty_valid(Some(raw))?,
        None => deed.difficulty,
    };
    let new_hours = match payload.estimated_hours {
        Some(hours) => middleware::is_deed_estimated_hours_valid(Some(hours))?,
        None => deed.estimated_hours,
    };
    let new_helpers_needed = match payload.helpers_needed {
        Some(count) => middleware::is_deed_helper_amount_valid(Some(count))?,
        None => deed.helpers_needed,
    };

    // cost is recomputed from the fields that survive the edit, never
    // taken from the client
    let previous_cost = deed.helpers_needed as i64 * deed.kudos;
    let new_cost = kudos::deed_cost(new_difficulty, new_hours, new_helpers_needed);

    let requester = db::find_user(&state.db_conn, &deed.requester)
        .await
        .map_err(|err| {
            warn!("requester lookup failed: {err}");
            ApiError::try_later("Deed could not be updated")
        })?
        .ok_or_else(|| ApiError::try_later("Deed could not be updated"))?;
    middleware::can_edit_deed(&requester, previous_cost, new_cost)?;

    let remove_self = payload.remove_self.unwrap_or(false);
    middleware::can_remove_self_from_helpers(remove_self, &deed, now)?;
    middleware::can_remove_helpers(
        remove_self,
        payload.remove_helper.as_deref(),
        &deed,
        &identity.id,
        now,
    )?;

    // feedback settlement: record the reviewer, pay helpers on completion
    if payload.reviewee.is_some() {
        if !deed.given_feedback.contains(&identity.id) {
            deed.given_feedback.push(identity.id.clone());
        }
        if payload.completed.unwrap_or(false) {
            for helper in deed.helpers.clone() {
                kudos::credit(&state.db_conn, &helper, deed.kudos)
                    .await
                    .map_err(|err| {
                        warn!("helper credit failed: {err}");
                        ApiError::try_later("Deed could not be updated")
                    })?;
            }
        }
    }

    // settle the requester's balance when the cost changed
    let mut new_requester_kudos = None;
    if previous_cost != new_cost {
        let balance = kudos::adjust(&state.db_conn, &deed.requester, previous_cost, new_cost)
            .await
            .map_err(|err| {
                warn!("kudos adjustment failed: {err}");
                ApiError::try_later("Deed could not be updated")
            })?;
        new_requester_kudos = Some(balance);
    }

    // helper membership change, or a plain field update
    if let Some(new_helper) = payload.new_helper.as_deref() {
        // capacity is not re-checked here; full deeds only drop out of the
        // home listing
        deed.helpers.push(new_helper.to_string());
    } else if let Some(removed) = payload.remove_helper.as_deref() {
        deed.helpers.retain(|helper| helper != removed);
    } else {
        if let (Some(latitude), Some(longitude)) = (payload.latitude, payload.longitude) {
            let deeds = db::all_deeds(&state.db_conn).await.map_err(|err| {
                warn!("deed listing failed: {err}");
                ApiError::try_later("Deed could not be updated")
            })?;
            let markers: Vec<(f64, f64)> = deeds
                .iter()
                .map(|other| (other.latitude, other.longitude))
                .collect();
            let placed = geo::deconflict(&markers, latitude, longitude);
            deed.latitude = placed.0;
            deed.longitude = placed.1;
        }
        if let Some(date) = payload.date {
            deed.date = date;
        }
        if let Some(description) = payload.description {
            deed.description = description;
        }
        if let Some(location) = payload.location {
            deed.location = location;
        }
        if let Some(title) = payload.title {
            deed.title = title;
        }
        deed.difficulty = new_difficulty;
        deed.estimated_hours = new_hours;
        deed.helpers_needed = new_helpers_needed;
        // the per-helper rate follows difficulty and hours
        deed.kudos = kudos::per_helper_kudos(new_difficulty, new_hours);
        // completed never reverts
        deed.completed = deed.completed || payload.completed.unwrap_or(false);
    }

    let updated = db::update_deed(&state.db_conn, &deed)
        .await
        .map_err(|err| {
            warn!("deed update failed: {err}");
            ApiError::try_later("Deed could not be updated")
        })?
        .ok_or_else(|| ApiError::try_later("Deed could not be updated"))?;

    Ok(Json(json!({
        "message": "You have successfully updated your Deed.",
        "deed": updated,
        "kudos": new_requester_kudos,
    })))
}

/// Delete the deed with a specific id, refunding its recorded kudos
pub async fn delete_deed(
    auth: AuthContext,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let identity = middleware::is_user_logged_in(auth.current_user.as_ref())?;

    let found = db::find_deed(&state.db_conn, &id).await.map_err(|err| {
        warn!("deed lookup failed: {err}");
        ApiError::new(
            StatusCode::NOT_FOUND,
            "Deed was not found. Please try again later!",
        )
    })?;
    let deed = middleware::does_deed_exist(found)?;
    middleware::is_deed_requester(&deed, &identity.id)?;

    // deeds are only deletable from the client while nobody has offered to
    // help, so the recorded kudos go straight back to the requester
    let new_kudos = kudos::credit(&state.db_conn, &identity.id, deed.kudos)
        .await
        .map_err(|err| {
            warn!("kudos refund failed: {err}");
            ApiError::try_later("Deed could not be deleted")
        })?;

    let _deleted: Option<Deed> = state
        .db_conn
        .delete(("Deed", deed.deed_id.as_str()))
        .await
        .map_err(|err| {
            warn!("deed delete failed: {err}");
            ApiError::try_later("Deed could not be deleted")
        })?;

    debug!("deleted deed {} for {}", deed.deed_id, identity.id);

    Ok(Json(json!({
        "message": "You have successfully deleted your Deed.",
        "id": deed.deed_id,
        "kudos": new_kudos,
    })))
}
