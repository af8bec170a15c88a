//! Request validation chain.
//!
//! Every route runs an ordered list of precondition checks before its
//! mutation executes; the first failing check short-circuits the request
//! with a specific status code and message. Each predicate is stateless
//! given the typed request fields and whatever entities the handler has
//! already fetched, so each one is testable on its own. Handlers keep the
//! chain order of their route since later predicates assume earlier ones
//! passed (the deed must be fetched before asking who its requester is).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::json;

use crate::{
    lifecycle,
    models::{Deed, Difficulty, Reward, User},
    session_auth::AuthUser,
};

const PHONE_NUMBER_PATTERN: &str =
    r"^\(?([0-9]{3})\)?[-. ]?([0-9]{3})[-. ]?([0-9]{4})$";

/// Terminal request error: a status code plus a human readable message,
/// rendered as `{"error": ...}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> ApiError {
        ApiError {
            status,
            message: message.into(),
        }
    }

    /// Answer for persistence failures; the underlying cause is logged by
    /// the handler and swallowed here
    pub fn try_later(action: &str) -> ApiError {
        ApiError::new(
            StatusCode::FORBIDDEN,
            format!("{action} at this time. Please try again later"),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// 401 unless the session carries an authenticated identity. Returns the
/// identity so handlers thread it through explicitly.
pub fn is_user_logged_in(current: Option<&AuthUser>) -> Result<AuthUser, ApiError> {
    current.cloned().ok_or_else(|| {
        ApiError::new(StatusCode::UNAUTHORIZED, "You must be logged in first!")
    })
}

pub fn is_user_logged_out(current: Option<&AuthUser>) -> Result<(), ApiError> {
    if current.is_some() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "You are already logged in!",
        ));
    }
    Ok(())
}

fn non_blank<'a>(
    value: Option<&'a str>,
    missing: &str,
    blank: &str,
) -> Result<&'a str, ApiError> {
    let Some(value) = value else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, missing));
    };
    if value.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, missing));
    }
    if value.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, blank));
    }
    Ok(value)
}

pub fn is_deed_title_valid(title: Option<&str>) -> Result<&str, ApiError> {
    non_blank(
        title,
        "The title must have at least one character.",
        "The title must have non-whitespace characters.",
    )
}

pub fn is_deed_description_valid(description: Option<&str>) -> Result<&str, ApiError> {
    non_blank(
        description,
        "The description must have at least one character.",
        "The description must have non-whitespace characters.",
    )
}

pub fn is_deed_location_valid(location: Option<&str>) -> Result<&str, ApiError> {
    non_blank(
        location,
        "Please input a valid street address",
        "The street address must have non-whitespace characters",
    )
}

pub fn is_deed_date_valid(
    date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ApiError> {
    let Some(date) = date else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "You must specify a date!"));
    };
    if date < now {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Date must be in the future!",
        ));
    }
    Ok(date)
}

pub fn is_deed_difficulty_valid(difficulty: Option<&str>) -> Result<Difficulty, ApiError> {
    difficulty.and_then(Difficulty::parse).ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid difficulty, must be either low, medium, or high",
        )
    })
}

pub fn is_deed_estimated_hours_valid(hours: Option<i64>) -> Result<u32, ApiError> {
    let Some(hours) = hours else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Must specify the estimated hours of the Deed",
        ));
    };
    if hours == 0 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Estimated hours cannot be 0",
        ));
    }
    if hours < 0 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Estimated hours cannot be negative",
        ));
    }
    Ok(hours as u32)
}

pub fn is_deed_helper_amount_valid(helpers_needed: Option<i64>) -> Result<u32, ApiError> {
    let Some(helpers_needed) = helpers_needed else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Must specify the number of helpers needed",
        ));
    };
    if helpers_needed == 0 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Number of helpers cannot be 0",
        ));
    }
    if helpers_needed < 0 {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Number of helpers cannot be negative",
        ));
    }
    Ok(helpers_needed as u32)
}

pub fn is_deed_position_valid(
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<(f64, f64), ApiError> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok((latitude, longitude)),
        _ => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "You must specify the map coordinates of the Deed",
        )),
    }
}

/// Creation gate: enough kudos to cover the cost, and no other past-due
/// deed still waiting on feedback
pub fn can_create_deed(
    user: &User,
    deeds: &[Deed],
    cost: i64,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if user.kudos < cost {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "You don't have enough kudos to create this deed!",
        ));
    }
    if lifecycle::has_delinquent_deed(deeds, &user.username, now) {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "You must provide feedback on your other deed(s) before creating this deed!",
        ));
    }
    Ok(())
}

/// Edit gate: an increase in deed cost must be covered by the requester's
/// balance
pub fn can_edit_deed(user: &User, previous_cost: i64, new_cost: i64) -> Result<(), ApiError> {
    if new_cost > previous_cost && user.kudos < new_cost - previous_cost {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "You don't have enough kudos to change the difficulty, number of helpers, or estimated hours!",
        ));
    }
    Ok(())
}

pub fn does_deed_exist(deed: Option<Deed>) -> Result<Deed, ApiError> {
    deed.ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "Deed was not found. Please try again later!",
        )
    })
}

pub fn is_deed_requester(deed: &Deed, username: &str) -> Result<(), ApiError> {
    if deed.requester != username {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "You must be the requester of the Deed to make changes",
        ));
    }
    Ok(())
}

/// Self-removal is cut off inside the 24 hour window before the deed date
pub fn can_remove_self_from_helpers(
    remove_self: bool,
    deed: &Deed,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if remove_self && !lifecycle::can_remove_self(deed, now) {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "You can not remove yourself from this deed's helpers within 24 hours of the deadline. Please contact the requester.",
        ));
    }
    Ok(())
}

/// Requester-initiated removal is cut off once the deed date has passed
pub fn can_remove_helpers(
    remove_self: bool,
    remove_helper: Option<&str>,
    deed: &Deed,
    username: &str,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if !remove_self
        && remove_helper.is_some()
        && deed.requester == username
        && !lifecycle::requester_may_remove_helpers(deed, now)
    {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Helpers can only be removed by the requester before the deed date.",
        ));
    }
    Ok(())
}

pub fn is_username_valid(username: Option<&str>) -> Result<&str, ApiError> {
    non_blank(
        username,
        "The username must not be empty.",
        "The username must have non-whitespace characters.",
    )
}

pub fn is_password_valid(password: Option<&str>) -> Result<&str, ApiError> {
    non_blank(
        password,
        "The password must not be empty.",
        "The password must have non-whitespace characters.",
    )
}

pub fn is_username_unique(existing: Option<&User>, username: &str) -> Result<(), ApiError> {
    if existing.is_some() {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            format!("Sorry, a user with username {username} already exists"),
        ));
    }
    Ok(())
}

/// Check the phone number shape and return it normalized to digits only
pub fn is_phone_number_valid(phone_number: Option<&str>) -> Result<String, ApiError> {
    let pattern = Regex::new(PHONE_NUMBER_PATTERN).unwrap();
    let Some(raw) = phone_number.filter(|raw| pattern.is_match(raw)) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "You must include a valid phone number.",
        ));
    };
    Ok(raw.chars().filter(char::is_ascii_digit).collect())
}

pub fn is_phone_number_unregistered(existing: Option<&User>) -> Result<(), ApiError> {
    if existing.is_some() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "A user with that phone number already exists",
        ));
    }
    Ok(())
}

/// Credentials are opaque strings compared for equality
pub fn is_valid_login<'a>(user: Option<&'a User>, password: &str) -> Result<&'a User, ApiError> {
    match user {
        Some(user) if user.password == password => Ok(user),
        _ => Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "The username or password you entered is incorrect.",
        )),
    }
}

pub fn does_username_exist(user: Option<User>) -> Result<User, ApiError> {
    user.ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "User could not be found!"))
}

pub fn is_user_id_valid(user: Option<User>) -> Result<User, ApiError> {
    user.ok_or_else(|| {
        ApiError::new(
            StatusCode::NOT_FOUND,
            "User was not found. Please try to view a different user!",
        )
    })
}

pub fn is_feedback_review_valid(review: Option<&str>) -> Result<&str, ApiError> {
    non_blank(
        review,
        "The feedback review must have at least one character.",
        "The feedback review must have non-whitespace characters.",
    )
}

pub fn does_reward_exist(reward: Option<Reward>) -> Result<Reward, ApiError> {
    reward.ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Reward could not be found!"))
}

pub fn can_acquire_reward(user: &User, reward: &Reward) -> Result<(), ApiError> {
    if user.kudos < reward.kudos_value {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "You don't have enough kudos to acquire this reward!",
        ));
    }
    Ok(())
}

/// The rewards listing only needs a login when it is scoped to a user
pub fn is_user_logged_in_rewards(
    by_user: bool,
    current: Option<&AuthUser>,
) -> Result<(), ApiError> {
    if by_user {
        is_user_logged_in(current)?;
    }
    Ok(())
}

/// Redemption/expiry filters only make sense on a user-scoped listing
pub fn by_user_valid_filtering(
    by_user: bool,
    unredeemed_only: bool,
    unexpired_only: bool,
) -> Result<(), ApiError> {
    if !by_user && (unredeemed_only || unexpired_only) {
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "You must be viewing rewards associated with a user to specify filtering parameters!",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(kudos: i64) -> User {
        User {
            username: "ana".into(),
            password: "hunter2".into(),
            email: None,
            phone_number: "2065551234".into(),
            kudos,
            feedback_received: vec![],
            feedback_given: vec![],
            rewards: vec![],
        }
    }

    fn deed(date: DateTime<Utc>, completed: bool) -> Deed {
        Deed {
            deed_id: "d1".into(),
            requester: "ana".into(),
            date,
            title: "Walk the dog".into(),
            description: "Around the block".into(),
            difficulty: Difficulty::Low,
            estimated_hours: 1,
            helpers_needed: 1,
            helpers: vec!["bo".into()],
            kudos: 10,
            latitude: 0.0,
            longitude: 0.0,
            location: "12 Elm St".into(),
            given_feedback: vec![],
            completed,
        }
    }

    fn now() -> DateTime<Utc> {
        "2023-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn login_check_returns_the_identity() {
        let identity = AuthUser { id: "ana".into() };
        assert_eq!(is_user_logged_in(Some(&identity)).unwrap().id, "ana");

        let err = is_user_logged_in(None).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "You must be logged in first!");
    }

    #[test]
    fn logout_check_rejects_active_sessions() {
        let identity = AuthUser { id: "ana".into() };
        assert_eq!(
            is_user_logged_out(Some(&identity)).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
        assert!(is_user_logged_out(None).is_ok());
    }

    #[test]
    fn title_must_be_present_and_non_blank() {
        assert!(is_deed_title_valid(Some("Rake leaves")).is_ok());
        assert_eq!(
            is_deed_title_valid(None).unwrap_err().message,
            "The title must have at least one character."
        );
        assert_eq!(
            is_deed_title_valid(Some("")).unwrap_err().message,
            "The title must have at least one character."
        );
        assert_eq!(
            is_deed_title_valid(Some("   ")).unwrap_err().message,
            "The title must have non-whitespace characters."
        );
    }

    #[test]
    fn date_must_be_present_and_in_the_future() {
        assert!(is_deed_date_valid(Some(now() + Duration::days(1)), now()).is_ok());
        assert_eq!(
            is_deed_date_valid(None, now()).unwrap_err().message,
            "You must specify a date!"
        );
        let err = is_deed_date_valid(Some(now() - Duration::seconds(1)), now()).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Date must be in the future!");
    }

    #[test]
    fn difficulty_must_be_one_of_the_three_levels() {
        assert_eq!(
            is_deed_difficulty_valid(Some("HIGH")).unwrap(),
            Difficulty::High
        );
        assert_eq!(
            is_deed_difficulty_valid(Some("impossible")).unwrap_err().status,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            is_deed_difficulty_valid(None).unwrap_err().message,
            "Invalid difficulty, must be either low, medium, or high"
        );
    }

    #[test]
    fn hours_and_helpers_must_be_positive() {
        assert_eq!(is_deed_estimated_hours_valid(Some(3)).unwrap(), 3);
        assert_eq!(
            is_deed_estimated_hours_valid(Some(0)).unwrap_err().message,
            "Estimated hours cannot be 0"
        );
        assert_eq!(
            is_deed_estimated_hours_valid(Some(-2)).unwrap_err().message,
            "Estimated hours cannot be negative"
        );
        assert_eq!(
            is_deed_estimated_hours_valid(None).unwrap_err().message,
            "Must specify the estimated hours of the Deed"
        );

        assert_eq!(is_deed_helper_amount_valid(Some(2)).unwrap(), 2);
        assert_eq!(
            is_deed_helper_amount_valid(Some(0)).unwrap_err().message,
            "Number of helpers cannot be 0"
        );
        assert_eq!(
            is_deed_helper_amount_valid(Some(-1)).unwrap_err().message,
            "Number of helpers cannot be negative"
        );
    }

    #[test]
    fn position_requires_both_coordinates() {
        assert_eq!(
            is_deed_position_valid(Some(1.0), Some(2.0)).unwrap(),
            (1.0, 2.0)
        );
        assert!(is_deed_position_valid(Some(1.0), None).is_err());
        assert!(is_deed_position_valid(None, Some(2.0)).is_err());
    }

    #[test]
    fn creation_blocked_on_insufficient_kudos() {
        let err = can_create_deed(&user(100), &[], 200, now()).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, "You don't have enough kudos to create this deed!");
    }

    #[test]
    fn creation_blocked_on_delinquent_deed_with_its_own_message() {
        let overdue = deed(now() - Duration::hours(2), false);
        let err = can_create_deed(&user(100), &[overdue], 20, now()).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            err.message,
            "You must provide feedback on your other deed(s) before creating this deed!"
        );
    }

    #[test]
    fn creation_allowed_when_funded_and_settled() {
        let settled = deed(now() - Duration::days(1), true);
        assert!(can_create_deed(&user(100), &[settled], 20, now()).is_ok());
    }

    #[test]
    fn edit_gate_only_charges_for_increases() {
        assert!(can_edit_deed(&user(10), 100, 60).is_ok());
        assert!(can_edit_deed(&user(10), 100, 100).is_ok());
        assert!(can_edit_deed(&user(50), 100, 150).is_ok());
        assert_eq!(
            can_edit_deed(&user(49), 100, 150).unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn requester_check() {
        let d = deed(now(), false);
        assert!(is_deed_requester(&d, "ana").is_ok());
        assert_eq!(
            is_deed_requester(&d, "bo").unwrap_err().status,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn self_removal_window() {
        let d = deed(now() + Duration::hours(30), false);
        assert!(can_remove_self_from_helpers(true, &d, now()).is_ok());

        let soon = deed(now() + Duration::hours(10), false);
        assert_eq!(
            can_remove_self_from_helpers(true, &soon, now())
                .unwrap_err()
                .status,
            StatusCode::UNAUTHORIZED
        );
        // the window only applies to self-removal
        assert!(can_remove_self_from_helpers(false, &soon, now()).is_ok());
    }

    #[test]
    fn requester_removal_window() {
        let past = deed(now() - Duration::hours(1), false);
        assert_eq!(
            can_remove_helpers(false, Some("bo"), &past, "ana", now())
                .unwrap_err()
                .status,
            StatusCode::UNAUTHORIZED
        );
        let future = deed(now() + Duration::hours(1), false);
        assert!(can_remove_helpers(false, Some("bo"), &future, "ana", now()).is_ok());
        // self-removal is judged by the 24h predicate instead
        assert!(can_remove_helpers(true, Some("ana"), &past, "ana", now()).is_ok());
    }

    #[test]
    fn phone_number_shapes() {
        assert_eq!(
            is_phone_number_valid(Some("(206) 555-1234")).unwrap(),
            "2065551234"
        );
        assert_eq!(is_phone_number_valid(Some("206.555.1234")).unwrap(), "2065551234");
        assert_eq!(is_phone_number_valid(Some("2065551234")).unwrap(), "2065551234");
        assert!(is_phone_number_valid(Some("555-1234")).is_err());
        assert!(is_phone_number_valid(Some("not a phone")).is_err());
        assert!(is_phone_number_valid(None).is_err());
    }

    #[test]
    fn duplicate_phone_number_is_rejected() {
        let existing = user(100);
        assert_eq!(
            is_phone_number_unregistered(Some(&existing))
                .unwrap_err()
                .message,
            "A user with that phone number already exists"
        );
        assert!(is_phone_number_unregistered(None).is_ok());
    }

    #[test]
    fn username_uniqueness() {
        let existing = user(100);
        let err = is_username_unique(Some(&existing), "ana").unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.message, "Sorry, a user with username ana already exists");
        assert!(is_username_unique(None, "bo").is_ok());
    }

    #[test]
    fn login_compares_credentials_for_equality() {
        let u = user(100);
        assert!(is_valid_login(Some(&u), "hunter2").is_ok());
        assert_eq!(
            is_valid_login(Some(&u), "wrong").unwrap_err().message,
            "The username or password you entered is incorrect."
        );
        assert!(is_valid_login(None, "hunter2").is_err());
    }

    #[test]
    fn reward_gates() {
        let reward = Reward {
            reward_id: "coffee".into(),
            name: "Free coffee".into(),
            source: "Corner Cafe".into(),
            internal_source: false,
            description: "One free drip coffee".into(),
            kudos_value: 20,
        };
        assert!(can_acquire_reward(&user(20), &reward).is_ok());
        assert_eq!(
            can_acquire_reward(&user(19), &reward).unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            does_reward_exist(None).unwrap_err().status,
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn reward_listing_filters_require_a_user_scope() {
        assert!(by_user_valid_filtering(true, true, true).is_ok());
        assert!(by_user_valid_filtering(false, false, false).is_ok());
        assert_eq!(
            by_user_valid_filtering(false, true, false).unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );
        assert!(is_user_logged_in_rewards(false, None).is_ok());
        assert_eq!(
            is_user_logged_in_rewards(true, None).unwrap_err().status,
            StatusCode::UNAUTHORIZED
        );
    }
}
