pub mod deed;
pub mod feedback;
pub mod reward;
pub mod session;
pub mod user;

use axum::{
    http::{StatusCode, Uri},
    response::Html,
    routing::get,
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .nest("/api/deeds", deed::router())
        .nest("/api/user", user::router())
        .nest("/api/session", session::router())
        .nest("/api/feedback", feedback::router())
        .nest("/api/reward", reward::router())
        .fallback(unknown_route)
}

async fn health() -> &'static str {
    "health!"
}

/// Discoverability fallback: unknown routes answer 404 with the route map
async fn unknown_route(uri: Uri) -> (StatusCode, Html<String>) {
    let listing = format!(
        r#"
  The following route is invalid: <b>{uri}</b>
  <br><br>
  Here are the list of supported routes:
  <br>
  <br>
  <b>Deeds</b>
  <br>
  POST /api/deeds - Creates a new deed
  <br>
  GET /api/deeds - Get all deeds
  <br>
  PATCH /api/deeds/:id - Updates the deed with a specific id
  <br>
  DELETE /api/deeds/:id - Deletes the deed with a specific id
  <br><br>
  <b>Users</b>
  <br>
  POST /api/user - Create a user
  <br>
  GET /api/user/:username - Get the user with a given username
  <br>
  PATCH /api/user - Acquire a reward for the signed in user
  <br><br>
  <b>Session</b>
  <br>
  GET /api/session - Get the user in the session
  <br>
  POST /api/session - Sign in a user
  <br>
  DELETE /api/session - Sign out a user
  <br><br>
  <b>Feedback</b>
  <br>
  POST /api/feedback - Create feedback
  <br>
  GET /api/feedback - Get feedback given or received by a user
  <br><br>
  <b>Rewards</b>
  <br>
  GET /api/reward - Get the reward catalog or a user's rewards
  <br>
"#
    );

    (StatusCode::NOT_FOUND, Html(listing))
}
