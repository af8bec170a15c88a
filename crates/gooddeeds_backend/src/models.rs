use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days until an acquired reward expires
const GRANT_EXPIRY_DAYS: i64 = 7;

/// Difficulty rating of a deed, drives the per-helper kudos rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Low,
    Medium,
    High,
}

impl Difficulty {
    /// Parse a client supplied difficulty string, case insensitive
    pub fn parse(raw: &str) -> Option<Difficulty> {
        match raw.to_lowercase().as_str() {
            "low" => Some(Difficulty::Low),
            "medium" => Some(Difficulty::Medium),
            "high" => Some(Difficulty::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Username, doubles as the record key
    pub username: String,
    /// Opaque credential, compared for equality on login
    pub password: String,
    pub email: Option<String>,
    /// Digits only, normalized at signup
    pub phone_number: String,
    /// Kudos balance, starts at 100
    pub kudos: i64,
    /// Ids of feedback this user has received
    pub feedback_received: Vec<String>,
    /// Ids of feedback this user has given
    pub feedback_given: Vec<String>,
    /// Rewards acquired by spending kudos
    pub rewards: Vec<RewardGrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deed {
    pub deed_id: String,
    /// Username of the user that requested this deed
    pub requester: String,
    /// When the deed takes place, also the deadline for helpers to join
    pub date: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub estimated_hours: u32,
    pub helpers_needed: u32,
    /// Usernames of users helping out
    pub helpers: Vec<String>,
    /// Per-helper kudos rate, derived from difficulty and estimated hours
    pub kudos: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Street address shown alongside the map marker
    pub location: String,
    /// Usernames that have given feedback on this deed
    pub given_feedback: Vec<String>,
    pub completed: bool,
}

/// Feedback exchanged between a requester and a helper, immutable once
/// created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub feedback_id: String,
    pub from_user: String,
    pub to_user: String,
    /// Id of the deed the feedback is about
    pub deed: String,
    pub mood: String,
    pub review: String,
}

/// Catalog entry users can spend kudos on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    pub reward_id: String,
    pub name: String,
    pub source: String,
    /// Internally sourced rewards are granted not yet redeemed
    pub internal_source: bool,
    pub description: String,
    pub kudos_value: i64,
}

/// A reward acquired by a user, embedded in the user document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardGrant {
    /// Id of the catalog reward
    pub reward: String,
    pub redeemed: bool,
    pub redeem_date: DateTime<Utc>,
    /// Advisory, only used for read-side filtering
    pub expiry_date: DateTime<Utc>,
}

impl RewardGrant {
    /// Grant `reward` at `now`. Externally sourced rewards are consumed
    /// the moment they are granted.
    pub fn grant(reward: &Reward, now: DateTime<Utc>) -> RewardGrant {
        RewardGrant {
            reward: reward.reward_id.clone(),
            redeemed: !reward.internal_source,
            redeem_date: now,
            expiry_date: now + Duration::days(GRANT_EXPIRY_DAYS),
        }
    }
}
