//! Deed lifecycle rules.
//!
//! A deed's state is never stored. Whether it is open, filled, or waiting
//! on feedback is derived from its helper count, date, and completed flag
//! at query time, so there is only ever one source of truth.

use chrono::{DateTime, Duration, Utc};

use crate::models::Deed;

/// Home listing: deeds still looking for helpers with a date in the future
pub fn open_for_home(deed: &Deed, now: DateTime<Utc>) -> bool {
    (deed.helpers.len() as u32) < deed.helpers_needed && deed.date > now
}

/// Profile listing (as requester): deeds with at least one helper, or a
/// date still in the future
pub fn visible_on_profile(deed: &Deed, now: DateTime<Utc>) -> bool {
    !deed.helpers.is_empty() || deed.date > now
}

pub fn has_helper(deed: &Deed, username: &str) -> bool {
    deed.helpers.iter().any(|helper| helper == username)
}

/// A requester with a past-due deed that was never completed must settle
/// its feedback before posting another one
pub fn has_delinquent_deed(deeds: &[Deed], requester: &str, now: DateTime<Utc>) -> bool {
    deeds
        .iter()
        .any(|deed| deed.requester == requester && !deed.completed && now > deed.date)
}

/// Helpers may withdraw themselves while more than 24 hours remain before
/// the deed date
pub fn can_remove_self(deed: &Deed, now: DateTime<Utc>) -> bool {
    now <= deed.date - Duration::hours(24)
}

/// The requester may force-remove helpers only before the deed date
pub fn requester_may_remove_helpers(deed: &Deed, now: DateTime<Utc>) -> bool {
    now < deed.date
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn deed(date: DateTime<Utc>, helpers: &[&str], helpers_needed: u32, completed: bool) -> Deed {
        Deed {
            deed_id: "d1".into(),
            requester: "ana".into(),
            date,
            title: "Rake leaves".into(),
            description: "Front yard".into(),
            difficulty: Difficulty::Low,
            estimated_hours: 2,
            helpers_needed,
            helpers: helpers.iter().map(|h| h.to_string()).collect(),
            kudos: 20,
            latitude: 47.6,
            longitude: -122.3,
            location: "12 Elm St".into(),
            given_feedback: vec![],
            completed,
        }
    }

    fn now() -> DateTime<Utc> {
        "2023-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn home_listing_wants_unfilled_future_deeds() {
        let future = now() + Duration::days(3);
        assert!(open_for_home(&deed(future, &["bo"], 2, false), now()));
        assert!(!open_for_home(&deed(future, &["bo", "cy"], 2, false), now()));
        assert!(!open_for_home(&deed(now() - Duration::days(1), &[], 2, false), now()));
    }

    #[test]
    fn profile_listing_keeps_helped_or_future_deeds() {
        let past = now() - Duration::days(1);
        let future = now() + Duration::days(1);
        assert!(visible_on_profile(&deed(past, &["bo"], 2, false), now()));
        assert!(visible_on_profile(&deed(future, &[], 2, false), now()));
        assert!(!visible_on_profile(&deed(past, &[], 2, false), now()));
    }

    #[test]
    fn helper_membership() {
        let d = deed(now(), &["bo", "cy"], 3, false);
        assert!(has_helper(&d, "bo"));
        assert!(!has_helper(&d, "ana"));
    }

    #[test]
    fn past_due_uncompleted_deed_blocks_its_requester() {
        let overdue = deed(now() - Duration::hours(1), &[], 1, false);
        assert!(has_delinquent_deed(&[overdue], "ana", now()));
    }

    #[test]
    fn completed_or_future_deeds_are_not_delinquent() {
        let settled = deed(now() - Duration::days(1), &[], 1, true);
        let upcoming = deed(now() + Duration::days(1), &[], 1, false);
        assert!(!has_delinquent_deed(&[settled, upcoming], "ana", now()));
    }

    #[test]
    fn delinquency_only_counts_own_deeds() {
        let overdue = deed(now() - Duration::hours(1), &[], 1, false);
        assert!(!has_delinquent_deed(&[overdue], "bo", now()));
    }

    #[test]
    fn self_removal_allowed_outside_the_24h_window() {
        let d = deed(now() + Duration::hours(25), &["bo"], 1, false);
        assert!(can_remove_self(&d, now()));
    }

    #[test]
    fn self_removal_blocked_inside_the_24h_window() {
        let within = deed(now() + Duration::hours(23), &["bo"], 1, false);
        assert!(!can_remove_self(&within, now()));
        let on_the_date = deed(now(), &["bo"], 1, false);
        assert!(!can_remove_self(&on_the_date, now()));
    }

    #[test]
    fn requester_removal_stops_at_the_date() {
        let future = deed(now() + Duration::hours(1), &["bo"], 1, false);
        assert!(requester_may_remove_helpers(&future, now()));
        let due = deed(now(), &["bo"], 1, false);
        assert!(!requester_may_remove_helpers(&due, now()));
        let past = deed(now() - Duration::hours(1), &["bo"], 1, false);
        assert!(!requester_may_remove_helpers(&past, now()));
    }
}
