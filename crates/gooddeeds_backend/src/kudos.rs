//! Kudos accounting.
//!
//! Kudos is an integer balance per user: spent to request help or acquire
//! rewards, earned by helping out. Every ledger mutation reads the stored
//! balance and writes the new one back as a point operation; if the write
//! fails the stored balance stays authoritative.
//!
//! Deed creation runs a two-step protocol: the requester is debited first,
//! then the deed is created. A failed create does not reverse the debit.

use anyhow::{anyhow, Result};
use log::debug;
use serde_json::json;

use crate::{
    db::DBConnection,
    models::{Difficulty, User},
};

/// Kudos one helper earns for a deed of the given difficulty and length
pub fn per_helper_kudos(difficulty: Difficulty, estimated_hours: u32) -> i64 {
    let rate = match difficulty {
        Difficulty::Low => 10,
        Difficulty::Medium => 20,
        Difficulty::High => 30,
    };
    rate * estimated_hours as i64
}

/// Total cost to the requester of posting a deed
pub fn deed_cost(difficulty: Difficulty, estimated_hours: u32, helpers_needed: u32) -> i64 {
    helpers_needed as i64 * per_helper_kudos(difficulty, estimated_hours)
}

/// Balance after an edit changed the cost of a deed: the requester is
/// credited when the cost shrank and debited when it grew
pub fn adjusted_balance(balance: i64, previous_cost: i64, new_cost: i64) -> i64 {
    balance + (previous_cost - new_cost)
}

async fn write_balance(db_conn: &DBConnection, username: &str, balance: i64) -> Result<i64> {
    let _updated: Option<User> = db_conn
        .update(("Users", username))
        .merge(json!({ "kudos": balance }))
        .await?;
    Ok(balance)
}

async fn stored_balance(db_conn: &DBConnection, username: &str) -> Result<i64> {
    let user: Option<User> = db_conn.select(("Users", username)).await?;
    let user = user.ok_or_else(|| anyhow!("no such user {username}"))?;
    Ok(user.kudos)
}

/// Debit `amount` kudos from the user, returning the new balance
pub async fn debit(db_conn: &DBConnection, username: &str, amount: i64) -> Result<i64> {
    let balance = stored_balance(db_conn, username).await? - amount;
    debug!("debit {amount} kudos from {username}, balance now {balance}");
    write_balance(db_conn, username, balance).await
}

/// Credit `amount` kudos to the user, returning the new balance
pub async fn credit(db_conn: &DBConnection, username: &str, amount: i64) -> Result<i64> {
    let balance = stored_balance(db_conn, username).await? + amount;
    debug!("credit {amount} kudos to {username}, balance now {balance}");
    write_balance(db_conn, username, balance).await
}

/// Settle the cost difference after a deed edit, returning the new balance
pub async fn adjust(
    db_conn: &DBConnection,
    username: &str,
    previous_cost: i64,
    new_cost: i64,
) -> Result<i64> {
    let balance = adjusted_balance(stored_balance(db_conn, username).await?, previous_cost, new_cost);
    debug!("adjust {username} for cost {previous_cost} -> {new_cost}, balance now {balance}");
    write_balance(db_conn, username, balance).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_helper_rates() {
        for hours in [1, 2, 5, 8] {
            assert_eq!(per_helper_kudos(Difficulty::Low, hours), 10 * hours as i64);
            assert_eq!(per_helper_kudos(Difficulty::Medium, hours), 20 * hours as i64);
            assert_eq!(per_helper_kudos(Difficulty::High, hours), 30 * hours as i64);
        }
    }

    #[test]
    fn cost_scales_linearly_with_helpers() {
        let one = deed_cost(Difficulty::High, 3, 1);
        assert_eq!(deed_cost(Difficulty::High, 3, 2), 2 * one);
        assert_eq!(deed_cost(Difficulty::High, 3, 5), 5 * one);
    }

    #[test]
    fn cost_examples_from_the_home_page() {
        // a fresh user holds 100 kudos: the first deed is out of reach,
        // the second leaves 80 behind
        assert_eq!(deed_cost(Difficulty::Medium, 5, 2), 200);
        assert_eq!(deed_cost(Difficulty::Low, 2, 1), 20);
    }

    #[test]
    fn edit_adjustment_debits_increases() {
        assert_eq!(adjusted_balance(100, 100, 150), 50);
    }

    #[test]
    fn edit_adjustment_credits_decreases() {
        assert_eq!(adjusted_balance(100, 100, 60), 140);
    }

    #[test]
    fn edit_adjustment_is_a_noop_when_cost_is_unchanged() {
        assert_eq!(adjusted_balance(70, 120, 120), 70);
    }
}
