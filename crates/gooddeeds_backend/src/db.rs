use log::info;
use surrealdb::{
    engine::remote::ws::{Client, Ws},
    opt::auth::Root,
    Surreal,
};

use crate::models::{Deed, Reward, User};

pub type DBConnection = Surreal<Client>;

pub async fn connect(
    connection_string: &str,
    username: &str,
    password: &str,
    namespace: &str,
    database: &str,
) -> surrealdb::Result<DBConnection> {
    let db = Surreal::new::<Ws>(connection_string).await?;

    db.signin(Root { username, password }).await?;

    db.use_ns(namespace).use_db(database).await?;

    info!("Successfully connected to database");

    Ok(db)
}

/// Seed the static reward catalog. CREATE of an entry that already exists
/// errors, which is fine on re-run, so the result is ignored.
pub async fn migrate(db_conn: &DBConnection) {
    for reward in catalog() {
        let _res: surrealdb::Result<Option<Reward>> = db_conn
            .create(("Reward", reward.reward_id.as_str()))
            .content(&reward)
            .await;
    }
    info!("Reward catalog seeded");
}

fn catalog() -> Vec<Reward> {
    vec![
        Reward {
            reward_id: "coffee".into(),
            name: "Free coffee".into(),
            source: "Corner Cafe".into(),
            internal_source: false,
            description: "One free drip coffee, any size".into(),
            kudos_value: 20,
        },
        Reward {
            reward_id: "movie-night".into(),
            name: "Movie night ticket".into(),
            source: "GoodDeeds".into(),
            internal_source: true,
            description: "Admission to the monthly community movie night".into(),
            kudos_value: 40,
        },
        Reward {
            reward_id: "plant".into(),
            name: "Starter plant".into(),
            source: "Greenhouse Collective".into(),
            internal_source: false,
            description: "A potted succulent from the community greenhouse".into(),
            kudos_value: 30,
        },
        Reward {
            reward_id: "tool-rental".into(),
            name: "Tool library day pass".into(),
            source: "GoodDeeds".into(),
            internal_source: true,
            description: "Borrow anything from the tool library for a day".into(),
            kudos_value: 60,
        },
    ]
}

pub async fn find_user(db_conn: &DBConnection, username: &str) -> surrealdb::Result<Option<User>> {
    db_conn.select(("Users", username)).await
}

pub async fn find_user_by_phone(
    db_conn: &DBConnection,
    phone_number: &str,
) -> surrealdb::Result<Option<User>> {
    let mut res = db_conn
        .query("SELECT * FROM Users WHERE phone_number = $phone")
        .bind(("phone", phone_number))
        .await?;
    res.take(0)
}

pub async fn all_deeds(db_conn: &DBConnection) -> surrealdb::Result<Vec<Deed>> {
    db_conn.select("Deed").await
}

pub async fn find_deed(db_conn: &DBConnection, id: &str) -> surrealdb::Result<Option<Deed>> {
    db_conn.select(("Deed", id)).await
}

pub async fn update_deed(db_conn: &DBConnection, deed: &Deed) -> surrealdb::Result<Option<Deed>> {
    db_conn
        .update(("Deed", deed.deed_id.as_str()))
        .content(deed)
        .await
}

pub async fn all_rewards(db_conn: &DBConnection) -> surrealdb::Result<Vec<Reward>> {
    db_conn.select("Reward").await
}

pub async fn find_reward(db_conn: &DBConnection, id: &str) -> surrealdb::Result<Option<Reward>> {
    db_conn.select(("Reward", id)).await
}
