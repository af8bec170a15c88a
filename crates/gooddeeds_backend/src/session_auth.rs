use std::{collections::HashMap, sync::Arc};

use axum_login::{memory_store::MemoryStore as AuthMemoryStore, secrecy::SecretVec};
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Map backing the in-memory auth store. `AppState` keeps a handle so
/// signup and login can register identities.
pub type AuthUserStore = Arc<RwLock<HashMap<String, AuthUser>>>;

pub type AuthContext =
    axum_login::extractors::AuthContext<String, AuthUser, AuthMemoryStore<String, AuthUser>>;

/// Identity carried by the session cookie. Handlers pass this into the
/// validation chain explicitly instead of core logic reading session
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    /// Username of the signed in user
    pub id: String,
}

impl axum_login::AuthUser<String> for AuthUser {
    fn get_id(&self) -> String {
        self.id.clone()
    }

    fn get_password_hash(&self) -> SecretVec<u8> {
        // credentials are checked by the login route, not the session layer
        SecretVec::new(self.id.clone().into())
    }
}

/// Register the identity with the auth store and attach it to the session
pub async fn login(
    auth: &mut AuthContext,
    store: &AuthUserStore,
    username: &str,
) -> anyhow::Result<()> {
    let auth_user = AuthUser {
        id: username.to_string(),
    };
    store
        .write()
        .await
        .insert(auth_user.id.clone(), auth_user.clone());
    auth.login(&auth_user)
        .await
        .map_err(|err| anyhow::anyhow!("session login failed: {err}"))?;
    debug!("session opened for {username}");
    Ok(())
}
