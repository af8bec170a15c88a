use std::{collections::HashMap, env, net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{http::header, Router};
use axum_login::{
    axum_sessions::{async_session::MemoryStore as SessionMemoryStore, SameSite, SessionLayer},
    memory_store::MemoryStore as AuthMemoryStore,
    AuthLayer,
};
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use db::DBConnection;
use log::{debug, info, warn};
use rand::Rng;
use session_auth::AuthUserStore;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

mod api;
mod db;
mod geo;
mod kudos;
mod lifecycle;
mod middleware;
mod models;
mod session_auth;
mod utils;

#[derive(Clone)]
pub struct AppState {
    db_conn: DBConnection,
    /// Handle to the auth user store so signup and login can register
    /// session identities
    auth_store: AuthUserStore,
}

impl AppState {
    pub async fn init(auth_store: AuthUserStore) -> AppState {
        let db_conn = db::connect(
            &env::var("DB_URL").expect("Couldn't get DB_URL env var"),
            &env::var("DB_USERNAME").expect("Couldn't get DB_USERNAME env var"),
            &env::var("DB_PASSWORD").expect("Couldn't get DB_PASSWORD env var"),
            &env::var("DB_NAMESPACE").expect("Couldn't get DB_NAMESPACE env var"),
            &env::var("DB_DATABASE").expect("Couldn't get DB_DATABASE env var"),
        )
        .await
        .unwrap();

        db::migrate(&db_conn).await;

        AppState {
            db_conn,
            auth_store,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gooddeeds")]
#[command(bin_name = "gooddeeds")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Flag to disable HTTPS
    #[arg(long)]
    no_https: bool,
}

#[tokio::main]
async fn main() {
    env_logger::builder().format_timestamp(None).init();

    let cli = Cli::parse();

    if dotenvy::dotenv().is_err() {
        warn!("Error reading .env file");
    } else {
        debug!("Loaded env vars from .env");
    }

    let store: AuthUserStore = Arc::new(RwLock::new(HashMap::default()));
    let app_state = AppState::init(store.clone()).await;

    let secret = rand::thread_rng().gen::<[u8; 64]>();

    let session_store = SessionMemoryStore::new();
    let session_layer = SessionLayer::new(session_store, &secret)
        .with_secure(true)
        .with_http_only(false)
        .with_same_site_policy(SameSite::None);

    let user_store = AuthMemoryStore::new(&store);
    let auth_layer = AuthLayer::new(user_store, &secret);

    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "https://localhost:3000".parse().unwrap(),
        "https://gooddeeds.community".parse().unwrap(),
    ];
    let cors = CorsLayer::new()
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .allow_origin(origins)
        .allow_credentials(true);

    let app = Router::new()
        .merge(api::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(auth_layer)
        .layer(session_layer);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3001));
    if cli.no_https {
        info!("Starting server with HTTPS disabled...");

        axum_server::bind(addr)
            .serve(app.into_make_service())
            .await
            .unwrap();
    } else {
        info!("Starting server with HTTPS...");

        let rustls_config = RustlsConfig::from_pem_file(
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("..")
                .join("..")
                .join("certs")
                .join("cert.pem"),
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("..")
                .join("..")
                .join("certs")
                .join("key.pem"),
        )
        .await
        .unwrap();

        axum_server::bind_rustls(addr, rustls_config)
            .serve(app.into_make_service())
            .await
            .unwrap();
    }
}
