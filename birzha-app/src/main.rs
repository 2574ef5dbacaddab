mod controllers;
mod entity;
mod http;

use crate::controllers::message::MessageDbController;
use crate::controllers::user::UserDbController;
use birzha_core::gate::NotificationGate;
use birzha_core::pipeline::SendPipeline;
use birzha_core::relay::NotificationRelay;
use birzha_core::resolver::UserDirectory;
use birzha_core::store::MessageStore;
use birzha_telegram::TelegramRelay;
use clap::Parser;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

#[derive(Parser, Debug)]
struct Args {
    #[clap(long, env = "BIRZHA_DB")]
    db: Url,
    #[clap(long, env = "BOT_TOKEN")]
    bot_token: Option<String>,
    /// Base URL of the Mini-App front-end, used for reply links and the
    /// web-app keyboard buttons.
    #[clap(long, env = "WEBAPP_URL")]
    webapp_url: Url,
    /// Externally reachable base URL of this service, for webhook setup.
    #[clap(long, env = "BIRZHA_PUBLIC_URL")]
    public_url: Option<Url>,
    #[clap(long, env = "BIRZHA_HTTP_BIND", default_value = "[::]:8000")]
    bind: SocketAddr,
    /// Recipient references that never receive notifications.
    #[clap(long, env = "BIRZHA_DENY_LIST", value_delimiter = ',')]
    deny_list: Vec<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "h2=warn,info");
    }

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    debug!("Config: {:#?}", args);

    if args.bot_token.is_none() {
        warn!("BOT_TOKEN is not set. Messages will be stored, but no Telegram notifications will be sent.");
    }

    // Initialize db connection
    create_sqlite_if_not_exists(&args.db);
    let mut db_conn_options = ConnectOptions::new(args.db.to_string());
    db_conn_options.sqlx_logging_level(log::LevelFilter::Debug);
    let db_connection = Database::connect(db_conn_options).await.unwrap();

    Migrator::up(&db_connection, None).await.unwrap();

    // Storages
    let users = Arc::new(UserDbController::new(db_connection.clone()));
    let store = Arc::new(MessageDbController::new(db_connection.clone()));

    let relay = args
        .bot_token
        .as_deref()
        .map(|token| Arc::new(TelegramRelay::new(token, args.webapp_url.clone())));

    let gate = NotificationGate::new(args.deny_list.iter().filter(|s| !s.is_empty()).cloned());

    let pipeline = Arc::new(SendPipeline::new(
        store.clone() as Arc<dyn MessageStore>,
        users.clone() as Arc<dyn UserDirectory>,
        relay.clone().map(|r| r as Arc<dyn NotificationRelay>),
        gate,
    ));

    info!("Starting HTTP server on {}", args.bind);
    http::start(
        args.bind,
        http::HttpExtensions {
            pipeline,
            users,
            relay,
            public_url: args.public_url,
        },
    )
    .await;

    let _ = tokio::signal::ctrl_c().await;
}

fn create_sqlite_if_not_exists(db_url: &Url) {
    if db_url.scheme() == "sqlite" {
        let url_string = db_url.to_string();
        let path = url_string
            .trim_start_matches("sqlite://")
            .split('?')
            .next()
            .unwrap_or_default();
        let _ = OpenOptions::new().create_new(true).append(true).open(path);
    }
}
