//! Token Service - Entry Point

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use token_service::{
    Config, MemoryCore, MemorySessionStore, TokenServer,
    config::{ClientSeed, defaults},
    server::transport::HttpState,
};

#[derive(Parser, Debug)]
#[command(name = "token-service")]
#[command(about = "OAuth 2.0 token service with a two-step login handshake")]
#[command(version)]
struct Cli {
    /// HTTP server port
    #[arg(short = 'p', long, default_value_t = defaults::PORT, env = "PORT")]
    port: u16,

    /// Origin of the login front-end
    #[arg(long, default_value = defaults::FRONTEND_HOST, env = "FRONTEND_HOST")]
    frontend_host: String,

    /// Id of the seeded OAuth client
    #[arg(short = 'i', long, default_value = defaults::CLIENT_ID, env = "CLIENT_ID")]
    client_id: String,

    /// Secret of the seeded OAuth client
    #[arg(short = 's', long, default_value = defaults::CLIENT_SECRET, env = "CLIENT_SECRET")]
    client_secret: String,

    /// Redirect domain of the seeded OAuth client
    #[arg(short = 'r', long, default_value = defaults::CLIENT_DOMAIN, env = "CLIENT_DOMAIN")]
    client_domain: String,

    /// Log handshake requests (method, URI, headers, body)
    #[arg(
        short = 'd',
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "DUMP_REQUESTS"
    )]
    dump_requests: bool,

    /// Number of digits in a confirmation code
    #[arg(long, default_value_t = defaults::CONFIRM_CODE_DIGITS)]
    confirm_code_digits: u32,

    /// Confirmation code lifetime in seconds
    #[arg(long, default_value_t = defaults::CONFIRM_CODE_TTL.as_secs())]
    confirm_code_ttl_secs: u64,

    /// Wrong codes allowed before a pending login is dropped
    #[arg(long, default_value_t = defaults::MAX_CONFIRM_ATTEMPTS)]
    max_confirm_attempts: u32,

    /// Mark the session cookie `Secure`
    #[arg(long)]
    secure_cookies: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        let mut config = Config::new(
            self.frontend_host,
            ClientSeed { id: self.client_id, secret: self.client_secret, domain: self.client_domain },
        );
        config.port = self.port;
        config.dump_requests = self.dump_requests;
        config.confirm_code_digits = self.confirm_code_digits;
        config.confirm_code_ttl = Duration::from_secs(self.confirm_code_ttl_secs);
        config.max_confirm_attempts = self.max_confirm_attempts;
        config.secure_cookies = self.secure_cookies;
        config
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    let config = cli.into_config();
    config.validate()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        frontend_host = %config.frontend_host,
        client_id = %config.client.id,
        dump_requests = config.dump_requests,
        "Starting token service"
    );

    let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
    Arc::clone(&sessions).start_cleanup_task();

    let core = Arc::new(MemoryCore::from_config(&config).await);
    Arc::clone(&core).start_cleanup_task();

    TokenServer::new(HttpState::new(config, sessions, core)).run_http().await
}
