//! Feeds Auth - token issuance for feeds
//!
//! Runs the token server or acts as an operator tool for issuing, verifying
//! and using tokens.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::{Value, json};
use tracing::{error, info};

use feeds_auth::{
    cli::{Cli, Command, TokenCommand},
    config::Config,
    feeds::{AuthorizationEngine, AuthorizationRequest, FeedPath, HmacSigner, TenantIdentity, sync_predicate},
    platform::FeedsClient,
    server::TokenServer,
    setup_tracing,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Some(Command::Serve) | None => run_server(config).await,
        Some(Command::Token(cmd)) => run_token_command(&config, cmd).await,
        Some(Command::Verify { token }) => run_verify(&config, &token),
        Some(Command::Publish { feed, item }) => run_publish(&config, &feed, &item).await,
        Some(Command::Delete { feed }) => run_delete(&config, &feed).await,
        Some(Command::List { limit, prefix }) => run_list(&config, limit, prefix.as_deref()).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> feeds_auth::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    // Apply CLI overrides
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    Ok(config)
}

fn engine(config: &Config) -> anyhow::Result<Arc<AuthorizationEngine>> {
    Ok(Arc::new(AuthorizationEngine::from_config(config)?))
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.server.port,
        rules = config.policy.rules.len(),
        "Starting token server"
    );

    TokenServer::new(config)?.run().await?;

    info!("Token server shutdown complete");
    Ok(())
}

async fn run_token_command(config: &Config, cmd: TokenCommand) -> anyhow::Result<()> {
    let engine = engine(config)?;
    let now = engine.now();

    let (token, expires_at) = match cmd {
        TokenCommand::Server => {
            let token = engine.server_token().await?;
            let expires_at = engine
                .server_cache()
                .current()
                .map_or(now, |credential| credential.expires_at);
            (token, expires_at)
        }
        TokenCommand::Client { feed, subject } => {
            let path = FeedPath::for_feed(&feed)?;
            let mut request = AuthorizationRequest::new("READ", path.as_str());
            if let Some(subject) = subject {
                request = request.with_subject(subject);
            }
            // The operator is trusted: every well-formed request is granted.
            let credential = engine
                .authorize(&request, &sync_predicate(|_, _| true))
                .await?;
            (credential.token, credential.expires_at)
        }
    };

    println!("{token}");
    eprintln!(
        "expires at {} (in {}s)",
        format_timestamp(expires_at),
        expires_at.saturating_sub(now)
    );
    Ok(())
}

fn run_verify(config: &Config, token: &str) -> anyhow::Result<()> {
    let tenant = TenantIdentity::from_config(&config.service)?;
    let signer = HmacSigner::new(&tenant, config.tokens.issuer_prefix.clone());
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    let claims = signer.verify(token, now)?;

    let output = json!({
        "subject": claims.subject,
        "action": claims.scope.action,
        "path": claims.scope.path,
        "issuer": claims.issuer,
        "issued_at": format_timestamp(claims.issued_at),
        "expires_at": format_timestamp(claims.expires_at),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_publish(config: &Config, feed: &str, item: &str) -> anyhow::Result<()> {
    let item: Value = serde_json::from_str(item)?;
    let client = FeedsClient::new(engine(config)?)?;
    let response = client.publish(feed, item).await?;
    println!("✅ Published to {feed}");
    if !response.is_null() {
        println!("{}", serde_json::to_string_pretty(&response)?);
    }
    Ok(())
}

async fn run_delete(config: &Config, feed: &str) -> anyhow::Result<()> {
    let client = FeedsClient::new(engine(config)?)?;
    client.delete(feed).await?;
    println!("✅ Deleted all items of {feed}");
    Ok(())
}

async fn run_list(config: &Config, limit: Option<u32>, prefix: Option<&str>) -> anyhow::Result<()> {
    let client = FeedsClient::new(engine(config)?)?;
    let feeds = client.list(limit, prefix).await?;
    println!("{}", serde_json::to_string_pretty(&feeds)?);
    Ok(())
}

fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map_or_else(|| secs.to_string(), |t| t.to_rfc3339())
}
