//! Icebox server binary.
//!
//! `iceboxd serve` runs the HTTP API; the remaining subcommands are
//! administrative operations that open the database directly.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use icebox_core::config::ServerConfig;
use icebox_server::auth::{generate_salt, salted_password_hash};
use icebox_server::{AppState, create_router};
use icebox_store::Store;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Icebox - a chunked, quota-accounted file synchronization server
#[derive(Parser, Debug)]
#[command(name = "iceboxd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "ICEBOX_CONFIG", default_value = "icebox.toml")]
    config: String,

    /// Database path (overrides configuration)
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve,
    /// Add a new user to storage
    AddUser {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        password: String,
        /// Quota size in bytes
        #[arg(short, long, default_value_t = 1_000_000_000)]
        quota: i64,
    },
    /// Remove a user and everything they own
    RmUser {
        #[arg(short, long)]
        name: String,
    },
    /// Modify a user's password, quota, or name
    ModUser {
        #[arg(short, long)]
        name: String,
        #[arg(long)]
        new_password: Option<String>,
        #[arg(long)]
        new_quota: Option<i64>,
        #[arg(long)]
        new_name: Option<String>,
    },
    /// Print a user's quota, allocation, and revision counters
    UserStats {
        #[arg(short, long)]
        name: String,
    },
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut figment = Figment::new();
    if std::path::Path::new(&args.config).exists() {
        figment = figment.merge(Toml::file(&args.config));
    }
    let mut config: ServerConfig = figment
        .merge(Env::prefixed("ICEBOX_"))
        .extract()
        .context("failed to load configuration")?;
    if let Some(db) = &args.db {
        config.database_path = db.clone();
    }
    Ok(config)
}

async fn open_store(config: &ServerConfig) -> Result<Store> {
    Store::open(&config.database_path, config.chunk_size)
        .await
        .with_context(|| {
            format!(
                "failed to open database at {}",
                config.database_path.display()
            )
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args)?;

    match args.command {
        Commands::Serve => serve(config).await,
        Commands::AddUser {
            name,
            password,
            quota,
        } => add_user(config, &name, &password, quota).await,
        Commands::RmUser { name } => {
            let store = open_store(&config).await?;
            store.remove_user(&name).await?;
            println!("removed user {name}");
            Ok(())
        }
        Commands::ModUser {
            name,
            new_password,
            new_quota,
            new_name,
        } => mod_user(config, &name, new_password, new_quota, new_name).await,
        Commands::UserStats { name } => {
            let store = open_store(&config).await?;
            let user = store.get_user(&name).await?;
            let quota = store.get_user_quota(user.user_id).await?;
            let info = store.get_user_info(user.user_id).await?;
            println!("user:      {name}");
            println!("quota:     {quota}");
            println!("allocated: {}", info.allocated);
            println!("revision:  {}", info.revision);
            Ok(())
        }
    }
}

async fn serve(config: ServerConfig) -> Result<()> {
    tracing::info!("Icebox v{}", env!("CARGO_PKG_VERSION"));

    let store = open_store(&config).await?;
    store.health_check().await.context("database health check failed")?;
    tracing::info!(
        database = %config.database_path.display(),
        chunk_size = config.chunk_size,
        "storage opened"
    );

    let purged = store.purge_expired_tokens().await?;
    if purged > 0 {
        tracing::info!(purged, "purged expired session tokens");
    }

    let addr: SocketAddr = config.bind.parse().context("invalid bind address")?;
    let state = AppState::new(config, Arc::new(store));
    let app = create_router(state);

    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn add_user(config: ServerConfig, name: &str, password: &str, quota: i64) -> Result<()> {
    let store = open_store(&config).await?;
    if !store.is_username_free(name).await? {
        anyhow::bail!("username '{name}' is already taken");
    }

    let salt = generate_salt();
    let salted_hash = salted_password_hash(&salt, password);
    let user = store.add_user(name, &salt, &salted_hash).await?;
    store.set_user_quota(user.user_id, quota).await?;
    store.set_user_info(user.user_id, 0, 0).await?;

    println!("added user {name} (id {}) with quota {quota}", user.user_id);
    Ok(())
}

async fn mod_user(
    config: ServerConfig,
    name: &str,
    new_password: Option<String>,
    new_quota: Option<i64>,
    new_name: Option<String>,
) -> Result<()> {
    let store = open_store(&config).await?;
    let user = store.get_user(name).await?;

    if let Some(password) = new_password {
        let salt = generate_salt();
        let salted_hash = salted_password_hash(&salt, &password);
        store
            .set_user_password(user.user_id, &salt, &salted_hash)
            .await?;
        println!("updated password for {name}");
    }
    if let Some(quota) = new_quota {
        store.set_user_quota(user.user_id, quota).await?;
        println!("updated quota for {name} to {quota}");
    }
    if let Some(new_name) = new_name {
        store.rename_user(user.user_id, &new_name).await?;
        println!("renamed {name} to {new_name}");
    }
    Ok(())
}
