//! Mentorgate CLI entry point

mod cli;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use clap::Parser;
use mentorgate::navigation::NavigationEntry;
use mentorgate::roles::REGISTRY;
use mentorgate::storage::{PostgresConfig, PostgresStore};
use mentorgate::{access, GateConfig, Session};
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Only the database-backed commands need a connection
    let get_db_config = || -> Result<PostgresConfig> {
        if let Some(url) = &cli.database_url {
            PostgresConfig::from_url(url).context("Invalid DATABASE_URL")
        } else {
            PostgresConfig::from_env().context("DATABASE_URL not set")
        }
    };

    match cli.command {
        Commands::Roles => roles(),
        Commands::Nav { ref role, json } => nav(role, json),
        Commands::Check {
            ref role,
            ref feature,
        } => {
            let verdict = if access::can_access_feature(role, feature) {
                "allowed"
            } else {
                "denied"
            };
            println!("{} {} {}", role, feature, verdict);
            Ok(())
        }
        Commands::Route { ref role, ref path } => {
            let verdict = if access::has_access_to_route(role, path) {
                "allowed"
            } else {
                "denied"
            };
            println!("{} {} {}", role, path, verdict);
            Ok(())
        }
        Commands::Landing { ref role } => {
            println!("{}", access::get_dashboard_route(role));
            Ok(())
        }
        Commands::Resolve { ref subject } => resolve(get_db_config()?, subject).await,
        Commands::Watch { ref subject } => watch(get_db_config()?, subject).await,
        Commands::Init => init(get_db_config()?).await,
    }
}

fn roles() -> Result<()> {
    for profile in REGISTRY.profiles() {
        println!("{} ({})", profile.role, profile.role.label());
        println!("  {}", profile.role.description());
        println!("  Landing: {}", profile.landing_route);
        println!("  Features:");
        for key in profile.flags.granted() {
            println!("    {}", key);
        }
    }
    Ok(())
}

fn nav(role: &str, json: bool) -> Result<()> {
    let entries = access::get_navigation_for_role(role);

    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("(no navigation for role '{}')", role);
        return Ok(());
    }

    fn print_tree(entries: &[NavigationEntry], depth: usize) {
        for entry in entries {
            let badge = entry.badge.map(|b| format!(" [{}]", b)).unwrap_or_default();
            println!(
                "{:indent$}{:<20} {}{}",
                "",
                entry.name,
                entry.route,
                badge,
                indent = depth * 2
            );
            print_tree(entry.children, depth + 1);
        }
    }

    print_tree(entries, 0);
    Ok(())
}

async fn open_session(db_config: PostgresConfig) -> Result<Session> {
    let store = Arc::new(
        PostgresStore::new(db_config)
            .await
            .context("Failed to create database pool")?,
    );
    Ok(Session::with_backend(store, GateConfig::from_env()))
}

async fn resolve(db_config: PostgresConfig, subject: &str) -> Result<()> {
    let session = open_session(db_config).await?;

    let state = session.sign_in(subject).await?;
    println!("Subject: {}", subject);
    println!("Effective role: {}", state);
    println!("Landing: {}", session.landing_route());

    session.sign_out().await?;
    Ok(())
}

async fn watch(db_config: PostgresConfig, subject: &str) -> Result<()> {
    let session = open_session(db_config).await?;
    let mut changes = session.subscribe();

    let state = session.sign_in(subject).await?;
    println!("{} is {}", subject, state);
    changes.borrow_and_update();

    info!(subject = %subject, "Watching role changes, press Ctrl+C to stop");

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *changes.borrow_and_update();
                println!("{} is now {} (landing {})", subject, state, session.landing_route());
            }
            result = signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl+C")?;
                break;
            }
        }
    }

    session.sign_out().await?;
    Ok(())
}

async fn init(db_config: PostgresConfig) -> Result<()> {
    let store = PostgresStore::new(db_config)
        .await
        .context("Failed to create database pool")?;

    store.ping().await.context("Database not reachable")?;
    store.install_change_trigger().await?;

    println!("Role-change trigger installed");
    Ok(())
}
