use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use virtue_authz::app::Services;
use virtue_authz::authz::AuthzConfig;
use virtue_authz::cache::SystemClock;
use virtue_authz::db::{self, SqliteProfileStore};
use virtue_authz::events::{init_event_bus, start_audit_listener};
use virtue_authz::jwt::JwtConfig;
use virtue_authz::models::profile::{Profile, Role};

#[derive(Parser, Debug)]
#[command(author, version, about = "virtue authorization admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Insert a profile (account bootstrap; role changes afterwards go through assign-role)
    CreateProfile {
        #[arg(long)]
        id: Option<Uuid>,
        #[arg(long)]
        name: Option<String>,
        /// Comma-separated role names
        #[arg(long, value_delimiter = ',', default_value = "practitioner")]
        roles: Vec<Role>,
        #[arg(long)]
        organization: Option<Uuid>,
    },
    /// Add a role to a user, acting as `--actor`
    AssignRole {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        actor: Uuid,
    },
    /// Remove a role from a user, acting as `--actor`
    RemoveRole {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        actor: Uuid,
    },
    /// List a user's effective permissions
    Permissions {
        #[arg(long)]
        user: Uuid,
    },
    /// Evaluate a single permission check
    Check {
        #[arg(long)]
        user: Uuid,
        #[arg(long)]
        resource: String,
        #[arg(long)]
        action: String,
        #[arg(long)]
        resource_id: Option<Uuid>,
    },
    /// Print a bearer token for a user
    IssueToken {
        #[arg(long)]
        user: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; fall back to the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            db::migrate(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            print_status(&pool).await?;
        }
        Commands::CreateProfile {
            id,
            name,
            roles,
            organization,
        } => {
            let pool = get_pool().await?;
            let mut profile = Profile::new(id.unwrap_or_else(Uuid::new_v4)).with_roles(roles);
            profile.full_name = name;
            profile.organization_id = organization;
            SqliteProfileStore::new(pool).insert(&profile).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::AssignRole { user, role, actor } => {
            let profile = with_services(|services| async move {
                Ok(services.roles.assign_role(user, role, actor).await?)
            })
            .await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::RemoveRole { user, role, actor } => {
            let profile = with_services(|services| async move {
                Ok(services.roles.remove_role(user, role, actor).await?)
            })
            .await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Permissions { user } => {
            let permissions = with_services(|services| async move {
                Ok(services.permissions.get_user_permissions(user).await)
            })
            .await?;
            for p in permissions {
                println!("{}:{}\t{}", p.resource, p.action, serde_json::to_string(&p.condition)?);
            }
        }
        Commands::Check {
            user,
            resource,
            action,
            resource_id,
        } => {
            let allowed = with_services(|services| async move {
                Ok(services
                    .permissions
                    .has_permission(user, &resource, &action, resource_id)
                    .await)
            })
            .await?;
            println!("{}", if allowed { "allowed" } else { "denied" });
            if !allowed {
                std::process::exit(1);
            }
        }
        Commands::IssueToken { user } => {
            let jwt = JwtConfig::from_env()?;
            println!("{}", jwt.encode(user)?);
        }
    }

    Ok(())
}

/// Runs `f` against freshly wired services and waits for its audit events
/// to be written before returning.
async fn with_services<T, F, Fut>(f: F) -> anyhow::Result<T>
where
    F: FnOnce(Services) -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let pool = get_pool().await?;
    let (events, rx) = init_event_bus();
    let listener = tokio::spawn(start_audit_listener(rx, pool.clone()));

    let services = Services::sqlite(&pool, AuthzConfig::from_env()?, Arc::new(SystemClock), events);
    let result = f(services).await;

    // every sender is gone once `f` returns; the listener drains and exits
    listener.await.context("audit listener panicked")?;
    result
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} Name", "Status", "Version");
    for migration in sqlx::migrate!().iter() {
        let status = if applied_versions.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}
