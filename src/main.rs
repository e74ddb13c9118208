use clap::{Parser, Subcommand};

mod app;
mod auth;
mod config;
mod mail;
mod state;
mod users;

use crate::{auth::password::generate_password, config::AppConfig, state::AppState};

#[derive(Parser)]
#[command(name = "useradmin", about = "User account administration service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Create the initial administrator account.
    Install {
        #[arg(long, env = "ADMIN_EMAIL", default_value = "admin@useradmin.local")]
        email: String,
        /// Generated and printed once when omitted.
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "useradmin=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let (app_state, db) = AppState::init(config).await?;

    sqlx::migrate!("./migrations").run(&db).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let addr = app_state.config.listen_addr()?;
            let shutdown = app_state.shutdown.clone();
            let app = app::build_app(app_state);
            app::serve(app, addr, shutdown).await?;
        }
        Command::Install { email, password } => {
            let generated = password.is_none();
            let password = password.unwrap_or_else(generate_password);
            let admin = users::services::install_admin(&app_state, &email, &password).await?;
            println!("Admin user created: {} (id {})", admin.email, admin.id);
            if generated {
                println!("Generated password: {password}");
            }
        }
    }

    Ok(())
}
