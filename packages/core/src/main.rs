use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;

use tb_care_coordinator::api::{self, AppState};
use tb_care_coordinator::auth::{hash_password, AuthKeys, MIN_PASSWORD_LENGTH};
use tb_care_coordinator::cli::{Cli, Command};
use tb_care_coordinator::config::Config;
use tb_care_coordinator::db::create_pool;
use tb_care_coordinator::error::AppError;
use tb_care_coordinator::logging::init_logging;
use tb_care_coordinator::metrics::AppMetrics;
use tb_care_coordinator::models::Role;
use tb_care_coordinator::monitor::{MonitorConfig, SystemClock, TreatmentMonitor};
use tb_care_coordinator::repository::{NewUser, TbRepository};
use tb_care_coordinator::scheduler::{exit_code, run_lapse_sweeps, sweep_once};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()
        .and_then(|mut config| config.apply_cli(&cli).map(|()| config))
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    tracing::info!("Service started with config: {:?}", config);

    if let Err(err) = run(cli.command(), config).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: Config) -> Result<(), AppError> {
    let pool = create_pool(&config.database_url).await?;
    let repo = Arc::new(TbRepository::new(pool));

    let monitor = Arc::new(TreatmentMonitor::new(
        repo.clone(),
        Arc::new(SystemClock),
        MonitorConfig::with_grace_hours(config.lapse_grace_hours),
    ));
    let metrics = Arc::new(
        AppMetrics::new().map_err(|err| AppError::Internal(format!("metrics: {}", err)))?,
    );

    match command {
        Command::Sweep => {
            let report = sweep_once(&monitor, &metrics).await;
            if let Some(report) = &report {
                println!("{} (reset_count: {})", report.message, report.reset_count);
            }
            std::process::exit(exit_code(report.as_ref()));
        }
        Command::CreateUser {
            name,
            email,
            password,
            role,
        } => create_user(&repo, name, email, password, role).await,
        Command::Serve => serve(config, repo, monitor, metrics).await,
    }
}

async fn create_user(
    repo: &TbRepository,
    name: String,
    email: String,
    password: String,
    role: Role,
) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    let password_hash = hash_password(&password).map_err(|err| AppError::Internal(err.to_string()))?;

    let user = repo
        .insert_user(&NewUser {
            name,
            email,
            password_hash,
            role,
        })
        .await?;

    println!("Created {} account {} ({})", user.role, user.email, user.id);
    Ok(())
}

async fn serve(
    config: Config,
    repo: Arc<TbRepository>,
    monitor: Arc<TreatmentMonitor>,
    metrics: Arc<AppMetrics>,
) -> Result<(), AppError> {
    let scheduler = tokio::spawn(run_lapse_sweeps(
        monitor.clone(),
        metrics.clone(),
        config.sweep_interval_seconds,
    ));

    let state = Arc::new(AppState::new(
        repo,
        monitor,
        metrics,
        Arc::new(AuthKeys::new(&config.jwt_secret, config.token_ttl_hours)),
        Duration::from_secs(config.dashboard_cache_seconds),
    ));
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .map_err(|err| AppError::Config(format!("cannot bind {}: {}", config.bind_address, err)))?;
    tracing::info!("Listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .map_err(|err| AppError::Internal(format!("server error: {}", err)))?;

    scheduler.abort();
    tracing::info!("Server stopped");
    Ok(())
}
