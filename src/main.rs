use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kinetic_bot::{
    AppState, BotError,
    config::{Args, Command, Settings},
    handlers,
    jobs::{self, Job},
    worker,
};

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // parse cli arguments
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exiting");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), BotError> {
    args.validate()?;
    let state = Arc::new(AppState::new(Settings::from(&args))?);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Run { job } => {
            let report = jobs::run(&state, Job::from(job)).await?;
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| BotError::Config(format!("unprintable report: {e}")))?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn serve(state: Arc<AppState>) -> Result<(), BotError> {
    let settings = &state.settings;

    // spawn the background sweeper
    tokio::spawn(worker::sweeper(
        Arc::clone(&state.cache),
        Arc::clone(&state.cooldown),
        settings.sweep_interval,
    ));

    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(port = settings.port, environment = %settings.environment, "bot running");
    tracing::info!(
        daily_ceiling = settings.limits.daily_ceiling(),
        max_posts_per_hour = settings.limits.max_posts_per_hour,
        "limits"
    );

    let app = handlers::router(Arc::clone(&state));
    axum::serve(listener, app).await?;
    Ok(())
}
