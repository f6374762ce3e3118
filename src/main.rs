use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use openbook_gateway::config::{Cli, Command, ServeArgs, StreakArgs};
use openbook_gateway::state::AppState;
use openbook_gateway::storage::JsonFileStorage;
use openbook_gateway::streak::{StreakTracker, StreakWatcher};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Streak(args) => streak(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let state = Arc::new(AppState::from_args(&args));
    let app = openbook_gateway::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(port = args.port, "gateway running on http://localhost:{}", args.port);
    tracing::info!(chat_url = %args.chat_url, "forwarding study requests");
    tracing::info!(
        "rate limit: {} requests per {} seconds",
        args.rate_limit,
        args.rate_window
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("server error")?;
    Ok(())
}

async fn streak(args: StreakArgs) -> anyhow::Result<()> {
    let tracker = Arc::new(StreakTracker::new(JsonFileStorage::open(&args.store)));
    tracing::debug!(store = %tracker.storage().path().display(), "using streak store");
    if args.reset {
        tracker.reset();
    }

    if !args.watch {
        report(&tracker, tracker.calculate());
        return Ok(());
    }

    let watcher = StreakWatcher::spawn(Arc::clone(&tracker), Duration::from_secs(args.interval.max(1)));
    let mut rx = watcher.subscribe();
    report(&tracker, watcher.current());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let streak = *rx.borrow_and_update();
                report(&tracker, streak);
            }
        }
    }
    Ok(())
}

fn report(tracker: &StreakTracker<JsonFileStorage>, streak: u32) {
    println!("{}", streak);
    if let Some(milestone) = tracker.celebrate(streak) {
        println!("{} day streak!", milestone);
    }
}
