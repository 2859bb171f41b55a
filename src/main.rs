//! ARFollow client entrypoint: opens the local cache, signs in with the
//! credentials from the environment and refreshes the cached listings.

use std::env;

use anyhow::Context;
use tokio::runtime::Handle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arfollow::{
    config::AppConfig,
    dao::PersistenceStack,
    error::{ApiError, Outcome, StatusReport},
    services::{data_manager::DataManager, ui_dispatch::UiDispatcher},
    state::ClientContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let stack = PersistenceStack::open(&config.store_path)
        .await
        .with_context(|| format!("opening local store {}", config.store_path.display()))?;
    let ctx = ClientContext::new(config, stack).context("building http client")?;
    let manager = DataManager::new(ctx);

    let (Ok(username), Ok(password)) = (env::var("ARFOLLOW_USERNAME"), env::var("ARFOLLOW_PASSWORD"))
    else {
        info!("no credentials in environment; cache left as is");
        return Ok(());
    };

    let login = manager.login(&username, &password).await;
    print_report("login", &login);
    if login.is_err() {
        return Ok(());
    }

    // Refresh in the background and report on the UI queue, like the app does.
    let (dispatcher, queue) = UiDispatcher::new(Handle::current());
    let courses = manager.clone();
    dispatcher.dispatch(async move { courses.retrieve_courses().await }, |result| {
        print_report("courses", &result)
    });
    let classes = manager.clone();
    dispatcher.dispatch(async move { classes.retrieve_classes().await }, |result| {
        print_report("classes", &result)
    });
    let clues = manager.clone();
    dispatcher.dispatch(async move { clues.retrieve_clues().await }, |result| {
        print_report("clues", &result)
    });
    let games = manager.clone();
    dispatcher.dispatch(async move { games.retrieve_games().await }, |result| {
        print_report("games", &result)
    });
    drop(dispatcher);
    queue.run().await;

    manager.logout().await;
    Ok(())
}

fn print_report(label: &str, result: &Result<Outcome, ApiError>) {
    let report = StatusReport::from(result);
    match result {
        Ok(_) => info!(operation = label, message = %report.message, count = ?report.count, "done"),
        Err(err) => warn!(operation = label, error = %err, message = %report.message, "failed"),
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
