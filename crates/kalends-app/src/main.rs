//! Agenda runner: fetches one configured feed and prints the upcoming
//! events, exercising the full fetch, parse, expand, cache pipeline.

use std::path::Path;
use std::time::Duration;

use kalends_core::config::load_config;
use kalends_rfc::tz::TzDb;
use kalends_service::feed::CalendarFeed;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (filter_layer, filter_handle) = reload::Layer::new(EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .init();

    let config = load_config()?;

    if let Ok(filter) = EnvFilter::try_new(config.logging.level.as_str()) {
        if let Err(e) = filter_handle.modify(|current| *current = filter) {
            tracing::warn!(error = %e, "Failed to update log filter from config");
        }
    } else {
        tracing::warn!(level = %config.logging.level, "Invalid log level in config, keeping info");
    }

    let Some(url) = config.feed.url.clone() else {
        anyhow::bail!("no feed url configured; set FEED_URL or feed.url in config.toml");
    };

    let tz = TzDb::load_from_path(
        Path::new(&config.feed.timezone_table),
        Duration::from_secs(config.limits.tz_load_timeout_seconds),
    );
    tracing::info!(zones = tz.len(), "Timezone table ready");

    let mut feed = CalendarFeed::new(tz, config.limits.clone());
    let events = feed
        .get_events(&url, config.feed.max_events, None, config.feed.window_days)
        .await;

    if events.is_empty() {
        println!("No upcoming events.");
    } else {
        for event in &events {
            println!("{event}");
        }
    }

    Ok(())
}
