//! # Vlaamse Chroniqueur
//!
//! Weekly production package generator for a Flemish history video channel.
//!
//! ## Pipeline
//!
//! 1. **Topic**: ask the language model for one topic, given the topics already covered
//! 2. **Weather**: geocode the filming location and pick the best of Monday, Wednesday and Friday
//! 3. **Script**: ask for the shooting plan, bilingual script, editing guide and resources
//! 4. **Images**: search Wikimedia Commons for illustrations
//! 5. **Document**: build a formatted Google Doc and share it
//! 6. **Notify**: post a summary to Discord
//!
//! ## Usage
//!
//! ```sh
//! vlaamse_chroniqueur --google-access-token "$TOKEN" -j ./packages
//! ```

use awful_aj::{config, config_dir, template};
use chrono::{Local, NaiveDate};
use clap::Parser;
use reqwest::Client;
use std::error::Error;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod discord;
mod docs;
mod error;
mod generator;
mod models;
mod outputs;
mod settings;
mod utils;
mod weather;
mod wikimedia;

use cli::Cli;
use docs::requests::{batches, build_style_requests};
use docs::{GoogleDocsClient, assemble, create_weekly_doc, get_past_topics};
use models::ScriptPackage;
use outputs::json;
use settings::Settings;
use utils::{ensure_writable_dir, filming_week, upcoming_filming_dates};
use weather::{WeatherClient, fallback_weather, select_best_filming_day};
use wikimedia::{CommonsClient, build_image_queries};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args.week_start, ?args.package, dry_run = args.dry_run, "Parsed CLI arguments");

    let settings = Settings::load(args.settings.as_deref()).await?;
    let http = Client::builder().timeout(settings.request_timeout()).build()?;

    let week_start = args
        .week_start
        .unwrap_or_else(|| upcoming_filming_dates(Local::now().date_naive())[0]);
    info!(%week_start, "Producing weekly package");

    if let Some(dir) = args.json_output_dir.as_deref() {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Package output directory is not writable");
            return Err(e);
        }
    }

    let docs_client = args
        .google_access_token
        .as_deref()
        .map(|token| GoogleDocsClient::new(http.clone(), token));

    let package = match args.package.as_deref() {
        Some(path) => json::read_package(path).await?,
        None => generate_package(&args, &settings, &http, docs_client.as_ref(), week_start).await?,
    };

    if let Some(dir) = args.json_output_dir.as_deref() {
        if let Err(e) = json::write_package(&package, dir, week_start).await {
            error!(error = %e, "Failed to archive script package");
        }
    }

    if args.dry_run {
        package.validate()?;
        let layout = assemble(week_start, &package, &settings.channel_name);
        let requests = build_style_requests(&layout.events);
        info!(
            units = layout.len,
            events = layout.events.len(),
            style_requests = requests.len(),
            style_batches = batches(&requests, settings.style_batch_size).count(),
            images = layout.slots.len(),
            "Dry run: document layout assembled"
        );
        return Ok(());
    }

    let docs_client = docs_client.ok_or("GOOGLE_ACCESS_TOKEN is required unless --dry-run is given")?;
    info!("Creating Google Doc");
    let doc_url = create_weekly_doc(
        &docs_client,
        &settings.build_options(args.folder_id()),
        week_start,
        &package,
    )
    .await?;
    info!(%doc_url, "Document ready");

    let message = discord::build_message(&settings.channel_name, week_start, &package, &doc_url);
    if let Err(e) = discord::post_to_discord(&http, args.discord_webhook_url.as_deref(), &message).await {
        warn!(error = %e, "Discord notification failed");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        topic = %package.topic,
        "Execution complete"
    );
    Ok(())
}

/// Run the generation steps: topic, weather, script and images.
#[instrument(level = "info", skip_all, fields(%week_start))]
async fn generate_package(
    args: &Cli,
    settings: &Settings,
    http: &Client,
    docs_client: Option<&GoogleDocsClient>,
    week_start: NaiveDate,
) -> Result<ScriptPackage, Box<dyn Error>> {
    // ---- Load model config & templates ----
    let conf_file = match args.config.as_deref() {
        Some(path) => PathBuf::from(path),
        None => config_dir()?.join("config.yaml"),
    };
    let config_path = conf_file.to_str().ok_or("Not a valid config filename")?;
    let config = config::load_config(config_path)?;
    info!(config_path, "Loaded model configuration");
    let topic_template = template::load_template(generator::TOPIC_TEMPLATE).await?;
    let script_template = template::load_template(generator::SCRIPT_TEMPLATE).await?;

    // ---- Topic ----
    let past_topics = match (docs_client, args.folder_id()) {
        (Some(client), Some(folder_id)) => get_past_topics(client, &folder_id).await,
        _ => Vec::new(),
    };
    info!(count = past_topics.len(), last = past_topics.last().map(String::as_str), "Past topics loaded");
    let topic = generator::select_topic(&config, &topic_template, week_start, &past_topics).await?;

    // ---- Weather ----
    let weather = WeatherClient::new(http.clone(), settings.rain_threshold_mm);
    let (latitude, longitude) = match weather.geocode_location(&topic.location).await {
        Ok(coords) => coords,
        Err(e) => {
            warn!(
                location = %topic.location,
                error = %e,
                "Geocoding failed; falling back to Ghent"
            );
            (settings.fallback_latitude, settings.fallback_longitude)
        }
    };

    let dates = filming_week(week_start);
    let days = match weather.get_weekly_weather(latitude, longitude, &dates).await {
        Ok(days) => days,
        Err(e) => {
            warn!(error = %e, "Forecast unavailable; using fallback weather");
            dates
                .iter()
                .map(|d| fallback_weather(d.format("%Y-%m-%d").to_string()))
                .collect()
        }
    };
    for day in &days {
        info!(
            date = %day.date,
            condition = %day.condition,
            temp_c = ?day.temp_c,
            rain_mm = ?day.rain_mm,
            outdoor_ok = day.outdoor_ok,
            "Forecast"
        );
    }
    let best_day = select_best_filming_day(&days).ok_or("No filming days to choose from")?;

    // ---- Script ----
    let script = generator::generate_script(&config, &script_template, &topic, best_day).await?;
    info!(
        days = script.shooting_plan.len(),
        sections_nl = script.script_nl.sections.len(),
        sections_en = script.script_en.sections.len(),
        "Script generated"
    );

    // ---- Images ----
    let queries = build_image_queries(&topic, settings.max_images);
    let commons = CommonsClient::new(http.clone());
    let image_urls = commons.find_image_urls(&queries, settings.wikimedia_delay()).await;

    Ok(ScriptPackage::from_parts(&topic, script, image_urls))
}
