pub mod build;
pub mod config;
pub mod daemon;
pub mod delete;
pub mod import;
pub mod verify;

use std::time::Duration;

use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{presets::UTF8_FULL, modifiers::UTF8_ROUND_CORNERS, Cell, Color, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use reel_config::{Config, CredentialStore, PathManager};
use reel_core::{CollectionService, CuratorError};
use reel_models::{CollectionRecord, CollectionStatus};
use reel_sources::SourceSet;
use tracing::info;

use crate::output::Output;

/// Load config and credentials and wire up the collection service
pub async fn load_service(output: &Output) -> Result<CollectionService> {
    let path_manager = PathManager::default();
    let config_file = path_manager.config_file();
    let config = Config::load_or_default(&config_file)
        .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
    config
        .validate()
        .map_err(|e| eyre!("Invalid configuration in {}: {}", config_file.display(), e))?;

    let credentials_file = path_manager.credentials_file();
    let mut credentials = CredentialStore::new(credentials_file.clone());
    credentials
        .load()
        .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;
    credentials.apply_env_overrides();

    let sources = SourceSet::from_config(&config, &credentials)
        .map_err(CuratorError::from)
        .map_err(|e| report_configuration(e, output))?;
    let service = CollectionService::new(sources, &config)
        .await
        .map_err(|e| report_configuration(e, output))?;
    Ok(service)
}

fn report_configuration(err: CuratorError, output: &Output) -> color_eyre::Report {
    if let CuratorError::Configuration(codes) = &err {
        for code in codes {
            match code.as_str() {
                "plex_token_missing" => output.warn("No Plex token configured. Run `reelcurator config plex` or set PLEX_TOKEN."),
                "radarr_api_key_missing" => {
                    output.warn("No Radarr API key configured. Run `reelcurator config radarr` or set RADARR_API_KEY.")
                }
                _ => {}
            }
        }
    }
    err.into()
}

pub fn spinner(message: impl Into<String>, output: &Output) -> ProgressBar {
    if output.is_quiet() || !output.is_human() {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.blue} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.into());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub fn styled_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub fn status_cell(status: CollectionStatus) -> Cell {
    match status {
        CollectionStatus::Complete => Cell::new("complete").fg(Color::Green),
        CollectionStatus::InProgress => Cell::new("in progress").fg(Color::Yellow),
        CollectionStatus::Stalled => Cell::new("stalled").fg(Color::Red),
    }
}

pub fn print_collections(records: &[CollectionRecord], output: &Output) {
    match collections_table(records) {
        Some(table) => output.println(table.to_string()),
        None => output.info("No collections registered"),
    }
}

fn collections_table(records: &[CollectionRecord]) -> Option<Table> {
    if records.is_empty() {
        return None;
    }
    let mut table = styled_table(&["Collection", "Status", "Added", "Checks", "Next check", "Source"]);
    for record in records {
        table.add_row(vec![
            Cell::new(&record.name),
            status_cell(record.status),
            Cell::new(format!("{}/{}", record.added_count, record.total_count)),
            Cell::new(record.checks_run),
            Cell::new(
                record
                    .next_check
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(record.source_url.as_deref().unwrap_or("ad hoc")),
        ]);
    }
    Some(table)
}

/// Run the scheduler until the collection completes, stalls or disappears.
/// Ctrl-C stops waiting early.
pub async fn watch_collection(service: &CollectionService, name: &str, output: &Output) -> Result<()> {
    service.start().await?;
    let progress = spinner(format!("Waiting for '{}' to complete...", name), output);
    let mut ticker = tokio::time::interval(Duration::from_secs(2));

    let last = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!(operation = "watch_interrupted", collection = name, "Stopped watching");
                break None;
            }
            _ = ticker.tick() => {
                let record = service
                    .collections_status()
                    .await
                    .into_iter()
                    .find(|r| r.name == name);
                match record {
                    Some(record) if record.status == CollectionStatus::InProgress => {
                        progress.set_message(format!(
                            "'{}': {}/{} movies attached, {} checks run",
                            name, record.added_count, record.total_count, record.checks_run
                        ));
                    }
                    other => break other,
                }
            }
        }
    };
    progress.finish_and_clear();
    service.shutdown().await?;

    match last {
        Some(record) if record.status == CollectionStatus::Complete => {
            output.success(format!("Collection '{}' is complete ({} movies)", name, record.total_count));
            output.data(&record);
        }
        Some(record) => {
            output.warn(format!(
                "Collection '{}' stalled after {} checks with {}/{} movies attached",
                name, record.checks_run, record.added_count, record.total_count
            ));
            output.data(&record);
        }
        None => output.info(format!("Stopped watching '{}'", name)),
    }
    Ok(())
}

pub fn mask_string(s: &str) -> String {
    if s.is_empty() {
        return "<not set>".to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}
