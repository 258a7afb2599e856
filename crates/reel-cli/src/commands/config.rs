use color_eyre::eyre::eyre;
use color_eyre::Result;
use comfy_table::{Cell, Color};
use owo_colors::OwoColorize;
use reel_config::{Config, CredentialStore, PathManager};
use serde_json::json;

use crate::commands::{mask_string, styled_table};
use crate::output::Output;
use crate::ConfigCommands;

pub async fn run_config(cmd: ConfigCommands, output: &Output) -> Result<()> {
    match cmd {
        ConfigCommands::Show { full } => show_config(full, output),
        ConfigCommands::Plex {
            token,
            server_url,
            library,
        } => configure_plex(token, server_url, library, output),
        ConfigCommands::Radarr {
            api_key,
            url,
            root_folder,
            quality_profile,
        } => configure_radarr(api_key, url, root_folder, quality_profile, output),
    }
}

struct Stores {
    path_manager: PathManager,
    config: Config,
    credentials: CredentialStore,
}

fn load_stores() -> Result<Stores> {
    let path_manager = PathManager::default();
    let config_file = path_manager.config_file();
    let config = if config_file.exists() {
        Config::load_from_file(&config_file)
            .map_err(|e| eyre!("Failed to load config from {}: {}", config_file.display(), e))?
    } else {
        Config::default()
    };

    let credentials_file = path_manager.credentials_file();
    let mut credentials = CredentialStore::new(credentials_file.clone());
    credentials
        .load()
        .map_err(|e| eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

    Ok(Stores {
        path_manager,
        config,
        credentials,
    })
}

fn save_stores(stores: &Stores) -> Result<()> {
    stores
        .path_manager
        .ensure_directories()
        .map_err(|e| eyre!("Failed to create configuration directories: {}", e))?;
    let config_file = stores.path_manager.config_file();
    stores
        .config
        .validate()
        .map_err(|e| eyre!("Refusing to save invalid configuration: {}", e))?;
    stores
        .config
        .save_to_file(&config_file)
        .map_err(|e| eyre!("Failed to save config to {}: {}", config_file.display(), e))?;
    stores
        .credentials
        .save()
        .map_err(|e| eyre!("Failed to save credentials: {}", e))?;
    Ok(())
}

fn show_config(full: bool, output: &Output) -> Result<()> {
    let mut stores = load_stores()?;
    stores.config.apply_env_overrides();
    stores.credentials.apply_env_overrides();
    let Stores {
        path_manager,
        config,
        credentials,
    } = stores;

    let secret = |value: Option<&String>| match value {
        Some(v) if full => v.clone(),
        Some(v) => mask_string(v),
        None => "<not set>".to_string(),
    };
    let plex_token = secret(credentials.get_plex_token());
    let radarr_key = secret(credentials.get_radarr_api_key());
    let missing = credentials.missing();

    if !output.is_human() {
        output.data(&json!({
            "config_file": path_manager.config_file(),
            "credentials_file": path_manager.credentials_file(),
            "config": config,
            "credentials": { "plex_token": plex_token, "radarr_api_key": radarr_key },
            "missing": missing,
        }));
        return Ok(());
    }

    print_section_header("reelcurator configuration", output);
    output.println(format!("  Config file:      {}", path_manager.config_file().display()));
    output.println(format!("  Credentials file: {}", path_manager.credentials_file().display()));
    output.println("");

    let mut table = styled_table(&["Setting", "Value"]);
    let rec = &config.reconciliation;
    let rows: Vec<(&str, String)> = vec![
        ("plex.server_url", config.plex.server_url.clone()),
        ("plex.library", config.plex.library.clone().unwrap_or_else(|| "<first movie section>".to_string())),
        ("plex.token", plex_token),
        ("radarr.url", config.radarr.url.clone()),
        ("radarr.root_folder", config.radarr.root_folder.clone()),
        ("radarr.quality_profile", config.radarr.quality_profile.clone()),
        ("radarr.api_key", radarr_key),
        ("reconciliation.check_interval_secs", rec.check_interval_secs.to_string()),
        (
            "reconciliation.max_checks",
            rec.max_checks_limit().map(|n| n.to_string()).unwrap_or_else(|| "unlimited".to_string()),
        ),
        ("reconciliation.resolve_delay_ms", rec.resolve_delay_ms.to_string()),
        ("reconciliation.cache_capacity", rec.cache_capacity.to_string()),
        ("reconciliation.verify_workers", rec.verify_workers.to_string()),
        ("reconciliation.library_index_ttl_secs", rec.library_index_ttl_secs.to_string()),
        ("reconciliation.resync_schedule", rec.resync_schedule.clone()),
    ];
    for (key, value) in rows {
        let value_cell = if value == "<not set>" {
            Cell::new(value).fg(Color::Red)
        } else {
            Cell::new(value)
        };
        table.add_row(vec![Cell::new(key), value_cell]);
    }
    output.println(table.to_string());

    if missing.is_empty() {
        output.success("All credentials configured");
    } else {
        output.warn(format!("Missing: {}", missing.join(", ")));
    }
    Ok(())
}

fn configure_plex(
    token: Option<String>,
    server_url: Option<String>,
    library: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut stores = load_stores()?;

    print_section_header("Plex Setup", output);
    print_instruction_list(
        &[
            "Sign in to Plex Web and open any item's 'Get Info' > 'View XML'",
            "Copy the X-Plex-Token value from the URL",
        ],
        output,
    );

    let token = match token {
        Some(t) => t,
        None => read_secret("Plex token", stores.credentials.get_plex_token().is_some())?,
    };
    if let Some(token) = token.filter_non_empty() {
        stores.credentials.set_plex_token(token);
    }
    if let Some(url) = server_url.filter_non_empty() {
        stores.config.plex.server_url = url;
    }
    if let Some(library) = library.filter_non_empty() {
        stores.config.plex.library = Some(library);
    }
    if stores.credentials.get_plex_token().is_none() {
        return Err(eyre!("A Plex token is required"));
    }

    save_stores(&stores)?;
    output.success("Plex configuration saved");
    output.println(format!("  Server URL: {}", stores.config.plex.server_url));
    if let Some(library) = &stores.config.plex.library {
        output.println(format!("  Library:    {}", library));
    }
    Ok(())
}

fn configure_radarr(
    api_key: Option<String>,
    url: Option<String>,
    root_folder: Option<String>,
    quality_profile: Option<String>,
    output: &Output,
) -> Result<()> {
    let mut stores = load_stores()?;

    print_section_header("Radarr Setup", output);
    print_instruction_list(&["Open Radarr > Settings > General", "Copy the API Key under Security"], output);

    let api_key = match api_key {
        Some(k) => k,
        None => read_secret("Radarr API key", stores.credentials.get_radarr_api_key().is_some())?,
    };
    if let Some(key) = api_key.filter_non_empty() {
        stores.credentials.set_radarr_api_key(key);
    }
    if let Some(url) = url.filter_non_empty() {
        stores.config.radarr.url = url;
    }
    if let Some(folder) = root_folder.filter_non_empty() {
        stores.config.radarr.root_folder = folder;
    }
    if let Some(profile) = quality_profile.filter_non_empty() {
        stores.config.radarr.quality_profile = profile;
    }
    if stores.credentials.get_radarr_api_key().is_none() {
        return Err(eyre!("A Radarr API key is required"));
    }

    save_stores(&stores)?;
    output.success("Radarr configuration saved");
    output.println(format!("  URL:             {}", stores.config.radarr.url));
    output.println(format!("  Root folder:     {}", stores.config.radarr.root_folder));
    output.println(format!("  Quality profile: {}", stores.config.radarr.quality_profile));
    Ok(())
}

/// Empty input keeps the stored secret when there is one
fn read_secret(label: &str, has_existing: bool) -> Result<String> {
    let prompt = if has_existing {
        format!("{} (press Enter to keep the current value): ", label)
    } else {
        format!("{}: ", label)
    };
    rpassword::prompt_password(prompt).map_err(|e| eyre!("Failed to read {}: {}", label, e))
}

trait NonEmpty {
    fn filter_non_empty(self) -> Option<String>;
}

impl NonEmpty for String {
    fn filter_non_empty(self) -> Option<String> {
        let trimmed = self.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

impl NonEmpty for Option<String> {
    fn filter_non_empty(self) -> Option<String> {
        self.and_then(|s| s.filter_non_empty())
    }
}

fn print_section_header(title: &str, output: &Output) {
    output.println("");
    output.println(format!("{}", title.bold().bright_cyan()));
    output.println(format!("{}", "─".repeat(title.chars().count()).bright_cyan()));
}

fn print_instruction_list(items: &[&str], output: &Output) {
    for (idx, item) in items.iter().enumerate() {
        output.println(format!("  {}. {}", idx + 1, item));
    }
    output.println("");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_non_empty() {
        assert_eq!("  abc ".to_string().filter_non_empty(), Some("abc".to_string()));
        assert_eq!("   ".to_string().filter_non_empty(), None);
        assert_eq!(None::<String>.filter_non_empty(), None);
        assert_eq!(Some("x".to_string()).filter_non_empty(), Some("x".to_string()));
    }
}
