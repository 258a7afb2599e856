use clap::{ArgAction, Parser, Subcommand};
use commands::{build, config, daemon, delete, import, verify};
use reel_config::PathManager;
use reel_core::CandidateMode;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "reelcurator")]
#[command(about = "reelcurator - Keep Plex collections in step with your movie lists")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a collection from a list of titles
    #[command(long_about = "Create a Plex collection from titles like 'Dune (2021)'. Titles already in the library are attached on the first check; missing ones are sent to Radarr. With --watch the command keeps running until the collection completes or stalls.")]
    Build {
        /// Collection name
        name: String,

        /// Movie titles, optionally with a year suffix: "Arrival (2016)"
        #[arg(required = true)]
        titles: Vec<String>,

        /// Keep running reconciliation checks until the collection settles
        #[arg(long, action = ArgAction::SetTrue)]
        watch: bool,
    },
    /// Preview an external list and optionally turn it into a collection
    #[command(long_about = "Fetch a public Letterboxd list and show which titles are already in the library. With --create the list becomes a Plex collection, missing titles are sent to Radarr and the list is re-synced daily while the process runs.")]
    Import {
        /// List URL (https://letterboxd.com/<user>/list/<slug>/)
        url: String,

        /// Create the collection from the list
        #[arg(long, action = ArgAction::SetTrue)]
        create: bool,

        /// Collection name (defaults to the list name)
        #[arg(long, requires = "create")]
        name: Option<String>,

        /// Only keep titles already in the library
        #[arg(long, action = ArgAction::SetTrue, requires = "create")]
        library_only: bool,

        /// Keep running until the collection settles
        #[arg(long, action = ArgAction::SetTrue, requires = "create")]
        watch: bool,
    },
    /// Resolve candidate titles and check library presence
    #[command(long_about = "Resolve each title against IMDb and report whether it is already in the Plex library. 'library' keeps only present titles, 'mixed' keeps everything, 'discovery' skips the library lookup.")]
    Verify {
        /// Candidate titles
        #[arg(required = true)]
        titles: Vec<String>,

        /// Verification mode: library, mixed or discovery
        #[arg(long, default_value = "mixed")]
        mode: CandidateMode,

        /// Maximum number of candidates to report
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete a collection from the library
    Delete {
        /// Collection name
        name: String,
    },
    /// Run the reconciliation scheduler in the foreground
    #[command(long_about = "Run reelcurator as a long-lived process that performs reconciliation checks and daily list re-syncs. Collections listed in the seed file are built or imported on startup, and the file is re-read while running: new entries are applied and removed entries are deleted.")]
    Daemon {
        /// TOML file with [[collection]] and [[list]] entries to set up on startup
        #[arg(long, value_name = "FILE")]
        seed: Option<std::path::PathBuf>,

        /// Write logs to the daily rotated log file instead of stderr
        #[arg(long, action = ArgAction::SetTrue)]
        log_to_file: bool,
    },
    /// Configure credentials and settings
    #[command(long_about = "Manage configuration and credentials for reelcurator. Secrets live in credentials.toml; PLEX_TOKEN, RADARR_API_KEY, PLEX_URL and RADARR_URL override the stored values.")]
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (masks sensitive data)
    Show {
        /// Show secrets unmasked
        #[arg(long, action = ArgAction::SetTrue)]
        full: bool,
    },

    /// Configure the Plex server and token
    Plex {
        /// Plex API token (if not provided, will prompt)
        #[arg(long)]
        token: Option<String>,

        /// Plex server URL
        #[arg(long)]
        server_url: Option<String>,

        /// Movie library section to manage
        #[arg(long)]
        library: Option<String>,
    },

    /// Configure the Radarr server and API key
    Radarr {
        /// Radarr API key (if not provided, will prompt)
        #[arg(long)]
        api_key: Option<String>,

        /// Radarr URL
        #[arg(long)]
        url: Option<String>,

        /// Root folder for new movies
        #[arg(long)]
        root_folder: Option<String>,

        /// Quality profile name
        #[arg(long)]
        quality_profile: Option<String>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Daemon { log_to_file: true, .. } => Some(PathManager::default().daemon_log_file()),
        _ => None,
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Build { name, titles, watch } => build::run_build(&name, &titles, watch, &output).await,
        Commands::Import {
            url,
            create,
            name,
            library_only,
            watch,
        } => {
            let options = import::ImportOptions {
                create,
                name,
                library_only,
                watch,
            };
            import::run_import(&url, options, &output).await
        }
        Commands::Verify { titles, mode, limit } => verify::run_verify(&titles, mode, limit, &output).await,
        Commands::Delete { name } => delete::run_delete(&name, &output).await,
        Commands::Daemon { seed, .. } => daemon::run_daemon(seed, &output).await,
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show { full: false });
            config::run_config(cmd, &output).await
        }
    }
}
