use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vimeo_downloader::downloader::error_body_block;
use vimeo_downloader::error::{AppError, Result};
use vimeo_downloader::{
    lister, AuthFlow, Config, DownloadOptions, Downloader, SelectionPolicy, Target, TokenStore,
    VimeoClient,
};

/// Vimeo Downloader - connect to Vimeo, list and download your videos.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show informational logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Authenticate with Vimeo using OAuth2
    Auth,
    /// List all videos in your Vimeo account
    List {
        /// Limit the number of videos to list
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Download videos from your Vimeo account
    Download {
        /// Download a specific video by ID
        #[arg(long)]
        video_id: Option<String>,

        /// Limit the number of videos to download
        #[arg(long)]
        count: Option<usize>,

        /// Comma-separated list of video IDs to skip (e.g. '123456,789012')
        #[arg(long, value_delimiter = ',')]
        skip: Vec<String>,

        /// Prefer the rendition closest to 720p instead of the largest file
        #[arg(long)]
        prefer_hd: bool,

        /// Print the raw API JSON for each video
        #[arg(long)]
        debug: bool,
    },
}

/// Main entry point.
///
/// # Steps
/// 1. Parses the command line and initializes logging
/// 2. Loads configuration from `.env` and the environment
/// 3. Runs the requested command
///
/// Any error that reaches this point is fatal and exits with status 1.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let debug = cli.command.debug();
    if let Err(e) = run(cli.command).await {
        error!("Command failed: {}", e);
        eprintln!("{}", failure_message(&e, debug));
        std::process::exit(1);
    }
}

impl Command {
    fn debug(&self) -> bool {
        matches!(self, Command::Download { debug: true, .. })
    }
}

/// What a fatal error prints; `--debug` adds the API response body.
fn failure_message(e: &AppError, debug: bool) -> String {
    let mut message = format!("Error: {}", e);
    if debug {
        if let Some(body) = e.response_body() {
            message.push_str(&error_body_block(body));
        }
    }
    message
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(command: Command) -> Result<()> {
    let config = Config::from_env()?;

    match command {
        Command::Auth => {
            info!("Starting OAuth flow");
            AuthFlow::new(config).run().await?;
            println!("Authentication successful! Token saved.");
        }
        Command::List { limit } => {
            let client = authenticated_client(&config)?;
            lister::list(&client, config.page_size, limit).await?;
        }
        Command::Download {
            video_id,
            count,
            skip,
            prefer_hd,
            debug,
        } => {
            let client = authenticated_client(&config)?;
            let options = DownloadOptions {
                target: video_id.map_or(Target::All, Target::Video),
                count,
                skip: skip
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                policy: if prefer_hd {
                    SelectionPolicy::PreferHd
                } else {
                    SelectionPolicy::Largest
                },
                debug,
            };

            let report = Downloader::new(client, config, options).run().await?;
            report.print_summary();
            println!("\nDownload complete!");
        }
    }

    Ok(())
}

fn authenticated_client(config: &Config) -> Result<VimeoClient> {
    let token = TokenStore::new(config.token_file.clone()).load_valid()?;
    VimeoClient::new(&config.api_base, token)
}
