use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use harvester_cli::commands;
use harvester_cli::{BrowserArgs, ModeArg};
use harvester_core::settings::{SettingsStore, harvester_home};
use harvester_delivery::DEFAULT_RECEIVER_URL;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "harvester")]
#[command(author, version, about, long_about = None)]
#[command(
    about = "Scrape Apollo people search results page by page",
    long_about = "Harvester drives an Apollo search in Chrome: it walks the result pages, \
                  extracts and classifies each row, streams rows to a local receiver or \
                  exports them to CSV, and adds the collected websites to the search's \
                  exclude list before starting the next pass."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for settings and browser profiles [default: ~/.harvester]
    #[arg(long, global = true, env = "HARVESTER_HOME", value_name = "DIR")]
    home: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scraping session in the Apollo tab
    Scrape {
        /// Pages to scrape per pass before saving the exclude list
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        pages: u32,

        /// Correlation id attached to every delivered row
        #[arg(long, value_name = "ID")]
        cid: String,

        /// Where rows go
        #[arg(long, value_enum, default_value_t = ModeArg::Realtime)]
        mode: ModeArg,

        /// CSV file for save mode [default: <cid>_<YYYYMMDD>.csv]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Receiver base URL for realtime mode
        #[arg(long, env = "HARVESTER_RECEIVER_URL", default_value = DEFAULT_RECEIVER_URL)]
        receiver: String,

        /// Pause after saving the exclude list
        #[arg(long, value_name = "MS", default_value_t = 10_000)]
        exclude_settle_ms: u64,

        /// Delay before retrying a failed delivery
        #[arg(long, value_name = "MS", default_value_t = 3_000)]
        retry_delay_ms: u64,

        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Pick the next-page button in the Apollo tab and remember it
    SelectNext {
        #[command(flatten)]
        browser: BrowserArgs,
    },

    /// Manage export column names
    Columns {
        #[command(subcommand)]
        action: ColumnsAction,
    },

    /// Run a local receiver that stores delivered rows as JSON lines
    Receive {
        /// Port to listen on
        #[arg(long, default_value_t = 5055)]
        port: u16,

        /// Directory for the <cid>.jsonl files
        #[arg(short, long, value_name = "DIR", default_value = "harvester-rows")]
        output: PathBuf,
    },

    /// Check that the receiver is up
    Health {
        /// Receiver base URL
        #[arg(long, env = "HARVESTER_RECEIVER_URL", default_value = DEFAULT_RECEIVER_URL)]
        receiver: String,
    },

    /// Generate shell completion scripts
    #[command(long_about = "Generate shell completion scripts for harvester.

SUPPORTED SHELLS:
  bash, zsh, fish, powershell, elvish

INSTALLATION:
  bash:  harvester completion --shell bash >> ~/.bashrc
  zsh:   harvester completion --shell zsh > \"${fpath[1]}/_harvester\"
  fish:  harvester completion --shell fish > ~/.config/fish/completions/harvester.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ColumnsAction {
    /// List column name overrides
    List,
    /// Export a field under a different header
    Set {
        /// Field name, e.g. Column_1_Text or Website
        key: String,
        /// Header to use
        name: String,
    },
    /// Remove one override
    Remove { key: String },
    /// Remove all overrides
    Clear,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Commands::Scrape {
            pages,
            cid,
            mode,
            output,
            receiver,
            exclude_settle_ms,
            retry_delay_ms,
            browser,
        } => commands::scrape::execute(
            commands::scrape::ScrapeOptions {
                pages,
                cid,
                mode: mode.into(),
                output,
                receiver,
                exclude_settle: Duration::from_millis(exclude_settle_ms),
                retry_delay: Duration::from_millis(retry_delay_ms),
            },
            &browser,
            cli.home,
        ),
        Commands::SelectNext { browser } => commands::select_next::execute(&browser, cli.home),
        Commands::Columns { action } => {
            let store = SettingsStore::in_home(&harvester_home(cli.home)?);
            match action {
                ColumnsAction::List => commands::columns::list(&store),
                ColumnsAction::Set { key, name } => commands::columns::set(&store, &key, &name),
                ColumnsAction::Remove { key } => commands::columns::remove(&store, &key),
                ColumnsAction::Clear => commands::columns::clear(&store),
            }
        }
        Commands::Receive { port, output } => commands::receive::execute(port, &output),
        Commands::Health { receiver } => commands::health::execute(&receiver),
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            commands::completion::execute(shell, &mut cmd)
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("harvester=debug")
    } else {
        EnvFilter::new("harvester=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}
