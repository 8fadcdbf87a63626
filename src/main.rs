mod cli;
mod codec;
mod config;
mod detector;
mod error;
mod model;
mod providers;
mod render;
mod schema;
mod store;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Args, Parser, Subcommand};
use crossterm::tty::IsTty;
use tracing_subscriber::EnvFilter;

use render::Format;

#[derive(Parser)]
#[command(name = "cue", version, about = "Run saved Jira queries and triage what changed")]
struct Cli {
    /// Configuration file (default: ./config.toml, then the user config dir)
    #[arg(long, global = true, env = "CUE_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
#[group(id = "format", multiple = false)]
struct FormatArgs {
    /// One line per issue
    #[arg(short, long)]
    oneline: bool,

    /// Key, links and a one-line summary (default)
    #[arg(short, long)]
    compact: bool,

    /// Every stored field
    #[arg(short, long)]
    long: bool,
}

impl FormatArgs {
    fn format(&self) -> Format {
        if self.oneline {
            Format::Oneline
        } else if self.long {
            Format::Long
        } else {
            Format::Compact
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run saved queries by name
    #[command(visible_aliases = ["x", "execute"])]
    Exec {
        #[arg(required_unless_present = "all")]
        names: Vec<String>,
        /// Also run every query not marked passive
        #[arg(short, long)]
        all: bool,
        /// Fetch even when a snapshot exists
        #[arg(short, long)]
        refresh: bool,
        /// JQL clause ANDed into each query
        #[arg(short = 'x', long)]
        extra: Option<String>,
        #[command(flatten)]
        format: FormatArgs,
    },
    /// Run an ad-hoc JQL expression
    #[command(name = "exec-query", visible_alias = "xq")]
    ExecQuery {
        jql: String,
        #[command(flatten)]
        format: FormatArgs,
    },
    /// Full-text search
    #[command(visible_alias = "s")]
    Search {
        #[arg(required = true)]
        keywords: Vec<String>,
        /// Restrict to one project
        #[arg(short, long)]
        project: Option<String>,
        #[command(flatten)]
        format: FormatArgs,
    },
    /// Show issues by key or number
    #[command(visible_aliases = ["c", "see"])]
    Show {
        #[arg(required = true)]
        refs: Vec<String>,
        /// Ignore the cache
        #[arg(short, long)]
        refresh: bool,
        #[command(flatten)]
        format: FormatArgs,
    },
    /// Print the change queue
    #[command(visible_aliases = ["ls", "l"])]
    List,
    /// Step through the change queue
    #[command(visible_alias = "q")]
    Queue,
    /// Play the alert sound if the queue is not empty
    #[command(visible_alias = "a")]
    Alert,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::load_config(cli.config.as_deref())?;
    let mut session = cli::Session::open(&config, std::io::stdout().is_tty())?;
    let mut out = std::io::stdout().lock();

    match cli.command {
        Command::List => cli::list(&session, &mut out),
        Command::Queue => {
            drop(out);
            cli::triage(&session)
        }
        Command::Alert => cli::alert(&session, &config.alert_sound_file, &mut out).await,
        Command::Exec {
            names,
            all,
            refresh,
            extra,
            format,
        } => {
            let source = providers::create_source(&config)?;
            let opts = cli::ExecOptions {
                names,
                all,
                refresh,
                extra,
                format: format.format(),
            };
            cli::exec(&mut session, source.as_ref(), &opts, &mut out).await
        }
        Command::ExecQuery { jql, format } => {
            let source = providers::create_source(&config)?;
            cli::exec_query(&mut session, source.as_ref(), &jql, format.format(), &mut out).await
        }
        Command::Search {
            keywords,
            project,
            format,
        } => {
            let source = providers::create_source(&config)?;
            cli::search(
                &mut session,
                source.as_ref(),
                &keywords,
                project.as_deref(),
                format.format(),
                &mut out,
            )
            .await
        }
        Command::Show {
            refs,
            refresh,
            format,
        } => {
            let source = providers::create_source(&config)?;
            cli::show(&mut session, source.as_ref(), &refs, refresh, format.format(), &mut out).await
        }
    }
}
