//! Binary entry point: parse arguments, load the configuration and the
//! transaction log, and hand off to the selected run mode.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use argh::FromArgs;
use tracing_subscriber::EnvFilter;
use triplestore::{MemoryStore, SharedStore};

use replaytest::config::Config;
use replaytest::{runner, txlog};

/// Replay a recorded transaction log against a triple store under
/// controlled arrival rates.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the transaction log
    #[argh(positional)]
    log: PathBuf,

    /// execution mode: "insert" (bulk replay without pacing) or
    /// "transaction" (paced concurrent replay)
    #[argh(positional)]
    mode: Mode,

    /// path to the yaml configuration file
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// path of the output record (defaults to results-<log name>)
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug)]
enum Mode {
    Insert,
    Transaction,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "insert" => Ok(Self::Insert),
            "transaction" => Ok(Self::Transaction),
            other => Err(format!("unknown execution mode {other}")),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => {
            let file = std::fs::File::open(path).context("failed to open config file")?;
            serde_yaml::from_reader(file).context("failed to parse config YAML")?
        }
        None => Config::default(),
    };

    let log = txlog::load(&args.log)?;
    let store: SharedStore = Arc::new(MemoryStore::new());

    match args.mode {
        Mode::Insert => runner::run_insert(store, log).await,
        Mode::Transaction => {
            let output = args.output.unwrap_or_else(|| default_output(&args.log));
            runner::run_transactions(store, log, &config, &output).await
        }
    }
}

fn default_output(log: &Path) -> PathBuf {
    let name = log
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    PathBuf::from(format!("results-{name}"))
}
