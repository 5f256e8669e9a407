//! Snippet shell - CLI

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use snippet_engine::repl::{LineRepl, Session};
use snippet_engine::util::config::{self, ShellConfig};
use snippet_engine::util::logger::{self, LogLevel};
use snippet_engine::{NAME, VERSION};

/// Interactive shell with incremental snippet evaluation
#[derive(Parser, Debug)]
#[command(name = "snip")]
#[command(version = VERSION)]
#[command(about = "Interactive snippet shell", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (defaults to the user config)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the interactive shell (default)
    Repl,

    /// Evaluate every snippet in a file
    Run {
        /// Source file to run
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print version information
    Version,
}

fn load_config(args: &Args) -> Result<ShellConfig> {
    let mut config = config::load(args.config.as_deref()).with_context(|| match &args.config {
        Some(path) => format!("Failed to load config: {}", path.display()),
        None => "Failed to load user config".to_string(),
    })?;
    if let Some(level) = logger::level_from_env()? {
        config.log.level = level;
    }
    if args.verbose {
        config.log.level = LogLevel::Debug;
    }
    if config.repl.history_file.is_none() {
        config.repl.history_file = config::get_config_dir().map(|dir| dir.join("history"));
    }
    Ok(config)
}

fn run_file(
    config: &ShellConfig,
    file: &Path,
) -> Result<i64> {
    let source = std::fs::read_to_string(file).with_context(|| format!("Failed to read: {}", file.display()))?;
    let mut session = Session::new(config);
    let lines = session
        .eval(&source)
        .with_context(|| format!("Failed to run: {}", file.display()))?;
    for line in lines {
        println!("{}", line);
    }
    Ok(session.exit_code().unwrap_or(0))
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config = load_config(&args)?;
    logger::init_with_level(config.log.level);

    let status = match args.command.unwrap_or(Commands::Repl) {
        Commands::Repl => {
            let mut repl =
                LineRepl::new(Session::new(&config), config.repl.clone()).context("Failed to start line editor")?;
            repl.run().context("Line editor failed")?
        }
        Commands::Run { file } => run_file(&config, &file)?,
        Commands::Version => {
            println!("{} {}", NAME, VERSION);
            0
        }
    };
    Ok(ExitCode::from(status.clamp(0, 255) as u8))
}
