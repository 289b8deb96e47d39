mod app;
mod commands;
mod error;
mod events;
mod recent;
mod state;
mod worker;

use std::path::PathBuf;
use anyhow::Context;
use clap::{Parser, Subcommand};
use fb_core::{AppConfig, Credentials, FusionBrainClient, PollConfig, PromptHistory, ResultPersister};
use tracing::Level;
use crate::commands::GenArgs;

/// Generate images from text prompts with the FusionBrain API
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON file with api_key and secret_key
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder that receives one sub-folder per prompt
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    history_file: Option<PathBuf>,

    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Show debug logs on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read commands from stdin (the default)
    Interactive,
    /// Run a single generation and exit
    Generate(GenArgs),
    /// Print or clear the prompt history
    History {
        #[arg(long)]
        clear: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let mut conf = AppConfig::load();
    if let Some(path) = cli.config {
        conf.config_file = path;
    }
    if let Some(path) = cli.output_dir {
        conf.output_dir = path;
    }
    if let Some(path) = cli.history_file {
        conf.history_file = path;
    }
    if let Some(url) = cli.api_url {
        conf.api_url = url;
    }

    let mut history = PromptHistory::load(&conf.history_file);

    if let Some(Command::History { clear }) = &cli.command {
        if *clear {
            history.clear()?;
            println!("Prompt history cleared");
        } else if history.is_empty() {
            println!("History is empty");
        } else {
            for (i, prompt) in history.iter().enumerate() {
                println!("{:>3}. {prompt}", i + 1);
            }
        }
        return Ok(());
    }

    let credentials = Credentials::load(&conf.config_file).context("Cannot start without API credentials")?;
    let client = FusionBrainClient::new(&conf.api_url, credentials)?;

    let mut app = app::App::new(
        Box::new(client),
        ResultPersister::new(&conf.output_dir),
        PollConfig::default(),
        history,
    );

    match cli.command {
        Some(Command::Generate(args)) => {
            app.run_once(args)?;
        }
        _ => {
            println!("FusionBrain image generator. Type `help` for commands.");
            app.spawn_stdin_reader();
            app.run();
        }
    }

    Ok(())
}
