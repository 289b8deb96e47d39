use clap::{Args, Parser, Subcommand};
use fb_core::SizeChoice;
use crate::events::UiEvent;

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct GenArgs {
    /// How many images to generate one after another
    #[arg(short = 'n', long = "repeat")]
    pub repeat: Option<u32>,

    /// Preset size (128, 256, 512, 768, 1024, 1280, 1536) or WxH
    #[arg(short, long)]
    pub size: Option<SizeChoice>,

    /// Resize the result to 1024x1024 and delete the original file
    #[arg(long)]
    pub resize: bool,

    /// Prompt text; the last selected history prompt is used when omitted
    #[arg(trailing_var_arg = true)]
    pub prompt: Vec<String>,
}

impl GenArgs {
    pub fn prompt_text(&self) -> Option<String> {
        let text = self.prompt.join(" ");
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_flag = true, disable_help_subcommand = true, disable_version_flag = true)]
struct ReplLine {
    #[command(subcommand)]
    command: ReplCommand,
}

#[derive(Subcommand, Debug)]
enum ReplCommand {
    /// Generate images for a prompt
    #[command(alias = "g")]
    Gen(GenArgs),
    /// Select a prompt from the history for the next `gen`
    Use { index: usize },
    /// Stop the running generation
    Stop,
    /// Show progress of the running generation
    Status,
    /// List prompt history
    History,
    /// Forget all prompts
    ClearHistory,
    /// List recently saved images
    Recent,
    Help,
    #[command(alias = "exit")]
    Quit,
}

pub const HELP: &str = "\
commands:
  gen [-n N] [-s SIZE] [--resize] [PROMPT...]   generate images
  use N            pick prompt N from history for the next gen
  stop             stop the running generation
  status           show progress
  history          list prompt history
  clear-history    forget all prompts
  recent           list recently saved images
  quit             exit";

/// Turn one typed line into a UI event. Blank lines yield nothing.
pub fn parse_line(line: &str) -> Option<UiEvent> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }

    let event = match ReplLine::try_parse_from(words) {
        Ok(parsed) => match parsed.command {
            ReplCommand::Gen(args) => UiEvent::Generate(args),
            ReplCommand::Use { index } => UiEvent::UseHistory(index),
            ReplCommand::Stop => UiEvent::Stop,
            ReplCommand::Status => UiEvent::Status,
            ReplCommand::History => UiEvent::ShowHistory,
            ReplCommand::ClearHistory => UiEvent::ClearHistory,
            ReplCommand::Recent => UiEvent::ShowRecent,
            ReplCommand::Help => UiEvent::Help,
            ReplCommand::Quit => UiEvent::Quit,
        },
        Err(e) => UiEvent::Invalid(e.to_string().lines().next().unwrap_or_default().to_string()),
    };

    Some(event)
}
