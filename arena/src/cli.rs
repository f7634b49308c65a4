use chess::PlayerSide;
use clap::{Parser, Subcommand};

use arena::PlayerKind;

/// Top-level CLI arguments.
#[derive(Parser)]
#[command(name = "chess-arena", about = "Chess between humans and language models")]
pub struct Cli {
    /// Defaults to `play` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Play an interactive game in the terminal.
    Play {
        /// Start auto-play immediately.
        #[arg(long)]
        autoplay: bool,
        /// Pause between auto-play moves, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Show debug entries in the move log.
        #[arg(long)]
        debug: bool,
        /// Start from this position instead of the standard one.
        #[arg(long)]
        fen: Option<String>,
    },
    /// Show or change stored settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List the services and models that can play.
    Models,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print both players and which services have a stored key.
    Show,
    /// Configure who plays one side.
    Player {
        #[arg(long, value_parser = parse_side)]
        side: PlayerSide,
        #[arg(long, value_parser = parse_kind)]
        kind: PlayerKind,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        temperature: Option<f32>,
    },
    /// Save or clear the API key for a service.
    Key {
        #[arg(long)]
        service: String,
        #[arg(long, conflicts_with = "clear", required_unless_present = "clear")]
        set: Option<String>,
        #[arg(long)]
        clear: bool,
    },
}

fn parse_side(s: &str) -> Result<PlayerSide, String> {
    s.parse()
}

fn parse_kind(s: &str) -> Result<PlayerKind, String> {
    s.parse()
}
