mod cli;

use std::sync::Arc;
use std::time::Duration;

use agent::ServiceRegistry;
use anyhow::Context;
use arena::config::{self, OrchestratorConfig};
use arena::console::Console;
use arena::{
    spawn_session, ConfiguredSources, HumanMoveSource, JsonFileStore, LogEntry, MoveLog,
    PlayerConfig, Settings,
};
use chess::{Game, PlayerSide};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands, ConfigAction};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout belongs to the console, so tracing goes to a daily file.
    let log_dir = config::get_log_dir();
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "chess-arena");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings_path = config::get_settings_path();
    tracing::info!(settings = %settings_path.display(), "Chess arena starting up");
    let settings = Arc::new(Settings::new(
        Box::new(JsonFileStore::new(settings_path)),
        ServiceRegistry::builtin(),
    ));

    match cli.command.unwrap_or(Commands::Play {
        autoplay: false,
        delay_ms: None,
        debug: false,
        fen: None,
    }) {
        Commands::Play {
            autoplay,
            delay_ms,
            debug,
            fen,
        } => play(settings, autoplay, delay_ms, debug, fen).await?,
        Commands::Config { action } => configure(&settings, action)?,
        Commands::Models => list_models(settings.registry()),
    }

    tracing::info!("Chess arena shutting down");
    Ok(())
}

async fn play(
    settings: Arc<Settings>,
    autoplay: bool,
    delay_ms: Option<u64>,
    debug: bool,
    fen: Option<String>,
) -> anyhow::Result<()> {
    let game = match fen {
        Some(f) => Game::from_fen(&f).with_context(|| format!("cannot start from {f}"))?,
        None => Game::new(),
    };
    let players = settings.players().context("failed to load player settings")?;

    let mut orchestrator = OrchestratorConfig::from_env();
    if let Some(ms) = delay_ms {
        orchestrator.autoplay_delay = Duration::from_millis(ms);
    }

    let mut log = MoveLog::default();
    log.set_debug(debug);
    log.push(LogEntry::Debug(format!(
        "Settings loaded: White {}, Black {}",
        players[0].label(),
        players[1].label()
    )));
    for entry in log.entries().collect::<Vec<_>>().into_iter().rev() {
        println!("{entry}");
    }

    let (human, input) = HumanMoveSource::channel();
    let provider = Arc::new(ConfiguredSources::new(
        Arc::clone(&settings),
        human,
        orchestrator.retry,
    ));
    let handle = spawn_session(game, players, provider, orchestrator);
    if autoplay && !handle.set_autoplay(true).await? {
        println!("Auto-play cannot start: the game is over");
    }

    Console::new(handle, input, settings, log).run().await
}

fn configure(settings: &Settings, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let players = settings.players()?;
            for side in PlayerSide::BOTH {
                print_player(side, &players[side.index()]);
            }
            for service in settings.registry().services() {
                let key = if settings.has_stored_credential(&service.id)? {
                    "stored"
                } else if std::env::var(&service.api_key_env).is_ok() {
                    "from environment"
                } else {
                    "missing"
                };
                println!("{} key: {key}", service.display_name);
            }
        }
        ConfigAction::Player {
            side,
            kind,
            service,
            model,
            temperature,
        } => {
            if let Some(id) = &service {
                settings.registry().profile(id)?;
            }
            let current = settings.players()?[side.index()].clone();
            let player = current.updated(kind, service, model, temperature, settings.registry());
            let saved = settings.set_player(side, player)?;
            print_player(side, &saved);
        }
        ConfigAction::Key {
            service,
            set,
            clear,
        } => {
            let profile = settings.registry().profile(&service)?;
            if clear {
                settings.clear_credential(&service)?;
                println!("Cleared API key for {}", profile.display_name);
            } else if let Some(key) = set {
                settings.set_credential(&service, &key)?;
                println!("Saved API key for {}", profile.display_name);
            }
        }
    }
    Ok(())
}

fn print_player(side: PlayerSide, player: &PlayerConfig) {
    if player.is_human() {
        println!("{}: human", side.title());
    } else {
        println!(
            "{}: agent {} / {} (temperature {:.2})",
            side.title(),
            player.service,
            player.model,
            player.temperature
        );
    }
}

fn list_models(registry: &ServiceRegistry) {
    for service in registry.services() {
        println!("{} ({})", service.display_name, service.id);
        for model in &service.models {
            println!(
                "  {:<40} {} [{:.1}-{:.1}]",
                model.id, model.display_name, model.temperature.min, model.temperature.max
            );
        }
    }
}
