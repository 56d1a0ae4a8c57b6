//! Dicebot CLI
//!
//! Runs the bot against replayed frames with a dry-run input device that
//! only logs what it would click. Components are toggled by typing their
//! command word on stdin.

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use dicebot::config::Settings;
use dicebot::geometry::{resolve_window, FixedWindow};
use dicebot::input::LogInput;
use dicebot::orchestrator::Component;
use dicebot::state::{GameState, RecentLogs};
use dicebot::vision::{
    FrameDirSource, FramePerception, FrameSource, NoCapture, NullRecognizer, TemplateLibrary,
};
use dicebot::{logging, Bot, BotError};

#[derive(Debug, Parser)]
#[command(name = "dicebot", version, about = "Dice-board game automation")]
struct Cli {
    /// JSON settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Title of the emulator window
    #[arg(long)]
    window: Option<String>,

    /// Directory of PNG frames to replay instead of live capture
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Start every component right away, as the "all" command does
    #[arg(long)]
    start_all: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let recent = Arc::new(RecentLogs::default());
    if let Err(e) = logging::init(Arc::clone(&recent)) {
        eprintln!("Failed to install logger: {}", e);
    }

    match run(cli, recent) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, recent: Arc<RecentLogs>) -> Result<(), BotError> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_env()?;
    if let Some(title) = cli.window {
        settings.window.title = title;
    }

    let window = resolve_window(
        &FixedWindow(settings.window.geometry),
        &settings.window.title,
        settings.window.fallback,
    );

    let source: Box<dyn FrameSource> = match &cli.frames {
        Some(dir) => Box::new(FrameDirSource::open(dir)?),
        None => {
            log::warn!("No capture backend attached; every lookup will miss");
            Box::new(NoCapture)
        }
    };

    let state = Arc::new(GameState::with_recent_logs(recent));
    let perception = FramePerception::new(
        source,
        TemplateLibrary::new(settings.template_dir.clone()),
        Box::new(NullRecognizer),
        window,
        Arc::clone(&state.overlays),
    );

    let bot = Bot::new(
        settings,
        state,
        Arc::new(perception),
        Box::new(LogInput),
        window,
    )?;
    bot.start()?;
    if cli.start_all {
        bot.orchestrator.toggle(Component::All)?;
    }

    let result = control_loop(&bot);
    bot.close();
    result
}

fn print_help() {
    let commands: Vec<&str> = Component::COMMANDS.iter().map(|c| c.command()).collect();
    println!("Commands: {}, status, help, quit", commands.join(", "));
}

fn control_loop(bot: &Bot) -> Result<(), BotError> {
    print_help();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        match line.trim() {
            "" => {}
            "quit" | "exit" => break,
            "help" => print_help(),
            "status" => {
                let report = bot.orchestrator.report();
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => log::warn!("Failed to render status: {}", e),
                }
            }
            command => match command.parse::<Component>() {
                Ok(component) => {
                    let on = bot.orchestrator.toggle(component)?;
                    println!("{}: {}", component, if on { "on" } else { "off" });
                }
                Err(e) => println!("{}", e),
            },
        }
        io::stdout().flush()?;
    }
    Ok(())
}
