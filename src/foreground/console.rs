//! Terminal surface for the foreground controller
//!
//! Reads one command per line from stdin and prints the countdown. The
//! surface can be hidden and shown again without ending the daemon; while
//! hidden the background coordinator carries the countdown.

use std::{io::BufRead, str::FromStr};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::{ForegroundController, ForegroundPhase, ForegroundView, TickOutcome};

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start with explicit values, or the saved settings when `None`
    Start(Option<(i64, i64)>),
    Pause,
    Resume,
    Stop,
    Reset,
    Next,
    Previous,
    SetTime(u64),
    Settings(i64, i64),
    Hide,
    Show,
    Status,
    Help,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or_else(|| "empty command".to_string())?;
        let args: Vec<&str> = words.collect();

        let int = |raw: &str| raw.parse::<i64>().map_err(|_| format!("'{}' is not a number", raw));
        let pair = |args: &[&str]| -> Result<(i64, i64), String> {
            match args {
                [slides, minutes] => Ok((int(*slides)?, int(*minutes)?)),
                _ => Err("expected <slides> <minutes>".to_string()),
            }
        };

        match command.to_lowercase().as_str() {
            "start" if args.is_empty() => Ok(Self::Start(None)),
            "start" => pair(&args).map(|p| Self::Start(Some(p))),
            "pause" | "p" => Ok(Self::Pause),
            "resume" | "r" => Ok(Self::Resume),
            "stop" => Ok(Self::Stop),
            "reset" => Ok(Self::Reset),
            "next" | "n" => Ok(Self::Next),
            "prev" | "previous" => Ok(Self::Previous),
            "set" => match args.as_slice() {
                [seconds] => seconds
                    .parse::<u64>()
                    .map(Self::SetTime)
                    .map_err(|_| format!("'{}' is not a number of seconds", seconds)),
                _ => Err("expected set <seconds>".to_string()),
            },
            "settings" => pair(&args).map(|(slides, minutes)| Self::Settings(slides, minutes)),
            "hide" | "close" => Ok(Self::Hide),
            "show" | "open" => Ok(Self::Show),
            "status" | "s" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

enum ConsoleEvent {
    Tick,
    Input(Option<String>),
    Shutdown,
}

/// Run the console until stdin closes or shutdown is signalled
pub async fn run_console(controller: ForegroundController, shutdown: watch::Receiver<bool>) {
    run_with_input(controller, spawn_stdin_reader(), shutdown).await;
}

/// Console loop over an arbitrary line source
pub async fn run_with_input(
    mut controller: ForegroundController,
    mut lines: mpsc::UnboundedReceiver<String>,
    mut shutdown: watch::Receiver<bool>,
) -> ForegroundController {
    controller.initialize().await;
    print_help();
    print_view(&controller.view());

    loop {
        let event = tokio::select! {
            _ = controller.wait_tick() => ConsoleEvent::Tick,
            line = lines.recv() => ConsoleEvent::Input(line),
            _ = shutdown.changed() => ConsoleEvent::Shutdown,
        };

        match event {
            ConsoleEvent::Tick => {
                if controller.tick().await != TickOutcome::Idle {
                    print_view(&controller.view());
                }
            }
            ConsoleEvent::Input(Some(line)) if line.trim().is_empty() => {}
            ConsoleEvent::Input(Some(line)) => match line.parse::<ConsoleCommand>() {
                Ok(command) => apply(&mut controller, command).await,
                Err(e) => println!("{} (type 'help')", e),
            },
            ConsoleEvent::Input(None) => {
                info!("Console input closed");
                break;
            }
            ConsoleEvent::Shutdown => break,
        }
    }

    controller.hide();
    controller
}

async fn apply(controller: &mut ForegroundController, command: ConsoleCommand) {
    if !controller.is_visible() && !matches!(command, ConsoleCommand::Show | ConsoleCommand::Help) {
        println!("Console is hidden; type 'show' first");
        return;
    }

    match command {
        ConsoleCommand::Start(values) => {
            let (slides, minutes) = values.unwrap_or_else(|| {
                let settings = controller.settings();
                (i64::from(settings.slide_count), i64::from(settings.presentation_time))
            });
            if let Err(e) = controller.start(slides, minutes).await {
                println!("{}", e);
            }
        }
        ConsoleCommand::Pause => {
            if controller.pause().await.is_none() {
                println!("No presentation running");
            }
        }
        ConsoleCommand::Resume => {
            controller.resume().await;
        }
        ConsoleCommand::Stop => controller.stop().await,
        ConsoleCommand::Reset => controller.reset_settings().await,
        ConsoleCommand::Next => {
            controller.next_slide();
        }
        ConsoleCommand::Previous => {
            controller.previous_slide();
        }
        ConsoleCommand::SetTime(seconds) => {
            if !controller.set_current_time(seconds).await {
                println!("Time can only be lowered while a presentation runs");
            }
        }
        ConsoleCommand::Settings(slides, minutes) => {
            if let Err(e) = controller.update_settings_draft(slides, minutes) {
                println!("{}", e);
            }
        }
        ConsoleCommand::Hide => {
            controller.hide();
            println!("Console hidden; the badge keeps counting. Type 'show' to reopen.");
            return;
        }
        ConsoleCommand::Show => {
            controller.show().await;
        }
        ConsoleCommand::Status => {}
        ConsoleCommand::Help => {
            print_help();
            return;
        }
    }
    print_view(&controller.view());
}

fn print_view(view: &ForegroundView) {
    match view.phase {
        ForegroundPhase::Running | ForegroundPhase::Paused => println!(
            "[{:?}] {}  slide {}/{} ({} left)  time {:.0}%  {}",
            view.phase,
            view.remaining_display,
            view.current_slide,
            view.slide_count,
            view.remaining_slides,
            view.time_progress,
            view.status,
        ),
        _ => println!(
            "[{:?}] settings: {} slides, {} min  {}",
            view.phase, view.slide_count, view.presentation_time, view.status,
        ),
    }
}

fn print_help() {
    println!("Commands: start [<slides> <minutes>] | pause | resume | stop | reset | next | prev");
    println!("          set <seconds> | settings <slides> <minutes> | hide | show | status | help");
}

/// Blocking stdin lives on its own thread so it never holds up runtime shutdown
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read console input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
