mod bridge;
mod engine;
mod eventlog;
mod settings;
mod telemetry;

use std::time::Duration;

use clap::Parser;
use log::{error, info};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

use engine::{Effects, Engine, OperatorCommand, PhaseAction};
use settings::Settings;

#[derive(Parser)]
#[command(name = "de1-controller")]
#[command(about = "DE1 simulator controller: drives a radio agent over TCP")]
struct Cli {
    /// Radio agent host (defaults to the saved setting)
    #[arg(long)]
    host: Option<String>,
    /// Radio agent port (defaults to the saved setting)
    #[arg(long)]
    port: Option<u16>,
}

/// One line typed at the console: either a panel command for the engine or
/// a read-only view.
enum ConsoleInput {
    Op(OperatorCommand),
    Status,
    Log,
    Profile,
}

fn parse_console(line: &str) -> Option<ConsoleInput> {
    if let Some(cmd) = OperatorCommand::parse(line) {
        return Some(ConsoleInput::Op(cmd));
    }
    match line.trim() {
        "status" => Some(ConsoleInput::Status),
        "log" => Some(ConsoleInput::Log),
        "profile" => Some(ConsoleInput::Profile),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut settings = Settings::load();
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }

    info!("connecting to {}:{}...", settings.host, settings.port);
    let stream = match bridge::connect(&settings.host, settings.port).await {
        Ok(stream) => stream,
        Err(e) => {
            error!(
                "cannot reach radio agent at {}:{}: {e}",
                settings.host, settings.port
            );
            std::process::exit(1);
        }
    };
    info!("connected to radio agent");
    settings.save();

    print_console_help();
    run(bridge::Link::new(stream)).await
}

fn print_console_help() {
    println!("operator console: power | espresso | steam | water | flush | stop | ghc <0-4>");
    println!("views:            status | log | profile");
}

/// Read operator lines off stdin, one parsed input per line.
fn spawn_operator_console(tx: mpsc::Sender<ConsoleInput>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_console(line) {
                Some(input) => {
                    if tx.send(input).await.is_err() {
                        break;
                    }
                }
                None => {
                    println!("unknown command: {line}");
                    print_console_help();
                }
            }
        }
    });
}

fn print_status(engine: &Engine) {
    let sim = engine.sim();
    println!(
        "state: {}/{}  ghc: {}",
        engine.state(),
        engine.substate(),
        engine.ghc_mode()
    );
    println!(
        "pressure: {:.1} bar  flow: {:.1} mL/s  temp: {:.1} C  timer: {:.1} s  water: {:.0} %  frame: {}",
        sim.pressure, sim.flow, sim.temperature, sim.shot_timer, sim.water_level, sim.frame_number
    );
}

fn print_log(engine: &Engine) {
    let log = engine.event_log();
    if log.is_empty() {
        println!("(log is empty)");
        return;
    }
    println!("=== BLE log ({} entries) ===", log.len());
    for entry in log.entries() {
        println!("{entry}");
    }
}

fn print_profile(engine: &Engine) {
    let profile = engine.profile();
    let Some(header) = profile.header() else {
        println!("(no profile uploaded yet)");
        return;
    };
    println!("{header}");
    for (i, frame) in profile.frames().iter().enumerate() {
        let kind = if profile.is_preinfuse(i) {
            "[Preinfuse]"
        } else {
            "[Pour]     "
        };
        println!("{kind} {frame}");
    }
}

/// The controller event loop: agent events, the operator console and the
/// three simulation timers, all funnelled through the one engine value.
async fn run(mut link: bridge::Link) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = Engine::new();

    let (console_tx, mut console_rx) = mpsc::channel(16);
    spawn_operator_console(console_tx);

    let mut shot_timer = interval(Duration::from_millis(telemetry::SAMPLE_PERIOD_MS));
    shot_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut water_timer = interval(Duration::from_secs(telemetry::WATER_PERIOD_SECS));
    water_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Single-shot phase timer, re-armed by the engine.
    let mut phase_deadline: Option<Instant> = None;

    loop {
        let effects = tokio::select! {
            event = link.next_event() => {
                match event {
                    Ok(Some(event)) => engine.on_link_event(event),
                    Ok(None) => {
                        info!("radio agent closed the control link");
                        break;
                    }
                    Err(e) => {
                        info!("control link lost: {e}");
                        break;
                    }
                }
            }

            Some(input) = console_rx.recv() => {
                match input {
                    ConsoleInput::Op(cmd) => engine.on_operator(cmd),
                    ConsoleInput::Status => {
                        print_status(&engine);
                        Effects::default()
                    }
                    ConsoleInput::Log => {
                        print_log(&engine);
                        Effects::default()
                    }
                    ConsoleInput::Profile => {
                        print_profile(&engine);
                        Effects::default()
                    }
                }
            }

            _ = shot_timer.tick(), if engine.shot_active() => engine.on_sample_tick(),

            _ = sleep_until(phase_deadline.unwrap_or_else(Instant::now)),
                if phase_deadline.is_some() => engine.on_phase_timeout(),

            _ = water_timer.tick() => engine.on_water_tick(),
        };

        // Timer changes apply before the commands go out, so a stop cannot
        // be overtaken by a late phase tick.
        match effects.phase {
            Some(PhaseAction::Arm(after)) => phase_deadline = Some(Instant::now() + after),
            Some(PhaseAction::Cancel) => phase_deadline = None,
            None => {}
        }

        for command in &effects.commands {
            link.send(command).await?;
        }
    }

    // Dropping the link cancels every controller-side timer with it; the
    // agent keeps advertising on its own.
    Ok(())
}
