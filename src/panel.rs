//! Terminal front panel, the one registered observer.
//!
//! Owns all rendering and user input. Talks to the core only through
//! the dispatcher, the session handle and the board, so it exercises
//! the same surface a graphical front end would.

use std::time::Duration;

use log::debug;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::io::{self, AsyncBufReadExt};

use crate::dispatcher::CommandDispatcher;
use crate::protocol::{Alarm, StatusSnapshot};
use crate::scheduler;
use crate::session::{PeerInfo, SessionHandle};
use crate::state::{ConnectionState, ConsoleEvent, ConsoleObserver, StatusBoard};

/// Prints every board change as it happens.
pub struct PanelScreen;

impl ConsoleObserver for PanelScreen {
    fn connection_changed(&self, state: ConnectionState, peer: Option<&PeerInfo>) {
        match state {
            ConnectionState::Disconnected => println!("Disconnected"),
            ConnectionState::Scanning => println!("Scanning for devices..."),
            ConnectionState::Connecting => {
                println!("Connecting to {}...", describe_peer(peer))
            }
            ConnectionState::Connected => {
                println!("Connected to {}", describe_peer(peer))
            }
        }
    }

    fn status_changed(&self, snapshot: &StatusSnapshot) {
        render_status(snapshot);
    }

    fn notice(&self, event: &ConsoleEvent) {
        match event {
            ConsoleEvent::MotorStopped { motor_id, reason } => {
                println!("Motor {} stopped: {reason}", motor_id + 1)
            }
            ConsoleEvent::CommandAcked { family } => {
                println!("Command {family} successful")
            }
            ConsoleEvent::CommandFailed { family, error } => {
                println!("Command {family} failed: {error}")
            }
            ConsoleEvent::ConsoleFault { message } => println!("Error: {message}"),
        }
    }
}

fn describe_peer(peer: Option<&PeerInfo>) -> String {
    match peer {
        Some(peer) => {
            peer.name.clone().unwrap_or_else(|| peer.addr.clone())
        }
        None => "console".to_string(),
    }
}

fn render_status(snapshot: &StatusSnapshot) {
    println!("--- Console status ---");
    println!("Device time: {}", snapshot.time);
    println!("Active alarms: {}", snapshot.active_alarms);
    println!("Scheduled alarms: {}", snapshot.scheduled_alarms);
    for (index, reading) in snapshot.fsr_readings.iter().enumerate() {
        println!("Sensor {}: {reading:.1} kg", index + 1);
    }
    println!("Trigger threshold: {} kg", snapshot.fsr_threshold);
    for (index, active) in snapshot.motors_active.iter().enumerate() {
        let state = if *active { "Active" } else { "Inactive" };
        println!("Motor {}: {state}", index + 1);
    }
    if snapshot.any_motor_active() {
        println!("Motors running");
    }
    if snapshot.any_sensor_over_threshold() {
        println!("Pressure detected");
    }
    if let Some(current) = snapshot.current_temperature {
        println!("Current temperature: {current:.1} °C");
    }
    if let Some(delta) = snapshot.temperature_delta() {
        println!("To target: {delta:+.1} °C");
    }
}

fn render_pending(pending: &[Alarm]) {
    if pending.is_empty() {
        println!("No alarms scheduled");
        return;
    }
    for (index, alarm) in pending.iter().enumerate() {
        println!(
            "{}. {} at {} (motor {}, {}s at {}%)",
            index + 1,
            alarm.label,
            alarm.time,
            alarm.motor_id + 1,
            alarm.duration,
            alarm.intensity
        );
    }
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

const HELP: &str = "\
Commands:
  connect                     scan for the console and connect
  disconnect                  drop the console link
  status                      request a status report
  sync                        push the client clock to the console
  alarm HH:MM [label]         add an alarm and send the schedule
  schedule                    resend the pending schedule
  clear                       wipe the schedule, here and on the console
  test <motor-id 0-2> [secs]  run one motor briefly
  stop                        stop all motors
  threshold <kilograms>       set the sensor trigger threshold
  temp <celsius>              set the heater target
  config <section> <option> <value>  write one console config option
  show                        print link, status and pending alarms
  quit";

/// Runs the line-oriented panel until quit or stdin closes.
pub async fn run(
    dispatcher: CommandDispatcher, session: SessionHandle, board: StatusBoard,
) -> io::Result<()> {
    let mut pending: Vec<Alarm> = Vec::new();

    println!("YuSmart console panel. Type help for commands.");

    let mut lines = io::BufReader::new(io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else { continue };
        let args: Vec<&str> = parts.collect();

        // dispatcher failures reach the screen as events, so command
        // outcomes below are deliberately not printed twice
        match verb {
            "connect" => match session.connect().await {
                Ok(_) => request_initial_status(&dispatcher),
                Err(e) => println!("Connection failed: {e}"),
            },
            "disconnect" => {
                if let Err(e) = session.disconnect().await {
                    println!("Disconnect failed: {e}");
                }
            }
            "status" => {
                let _ = dispatcher.status_request().await;
            }
            "sync" => {
                let _ = dispatcher.sync_time(local_now()).await;
            }
            "alarm" => match args.first() {
                Some(clock) => match scheduler::parse_clock(clock) {
                    Ok(clock_time) => {
                        let fire =
                            scheduler::next_occurrence(clock_time, local_now());
                        let label = if args.len() > 1 {
                            Some(args[1..].join(" "))
                        } else {
                            None
                        };
                        pending.push(scheduler::build_alarm(
                            fire,
                            None,
                            label.as_deref(),
                        ));
                        println!("Alarm set for {clock}");
                        let _ = dispatcher.schedule(pending.clone()).await;
                    }
                    Err(e) => println!("{e}"),
                },
                None => println!("usage: alarm HH:MM [label]"),
            },
            "schedule" => {
                if pending.is_empty() {
                    println!("No alarms to send");
                } else {
                    let _ = dispatcher.schedule(pending.clone()).await;
                }
            }
            "clear" => {
                pending.clear();
                println!("Cleared alarm schedule");
                let _ = dispatcher.schedule(Vec::new()).await;
            }
            "test" => match args.first().and_then(|raw| raw.parse::<u8>().ok()) {
                Some(motor_id) => {
                    let duration = args
                        .get(1)
                        .and_then(|raw| raw.parse::<u32>().ok())
                        .unwrap_or(5);
                    let _ = dispatcher.motor_test(motor_id, duration).await;
                }
                None => println!("usage: test <motor-id 0-2> [seconds]"),
            },
            "stop" => {
                let _ = dispatcher.stop_all().await;
            }
            "threshold" => {
                match args.first().and_then(|raw| raw.parse::<f64>().ok()) {
                    Some(threshold) => {
                        let _ = dispatcher.set_fsr_threshold(threshold).await;
                    }
                    None => println!("usage: threshold <kilograms>"),
                }
            }
            "temp" => match args.first().and_then(|raw| raw.parse::<f64>().ok()) {
                Some(target) => {
                    let _ = dispatcher.set_temperature(target).await;
                }
                None => println!("usage: temp <celsius>"),
            },
            "config" => {
                if args.len() < 3 {
                    println!("usage: config <section> <option> <value>");
                } else {
                    let raw = args[2..].join(" ");
                    // bare words become JSON strings
                    let value = serde_json::from_str(&raw)
                        .unwrap_or_else(|_| Value::String(raw.clone()));
                    let _ =
                        dispatcher.update_config(args[0], args[1], value).await;
                }
            }
            "show" => {
                println!("Link: {:?}", board.connection());
                if let Some(peer) = board.peer() {
                    println!("Console: {}", describe_peer(Some(&peer)));
                }
                match board.status() {
                    Some(snapshot) => render_status(&snapshot),
                    None => println!("No status received yet"),
                }
                render_pending(&pending);
            }
            "help" => println!("{HELP}"),
            "quit" | "exit" => break,
            _ => println!("Unknown command {verb}, type help"),
        }
    }

    Ok(())
}

/// The console needs a moment after connecting before it answers
/// requests, so the first status poll is delayed a little.
fn request_initial_status(dispatcher: &CommandDispatcher) {
    let dispatcher = dispatcher.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Err(e) = dispatcher.status_request().await {
            debug!("initial status request failed: {e}");
        }
    });
}
