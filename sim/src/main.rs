//! `uas-sim`: bench harness CLI for the supervisory core
//!
//! One-shot subcommands spin up a simulated vehicle, run the requested
//! operation, print the outcome, and exit 0 on success or 1 on an
//! argument error or a rejected operation. `start` runs an interactive
//! session with a console.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use uas_commander::{CalibrationKind, CommanderConfig};
use uas_core_shared::command::{AckResult, VehicleCommand};
use uas_core_shared::geo::FenceFile;
use uas_core_shared::params::Parameters;
use uas_core_shared::sensors::{TransponderReport, VtolStatus};
use uas_core_shared::time::Duration;
use uas_core_shared::types::MainState;
use uas_flight_sim::Harness;

#[derive(Debug, Parser)]
#[command(name = "uas-sim", version, about = "Supervisory core bench harness")]
struct Options {
    /// Parameter file to load
    #[arg(long)]
    params: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run an interactive session
    Start {
        /// Hardware-in-the-loop: preflight checks pass without sensors
        #[arg(long)]
        hil: bool,
    },
    /// Run a sensor calibration
    Calibrate {
        /// One of gyro, mag, mag_quick, baro, accel, accel_quick, level,
        /// airspeed, esc
        sensor: String,
    },
    /// Report the preflight check verdicts
    Check,
    /// Arm the vehicle
    Arm {
        /// Skip the health gates
        #[arg(short, long)]
        force: bool,
    },
    /// Disarm the vehicle
    Disarm {
        /// Disarm even in flight
        #[arg(short, long)]
        force: bool,
    },
    /// Take off and hold
    Takeoff,
    /// Land at the current position
    Land,
    /// Toggle the simulated VTOL transition state
    Transition,
    /// Switch the main flight mode
    Mode {
        /// Mode name, e.g. posctl, loiter, mission, rtl
        name: String,
    },
    /// Put the receiver into bind mode
    Pair,
    /// Engage or clear the motor lockdown
    Lockdown {
        /// "on" or "off"
        state: String,
    },
    /// Set the origin of the local frame
    SetEkfOrigin {
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lon: f64,
        /// Altitude in metres
        alt: f32,
    },
    /// Shut the vehicle down
    Poweroff,
    /// Validate a geofence file
    Fencefile {
        /// Path to the fence description
        path: PathBuf,
    },
    /// Inject a canned traffic report
    FakeTraffic,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let options = Options::parse();
    match run(options) {
        Ok(()) => {}
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(options: Options) -> Result<()> {
    let params = match &options.params {
        Some(path) => Parameters::load(path).context("loading parameters")?,
        None => Parameters::default(),
    };

    match options.command {
        Command::Start { hil } => interactive(params, hil),
        Command::Calibrate { sensor } => {
            let kind = parse_calibration(&sensor)?;
            let mut harness = boot(params);
            let mut cmd = VehicleCommand::new(uas_core_shared::command::CommandId::Calibration);
            match kind {
                CalibrationKind::Gyro => cmd.param1 = 1.0,
                CalibrationKind::Mag => cmd.param2 = 1.0,
                CalibrationKind::MagQuick => cmd.param2 = 2.0,
                CalibrationKind::Baro => cmd.param3 = 1.0,
                CalibrationKind::Accel => cmd.param5 = 1.0,
                CalibrationKind::Level => cmd.param5 = 2.0,
                CalibrationKind::AccelQuick => cmd.param5 = 4.0,
                CalibrationKind::Airspeed => cmd.param6 = 1.0,
                CalibrationKind::Esc => cmd.param7 = 1.0,
            }
            let result = issue(&mut harness, cmd)?;
            // let the worker finish and report
            harness.run_for(Duration::from_secs(1));
            for event in harness.take_events() {
                println!("{}: {}", event.id, event.message);
            }
            expect_accepted(result)
        }
        Command::Check => {
            let mut harness = boot(params);
            harness.run_for(Duration::from_millis(200));
            let flags = harness
                .vehicle
                .bus
                .status_flags
                .latest()
                .context("no status flags published")?;
            println!("preflight checks pass: {}", flags.pre_flight_checks_pass);
            println!("gps valid:             {}", flags.gps_valid);
            println!("global position valid: {}", flags.global_position_valid);
            println!("local position valid:  {}", flags.local_position_valid);
            println!("home position valid:   {}", flags.home_position_valid);
            println!("battery warning:       {:?}", flags.battery_warning);
            if flags.pre_flight_checks_pass {
                Ok(())
            } else {
                bail!("preflight checks fail")
            }
        }
        Command::Arm { force } => {
            let mut harness = boot(params);
            let result = issue(&mut harness, VehicleCommand::arm_disarm(true, force))?;
            println!("arming: {result:?}, armed: {}", harness.armed());
            expect_accepted(result)
        }
        Command::Disarm { force } => {
            let mut harness = boot(params);
            issue(&mut harness, VehicleCommand::arm_disarm(true, false))?;
            let result = issue(&mut harness, VehicleCommand::arm_disarm(false, force))?;
            println!("disarming: {result:?}");
            expect_accepted(result)
        }
        Command::Takeoff => {
            let mut harness = boot(params);
            let result = issue(&mut harness, VehicleCommand::set_mode(MainState::AutoTakeoff))?;
            expect_accepted(result)?;
            let result = issue(&mut harness, VehicleCommand::arm_disarm(true, false))?;
            expect_accepted(result)?;
            let airborne = harness.run_until(Duration::from_secs(30), |h| !h.truth.landed);
            if !airborne {
                bail!("vehicle never left the ground");
            }
            println!("airborne, nav state {:?}", harness.nav_state());
            Ok(())
        }
        Command::Land => {
            let mut harness = fly(params)?;
            let result = issue(&mut harness, VehicleCommand::new(
                uas_core_shared::command::CommandId::Land,
            ))?;
            expect_accepted(result)?;
            let landed = harness.run_until(Duration::from_secs(120), |h| h.truth.landed);
            if !landed {
                bail!("vehicle never landed");
            }
            println!("landed");
            Ok(())
        }
        Command::Transition => {
            let mut harness = boot(params);
            let current = harness.truth.vtol.unwrap_or_default();
            harness.truth.vtol = Some(VtolStatus {
                in_transition: !current.in_transition,
                in_transition_to_fw: !current.in_transition,
                quadchute_request: false,
                timestamp: harness.now,
            });
            harness.run_for(Duration::from_millis(100));
            println!(
                "transition {}",
                if harness.truth.vtol.map(|v| v.in_transition).unwrap_or(false) {
                    "started"
                } else {
                    "ended"
                }
            );
            Ok(())
        }
        Command::Mode { name } => {
            let Some(mode) = MainState::from_name(&name) else {
                bail!("unknown mode '{name}'");
            };
            let mut harness = boot(params);
            let result = issue(&mut harness, VehicleCommand::set_mode(mode))?;
            println!("mode {mode}: {result:?}");
            expect_accepted(result)
        }
        Command::Pair => {
            let mut harness = boot(params);
            let result = issue(&mut harness, VehicleCommand::new(
                uas_core_shared::command::CommandId::StartRxPair,
            ))?;
            expect_accepted(result)
        }
        Command::Lockdown { state } => {
            let level = match state.as_str() {
                "on" => 2.0,
                "off" => 0.0,
                _ => bail!("lockdown takes 'on' or 'off'"),
            };
            let mut harness = boot(params);
            let result = issue(&mut harness, VehicleCommand::flight_termination(level))?;
            expect_accepted(result)
        }
        Command::SetEkfOrigin { lat, lon, alt } => {
            let mut harness = boot(params);
            let mut cmd =
                VehicleCommand::new(uas_core_shared::command::CommandId::SetGpsGlobalOrigin);
            cmd.param3 = alt;
            cmd.param6 = lat;
            cmd.param7 = lon;
            let result = issue(&mut harness, cmd)?;
            expect_accepted(result)
        }
        Command::Poweroff => {
            let mut harness = boot(params);
            let result = issue(&mut harness, VehicleCommand::reboot_shutdown(2))?;
            expect_accepted(result)
        }
        Command::Fencefile { path } => {
            let fence = FenceFile::load(&path).context("loading fence file")?;
            println!(
                "fence loaded: {} inclusion shape(s)",
                fence.inclusion.len()
            );
            Ok(())
        }
        Command::FakeTraffic => {
            let mut harness = boot(params);
            let truth = harness.truth.clone();
            harness.vehicle.bus.transponder_report.push(TransponderReport {
                icao_address: 0xAB_CDEF,
                callsign: "FAKE123".into(),
                lat: truth.lat,
                lon: truth.lon,
                alt: truth.alt + 50.0,
                heading: 0.0,
                hor_velocity: 60.0,
                timestamp: harness.now,
            });
            harness.run_for(Duration::from_millis(100));
            for event in harness.take_events() {
                println!("{}: {}", event.id, event.message);
            }
            Ok(())
        }
    }
}

/// Boot a simulated vehicle to standby
fn boot(params: Parameters) -> Harness {
    let mut harness = Harness::new(params, CommanderConfig::default());
    harness.run_for(Duration::from_millis(700));
    harness
}

/// Boot, arm, and climb to a hold
fn fly(params: Parameters) -> Result<Harness> {
    let mut harness = boot(params);
    expect_accepted(issue(
        &mut harness,
        VehicleCommand::set_mode(MainState::AutoTakeoff),
    )?)?;
    expect_accepted(issue(&mut harness, VehicleCommand::arm_disarm(true, false))?)?;
    if !harness.run_until(Duration::from_secs(60), |h| {
        h.nav_state() == uas_core_shared::types::NavState::AutoLoiter
    }) {
        bail!("takeoff never completed");
    }
    Ok(harness)
}

/// Push a command and wait for its single ACK
fn issue(harness: &mut Harness, mut cmd: VehicleCommand) -> Result<AckResult> {
    cmd.timestamp = harness.now;
    cmd.from_external = true;
    harness.vehicle.bus.vehicle_command.push(cmd);
    let mut result = None;
    let done = harness.run_until(Duration::from_secs(2), |h| {
        if let Some(ack) = h.vehicle.bus.command_ack.pop() {
            result = Some(ack.result);
            true
        } else {
            false
        }
    });
    if !done {
        bail!("command was never acknowledged");
    }
    Ok(result.expect("ack present"))
}

fn expect_accepted(result: AckResult) -> Result<()> {
    if result == AckResult::Accepted {
        Ok(())
    } else {
        bail!("rejected: {result:?}")
    }
}

fn parse_calibration(sensor: &str) -> Result<CalibrationKind> {
    Ok(match sensor {
        "gyro" => CalibrationKind::Gyro,
        "mag" => CalibrationKind::Mag,
        "mag_quick" | "magquick" => CalibrationKind::MagQuick,
        "baro" => CalibrationKind::Baro,
        "accel" => CalibrationKind::Accel,
        "accel_quick" | "accelquick" => CalibrationKind::AccelQuick,
        "level" => CalibrationKind::Level,
        "airspeed" => CalibrationKind::Airspeed,
        "esc" => CalibrationKind::Esc,
        _ => bail!("unknown calibration '{sensor}'"),
    })
}

/// Interactive session: tick the vehicle in real time and map console
/// lines onto commands and action requests
fn interactive(params: Parameters, hil: bool) -> Result<()> {
    let config = CommanderConfig {
        hil,
        ..CommanderConfig::default()
    };
    let mut harness = Harness::new(params, config);

    // console reader on its own thread; the loop stays single-threaded
    let (line_tx, line_rx) = std::sync::mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    println!("uas-sim interactive session");
    println!("commands: arm, disarm, takeoff, land, rtl, mode <name>, kill, unkill, status, quit");

    loop {
        harness.step();
        std::thread::sleep(std::time::Duration::from_millis(20));

        for event in harness.take_events() {
            println!("[{:?}] {}", event.severity, event.message);
        }
        for ack in harness.take_acks() {
            println!("ack: {:?} -> {:?}", ack.command, ack.result);
        }

        while let Ok(line) = line_rx.try_recv() {
            let parts: Vec<&str> = line.trim().split_whitespace().collect();
            let Some(&word) = parts.first() else {
                continue;
            };
            let bus = &harness.vehicle.bus;
            match word {
                "arm" => {
                    bus.vehicle_command.push(VehicleCommand::arm_disarm(true, false));
                }
                "disarm" => {
                    bus.vehicle_command.push(VehicleCommand::arm_disarm(false, false));
                }
                "takeoff" => {
                    bus.vehicle_command
                        .push(VehicleCommand::set_mode(MainState::AutoTakeoff));
                    bus.vehicle_command.push(VehicleCommand::arm_disarm(true, false));
                }
                "land" => {
                    bus.vehicle_command
                        .push(VehicleCommand::new(uas_core_shared::command::CommandId::Land));
                }
                "rtl" => {
                    bus.vehicle_command
                        .push(VehicleCommand::set_mode(MainState::AutoRtl));
                }
                "mode" => {
                    if let Some(mode) = parts.get(1).and_then(|n| MainState::from_name(n)) {
                        bus.vehicle_command.push(VehicleCommand::set_mode(mode));
                    } else {
                        println!("unknown mode");
                    }
                }
                "kill" => {
                    bus.action_request.push(uas_core_shared::command::ActionRequest {
                        source: uas_core_shared::command::ActionSource::RcSwitch,
                        action: uas_core_shared::command::RequestedAction::Kill,
                        mode: None,
                        timestamp: harness.now,
                    });
                }
                "unkill" => {
                    bus.action_request.push(uas_core_shared::command::ActionRequest {
                        source: uas_core_shared::command::ActionSource::RcSwitch,
                        action: uas_core_shared::command::RequestedAction::Unkill,
                        mode: None,
                        timestamp: harness.now,
                    });
                }
                "status" => {
                    let status = harness.vehicle.commander.status();
                    println!(
                        "arming {:?}, nav {:?}, failsafe {}, alt {:.1} m",
                        status.arming_state,
                        status.nav_state,
                        status.failsafe,
                        harness.truth.alt
                    );
                }
                "quit" | "exit" => return Ok(()),
                other => println!("unknown command '{other}'"),
            }
        }

        if harness.vehicle.commander.should_exit() {
            println!("commander requested shutdown");
            return Ok(());
        }
    }
}
