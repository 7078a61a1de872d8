//! Pulselink CLI
//!
//! Session agent for wearable heart-rate devices.

use clap::{Parser, Subcommand};
use pulselink::autoconnect::{AutoConnectFlow, AutoConnectSettings};
use pulselink::config::Config;
use pulselink::device::sim::SimDeviceFactory;
use pulselink::discovery::{DiscoveredPeripheral, SimDiscovery};
use pulselink::session::SessionController;
use pulselink::VERSION;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "pulselink")]
#[command(version = VERSION)]
#[command(about = "Session agent for wearable heart-rate devices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the configured device and start monitoring
    Start {
        /// Use the simulated transport backend (no hardware required)
        #[arg(long)]
        simulate: bool,

        /// Override the configured target device name
        #[arg(long)]
        device: Option<String>,

        /// Override the configured device revision tag (2/3/4/5)
        #[arg(long)]
        revision: Option<String>,

        /// Override the configured auth key
        #[arg(long)]
        auth_key: Option<String>,
    },

    /// Show the effective configuration
    Config,

    /// Toggle an output sink or the continuous-mode flag
    Toggle {
        /// One of: file, csv, osc, continuous
        target: String,

        /// "on" or "off"
        state: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            simulate,
            device,
            revision,
            auth_key,
        } => cmd_start(simulate, device, revision, auth_key),
        Commands::Config => cmd_config(),
        Commands::Toggle { target, state } => cmd_toggle(&target, &state),
    }
}

fn cmd_start(
    simulate: bool,
    device: Option<String>,
    revision: Option<String>,
    auth_key: Option<String>,
) {
    println!("Pulselink v{VERSION}");
    println!();

    if !simulate {
        eprintln!("Error: no wireless transport backend is compiled into this build.");
        eprintln!("Run with --simulate to use the simulated device backend.");
        std::process::exit(1);
    }

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Error loading config: {e}");
        std::process::exit(1);
    });

    if let Some(name) = device {
        config.auto_connect.device_name = name;
    }
    if let Some(tag) = revision {
        config.auto_connect.device_version = tag;
    }
    if let Some(key) = auth_key {
        config.auto_connect.auth_key = Some(key);
    }
    if config.auto_connect.device_name.is_empty() {
        // The simulated peripheral has to be called something.
        config.auto_connect.device_name = "MiBand".to_string();
    }

    // Fail fast on bad identity criteria before touching the transport.
    let settings = match AutoConnectSettings::from_config(&config.auto_connect) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("  Target device: {}", settings.device_name);
    println!("  Revision: {:?}", settings.revision);
    println!("  Continuous mode: {}", config.continuous_mode);
    println!(
        "  Outputs: file={} csv={} osc={} (osc target {})",
        config.outputs.file, config.outputs.csv, config.outputs.osc, config.outputs.osc_target
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut controller = SessionController::new(config.continuous_mode, config.resolved_outputs());

    let (watcher, advertiser) = SimDiscovery::new();
    let (factory, drivers) = SimDeviceFactory::new();
    let mut flow = AutoConnectFlow::new(watcher, factory, settings.clone());

    if let Err(e) = flow.start() {
        eprintln!("Error starting discovery: {e}");
        std::process::exit(1);
    }

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        eprintln!("Warning: Could not set Ctrl+C handler: {e}");
    }

    // Play the remote end: advertise a non-matching peripheral, then the
    // target; once built, complete the handshake and emit samples.
    let sim_running = running.clone();
    let target_name = settings.device_name.clone();
    let sim_thread = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        advertiser.advertise(DiscoveredPeripheral::new("Some Other Band", "11:22:33:44:55:66"));
        thread::sleep(Duration::from_millis(200));
        advertiser.advertise(DiscoveredPeripheral::new(&target_name, "aa:bb:cc:dd:ee:ff"));

        let Ok(driver) = drivers.recv_timeout(Duration::from_secs(5)) else {
            return;
        };
        thread::sleep(Duration::from_millis(300));
        driver.authenticate();

        let mut tick: u16 = 0;
        while sim_running.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(1000));
            driver.push_sample(68 + tick % 12);
            tick = tick.wrapping_add(1);
        }
    });

    // Main event loop
    let mut last_epoch = controller.epoch();
    let mut last_status = controller.status_text().to_string();

    while running.load(Ordering::SeqCst) {
        if !flow.matched() {
            match flow.pump(&mut controller, Duration::from_millis(100)) {
                Ok(true) => println!("Adopted device: {}", controller.device_name().unwrap_or("?")),
                Ok(false) => {}
                Err(e) => {
                    eprintln!("Auto-connect error: {e}");
                    break;
                }
            }
        }

        if let Err(e) = controller.poll(Duration::from_millis(100)) {
            eprintln!("Session error: {e}");
        }

        if controller.epoch() != last_epoch {
            last_epoch = controller.epoch();
            if controller.status_text() != last_status {
                last_status = controller.status_text().to_string();
                println!("{last_status}");
            }

            // Start monitoring as soon as the device authenticates.
            if controller.actions().start {
                match controller.start_monitoring() {
                    Ok(()) => {
                        if let Some(session) = controller.session() {
                            println!(
                                "Monitoring started (session {}, sinks: {:?})",
                                session.id(),
                                session.sink_labels()
                            );
                        }
                    }
                    Err(e) => eprintln!("Error starting monitoring: {e}"),
                }
            }
        }

        let delivered = controller.pump_samples();
        if delivered > 0 {
            if let Some(session) = controller.session() {
                print!("\rSamples delivered: {}", session.delivered());
                let _ = std::io::stdout().flush();
            }
        }
    }

    println!();
    println!("Shutting down...");

    if controller.actions().stop {
        if let Err(e) = controller.stop_monitoring() {
            eprintln!("Error stopping monitoring: {e}");
        }
    }
    if controller.actions().disconnect {
        if let Err(e) = controller.disconnect() {
            eprintln!("Error disconnecting: {e}");
        }
    }
    let _ = flow.stop();
    let _ = sim_thread.join();

    println!("Done.");
}

fn cmd_config() {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Error loading config: {e}");
        std::process::exit(1);
    });

    println!("Config file: {:?}", Config::config_path());
    println!();
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error serializing config: {e}"),
    }
}

fn cmd_toggle(target: &str, state: &str) {
    let enabled = match state {
        "on" | "true" => true,
        "off" | "false" => false,
        other => {
            eprintln!("Error: state must be 'on' or 'off', got '{other}'");
            std::process::exit(1);
        }
    };

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Error loading config: {e}");
        std::process::exit(1);
    });

    match target {
        "file" => config.outputs.file = enabled,
        "csv" => config.outputs.csv = enabled,
        "osc" => config.outputs.osc = enabled,
        "continuous" => config.continuous_mode = enabled,
        other => {
            eprintln!("Error: unknown toggle '{other}' (expected file, csv, osc or continuous)");
            std::process::exit(1);
        }
    }

    if let Err(e) = config.save() {
        eprintln!("Error saving config: {e}");
        std::process::exit(1);
    }

    println!("{target} = {enabled}");
}
