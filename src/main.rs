//! grid-explorer - run a simulated exploration or watch a running robot
//!
//! ```bash
//! # Explore the default 6x7 arena, telemetry on port 1234
//! grid-explorer run
//!
//! # Custom arena and seed
//! grid-explorer run --config arena.toml --seed 7
//!
//! # Follow the telemetry stream
//! grid-explorer watch --addr 127.0.0.1:1234
//! ```

use clap::{Parser, Subcommand};
use grid_explorer::config::ExplorerConfig;
use grid_explorer::hardware::sim::SimRobot;
use grid_explorer::monitor::{Monitor, StatusBoard};
use grid_explorer::telemetry::{
    RobotState, TcpPublisher, Telemetry, TelemetryClient, TelemetryMessage,
};
use grid_explorer::{Arbitrator, ExplorerError, Result, RobotContext, standard_behaviors};
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "grid-explorer", version, about = "Subsumption grid exploration robot")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Explore the simulated arena until the lap completes
    Run {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Telemetry port override
        #[arg(short, long)]
        port: Option<u16>,

        /// Simulation noise seed override (0 = entropy)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Stop after this many arbitration ticks
        #[arg(long)]
        max_ticks: Option<u64>,
    },
    /// Print the telemetry stream of a running robot
    Watch {
        /// Robot telemetry address
        #[arg(short, long, default_value = "127.0.0.1:1234")]
        addr: String,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            port,
            seed,
            max_ticks,
        } => run(config, port, seed, max_ticks),
        Command::Watch { addr } => {
            init_logging("info");
            watch(&addr)
        }
    }
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    seed: Option<u64>,
    max_ticks: Option<u64>,
) -> Result<ExitCode> {
    let mut config = match &config_path {
        Some(path) => ExplorerConfig::load(path)?,
        None => ExplorerConfig::default(),
    };
    if let Some(port) = port {
        config.telemetry.port = port;
    }
    if let Some(seed) = seed {
        config.simulation.seed = seed;
    }
    config.validate()?;
    init_logging(&config.logging.level);

    info!("grid-explorer v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Using config: {}", path.display()),
        None => info!("Using default configuration"),
    }
    info!(
        "Arena {}x{} cells of {} cm, seed {}",
        config.arena.width, config.arena.height, config.arena.cell_size_cm, config.simulation.seed
    );

    let escape = Arc::new(AtomicBool::new(false));
    let handler_escape = Arc::clone(&escape);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        handler_escape.store(true, Ordering::SeqCst);
    })
    .map_err(|e| ExplorerError::Hardware(format!("Error setting Ctrl-C handler: {}", e)))?;

    let hardware = SimRobot::from_config(&config.arena, &config.simulation, &config.motion)?
        .with_escape(Arc::clone(&escape));

    let telemetry = Telemetry::new(config.telemetry.queue_capacity);
    let publisher = TcpPublisher::bind(&config.telemetry_address(), &telemetry)?;
    if config.telemetry.wait_for_client {
        info!("Waiting for a telemetry viewer on {}", publisher.local_addr());
        if !publisher.wait_for_client(None) {
            warn!("No telemetry viewer connected");
        }
    }

    let board = StatusBoard::new();
    let monitor = Monitor::spawn(board.clone(), &config.monitor)?;

    let mut robot = RobotContext::new(Box::new(hardware), &config.arena, telemetry, board)?;
    let mut arbitrator = Arbitrator::new(standard_behaviors(&config))?;

    let halt = match max_ticks {
        Some(limit) => arbitrator.run_for(&mut robot, limit),
        None => Some(arbitrator.run(&mut robot)),
    };

    monitor.stop();
    publisher.stop();
    drop(monitor);
    drop(publisher);

    Ok(match halt {
        Some(halt) => {
            info!(
                "Halted ({:?}) after {} ticks, {} moves",
                halt,
                arbitrator.ticks(),
                robot.cells_moved()
            );
            ExitCode::from(halt.exit_code())
        }
        None => ExitCode::SUCCESS,
    })
}

fn watch(address: &str) -> Result<ExitCode> {
    let mut client = TelemetryClient::connect(address, Duration::from_secs(5))?;
    info!("Watching {}", client.peer());

    let mut last_state: Option<RobotState> = None;
    while let Some(message) = client.recv()? {
        if message.is_close() {
            info!("Robot closed the stream");
            break;
        }
        match message {
            TelemetryMessage::Log { text } => println!("{}", text),
            TelemetryMessage::State(state) => {
                println!(
                    "---- cell {} | moves {} | {} ms ----",
                    state.current_cell, state.movements, state.elapsed_ms
                );
                for row in state.grid.probability_rows() {
                    println!("{}", row);
                }
                if state.lap_completed {
                    print_lap_summary(&state);
                }
                last_state = Some(state);
            }
        }
    }

    if let Some(state) = last_state.filter(|state| !state.lap_completed) {
        println!(
            "Stream ended at cell {} after {} moves",
            state.current_cell, state.movements
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn print_lap_summary(state: &RobotState) {
    println!("############## LAP COMPLETED ##############");
    println!("Elapsed time: {:.1} s", state.elapsed_ms as f64 / 1000.0);
    println!(
        "Visited cells: {} of {}",
        state.grid.visited_count(),
        state.grid.width * state.grid.height
    );
    println!("Movements: {}", state.movements);
    for row in state.grid.visit_rows() {
        println!("{}", row);
    }
}
