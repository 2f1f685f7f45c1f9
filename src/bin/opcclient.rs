use clap::{Parser, Subcommand};
use crossbeam::channel::{self, RecvTimeoutError};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use opcontrol_rs::client::TcpConnector;
use opcontrol_rs::config::{self, ConfigError};
use opcontrol_rs::control::{AnimationController, ControllerEvent};
use opcontrol_rs::{commands, status_code, Color, ColorCorrection, OpcResult};

/// Drive LED strips through an Open Pixel Control server.
#[derive(Parser)]
#[command(name = "opcclient")]
struct Cli {
    /// YAML or JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Number of LEDs on the strip.
    #[arg(long)]
    leds: Option<usize>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set every LED to one color.
    Color {
        #[arg(value_parser = parse_color)]
        color: Color,
    },
    /// Turn every LED off.
    Clear,
    /// Set brightness in percent.
    Brightness { percent: u32 },
    /// Moving spark with a trail.
    Spark {
        #[arg(long, value_parser = parse_color)]
        color: Option<Color>,
        /// Trail length in percent of the strip.
        #[arg(long)]
        span: Option<u32>,
        /// 1 (slow) to 100 (fast).
        #[arg(long)]
        speed: Option<u32>,
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Sweep through the RGB channels.
    Mixer {
        /// Delay between two frames in milliseconds.
        #[arg(long)]
        delay: Option<u64>,
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
    /// Breathing effect.
    Pulse {
        #[arg(long, value_parser = parse_color)]
        color: Option<Color>,
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

/// Parse `ff0000`, `#ff0000` or `0xff0000`.
fn parse_color(value: &str) -> Result<Color, String> {
    let hex = value.trim_start_matches('#').trim_start_matches("0x");
    u32::from_str_radix(hex, 16)
        .map(Color::from_rgb24)
        .map_err(|err| format!("invalid color {:?}: {}", value, err))
}

fn load_config(cli: &Cli) -> Result<config::Root, ConfigError> {
    let mut root = match &cli.config {
        Some(path) if path.extension().map_or(false, |ext| ext == "json") => config::read_config_json(path)?,
        Some(path) => config::read_config_yaml(path)?,
        None => config::Root::default(),
    };

    if let Some(host) = &cli.host {
        root.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        root.server.port = port;
    }
    if let Some(leds) = cli.leds {
        root.strip.led_count = leds;
    }
    root.validate()?;
    Ok(root)
}

fn exit_code(result: &OpcResult<()>) -> ExitCode {
    match status_code(result) {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

/// Run an animation for a while, or until the connection fails.
fn animate<F>(root: &config::Root, seconds: u64, start: F) -> ExitCode
where
    F: FnOnce(&mut AnimationController),
{
    let (sender, receiver) = channel::unbounded::<ControllerEvent>();
    let mut controller = AnimationController::new(root, Arc::new(TcpConnector), Arc::new(sender));

    start(&mut controller);

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut failed = false;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match receiver.recv_timeout(remaining) {
            Ok(ControllerEvent::ConnectionFailure) => {
                error!("Lost connection to {}", root.server.addr());
                failed = true;
                break;
            }
            Ok(ControllerEvent::Started(kind)) => info!("{} started", kind),
            Ok(ControllerEvent::Stopped(kind)) => info!("{} stopped", kind),
            Err(RecvTimeoutError::Timeout) => break,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    controller.stop();
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    let root = load_config(&cli)?;
    let server = &root.server;
    let leds = root.strip.led_count;

    let code = match cli.command {
        Commands::Color { color } => exit_code(&commands::set_full_color(server, leds, color)),
        Commands::Clear => exit_code(&commands::clear(server, leds)),
        Commands::Brightness { percent } => {
            let correction = ColorCorrection::from_brightness(root.animation.gamma, percent);
            exit_code(&commands::set_brightness(server, correction))
        }
        Commands::Spark {
            color,
            span,
            speed,
            seconds,
        } => animate(&root, seconds, |controller| {
            if let Some(span) = span {
                controller.update_span(span);
            }
            if let Some(speed) = speed {
                controller.update_speed(speed);
            }
            controller.start_spark(color.unwrap_or_else(|| root.animation.color()));
        }),
        Commands::Mixer { delay, seconds } => animate(&root, seconds, |controller| {
            if let Some(delay) = delay {
                controller.update_mixer_delay(Duration::from_millis(delay));
            }
            controller.start_mixer();
        }),
        Commands::Pulse { color, seconds } => animate(&root, seconds, |controller| {
            controller.start_pulse(color.unwrap_or_else(|| root.animation.color()));
        }),
    };
    Ok(code)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
