use clap::Parser;
use log::{error, info};

use opcontrol_rs::monitor::{Monitor, MonitorMessage};
use opcontrol_rs::opc::parser::Command;

/// Log every OPC message sent to this address.
#[derive(Parser)]
#[command(name = "opcmonitor")]
struct Cli {
    /// Address to accept OPC connections on.
    #[arg(short, long, default_value = "127.0.0.1:7890")]
    listen: String,
}

fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let monitor = Monitor::bind(&cli.listen)?;

    'message_loop: loop {
        match monitor.receiver().recv() {
            Ok(MonitorMessage::Connected { peer }) => info!("[monitor] {} connected", peer),
            Ok(MonitorMessage::Closed { peer }) => info!("[monitor] {} disconnected", peer),
            Ok(MonitorMessage::Opc { peer, message }) => match message.command {
                Command::SetPixels(pixels) => {
                    let first = pixels.first().map(|p| p.to_rgb24()).unwrap_or(0);
                    info!(
                        "[monitor] {} ch{}: {} pixels, first #{:06x}",
                        peer,
                        message.channel,
                        pixels.len(),
                        first
                    );
                }
                Command::ColorCorrection(correction) => {
                    info!("[monitor] {} ch{}: correction {:?}", peer, message.channel, correction);
                }
                Command::Unknown { command, data } => {
                    info!(
                        "[monitor] {} ch{}: command {:#04x}, {} bytes",
                        peer,
                        message.channel,
                        command,
                        data.len()
                    );
                }
            },
            Err(err) => {
                error!("{:?}", err);
                break 'message_loop;
            }
        }
    }

    Ok(())
}
