use std::path::Path;
use std::time::Duration;
use std::{fs, io};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::Color;
use crate::opc;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Root {
    /// Pixel server to talk to.
    pub server: Server,
    /// Strip layout.
    pub strip: Strip,
    /// Initial animation parameters.
    pub animation: Animation,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Server {
    /// Host name or IP address of the OPC server.
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    /// Also used as the write timeout.
    pub read_timeout_ms: u64,
    pub reuse_address: bool,
}

impl Default for Server {
    fn default() -> Server {
        Server {
            host: "127.0.0.1".to_string(),
            port: opc::DEFAULT_PORT,
            connect_timeout_ms: 1000,
            read_timeout_ms: 1000,
            reuse_address: true,
        }
    }
}

impl Server {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Strip {
    /// Number of LEDs, 1..=512. One full strand by default.
    pub led_count: usize,
    /// Output channel of the strip.
    pub channel: u8,
}

impl Default for Strip {
    fn default() -> Strip {
        Strip {
            led_count: 64,
            channel: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Animation {
    /// Packed 0xRRGGBB color.
    pub color: u32,
    /// Spark trail length in percent of the strip.
    pub span: u32,
    /// Spark speed, 1..=100.
    pub speed: u32,
    /// Brightness in percent.
    pub brightness: u32,
    pub mixer_delay_ms: u64,
    pub pulse_delay_ms: u64,
    /// Pause between two pulses.
    pub pulse_pause_ms: u64,
    pub gamma: f32,
}

impl Default for Animation {
    fn default() -> Animation {
        Animation {
            color: 0xFF0000,
            span: 5,
            speed: 60,
            brightness: 100,
            mixer_delay_ms: 10,
            pulse_delay_ms: 10,
            pulse_pause_ms: 1000,
            gamma: opc::DEFAULT_GAMMA,
        }
    }
}

impl Animation {
    pub fn color(&self) -> Color {
        Color::from_rgb24(self.color)
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub fn read_config_yaml<T: AsRef<Path>>(path: T) -> ConfigResult<Root> {
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let root: Root = serde_yaml::from_reader(reader)?;
    root.validate()?;
    Ok(root)
}

pub fn read_config_json<T: AsRef<Path>>(path: T) -> ConfigResult<Root> {
    let file = fs::File::open(path)?;
    let reader = io::BufReader::new(file);
    let root: Root = serde_json::from_reader(reader)?;
    root.validate()?;
    Ok(root)
}

impl Root {
    /// Quick sanity check for the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        let leds = self.strip.led_count;
        if leds == 0 || leds > opc::MAX_PIXELS {
            return Err(ConfigError::Invalid(format!(
                "ledCount must be within 1..={}, got {}",
                opc::MAX_PIXELS,
                leds
            )));
        }
        let animation = &self.animation;
        if animation.span > 100 {
            return Err(ConfigError::Invalid(format!("span is a percentage, got {}", animation.span)));
        }
        if animation.speed == 0 || animation.speed > 100 {
            return Err(ConfigError::Invalid(format!("speed must be within 1..=100, got {}", animation.speed)));
        }
        if animation.brightness > 100 {
            return Err(ConfigError::Invalid(format!(
                "brightness is a percentage, got {}",
                animation.brightness
            )));
        }
        if self.server.host.is_empty() {
            return Err(ConfigError::Invalid("server host is empty".to_string()));
        }
        Ok(())
    }
}
