//! Color mixer: sweeps one RGB channel at a time across the whole strip.

use log::info;

use super::{pause, LiveParams, Ramp};
use crate::client::{OpcClient, OpcResult};
use crate::device::Color;

/// Steps per sweep.
pub const STEPS: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

/// One sweep: `channel` runs 255 down to 1 (or 0 up to 254) while the
/// other two channels keep their value from `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Phase {
    pub channel: Channel,
    pub descending: bool,
    pub base: Color,
}

impl Phase {
    const fn new(channel: Channel, descending: bool, base: Color) -> Phase {
        Phase {
            channel,
            descending,
            base,
        }
    }

    pub fn color_at(&self, step: u8) -> Color {
        let value = if self.descending { 255 - step } else { step };
        let mut color = self.base;
        match self.channel {
            Channel::Red => color.red = value,
            Channel::Green => color.green = value,
            Channel::Blue => color.blue = value,
        }
        color
    }
}

/// The fixed round-robin of sweeps.
pub const PHASES: [Phase; 6] = [
    Phase::new(Channel::Green, true, Color::new(255, 0, 0)),
    Phase::new(Channel::Blue, false, Color::new(255, 0, 0)),
    Phase::new(Channel::Red, true, Color::new(0, 0, 255)),
    Phase::new(Channel::Green, false, Color::new(0, 0, 255)),
    Phase::new(Channel::Blue, true, Color::new(0, 255, 0)),
    Phase::new(Channel::Red, false, Color::new(0, 255, 0)),
];

fn sweep(client: &mut OpcClient, phase: &Phase, params: &dyn LiveParams) -> OpcResult<Ramp> {
    for step in 0..STEPS {
        client.fill(phase.color_at(step));
        client.show()?;

        if !params.is_animating() {
            return Ok(Ramp::Stopped);
        }
        pause(params.mixer_delay());
    }
    Ok(Ramp::Continue)
}

/// Run the mixer until the running flag clears or a send fails.
pub fn run(client: &mut OpcClient, params: &dyn LiveParams) -> OpcResult<()> {
    info!("[mixer] Running");
    while params.is_animating() {
        for phase in PHASES.iter() {
            if sweep(client, phase, params)? == Ramp::Stopped {
                info!("[mixer] Stopped");
                return Ok(());
            }
        }
    }
    info!("[mixer] Stopped");
    Ok(())
}
