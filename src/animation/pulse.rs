//! Breathing effect driven by the device color correction.

use log::info;

use super::{pause, LiveParams, Ramp};
use crate::client::{OpcClient, OpcResult};
use crate::device::ColorCorrection;

/// Brightness steps per ramp, 0.1 apart.
pub const RAMP_STEPS: u32 = 10;

fn send_level(client: &mut OpcClient, gamma: f32, level: f32) -> OpcResult<()> {
    client.set_color_correction(ColorCorrection::uniform(gamma, level))?;
    client.show()
}

/// Ramp brightness up (0.0 to 0.9) or down (1.0 to 0.1), then settle at the
/// end value.
pub fn ramp(client: &mut OpcClient, ascending: bool, params: &dyn LiveParams) -> OpcResult<Ramp> {
    let gamma = params.gamma();
    for i in 0..RAMP_STEPS {
        let step = if ascending { i } else { RAMP_STEPS - i };
        send_level(client, gamma, step as f32 / RAMP_STEPS as f32)?;

        if !params.is_animating() {
            return Ok(Ramp::Stopped);
        }
        pause(params.pulse_delay());
    }

    send_level(client, gamma, if ascending { 1.0 } else { 0.0 })?;
    Ok(Ramp::Continue)
}

/// Run pulses until the running flag clears or a send fails.
pub fn run(client: &mut OpcClient, params: &dyn LiveParams) -> OpcResult<()> {
    info!("[pulse] Running");
    if params.is_animating() {
        send_level(client, params.gamma(), 0.0)?;
    }

    while params.is_animating() {
        client.fill(params.color());

        if ramp(client, true, params)? == Ramp::Stopped {
            break;
        }
        if ramp(client, false, params)? == Ramp::Stopped {
            break;
        }

        if !params.is_animating() {
            break;
        }
        pause(params.pulse_pause());
    }

    info!("[pulse] Stopped");
    Ok(())
}
