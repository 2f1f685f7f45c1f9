//! Frame generators for the running animations.
//!
//! Every animation runs as a blocking loop on a worker thread. The loop
//! re-checks [`LiveParams::is_animating`] on each iteration and returns on the
//! first failed send, leaving reconnects to the caller.

use std::fmt;
use std::time::Duration;

use crate::device::{Color, PixelStrip};

pub mod mixer;
pub mod pulse;
pub mod spark;

/// Something that draws successive frames into a strip.
pub trait Animation {
    /// Write the current frame into a strip. No I/O.
    fn draw(&mut self, strip: &mut PixelStrip);
    /// Advance to the next frame, once every strip has been drawn.
    fn step(&mut self) {}
}

/// Live animation parameters, owned by whoever orchestrates the animations.
///
/// Values may change between two reads; the `take_*` methods read and clear
/// the corresponding dirty flag.
pub trait LiveParams: Sync {
    /// The cooperative cancellation point.
    fn is_animating(&self) -> bool;
    fn color(&self) -> Color;
    /// Spark trail length in percent of the strip.
    fn spark_span(&self) -> u32;
    /// Spark speed, 1..=100.
    fn speed(&self) -> u32;
    /// Brightness in percent.
    fn brightness(&self) -> u32;
    fn gamma(&self) -> f32;
    fn mixer_delay(&self) -> Duration;
    fn pulse_delay(&self) -> Duration;
    fn pulse_pause(&self) -> Duration;

    fn take_color_update(&self) -> bool;
    fn take_span_update(&self) -> bool;
    fn take_brightness_update(&self) -> bool;
}

/// The animations the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationKind {
    Spark,
    Mixer,
    Pulse,
}

impl fmt::Display for AnimationKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AnimationKind::Spark => "spark",
            AnimationKind::Mixer => "mixer",
            AnimationKind::Pulse => "pulse",
        };
        f.write_str(name)
    }
}

/// Outcome of a sub-loop that may observe a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    /// Finished normally; the caller carries on.
    Continue,
    /// The running flag went false. Not an error.
    Stopped,
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Parameters that stay "running" for a fixed number of checks.
    pub(crate) struct Scripted {
        pub(crate) checks_left: AtomicUsize,
        pub(crate) color: Mutex<Color>,
        pub(crate) span: u32,
        pub(crate) speed: u32,
        pub(crate) brightness: u32,
        pub(crate) color_dirty: AtomicBool,
        pub(crate) span_dirty: AtomicBool,
        pub(crate) brightness_dirty: AtomicBool,
    }

    impl Scripted {
        pub(crate) fn running_for(checks: usize) -> Scripted {
            Scripted {
                checks_left: AtomicUsize::new(checks),
                color: Mutex::new(Color::new(255, 0, 0)),
                span: 50,
                speed: 100,
                brightness: 100,
                color_dirty: AtomicBool::new(false),
                span_dirty: AtomicBool::new(false),
                brightness_dirty: AtomicBool::new(false),
            }
        }
    }

    impl LiveParams for Scripted {
        fn is_animating(&self) -> bool {
            self.checks_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
        fn color(&self) -> Color {
            *self.color.lock().unwrap()
        }
        fn spark_span(&self) -> u32 {
            self.span
        }
        fn speed(&self) -> u32 {
            self.speed
        }
        fn brightness(&self) -> u32 {
            self.brightness
        }
        fn gamma(&self) -> f32 {
            crate::opc::DEFAULT_GAMMA
        }
        fn mixer_delay(&self) -> Duration {
            Duration::ZERO
        }
        fn pulse_delay(&self) -> Duration {
            Duration::ZERO
        }
        fn pulse_pause(&self) -> Duration {
            Duration::ZERO
        }
        fn take_color_update(&self) -> bool {
            self.color_dirty.swap(false, Ordering::SeqCst)
        }
        fn take_span_update(&self) -> bool {
            self.span_dirty.swap(false, Ordering::SeqCst)
        }
        fn take_brightness_update(&self) -> bool {
            self.brightness_dirty.swap(false, Ordering::SeqCst)
        }
    }
}
