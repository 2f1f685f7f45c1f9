//! Starts, stops and reconfigures the animation worker.
//!
//! At most one worker thread runs at a time. Parameter updates go through
//! [`AnimationState`] from any thread; the worker reads them every tick.

use crossbeam::atomic::AtomicCell;
use crossbeam::channel::Sender;
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::animation::{mixer, pulse, spark, AnimationKind, LiveParams};
use crate::client::{Connector, OpcClient, OpcError, OpcResult};
use crate::commands;
use crate::config;
use crate::device::{Color, ColorCorrection};
use crate::opc;

/// Receives connection errors and lifecycle events from the controller.
pub trait ControllerListener: Send + Sync {
    /// Called at most once per failed run.
    fn on_server_connection_failure(&self);
    fn on_animation_started(&self, _kind: AnimationKind) {}
    fn on_animation_stopped(&self, _kind: AnimationKind) {}
}

/// Controller events, for listeners that forward to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    ConnectionFailure,
    Started(AnimationKind),
    Stopped(AnimationKind),
}

impl ControllerListener for Sender<ControllerEvent> {
    fn on_server_connection_failure(&self) {
        self.send(ControllerEvent::ConnectionFailure).ok();
    }

    fn on_animation_started(&self, kind: AnimationKind) {
        self.send(ControllerEvent::Started(kind)).ok();
    }

    fn on_animation_stopped(&self, kind: AnimationKind) {
        self.send(ControllerEvent::Stopped(kind)).ok();
    }
}

/// Live state shared between the controller, the worker and other threads.
pub struct AnimationState {
    running: AtomicBool,
    active: AtomicCell<Option<AnimationKind>>,
    /// Serializes stop and restart requests against the worker's restart check.
    control: Mutex<()>,
    restart: AtomicBool,
    workers: AtomicUsize,

    color: AtomicU32,
    span: AtomicU32,
    speed: AtomicU32,
    brightness: AtomicU32,
    gamma: f32,
    mixer_delay_ms: AtomicU64,
    pulse_delay_ms: AtomicU64,
    pulse_pause_ms: AtomicU64,

    led_count: AtomicUsize,
    server: Mutex<config::Server>,

    color_dirty: AtomicBool,
    span_dirty: AtomicBool,
    brightness_dirty: AtomicBool,
}

impl AnimationState {
    pub fn new(config: &config::Root) -> AnimationState {
        let animation = &config.animation;
        AnimationState {
            running: AtomicBool::new(false),
            active: AtomicCell::new(None),
            control: Mutex::new(()),
            restart: AtomicBool::new(false),
            workers: AtomicUsize::new(0),
            color: AtomicU32::new(animation.color & 0xFF_FFFF),
            span: AtomicU32::new(animation.span.min(100)),
            speed: AtomicU32::new(animation.speed.clamp(1, 100)),
            brightness: AtomicU32::new(animation.brightness.min(100)),
            gamma: animation.gamma,
            mixer_delay_ms: AtomicU64::new(animation.mixer_delay_ms),
            pulse_delay_ms: AtomicU64::new(animation.pulse_delay_ms),
            pulse_pause_ms: AtomicU64::new(animation.pulse_pause_ms),
            led_count: AtomicUsize::new(config.strip.led_count),
            server: Mutex::new(config.server.clone()),
            color_dirty: AtomicBool::new(false),
            span_dirty: AtomicBool::new(false),
            brightness_dirty: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.control.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The animation whose worker is currently alive, if any.
    pub fn active_kind(&self) -> Option<AnimationKind> {
        self.active.load()
    }

    /// Number of live worker threads. Never more than one.
    pub fn worker_count(&self) -> usize {
        self.workers.load(Ordering::SeqCst)
    }

    pub fn led_count(&self) -> usize {
        self.led_count.load(Ordering::SeqCst)
    }

    pub fn server(&self) -> config::Server {
        self.server.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn set_color(&self, color: Color) {
        self.color.store(color.to_rgb24(), Ordering::SeqCst);
        self.color_dirty.store(true, Ordering::SeqCst);
    }

    pub fn set_span(&self, span_percent: u32) {
        self.span.store(span_percent.min(100), Ordering::SeqCst);
        self.span_dirty.store(true, Ordering::SeqCst);
    }

    pub fn set_speed(&self, speed: u32) {
        self.speed.store(speed.clamp(1, 100), Ordering::SeqCst);
    }

    pub fn set_brightness(&self, percent: u32) {
        self.brightness.store(percent.min(100), Ordering::SeqCst);
        self.brightness_dirty.store(true, Ordering::SeqCst);
    }

    pub fn set_mixer_delay(&self, delay: Duration) {
        self.mixer_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_pulse_delay(&self, delay: Duration) {
        self.pulse_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_pulse_pause(&self, pause: Duration) {
        self.pulse_pause_ms.store(pause.as_millis() as u64, Ordering::SeqCst);
    }

    /// Change the strip length. A running animation restarts on a new session.
    /// Counts outside 1..=512 are rejected and leave everything untouched.
    pub fn set_led_count(&self, led_count: usize) -> OpcResult<()> {
        if led_count == 0 || led_count > opc::MAX_PIXELS {
            return Err(OpcError::PixelCount(led_count));
        }
        let _guard = self.lock();
        self.led_count.store(led_count, Ordering::SeqCst);
        self.request_restart_locked();
        Ok(())
    }

    /// Change the target server. A running animation restarts on a new session.
    pub fn set_server(&self, host: &str, port: u16) {
        let _guard = self.lock();
        {
            let mut server = self.server.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            server.host = host.to_string();
            server.port = port;
        }
        self.request_restart_locked();
    }

    fn request_restart_locked(&self) {
        if self.running.load(Ordering::SeqCst) {
            self.restart.store(true, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
        }
    }

    fn request_stop(&self) {
        let _guard = self.lock();
        self.restart.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Worker side: consume a pending restart and keep running if there was one.
    fn take_restart(&self) -> bool {
        let _guard = self.lock();
        if self.restart.swap(false, Ordering::SeqCst) {
            self.running.store(true, Ordering::SeqCst);
            true
        } else {
            false
        }
    }

    fn begin(&self, kind: AnimationKind) {
        self.running.store(true, Ordering::SeqCst);
        self.active.store(Some(kind));
        self.workers.fetch_add(1, Ordering::SeqCst);
    }

    /// Reset the running bookkeeping once a worker is done.
    fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.active.store(None);
        self.workers.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LiveParams for AnimationState {
    fn is_animating(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn color(&self) -> Color {
        Color::from_rgb24(self.color.load(Ordering::SeqCst))
    }

    fn spark_span(&self) -> u32 {
        self.span.load(Ordering::SeqCst)
    }

    fn speed(&self) -> u32 {
        self.speed.load(Ordering::SeqCst)
    }

    fn brightness(&self) -> u32 {
        self.brightness.load(Ordering::SeqCst)
    }

    fn gamma(&self) -> f32 {
        self.gamma
    }

    fn mixer_delay(&self) -> Duration {
        Duration::from_millis(self.mixer_delay_ms.load(Ordering::SeqCst))
    }

    fn pulse_delay(&self) -> Duration {
        Duration::from_millis(self.pulse_delay_ms.load(Ordering::SeqCst))
    }

    fn pulse_pause(&self) -> Duration {
        Duration::from_millis(self.pulse_pause_ms.load(Ordering::SeqCst))
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

/// A connected client together with the settings it was built for.
struct Session {
    client: OpcClient,
    server: config::Server,
    led_count: usize,
}

/// What a worker thread needs, cloned from the controller.
#[derive(Clone)]
struct WorkerContext {
    state: Arc<AnimationState>,
    connector: Arc<dyn Connector>,
    listener: Arc<dyn ControllerListener>,
    channel: u8,
}

impl WorkerContext {
    fn open_session(&self) -> OpcResult<Session> {
        let server = self.state.server();
        let led_count = self.state.led_count();
        let mut client = OpcClient::new(self.connector.connect(&server)?);
        client.add_device().add_pixel_strip(self.channel, led_count)?;
        Ok(Session {
            client,
            server,
            led_count,
        })
    }

    /// Reuse a cached session if it still matches the current settings.
    fn session(&self, cached: Option<Session>) -> OpcResult<Session> {
        match cached {
            Some(session)
                if session.client.is_open()
                    && session.led_count == self.state.led_count()
                    && session.server == self.state.server() =>
            {
                Ok(session)
            }
            _ => self.open_session(),
        }
    }

    fn fail(&self, kind: AnimationKind) -> Option<Session> {
        self.state.finish();
        self.listener.on_server_connection_failure();
        self.listener.on_animation_stopped(kind);
        None
    }

    /// Worker thread body. Returns the session on a clean exit.
    fn run(self, kind: AnimationKind, mut cached: Option<Session>) -> Option<Session> {
        self.listener.on_animation_started(kind);

        loop {
            let mut session = match self.session(cached.take()) {
                Ok(session) => session,
                Err(err) => {
                    error!("[control] Unable to start {}: {}", kind, err);
                    return self.fail(kind);
                }
            };

            let params: &AnimationState = &self.state;
            let result = match kind {
                AnimationKind::Spark => spark::run(&mut session.client, params),
                AnimationKind::Mixer => mixer::run(&mut session.client, params),
                AnimationKind::Pulse => pulse::run(&mut session.client, params),
            };

            if let Err(err) = result {
                error!("[control] {} failed: {}", kind, err);
                return self.fail(kind);
            }

            if self.state.take_restart() {
                info!("[control] Restarting {} with new settings", kind);
                continue;
            }

            if kind == AnimationKind::Pulse {
                let correction = ColorCorrection::from_brightness(params.gamma(), params.brightness());
                if let Err(err) = session.client.set_color_correction(correction) {
                    error!("[control] Unable to restore brightness: {}", err);
                    return self.fail(kind);
                }
            }

            self.state.finish();
            self.listener.on_animation_stopped(kind);
            return Some(session);
        }
    }
}

/// Single-flight control of the animation worker.
pub struct AnimationController {
    context: WorkerContext,
    worker: Option<JoinHandle<Option<Session>>>,
    /// Session kept between runs and one-shot commands.
    session: Option<Session>,
}

impl AnimationController {
    pub fn new(
        config: &config::Root,
        connector: Arc<dyn Connector>,
        listener: Arc<dyn ControllerListener>,
    ) -> AnimationController {
        AnimationController {
            context: WorkerContext {
                state: Arc::new(AnimationState::new(config)),
                connector,
                listener,
                channel: config.strip.channel,
            },
            worker: None,
            session: None,
        }
    }

    /// Shared state, for pushing updates from other threads.
    pub fn state(&self) -> Arc<AnimationState> {
        Arc::clone(&self.context.state)
    }

    pub fn active_kind(&self) -> Option<AnimationKind> {
        self.context.state.active_kind()
    }

    pub fn start_spark(&mut self, color: Color) {
        self.context.state.set_color(color);
        self.start(AnimationKind::Spark);
    }

    pub fn start_mixer(&mut self) {
        self.start(AnimationKind::Mixer);
    }

    pub fn start_pulse(&mut self, color: Color) {
        self.context.state.set_color(color);
        self.start(AnimationKind::Pulse);
    }

    fn start(&mut self, kind: AnimationKind) {
        if self.active_kind() == Some(kind) {
            debug!("[control] {} already running", kind);
            return;
        }

        self.stop();

        let context = self.context.clone();
        let cached = self.session.take();
        context.state.begin(kind);
        info!("[control] Starting {}", kind);
        self.worker = Some(thread::spawn(move || context.run(kind, cached)));
    }

    /// Clear the running flag and wait for the worker to return.
    pub fn stop(&mut self) {
        self.context.state.request_stop();
        if let Some(handle) = self.worker.take() {
            match handle.join() {
                Ok(session) => self.session = session,
                Err(_) => {
                    error!("[control] Animation worker panicked");
                    self.context.state.finish();
                }
            }
        }
    }

    pub fn update_color(&self, color: Color) {
        self.context.state.set_color(color);
    }

    pub fn update_span(&self, span_percent: u32) {
        self.context.state.set_span(span_percent);
    }

    pub fn update_speed(&self, speed: u32) {
        self.context.state.set_speed(speed);
    }

    pub fn update_brightness(&self, percent: u32) {
        self.context.state.set_brightness(percent);
    }

    pub fn update_mixer_delay(&self, delay: Duration) {
        self.context.state.set_mixer_delay(delay);
    }

    pub fn update_pulse_delay(&self, delay: Duration) {
        self.context.state.set_pulse_delay(delay);
    }

    pub fn update_pulse_pause(&self, pause: Duration) {
        self.context.state.set_pulse_pause(pause);
    }

    pub fn set_led_count(&mut self, led_count: usize) -> OpcResult<()> {
        self.context.state.set_led_count(led_count)
    }

    pub fn set_server(&mut self, host: &str, port: u16) {
        self.context.state.set_server(host, port);
    }

    /// Run `f` on an idle session, reporting a failure to the listener.
    fn with_session<F>(&mut self, f: F) -> OpcResult<()>
    where
        F: FnOnce(&mut OpcClient) -> OpcResult<()>,
    {
        let result = self
            .context
            .session(self.session.take())
            .and_then(|mut session| {
                f(&mut session.client)?;
                Ok(session)
            });

        match result {
            Ok(session) => {
                self.session = Some(session);
                Ok(())
            }
            Err(err) => {
                warn!("[control] Request failed: {}", err);
                self.context.listener.on_server_connection_failure();
                Err(err)
            }
        }
    }

    /// Stop any animation and set every pixel to one color.
    pub fn set_full_color(&mut self, color: Color) -> OpcResult<()> {
        self.stop();
        self.context.state.set_color(color);
        self.with_session(|client| {
            client.fill(color);
            client.show()
        })
    }

    /// Stop any animation and turn every pixel off.
    pub fn clear(&mut self) -> OpcResult<()> {
        self.stop();
        self.with_session(|client| {
            client.clear();
            client.show()
        })
    }

    /// Set brightness. A running spark picks it up on its next frame and a
    /// running pulse restores it when done.
    pub fn set_brightness(&mut self, percent: u32) -> OpcResult<()> {
        let state = Arc::clone(&self.context.state);
        state.set_brightness(percent);
        let correction = ColorCorrection::from_brightness(state.gamma(), state.brightness());

        match self.active_kind() {
            Some(AnimationKind::Spark) | Some(AnimationKind::Pulse) => Ok(()),
            Some(AnimationKind::Mixer) => {
                // the mixer owns the session; use a short-lived one
                let result = commands::set_brightness(&state.server(), correction);
                if result.is_err() {
                    self.context.listener.on_server_connection_failure();
                }
                result
            }
            None => {
                state.take_brightness_update();
                self.with_session(|client| client.set_color_correction(correction))
            }
        }
    }
}

impl Drop for AnimationController {
    fn drop(&mut self) {
        self.stop();
    }
}
