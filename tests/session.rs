use std::io::Write;
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use opcontrol_rs::animation::AnimationKind;
use opcontrol_rs::client::TcpConnector;
use opcontrol_rs::config::{self, Root};
use opcontrol_rs::control::{AnimationController, ControllerListener};
use opcontrol_rs::monitor::{Monitor, MonitorMessage};
use opcontrol_rs::opc::parser::{Command, Message};
use opcontrol_rs::{commands, status_code, Color, ColorCorrection, OpcError};

fn server_for(monitor: &Monitor) -> config::Server {
    config::Server {
        host: "127.0.0.1".to_string(),
        port: monitor.local_addr().port(),
        connect_timeout_ms: 500,
        read_timeout_ms: 500,
        ..config::Server::default()
    }
}

/// Messages of the next connection, up to its close.
fn next_session(monitor: &Monitor) -> Vec<Message> {
    let mut messages = vec![];
    loop {
        match monitor.receiver().recv_timeout(Duration::from_secs(5)) {
            Ok(MonitorMessage::Connected { .. }) => {}
            Ok(MonitorMessage::Opc { message, .. }) => messages.push(message),
            Ok(MonitorMessage::Closed { .. }) => return messages,
            Err(err) => panic!("monitor went quiet: {:?}", err),
        }
    }
}

#[test]
fn full_color_is_one_frame() {
    let monitor = Monitor::bind("127.0.0.1:0").unwrap();
    let red = Color::from_rgb24(0xFF0000);

    let result = commands::set_full_color(&server_for(&monitor), 30, red);
    assert_eq!(status_code(&result), 0);

    let messages = next_session(&monitor);
    assert_eq!(
        messages,
        vec![Message {
            channel: 0,
            command: Command::SetPixels(vec![Color::new(255, 0, 0); 30]),
        }]
    );
}

#[test]
fn unreachable_server_is_status_minus_one() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let server = config::Server {
        port,
        ..config::Server::default()
    };
    let result = commands::set_full_color(&server, 30, Color::new(255, 0, 0));
    assert!(matches!(result, Err(OpcError::Connection { .. })));
    assert_eq!(status_code(&result), -1);
}

#[test]
fn server_hanging_up_early_is_status_minus_one() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let server = config::Server {
        port: listener.local_addr().unwrap().port(),
        ..config::Server::default()
    };
    let hang_up = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        drop(stream);
    });

    let result = commands::set_full_color(&server, 512, Color::new(255, 0, 0));
    hang_up.join().unwrap();

    assert!(matches!(result, Err(OpcError::Send(_))));
    assert_eq!(status_code(&result), -1);
}

#[test]
fn brightness_and_clear() {
    let monitor = Monitor::bind("127.0.0.1:0").unwrap();
    let server = server_for(&monitor);

    commands::set_brightness(&server, ColorCorrection::from_brightness(2.5, 50)).unwrap();
    assert_eq!(
        next_session(&monitor)[0].command,
        Command::ColorCorrection(ColorCorrection::uniform(2.5, 0.5))
    );

    commands::clear(&server, 8).unwrap();
    assert_eq!(
        next_session(&monitor)[0].command,
        Command::SetPixels(vec![Color::BLACK; 8])
    );
}

#[derive(Default)]
struct Failures(AtomicUsize);

impl ControllerListener for Failures {
    fn on_server_connection_failure(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn spark_streams_frames_until_stopped() {
    let monitor = Monitor::bind("127.0.0.1:0").unwrap();
    let mut root = Root::default();
    root.server = server_for(&monitor);
    root.strip.led_count = 12;
    root.animation.speed = 100;

    let failures = Arc::new(Failures::default());
    let mut controller = AnimationController::new(&root, Arc::new(TcpConnector), failures.clone());

    controller.start_spark(Color::new(0, 255, 0));
    let mut frames = 0;
    while frames < 5 {
        match monitor.receiver().recv_timeout(Duration::from_secs(5)).unwrap() {
            MonitorMessage::Opc { message, .. } => match message.command {
                Command::SetPixels(pixels) => {
                    assert_eq!(pixels.len(), 12);
                    frames += 1;
                }
                other => panic!("unexpected {:?}", other),
            },
            _ => {}
        }
    }

    controller.stop();
    assert_eq!(controller.active_kind(), None);
    assert_eq!(controller.state().worker_count(), 0);
    drop(controller);

    // the rest of the session ends with a close
    next_session(&monitor);
    assert_eq!(failures.0.load(Ordering::SeqCst), 0);
}

#[test]
fn animations_follow_a_yaml_config() {
    let monitor = Monitor::bind("127.0.0.1:0").unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "server:\n  host: 127.0.0.1\n  port: {}\nstrip:\n  ledCount: 3\nanimation:\n  mixerDelayMs: 1",
        monitor.local_addr().port()
    )
    .unwrap();
    let root = config::read_config_yaml(file.path()).unwrap();

    let mut controller = AnimationController::new(&root, Arc::new(TcpConnector), Arc::new(Failures::default()));
    controller.start_mixer();
    assert_eq!(controller.active_kind(), Some(AnimationKind::Mixer));

    loop {
        if let MonitorMessage::Opc { message, .. } = monitor.receiver().recv_timeout(Duration::from_secs(5)).unwrap() {
            assert_eq!(message.command, Command::SetPixels(vec![Color::new(255, 255, 0); 3]));
            break;
        }
    }
    controller.stop();
}
