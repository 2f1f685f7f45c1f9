//! Open Pixel Control client and LED animation engine.

pub mod animation;
pub mod client;
pub mod commands;
pub mod config;
pub mod control;
pub mod device;
pub mod monitor;
pub mod opc;

pub use client::{status_code, OpcClient, OpcError, OpcResult};
pub use device::{Color, ColorCorrection};
