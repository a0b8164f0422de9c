#![cfg_attr(target_os = "none", no_std)]

//! Board support shared by the `ldr-dimmer` and `ldr-alarm` images.
//!
//! Everything that touches STM32G0 peripherals is gated on `target_os =
//! "none"`; host builds only keep the board constants and the log mirror so
//! the workspace still builds and tests on a development machine.

pub mod board;
pub mod telemetry;

#[cfg(target_os = "none")]
pub mod hw;
#[cfg(target_os = "none")]
mod panic;
#[cfg(target_os = "none")]
pub mod runtime;
