#![cfg_attr(not(test), no_std)]

// Shared logic for the LDR lab images.
//
// Everything here is portable across the MCU firmware and the host emulator:
// the crate avoids the standard library and reaches hardware only through the
// traits in `sampling`, `calibration`, and `actuator`.

pub mod actuator;
pub mod calibration;
pub mod config;
pub mod control;
pub mod error;
pub mod mapping;
pub mod sampling;
pub mod telemetry;
