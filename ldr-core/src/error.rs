//! Startup failures.
//!
//! Only peripheral bring-up can fail. Callers treat every variant as fatal;
//! there is no degraded mode for a light sensor without a converter or an
//! actuator.

use core::fmt;

/// Peripheral configuration failure detected before the control loop starts.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InitError {
    /// Requested duty resolution is outside `1..=16` bits.
    InvalidResolution(u8),
    /// The timer period at the requested carrier frequency has fewer steps
    /// than the duty resolution needs.
    PwmResolutionUnavailable { required: u16, available: u16 },
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::InvalidResolution(bits) => {
                write!(f, "unsupported duty resolution: {bits} bits")
            }
            InitError::PwmResolutionUnavailable {
                required,
                available,
            } => write!(
                f,
                "pwm timer offers {available} steps, duty resolution needs {required}"
            ),
        }
    }
}
