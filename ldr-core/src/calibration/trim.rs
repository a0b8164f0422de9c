//! Factory trim providers.

use core::fmt;

use super::AdcProfile;

/// One factory measurement: the code read for a known input voltage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TrimPoint {
    pub raw: u16,
    pub millivolts: u16,
}

impl TrimPoint {
    #[must_use]
    pub const fn new(raw: u16, millivolts: u16) -> Self {
        Self { raw, millivolts }
    }
}

/// Low and high factory measurements for one converter profile.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TwoPointTrim {
    pub low: TrimPoint,
    pub high: TrimPoint,
}

impl TwoPointTrim {
    #[must_use]
    pub const fn new(low: TrimPoint, high: TrimPoint) -> Self {
        Self { low, high }
    }
}

/// Which factory values are burned into the part.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub struct TrimAvailability {
    pub two_point: bool,
    pub reference: bool,
}

impl TrimAvailability {
    #[must_use]
    pub const fn new(two_point: bool, reference: bool) -> Self {
        Self {
            two_point,
            reference,
        }
    }

    /// Log line describing two-point trim support.
    #[must_use]
    pub const fn two_point_label(&self) -> &'static str {
        if self.two_point {
            "eFuse Two Point: Supported"
        } else {
            "eFuse Two Point: NOT supported"
        }
    }

    /// Log line describing factory reference support.
    #[must_use]
    pub const fn reference_label(&self) -> &'static str {
        if self.reference {
            "eFuse Vref: Supported"
        } else {
            "eFuse Vref: NOT supported"
        }
    }
}

impl fmt::Display for TrimAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.two_point_label(), self.reference_label())
    }
}

/// Source of factory calibration data.
///
/// Reads may touch the converter (e.g. sampling an internal reference), hence
/// the `&mut self` receivers.
pub trait FactoryTrim {
    /// Reports which trims exist without measuring anything.
    fn availability(&self) -> TrimAvailability;

    /// Two-point trim for the given profile, if the part carries one.
    fn two_point(&mut self, profile: AdcProfile) -> Option<TwoPointTrim>;

    /// Factory-measured converter reference in millivolts, if available.
    fn reference_millivolts(&mut self) -> Option<u16>;
}

/// Trim provider for parts without factory data.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoFactoryTrim;

impl FactoryTrim for NoFactoryTrim {
    fn availability(&self) -> TrimAvailability {
        TrimAvailability::default()
    }

    fn two_point(&mut self, _: AdcProfile) -> Option<TwoPointTrim> {
        None
    }

    fn reference_millivolts(&mut self) -> Option<u16> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationSource;

    #[test]
    fn availability_labels_share_the_factory_prefix() {
        let full = TrimAvailability::new(true, true);
        let bare = TrimAvailability::new(false, false);

        assert_eq!(full.two_point_label(), "eFuse Two Point: Supported");
        assert_eq!(bare.reference_label(), "eFuse Vref: NOT supported");
        assert_eq!(
            TrimAvailability::new(false, true).to_string(),
            "eFuse Two Point: NOT supported, eFuse Vref: Supported"
        );
        assert_eq!(
            CalibrationSource::FactoryReference.to_string(),
            "Characterized using eFuse Vref"
        );
    }
}
