//! ADC characterization shared by firmware and host targets.
//!
//! A [`CalibrationTable`] is built once at startup from the converter profile,
//! whatever factory trim the part carries, and a fallback reference voltage.
//! After that it is a pure `raw code -> millivolts` function owned by the
//! control loop. Missing factory data is not an error: the table silently
//! degrades to the fallback reference and reports that through
//! [`CalibrationSource`].

use core::fmt;

mod trim;

pub use trim::{FactoryTrim, NoFactoryTrim, TrimAvailability, TrimPoint, TwoPointTrim};

/// Converter bit width.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AdcWidth {
    Bits9,
    Bits10,
    Bits11,
    Bits12,
}

impl AdcWidth {
    /// Number of bits produced per conversion.
    #[must_use]
    pub const fn bits(self) -> u8 {
        match self {
            AdcWidth::Bits9 => 9,
            AdcWidth::Bits10 => 10,
            AdcWidth::Bits11 => 11,
            AdcWidth::Bits12 => 12,
        }
    }

    /// Largest code the converter can return (`2^bits - 1`).
    #[must_use]
    pub const fn max_code(self) -> u16 {
        (1u16 << self.bits()) - 1
    }

    /// Clamps a raw reading into the converter's valid range.
    #[must_use]
    pub const fn clamp(self, raw: u16) -> u16 {
        let max = self.max_code();
        if raw > max { max } else { raw }
    }
}

/// Input attenuator placed ahead of the converter.
///
/// Each step widens the measurable input range; the gain is expressed in
/// per-mille so that full scale is `reference_mv * gain / 1000`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Attenuation {
    Db0,
    Db2_5,
    Db6,
    Db11,
}

impl Attenuation {
    /// Input gain in per-mille.
    #[must_use]
    pub const fn gain_permille(self) -> u32 {
        match self {
            Attenuation::Db0 => 1_000,
            Attenuation::Db2_5 => 1_334,
            Attenuation::Db6 => 1_995,
            Attenuation::Db11 => 3_548,
        }
    }
}

impl fmt::Display for Attenuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attenuation::Db0 => f.write_str("0dB"),
            Attenuation::Db2_5 => f.write_str("2.5dB"),
            Attenuation::Db6 => f.write_str("6dB"),
            Attenuation::Db11 => f.write_str("11dB"),
        }
    }
}

/// Width and attenuation the converter channel is configured with.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct AdcProfile {
    pub width: AdcWidth,
    pub attenuation: Attenuation,
}

impl AdcProfile {
    #[must_use]
    pub const fn new(width: AdcWidth, attenuation: Attenuation) -> Self {
        Self { width, attenuation }
    }

    /// Largest code for the configured width.
    #[must_use]
    pub const fn max_code(&self) -> u16 {
        self.width.max_code()
    }

    /// Full-scale input voltage for a given converter reference.
    #[must_use]
    pub const fn full_scale_millivolts(&self, reference_mv: u16) -> u32 {
        reference_mv as u32 * self.attenuation.gain_permille() / 1_000
    }
}

/// Data the calibration table was characterized from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CalibrationSource {
    /// Two factory-measured `(raw, millivolts)` points.
    TwoPoint,
    /// Factory-measured reference voltage.
    FactoryReference,
    /// Compile-time fallback reference voltage.
    DefaultReference,
}

impl fmt::Display for CalibrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationSource::TwoPoint => f.write_str("Characterized using Two Point Value"),
            CalibrationSource::FactoryReference => f.write_str("Characterized using eFuse Vref"),
            CalibrationSource::DefaultReference => {
                f.write_str("Characterized using Default Vref")
            }
        }
    }
}

/// Immutable raw-code to millivolt conversion.
///
/// The conversion is a line anchored at `(origin_code, origin_mv)` with slope
/// `span_mv / span_code`. Reference-based tables anchor at zero and reach the
/// profile's full-scale voltage at `max_code`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct CalibrationTable {
    profile: AdcProfile,
    source: CalibrationSource,
    origin_code: u16,
    origin_mv: u32,
    span_code: u32,
    span_mv: u32,
}

impl CalibrationTable {
    /// Characterizes the converter, preferring two-point trim, then the factory
    /// reference voltage, then `fallback_mv`.
    pub fn characterize<T>(profile: AdcProfile, fallback_mv: u16, trim: &mut T) -> Self
    where
        T: FactoryTrim + ?Sized,
    {
        if let Some(points) = trim.two_point(profile)
            && let Some(table) = Self::from_two_point(profile, points)
        {
            return table;
        }

        match trim.reference_millivolts() {
            Some(reference_mv) if reference_mv > 0 => {
                Self::from_reference(profile, reference_mv, CalibrationSource::FactoryReference)
            }
            _ => Self::from_reference(profile, fallback_mv, CalibrationSource::DefaultReference),
        }
    }

    /// Builds a table through two trim points; `None` when the points are degenerate.
    #[must_use]
    pub fn from_two_point(profile: AdcProfile, points: TwoPointTrim) -> Option<Self> {
        let low_code = profile.width.clamp(points.low.raw);
        let high_code = profile.width.clamp(points.high.raw);
        if high_code <= low_code || points.high.millivolts < points.low.millivolts {
            return None;
        }

        Some(Self {
            profile,
            source: CalibrationSource::TwoPoint,
            origin_code: low_code,
            origin_mv: u32::from(points.low.millivolts),
            span_code: u32::from(high_code - low_code),
            span_mv: u32::from(points.high.millivolts - points.low.millivolts),
        })
    }

    /// Builds a table from a reference voltage.
    #[must_use]
    pub fn from_reference(
        profile: AdcProfile,
        reference_mv: u16,
        source: CalibrationSource,
    ) -> Self {
        Self {
            profile,
            source,
            origin_code: 0,
            origin_mv: 0,
            span_code: u32::from(profile.max_code()),
            span_mv: profile.full_scale_millivolts(reference_mv),
        }
    }

    /// Returns where the table's coefficients came from.
    #[must_use]
    pub const fn source(&self) -> CalibrationSource {
        self.source
    }

    /// Returns the converter profile the table was built for.
    #[must_use]
    pub const fn profile(&self) -> AdcProfile {
        self.profile
    }

    /// Converts a raw code to millivolts.
    ///
    /// The code is clamped to the profile range first; the result rounds half
    /// away from zero and never goes below 0 mV.
    #[must_use]
    pub fn raw_to_millivolts(&self, raw: u16) -> u32 {
        let code = i64::from(self.profile.width.clamp(raw));
        let delta = code - i64::from(self.origin_code);
        let product = delta * i64::from(self.span_mv);
        let span = i64::from(self.span_code);
        let half = span / 2;
        let offset = if product >= 0 {
            (product + half) / span
        } else {
            (product - half) / span
        };

        let millivolts = i64::from(self.origin_mv) + offset;
        u32::try_from(millivolts.max(0)).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_12_0DB: AdcProfile = AdcProfile::new(AdcWidth::Bits12, Attenuation::Db0);
    const PROFILE_12_11DB: AdcProfile = AdcProfile::new(AdcWidth::Bits12, Attenuation::Db11);

    struct FixedTrim {
        two_point: Option<TwoPointTrim>,
        reference: Option<u16>,
    }

    impl FactoryTrim for FixedTrim {
        fn availability(&self) -> TrimAvailability {
            TrimAvailability::new(self.two_point.is_some(), self.reference.is_some())
        }

        fn two_point(&mut self, _: AdcProfile) -> Option<TwoPointTrim> {
            self.two_point
        }

        fn reference_millivolts(&mut self) -> Option<u16> {
            self.reference
        }
    }

    #[test]
    fn width_limits_follow_bit_count() {
        assert_eq!(AdcWidth::Bits9.max_code(), 511);
        assert_eq!(AdcWidth::Bits12.max_code(), 4095);
        assert_eq!(AdcWidth::Bits10.clamp(5000), 1023);
        assert_eq!(AdcWidth::Bits10.clamp(17), 17);
    }

    #[test]
    fn missing_trim_falls_back_to_default_reference() {
        let table = CalibrationTable::characterize(PROFILE_12_0DB, 3300, &mut NoFactoryTrim);

        assert_eq!(table.source(), CalibrationSource::DefaultReference);
        assert_eq!(table.raw_to_millivolts(0), 0);
        assert_eq!(table.raw_to_millivolts(4095), 3300);
        // 2048 * 3300 / 4095 = 1650.4
        assert_eq!(table.raw_to_millivolts(2048), 1650);
    }

    #[test]
    fn factory_reference_wins_over_fallback() {
        let mut trim = FixedTrim {
            two_point: None,
            reference: Some(1_114),
        };
        let table = CalibrationTable::characterize(PROFILE_12_11DB, 1_100, &mut trim);

        assert_eq!(table.source(), CalibrationSource::FactoryReference);
        // 1114 mV * 3.548 = 3952 mV at full scale.
        assert_eq!(table.raw_to_millivolts(4095), 3_952);
    }

    #[test]
    fn zero_reference_is_treated_as_absent() {
        let mut trim = FixedTrim {
            two_point: None,
            reference: Some(0),
        };
        let table = CalibrationTable::characterize(PROFILE_12_11DB, 1_100, &mut trim);
        assert_eq!(table.source(), CalibrationSource::DefaultReference);
        assert_eq!(table.raw_to_millivolts(4095), 3_902);
    }

    #[test]
    fn two_point_trim_takes_precedence() {
        let mut trim = FixedTrim {
            two_point: Some(TwoPointTrim::new(
                TrimPoint::new(160, 150),
                TrimPoint::new(2_580, 2_450),
            )),
            reference: Some(1_114),
        };
        let table = CalibrationTable::characterize(PROFILE_12_11DB, 1_100, &mut trim);

        assert_eq!(table.source(), CalibrationSource::TwoPoint);
        assert_eq!(table.raw_to_millivolts(160), 150);
        assert_eq!(table.raw_to_millivolts(2_580), 2_450);
        // Midpoint of the trim line.
        assert_eq!(table.raw_to_millivolts(1_370), 1_300);
    }

    #[test]
    fn two_point_below_low_point_extrapolates_and_clamps_at_zero() {
        let points = TwoPointTrim::new(TrimPoint::new(160, 150), TrimPoint::new(2_580, 2_450));
        let table = CalibrationTable::from_two_point(PROFILE_12_11DB, points).unwrap();

        // 150 - 160 * 2300 / 2420 = -2.07 -> clamped.
        assert_eq!(table.raw_to_millivolts(0), 0);
        // 150 - 60 * 2300 / 2420 = 92.98
        assert_eq!(table.raw_to_millivolts(100), 93);
    }

    #[test]
    fn degenerate_two_point_trim_degrades_to_reference() {
        let mut trim = FixedTrim {
            two_point: Some(TwoPointTrim::new(
                TrimPoint::new(2_000, 150),
                TrimPoint::new(2_000, 2_450),
            )),
            reference: None,
        };
        let table = CalibrationTable::characterize(PROFILE_12_0DB, 3_300, &mut trim);
        assert_eq!(table.source(), CalibrationSource::DefaultReference);
    }

    #[test]
    fn out_of_range_codes_are_clamped_before_conversion() {
        let table = CalibrationTable::from_reference(
            PROFILE_12_0DB,
            3_300,
            CalibrationSource::DefaultReference,
        );
        assert_eq!(table.raw_to_millivolts(u16::MAX), 3_300);
    }

    #[test]
    fn source_labels_match_startup_log() {
        assert_eq!(
            CalibrationSource::TwoPoint.to_string(),
            "Characterized using Two Point Value"
        );
        assert_eq!(
            CalibrationSource::DefaultReference.to_string(),
            "Characterized using Default Vref"
        );
    }
}
