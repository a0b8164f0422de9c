//! Oversampling of the light sensor.
//!
//! Each loop iteration reads a fixed number of raw conversions, sums them in a
//! `u32` accumulator, and divides with truncation. The accumulator only lives
//! for the duration of one [`oversample`] call.

use core::num::NonZeroU16;

/// Number of conversions averaged per loop iteration.
pub const OVERSAMPLE_COUNT: NonZeroU16 = match NonZeroU16::new(64) {
    Some(count) => count,
    None => panic!("oversample count must be non-zero"),
};

/// Blocking single-shot converter channel.
pub trait SampleSource {
    /// Performs one conversion and returns the raw code.
    fn read_raw(&mut self) -> u16;
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn read_raw(&mut self) -> u16 {
        (**self).read_raw()
    }
}

/// Reads `count` samples and returns their truncated mean.
pub fn oversample<S>(source: &mut S, count: NonZeroU16) -> u16
where
    S: SampleSource + ?Sized,
{
    let mut accumulator: u32 = 0;
    for _ in 0..count.get() {
        accumulator += u32::from(source.read_raw());
    }
    truncated_mean(accumulator, u32::from(count.get()))
}

/// Truncated mean of an explicit sample window; `0` for an empty window.
#[must_use]
pub fn average(samples: &[u16]) -> u16 {
    if samples.is_empty() {
        return 0;
    }

    let sum = samples.iter().map(|&sample| u64::from(sample)).sum::<u64>();
    let len = samples.len() as u64;
    u16::try_from(sum / len).unwrap_or(u16::MAX)
}

fn truncated_mean(sum: u32, count: u32) -> u16 {
    u16::try_from(sum / count).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted<'a> {
        samples: &'a [u16],
        cursor: usize,
        reads: usize,
    }

    impl<'a> Scripted<'a> {
        fn new(samples: &'a [u16]) -> Self {
            Self {
                samples,
                cursor: 0,
                reads: 0,
            }
        }
    }

    impl SampleSource for Scripted<'_> {
        fn read_raw(&mut self) -> u16 {
            let value = self.samples[self.cursor % self.samples.len()];
            self.cursor += 1;
            self.reads += 1;
            value
        }
    }

    #[test]
    fn alternating_extremes_truncate_toward_zero() {
        let mut source = Scripted::new(&[0, 4095]);
        let mean = oversample(&mut source, OVERSAMPLE_COUNT);

        assert_eq!(mean, 2047, "131040 / 64 = 2047.5 must truncate");
        assert_eq!(source.reads, 64);
    }

    #[test]
    fn constant_input_is_preserved() {
        let mut source = Scripted::new(&[999]);
        assert_eq!(oversample(&mut source, OVERSAMPLE_COUNT), 999);
    }

    #[test]
    fn full_scale_window_does_not_overflow() {
        let mut source = Scripted::new(&[u16::MAX]);
        assert_eq!(oversample(&mut source, OVERSAMPLE_COUNT), u16::MAX);
    }

    #[test]
    fn slice_average_matches_oversampling() {
        let window: Vec<u16> = (0..64u16).map(|i| if i % 2 == 0 { 0 } else { 4095 }).collect();
        assert_eq!(average(&window), 2047);
        assert_eq!(average(&[1, 2]), 1);
        assert_eq!(average(&[]), 0);
    }

    #[test]
    fn mutable_references_forward_reads() {
        let mut source = Scripted::new(&[10, 20]);
        let mut borrowed = &mut source;
        let mean = oversample(&mut borrowed, NonZeroU16::new(2).unwrap());
        assert_eq!(mean, 15);
        assert_eq!(source.reads, 2);
    }
}
