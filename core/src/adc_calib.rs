//! ADC gain/offset self-calibration against a PWM-generated voltage ramp.
//!
//! A PWM output feeds an RC low-pass into a spare ADC input, so a duty
//! cycle of p% produces p% of the reference voltage without needing a
//! second precision reference. Measuring near both rails (but not at them,
//! where converters are non-linear) gives two points on the converter's
//! response line: the slope error is the gain error and the y-intercept is
//! the offset error. Gain is corrected first, then the offset is measured
//! under gain correction so the two terms stay independent.

/// Maximum 12-bit conversion result.
pub const ADC_MAX: u16 = 0xFFF;
/// Gain correction value representing unity in 1.11 fixed point.
pub const GAIN_UNITY: u16 = 0x800;
/// Percentage of the reference at which the low/high points are measured.
pub const PERCENT_AT_ENDS: u32 = 10;
/// Worst-case settling of the RC filter after a duty-cycle change.
pub const PWM_STABLE_DELAY_MS: u32 = 5;

/// Gain and offset correction pair as loaded into the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Correction {
    pub gain: u16,
    pub offset: i16,
}

impl Correction {
    pub const UNITY: Self = Self {
        gain: GAIN_UNITY,
        offset: 0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibError {
    /// The high-point reading did not exceed the low-point reading; the
    /// calibration fixture is missing or miswired. Unity correction is left
    /// loaded.
    NoSpan,
}

/// Hardware needed by the calibration run: the PWM ramp generator, the ADC
/// input it feeds, the converter's correction registers (or their software
/// equivalent) and a blocking settle delay.
pub trait CalibrationTarget {
    /// Set the ramp duty cycle in tenths of a percent (0..=1000).
    fn set_duty_permille(&mut self, permille: u16);
    /// One conversion of the ramp input, with the currently loaded
    /// correction applied.
    fn read_raw(&mut self) -> u16;
    /// Load a gain/offset correction pair; applies to all subsequent reads
    /// as `result = (conversion - offset) * gain / GAIN_UNITY` (the order
    /// the SAMD-family correction hardware uses).
    fn apply_correction(&mut self, gain: u16, offset: i16);
    fn settle_ms(&mut self, ms: u32);
}

/// Measure the ramp at `PERCENT_AT_ENDS`% and `100 - PERCENT_AT_ENDS`% of
/// the reference and return `(low, high)`.
fn read_at_ends<T: CalibrationTarget>(target: &mut T) -> (u16, u16) {
    target.set_duty_permille((10 * PERCENT_AT_ENDS) as u16);
    target.settle_ms(PWM_STABLE_DELAY_MS);
    let low = target.read_raw();

    target.set_duty_permille((1000 - 10 * PERCENT_AT_ENDS) as u16);
    target.settle_ms(PWM_STABLE_DELAY_MS);
    let high = target.read_raw();

    (low, high)
}

/// Run the two-pass calibration and leave the result loaded in the target.
///
/// On a degenerate measurement (`high <= low`) unity correction is restored
/// and `CalibError::NoSpan` returned, so a missing fixture cannot poison
/// subsequent conversions.
pub fn calibrate<T: CalibrationTarget>(target: &mut T) -> Result<Correction, CalibError> {
    // Pass 1: measure the span with correction disabled to get the gain.
    target.apply_correction(GAIN_UNITY, 0);
    let (low, high) = read_at_ends(target);
    if high <= low {
        return Err(CalibError::NoSpan);
    }

    // The measured slope is ((high - low) * 100) / (ADC_MAX * (100 - 2p));
    // the correction is its inverse, scaled to 1.11 fixed point.
    let divisor = (high - low) as u32 * 100;
    let gain =
        ((GAIN_UNITY as u32 * ADC_MAX as u32 * (100 - 2 * PERCENT_AT_ENDS)) / divisor) as u16;

    // Pass 2: re-measure under gain correction to isolate the offset.
    target.apply_correction(gain, 0);
    let (low, high) = read_at_ends(target);
    if high <= low {
        target.apply_correction(GAIN_UNITY, 0);
        return Err(CalibError::NoSpan);
    }

    // The offset error is the negative of the y-intercept implied by the
    // two corrected points.
    let p = PERCENT_AT_ENDS as i32;
    let offset = (-((p * high as i32 - (100 - p) * low as i32) / (100 - 2 * p))) as i16;

    target.apply_correction(gain, offset);
    Ok(Correction { gain, offset })
}
