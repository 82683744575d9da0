//! Direction-aware rounding of temperatures to whole degrees.
//!
//! Ordinary round-half-up jitters when a noisy reading hovers at the
//! boundary between two integers. Shifting the rounding threshold by half a
//! hysteresis width, in the direction the value last moved, creates a dead
//! zone the reading must cross before the displayed integer changes again.
//!
//! Example with hysteresis 0.25: half is 0.125, so while going up the
//! rounding threshold is 0.375 and while going down it is 0.625. A rounded
//! value of 70 increases to 71 at 70.375 but, having just dropped to 69 at
//! 69.374, will not climb back to 70 until 69.625.

use libm::floorf;

/// Hysteresis width for Celsius rounding. 0 disables hysteresis.
pub const TEMP_HYST_C: f32 = 0.125;
/// Hysteresis width for Fahrenheit rounding, 9/5 of the Celsius width.
pub const TEMP_HYST_F: f32 = 0.25;

/// Round `value` to an integer with direction-aware hysteresis.
///
/// `going_up` must be true if the last change of the rounded value was an
/// increase. The caller owns the flag and must update it whenever the
/// rounded output strictly increases or decreases.
pub fn round_with_hysteresis(value: f32, going_up: bool, hysteresis: f32) -> i16 {
    let half = hysteresis / 2.0;
    // To round up at 0.375 we add (1 - 0.375) and floor: floor(70.375 + 0.625) = 71.
    floorf(value + 0.5 + if going_up { half } else { -half }) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hysteresis_is_round_half_up() {
        assert_eq!(round_with_hysteresis(69.49, true, 0.0), 69);
        assert_eq!(round_with_hysteresis(69.5, true, 0.0), 70);
        assert_eq!(round_with_hysteresis(69.5, false, 0.0), 70);
        assert_eq!(round_with_hysteresis(-1.5, false, 0.0), -1);
    }

    #[test]
    fn going_up_lowers_the_threshold() {
        // Threshold at 0.5 - h/2 = 0.375 while going up.
        assert_eq!(round_with_hysteresis(70.374, true, TEMP_HYST_F), 70);
        assert_eq!(round_with_hysteresis(70.376, true, TEMP_HYST_F), 71);
    }

    #[test]
    fn going_down_raises_the_threshold() {
        // Threshold at 0.5 + h/2 = 0.625 while going down.
        assert_eq!(round_with_hysteresis(69.624, false, TEMP_HYST_F), 69);
        assert_eq!(round_with_hysteresis(69.626, false, TEMP_HYST_F), 70);
    }

    #[test]
    fn dead_zone_holds_the_value() {
        // With the rounded value at 70 and direction up, everything inside
        // [69.5 + h/2, 70.5 - h/2] must keep rounding to 70.
        let h = TEMP_HYST_F;
        let eps = 0.002;
        let lo = 69.5 + h / 2.0 + eps;
        let hi = 70.5 - h / 2.0 - eps;
        let mut t = lo;
        while t <= hi {
            assert_eq!(round_with_hysteresis(t, true, h), 70, "at {}", t);
            t += 0.01;
        }
    }
}
