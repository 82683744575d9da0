//! Thermistor-to-temperature conversion via the Steinhart-Hart model.
//!
//! The thermistor sits on the reference-voltage side of a divider with a
//! series resistor to ground, and the ADC measures the junction, so
//! `R = Rs * (ADC_MAX / code - 1)`. Temperature then follows from
//! `1/T = A + B*ln(R) + C*ln(R)^3` with T in Kelvin.

use libm::logf;

use crate::adc_calib::ADC_MAX;

/// Static per-sensor configuration. The coefficients vary with the
/// thermistor type and model; series resistors are measured with an ohmmeter.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ThermistorSpec {
    /// Analog input the sensor is wired to, as understood by the ADC driver.
    pub channel: u8,
    pub series_resistor_ohms: f32,
    pub a: f32,
    pub b: f32,
    pub c: f32,
}

/// EPCOS B57862S103F, NTC 10K Ohms 1% 3988K 60mW (indoor sensor).
pub const INDOOR_THERMISTOR: ThermistorSpec = ThermistorSpec {
    channel: 0,
    series_resistor_ohms: 10_000.0,
    a: 0.001125,
    b: 0.0002347,
    c: 8.563e-08,
};

/// 10K type 2 (outdoor sensor).
pub const OUTDOOR_THERMISTOR: ThermistorSpec = ThermistorSpec {
    channel: 1,
    series_resistor_ohms: 10_000.0,
    a: 0.001127,
    b: 0.0002344,
    c: 8.675e-08,
};

/// Compute the thermistor resistance from a raw ADC code.
///
/// A code of zero would put the divider equation at infinity, so codes are
/// clamped to 1. A miswired sensor therefore reads as an extreme but finite
/// resistance rather than faulting.
pub fn resistance_from_code(code: u16, spec: &ThermistorSpec) -> f32 {
    let code = code.max(1);
    spec.series_resistor_ohms * (ADC_MAX as f32 / code as f32 - 1.0)
}

/// Steinhart-Hart: resistance in ohms to temperature in Celsius.
pub fn celsius_from_resistance(resistance_ohms: f32, spec: &ThermistorSpec) -> f32 {
    let ln_r = logf(resistance_ohms);
    let t_kelvin = 1.0 / (spec.a + spec.b * ln_r + spec.c * ln_r * ln_r * ln_r);
    k_to_c(t_kelvin)
}

pub fn c_to_f(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn f_to_c(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

pub fn c_to_k(celsius: f32) -> f32 {
    celsius + 273.15
}

pub fn k_to_c(kelvin: f32) -> f32 {
    kelvin - 273.15
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f32, b: f32, tol: f32) {
        assert!((a - b).abs() <= tol, "{} vs {} (tol {})", a, b, tol);
    }

    #[test]
    fn resistance_is_monotone_decreasing_in_code() {
        let mut prev = resistance_from_code(1, &INDOOR_THERMISTOR);
        for code in 2..=ADC_MAX {
            let r = resistance_from_code(code, &INDOOR_THERMISTOR);
            assert!(r < prev, "R not decreasing at code {}", code);
            prev = r;
        }
    }

    #[test]
    fn zero_code_is_clamped() {
        assert_eq!(
            resistance_from_code(0, &INDOOR_THERMISTOR),
            resistance_from_code(1, &INDOOR_THERMISTOR)
        );
    }

    #[test]
    fn unit_conversions_round_trip() {
        for t in [-40.0f32, 0.0, 25.0, 37.5, 100.0] {
            assert_close(f_to_c(c_to_f(t)), t, 1e-4);
            assert_close(k_to_c(c_to_k(t)), t, 1e-4);
        }
    }

    #[test]
    fn known_calibration_points() {
        // The EPCOS coefficients were fitted at 0, 25 and 50 Celsius with
        // resistances 32650, 10000 and 3603 ohms.
        assert_close(celsius_from_resistance(32650.0, &INDOOR_THERMISTOR), 0.0, 0.1);
        assert_close(celsius_from_resistance(10000.0, &INDOOR_THERMISTOR), 25.0, 0.1);
        assert_close(celsius_from_resistance(3603.0, &INDOOR_THERMISTOR), 50.0, 0.1);
    }

    #[test]
    fn midscale_code_reads_series_resistance() {
        // At half of full scale the divider is balanced, so the computed
        // resistance equals the series resistor.
        let r = resistance_from_code(ADC_MAX / 2, &INDOOR_THERMISTOR);
        assert_close(r, INDOOR_THERMISTOR.series_resistor_ohms, 10.0);
    }
}
