//! Integrated temperature acquisition: raw ADC code -> thermistor
//! conversion -> running average -> anti-jitter rounding.

use crate::filter::RunningAverage;
use crate::rounding::{round_with_hysteresis, TEMP_HYST_C, TEMP_HYST_F};
use crate::thermistor::{c_to_f, celsius_from_resistance, resistance_from_code, ThermistorSpec};

/// Access to the corrected ADC from the acquisition path.
///
/// `set_reference(true)` must enable the reference-voltage output and wait
/// for it to settle; it is a no-op when the reference is already on, so
/// back-to-back reads of several sensors pay the settling delay once. The
/// caller turns the reference off after the last read of a batch so it does
/// not warm the thermistors.
pub trait ThermistorAdc {
    fn set_reference(&mut self, on: bool);
    /// Read one corrected conversion result from the given input.
    fn read(&mut self, channel: u8) -> u16;
}

/// One conversion result, updated in place on each read.
///
/// `going_up_c` / `going_up_f` record the direction of the last change of
/// the corresponding rounded value and feed the anti-jitter rounding; they
/// are seeded on `init` and carried forward for the life of the program.
/// `raw_code` and `resistance_ohms` hold the latest (unaveraged) conversion
/// for diagnostics.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TemperatureSample {
    pub celsius: f32,
    pub celsius_int: i16,
    pub fahrenheit: f32,
    pub fahrenheit_int: i16,
    pub going_up_c: bool,
    pub going_up_f: bool,
    pub raw_code: u16,
    pub resistance_ohms: f32,
}

impl TemperatureSample {
    const fn empty() -> Self {
        Self {
            celsius: 0.0,
            celsius_int: 0,
            fahrenheit: 0.0,
            fahrenheit_int: 0,
            // Arbitrary until the first real reading.
            going_up_c: true,
            going_up_f: true,
            raw_code: 0,
            resistance_ohms: 0.0,
        }
    }

    /// Recompute the Fahrenheit value and both rounded integers from
    /// `self.celsius`, using the current direction flags.
    fn derive_from_celsius(&mut self) {
        self.celsius_int = round_with_hysteresis(self.celsius, self.going_up_c, TEMP_HYST_C);
        self.fahrenheit = c_to_f(self.celsius);
        self.fahrenheit_int = round_with_hysteresis(self.fahrenheit, self.going_up_f, TEMP_HYST_F);
    }
}

/// Per-sensor acquisition state: thermistor parameters, filter buffer and
/// the current (averaged) sample.
pub struct TemperatureReader<const N: usize> {
    spec: ThermistorSpec,
    filter: RunningAverage<N>,
    sample: TemperatureSample,
    reads: u16,
}

impl<const N: usize> TemperatureReader<N> {
    pub const fn new(spec: ThermistorSpec) -> Self {
        Self {
            spec,
            filter: RunningAverage::new(),
            sample: TemperatureSample::empty(),
            reads: 0,
        }
    }

    /// Take the first reading and pre-fill the averaging buffer with it.
    ///
    /// `leave_reference_on` skips the reference shutdown so a second
    /// sensor can be initialized without paying the settling delay again.
    pub fn init<A: ThermistorAdc>(&mut self, adc: &mut A, leave_reference_on: bool) {
        let mut sample = TemperatureSample::empty();
        Self::convert(&self.spec, adc, &mut sample, leave_reference_on);
        self.filter.seed(sample.celsius);
        self.sample = sample;
        self.reads = 1;
    }

    /// Read once, fold the reading into the running average and re-round.
    ///
    /// Returns the raw (pre-average) Celsius reading that entered the
    /// buffer. The direction flags are updated from the change of the
    /// rounded values between the previous and the new sample.
    pub fn update<A: ThermistorAdc>(&mut self, adc: &mut A, leave_reference_on: bool) -> f32 {
        let mut new_sample = self.sample;
        Self::convert(&self.spec, adc, &mut new_sample, leave_reference_on);
        let raw_celsius = new_sample.celsius;

        new_sample.celsius = self.filter.update(raw_celsius);
        new_sample.derive_from_celsius();

        if new_sample.celsius_int < self.sample.celsius_int {
            new_sample.going_up_c = false;
        } else if new_sample.celsius_int > self.sample.celsius_int {
            new_sample.going_up_c = true;
        }
        if new_sample.fahrenheit_int < self.sample.fahrenheit_int {
            new_sample.going_up_f = false;
        } else if new_sample.fahrenheit_int > self.sample.fahrenheit_int {
            new_sample.going_up_f = true;
        }

        self.sample = new_sample;
        self.reads = self.reads.saturating_add(1);
        raw_celsius
    }

    pub fn sample(&self) -> &TemperatureSample {
        &self.sample
    }

    pub fn spec(&self) -> &ThermistorSpec {
        &self.spec
    }

    /// Number of completed reads, for diagnostics.
    pub fn reads(&self) -> u16 {
        self.reads
    }

    fn convert<A: ThermistorAdc>(
        spec: &ThermistorSpec,
        adc: &mut A,
        sample: &mut TemperatureSample,
        leave_reference_on: bool,
    ) {
        adc.set_reference(true);
        let code = adc.read(spec.channel);
        if !leave_reference_on {
            adc.set_reference(false);
        }

        let resistance = resistance_from_code(code, spec);
        sample.celsius = celsius_from_resistance(resistance, spec);
        sample.derive_from_celsius();
        sample.raw_code = code;
        sample.resistance_ohms = resistance;
    }
}
