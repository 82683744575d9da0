//! Analog front end: the on-chip ADC with software gain/offset correction,
//! the thermistor reference-voltage switch and the PWM calibration ramp.
//!
//! The RP2040 ADC has no correction registers, so the correction pair from
//! the self-calibration run is applied in software to every conversion,
//! in the register order correction hardware uses:
//! `result = (conversion - offset) * gain / GAIN_UNITY`.

use defmt::warn;
use embassy_rp::adc::{Adc, Blocking, Channel};
use embassy_rp::gpio::Output;
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_time::{block_for, Duration};

use smartvent_core::adc_calib::{CalibrationTarget, Correction, ADC_MAX, GAIN_UNITY};
use smartvent_core::temperature::ThermistorAdc;
use smartvent_core::AREF_STABLE_DELAY_MS;

/// ADC input indexes used by the acquisition code.
pub const CHAN_INDOOR: u8 = 0;
pub const CHAN_OUTDOOR: u8 = 1;
pub const CHAN_RAMP: u8 = 2;

/// PWM wrap value giving a duty resolution of one part in 1000.
const PWM_TOP: u16 = 999;

pub struct AnalogFrontEnd<'d> {
    adc: Adc<'d, Blocking>,
    indoor: Channel<'d>,
    outdoor: Channel<'d>,
    ramp: Channel<'d>,
    ramp_pwm: Pwm<'d>,
    pwm_config: PwmConfig,
    aref: Output<'d>,
    aref_on: bool,
    correction: Correction,
}

impl<'d> AnalogFrontEnd<'d> {
    pub fn new(
        adc: Adc<'d, Blocking>,
        indoor: Channel<'d>,
        outdoor: Channel<'d>,
        ramp: Channel<'d>,
        mut ramp_pwm: Pwm<'d>,
        mut aref: Output<'d>,
    ) -> Self {
        let mut pwm_config = PwmConfig::default();
        pwm_config.top = PWM_TOP;
        pwm_config.compare_b = 0;
        ramp_pwm.set_config(&pwm_config);
        aref.set_low();
        Self {
            adc,
            indoor,
            outdoor,
            ramp,
            ramp_pwm,
            pwm_config,
            aref,
            aref_on: false,
            correction: Correction::UNITY,
        }
    }

    pub fn correction(&self) -> Correction {
        self.correction
    }

    /// One conversion with the current correction applied. A conversion
    /// error reads as full scale, which the thermistor math treats as an
    /// open sensor rather than a plausible temperature.
    fn read_corrected(&mut self, channel: u8) -> u16 {
        let raw = {
            let ch = match channel {
                CHAN_INDOOR => &mut self.indoor,
                CHAN_OUTDOOR => &mut self.outdoor,
                _ => &mut self.ramp,
            };
            match self.adc.blocking_read(ch) {
                Ok(v) => v,
                Err(_) => {
                    warn!("ADC conversion failed on channel {}", channel);
                    ADC_MAX
                }
            }
        };
        let corrected =
            (raw as i32 - self.correction.offset as i32) * self.correction.gain as i32
                / GAIN_UNITY as i32;
        corrected.clamp(0, ADC_MAX as i32) as u16
    }
}

impl ThermistorAdc for AnalogFrontEnd<'_> {
    fn set_reference(&mut self, on: bool) {
        if on && !self.aref_on {
            self.aref.set_high();
            block_for(Duration::from_millis(AREF_STABLE_DELAY_MS as u64));
        } else if !on && self.aref_on {
            self.aref.set_low();
        }
        self.aref_on = on;
    }

    fn read(&mut self, channel: u8) -> u16 {
        self.read_corrected(channel)
    }
}

impl CalibrationTarget for AnalogFrontEnd<'_> {
    fn set_duty_permille(&mut self, permille: u16) {
        self.pwm_config.compare_b = permille.min(PWM_TOP + 1);
        self.ramp_pwm.set_config(&self.pwm_config);
    }

    fn read_raw(&mut self) -> u16 {
        self.read_corrected(CHAN_RAMP)
    }

    fn apply_correction(&mut self, gain: u16, offset: i16) {
        self.correction = Correction { gain, offset };
    }

    fn settle_ms(&mut self, ms: u32) {
        block_for(Duration::from_millis(ms as u64));
    }
}
