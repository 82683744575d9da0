#![cfg_attr(not(test), no_std)]

pub mod adc_calib;
pub mod filter;
pub mod rounding;
pub mod temperature;
pub mod thermistor;
pub mod touch;
pub mod vent;

pub const NUM_TEMPS_RUNNING_AVG: usize = 30; // Readings buffered per sensor for the running average
pub const TEMP_POLL_INTERVAL_MS: u64 = 1000; // Control loop cadence (temperature read + vent update)
pub const AREF_STABLE_DELAY_MS: u32 = 3; // Settling time after enabling the ADC reference output
