#![no_std]
#![no_main]

use defmt::*;

use portable_atomic::{AtomicBool, Ordering};

use embassy_executor::Spawner;
use embassy_rp::adc::{Adc, Channel, Config as AdcConfig};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::pwm::{Config as PwmConfig, Pwm};
use embassy_rp::spi::{Config as SpiConfig, Spi};
use embassy_time::{Delay, Duration, Instant, Ticker};
use embedded_hal_bus::spi::ExclusiveDevice;

use {defmt_rtt as _, panic_probe as _};

use smartvent_core::adc_calib::{self, CalibError};
use smartvent_core::temperature::TemperatureReader;
use smartvent_core::thermistor::{INDOOR_THERMISTOR, OUTDOOR_THERMISTOR};
use smartvent_core::touch::AffineCalibration;
use smartvent_core::vent::{ControlContext, Mode, Settings};
use smartvent_core::{NUM_TEMPS_RUNNING_AVG, TEMP_POLL_INTERVAL_MS};

mod analog;
mod calib_ui;
mod xpt2046;

use analog::AnalogFrontEnd;
use xpt2046::Xpt2046;

/// Set by the button task, consumed once per control cycle.
static RUN_TIMER_PRESSED: AtomicBool = AtomicBool::new(false);

#[embassy_executor::task]
async fn button_task(mut button: Input<'static>) {
    loop {
        button.wait_for_falling_edge().await;
        RUN_TIMER_PRESSED.store(true, Ordering::Relaxed);
        // Debounce.
        embassy_time::Timer::after_millis(250).await;
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("SmartVent start");
    let p = embassy_rp::init(Default::default());

    // Analog front end: thermistor dividers on ADC0/ADC1, the PWM
    // calibration ramp (RC-filtered) on ADC2, reference switch on GPIO22.
    let adc = Adc::new_blocking(p.ADC, AdcConfig::default());
    let indoor_ch = Channel::new_pin(p.PIN_26, Pull::None);
    let outdoor_ch = Channel::new_pin(p.PIN_27, Pull::None);
    let ramp_ch = Channel::new_pin(p.PIN_28, Pull::None);
    let ramp_pwm = Pwm::new_output_b(p.PWM_SLICE7, p.PIN_15, PwmConfig::default());
    let aref = Output::new(p.PIN_22, Level::Low);
    let mut afe = AnalogFrontEnd::new(adc, indoor_ch, outdoor_ch, ramp_ch, ramp_pwm, aref);

    // Ventilation actuator relay and the run-timer button.
    let mut relay = Output::new(p.PIN_16, Level::Low);
    let button = Input::new(p.PIN_17, Pull::Up);
    spawner.spawn(button_task(button)).unwrap();

    // Touch controller on SPI0; the pen-interrupt line doubles as a
    // boot-time request for touch calibration.
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = 2_000_000;
    let spi = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_3, p.PIN_4, spi_config);
    let cs = Output::new(p.PIN_5, Level::High);
    let spi_device = ExclusiveDevice::new(spi, cs, Delay).unwrap();
    let mut touch = Xpt2046::new(spi_device);
    let pen_irq = Input::new(p.PIN_6, Pull::Up);

    let mut settings = Settings {
        mode: Mode::Auto,
        ..Settings::default()
    };

    // ADC self-calibration before the first temperature reading.
    match adc_calib::calibrate(&mut afe) {
        Ok(corr) => info!("ADC calibrated: gain {:#x} offset {}", corr.gain, corr.offset),
        Err(CalibError::NoSpan) => warn!("ADC calibration failed, running uncorrected"),
    }

    let mut touch_cal = AffineCalibration::default();
    touch_cal.set_coefficients(settings.touch_cal);
    if pen_irq.is_low() {
        // Panel held at power-up: recalibrate the touch mapping.
        touch_cal = calib_ui::run_session(&mut touch).await;
        settings.touch_cal = touch_cal.coefficients();
    }

    // First readings seed the averaging buffers. The indoor read leaves
    // the reference on so the outdoor read follows without a second
    // settling delay.
    let mut indoor: TemperatureReader<NUM_TEMPS_RUNNING_AVG> =
        TemperatureReader::new(INDOOR_THERMISTOR);
    let mut outdoor: TemperatureReader<NUM_TEMPS_RUNNING_AVG> =
        TemperatureReader::new(OUTDOOR_THERMISTOR);
    indoor.init(&mut afe, true);
    outdoor.init(&mut afe, false);

    let mut ctx = ControlContext::new(Instant::now().as_millis() as u32);
    let mut last_state = ctx.state();

    let mut ticker = Ticker::every(Duration::from_millis(TEMP_POLL_INTERVAL_MS));
    loop {
        ticker.next().await;

        indoor.update(&mut afe, true);
        outdoor.update(&mut afe, false);
        let indoor_f = indoor.sample().fahrenheit_int + settings.indoor_offset_f as i16;
        let outdoor_f = outdoor.sample().fahrenheit_int + settings.outdoor_offset_f as i16;

        // Mapped touch positions go to the (external) UI dispatcher; for
        // now they are logged.
        if pen_irq.is_low() {
            if let Ok((true, raw)) = touch.sample() {
                let p = touch_cal.map(raw);
                debug!("touch at ({}, {})", p.x, p.y);
            }
        }

        if RUN_TIMER_PRESSED.swap(false, Ordering::Relaxed) {
            ctx.run_timer_pressed();
            info!("run timer button: state {} run {} ms", ctx.state(), ctx.run_time_ms());
        }

        let now_ms = Instant::now().as_millis() as u32;
        let vent_on = ctx.update(&settings, indoor_f, outdoor_f, now_ms);
        relay.set_level(if vent_on { Level::High } else { Level::Low });

        if ctx.state() != last_state {
            info!(
                "state {} -> {} (indoor {}F outdoor {}F run {} ms)",
                last_state,
                ctx.state(),
                indoor_f,
                outdoor_f,
                ctx.run_time_ms()
            );
            last_state = ctx.state();
        }
        debug!(
            "indoor {}F ({=f32} C) outdoor {}F ({=f32} C) vent {}",
            indoor_f,
            indoor.sample().celsius,
            outdoor_f,
            outdoor.sample().celsius,
            vent_on
        );
    }
}
