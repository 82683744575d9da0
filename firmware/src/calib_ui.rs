//! Drives an interactive touch-calibration session from polled touch
//! samples, logging the targets and results for the operator.

use defmt::{info, warn};
use embassy_time::{Duration, Timer};
use embedded_hal::spi::SpiDevice;

use smartvent_core::touch::{AffineCalibration, CalibrationSession, SessionEvent};

use crate::xpt2046::Xpt2046;

/// Touch poll period while a calibration session is active.
const POLL_INTERVAL_MS: u64 = 20;

/// Test taps accepted after the transform is solved, before the session
/// commits.
const TEST_TAPS: u32 = 3;

/// Run a full calibration session to completion and return the solved
/// transform. Blocks (asynchronously) until the user has tapped both
/// targets and the test taps are done.
pub async fn run_session<SPI>(touch: &mut Xpt2046<SPI>) -> AffineCalibration
where
    SPI: SpiDevice,
{
    let mut session = CalibrationSession::new();
    let (first, second) = session.targets();
    info!("touch calibration: tap target at ({}, {})", first.x, first.y);

    let mut solved: Option<AffineCalibration> = None;
    let mut test_taps = 0;

    loop {
        Timer::after(Duration::from_millis(POLL_INTERVAL_MS)).await;
        let (touched, raw) = match touch.sample() {
            Ok(s) => s,
            Err(_) => {
                warn!("touch controller read failed");
                continue;
            }
        };

        match session.feed(touched, raw) {
            Some(SessionEvent::ShowSecondTarget) => {
                info!("touch calibration: tap target at ({}, {})", second.x, second.y);
            }
            Some(SessionEvent::Computed(cal)) => {
                let c = cal.coefficients();
                info!(
                    "touch calibration solved: x scale {=f32} offset {=f32}, y scale {=f32} offset {=f32}",
                    c[0], c[1], c[2], c[3]
                );
                info!("tap anywhere to verify");
                solved = Some(cal);
            }
            Some(SessionEvent::Restarted(e)) => {
                warn!("touch calibration restarted: {}", e);
                info!("touch calibration: tap target at ({}, {})", first.x, first.y);
            }
            Some(SessionEvent::TestPoint(p)) => {
                info!("test tap mapped to ({}, {})", p.x, p.y);
                test_taps += 1;
            }
            None => {}
        }

        if let Some(cal) = solved {
            if test_taps >= TEST_TAPS {
                return cal;
            }
        }
    }
}
