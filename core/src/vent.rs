//! Ventilation arm/run state machine.
//!
//! Decides, once per control cycle, whether the ventilation actuator is on,
//! from the filtered indoor/outdoor temperatures and the user settings.
//! Turn-on and turn-off thresholds differ by the hysteresis band (a Schmitt
//! trigger) so the actuator does not cycle rapidly when a temperature
//! hovers at a threshold.

/// User-selected operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Off,
    On,
    Auto,
}

/// Arm states.
///
/// In AUTO mode the run timer is cumulative: timing out puts the machine
/// into `AwaitHot`, and only a hot afternoon (outdoor >= indoor + re-arm
/// differential, a "new day") clears the timer and re-arms via `AwaitOn`.
/// This limits automatic venting to the configured total per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArmState {
    /// Mode is OFF; actuator off.
    Off,
    /// Mode is ON; actuator on, run timer accumulating.
    On,
    /// Mode is ON but the run-time limit was reached; actuator off until
    /// the user clears the timer.
    OnTimeout,
    /// AUTO mode, actuator on, run timer accumulating.
    AutoOn,
    /// AUTO mode, timed out; waiting for the new-day condition.
    AwaitHot,
    /// AUTO mode, actuator off, waiting for the turn-on condition.
    AwaitOn,
}

/// Settings limits, in degrees Fahrenheit and hours. The UI layer clamps
/// user input to these; the state machine trusts its inputs.
pub const MIN_TEMP_SETPOINT: u8 = 50;
pub const MAX_TEMP_SETPOINT: u8 = 99;
pub const MIN_TEMP_DIFFERENTIAL: u8 = 2;
pub const MAX_TEMP_DIFFERENTIAL: u8 = 20;
pub const MIN_TEMP_HYSTERESIS: u8 = 1;
pub const MAX_TEMP_HYSTERESIS: u8 = 9;
pub const MAX_RUN_TIME_HOURS: u8 = 9;
pub const MAX_DELTA_ARM_TEMP: u8 = 20;
pub const MAX_TEMP_CALIB_DELTA: i8 = 9;

/// The run timer clamps here (99 hours); only reachable in ON mode with no
/// limit after running for days.
pub const RUN_TIME_CAP_MS: u32 = 99 * MS_PER_HOUR;

const MS_PER_HOUR: u32 = 60 * 60 * 1000;

/// User settings consumed by the state machine, plus the per-sensor display
/// offsets and touch-calibration scalars that ride along in the same
/// persisted record. Loaded at startup, written back by the (external)
/// settings store when changed.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub mode: Mode,
    /// Indoor setpoint in deg F; venting arms at or above this.
    pub setpoint_f: i16,
    /// Indoor must exceed outdoor by this to turn on.
    pub delta_on_f: i16,
    /// Band subtracted from the setpoint and the on-differential for the
    /// turn-off comparisons.
    pub hysteresis_f: i16,
    /// Cumulative run-time limit in hours; 0 means unlimited.
    pub max_run_time_hours: u8,
    /// Outdoor must exceed indoor by this to re-arm for the next day.
    pub delta_arm_f: i16,
    /// Added to the measured indoor temperature before display and control.
    pub indoor_offset_f: i8,
    /// Added to the measured outdoor temperature before display and control.
    pub outdoor_offset_f: i8,
    /// Touch-calibration scalars, persisted with the rest of the record.
    pub touch_cal: [f32; 4],
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: Mode::Off,
            setpoint_f: 78,
            delta_on_f: 7,
            hysteresis_f: 3,
            max_run_time_hours: 4,
            delta_arm_f: 1,
            indoor_offset_f: 0,
            outdoor_offset_f: 0,
            touch_cal: [1.0, 0.0, 1.0, 0.0],
        }
    }
}

impl Settings {
    fn run_limit_ms(&self) -> u32 {
        self.max_run_time_hours as u32 * MS_PER_HOUR
    }
}

/// Process-wide control state: the arm state, the accumulated run time and
/// the timestamp of the last update. One instance per actuator; owned by
/// the control loop and passed in by reference so tests can run several
/// independent machines.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlContext {
    state: ArmState,
    run_time_ms: u32,
    last_update_ms: u32,
}

impl ControlContext {
    pub const fn new(now_ms: u32) -> Self {
        Self {
            state: ArmState::Off,
            run_time_ms: 0,
            last_update_ms: now_ms,
        }
    }

    pub fn state(&self) -> ArmState {
        self.state
    }

    pub fn run_time_ms(&self) -> u32 {
        self.run_time_ms
    }

    /// Whether the actuator is on in the current state.
    pub fn vent_on(&self) -> bool {
        matches!(self.state, ArmState::On | ArmState::AutoOn)
    }

    /// One control-cycle evaluation. `indoor_f` and `outdoor_f` are the
    /// rounded, offset-adjusted Fahrenheit temperatures from this cycle's
    /// acquisition pass. Returns the actuator command.
    pub fn update(&mut self, settings: &Settings, indoor_f: i16, outdoor_f: i16, now_ms: u32) -> bool {
        self.force_mode_consistency(settings.mode);
        self.accrue_run_time(now_ms);

        let limit_ms = settings.run_limit_ms();
        let timed_out = limit_ms != 0 && self.run_time_ms >= limit_ms;

        match self.state {
            ArmState::Off => {}

            ArmState::On => {
                if timed_out {
                    self.state = ArmState::OnTimeout;
                }
            }

            ArmState::OnTimeout => {
                // Leaves only via the user clearing the timer or a mode
                // change.
            }

            ArmState::AutoOn => {
                if timed_out {
                    self.state = ArmState::AwaitHot;
                } else if turn_off_condition(settings, indoor_f, outdoor_f) {
                    // Run time is cumulative; it keeps its value until the
                    // new-day re-arm.
                    self.state = ArmState::AwaitOn;
                }
            }

            ArmState::AwaitHot => {
                if outdoor_f >= indoor_f + settings.delta_arm_f {
                    // A new day has begun.
                    self.run_time_ms = 0;
                    self.state = ArmState::AwaitOn;
                }
            }

            ArmState::AwaitOn => {
                if timed_out {
                    self.state = ArmState::AwaitHot;
                } else if turn_on_condition(settings, indoor_f, outdoor_f) {
                    self.state = ArmState::AutoOn;
                }
            }
        }

        self.vent_on()
    }

    /// The main-screen run-timer button. In ON it clears the timer; in
    /// ON_TIMEOUT it clears the timer and resumes venting; in AUTO it
    /// cycles between the waiting states (clearing the timer when leaving
    /// AWAIT_HOT) so the user can force or cancel the daily lockout.
    pub fn run_timer_pressed(&mut self) {
        match self.state {
            ArmState::On => self.run_time_ms = 0,
            ArmState::OnTimeout => {
                self.run_time_ms = 0;
                self.state = ArmState::On;
            }
            ArmState::AutoOn | ArmState::AwaitOn => self.state = ArmState::AwaitHot,
            ArmState::AwaitHot => {
                self.run_time_ms = 0;
                self.state = ArmState::AwaitOn;
            }
            ArmState::Off => {}
        }
    }

    /// A mode change forces a state consistent with the new mode.
    fn force_mode_consistency(&mut self, mode: Mode) {
        match mode {
            Mode::Off => {
                if self.state != ArmState::Off {
                    self.state = ArmState::Off;
                }
                // The timer holds no history across an OFF period.
                self.run_time_ms = 0;
            }
            Mode::On => {
                if !matches!(self.state, ArmState::On | ArmState::OnTimeout) {
                    self.state = ArmState::On;
                }
            }
            Mode::Auto => {
                if !matches!(
                    self.state,
                    ArmState::AutoOn | ArmState::AwaitHot | ArmState::AwaitOn
                ) {
                    self.state = ArmState::AwaitOn;
                }
            }
        }
    }

    /// Advance the run timer by the elapsed wall time while the actuator
    /// is on. Saturates at `RUN_TIME_CAP_MS`; `now_ms` may wrap.
    fn accrue_run_time(&mut self, now_ms: u32) {
        let elapsed = now_ms.wrapping_sub(self.last_update_ms);
        self.last_update_ms = now_ms;
        if self.vent_on() {
            self.run_time_ms = self.run_time_ms.saturating_add(elapsed).min(RUN_TIME_CAP_MS);
        }
    }
}

/// AUTO turn-on: the house is warm enough and outdoors is cool enough.
fn turn_on_condition(settings: &Settings, indoor_f: i16, outdoor_f: i16) -> bool {
    indoor_f >= settings.setpoint_f && outdoor_f <= indoor_f - settings.delta_on_f
}

/// AUTO turn-off: the hysteresis band is subtracted from both thresholds,
/// so the off conditions sit a band-width away from the on conditions.
fn turn_off_condition(settings: &Settings, indoor_f: i16, outdoor_f: i16) -> bool {
    let h = settings.hysteresis_f;
    indoor_f < settings.setpoint_f - h || outdoor_f > indoor_f - (settings.delta_on_f - h)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: u32 = 60 * 60 * 1000;

    fn auto_settings() -> Settings {
        Settings {
            mode: Mode::Auto,
            ..Settings::default()
        }
    }

    #[test]
    fn auto_arms_and_starts_when_conditions_met() {
        // setpoint 78, delta-on 7: indoor 80 >= 78 and outdoor 70 <= 73.
        let s = auto_settings();
        let mut ctx = ControlContext::new(0);

        assert!(ctx.update(&s, 80, 70, 1000));
        assert_eq!(ctx.state(), ArmState::AutoOn);
    }

    #[test]
    fn auto_waits_while_outdoor_too_warm() {
        let s = auto_settings();
        let mut ctx = ControlContext::new(0);

        assert!(!ctx.update(&s, 80, 75, 1000)); // 75 > 80 - 7
        assert_eq!(ctx.state(), ArmState::AwaitOn);
    }

    #[test]
    fn schmitt_band_keeps_vent_on_inside_hysteresis() {
        let s = auto_settings();
        let mut ctx = ControlContext::new(0);
        ctx.update(&s, 80, 70, 1000);
        assert_eq!(ctx.state(), ArmState::AutoOn);

        // Outdoor drifts above the on threshold (73) but stays at or below
        // the off threshold (80 - (7 - 3) = 76): still venting.
        assert!(ctx.update(&s, 80, 75, 2000));
        assert!(ctx.update(&s, 80, 76, 3000));
        assert_eq!(ctx.state(), ArmState::AutoOn);

        // Crossing the off threshold stops it.
        assert!(!ctx.update(&s, 80, 77, 4000));
        assert_eq!(ctx.state(), ArmState::AwaitOn);
    }

    #[test]
    fn indoor_cooling_below_band_stops_venting() {
        let s = auto_settings();
        let mut ctx = ControlContext::new(0);
        ctx.update(&s, 80, 70, 1000);

        // Setpoint 78, hysteresis 3: venting continues down to 75.
        assert!(ctx.update(&s, 75, 65, 2000));
        assert!(!ctx.update(&s, 74, 65, 3000));
        assert_eq!(ctx.state(), ArmState::AwaitOn);
    }

    #[test]
    fn auto_times_out_then_rearms_on_hot_afternoon() {
        let s = auto_settings(); // 4 hour limit, delta-arm 1
        let mut ctx = ControlContext::new(0);
        ctx.update(&s, 80, 70, 1000);
        assert_eq!(ctx.state(), ArmState::AutoOn);

        // 4h01m of venting exceeds the limit.
        let t = 1000 + 4 * HOUR_MS + 60_000;
        assert!(!ctx.update(&s, 80, 70, t));
        assert_eq!(ctx.state(), ArmState::AwaitHot);
        assert!(ctx.run_time_ms() >= 4 * HOUR_MS);

        // Favorable conditions do not restart it while awaiting the new day.
        assert!(!ctx.update(&s, 80, 70, t + 1000));
        assert_eq!(ctx.state(), ArmState::AwaitHot);

        // Outdoor reaching indoor + delta-arm re-arms and clears the timer.
        assert!(!ctx.update(&s, 80, 81, t + 2000));
        assert_eq!(ctx.state(), ArmState::AwaitOn);
        assert_eq!(ctx.run_time_ms(), 0);

        // The next cycle can start venting again.
        assert!(ctx.update(&s, 80, 70, t + 3000));
        assert_eq!(ctx.state(), ArmState::AutoOn);
    }

    #[test]
    fn auto_run_time_is_cumulative_across_off_periods() {
        let s = auto_settings();
        let mut ctx = ControlContext::new(0);
        ctx.update(&s, 80, 70, 0);

        // Vent 3 hours, stop on temperature, later vent 1h01m more.
        ctx.update(&s, 80, 70, 3 * HOUR_MS);
        assert!(!ctx.update(&s, 74, 70, 3 * HOUR_MS + 1000));
        assert_eq!(ctx.state(), ArmState::AwaitOn);
        let banked = ctx.run_time_ms();
        assert!(banked >= 3 * HOUR_MS);

        ctx.update(&s, 80, 70, 3 * HOUR_MS + 2000);
        assert_eq!(ctx.state(), ArmState::AutoOn);
        let t = 3 * HOUR_MS + 2000 + HOUR_MS + 60_000;
        assert!(!ctx.update(&s, 80, 70, t));
        assert_eq!(ctx.state(), ArmState::AwaitHot);
    }

    #[test]
    fn on_mode_with_zero_limit_never_times_out() {
        let s = Settings {
            mode: Mode::On,
            max_run_time_hours: 0,
            ..Settings::default()
        };
        let mut ctx = ControlContext::new(0);

        let mut now = 0u32;
        for _ in 0..200 {
            now = now.wrapping_add(10 * HOUR_MS);
            assert!(ctx.update(&s, 70, 70, now));
            assert_eq!(ctx.state(), ArmState::On);
        }
        // Two thousand hours on: the timer sits at its cap.
        assert_eq!(ctx.run_time_ms(), RUN_TIME_CAP_MS);
    }

    #[test]
    fn on_mode_times_out_and_resumes_on_button() {
        let s = Settings {
            mode: Mode::On,
            ..Settings::default()
        };
        let mut ctx = ControlContext::new(0);
        assert!(ctx.update(&s, 70, 70, 0));

        let t = 4 * HOUR_MS + 1;
        assert!(!ctx.update(&s, 70, 70, t));
        assert_eq!(ctx.state(), ArmState::OnTimeout);

        ctx.run_timer_pressed();
        assert_eq!(ctx.state(), ArmState::On);
        assert_eq!(ctx.run_time_ms(), 0);
        assert!(ctx.update(&s, 70, 70, t + 1000));
    }

    #[test]
    fn off_mode_clears_timer_and_actuator() {
        let mut s = auto_settings();
        let mut ctx = ControlContext::new(0);
        ctx.update(&s, 80, 70, HOUR_MS);
        assert!(ctx.run_time_ms() > 0 || ctx.state() == ArmState::AutoOn);

        s.mode = Mode::Off;
        assert!(!ctx.update(&s, 80, 70, HOUR_MS + 1000));
        assert_eq!(ctx.state(), ArmState::Off);
        assert_eq!(ctx.run_time_ms(), 0);
    }

    #[test]
    fn mode_changes_force_consistent_state() {
        let mut s = auto_settings();
        let mut ctx = ControlContext::new(0);
        ctx.update(&s, 80, 70, 1000);
        assert_eq!(ctx.state(), ArmState::AutoOn);

        s.mode = Mode::On;
        ctx.update(&s, 80, 70, 2000);
        assert_eq!(ctx.state(), ArmState::On);

        s.mode = Mode::Auto;
        ctx.update(&s, 80, 75, 3000);
        assert_eq!(ctx.state(), ArmState::AwaitOn);
    }

    #[test]
    fn run_timer_button_cycles_auto_states() {
        let s = auto_settings();
        let mut ctx = ControlContext::new(0);
        ctx.update(&s, 80, 75, 1000);
        assert_eq!(ctx.state(), ArmState::AwaitOn);

        ctx.run_timer_pressed();
        assert_eq!(ctx.state(), ArmState::AwaitHot);

        ctx.run_timer_pressed();
        assert_eq!(ctx.state(), ArmState::AwaitOn);
        assert_eq!(ctx.run_time_ms(), 0);
    }

    #[test]
    fn wrapping_clock_does_not_lose_time() {
        let s = Settings {
            mode: Mode::On,
            max_run_time_hours: 0,
            ..Settings::default()
        };
        let mut ctx = ControlContext::new(u32::MAX - 500);
        assert!(ctx.update(&s, 70, 70, u32::MAX - 500));
        // Step across the wrap point.
        assert!(ctx.update(&s, 70, 70, 500));
        assert_eq!(ctx.run_time_ms(), 1001);
    }
}
