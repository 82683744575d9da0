//! Two-point affine calibration between raw touch readings and display
//! pixels, plus the tap/release sequence that drives an interactive
//! calibration run.

/// Display size in pixels, portrait orientation.
pub const SCREEN_WIDTH: i16 = 240;
pub const SCREEN_HEIGHT: i16 = 320;

/// Calibration targets are inset from the corners by this much to stay
/// clear of the panel's edge non-linearity (marker arm length plus 2).
pub const TARGET_INSET: i16 = 12;

/// A display pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Point {
    pub x: i16,
    pub y: i16,
}

/// A raw touch-controller reading: axis positions plus pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawPoint {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchCalibError {
    /// Both taps produced (nearly) the same reading on one axis; no line
    /// can be solved from them.
    DegenerateAxis,
}

/// Per-axis independent affine transform `display = scale * touch + offset`,
/// solved from two correspondence points.
///
/// The default is an identity-like mapping, so applying an uncalibrated
/// transform passes coordinates through rather than failing; callers are
/// expected to calibrate (or load stored scalars) before trusting results.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AffineCalibration {
    x_scale: f32,
    x_offset: f32,
    y_scale: f32,
    y_offset: f32,
}

impl Default for AffineCalibration {
    fn default() -> Self {
        Self {
            x_scale: 1.0,
            x_offset: 0.0,
            y_scale: 1.0,
            y_offset: 0.0,
        }
    }
}

impl AffineCalibration {
    /// Solve the two per-axis transforms from a pair of correspondences:
    /// the display points where the targets were drawn and the raw touch
    /// readings recorded when each was tapped.
    pub fn from_corners(
        disp_ul: Point,
        disp_lr: Point,
        touch_ul: RawPoint,
        touch_lr: RawPoint,
    ) -> Result<Self, TouchCalibError> {
        let dx = (touch_lr.x - touch_ul.x) as f32;
        let dy = (touch_lr.y - touch_ul.y) as f32;
        if libm::fabsf(dx) < 1.0 || libm::fabsf(dy) < 1.0 {
            return Err(TouchCalibError::DegenerateAxis);
        }

        let x_scale = (disp_lr.x - disp_ul.x) as f32 / dx;
        let y_scale = (disp_lr.y - disp_ul.y) as f32 / dy;
        Ok(Self {
            x_scale,
            x_offset: disp_ul.x as f32 - x_scale * touch_ul.x as f32,
            y_scale,
            y_offset: disp_ul.y as f32 - y_scale * touch_ul.y as f32,
        })
    }

    /// Map a raw touch reading to a display pixel, rounded to the nearest
    /// pixel and clamped to the screen.
    pub fn map(&self, raw: RawPoint) -> Point {
        let x = self.x_scale * raw.x as f32 + self.x_offset;
        let y = self.y_scale * raw.y as f32 + self.y_offset;
        Point {
            x: (round(x) as i16).clamp(0, SCREEN_WIDTH - 1),
            y: (round(y) as i16).clamp(0, SCREEN_HEIGHT - 1),
        }
    }

    /// The four calibration scalars as one record, for persistence.
    pub fn coefficients(&self) -> [f32; 4] {
        [self.x_scale, self.x_offset, self.y_scale, self.y_offset]
    }

    /// Restore all four scalars at once (the stored-settings load path).
    pub fn set_coefficients(&mut self, c: [f32; 4]) {
        *self = Self {
            x_scale: c[0],
            x_offset: c[1],
            y_scale: c[2],
            y_offset: c[3],
        };
    }
}

fn round(v: f32) -> i32 {
    libm::floorf(v + 0.5) as i32
}

/// The two display points at which calibration targets are drawn, inset
/// from the upper-left and lower-right screen corners.
pub fn corner_targets(inset: i16) -> (Point, Point) {
    (
        Point { x: inset, y: inset },
        Point {
            x: SCREEN_WIDTH - 1 - inset,
            y: SCREEN_HEIGHT - 1 - inset,
        },
    )
}

/// What the UI should do next, emitted as the session advances.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    /// First tap released; draw the second corner target.
    ShowSecondTarget,
    /// Both corners tapped; the transform was solved and is provisionally
    /// in effect for test taps.
    Computed(AffineCalibration),
    /// Both taps landed on the same spot; the session restarted from the
    /// first target.
    Restarted(TouchCalibError),
    /// A test tap, already mapped through the provisional calibration;
    /// draw a marker there.
    TestPoint(Point),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitFirstTap,
    WaitFirstRelease,
    WaitSecondTap,
    WaitSecondRelease,
    WaitTestTap,
    WaitTestRelease,
}

/// Interactive two-tap calibration sequence.
///
/// The session owns only the coordinate math and phase bookkeeping; an
/// external collaborator polls the touch driver, feeds samples in, and
/// renders whatever the returned events ask for. The solved calibration is
/// held provisionally until the caller commits it (or abandons the session,
/// which leaves any previously stored calibration untouched).
pub struct CalibrationSession {
    phase: Phase,
    first_target: Point,
    second_target: Point,
    first_touch: RawPoint,
    result: Option<AffineCalibration>,
}

impl CalibrationSession {
    pub fn new() -> Self {
        let (first_target, second_target) = corner_targets(TARGET_INSET);
        Self {
            phase: Phase::WaitFirstTap,
            first_target,
            second_target,
            first_touch: RawPoint { x: 0, y: 0, z: 0 },
            result: None,
        }
    }

    /// Display points for the two targets, in tap order.
    pub fn targets(&self) -> (Point, Point) {
        (self.first_target, self.second_target)
    }

    /// The provisionally computed calibration, once both taps are in.
    pub fn calibration(&self) -> Option<&AffineCalibration> {
        self.result.as_ref()
    }

    /// Advance the sequence with one polled touch sample.
    pub fn feed(&mut self, touched: bool, raw: RawPoint) -> Option<SessionEvent> {
        match self.phase {
            Phase::WaitFirstTap => {
                if touched {
                    self.first_touch = raw;
                    self.phase = Phase::WaitFirstRelease;
                }
                None
            }
            Phase::WaitFirstRelease => {
                if !touched {
                    self.phase = Phase::WaitSecondTap;
                    return Some(SessionEvent::ShowSecondTarget);
                }
                None
            }
            Phase::WaitSecondTap => {
                if touched {
                    match AffineCalibration::from_corners(
                        self.first_target,
                        self.second_target,
                        self.first_touch,
                        raw,
                    ) {
                        Ok(cal) => {
                            self.result = Some(cal);
                            self.phase = Phase::WaitSecondRelease;
                            None
                        }
                        Err(e) => {
                            self.phase = Phase::WaitFirstTap;
                            self.result = None;
                            Some(SessionEvent::Restarted(e))
                        }
                    }
                } else {
                    None
                }
            }
            Phase::WaitSecondRelease => {
                if !touched {
                    self.phase = Phase::WaitTestTap;
                    return self.result.map(SessionEvent::Computed);
                }
                None
            }
            Phase::WaitTestTap => {
                if touched {
                    self.phase = Phase::WaitTestRelease;
                    let cal = self.result.unwrap_or_default();
                    return Some(SessionEvent::TestPoint(cal.map(raw)));
                }
                None
            }
            Phase::WaitTestRelease => {
                if !touched {
                    self.phase = Phase::WaitTestTap;
                }
                None
            }
        }
    }
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}
