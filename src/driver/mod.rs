pub(crate) mod overrides;

pub use overrides::{NoOverrides, OverrideSource, OverrideState, SharedOverrides};

use crate::car::{CarControl, CarState};
use crate::protocol::Message;

/// Maximum steering wheel deflection, rad (45 degrees).
const STEER_LOCK: f32 = 0.785398;

/// Upshift when the rpm is rising past this point.
const UPSHIFT_RPM: f32 = 7000.0;
/// Downshift when the rpm is falling below this point.
const DOWNSHIFT_RPM: f32 = 3000.0;

/// Policy memory carried from one tick to the next within an episode.
///
/// Kept outside the driver and threaded through each invocation so the
/// session can reset it explicitly at an episode restart.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PolicyState {
    prev_rpm: Option<f32>,
}

/// The driving decision policy: maps a sensor snapshot plus the current
/// manual overrides to a control command.
///
/// The policy never fails. Out-of-domain inputs (a NaN surviving a
/// malformed decode) propagate into the command and are left to the
/// server side to reject.
pub struct Driver<O: OverrideSource> {
    overrides: O,
}

impl<O: OverrideSource> Driver<O> {
    pub fn new(overrides: O) -> Self {
        Self { overrides }
    }

    /// The init group listing the 19 range-finder angles, in degrees.
    /// Symmetric about 0 and finer-grained towards the forward direction:
    /// 15 degree steps out to the sides, 5 degree steps near the nose.
    pub fn init(&self) -> Message {
        let mut angles = [0.0f32; 19];
        for i in 0..5 {
            angles[i] = -90.0 + i as f32 * 15.0;
            angles[18 - i] = 90.0 - i as f32 * 15.0;
        }
        for i in 5..9 {
            angles[i] = -20.0 + (i - 5) as f32 * 5.0;
            angles[18 - i] = 20.0 - (i - 5) as f32 * 5.0;
        }
        let mut message = Message::new();
        message.push("init", angles.to_vec());
        message
    }

    /// Compute the control command for one tick and the policy state to
    /// carry into the next one.
    pub fn drive(&self, state: &CarState, carried: PolicyState) -> (CarControl, PolicyState) {
        let overrides = self.overrides.current();
        let mut control = CarControl::default();

        self.steer(state, &overrides, &mut control);
        self.gear(state, &overrides, carried, &mut control);
        self.speed(&overrides, &mut control);

        (
            control,
            PolicyState {
                prev_rpm: Some(state.rpm),
            },
        )
    }

    /// Proportional controller correcting heading error and lateral
    /// offset at once, unless a manual steer override is present.
    fn steer(&self, state: &CarState, overrides: &OverrideState, control: &mut CarControl) {
        match overrides.steer() {
            Some(steer) => control.set_steer(steer),
            None => control.set_steer((state.angle - state.track_pos * 0.5) / STEER_LOCK),
        }
    }

    /// Hysteretic gear selection keyed on speed, rpm and the rpm trend.
    fn gear(
        &self,
        state: &CarState,
        overrides: &OverrideState,
        carried: PolicyState,
        control: &mut CarControl,
    ) {
        if overrides.reverse() {
            control.set_gear(-1);
            return;
        }

        let speed = state.speed_x;
        let rpm = state.rpm;
        let gear = if speed < 10.0 {
            // recovery/start condition
            1
        } else if speed < 20.0 && rpm < 4000.0 {
            (state.gear - 1).max(1)
        } else if speed < 30.0 && rpm < 3500.0 {
            (state.gear - 1).max(1)
        } else if speed < 40.0 && rpm < 3000.0 {
            (state.gear - 1).max(1)
        } else {
            let rising = carried.prev_rpm.is_none_or(|prev| rpm > prev);
            let mut gear = state.gear;
            if rising && rpm > UPSHIFT_RPM {
                gear += 1;
            }
            if !rising && rpm < DOWNSHIFT_RPM {
                gear -= 1;
            }
            gear.clamp(1, 6)
        };
        control.set_gear(gear);
    }

    /// Throttle and brake come from the manual overrides or default to
    /// coasting; there is no autonomous throttle law. In reverse the
    /// throttle is applied unmodified, direction is encoded by gear -1.
    fn speed(&self, overrides: &OverrideState, control: &mut CarControl) {
        control.set_accel(overrides.accel().unwrap_or(0.0));
        control.set_brake(overrides.brake().unwrap_or(0.0));
    }
}
