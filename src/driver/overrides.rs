use std::sync::{Arc, Mutex, PoisonError};

/// Manual control inputs that take precedence over the autonomous policy.
///
/// Each channel is independent: an absent value means "defer to the
/// policy" for that channel only. The reverse toggle is a mode, not a
/// channel; while it is on the policy forces gear -1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OverrideState {
    steer: Option<f32>,
    accel: Option<f32>,
    brake: Option<f32>,
    reverse: bool,
}

impl OverrideState {
    /// Set or clear the steering override, clamped to [-1, 1].
    pub fn set_steer(&mut self, steer: Option<f32>) {
        self.steer = steer.map(|v| v.clamp(-1.0, 1.0));
    }

    /// Set or clear the throttle override, clamped to [0, 1].
    pub fn set_accel(&mut self, accel: Option<f32>) {
        self.accel = accel.map(|v| v.clamp(0.0, 1.0));
    }

    /// Set or clear the brake override, clamped to [0, 1].
    pub fn set_brake(&mut self, brake: Option<f32>) {
        self.brake = brake.map(|v| v.clamp(0.0, 1.0));
    }

    pub fn set_reverse(&mut self, reverse: bool) {
        self.reverse = reverse;
    }

    pub fn steer(&self) -> Option<f32> {
        self.steer
    }

    pub fn accel(&self) -> Option<f32> {
        self.accel
    }

    pub fn brake(&self) -> Option<f32> {
        self.brake
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }
}

/// Source of manual override values, polled once per tick by the driver.
///
/// How the values are produced (key bindings, an external controller, a
/// test fixture) is entirely the implementor's business.
pub trait OverrideSource {
    fn current(&self) -> OverrideState;
}

/// An override source that never overrides anything; the car coasts
/// wherever the autonomous policy has no law of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOverrides;

impl OverrideSource for NoOverrides {
    fn current(&self) -> OverrideState {
        OverrideState::default()
    }
}

/// Thread-safe override state that an input thread can feed while the
/// session loop polls it.
#[derive(Clone, Debug, Default)]
pub struct SharedOverrides {
    inner: Arc<Mutex<OverrideState>>,
}

impl SharedOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_steer(&self, steer: Option<f32>) {
        self.lock().set_steer(steer);
    }

    pub fn set_accel(&self, accel: Option<f32>) {
        self.lock().set_accel(accel);
    }

    pub fn set_brake(&self, brake: Option<f32>) {
        self.lock().set_brake(brake);
    }

    pub fn toggle_reverse(&self) {
        let mut state = self.lock();
        let reverse = !state.reverse();
        state.set_reverse(reverse);
        if reverse {
            // entering reverse holds the throttle closed until the user
            // presses it again
            state.set_accel(Some(0.0));
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, OverrideState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OverrideSource for SharedOverrides {
    fn current(&self) -> OverrideState {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_clamp_on_assignment() {
        let mut state = OverrideState::default();
        state.set_steer(Some(4.0));
        state.set_accel(Some(-0.5));
        state.set_brake(Some(1.2));
        assert_eq!(state.steer(), Some(1.0));
        assert_eq!(state.accel(), Some(0.0));
        assert_eq!(state.brake(), Some(1.0));
    }

    #[test]
    fn test_clearing_a_channel_defers_to_policy() {
        let mut state = OverrideState::default();
        state.set_steer(Some(0.3));
        state.set_steer(None);
        assert_eq!(state.steer(), None);
    }

    #[test]
    fn test_toggle_reverse_clears_throttle_override() {
        let shared = SharedOverrides::new();
        shared.set_accel(Some(1.0));
        shared.toggle_reverse();
        let state = shared.current();
        assert!(state.reverse());
        assert_eq!(state.accel(), Some(0.0));

        shared.toggle_reverse();
        assert!(!shared.current().reverse());
    }
}
