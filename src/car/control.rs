use crate::protocol::Message;

/// Control outputs sent back to the server each tick.
///
/// Every setter clamps to the channel's declared range, so a stored value
/// is always valid and serialization never re-clamps. Throttle and brake
/// are independent channels; mutual exclusion, where wanted, is a policy
/// concern.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CarControl {
    accel: f32,
    brake: f32,
    steer: f32,
    clutch: f32,
    gear: i32,
    meta: bool,
}

impl CarControl {
    pub fn set_accel(&mut self, accel: f32) {
        self.accel = accel.clamp(0.0, 1.0);
    }

    pub fn set_brake(&mut self, brake: f32) {
        self.brake = brake.clamp(0.0, 1.0);
    }

    pub fn set_steer(&mut self, steer: f32) {
        self.steer = steer.clamp(-1.0, 1.0);
    }

    pub fn set_clutch(&mut self, clutch: f32) {
        self.clutch = clutch.clamp(0.0, 1.0);
    }

    pub fn set_gear(&mut self, gear: i32) {
        self.gear = gear.clamp(-1, 6);
    }

    /// Request that the server end the current episode.
    pub fn set_meta(&mut self, meta: bool) {
        self.meta = meta;
    }

    pub fn accel(&self) -> f32 {
        self.accel
    }

    pub fn brake(&self) -> f32 {
        self.brake
    }

    pub fn steer(&self) -> f32 {
        self.steer
    }

    pub fn clutch(&self) -> f32 {
        self.clutch
    }

    pub fn gear(&self) -> i32 {
        self.gear
    }

    pub fn meta(&self) -> bool {
        self.meta
    }

    /// The five control groups of the wire protocol, plus the meta group
    /// when an episode exit has been requested.
    pub fn to_message(&self) -> Message {
        let mut message = Message::new();
        message.push("accel", vec![self.accel]);
        message.push("brake", vec![self.brake]);
        message.push("gear", vec![self.gear as f32]);
        message.push("steer", vec![self.steer]);
        message.push("clutch", vec![self.clutch]);
        if self.meta {
            message.push("meta", vec![1.0]);
        }
        message
    }
}
