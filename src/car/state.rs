use crate::protocol::Message;

/// Typed snapshot of the car's sensed telemetry.
///
/// One instance lives for the whole session and is refreshed in place on
/// every tick. Fields start at zero (sequences empty) and keep their last
/// value when a sensor key is missing from an incoming message.
#[derive(Clone, Debug, Default)]
pub struct CarState {
    /// Velocity along the car's longitudinal axis, km/h
    pub speed_x: f32,
    /// Velocity along the car's transverse axis, km/h
    pub speed_y: f32,
    /// Velocity along the car's vertical axis, km/h
    pub speed_z: f32,
    /// Engine speed, rpm
    pub rpm: f32,
    /// Current gear, -1 = reverse
    pub gear: i32,
    /// Car heading relative to the track axis, rad
    pub angle: f32,
    /// Lateral position, 0 = center, +-1 = track edge
    pub track_pos: f32,
    /// Accumulated damage
    pub damage: f32,
    /// Distance from the start line along the track
    pub dist_from_start: f32,
    /// Total distance covered
    pub dist_raced: f32,
    /// Current race rank
    pub race_pos: i32,
    /// Remaining fuel, l
    pub fuel: f32,
    /// Time elapsed in the current lap, s
    pub cur_lap_time: f32,
    /// Time of the previous lap, s
    pub last_lap_time: f32,
    /// Vertical position, m
    pub z: f32,
    /// Range-finder readings along the 19 configured angles
    pub track: Vec<f32>,
    /// Opponent proximity sensors, 36 slices of 10 degrees
    pub opponents: Vec<f32>,
    /// Per-wheel spin velocity, rad/s
    pub wheel_spin_vel: Vec<f32>,
}

impl CarState {
    /// Overwrite every field whose sensor key is present in the message.
    /// Absent keys leave the previous value untouched. Sequence sensors
    /// are stored as received, even when shorter than their nominal
    /// length; readers past the end observe the default.
    pub fn refresh(&mut self, message: &Message) {
        if let Some(v) = message.scalar("speedX") {
            self.speed_x = v;
        }
        if let Some(v) = message.scalar("speedY") {
            self.speed_y = v;
        }
        if let Some(v) = message.scalar("speedZ") {
            self.speed_z = v;
        }
        if let Some(v) = message.scalar("rpm") {
            self.rpm = v;
        }
        if let Some(v) = message.scalar("gear") {
            self.gear = v as i32;
        }
        if let Some(v) = message.scalar("angle") {
            self.angle = v;
        }
        if let Some(v) = message.scalar("trackPos") {
            self.track_pos = v;
        }
        if let Some(v) = message.scalar("damage") {
            self.damage = v;
        }
        if let Some(v) = message.scalar("distFromStart") {
            self.dist_from_start = v;
        }
        if let Some(v) = message.scalar("distRaced") {
            self.dist_raced = v;
        }
        if let Some(v) = message.scalar("racePos") {
            self.race_pos = v as i32;
        }
        if let Some(v) = message.scalar("fuel") {
            self.fuel = v;
        }
        if let Some(v) = message.scalar("curLapTime") {
            self.cur_lap_time = v;
        }
        if let Some(v) = message.scalar("lastLapTime") {
            self.last_lap_time = v;
        }
        if let Some(v) = message.scalar("z") {
            self.z = v;
        }
        if let Some(values) = message.get("track") {
            self.track = values.to_vec();
        }
        if let Some(values) = message.get("opponents") {
            self.opponents = values.to_vec();
        }
        if let Some(values) = message.get("wheelSpinVel") {
            self.wheel_spin_vel = values.to_vec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    #[test]
    fn test_refresh_populates_known_fields() {
        let mut state = CarState::default();
        state.refresh(&decode(
            "(angle 0.1)(speedX 42.5)(rpm 6500)(gear 3)(trackPos -0.2)(racePos 4)",
        ));
        assert_eq!(state.angle, 0.1);
        assert_eq!(state.speed_x, 42.5);
        assert_eq!(state.rpm, 6500.0);
        assert_eq!(state.gear, 3);
        assert_eq!(state.track_pos, -0.2);
        assert_eq!(state.race_pos, 4);
    }

    #[test]
    fn test_refresh_keeps_previous_value_for_absent_keys() {
        let mut state = CarState::default();
        state.refresh(&decode("(rpm 6500)(speedX 42.5)"));
        state.refresh(&decode("(speedX 50.0)"));
        assert_eq!(state.rpm, 6500.0);
        assert_eq!(state.speed_x, 50.0);
    }

    #[test]
    fn test_refresh_accepts_short_sequences() {
        let mut state = CarState::default();
        state.refresh(&decode("(track 1 2 3)(wheelSpinVel 0.5 0.5)"));
        assert_eq!(state.track, vec![1.0, 2.0, 3.0]);
        assert_eq!(state.wheel_spin_vel, vec![0.5, 0.5]);
        assert!(state.opponents.is_empty());
    }

    #[test]
    fn test_defaults_are_zero() {
        let state = CarState::default();
        assert_eq!(state.speed_x, 0.0);
        assert_eq!(state.gear, 0);
        assert!(state.track.is_empty());
    }
}
