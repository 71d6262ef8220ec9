pub(crate) mod control;
pub(crate) mod state;

pub use control::CarControl;
pub use state::CarState;

pub const TRACK_SENSORS: usize = 19;
pub const OPPONENT_SENSORS: usize = 36;
pub const WHEELS: usize = 4;
