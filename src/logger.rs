// CSV telemetry sink.
//
// One running log file shared by every race: rows are appended to
// `race_data.csv` under the log directory and the header is written only
// when the file is first created. Each race gets its own session id and
// start-time columns so sessions can be told apart when the file is
// loaded for analysis.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use chrono::Local;
use itertools::Itertools;
use log::info;

use crate::car::{CarControl, CarState, OPPONENT_SENSORS, TRACK_SENSORS, WHEELS};
use crate::errors::ScrcError;

pub const LOG_FILE_NAME: &str = "race_data.csv";

pub struct TelemetryLog {
    writer: BufWriter<File>,
    track_name: String,
    race_type: &'static str,
    session_id: String,
    session_start_time: String,
    started: Instant,
    last_lap_time: f32,
    current_lap: u32,
}

impl TelemetryLog {
    /// Open (or create) the running log under `dir` for a new race.
    pub fn open(dir: &Path, track_name: &str, race_type: &'static str) -> Result<Self, ScrcError> {
        std::fs::create_dir_all(dir).map_err(|e| ScrcError::TelemetryLogDir { source: e })?;
        let path = dir.join(LOG_FILE_NAME);
        let needs_header = !path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ScrcError::TelemetryLogWrite { source: e })?;
        let mut writer = BufWriter::new(file);
        if needs_header {
            writeln!(writer, "{}", header().iter().join(","))
                .map_err(|e| ScrcError::TelemetryLogWrite { source: e })?;
        }

        let now = Local::now();
        info!("logging telemetry to {}", path.display());
        Ok(Self {
            writer,
            track_name: track_name.to_string(),
            race_type,
            session_id: now.format("%Y%m%d_%H%M%S").to_string(),
            session_start_time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            started: Instant::now(),
            last_lap_time: 0.0,
            current_lap: 0,
        })
    }

    /// Append one row for a finished tick. Fire and forget from the
    /// session's point of view; a failed write only loses that row.
    pub fn record(&mut self, state: &CarState, control: &CarControl) -> Result<(), ScrcError> {
        // a change of lastLapTime marks a completed lap
        if state.last_lap_time != self.last_lap_time {
            self.current_lap += 1;
            self.last_lap_time = state.last_lap_time;
        }

        let mut row: Vec<String> = Vec::with_capacity(header().len());
        row.push(format!("{:.3}", self.started.elapsed().as_secs_f64()));
        row.push(self.current_lap.to_string());
        row.push(state.last_lap_time.to_string());
        row.push(state.race_pos.to_string());

        row.push(state.speed_x.to_string());
        row.push(state.speed_y.to_string());
        row.push(state.speed_z.to_string());
        row.push(state.rpm.to_string());
        row.push(state.gear.to_string());
        row.push(state.fuel.to_string());
        row.push(state.angle.to_string());
        row.push(state.track_pos.to_string());

        row.extend(padded(&state.track, TRACK_SENSORS));
        row.extend(padded(&state.opponents, OPPONENT_SENSORS));
        row.extend(padded(&state.wheel_spin_vel, WHEELS));

        row.push(control.accel().to_string());
        row.push(control.brake().to_string());
        row.push(control.steer().to_string());
        row.push(control.clutch().to_string());

        row.push(self.track_name.clone());
        row.push(self.race_type.to_string());
        row.push(state.damage.to_string());
        row.push(state.dist_from_start.to_string());
        row.push(state.dist_raced.to_string());

        row.push(self.session_id.clone());
        row.push(self.session_start_time.clone());

        writeln!(self.writer, "{}", row.iter().join(","))
            .map_err(|e| ScrcError::TelemetryLogWrite { source: e })?;
        self.writer
            .flush()
            .map_err(|e| ScrcError::TelemetryLogWrite { source: e })
    }

    /// Flush any buffered rows at the end of a race.
    pub fn close(mut self) -> Result<(), ScrcError> {
        self.writer
            .flush()
            .map_err(|e| ScrcError::TelemetryLogWrite { source: e })
    }
}

fn padded(values: &[f32], len: usize) -> impl Iterator<Item = String> + '_ {
    (0..len).map(|i| values.get(i).copied().unwrap_or(0.0).to_string())
}

fn header() -> Vec<String> {
    let mut columns: Vec<String> = [
        // race information
        "timestamp",
        "lap_number",
        "lap_time",
        "race_position",
        // car state
        "speed_x",
        "speed_y",
        "speed_z",
        "rpm",
        "gear",
        "fuel",
        "angle",
        "track_position",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    columns.extend((0..TRACK_SENSORS).map(|i| format!("track_sensor_{i}")));
    columns.extend((0..OPPONENT_SENSORS).map(|i| format!("opponent_sensor_{i}")));
    for wheel in ["fl", "fr", "rl", "rr"] {
        columns.push(format!("wheel_spin_vel_{wheel}"));
    }

    columns.extend(
        [
            // car control inputs
            "accel",
            "brake",
            "steer",
            "clutch",
            // race metadata
            "track_name",
            "race_type",
            "damage",
            "distance_from_start",
            "distance_raced",
            // race session info
            "session_id",
            "session_start_time",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    columns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode;

    fn sample_state() -> CarState {
        let mut state = CarState::default();
        state.refresh(&decode(
            "(speedX 42.5)(rpm 6500)(gear 3)(angle 0.1)(trackPos -0.2)(racePos 4)\
             (lastLapTime 92.3)(track 1 2 3)(wheelSpinVel 10 10 11 11)",
        ));
        state
    }

    #[test]
    fn test_header_written_once_and_rows_appended() {
        let dir = tempfile::tempdir().unwrap();
        let mut control = CarControl::default();
        control.set_accel(0.5);

        {
            let mut log = TelemetryLog::open(dir.path(), "forza", "race").unwrap();
            log.record(&sample_state(), &control).unwrap();
            log.close().unwrap();
        }
        {
            let mut log = TelemetryLog::open(dir.path(), "forza", "race").unwrap();
            log.record(&sample_state(), &control).unwrap();
            log.close().unwrap();
        }

        let contents = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,lap_number,"));
        assert!(!lines[1].starts_with("timestamp"));
        assert!(!lines[2].starts_with("timestamp"));
    }

    #[test]
    fn test_row_has_one_value_per_column() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TelemetryLog::open(dir.path(), "forza", "qualifying").unwrap();
        log.record(&sample_state(), &CarControl::default()).unwrap();
        log.close().unwrap();

        let contents = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        let columns = lines[0].split(',').count();
        assert_eq!(columns, header().len());
        assert_eq!(lines[1].split(',').count(), columns);
    }

    #[test]
    fn test_lap_counter_follows_last_lap_time_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TelemetryLog::open(dir.path(), "forza", "race").unwrap();
        let control = CarControl::default();

        let mut state = CarState::default();
        log.record(&state, &control).unwrap();
        state.last_lap_time = 90.0;
        log.record(&state, &control).unwrap();
        log.record(&state, &control).unwrap();
        state.last_lap_time = 88.5;
        log.record(&state, &control).unwrap();
        log.close().unwrap();

        let contents = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        let laps: Vec<&str> = contents
            .lines()
            .skip(1)
            .map(|line| line.split(',').nth(1).unwrap())
            .collect();
        assert_eq!(laps, vec!["0", "1", "1", "2"]);
    }

    #[test]
    fn test_short_sequences_padded_with_zero() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = TelemetryLog::open(dir.path(), "forza", "race").unwrap();
        log.record(&sample_state(), &CarControl::default()).unwrap();
        log.close().unwrap();

        let contents = std::fs::read_to_string(dir.path().join(LOG_FILE_NAME)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        let header_cols: Vec<&str> = lines[0].split(',').collect();
        let row_cols: Vec<&str> = lines[1].split(',').collect();
        let idx = header_cols
            .iter()
            .position(|c| *c == "track_sensor_3")
            .unwrap();
        // only 3 track readings were supplied
        assert_eq!(row_cols[idx], "0");
    }
}
