use serde::Serialize;

/// Competition stage announced by the server operator.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub enum Stage {
    WarmUp,
    Qualifying,
    Race,
    #[default]
    Unknown,
}

impl Stage {
    /// Map the numeric CLI argument (0 - Warm-Up, 1 - Qualifying,
    /// 2 - Race, anything else - Unknown).
    pub fn from_arg(stage: u8) -> Self {
        match stage {
            0 => Stage::WarmUp,
            1 => Stage::Qualifying,
            2 => Stage::Race,
            _ => Stage::Unknown,
        }
    }

    /// Race type label used in the telemetry log.
    pub fn race_type(&self) -> &'static str {
        match self {
            Stage::WarmUp => "warmup",
            Stage::Qualifying => "qualifying",
            Stage::Race => "race",
            Stage::Unknown => "unknown",
        }
    }
}

/// Immutable client configuration, built once at startup from the CLI.
#[derive(Clone, Debug, Serialize)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// Bot identifier sent during the handshake.
    pub bot_id: String,
    /// Stop after this many episodes.
    pub max_episodes: u32,
    /// Per-episode step budget; 0 means unlimited.
    pub max_steps: u32,
    pub track: Option<String>,
    pub stage: Stage,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3001,
            bot_id: "SCR".to_string(),
            max_episodes: 1,
            max_steps: 0,
            track: None,
            stage: Stage::Unknown,
        }
    }
}

impl ClientConfig {
    pub fn track_name(&self) -> &str {
        self.track.as_deref().unwrap_or("unknown")
    }
}
