// Session lifecycle over the SCRC UDP protocol.
//
// The server paces the exchange: one sensor datagram in, one control
// datagram out, once per simulation tick. Everything runs on a single
// thread with a blocking, timeout-bounded receive; a timeout is how the
// handshake retries and how a stalled tick is tolerated.

use std::io;
use std::net::UdpSocket;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};

use crate::car::CarState;
use crate::config::ClientConfig;
use crate::driver::{Driver, OverrideSource, PolicyState};
use crate::errors::ScrcError;
use crate::logger::TelemetryLog;
use crate::protocol;

pub const RECV_TIMEOUT: Duration = Duration::from_secs(1);
const DATAGRAM_SIZE: usize = 1000;

const IDENTIFIED_MARKER: &str = "***identified***";
const SHUTDOWN_MARKER: &str = "***shutdown***";
const RESTART_MARKER: &str = "***restart***";
/// Ask the server to end the current episode early.
const META_EXIT: &str = "(meta 1)";

/// Datagram transport with a bounded blocking receive.
///
/// `recv` returning `None` means the timeout elapsed with no data, which
/// is never an error at this layer. A failed send is fatal.
pub trait Transport {
    fn send(&mut self, payload: &str) -> Result<(), ScrcError>;
    fn recv(&mut self) -> Result<Option<String>, ScrcError>;
}

/// UDP transport connected to the simulation server.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn connect(host: &str, port: u16) -> Result<Self, ScrcError> {
        let endpoint = format!("{host}:{port}");
        let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(|e| ScrcError::SocketSetup {
            endpoint: endpoint.clone(),
            source: e,
        })?;
        socket
            .connect((host, port))
            .map_err(|e| ScrcError::SocketSetup {
                endpoint: endpoint.clone(),
                source: e,
            })?;
        socket
            .set_read_timeout(Some(RECV_TIMEOUT))
            .map_err(|e| ScrcError::SocketSetup {
                endpoint,
                source: e,
            })?;
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, payload: &str) -> Result<(), ScrcError> {
        self.socket
            .send(payload.as_bytes())
            .map(|_| ())
            .map_err(|e| ScrcError::SocketSend { source: e })
    }

    fn recv(&mut self) -> Result<Option<String>, ScrcError> {
        let mut buf = [0u8; DATAGRAM_SIZE];
        match self.socket.recv(&mut buf) {
            Ok(received) => Ok(Some(String::from_utf8_lossy(&buf[..received]).into_owned())),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(ScrcError::SocketReceive { source: e }),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionState {
    Handshaking,
    Racing,
    EpisodeDone,
    Terminated,
}

/// Drives the handshake/step/episode state machine and orchestrates the
/// codec, car state, policy and telemetry log each tick.
pub struct SessionClient<T: Transport, O: OverrideSource> {
    config: ClientConfig,
    transport: T,
    driver: Driver<O>,
    car: CarState,
    carried: PolicyState,
    state: SessionState,
    step: u32,
    episode: u32,
    logger: Option<TelemetryLog>,
    log_dir: Box<Path>,
}

impl<T: Transport, O: OverrideSource> SessionClient<T, O> {
    pub fn new(config: ClientConfig, transport: T, driver: Driver<O>) -> Self {
        Self::with_log_dir(config, transport, driver, Path::new("logs"))
    }

    pub fn with_log_dir(
        config: ClientConfig,
        transport: T,
        driver: Driver<O>,
        log_dir: &Path,
    ) -> Self {
        Self {
            config,
            transport,
            driver,
            car: CarState::default(),
            carried: PolicyState::default(),
            state: SessionState::Handshaking,
            step: 0,
            episode: 0,
            logger: None,
            log_dir: log_dir.into(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Run until the server shuts the client down or the configured
    /// episode count is exhausted.
    pub fn run(&mut self) -> Result<(), ScrcError> {
        while self.state != SessionState::Terminated {
            self.tick()?;
        }
        info!("client shutdown after {} episode(s)", self.episode);
        Ok(())
    }

    /// Advance the state machine by one step. Exposed separately from
    /// `run` so tests can observe individual transitions.
    pub fn tick(&mut self) -> Result<(), ScrcError> {
        match self.state {
            SessionState::Handshaking => self.handshake(),
            SessionState::Racing => self.race_tick(),
            SessionState::EpisodeDone => {
                self.finish_episode();
                Ok(())
            }
            SessionState::Terminated => Ok(()),
        }
    }

    /// One identification attempt: send the bot id plus the range-finder
    /// init group, then wait for the identified marker. A timeout or an
    /// unrecognized reply just leads to a resend on the next tick.
    fn handshake(&mut self) -> Result<(), ScrcError> {
        let payload = format!(
            "{}{}",
            self.config.bot_id,
            protocol::encode(&self.driver.init())
        );
        debug!("sending init string to server: {payload}");
        self.transport.send(&payload)?;

        match self.transport.recv()? {
            Some(reply) if reply.contains(IDENTIFIED_MARKER) => {
                info!("identified by server: {reply}");
                self.step = 0;
                self.state = SessionState::Racing;
                self.open_logger();
            }
            Some(reply) => debug!("ignoring reply without identification marker: {reply}"),
            None => debug!("no response from server, resending identification"),
        }
        Ok(())
    }

    fn race_tick(&mut self) -> Result<(), ScrcError> {
        let Some(raw) = self.transport.recv()? else {
            // no data this tick, not a protocol error
            debug!("no response from server");
            return Ok(());
        };

        if raw.contains(SHUTDOWN_MARKER) {
            info!("server requested shutdown");
            self.close_logger();
            self.state = SessionState::Terminated;
            return Ok(());
        }
        if raw.contains(RESTART_MARKER) {
            info!("server requested restart");
            self.state = SessionState::EpisodeDone;
            return Ok(());
        }

        self.step += 1;
        if self.config.max_steps != 0 && self.step == self.config.max_steps {
            info!("step budget reached, requesting episode exit");
            return self.transport.send(META_EXIT);
        }

        self.car.refresh(&protocol::decode(&raw));
        let (control, carried) = self.driver.drive(&self.car, self.carried);
        self.carried = carried;

        if let Some(logger) = self.logger.as_mut() {
            if let Err(e) = logger.record(&self.car, &control) {
                warn!("dropping telemetry row: {e}");
            }
        }

        self.transport.send(&protocol::encode(&control.to_message()))
    }

    fn finish_episode(&mut self) {
        self.episode += 1;
        self.close_logger();
        if self.episode >= self.config.max_episodes {
            self.state = SessionState::Terminated;
        } else {
            // fresh policy memory for the next episode
            self.carried = PolicyState::default();
            self.state = SessionState::Handshaking;
        }
    }

    fn open_logger(&mut self) {
        match TelemetryLog::open(
            &self.log_dir,
            self.config.track_name(),
            self.config.stage.race_type(),
        ) {
            Ok(logger) => self.logger = Some(logger),
            // telemetry is fire-and-forget, the race goes on without it
            Err(e) => warn!("could not open telemetry log: {e}"),
        }
    }

    fn close_logger(&mut self) {
        if let Some(logger) = self.logger.take() {
            if let Err(e) = logger.close() {
                warn!("could not flush telemetry log: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NoOverrides;
    use std::collections::VecDeque;

    /// Scripted transport: pops one inbound item per recv and records
    /// everything sent.
    struct MockTransport {
        inbound: VecDeque<Option<String>>,
        pub sent: Vec<String>,
    }

    impl MockTransport {
        fn script(inbound: &[Option<&str>]) -> Self {
            Self {
                inbound: inbound
                    .iter()
                    .map(|i| i.map(|s| s.to_string()))
                    .collect(),
                sent: Vec::new(),
            }
        }
    }

    impl Transport for MockTransport {
        fn send(&mut self, payload: &str) -> Result<(), ScrcError> {
            self.sent.push(payload.to_string());
            Ok(())
        }

        fn recv(&mut self) -> Result<Option<String>, ScrcError> {
            Ok(self.inbound.pop_front().expect("script exhausted"))
        }
    }

    fn client(
        config: ClientConfig,
        script: &[Option<&str>],
    ) -> SessionClient<MockTransport, NoOverrides> {
        let dir = tempfile::tempdir().unwrap();
        SessionClient::with_log_dir(
            config,
            MockTransport::script(script),
            Driver::new(NoOverrides),
            dir.path(),
        )
    }

    const SENSORS: &str = "(angle 0.0)(speedX 50.0)(rpm 5000)(gear 3)(trackPos 0.0)";

    #[test]
    fn test_handshake_resends_on_timeout() {
        let mut session = client(
            ClientConfig::default(),
            &[None, Some("***identified***"), Some("***shutdown***")],
        );
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
        let init_sends = session
            .transport
            .sent
            .iter()
            .filter(|p| p.starts_with("SCR(init "))
            .count();
        assert_eq!(init_sends, 2);
    }

    #[test]
    fn test_shutdown_marker_terminates_from_racing() {
        let mut session = client(
            ClientConfig::default(),
            &[
                Some("***identified***"),
                Some(SENSORS),
                Some("(angle 0.1)***shutdown***(speedX 10)"),
            ],
        );
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
    }

    #[test]
    fn test_restart_marker_ends_episode() {
        let mut session = client(
            ClientConfig::default(),
            &[Some("***identified***"), Some("***restart***")],
        );
        session.run().unwrap();
        // single configured episode, so restart terminates the client
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(session.episode(), 1);
    }

    #[test]
    fn test_restart_starts_next_episode_until_budget() {
        let config = ClientConfig {
            max_episodes: 2,
            ..ClientConfig::default()
        };
        let mut session = client(
            config,
            &[
                Some("***identified***"),
                Some("***restart***"),
                Some("***identified***"),
                Some("***restart***"),
            ],
        );
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
        assert_eq!(session.episode(), 2);
        let init_sends = session
            .transport
            .sent
            .iter()
            .filter(|p| p.starts_with("SCR(init "))
            .count();
        assert_eq!(init_sends, 2);
    }

    #[test]
    fn test_step_budget_sends_meta_exit_verbatim() {
        let config = ClientConfig {
            max_steps: 5,
            ..ClientConfig::default()
        };
        let mut session = client(
            config,
            &[
                Some("***identified***"),
                Some(SENSORS),
                Some(SENSORS),
                Some(SENSORS),
                Some(SENSORS),
                // fifth tick must trigger the meta request instead of a
                // decode/drive pass, even with a malformed payload
                Some("(angle not-even-numeric"),
                Some("***shutdown***"),
            ],
        );
        session.run().unwrap();

        // init + 4 control commands + meta
        assert_eq!(session.transport.sent.len(), 6);
        assert_eq!(session.transport.sent[5], "(meta 1)");
        assert!(session.transport.sent[1].contains("(gear "));
        // the malformed fifth payload never reached the car state
        assert_eq!(session.car.angle, 0.0);
    }

    #[test]
    fn test_recv_timeout_during_race_is_retried() {
        let mut session = client(
            ClientConfig::default(),
            &[
                Some("***identified***"),
                None,
                Some(SENSORS),
                Some("***shutdown***"),
            ],
        );
        session.run().unwrap();
        assert_eq!(session.state(), SessionState::Terminated);
        // one control command despite the dropped tick
        assert_eq!(session.transport.sent.len(), 2);
    }

    #[test]
    fn test_racing_tick_sends_control_for_sensor_snapshot() {
        let mut session = client(
            ClientConfig::default(),
            &[Some("***identified***"), Some(SENSORS), Some("***shutdown***")],
        );
        session.run().unwrap();
        let command = &session.transport.sent[1];
        assert!(command.starts_with("(accel "));
        assert!(command.contains("(gear 3)"));
        assert!(command.contains("(steer 0)"));
    }
}
