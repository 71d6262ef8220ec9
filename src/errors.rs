// Error types for scrcbot

use snafu::Snafu;
use std::io;

#[derive(Debug, Snafu)]
pub enum ScrcError {
    // Errors for the UDP transport
    #[snafu(display("Could not create UDP socket for {endpoint}"))]
    SocketSetup { endpoint: String, source: io::Error },
    #[snafu(display("Failed to send datagram to server"))]
    SocketSend { source: io::Error },
    #[snafu(display("Failed to receive datagram from server"))]
    SocketReceive { source: io::Error },

    // Errors for the telemetry log
    #[snafu(display("Could not create telemetry log directory"))]
    TelemetryLogDir { source: io::Error },
    #[snafu(display("Error writing telemetry log file"))]
    TelemetryLogWrite { source: io::Error },
}
