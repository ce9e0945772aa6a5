use log::{debug, warn};
use sim800::DiagnosticSink;

/// Log target for raw module traffic. Enable with `RUST_LOG=sim800::wire=debug`.
pub const WIRE_TARGET: &str = "sim800::wire";

/// Mirrors every reply line to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn line(&mut self, line: &[u8]) {
        debug!(target: WIRE_TARGET, "<< {}", String::from_utf8_lossy(line));
    }

    fn timeout(&mut self, command: &str, partial: &[u8]) {
        warn!(
            target: WIRE_TARGET,
            "TIMEOUT: {} (received {:?})",
            command,
            String::from_utf8_lossy(partial)
        );
    }
}
