//! # HTTP over the module's built-in stack
//!
//! The module does the network transfer itself; the host only sets
//! parameters, starts the action and reads the result back.
//!
//! ```text
//!   GET:   HTTPPARA URL ──────────────────────────────────┐
//!   POST:  HTTPPARA URL ─► HTTPPARA CONTENT ─► HTTPDATA   │
//!                          ─► DOWNLOAD ─► raw payload ─► OK
//!                                                         ▼
//!                          HTTPACTION ─► +HTTPACTION: m,status,len
//!                                                         │ 2xx
//!                                                         ▼
//!                                          HTTPREAD ─► body
//! ```
//!
//! A bearer must be open first, see [`Sim800::setup_bearer`].

use log::{debug, warn};

use crate::device::{check_quoted, Sim800};
use crate::engine::AtResult;
use crate::error::{Error, Result};
use crate::protocol::{self, HttpMethod, HttpOutcome, DOWNLOAD, ERROR, HTTPACTION, OK};
use crate::traits::{CancelSignal, Clock, DiagnosticSink, Transport};

/// A completed HTTP exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse<'a> {
    pub outcome: HttpOutcome,
    /// Body as read back from the module. Truncated if it did not fit the
    /// response buffer.
    pub body: &'a [u8],
}

impl HttpResponse<'_> {
    pub fn status(&self) -> u16 {
        self.outcome.status
    }

    pub fn body_str(&self) -> Option<&str> {
        core::str::from_utf8(self.body).ok()
    }
}

impl<T, C, D, K, P> Sim800<T, C, D, K, P>
where
    T: Transport,
    C: Clock,
    D: DiagnosticSink,
    K: CancelSignal,
{
    /// Fetch `url`.
    ///
    /// A status outside 2xx is returned as [`Error::HttpStatus`].
    pub fn http_get(&mut self, url: &str) -> Result<HttpResponse<'_>> {
        self.set_http_url(url)?;
        let outcome = self.http_action(HttpMethod::Get)?;
        self.http_read(outcome)
    }

    /// Post `payload` to `url` with the given content type
    pub fn http_post(
        &mut self,
        url: &str,
        payload: &[u8],
        content_type: &str,
    ) -> Result<HttpResponse<'_>> {
        check_quoted(content_type, "content type")?;
        self.set_http_url(url)?;
        self.run_parts(
            &["AT+HTTPPARA=\"CONTENT\",\"", content_type, "\""],
            self.config.command_timeout_ms,
        )?;

        let window = self.config.http_data_window_ms;
        self.engine
            .build_command_fmt(format_args!("AT+HTTPDATA={},{}", payload.len(), window))?;
        self.engine
            .send_built(self.config.http_data_timeout_ms, DOWNLOAD, ERROR)
            .into_result()?;

        debug!("uploading {} payload bytes", payload.len());
        self.engine.write_raw(payload)?;
        // The module answers OK once the capture window closes
        self.engine
            .await_response(window.saturating_add(self.config.command_timeout_ms), OK, ERROR)
            .into_result()?;

        let outcome = self.http_action(HttpMethod::Post)?;
        self.http_read(outcome)
    }

    fn set_http_url(&mut self, url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(Error::InvalidArgument("empty URL"));
        }
        check_quoted(url, "URL")?;
        self.run_parts(
            &["AT+HTTPPARA=\"URL\",\"", url, "\""],
            self.config.command_timeout_ms,
        )
    }

    /// Start the action and wait for its unsolicited result line
    fn http_action(&mut self, method: HttpMethod) -> Result<HttpOutcome> {
        self.engine
            .build_command_fmt(format_args!("AT+HTTPACTION={}", method as u8))?;
        self.engine
            .send_built(self.config.http_action_timeout_ms, HTTPACTION, ERROR)
            .into_result()?;

        let outcome = protocol::parse_http_action(self.engine.response().as_bytes())?;
        debug!(
            "HTTP {:?}: status {}, {} bytes",
            method, outcome.status, outcome.length
        );
        if !outcome.is_success() {
            return Err(Error::HttpStatus(outcome.status));
        }
        Ok(outcome)
    }

    fn http_read(&mut self, outcome: HttpOutcome) -> Result<HttpResponse<'_>> {
        if outcome.length == 0 {
            return Ok(HttpResponse { outcome, body: &[] });
        }

        let result = self
            .engine
            .send_command("AT+HTTPREAD", self.config.command_timeout_ms, OK, ERROR);
        match result {
            AtResult::Success => {}
            // Body larger than the buffer: the closing OK was dropped
            AtResult::Timeout if self.engine.overflowed() => {
                warn!("HTTP body truncated to the response buffer");
            }
            other => other.into_result()?,
        }

        let body = protocol::parse_http_read(self.engine.response().as_bytes())?;
        Ok(HttpResponse { outcome, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ScriptedTransport, StepClock};

    fn modem(transport: ScriptedTransport) -> Sim800<ScriptedTransport, StepClock> {
        Sim800::new(transport, StepClock::new(1))
    }

    #[test]
    fn test_get_without_body_skips_read() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT+HTTPPARA=\"URL\",\"http://example.com/ping\"\r\n", "OK\r\n");
        transport.expect("AT+HTTPACTION=0\r\n", "OK\r\n\r\n+HTTPACTION: 0,204,0\r\n");
        let mut modem = modem(transport);

        let response = modem.http_get("http://example.com/ping").unwrap();
        assert_eq!(response.status(), 204);
        assert!(response.body.is_empty());
        assert!(!modem.engine().transport().written_str().contains("HTTPREAD"));
    }

    #[test]
    fn test_get_stops_at_url_failure() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT+HTTPPARA=\"URL\",\"http://x\"\r\n", "ERROR\r\n");
        let mut modem = modem(transport);

        assert_eq!(modem.http_get("http://x").unwrap_err(), Error::Module);
        assert!(!modem.engine().transport().written_str().contains("HTTPACTION"));
    }

    #[test]
    fn test_url_with_quote_is_rejected() {
        let mut modem = modem(ScriptedTransport::new());
        assert_eq!(
            modem.http_get("http://x/\"").unwrap_err(),
            Error::InvalidArgument("URL")
        );
        assert!(modem.engine().transport().written().is_empty());
    }

    #[test]
    fn test_missing_status_is_parse_error() {
        let mut transport = ScriptedTransport::new();
        transport.expect("AT+HTTPPARA=\"URL\",\"http://x\"\r\n", "OK\r\n");
        transport.expect("AT+HTTPACTION=0\r\n", "OK\r\n+HTTPACTION: 0\r\n");
        let mut modem = modem(transport);

        assert!(matches!(modem.http_get("http://x"), Err(Error::Parse(_))));
    }

    #[test]
    fn test_oversized_body_is_truncated() {
        let mut reply = Vec::new();
        reply.extend_from_slice(b"+HTTPREAD: 2000\r\n");
        reply.extend_from_slice(&[b'x'; 2000]);
        reply.extend_from_slice(b"\r\nOK\r\n");

        let mut transport = ScriptedTransport::new();
        transport.expect("AT+HTTPPARA=\"URL\",\"http://x\"\r\n", "OK\r\n");
        transport.expect("AT+HTTPACTION=0\r\n", "OK\r\n+HTTPACTION: 0,200,2000\r\n");
        transport.expect("AT+HTTPREAD\r\n", &reply);
        let mut modem = modem(transport);

        let response = modem.http_get("http://x").unwrap();
        assert_eq!(response.outcome.length, 2000);
        assert!(!response.body.is_empty());
        assert!(response.body.len() < 2000);
        assert!(response.body.iter().all(|&b| b == b'x'));
    }
}
