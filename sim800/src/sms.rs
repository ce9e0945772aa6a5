//! # SMS in text mode
//!
//! Sending uses the prompt sub-protocol: after `AT+CMGS="<number>"` the
//! module answers with a bare `>` (no line terminator) and then captures raw
//! text until Ctrl-Z.
//!
//! ```text
//!   CMGF=1 ─► CMGS="num" ─► '>' ─► text ─► 0x1A ─► +CMGS: <mr> / OK
//! ```
//!
//! Receiving waits for the `+CMTI` notification of a new message and reads
//! it back by index. The wait is bounded by a caller-supplied timeout.

use log::{debug, info};

use crate::device::{check_quoted, Sim800};
use crate::error::{Error, Result};
use crate::protocol::{self, SmsIndex, SmsText, CMTI, CTRL_Z, ERROR, ESC, OK, SMS_PROMPT};
use crate::traits::{CancelSignal, Clock, DiagnosticSink, Transport};

/// A message read from module storage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmsMessage<'a> {
    pub index: SmsIndex,
    pub sms: SmsText<'a>,
}

impl<'a> SmsMessage<'a> {
    pub fn text(&self) -> &'a str {
        self.sms.text
    }

    pub fn sender(&self) -> Option<&'a str> {
        self.sms.sender()
    }
}

impl<T, C, D, K, P> Sim800<T, C, D, K, P>
where
    T: Transport,
    C: Clock,
    D: DiagnosticSink,
    K: CancelSignal,
{
    /// Send `text` to `number`.
    ///
    /// Returns the network's message reference when the module reports one.
    pub fn send_sms(&mut self, number: &str, text: &str) -> Result<Option<u8>> {
        if number.is_empty() {
            return Err(Error::InvalidArgument("empty number"));
        }
        check_quoted(number, "number")?;
        if text.bytes().any(|b| b == CTRL_Z || b == ESC) {
            return Err(Error::InvalidArgument("SMS text contains a control terminator"));
        }

        self.set_text_mode()?;

        self.engine.build_command(&["AT+CMGS=\"", number, "\""])?;
        self.engine.write_built()?;
        self.engine
            .await_prompt(SMS_PROMPT, self.config.sms_prompt_timeout_ms)
            .into_result()?;

        debug!("SMS body: {} bytes", text.len());
        self.engine.write_raw(text.as_bytes())?;
        self.engine.write_raw(&[CTRL_Z])?;
        self.engine
            .await_response(self.config.sms_send_timeout_ms, OK, ERROR)
            .into_result()?;

        let reference = protocol::parse_message_reference(self.engine.response().as_bytes()).ok();
        info!("SMS sent to {} (reference {:?})", number, reference);
        Ok(reference)
    }

    /// Wait up to `wait_ms` for a new message, then read it.
    ///
    /// Lines other than the `+CMTI` notification are skipped. Returns
    /// [`Error::Timeout`] if no message arrives in time.
    pub fn receive_sms(&mut self, wait_ms: u32) -> Result<SmsMessage<'_>> {
        self.set_text_mode()?;
        self.engine.await_line_containing(CMTI, wait_ms).into_result()?;
        let index = protocol::parse_sms_index(self.engine.response().as_bytes())?;
        debug!("new SMS at index {}", index.0);
        self.read_sms(index)
    }

    /// Read the message stored at `index` (`AT+CMGR`)
    pub fn read_sms(&mut self, index: SmsIndex) -> Result<SmsMessage<'_>> {
        self.engine
            .build_command_fmt(format_args!("AT+CMGR={}", index.0))?;
        self.engine
            .send_built(self.config.command_timeout_ms, OK, ERROR)
            .into_result()?;
        let sms = protocol::parse_sms_text(self.engine.response().as_bytes())?;
        Ok(SmsMessage { index, sms })
    }
}
