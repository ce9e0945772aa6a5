//! # AT Wire Constants & Reply Parsers
//!
//! The module speaks CRLF-terminated ASCII. Each command family has a fixed,
//! narrow reply shape, so every parser here is delimiter-based extraction
//! over the raw response buffer rather than a general AT grammar.
//!
//! ## Reply Shapes
//!
//! ```text
//! AT+CSQ          +CSQ: <rssi>,<ber>
//! AT+CBC          +CBC: <bcs>,<bcl>,<millivolts>
//! AT+COPS?        +COPS: <mode>,<format>,"<operator>"
//! AT+HTTPACTION   +HTTPACTION: <method>,<status>,<length>
//! AT+HTTPREAD     +HTTPREAD: <length>\r\n<body>
//! (unsolicited)   +CMTI: "<mem>",<index>
//! AT+CMGR         +CMGR: "<stat>","<sender>",...\r\n<text>
//! AT+CMGS         +CMGS: <reference>
//! AT+CIPGSMLOC    +CIPGSMLOC: <code>[,<lon>,<lat>,<date>,<time>]
//! ```
//!
//! Parsers only run on buffers the engine reported as successful. They
//! return a [`ParseError`] for any absent or truncated delimiter, never a
//! default value.

use core::str::FromStr;

use heapless::String;

use crate::buffer::{find, trim_line_end};
use crate::error::ParseError;

/// Line terminator appended to every command
pub const CRLF: &[u8] = b"\r\n";

/// Default success token
pub const OK: &str = "OK\r\n";
/// Default error token; also matches `+CME ERROR:` / `+CMS ERROR:` lines
pub const ERROR: &str = "ERROR";

pub const CSQ: &str = "+CSQ:";
pub const CBC: &str = "+CBC:";
pub const COPS: &str = "+COPS:";
pub const CFUN_READY: &str = "+CFUN: 1";
pub const HTTPACTION: &str = "+HTTPACTION:";
pub const HTTPREAD: &str = "+HTTPREAD:";
pub const CMTI: &str = "+CMTI:";
pub const CMGR: &str = "+CMGR:";
pub const CMGS: &str = "+CMGS:";
pub const CIPGSMLOC: &str = "+CIPGSMLOC:";

/// Data-input cue after `AT+HTTPDATA`
pub const DOWNLOAD: &str = "DOWNLOAD";
/// Shutdown confirmation after `AT+CPOWD=1`
pub const NORMAL_POWER_DOWN: &str = "NORMAL POWER DOWN";

/// Prompt byte the module sends when it is ready for SMS text
pub const SMS_PROMPT: u8 = b'>';
/// Ctrl-Z, terminates SMS text input
pub const CTRL_Z: u8 = 0x1A;
/// Escape, aborts SMS text input
pub const ESC: u8 = 0x1B;

/// Maximum operator name length kept by [`parse_operator_name`]
pub const OPERATOR_NAME_CAPACITY: usize = 32;

/// Highest valid `+CSQ` RSSI index; 99 means "not known or not detectable"
pub const MAX_SIGNAL_LEVEL: u8 = 31;

/// Network operator name, as reported by `AT+COPS?`
pub type OperatorName = String<OPERATOR_NAME_CAPACITY>;

/// Received signal strength index (0-31)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalLevel(pub u8);

/// Coarse signal grading used by the module vendor's application notes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SignalQuality {
    Marginal,
    Ok,
    Good,
    Excellent,
}

impl SignalLevel {
    pub fn quality(self) -> SignalQuality {
        match self.0 {
            0..=9 => SignalQuality::Marginal,
            10..=14 => SignalQuality::Ok,
            15..=19 => SignalQuality::Good,
            _ => SignalQuality::Excellent,
        }
    }

    /// Approximate received power in dBm (`-113 + 2 * level`)
    pub fn dbm(self) -> i16 {
        -113 + 2 * i16::from(self.0)
    }
}

/// Supply voltage reported by `AT+CBC`, in millivolts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryMillivolts(pub u32);

/// Storage index of a received SMS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SmsIndex(pub u16);

/// HTTP method codes understood by `AT+HTTPACTION`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum HttpMethod {
    Get = 0,
    Post = 1,
    Head = 2,
}

/// Result line of an HTTP action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HttpOutcome {
    /// Method code echoed by the module
    pub method: u8,
    /// HTTP status, or a 6xx module-side network error
    pub status: u16,
    /// Body length held by the module, readable with `AT+HTTPREAD`
    pub length: u32,
}

impl HttpOutcome {
    /// 2xx statuses are success, everything else is failure
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A received SMS, borrowed from the response buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmsText<'a> {
    /// The `+CMGR:` header line
    pub header: &'a str,
    /// Message body
    pub text: &'a str,
}

impl<'a> SmsText<'a> {
    /// Message status, e.g. `REC UNREAD`
    pub fn status(&self) -> Option<&'a str> {
        quoted_field(self.header, 0)
    }

    /// Originating address
    pub fn sender(&self) -> Option<&'a str> {
        quoted_field(self.header, 1)
    }

    /// Service-centre timestamp, `yy/MM/dd,hh:mm:ss±zz`
    pub fn timestamp(&self) -> Option<&'a str> {
        quoted_field(self.header, 3)
    }
}

/// Position fix from the GSM location service
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GsmLocation {
    pub longitude: f64,
    pub latitude: f64,
    /// `yyyy/MM/dd`
    pub date: String<10>,
    /// `hh:mm:ss` (UTC)
    pub time: String<8>,
}

/// Parsed `+CIPGSMLOC` reply
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LocationReply {
    /// 0 on success, otherwise the module's location error code
    pub code: u16,
    pub fix: Option<GsmLocation>,
}

/// Text of the line starting at `tag`, after the tag and before `\r`/`\n`
fn tagged_line<'a>(buf: &'a [u8], tag: &str) -> Result<&'a [u8], ParseError> {
    let start = find(buf, tag.as_bytes()).ok_or(ParseError::MissingDelimiter)? + tag.len();
    let rest = &buf[start..];
    let end = rest
        .iter()
        .position(|&b| b == b'\r' || b == b'\n')
        .unwrap_or(rest.len());
    Ok(&rest[..end])
}

/// Offset just past the line terminator of the line containing `offset`
fn next_line_start(buf: &[u8], offset: usize) -> usize {
    match buf[offset..].iter().position(|&b| b == b'\n') {
        Some(pos) => offset + pos + 1,
        None => buf.len(),
    }
}

fn trim(field: &[u8]) -> &[u8] {
    let start = field
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(field.len());
    let end = field
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |pos| pos + 1);
    &field[start..end]
}

fn split_once(field: &[u8], delimiter: u8) -> Option<(&[u8], &[u8])> {
    let pos = field.iter().position(|&b| b == delimiter)?;
    Some((&field[..pos], &field[pos + 1..]))
}

fn parse_num<T: FromStr>(field: &[u8]) -> Result<T, ParseError> {
    let text = core::str::from_utf8(trim(field)).map_err(|_| ParseError::InvalidNumber)?;
    text.parse().map_err(|_| ParseError::InvalidNumber)
}

fn to_str(bytes: &[u8]) -> Result<&str, ParseError> {
    core::str::from_utf8(bytes).map_err(|_| ParseError::InvalidUtf8)
}

fn bounded<const N: usize>(bytes: &[u8]) -> Result<String<N>, ParseError> {
    let mut out = String::new();
    out.push_str(to_str(bytes)?)
        .map_err(|_| ParseError::TooLong)?;
    Ok(out)
}

/// `n`-th double-quoted field of `line`
fn quoted_field(line: &str, n: usize) -> Option<&str> {
    line.split('"').nth(2 * n + 1)
}

/// Parse `+COPS: 0,0,"Vodafone"` into the operator name
pub fn parse_operator_name(buf: &[u8]) -> Result<OperatorName, ParseError> {
    let open = buf
        .iter()
        .position(|&b| b == b'"')
        .ok_or(ParseError::MissingDelimiter)?;
    let rest = &buf[open + 1..];
    let close = rest
        .iter()
        .position(|&b| b == b'"')
        .ok_or(ParseError::MissingDelimiter)?;
    bounded(&rest[..close])
}

/// Parse `+CSQ: <rssi>,<ber>` into the RSSI index
pub fn parse_signal_level(buf: &[u8]) -> Result<SignalLevel, ParseError> {
    let line = tagged_line(buf, CSQ)?;
    let (rssi, _ber) = split_once(line, b',').ok_or(ParseError::MissingDelimiter)?;
    let level: u8 = parse_num(rssi)?;
    if level > MAX_SIGNAL_LEVEL {
        return Err(ParseError::OutOfRange);
    }
    Ok(SignalLevel(level))
}

/// Parse `+CBC: <bcs>,<bcl>,<mv>`; the voltage is the field after the last comma
pub fn parse_battery_voltage(buf: &[u8]) -> Result<BatteryMillivolts, ParseError> {
    let line = tagged_line(buf, CBC)?;
    let comma = line
        .iter()
        .rposition(|&b| b == b',')
        .ok_or(ParseError::MissingDelimiter)?;
    parse_num(&line[comma + 1..]).map(BatteryMillivolts)
}

/// Parse `+HTTPACTION: <method>,<status>,<length>`
pub fn parse_http_action(buf: &[u8]) -> Result<HttpOutcome, ParseError> {
    let line = tagged_line(buf, HTTPACTION)?;
    let (method, rest) = split_once(line, b',').ok_or(ParseError::MissingDelimiter)?;
    let (status, length) = match split_once(rest, b',') {
        Some((status, length)) => (status, Some(length)),
        None => (rest, None),
    };
    Ok(HttpOutcome {
        method: parse_num(method)?,
        status: parse_num(status)?,
        length: match length {
            Some(length) => parse_num(length)?,
            None => 0,
        },
    })
}

/// Extract the body following a `+HTTPREAD: <length>` header.
///
/// If the response buffer filled up before the whole body arrived, the
/// retained prefix is returned.
pub fn parse_http_read(buf: &[u8]) -> Result<&[u8], ParseError> {
    let header = find(buf, HTTPREAD.as_bytes()).ok_or(ParseError::MissingDelimiter)?;
    let length: usize = parse_num(tagged_line(buf, HTTPREAD)?)?;
    let body_start = next_line_start(buf, header);
    let body = &buf[body_start..];
    Ok(&body[..length.min(body.len())])
}

/// Parse the storage index from `+CMTI: "SM",<index>`.
///
/// The index ends at the first `\r` or `\n`.
pub fn parse_sms_index(buf: &[u8]) -> Result<SmsIndex, ParseError> {
    let line = tagged_line(buf, CMTI)?;
    let (_mem, index) = split_once(line, b',').ok_or(ParseError::MissingDelimiter)?;
    parse_num(index).map(SmsIndex)
}

/// Split an `AT+CMGR` reply into header line and message text
pub fn parse_sms_text(buf: &[u8]) -> Result<SmsText<'_>, ParseError> {
    let header_start = find(buf, CMGR.as_bytes()).ok_or(ParseError::MissingDelimiter)?;
    let header = trim_line_end(&buf[header_start..next_line_start(buf, header_start)]);
    let body = &buf[next_line_start(buf, header_start)..];
    // The reply closes with "\r\n\r\nOK\r\n"; cut at the last OK line
    let body = match body.windows(4).rposition(|w| w == b"\nOK\r") {
        Some(pos) => &body[..pos],
        None => body,
    };
    Ok(SmsText {
        header: to_str(header)?,
        text: to_str(trim_line_end(body))?,
    })
}

/// Parse the message reference from `+CMGS: <mr>`
pub fn parse_message_reference(buf: &[u8]) -> Result<u8, ParseError> {
    parse_num(tagged_line(buf, CMGS)?)
}

/// Parse `+CIPGSMLOC: <code>,<lon>,<lat>,<date>,<time>`
pub fn parse_gsm_location(buf: &[u8]) -> Result<LocationReply, ParseError> {
    let line = tagged_line(buf, CIPGSMLOC)?;
    let mut fields = line.split(|&b| b == b',');
    let code: u16 = parse_num(fields.next().ok_or(ParseError::MissingDelimiter)?)?;
    if code != 0 {
        return Ok(LocationReply { code, fix: None });
    }

    let mut next = || fields.next().ok_or(ParseError::MissingDelimiter);
    let longitude = parse_num(next()?)?;
    let latitude = parse_num(next()?)?;
    let date = bounded(trim(next()?))?;
    let time = bounded(trim(next()?))?;
    Ok(LocationReply {
        code,
        fix: Some(GsmLocation {
            longitude,
            latitude,
            date,
            time,
        }),
    })
}
