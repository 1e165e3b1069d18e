#![forbid(unsafe_code)]

//! In-band terminal size negotiation.
//!
//! When the output is not a console (most commonly the master side of a
//! pseudo-terminal) the platform cannot say how big the peer's screen is.
//! The peer can: park the cursor far past the bottom-right corner, where it
//! clamps, and ask where it ended up.
//!
//! # Protocol
//!
//! | Step | Bytes | Meaning |
//! |------|-------|---------|
//! | 1 | `ESC 7` | save cursor |
//! | 2 | `ESC [ r` | reset scroll region |
//! | 3 | `ESC [ 999;999 H` | move to (clamped) bottom-right |
//! | 4 | `ESC [ 6 n` | request cursor position report |
//! | 5 | `ESC 8` | restore cursor |
//! | reply | `ESC [ rows ; cols R` | cursor position report |
//! | after | `ESC [ 18 t` | text-area size request (optional) |
//!
//! Steps 1–5 go out as one burst.
//!
//! # Failure Contract
//!
//! - **Bounded**: each byte waits at most [`ProbeConfig::byte_timeout`] and
//!   the whole read loop at most [`ProbeConfig::deadline`]. At most
//!   [`ProbeConfig::max_response_len`] characters are accumulated.
//! - **Fail-open**: silence, garbage, or I/O errors yield `None`. The caller
//!   falls back; nothing is reported as an error.

use core::time::Duration;

use web_time::Instant;

use crate::debug;
use crate::device::ByteChannel;
use crate::dimensions::Dimensions;

/// Save cursor, reset scroll region, jump to 999;999, request CPR, restore.
pub const SIZE_QUERY: &[u8] = b"\x1b7\x1b[r\x1b[999;999H\x1b[6n\x1b8";

/// xterm window op 18: report the text area size in characters.
pub const AREA_REPORT_REQUEST: &[u8] = b"\x1b[18t";

/// Final byte of a cursor position report.
const REPORT_TERMINATOR: u8 = b'R';

const DEFAULT_BYTE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_DEADLINE: Duration = Duration::from_secs(3);
const DEFAULT_MAX_RESPONSE_LEN: usize = 100;

/// Tuning for [`probe_size`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Longest stall tolerated between two reply bytes.
    pub byte_timeout: Duration,
    /// Ceiling on the whole read loop.
    ///
    /// A peer trickling printable bytes without ever sending `R` would
    /// otherwise hold the caller for `byte_timeout × max_response_len`.
    pub deadline: Duration,
    /// Printable characters accumulated before giving up.
    pub max_response_len: usize,
    /// Floor applied to a parsed reply.
    ///
    /// `Some(Dimensions::VT100)` rejects implausibly small peers. Off by
    /// default so small but real terminals are reported faithfully.
    pub min_size: Option<Dimensions>,
    /// Send [`AREA_REPORT_REQUEST`] once the reply has been read.
    pub emit_area_report: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            byte_timeout: DEFAULT_BYTE_TIMEOUT,
            deadline: DEFAULT_DEADLINE,
            max_response_len: DEFAULT_MAX_RESPONSE_LEN,
            min_size: None,
            emit_area_report: true,
        }
    }
}

/// Ask the peer on the other end of `channel` for its size.
///
/// The peer must echo responses predictably, so the caller is expected to
/// have restored cooked mode first (see
/// [`Terminal::with_restored_io`](crate::Terminal::with_restored_io)).
pub fn probe_size<C>(channel: &mut C, config: &ProbeConfig) -> Option<Dimensions>
where
    C: ByteChannel + ?Sized,
{
    if let Err(err) = channel.write_all(SIZE_QUERY).and_then(|()| channel.flush()) {
        debug!(error = %err, "size probe: query write failed");
        return None;
    }

    let reply = read_report(channel, config);

    if config.emit_area_report
        && let Err(err) = channel
            .write_all(AREA_REPORT_REQUEST)
            .and_then(|()| channel.flush())
    {
        debug!(error = %err, "size probe: area report request failed");
    }

    let Some(dims) = parse_cursor_report(&reply) else {
        debug!(reply = %reply, "size probe: no usable cursor position report");
        return None;
    };

    Some(match config.min_size {
        Some(min) => dims.at_least(min),
        None => dims,
    })
}

/// Accumulate printable reply bytes until `R`, silence, or a limit.
fn read_report<C>(channel: &mut C, config: &ProbeConfig) -> String
where
    C: ByteChannel + ?Sized,
{
    let start = Instant::now();
    let mut reply = String::with_capacity(16);
    let mut byte = [0u8; 1];

    while reply.len() < config.max_response_len {
        let remaining = config.deadline.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            debug!("size probe: deadline reached");
            break;
        }

        match channel.read_timeout(&mut byte, config.byte_timeout.min(remaining)) {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "size probe: read failed");
                break;
            }
        }

        match byte[0] {
            0 | REPORT_TERMINATOR => break,
            b if is_printable(b) => reply.push(char::from(b)),
            _ => {}
        }
    }

    reply
}

/// Parse the printable part of a cursor position report, `[rows;cols`.
///
/// The terminator is optional and anything after the column digits is
/// ignored. Text before the last `[` (keys typed while the probe was in
/// flight) is skipped. Both numbers must be positive.
#[must_use]
pub fn parse_cursor_report(text: &str) -> Option<Dimensions> {
    let start = text.rfind('[')?;
    let (rows, cols) = text[start + 1..].split_once(';')?;

    let rows: u16 = rows.trim_start().parse().ok()?;
    let cols = cols.trim_start();
    let digits = cols
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(cols.len());
    let cols: u16 = cols[..digits].parse().ok()?;

    let dims = Dimensions::new(cols, rows);
    dims.is_usable().then_some(dims)
}

const fn is_printable(b: u8) -> bool {
    matches!(b, 0x20..=0x7e)
}
