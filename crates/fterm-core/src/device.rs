#![forbid(unsafe_code)]

//! Platform boundary: byte channels and terminal devices.
//!
//! [`Terminal`](crate::Terminal) is generic over [`TerminalDevice`] so the
//! discovery and raw-mode logic can run against a real Unix tty
//! (`fterm-tty`), a pseudo-terminal, or an in-memory double in tests.

use core::time::Duration;
use std::fmt;
use std::io::{self, Write};

use crate::dimensions::Dimensions;

/// Unbuffered byte sink/source with bounded-time reads.
///
/// Writes go straight to the peer. Reads never block longer than the timeout
/// they are given.
pub trait ByteChannel: Write {
    /// Wait up to `timeout` for input, then perform a single read.
    ///
    /// Returns `Ok(0)` on timeout or end-of-stream. Timing out is not an
    /// error.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    /// Wait up to `timeout` for input to become readable.
    fn wait_for_input(&mut self, timeout: Duration) -> io::Result<bool>;
}

/// A terminal attached to an input and an output stream.
pub trait TerminalDevice {
    /// Snapshot of the line-discipline settings taken before entering raw
    /// mode. Restoring it must reproduce the prior state exactly.
    type Mode: Clone + fmt::Debug;

    /// Channel carrying UI output and probe traffic.
    type Channel: ByteChannel;

    /// Whether the input stream is an interactive terminal whose line
    /// discipline can be changed.
    fn input_is_terminal(&self) -> bool;

    /// Whether the output stream is a console that can report its own size.
    ///
    /// `false` for pipes and for the master side of a pseudo-terminal, where
    /// only the peer knows the real size.
    fn output_is_console(&self) -> bool;

    /// Ask the platform for the console size.
    ///
    /// May return zero in either axis; callers treat that as unusable.
    fn console_size(&self) -> io::Result<Dimensions>;

    /// Capture the current settings, then disable canonical input and echo
    /// with a zero `VMIN`/`VTIME` read policy.
    ///
    /// Returns the captured settings for [`restore_mode`](Self::restore_mode).
    fn enter_raw(&mut self) -> io::Result<Self::Mode>;

    /// Reinstate settings previously returned by [`enter_raw`](Self::enter_raw).
    fn restore_mode(&mut self, saved: &Self::Mode) -> io::Result<()>;

    fn channel(&mut self) -> &mut Self::Channel;

    /// Consume a pending resize notification, if any.
    ///
    /// Devices without resize signalling never report one.
    fn take_resize(&self) -> bool {
        false
    }
}
