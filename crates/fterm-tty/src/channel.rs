//! Unbuffered byte channel over a pair of file descriptors.
//!
//! Reads are bounded by `poll(2)`; writes go straight to the descriptor with
//! no userspace buffering, so escape sequences reach the peer in the order
//! and grouping they were written.

use core::time::Duration;
use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use fterm_core::ByteChannel;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout};

/// How long a write may wait for a non-blocking descriptor to drain.
const WRITE_STALL_TIMEOUT: Duration = Duration::from_secs(1);

/// One side of a channel: a standard stream or a descriptor we own.
///
/// Standard streams are borrowed from the process and never closed.
#[derive(Debug)]
pub enum TtyFd {
    Stdin(io::Stdin),
    Stdout(io::Stdout),
    Owned(OwnedFd),
}

impl TtyFd {
    /// Whether this is one of the process's standard streams.
    #[must_use]
    pub fn is_std(&self) -> bool {
        !matches!(self, Self::Owned(_))
    }
}

impl AsFd for TtyFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        match self {
            Self::Stdin(s) => s.as_fd(),
            Self::Stdout(s) => s.as_fd(),
            Self::Owned(fd) => fd.as_fd(),
        }
    }
}

/// Input/output descriptor pair implementing [`ByteChannel`].
#[derive(Debug)]
pub struct FdChannel {
    input: TtyFd,
    output: TtyFd,
}

impl FdChannel {
    /// Channel over the process's standard input and output.
    #[must_use]
    pub fn stdio() -> Self {
        Self {
            input: TtyFd::Stdin(io::stdin()),
            output: TtyFd::Stdout(io::stdout()),
        }
    }

    /// Channel reading and writing the same descriptor.
    ///
    /// The descriptor is duplicated so each side owns its own handle.
    pub fn from_fd(fd: OwnedFd) -> io::Result<Self> {
        let output = fd.try_clone()?;
        Ok(Self::from_pair(fd, output))
    }

    #[must_use]
    pub fn from_pair(input: OwnedFd, output: OwnedFd) -> Self {
        Self {
            input: TtyFd::Owned(input),
            output: TtyFd::Owned(output),
        }
    }

    pub fn input(&self) -> &TtyFd {
        &self.input
    }

    pub fn output(&self) -> &TtyFd {
        &self.output
    }
}

/// Round up to whole milliseconds and clamp to what `poll` accepts.
fn poll_timeout(timeout: Duration) -> PollTimeout {
    let ms: u16 = timeout
        .as_micros()
        .div_ceil(1000)
        .try_into()
        .unwrap_or(u16::MAX);
    PollTimeout::from(ms)
}

/// Wait for `events` on `fd`. Interrupted waits report not-ready.
fn poll_one(fd: BorrowedFd<'_>, events: PollFlags, timeout: Duration) -> io::Result<bool> {
    let mut fds = [PollFd::new(fd, events)];
    match nix::poll::poll(&mut fds, poll_timeout(timeout)) {
        Ok(n) => Ok(n > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(io::Error::from(e)),
    }
}

impl Write for FdChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match rustix::io::write(self.output.as_fd(), buf) {
                Ok(n) => return Ok(n),
                Err(rustix::io::Errno::INTR) => continue,
                Err(rustix::io::Errno::AGAIN) => {
                    if !poll_one(self.output.as_fd(), PollFlags::POLLOUT, WRITE_STALL_TIMEOUT)? {
                        return Err(io::ErrorKind::WouldBlock.into());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteChannel for FdChannel {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if buf.is_empty() || !self.wait_for_input(timeout)? {
            return Ok(0);
        }
        match rustix::io::read(self.input.as_fd(), buf) {
            Ok(n) => Ok(n),
            Err(rustix::io::Errno::AGAIN | rustix::io::Errno::INTR) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn wait_for_input(&mut self, timeout: Duration) -> io::Result<bool> {
        poll_one(self.input.as_fd(), PollFlags::POLLIN, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::os::unix::net::UnixStream;

    fn socket_channel() -> (FdChannel, UnixStream) {
        let (ours, theirs) = UnixStream::pair().unwrap();
        let channel = FdChannel::from_fd(OwnedFd::from(ours)).unwrap();
        (channel, theirs)
    }

    #[test]
    fn poll_timeout_rounds_up_and_clamps() {
        assert_eq!(poll_timeout(Duration::ZERO), PollTimeout::ZERO);
        assert_eq!(poll_timeout(Duration::from_micros(1)), PollTimeout::from(1u16));
        assert_eq!(poll_timeout(Duration::from_millis(250)), PollTimeout::from(250u16));
        assert_eq!(poll_timeout(Duration::from_secs(3600)), PollTimeout::from(u16::MAX));
    }

    #[test]
    fn read_times_out_with_zero() {
        let (mut channel, _peer) = socket_channel();
        let mut buf = [0u8; 8];
        let n = channel
            .read_timeout(&mut buf, Duration::from_millis(10))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn read_returns_available_bytes() {
        let (mut channel, mut peer) = socket_channel();
        peer.write_all(b"abc").unwrap();
        assert!(channel.wait_for_input(Duration::from_millis(500)).unwrap());
        let mut buf = [0u8; 8];
        let n = channel
            .read_timeout(&mut buf, Duration::from_millis(500))
            .unwrap();
        assert_eq!(&buf[..n], b"abc");
    }

    #[test]
    fn single_byte_reads_preserve_order() {
        let (mut channel, mut peer) = socket_channel();
        peer.write_all(b"\x1b[5;9R").unwrap();
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while channel
            .read_timeout(&mut byte, Duration::from_millis(100))
            .unwrap()
            == 1
        {
            out.push(byte[0]);
        }
        assert_eq!(out, b"\x1b[5;9R");
    }

    #[test]
    fn empty_buffer_reads_nothing() {
        let (mut channel, mut peer) = socket_channel();
        peer.write_all(b"x").unwrap();
        assert_eq!(channel.read_timeout(&mut [], Duration::ZERO).unwrap(), 0);
        assert!(channel.wait_for_input(Duration::ZERO).unwrap());
    }

    #[test]
    fn writes_reach_the_peer_unbuffered() {
        let (mut channel, mut peer) = socket_channel();
        channel.write_all(b"\x1b[6n").unwrap();
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"\x1b[6n");
    }

    #[test]
    fn closed_peer_reads_as_end_of_stream() {
        let (mut channel, peer) = socket_channel();
        drop(peer);
        let mut buf = [0u8; 4];
        let n = channel
            .read_timeout(&mut buf, Duration::from_millis(100))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn std_streams_are_flagged() {
        let channel = FdChannel::stdio();
        assert!(channel.input().is_std());
        assert!(channel.output().is_std());
        let (owned, _peer) = socket_channel();
        assert!(!owned.input().is_std());
    }
}
