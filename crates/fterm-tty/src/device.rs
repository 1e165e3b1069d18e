//! [`TerminalDevice`] backed by Unix file descriptors.
//!
//! | Binding | Input is terminal | Output is console | Size source |
//! |---------|-------------------|-------------------|-------------|
//! | stdio | `isatty(stdin)` | `isatty(stdout)` | `TIOCGWINSZ` or probe |
//! | pty master | no | no | probe (only the peer knows) |
//! | attached path | `isatty(fd)` | `isatty(fd)` | `TIOCGWINSZ` |

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fterm_core::{Dimensions, TerminalDevice, debug};
use nix::fcntl::OFlag;
use nix::sys::termios::{LocalFlags, SetArg, SpecialCharacterIndices, Termios, tcgetattr, tcsetattr};

use crate::channel::FdChannel;
use crate::signals::{ArmedMode, DeviceShared};

/// What the device's descriptors refer to.
#[derive(Debug)]
enum Binding {
    Stdio,
    /// Master side of a pseudo-terminal we allocated. The peer descriptor is
    /// held open so the master never sees a hangup before a client attaches.
    PtyMaster { _peer: OwnedFd, peer_path: PathBuf },
    /// An existing terminal device opened by path.
    Attached { path: PathBuf },
}

/// A Unix terminal: stdio, a pseudo-terminal master, or a device path.
#[derive(Debug)]
pub struct TtyDevice {
    binding: Binding,
    channel: FdChannel,
    shared: Arc<DeviceShared>,
}

impl TtyDevice {
    fn with_binding(binding: Binding, channel: FdChannel) -> Self {
        Self {
            binding,
            channel,
            shared: DeviceShared::register(),
        }
    }

    /// Device over the process's standard input and output.
    #[must_use]
    pub fn stdio() -> Self {
        Self::with_binding(Binding::Stdio, FdChannel::stdio())
    }

    /// Device over the master side of a pseudo-terminal.
    pub(crate) fn pty_master(master: OwnedFd, peer: OwnedFd, peer_path: PathBuf) -> io::Result<Self> {
        let channel = FdChannel::from_fd(master)?;
        Ok(Self::with_binding(
            Binding::PtyMaster {
                _peer: peer,
                peer_path,
            },
            channel,
        ))
    }

    /// Open an existing terminal device read/write, non-blocking, without
    /// making it the controlling terminal.
    pub fn attach(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags((OFlag::O_NONBLOCK | OFlag::O_NOCTTY).bits())
            .open(path)?;
        let channel = FdChannel::from_fd(OwnedFd::from(file))?;
        debug!(path = %path.display(), "attached terminal device");
        Ok(Self::with_binding(
            Binding::Attached {
                path: path.to_path_buf(),
            },
            channel,
        ))
    }

    /// Restore cooked mode on SIGINT/SIGTERM (then exit with `128 + signal`)
    /// and invalidate cached sizes on SIGWINCH, for as long as this device
    /// lives. Once no such device remains, those signals get their default
    /// action again.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handlers cannot be registered.
    pub fn with_signal_handling(self) -> io::Result<Self> {
        self.shared.subscribe()?;
        Ok(self)
    }

    #[must_use]
    pub fn handles_signals(&self) -> bool {
        self.shared.is_subscribed()
    }

    #[must_use]
    pub fn is_stdio(&self) -> bool {
        matches!(self.binding, Binding::Stdio)
    }

    /// Path a client should open to talk to this device, if it has one.
    ///
    /// For a pseudo-terminal this is the peer side; for an attached device
    /// it is the path it was opened from.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.binding {
            Binding::Stdio => None,
            Binding::PtyMaster { peer_path, .. } => Some(peer_path),
            Binding::Attached { path } => Some(path),
        }
    }

    /// Whether a raw-mode snapshot is armed for emergency restore.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.shared.is_armed()
    }
}

impl TerminalDevice for TtyDevice {
    type Mode = Termios;
    type Channel = FdChannel;

    fn input_is_terminal(&self) -> bool {
        match self.binding {
            Binding::PtyMaster { .. } => false,
            Binding::Stdio | Binding::Attached { .. } => {
                rustix::termios::isatty(self.channel.input())
            }
        }
    }

    fn output_is_console(&self) -> bool {
        match self.binding {
            Binding::PtyMaster { .. } => false,
            Binding::Stdio | Binding::Attached { .. } => {
                rustix::termios::isatty(self.channel.output())
            }
        }
    }

    fn console_size(&self) -> io::Result<Dimensions> {
        let ws = rustix::termios::tcgetwinsize(self.channel.output())?;
        Ok(Dimensions::new(ws.ws_col, ws.ws_row))
    }

    fn enter_raw(&mut self) -> io::Result<Termios> {
        let input = self.channel.input();
        let cooked = tcgetattr(input)?;
        let restore_fd = input.as_fd().try_clone_to_owned()?;

        let mut raw = cooked.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        tcsetattr(input, SetArg::TCSANOW, &raw)?;

        self.shared.arm(ArmedMode {
            fd: restore_fd,
            termios: cooked.clone(),
        });
        Ok(cooked)
    }

    fn restore_mode(&mut self, saved: &Termios) -> io::Result<()> {
        tcsetattr(self.channel.input(), SetArg::TCSANOW, saved)?;
        self.shared.disarm();
        Ok(())
    }

    fn channel(&mut self) -> &mut FdChannel {
        &mut self.channel
    }

    fn take_resize(&self) -> bool {
        self.shared.take_resize()
    }
}
