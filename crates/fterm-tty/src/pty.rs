//! Pseudo-terminal binding for [`Terminal<TtyDevice>`].
//!
//! A terminal can be moved off the process's standard streams and onto a
//! freshly allocated pseudo-terminal (the caller hands the returned peer path
//! to whatever should render it) or onto an existing terminal device.
//! Sizes are then negotiated in-band, because only the peer knows them.

use std::io;
use std::path::{Path, PathBuf};

use fterm_core::{Terminal, debug, info, warn};
use nix::pty::openpty;
use nix::sys::termios::{SetArg, cfmakeraw, tcgetattr, tcsetattr};

use crate::device::TtyDevice;

/// Rebinding a [`Terminal`] between stdio and pseudo-terminals.
pub trait PseudoTerminal {
    /// Allocate a pseudo-terminal, put its peer side in raw mode, and bind
    /// input and output to the master side.
    ///
    /// Returns the path of the peer side.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or configuration fails. The current
    /// binding is left untouched in that case.
    fn create_pseudo_terminal(&mut self) -> io::Result<PathBuf>;

    /// Bind input and output to an existing terminal device.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be opened. The current binding
    /// is left untouched in that case.
    fn attach_pseudo_terminal(&mut self, path: &Path) -> io::Result<()>;

    /// Rebind to the standard streams, releasing any owned descriptors.
    fn close_pseudo_terminal(&mut self);

    /// Peer path of the current binding, if not stdio.
    fn pseudo_terminal_name(&self) -> Option<&Path>;
}

impl PseudoTerminal for Terminal<TtyDevice> {
    fn create_pseudo_terminal(&mut self) -> io::Result<PathBuf> {
        let pty = openpty(None, None)?;

        let mut termios = tcgetattr(&pty.slave)?;
        cfmakeraw(&mut termios);
        tcsetattr(&pty.slave, SetArg::TCSANOW, &termios)?;

        let path = nix::unistd::ttyname(&pty.slave)?;
        let device = TtyDevice::pty_master(pty.master, pty.slave, path.clone())?;
        let device = inherit_signals(self.device(), device)?;
        drop(self.rebind(device));
        info!(path = %path.display(), "bound to new pseudo-terminal");
        Ok(path)
    }

    fn attach_pseudo_terminal(&mut self, path: &Path) -> io::Result<()> {
        let device = inherit_signals(self.device(), TtyDevice::attach(path)?)?;
        drop(self.rebind(device));
        Ok(())
    }

    fn close_pseudo_terminal(&mut self) {
        if self.device().is_stdio() {
            return;
        }
        let device = TtyDevice::stdio();
        let device = match inherit_signals(self.device(), device) {
            Ok(device) => device,
            Err(err) => {
                warn!(error = %err, "signal handling not restored on stdio");
                TtyDevice::stdio()
            }
        };
        drop(self.rebind(device));
        debug!("pseudo-terminal closed; back on stdio");
    }

    fn pseudo_terminal_name(&self) -> Option<&Path> {
        self.device().path()
    }
}

/// Carry signal handling over from the device being replaced.
fn inherit_signals(current: &TtyDevice, next: TtyDevice) -> io::Result<TtyDevice> {
    if current.handles_signals() {
        next.with_signal_handling()
    } else {
        Ok(next)
    }
}
