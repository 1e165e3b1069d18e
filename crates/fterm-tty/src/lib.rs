#![forbid(unsafe_code)]

//! Native Unix terminal device for fterm.
//!
//! This crate implements the `fterm-core` device traits over file
//! descriptors using `nix` and `rustix` (Unix-first; Windows deferred).
//!
//! ## Platform Calls
//!
//! | Concern | Call |
//! |---------|------|
//! | Terminal classification | `isatty` |
//! | Raw mode | `tcgetattr` / `tcsetattr` (`ICANON`, `ECHO`, `VMIN`, `VTIME`) |
//! | Console size | `TIOCGWINSZ` |
//! | Bounded reads | `poll` |
//! | Pseudo-terminals | `openpty`, `ttyname` |
//! | Cleanup and resize | SIGINT, SIGTERM, SIGWINCH via `signal-hook` |

#[cfg(unix)]
pub mod channel;
#[cfg(unix)]
pub mod device;
#[cfg(unix)]
pub mod pty;
#[cfg(unix)]
mod signals;

#[cfg(unix)]
pub use channel::{FdChannel, TtyFd};
#[cfg(unix)]
pub use device::TtyDevice;
#[cfg(unix)]
pub use pty::PseudoTerminal;
#[cfg(unix)]
pub use signals::restore_armed_terminals;

pub use fterm_core::{ColorSupport, Dimensions, ProbeConfig, Terminal, TerminalConfig};

/// A terminal bound to Unix file descriptors.
#[cfg(unix)]
pub type TtyTerminal = Terminal<TtyDevice>;

/// Terminal on the process's standard streams, with signal-driven cleanup
/// and resize invalidation installed.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be registered.
#[cfg(unix)]
pub fn stdio_terminal() -> std::io::Result<TtyTerminal> {
    stdio_terminal_with_config(TerminalConfig::default())
}

/// [`stdio_terminal`] with explicit settings.
///
/// # Errors
///
/// Returns an error if the signal handlers cannot be registered.
#[cfg(unix)]
pub fn stdio_terminal_with_config(config: TerminalConfig) -> std::io::Result<TtyTerminal> {
    let device = TtyDevice::stdio().with_signal_handling()?;
    Ok(Terminal::with_config(device, config))
}
