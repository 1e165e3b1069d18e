#![forbid(unsafe_code)]

//! Core: terminal size discovery, color capability detection, and raw-mode
//! lifecycle.
//!
//! # Role in fterm
//! `fterm-core` is the platform-independent half of the terminal layer. It owns
//! the caches a UI consults once per frame, the cooked/raw state machine, and
//! the in-band size probe used when the platform cannot report a size.
//!
//! # Primary responsibilities
//! - **Terminal**: explicit context object holding a device, its caches, and
//!   its fallback size. Restores cooked mode on drop.
//! - **Dimensions**: size value, fallback constants, and the size cache.
//! - **ColorSupport**: coarse four-level color classification from `COLORTERM`
//!   and `TERM`.
//! - **Size probe**: cursor-position-report negotiation for pseudo-terminals.
//! - **Device traits**: the seam platform backends (`fterm-tty`) implement.
//!
//! # Discovery order
//!
//! | Output bound to | Strategy | Cached |
//! |-----------------|----------|--------|
//! | Interactive console | platform query (`TIOCGWINSZ`) | no |
//! | Pseudo-terminal / pipe | `CSI 6 n` probe | yes, until invalidated |
//! | Anything unusable | fallback (80×24) | no |

pub mod color;
pub mod device;
pub mod dimensions;
pub mod logging;
pub mod size_probe;
pub mod terminal;

pub use color::ColorSupport;
pub use device::{ByteChannel, TerminalDevice};
pub use dimensions::{DimensionCache, Dimensions};
pub use size_probe::ProbeConfig;
pub use terminal::{RawModeGuard, Terminal, TerminalConfig};

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, info, trace, warn};
