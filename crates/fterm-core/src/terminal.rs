#![forbid(unsafe_code)]

//! Terminal context: size discovery, color classification, and raw-mode
//! lifecycle for one attached device.
//!
//! # Lifecycle Guarantees
//!
//! 1. **One snapshot per terminal** - [`Terminal::install_raw`] captures the
//!    cooked settings once; installing again while raw is a no-op.
//!
//! 2. **Exact restoration** - [`Terminal::uninstall_raw`] reinstates the
//!    captured settings verbatim and discards the snapshot.
//!
//! 3. **Drop restores** - Dropping a [`Terminal`] or a [`RawModeGuard`]
//!    uninstalls raw mode, so early returns, `?`, and panics (unless
//!    `panic = "abort"`) all leave the user's shell cooked. Abort and signal
//!    paths are covered by the platform backend.
//!
//! # Size Discovery
//!
//! ```text
//! resize pending? ── yes ─→ drop cache
//! cached?         ── yes ─→ cached size
//! console?        ── yes ─→ platform size (zero/error → fallback)
//!                 ── no ──→ CSI 6 n probe in cooked mode
//!                             ok   → cache + return
//!                             fail → fallback until the next
//!                                    invalidation
//! ```
//!
//! [`Terminal::size`] never fails and never returns a zero axis.
//!
//! # Usage
//!
//! ```ignore
//! let mut terminal = fterm_tty::stdio_terminal()?;
//! let mut raw = terminal.raw_mode()?;
//! let dims = raw.size();
//! // ... render ...
//! // raw mode is uninstalled when `raw` drops
//! ```

use core::time::Duration;
use std::cell::Cell;
use std::io;
use std::ops::{Deref, DerefMut};

use crate::color::ColorSupport;
use crate::device::{ByteChannel, TerminalDevice};
use crate::dimensions::{CachedDimensions, DimensionCache, Dimensions};
use crate::size_probe::{self, ProbeConfig};
use crate::{debug, info, warn};

/// Construction-time settings for a [`Terminal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalConfig {
    /// Size reported when neither the platform nor the probe yields one.
    pub fallback_size: Dimensions,
    /// Escape-sequence probe tuning.
    pub probe: ProbeConfig,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            fallback_size: Dimensions::FALLBACK,
            probe: ProbeConfig::default(),
        }
    }
}

/// A terminal device plus everything learned about it.
///
/// Caches live here rather than in process-wide statics so independent
/// terminals (a pty-bound session next to stdio, or parallel tests) never
/// see each other's state.
#[derive(Debug)]
pub struct Terminal<D: TerminalDevice> {
    device: D,
    config: TerminalConfig,
    /// Cooked settings captured by `install_raw`; `Some` exactly while raw.
    saved_mode: Option<D::Mode>,
    size_cache: DimensionCache,
    /// Set when the last size query got no usable reply, so stdio bound to
    /// a pipe or file is not re-queried on every call.
    size_unanswered: bool,
    color: Cell<Option<ColorSupport>>,
}

impl<D: TerminalDevice> Terminal<D> {
    #[must_use]
    pub fn new(device: D) -> Self {
        Self::with_config(device, TerminalConfig::default())
    }

    #[must_use]
    pub fn with_config(device: D, config: TerminalConfig) -> Self {
        let fallback = config.fallback_size;
        let mut terminal = Self {
            device,
            config,
            saved_mode: None,
            size_cache: DimensionCache::new(),
            size_unanswered: false,
            color: Cell::new(None),
        };
        terminal.set_fallback_size(fallback);
        terminal
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    /// Replace the probe settings. Cached sizes are kept.
    pub fn set_probe_config(&mut self, probe: ProbeConfig) {
        self.config.probe = probe;
    }

    /// Swap in a different device, returning the previous one.
    ///
    /// Raw mode is uninstalled from the old device first and the size cache
    /// is cleared. Color classification is environment-based and survives.
    pub fn rebind(&mut self, device: D) -> D {
        if let Err(err) = self.uninstall_raw() {
            warn!(error = %err, "rebind: failed to restore cooked mode on previous device");
            self.saved_mode = None;
        }
        self.invalidate_size();
        std::mem::replace(&mut self.device, device)
    }

    // ── Raw mode ─────────────────────────────────────────────────────────

    /// Whether raw mode is currently installed by this terminal.
    #[must_use]
    pub fn is_raw(&self) -> bool {
        self.saved_mode.is_some()
    }

    /// Switch the input to raw mode, remembering the cooked settings.
    ///
    /// A no-op when the input is not a terminal or raw mode is already
    /// installed; `Ok(())` does not say which.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses to read or change the
    /// settings. The terminal is then still cooked.
    pub fn install_raw(&mut self) -> io::Result<()> {
        if self.saved_mode.is_some() || !self.device.input_is_terminal() {
            return Ok(());
        }
        let saved = self.device.enter_raw()?;
        self.saved_mode = Some(saved);
        debug!("raw mode installed");
        Ok(())
    }

    /// Restore the settings captured by [`install_raw`](Self::install_raw).
    ///
    /// A no-op when raw mode is not installed. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform refuses the restore. The snapshot is
    /// kept so a later call (or drop) can retry.
    pub fn uninstall_raw(&mut self) -> io::Result<()> {
        let Some(saved) = self.saved_mode.take() else {
            return Ok(());
        };
        if let Err(err) = self.device.restore_mode(&saved) {
            self.saved_mode = Some(saved);
            return Err(err);
        }
        debug!("raw mode uninstalled");
        Ok(())
    }

    /// Install raw mode for the lifetime of the returned guard.
    ///
    /// The guard only uninstalls what it installed: if raw mode was already
    /// on, dropping the guard leaves it on.
    ///
    /// # Errors
    ///
    /// Propagates [`install_raw`](Self::install_raw) failures.
    pub fn raw_mode(&mut self) -> io::Result<RawModeGuard<'_, D>> {
        let was_raw = self.is_raw();
        self.install_raw()?;
        let installed = !was_raw && self.is_raw();
        Ok(RawModeGuard {
            terminal: self,
            installed,
        })
    }

    /// Run `f` with cooked mode temporarily restored.
    ///
    /// If raw mode was installed it is reinstalled afterwards on every exit
    /// path, including unwinding out of `f`. Otherwise `f` simply runs.
    pub fn with_restored_io<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        if !self.is_raw() {
            return f(self);
        }
        if let Err(err) = self.uninstall_raw() {
            warn!(error = %err, "could not restore cooked mode; running in raw mode");
            return f(self);
        }
        let mut guard = Reinstall { terminal: self };
        f(&mut *guard.terminal)
    }

    // ── Size ─────────────────────────────────────────────────────────────

    /// Current terminal size. Never fails; never returns a zero axis.
    pub fn size(&mut self) -> Dimensions {
        if self.device.take_resize() {
            debug!("resize notification; dropping cached size");
            self.invalidate_size();
        }

        if let Some(dims) = self.size_cache.get() {
            return dims;
        }
        if self.size_unanswered {
            return self.config.fallback_size;
        }

        if cfg!(target_arch = "wasm32") {
            return self.config.fallback_size;
        }

        if self.device.output_is_console() {
            return match self.device.console_size() {
                Ok(dims) if dims.is_usable() => dims,
                Ok(dims) => {
                    debug!(%dims, "console reported an unusable size; using fallback");
                    self.config.fallback_size
                }
                Err(err) => {
                    debug!(error = %err, "console size query failed; using fallback");
                    self.config.fallback_size
                }
            };
        }

        let probe = self.config.probe.clone();
        let probed =
            self.with_restored_io(|term| size_probe::probe_size(term.device.channel(), &probe));

        match probed {
            Some(dims) => {
                info!(%dims, "terminal size negotiated in-band");
                self.size_cache.store(dims);
                dims
            }
            None => {
                debug!("size query unanswered; using fallback until invalidated");
                self.size_unanswered = true;
                self.config.fallback_size
            }
        }
    }

    /// Drop any cached size so the next [`size`](Self::size) re-discovers.
    ///
    /// This also re-arms the in-band query after an unanswered attempt.
    pub fn force_recalculate_size(&mut self) {
        self.invalidate_size();
    }

    fn invalidate_size(&mut self) {
        self.size_cache.invalidate();
        self.size_unanswered = false;
    }

    /// The cached size with its capture time, if any.
    #[must_use]
    pub fn cached_size(&self) -> Option<CachedDimensions> {
        self.size_cache.entry()
    }

    #[must_use]
    pub fn fallback_size(&self) -> Dimensions {
        self.config.fallback_size
    }

    /// Change the size used when discovery fails.
    ///
    /// Zero axes are raised to 1. Already cached real sizes are unaffected.
    pub fn set_fallback_size(&mut self, dims: Dimensions) {
        if !dims.is_usable() {
            warn!(%dims, "fallback size has a zero axis; raising to 1");
        }
        self.config.fallback_size = dims.at_least(Dimensions::new(1, 1));
    }

    // ── Color ────────────────────────────────────────────────────────────

    /// Color depth, classified from the environment on first use.
    #[must_use]
    pub fn color_support(&self) -> ColorSupport {
        if let Some(level) = self.color.get() {
            return level;
        }
        let level = ColorSupport::detect();
        debug!(%level, "color support detected");
        self.color.set(Some(level));
        level
    }

    /// Force the color depth; the environment is no longer consulted.
    pub fn set_color_support(&mut self, level: ColorSupport) {
        self.color.set(Some(level));
    }

    // ── I/O ──────────────────────────────────────────────────────────────

    /// Unbuffered output sink.
    pub fn output(&mut self) -> &mut D::Channel {
        self.device.channel()
    }

    /// Wait up to `timeout` for input, then perform one read.
    ///
    /// # Errors
    ///
    /// Propagates read failures. A timeout is `Ok(0)`.
    pub fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.device.channel().read_timeout(buf, timeout)
    }

    /// Wait up to `timeout` for input to become readable.
    ///
    /// # Errors
    ///
    /// Propagates readiness-wait failures.
    pub fn wait_for_input(&mut self, timeout: Duration) -> io::Result<bool> {
        self.device.channel().wait_for_input(timeout)
    }
}

impl<D: TerminalDevice> Drop for Terminal<D> {
    fn drop(&mut self) {
        if let Err(err) = self.uninstall_raw() {
            warn!(error = %err, "failed to restore cooked mode on drop");
        }
    }
}

/// Scoped raw mode. Dereferences to the [`Terminal`].
#[must_use = "raw mode is uninstalled as soon as the guard is dropped"]
pub struct RawModeGuard<'a, D: TerminalDevice> {
    terminal: &'a mut Terminal<D>,
    installed: bool,
}

impl<D: TerminalDevice> RawModeGuard<'_, D> {
    /// Whether this guard performed the install (and will undo it).
    #[must_use]
    pub fn installed(&self) -> bool {
        self.installed
    }
}

impl<D: TerminalDevice> Deref for RawModeGuard<'_, D> {
    type Target = Terminal<D>;

    fn deref(&self) -> &Self::Target {
        &*self.terminal
    }
}

impl<D: TerminalDevice> DerefMut for RawModeGuard<'_, D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.terminal
    }
}

impl<D: TerminalDevice> Drop for RawModeGuard<'_, D> {
    fn drop(&mut self) {
        if self.installed
            && let Err(err) = self.terminal.uninstall_raw()
        {
            warn!(error = %err, "raw mode guard failed to restore cooked mode");
        }
    }
}

/// Reinstalls raw mode when dropped; backs `with_restored_io`.
struct Reinstall<'a, D: TerminalDevice> {
    terminal: &'a mut Terminal<D>,
}

impl<D: TerminalDevice> Drop for Reinstall<'_, D> {
    fn drop(&mut self) {
        if let Err(err) = self.terminal.install_raw() {
            warn!(error = %err, "failed to reinstall raw mode after restored I/O");
        }
    }
}
