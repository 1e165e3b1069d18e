//! Cleanup for exit paths that skip `Drop`.
//!
//! Every [`TtyDevice`](crate::TtyDevice) registers its shared state here.
//! While raw mode is installed the state holds an *armed* copy of the cooked
//! settings plus a duplicated descriptor to apply them to. A panic hook and
//! the termination-signal thread restore every armed terminal before the
//! process goes away.
//!
//! # Signal Thread
//!
//! One `signal-hook` thread serves the whole process and is started the first
//! time a device asks for signal handling. Devices *subscribe* rather than
//! owning handlers, so dropping a device never leaves the process with a
//! registered-but-inert handler:
//!
//! | Signal | Subscribers alive | No subscribers |
//! |--------|-------------------|----------------|
//! | SIGINT / SIGTERM | restore armed terminals, exit `128 + signal` | default action |
//! | SIGWINCH | raise each subscriber's resize flag | ignored |
//!
//! No code in this crate executes inside an async signal handler.

use std::io;
use std::os::fd::OwnedFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use fterm_core::{debug, warn};
use nix::sys::termios::{SetArg, Termios, tcsetattr};
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
use signal_hook::iterator::Signals;

/// Cooked settings to reinstate on an abnormal exit.
#[derive(Debug)]
pub(crate) struct ArmedMode {
    pub(crate) fd: OwnedFd,
    pub(crate) termios: Termios,
}

/// State a device shares with the signal thread and the panic hook.
#[derive(Debug, Default)]
pub(crate) struct DeviceShared {
    armed: Mutex<Option<ArmedMode>>,
    resize: AtomicBool,
    subscribed: AtomicBool,
}

impl DeviceShared {
    /// Allocate and register shared state for a new device.
    pub(crate) fn register() -> Arc<Self> {
        install_panic_hook();
        let shared = Arc::new(Self::default());
        let mut registry = REGISTRY.lock().unwrap_or_else(PoisonError::into_inner);
        registry.retain(|w| w.strong_count() > 0);
        registry.push(Arc::downgrade(&shared));
        shared
    }

    /// Route termination and resize signals to this device from now on.
    ///
    /// The subscription ends when the device's shared state is dropped.
    pub(crate) fn subscribe(&self) -> io::Result<()> {
        ensure_signal_thread()?;
        self.subscribed.store(true, Ordering::Release);
        Ok(())
    }

    pub(crate) fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    pub(crate) fn arm(&self, mode: ArmedMode) {
        *self.armed.lock().unwrap_or_else(PoisonError::into_inner) = Some(mode);
    }

    pub(crate) fn disarm(&self) {
        *self.armed.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn notify_resize(&self) {
        self.resize.store(true, Ordering::Release);
    }

    pub(crate) fn take_resize(&self) -> bool {
        self.resize.swap(false, Ordering::AcqRel)
    }

    /// Reapply the armed settings, if any. The snapshot stays armed.
    fn restore(&self) {
        let armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mode) = armed.as_ref()
            && let Err(err) = tcsetattr(&mode.fd, SetArg::TCSANOW, &mode.termios)
        {
            warn!(error = %err, "emergency terminal restore failed");
        }
    }
}

static REGISTRY: Mutex<Vec<Weak<DeviceShared>>> = Mutex::new(Vec::new());

fn live_devices() -> Vec<Arc<DeviceShared>> {
    REGISTRY
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .filter_map(Weak::upgrade)
        .collect()
}

fn subscribers() -> Vec<Arc<DeviceShared>> {
    let mut live = live_devices();
    live.retain(|shared| shared.is_subscribed());
    live
}

/// Restore every armed terminal in the process.
///
/// Call this before `std::process::exit` when destructors will not run.
pub fn restore_armed_terminals() {
    for shared in live_devices() {
        shared.restore();
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_armed_terminals();
            previous(info);
        }));
    });
}

/// Whether the process-wide signal thread is running. Registration can fail,
/// so this is a flag under a lock rather than a `OnceLock`.
static SIGNAL_THREAD: Mutex<bool> = Mutex::new(false);

fn ensure_signal_thread() -> io::Result<()> {
    let mut running = SIGNAL_THREAD
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if *running {
        return Ok(());
    }
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGWINCH])?;
    std::thread::Builder::new()
        .name("fterm-signals".into())
        .spawn(move || {
            for signal in signals.forever() {
                dispatch(signal);
            }
        })?;
    *running = true;
    Ok(())
}

fn dispatch(signal: i32) {
    match signal {
        SIGWINCH => {
            debug!("SIGWINCH received");
            for shared in subscribers() {
                shared.notify_resize();
            }
        }
        SIGINT | SIGTERM => {
            if subscribers().is_empty() {
                debug!(signal, "no terminal subscribed; taking the default action");
                if let Err(err) = signal_hook::low_level::emulate_default_handler(signal) {
                    warn!(error = %err, signal, "default signal action failed");
                }
                return;
            }
            warn!(signal, "termination signal received, restoring terminal");
            restore_armed_terminals();
            std::process::exit(128 + signal);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::pty::openpty;
    use nix::sys::termios::{LocalFlags, tcgetattr};
    use std::time::{Duration, Instant};

    #[test]
    fn resize_flag_is_consumed_once() {
        let shared = DeviceShared::register();
        assert!(!shared.take_resize());
        shared.notify_resize();
        assert!(shared.take_resize());
        assert!(!shared.take_resize());
    }

    #[test]
    fn arm_and_disarm() {
        let pty = openpty(None, None).unwrap();
        let shared = DeviceShared::register();
        let termios = tcgetattr(&pty.slave).unwrap();
        shared.arm(ArmedMode {
            fd: pty.slave.try_clone().unwrap(),
            termios,
        });
        assert!(shared.is_armed());
        shared.disarm();
        assert!(!shared.is_armed());
    }

    #[test]
    fn emergency_restore_reapplies_armed_settings() {
        let pty = openpty(None, None).unwrap();
        let cooked = tcgetattr(&pty.slave).unwrap();
        assert!(cooked.local_flags.contains(LocalFlags::ICANON));

        let shared = DeviceShared::register();
        shared.arm(ArmedMode {
            fd: pty.slave.try_clone().unwrap(),
            termios: cooked.clone(),
        });

        let mut raw = cooked.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        tcsetattr(&pty.slave, SetArg::TCSANOW, &raw).unwrap();

        restore_armed_terminals();
        let after = tcgetattr(&pty.slave).unwrap();
        assert_eq!(after.local_flags, cooked.local_flags);
        assert!(shared.is_armed());
    }

    #[test]
    fn dropped_devices_leave_the_registry() {
        let shared = DeviceShared::register();
        let weak = Arc::downgrade(&shared);
        drop(shared);
        assert!(weak.upgrade().is_none());
        // Registering again prunes dead entries.
        let _next = DeviceShared::register();
        let registry = REGISTRY.lock().unwrap();
        assert!(!registry.iter().any(|w| w.ptr_eq(&weak)));
    }

    #[test]
    fn subscription_ends_with_the_device() {
        let shared = DeviceShared::register();
        assert!(!shared.is_subscribed());
        shared.subscribe().unwrap();
        assert!(shared.is_subscribed());
        assert!(subscribers().iter().any(|s| Arc::ptr_eq(s, &shared)));

        let weak = Arc::downgrade(&shared);
        drop(shared);
        assert!(
            !subscribers()
                .iter()
                .any(|s| std::ptr::eq(Arc::as_ptr(s), weak.as_ptr()))
        );
    }

    #[test]
    fn subscribing_twice_keeps_one_thread() {
        let a = DeviceShared::register();
        let b = DeviceShared::register();
        a.subscribe().unwrap();
        b.subscribe().unwrap();
        assert!(*SIGNAL_THREAD.lock().unwrap());
    }

    #[test]
    fn sigwinch_raises_the_resize_flag() {
        let shared = DeviceShared::register();
        shared.subscribe().unwrap();
        signal_hook::low_level::raise(SIGWINCH).unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        let mut seen = false;
        while Instant::now() < deadline {
            if shared.take_resize() {
                seen = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(seen, "SIGWINCH was not observed");
    }
}
