//! Logging facade.
//!
//! With the `tracing` feature the usual `tracing` macros are re-exported from
//! here. Without it, macros of the same names are exported at the crate root
//! that only borrow their field values and emit nothing. Either way the macros are reachable as `fterm_core::debug` (and
//! `crate::debug` inside this crate), so call sites never need their own
//! `cfg` gates:
//!
//! ```ignore
//! use fterm_core::{debug, warn};
//! ```

#[cfg(feature = "tracing")]
pub use tracing::{debug, info, trace, warn};

/// Borrows every field value of a log call so bindings that only feed log
/// fields still count as used when logging is compiled out.
#[cfg(not(feature = "tracing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log_fields {
    () => {};
    ($msg:literal $(, $arg:expr)*) => {
        $( let _ = &$arg; )*
    };
    ($key:ident = %$val:expr $(, $($rest:tt)*)?) => {
        let _ = &$val;
        $( $crate::__log_fields!($($rest)*); )?
    };
    ($key:ident = ?$val:expr $(, $($rest:tt)*)?) => {
        let _ = &$val;
        $( $crate::__log_fields!($($rest)*); )?
    };
    ($key:ident = $val:expr $(, $($rest:tt)*)?) => {
        let _ = &$val;
        $( $crate::__log_fields!($($rest)*); )?
    };
    (%$val:ident $(, $($rest:tt)*)?) => {
        let _ = &$val;
        $( $crate::__log_fields!($($rest)*); )?
    };
    (?$val:ident $(, $($rest:tt)*)?) => {
        let _ = &$val;
        $( $crate::__log_fields!($($rest)*); )?
    };
    ($val:ident $(, $($rest:tt)*)?) => {
        let _ = &$val;
        $( $crate::__log_fields!($($rest)*); )?
    };
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{ $crate::__log_fields!($($arg)*); }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{ $crate::__log_fields!($($arg)*); }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {{ $crate::__log_fields!($($arg)*); }};
}

#[cfg(not(feature = "tracing"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{ $crate::__log_fields!($($arg)*); }};
}

/// Install a JSON `tracing` subscriber filtered by `RUST_LOG`.
///
/// Intended for binaries embedding fterm; libraries should leave subscriber
/// selection to the application.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_subscriber() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
}

#[cfg(all(test, not(feature = "tracing")))]
mod tests {
    use crate::{debug, info, trace, warn};
    use std::fmt;

    struct Loud;

    impl fmt::Display for Loud {
        fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
            panic!("disabled log fields must not be formatted")
        }
    }

    #[test]
    fn disabled_macros_accept_tracing_field_syntax() {
        let err = Loud;
        let dims = Loud;
        let signal = 2;
        let path = std::path::Path::new("/dev/pts/0");
        debug!("plain message");
        debug!(error = %err, "keyed display field");
        info!(%dims, "shorthand display field");
        warn!(signal, "shorthand field");
        trace!(path = %path.display(), count = 3, dbg = ?signal, "mixed fields");
        info!("message with args {} {}", 1, signal);
    }
}
