//! Logging shims
//!
//! Routes to `defmt` on the firmware build and to `tracing` on host
//! builds. Format strings must stay within what both accept, so
//! only `{}` and `{:?}` placeholders are used and no precision flags.
//! With neither backend enabled the arguments are still borrowed so
//! nothing is reported as unused.

#![allow(unused_macros)]

macro_rules! log_event {
    ($level:ident, $($arg:tt)+) => {{
        #[cfg(feature = "embedded")]
        ::defmt::$level!($($arg)+);
        #[cfg(all(feature = "std", not(feature = "embedded")))]
        ::tracing::$level!($($arg)+);
        #[cfg(not(any(feature = "embedded", feature = "std")))]
        {
            let _ = ::core::format_args!($($arg)+);
        }
    }};
}

macro_rules! trace {
    ($($arg:tt)+) => { log_event!(trace, $($arg)+) };
}

macro_rules! debug {
    ($($arg:tt)+) => { log_event!(debug, $($arg)+) };
}

macro_rules! info {
    ($($arg:tt)+) => { log_event!(info, $($arg)+) };
}

macro_rules! warn {
    ($($arg:tt)+) => { log_event!(warn, $($arg)+) };
}

macro_rules! error {
    ($($arg:tt)+) => { log_event!(error, $($arg)+) };
}
