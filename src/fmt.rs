//! Internal logging macros.
//!
//! Call sites stay backend-agnostic: each macro forwards to `defmt` or `log`
//! depending on the enabled feature, falls back to `esp-println` for the
//! `esp32-log` feature, and compiles to nothing when no backend is selected.

#![allow(unused_macros)]

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)*);
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        ::log::trace!($($arg)*);
        #[cfg(all(feature = "esp32-log", not(any(feature = "defmt", feature = "log"))))]
        ::esp_println::println!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "log", feature = "esp32-log")))]
        { let _ = ::core::format_args!($($arg)*); }
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        ::log::debug!($($arg)*);
        #[cfg(all(feature = "esp32-log", not(any(feature = "defmt", feature = "log"))))]
        ::esp_println::println!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "log", feature = "esp32-log")))]
        { let _ = ::core::format_args!($($arg)*); }
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::info!($($arg)*);
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        ::log::info!($($arg)*);
        #[cfg(all(feature = "esp32-log", not(any(feature = "defmt", feature = "log"))))]
        ::esp_println::println!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "log", feature = "esp32-log")))]
        { let _ = ::core::format_args!($($arg)*); }
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        ::log::warn!($($arg)*);
        #[cfg(all(feature = "esp32-log", not(any(feature = "defmt", feature = "log"))))]
        ::esp_println::println!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "log", feature = "esp32-log")))]
        { let _ = ::core::format_args!($($arg)*); }
    }};
}

macro_rules! error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::error!($($arg)*);
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        ::log::error!($($arg)*);
        #[cfg(all(feature = "esp32-log", not(any(feature = "defmt", feature = "log"))))]
        ::esp_println::println!($($arg)*);
        #[cfg(not(any(feature = "defmt", feature = "log", feature = "esp32-log")))]
        { let _ = ::core::format_args!($($arg)*); }
    }};
}
