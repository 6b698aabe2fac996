//! Environment variable helpers
//!
//! Typed lookups with a caller-supplied default. Used by the config
//! builders to apply `TSV_*` overrides on top of compiled defaults.
//!
//! # Usage
//!
//! ```ignore
//! use taskserv_core::env::{env_get, env_get_bool};
//!
//! let workers: usize = env_get("TSV_WORKERS", 30);
//! let buffer: usize = env_get("TSV_RECV_BUFFER", 10 * 1024);
//! let flush: bool = env_get_bool("TSV_LOG_FLUSH", false);
//! ```

use std::str::FromStr;

/// Look up `key` and parse it as `T`, falling back to `default` when the
/// variable is unset or does not parse.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Look up `key` as a boolean flag.
///
/// "1", "true", "yes", "on" (case-insensitive) are true; any other set
/// value is false; unset returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_when_unset() {
        let v: usize = env_get("TSV_TEST_SURELY_UNSET", 42);
        assert_eq!(v, 42);
        assert!(env_get_bool("TSV_TEST_SURELY_UNSET", true));
    }

    #[test]
    fn test_parse_and_bool() {
        std::env::set_var("TSV_TEST_ENV_GET", "128");
        let v: usize = env_get("TSV_TEST_ENV_GET", 1);
        assert_eq!(v, 128);

        std::env::set_var("TSV_TEST_ENV_BOOL", "yes");
        assert!(env_get_bool("TSV_TEST_ENV_BOOL", false));

        std::env::set_var("TSV_TEST_ENV_BOOL", "off");
        assert!(!env_get_bool("TSV_TEST_ENV_BOOL", true));
    }

    #[test]
    fn test_garbage_falls_back() {
        std::env::set_var("TSV_TEST_ENV_BAD", "not-a-number");
        let v: usize = env_get("TSV_TEST_ENV_BAD", 7);
        assert_eq!(v, 7);
    }
}
