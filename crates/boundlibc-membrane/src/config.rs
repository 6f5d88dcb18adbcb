//! Process-wide runtime configuration.
//!
//! Three settings are read by every guarded call:
//! - the runtime mode (`BOUNDLIBC_MODE`): `strict` (default) or `hardened`.
//!   Both enforce every contract check; `hardened` additionally consults an
//!   available pointer-bounds probe for buffers whose capacity is declared.
//!   `off` is reachable only through [`set_safety_level`] and disables the
//!   optional probe, never the contract checks.
//! - the memory length ceiling (`BOUNDLIBC_RSIZE_MAX_MEM`, default 256 MiB).
//! - the string length ceiling (`BOUNDLIBC_RSIZE_MAX_STR`, default 4 KiB).
//!
//! Environment variables are resolved once, on first use. Explicit setters
//! are startup-time configuration, not a hot path.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Default ceiling for memory operations on buffers of unknown capacity.
pub const DEFAULT_RSIZE_MAX_MEM: usize = 256 << 20;
/// Default ceiling for string operations on buffers of unknown capacity.
pub const DEFAULT_RSIZE_MAX_STR: usize = 4 << 10;

/// Invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("length ceiling must be non-zero")]
    ZeroCeiling,
    #[error("unparseable size '{0}'")]
    BadSize(String),
}

/// Runtime operating mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyLevel {
    /// Contract checks plus the probe for unknown-capacity buffers.
    #[default]
    Strict,
    /// Strict, and the probe also cross-checks declared capacities.
    Hardened,
    /// Contract checks only. Benchmark baseline.
    Off,
}

impl SafetyLevel {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "strict" | "default" => Self::Strict,
            "hardened" | "full" => Self::Hardened,
            "off" | "none" | "disabled" => Self::Off,
            _ => Self::Strict,
        }
    }

    /// Returns true if the pointer-bounds probe may run at all.
    #[must_use]
    pub const fn probe_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Returns true if the probe also runs for declared capacities.
    #[must_use]
    pub const fn probe_known_capacity(self) -> bool {
        matches!(self, Self::Hardened)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Hardened => "hardened",
            Self::Off => "off",
        }
    }
}

// 0=unresolved, 1=Strict, 2=Hardened, 3=Off, 255=resolving.
static CACHED_LEVEL: AtomicU8 = AtomicU8::new(0);

const LEVEL_UNRESOLVED: u8 = 0;
const LEVEL_STRICT: u8 = 1;
const LEVEL_HARDENED: u8 = 2;
const LEVEL_OFF: u8 = 3;
const LEVEL_RESOLVING: u8 = 255;

fn parse_runtime_mode_env(raw: &str) -> SafetyLevel {
    match raw.to_ascii_lowercase().as_str() {
        "hardened" | "full" => SafetyLevel::Hardened,
        // Environment may only pick strict or hardened.
        _ => SafetyLevel::Strict,
    }
}

fn level_to_u8(level: SafetyLevel) -> u8 {
    match level {
        SafetyLevel::Strict => LEVEL_STRICT,
        SafetyLevel::Hardened => LEVEL_HARDENED,
        SafetyLevel::Off => LEVEL_OFF,
    }
}

fn u8_to_level(v: u8) -> SafetyLevel {
    match v {
        LEVEL_HARDENED => SafetyLevel::Hardened,
        LEVEL_OFF => SafetyLevel::Off,
        _ => SafetyLevel::Strict,
    }
}

/// Get the configured safety level (reads env var on first call, caches thereafter).
///
/// A reentrant call that arrives while the environment is being read sees
/// the RESOLVING state and gets Strict.
#[must_use]
pub fn safety_level() -> SafetyLevel {
    let cached = CACHED_LEVEL.load(Ordering::Relaxed);
    if cached != LEVEL_UNRESOLVED && cached != LEVEL_RESOLVING {
        return u8_to_level(cached);
    }
    if cached == LEVEL_RESOLVING {
        return SafetyLevel::Strict;
    }

    if CACHED_LEVEL
        .compare_exchange(
            LEVEL_UNRESOLVED,
            LEVEL_RESOLVING,
            Ordering::SeqCst,
            Ordering::Relaxed,
        )
        .is_err()
    {
        let v = CACHED_LEVEL.load(Ordering::Relaxed);
        return if v != LEVEL_UNRESOLVED && v != LEVEL_RESOLVING {
            u8_to_level(v)
        } else {
            SafetyLevel::Strict
        };
    }

    let level = std::env::var("BOUNDLIBC_MODE")
        .map(|v| parse_runtime_mode_env(&v))
        .unwrap_or_default();
    CACHED_LEVEL.store(level_to_u8(level), Ordering::Release);
    level
}

/// Override the runtime mode. Returns the previous mode.
pub fn set_safety_level(level: SafetyLevel) -> SafetyLevel {
    let previous = safety_level();
    CACHED_LEVEL.store(level_to_u8(level), Ordering::Release);
    previous
}

// ---------------------------------------------------------------------------
// Length ceilings
// ---------------------------------------------------------------------------

// 0 means "not yet resolved from the environment".
static RSIZE_MAX_MEM: AtomicUsize = AtomicUsize::new(0);
static RSIZE_MAX_STR: AtomicUsize = AtomicUsize::new(0);

/// Parse a byte size such as `4096`, `64K`, `256M` or `1G`.
pub fn parse_size(raw: &str) -> Result<usize, ConfigError> {
    let trimmed = raw.trim();
    let bad = || ConfigError::BadSize(raw.to_string());
    let (digits, shift) = match trimmed.char_indices().last() {
        Some((idx, 'k' | 'K')) => (&trimmed[..idx], 10),
        Some((idx, 'm' | 'M')) => (&trimmed[..idx], 20),
        Some((idx, 'g' | 'G')) => (&trimmed[..idx], 30),
        Some(_) => (trimmed, 0),
        None => return Err(bad()),
    };
    let value: usize = digits.parse().map_err(|_| bad())?;
    value.checked_mul(1usize << shift).ok_or_else(bad)
}

fn resolve_ceiling(slot: &AtomicUsize, env_key: &str, default: usize) -> usize {
    let cached = slot.load(Ordering::Acquire);
    if cached != 0 {
        return cached;
    }
    let resolved = std::env::var(env_key)
        .ok()
        .and_then(|raw| parse_size(&raw).ok())
        .filter(|&v| v != 0)
        .unwrap_or(default);
    // An explicit setter that raced us wins.
    match slot.compare_exchange(0, resolved, Ordering::AcqRel, Ordering::Acquire) {
        Ok(_) => resolved,
        Err(current) => current,
    }
}

fn store_ceiling(
    slot: &AtomicUsize,
    env_key: &str,
    default: usize,
    value: usize,
) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroCeiling);
    }
    let previous = resolve_ceiling(slot, env_key, default);
    slot.store(value, Ordering::Release);
    Ok(previous)
}

/// Global ceiling for memory operations (`RSIZE_MAX_MEM`).
#[must_use]
pub fn rsize_max_mem() -> usize {
    resolve_ceiling(
        &RSIZE_MAX_MEM,
        "BOUNDLIBC_RSIZE_MAX_MEM",
        DEFAULT_RSIZE_MAX_MEM,
    )
}

/// Global ceiling for string operations (`RSIZE_MAX_STR`).
#[must_use]
pub fn rsize_max_str() -> usize {
    resolve_ceiling(
        &RSIZE_MAX_STR,
        "BOUNDLIBC_RSIZE_MAX_STR",
        DEFAULT_RSIZE_MAX_STR,
    )
}

/// Reconfigure the memory ceiling. Returns the previous value.
pub fn set_rsize_max_mem(value: usize) -> Result<usize, ConfigError> {
    store_ceiling(
        &RSIZE_MAX_MEM,
        "BOUNDLIBC_RSIZE_MAX_MEM",
        DEFAULT_RSIZE_MAX_MEM,
        value,
    )
}

/// Reconfigure the string ceiling. Returns the previous value.
pub fn set_rsize_max_str(value: usize) -> Result<usize, ConfigError> {
    store_ceiling(
        &RSIZE_MAX_STR,
        "BOUNDLIBC_RSIZE_MAX_STR",
        DEFAULT_RSIZE_MAX_STR,
        value,
    )
}

// ---------------------------------------------------------------------------
// Default handler selection
// ---------------------------------------------------------------------------

/// Built-in handler installed when nothing has been registered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultHandlerKind {
    /// One diagnostic line on stderr, then return.
    #[default]
    Log,
    /// Diagnostic line, then abort the process.
    Abort,
    /// Do nothing.
    Ignore,
}

impl DefaultHandlerKind {
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Self::Abort,
            "ignore" | "none" | "silent" => Self::Ignore,
            _ => Self::Log,
        }
    }
}

/// Handler kind requested by `BOUNDLIBC_CONSTRAINT_HANDLER`.
#[must_use]
pub fn default_handler_kind() -> DefaultHandlerKind {
    std::env::var("BOUNDLIBC_CONSTRAINT_HANDLER")
        .map(|v| DefaultHandlerKind::from_str_loose(&v))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_safety_levels() {
        assert_eq!(SafetyLevel::from_str_loose("strict"), SafetyLevel::Strict);
        assert_eq!(SafetyLevel::from_str_loose("STRICT"), SafetyLevel::Strict);
        assert_eq!(
            SafetyLevel::from_str_loose("hardened"),
            SafetyLevel::Hardened
        );
        assert_eq!(SafetyLevel::from_str_loose("off"), SafetyLevel::Off);
        assert_eq!(SafetyLevel::from_str_loose("bogus"), SafetyLevel::Strict);
    }

    #[test]
    fn runtime_mode_parser_is_strict_or_hardened_only() {
        assert_eq!(parse_runtime_mode_env("hardened"), SafetyLevel::Hardened);
        assert_eq!(parse_runtime_mode_env("off"), SafetyLevel::Strict);
        assert_eq!(parse_runtime_mode_env(""), SafetyLevel::Strict);
    }

    #[test]
    fn probe_policy_per_level() {
        assert!(SafetyLevel::Strict.probe_enabled());
        assert!(!SafetyLevel::Strict.probe_known_capacity());
        assert!(SafetyLevel::Hardened.probe_known_capacity());
        assert!(!SafetyLevel::Off.probe_enabled());
    }

    #[test]
    fn resolving_state_returns_strict_safe_default() {
        let previous = CACHED_LEVEL.swap(LEVEL_RESOLVING, Ordering::SeqCst);
        assert_eq!(safety_level(), SafetyLevel::Strict);
        CACHED_LEVEL.store(previous, Ordering::SeqCst);
    }

    #[test]
    fn parse_size_suffixes() {
        assert_eq!(parse_size("4096"), Ok(4096));
        assert_eq!(parse_size("4k"), Ok(4096));
        assert_eq!(parse_size(" 256M "), Ok(256 << 20));
        assert_eq!(parse_size("1G"), Ok(1 << 30));
        assert!(parse_size("").is_err());
        assert!(parse_size("M").is_err());
        assert!(parse_size("12q").is_err());
    }

    #[test]
    fn resolve_ceiling_falls_back_to_default() {
        let slot = AtomicUsize::new(0);
        let v = resolve_ceiling(&slot, "BOUNDLIBC_TEST_UNSET_CEILING", 77);
        assert_eq!(v, 77);
        assert_eq!(slot.load(Ordering::Relaxed), 77);
    }

    #[test]
    fn store_ceiling_rejects_zero() {
        let slot = AtomicUsize::new(10);
        assert_eq!(
            store_ceiling(&slot, "BOUNDLIBC_TEST_UNSET_CEILING", 5, 0),
            Err(ConfigError::ZeroCeiling)
        );
        assert_eq!(
            store_ceiling(&slot, "BOUNDLIBC_TEST_UNSET_CEILING", 5, 20),
            Ok(10)
        );
        assert_eq!(slot.load(Ordering::Relaxed), 20);
    }

    #[test]
    fn handler_kind_parse() {
        assert_eq!(
            DefaultHandlerKind::from_str_loose("ABORT"),
            DefaultHandlerKind::Abort
        );
        assert_eq!(
            DefaultHandlerKind::from_str_loose("ignore"),
            DefaultHandlerKind::Ignore
        );
        assert_eq!(DefaultHandlerKind::from_str_loose("x"), DefaultHandlerKind::Log);
    }
}
