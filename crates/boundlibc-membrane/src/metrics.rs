//! Atomic counters for membrane observability.
//!
//! All counters use relaxed ordering: they are diagnostic, not
//! synchronization primitives, and never influence an outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::errno::ViolationKind;

/// Membrane operation counters.
#[derive(Debug)]
pub struct MembraneMetrics {
    /// Buffer validations performed.
    pub validations: AtomicU64,
    /// Violations reported (all kinds).
    pub violations: AtomicU64,
    pub null_arguments: AtomicU64,
    pub zero_lengths: AtomicU64,
    pub length_violations: AtomicU64,
    pub overlaps: AtomicU64,
    pub no_space: AtomicU64,
    pub invalid_arguments: AtomicU64,
    /// Handler invocations.
    pub handler_invocations: AtomicU64,
    /// Completed constant-time comparisons.
    pub compares: AtomicU64,
    /// Byte pairs visited by constant-time comparisons.
    pub bytes_compared: AtomicU64,
    /// Pointer-bounds probe consultations.
    pub probe_checks: AtomicU64,
    /// Probe consultations that had no information for the pointer.
    pub probe_unknown: AtomicU64,
    /// Probe consultations that caught an overrun.
    pub probe_failures: AtomicU64,
}

impl MembraneMetrics {
    /// Create a new zeroed metrics instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            validations: AtomicU64::new(0),
            violations: AtomicU64::new(0),
            null_arguments: AtomicU64::new(0),
            zero_lengths: AtomicU64::new(0),
            length_violations: AtomicU64::new(0),
            overlaps: AtomicU64::new(0),
            no_space: AtomicU64::new(0),
            invalid_arguments: AtomicU64::new(0),
            handler_invocations: AtomicU64::new(0),
            compares: AtomicU64::new(0),
            bytes_compared: AtomicU64::new(0),
            probe_checks: AtomicU64::new(0),
            probe_unknown: AtomicU64::new(0),
            probe_failures: AtomicU64::new(0),
        }
    }

    /// Increment a counter by 1.
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Read a counter value.
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Count one violation of `kind`.
    pub fn record_violation(&self, kind: ViolationKind) {
        Self::inc(&self.violations);
        let per_kind = match kind {
            ViolationKind::NullArgument => &self.null_arguments,
            ViolationKind::ZeroLength => &self.zero_lengths,
            ViolationKind::LengthExceedsBound => &self.length_violations,
            ViolationKind::Overlap => &self.overlaps,
            ViolationKind::NoSpace => &self.no_space,
            ViolationKind::InvalidArgument => &self.invalid_arguments,
        };
        Self::inc(per_kind);
    }

    /// Count one finished comparison over `visited` byte pairs.
    pub fn record_compare(&self, visited: usize) {
        Self::inc(&self.compares);
        self.bytes_compared
            .fetch_add(visited as u64, Ordering::Relaxed);
    }

    /// Snapshot all counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validations: Self::get(&self.validations),
            violations: Self::get(&self.violations),
            null_arguments: Self::get(&self.null_arguments),
            zero_lengths: Self::get(&self.zero_lengths),
            length_violations: Self::get(&self.length_violations),
            overlaps: Self::get(&self.overlaps),
            no_space: Self::get(&self.no_space),
            invalid_arguments: Self::get(&self.invalid_arguments),
            handler_invocations: Self::get(&self.handler_invocations),
            compares: Self::get(&self.compares),
            bytes_compared: Self::get(&self.bytes_compared),
            probe_checks: Self::get(&self.probe_checks),
            probe_unknown: Self::get(&self.probe_unknown),
            probe_failures: Self::get(&self.probe_failures),
        }
    }
}

impl Default for MembraneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all membrane counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub validations: u64,
    pub violations: u64,
    pub null_arguments: u64,
    pub zero_lengths: u64,
    pub length_violations: u64,
    pub overlaps: u64,
    pub no_space: u64,
    pub invalid_arguments: u64,
    pub handler_invocations: u64,
    pub compares: u64,
    pub bytes_compared: u64,
    pub probe_checks: u64,
    pub probe_unknown: u64,
    pub probe_failures: u64,
}

static GLOBAL_METRICS: OnceLock<Arc<MembraneMetrics>> = OnceLock::new();

/// Counters shared by every guard bound to the process-wide configuration.
#[must_use]
pub fn global_metrics() -> &'static Arc<MembraneMetrics> {
    GLOBAL_METRICS.get_or_init(|| Arc::new(MembraneMetrics::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let m = MembraneMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn violation_counts_per_kind() {
        let m = MembraneMetrics::new();
        m.record_violation(ViolationKind::NullArgument);
        m.record_violation(ViolationKind::LengthExceedsBound);
        m.record_violation(ViolationKind::LengthExceedsBound);
        let snap = m.snapshot();
        assert_eq!(snap.violations, 3);
        assert_eq!(snap.null_arguments, 1);
        assert_eq!(snap.length_violations, 2);
        assert_eq!(snap.invalid_arguments, 0);
    }

    #[test]
    fn compare_accumulates_bytes() {
        let m = MembraneMetrics::new();
        m.record_compare(3);
        m.record_compare(0);
        let snap = m.snapshot();
        assert_eq!(snap.compares, 2);
        assert_eq!(snap.bytes_compared, 3);
    }
}
