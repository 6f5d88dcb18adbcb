//! The validator service every guarded operation runs through.
//!
//! A [`ConstraintGuard`] bundles the four things a guarded call needs: a
//! length ceiling, a runtime mode, an optional bounds probe and a handler to
//! report to. Each may be injected or left to follow process-wide
//! configuration. The guard itself holds no per-call state.

use std::sync::Arc;

use crate::bounds::{BoundsOracle, BufferFacts};
use crate::config::{SafetyLevel, rsize_max_mem, rsize_max_str, safety_level};
use crate::errno::{ConstraintViolation, Guarded, ViolationKind};
use crate::handler::{HandlerFamily, HandlerRef, global_handlers};
use crate::metrics::{MembraneMetrics, global_metrics};
use crate::registry::BoundsProbe;

/// Injected-or-global validation and reporting policy.
#[derive(Clone)]
pub struct ConstraintGuard {
    family: HandlerFamily,
    handler: Option<HandlerRef>,
    ceiling: Option<usize>,
    level: Option<SafetyLevel>,
    probe: Option<Arc<dyn BoundsProbe>>,
    metrics: Arc<MembraneMetrics>,
}

impl ConstraintGuard {
    /// Guard that follows process-wide configuration for `family`.
    #[must_use]
    pub fn global(family: HandlerFamily) -> Self {
        Self {
            family,
            handler: None,
            ceiling: None,
            level: None,
            probe: None,
            metrics: Arc::clone(global_metrics()),
        }
    }

    /// Guard for memory operations under process-wide configuration.
    #[must_use]
    pub fn mem() -> Self {
        Self::global(HandlerFamily::Mem)
    }

    /// Guard for string and formatted-output operations under process-wide configuration.
    #[must_use]
    pub fn str() -> Self {
        Self::global(HandlerFamily::Str)
    }

    /// Guard with an injected handler and its own counters.
    #[must_use]
    pub fn with_handler(family: HandlerFamily, handler: HandlerRef) -> Self {
        Self {
            family,
            handler: Some(handler),
            ceiling: None,
            level: None,
            probe: None,
            metrics: Arc::new(MembraneMetrics::new()),
        }
    }

    /// Fix the length ceiling instead of reading the global one.
    #[must_use]
    pub fn ceiling_of(mut self, ceiling: usize) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Fix the runtime mode instead of reading the global one.
    #[must_use]
    pub fn level_of(mut self, level: SafetyLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Consult `probe` for buffers without a declared capacity.
    #[must_use]
    pub fn probe_with(mut self, probe: Arc<dyn BoundsProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Count into `metrics` instead of the current counters.
    #[must_use]
    pub fn metrics_into(mut self, metrics: Arc<MembraneMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    #[must_use]
    pub fn family(&self) -> HandlerFamily {
        self.family
    }

    /// Effective length ceiling for unknown capacities.
    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling.unwrap_or_else(|| match self.family {
            HandlerFamily::Mem => rsize_max_mem(),
            HandlerFamily::Str => rsize_max_str(),
        })
    }

    /// Effective runtime mode.
    #[must_use]
    pub fn level(&self) -> SafetyLevel {
        self.level.unwrap_or_else(safety_level)
    }

    #[must_use]
    pub fn metrics(&self) -> &MembraneMetrics {
        &self.metrics
    }

    /// Length oracle configured for this guard.
    #[must_use]
    pub fn oracle(&self) -> BoundsOracle<'_> {
        BoundsOracle::new(
            self.ceiling(),
            self.level(),
            self.probe.as_deref(),
            &self.metrics,
        )
    }

    /// Count `violation`, hand it to the handler, and give it back.
    pub fn report(&self, violation: ConstraintViolation) -> ConstraintViolation {
        self.metrics.record_violation(violation.kind);
        MembraneMetrics::inc(&self.metrics.handler_invocations);
        match &self.handler {
            Some(handler) => handler.handle(&violation),
            None => global_handlers(self.family).invoke(&violation),
        }
        violation
    }

    /// Report `violation` and return it as the call's outcome.
    pub fn fail<T>(&self, violation: ConstraintViolation) -> Guarded<T> {
        Err(self.report(violation))
    }

    /// Null check alone; returns the buffer address.
    pub fn require_present(&self, op: &'static str, facts: &BufferFacts) -> Guarded<usize> {
        self.oracle()
            .require_present(op, facts)
            .map_err(|v| self.report(v))
    }

    /// Validate a length named `what` against one buffer.
    pub fn check_len(
        &self,
        op: &'static str,
        what: &'static str,
        n: usize,
        facts: &BufferFacts,
    ) -> Guarded<()> {
        self.oracle()
            .validate_len(op, what, n, facts)
            .map_err(|v| self.report(v))
    }

    /// Validate `n` against one buffer.
    pub fn check(&self, op: &'static str, n: usize, facts: &BufferFacts) -> Guarded<()> {
        self.check_len(op, "n", n, facts)
    }

    /// Fail with `ZeroLength` when `n` is zero.
    pub fn check_nonzero(
        &self,
        op: &'static str,
        what: &'static str,
        n: usize,
        facts: &BufferFacts,
    ) -> Guarded<()> {
        if n != 0 {
            return Ok(());
        }
        let v = ConstraintViolation::new(op, ViolationKind::ZeroLength, format!("{what} is 0"))
            .at(facts.role, facts.addr.unwrap_or(0));
        self.fail(v)
    }

    /// Fail with `NoSpace` when `needed` does not fit in `room`.
    pub fn check_room(
        &self,
        op: &'static str,
        (needed_what, needed): (&'static str, usize),
        (room_what, room): (&'static str, usize),
        facts: &BufferFacts,
    ) -> Guarded<()> {
        if needed <= room {
            return Ok(());
        }
        let v = ConstraintViolation::new(
            op,
            ViolationKind::NoSpace,
            format!("{needed_what} exceeds {room_what}"),
        )
        .at(facts.role, facts.addr.unwrap_or(0));
        self.fail(v)
    }

    /// Validate `n` against destination then source.
    pub fn check_pair(
        &self,
        op: &'static str,
        n: usize,
        dest: &BufferFacts,
        src: &BufferFacts,
    ) -> Guarded<()> {
        self.oracle()
            .validate_pair(op, n, dest, src)
            .map_err(|v| self.report(v))
    }
}

impl std::fmt::Debug for ConstraintGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintGuard")
            .field("family", &self.family)
            .field("injected_handler", &self.handler.is_some())
            .field("ceiling", &self.ceiling)
            .field("level", &self.level)
            .field("probe", &self.probe.is_some())
            .finish()
    }
}
