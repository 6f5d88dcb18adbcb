//! Length validation against known capacities and the global ceiling.
//!
//! Rules, in order, for one buffer:
//! 1. a null buffer is a `NullArgument` violation;
//! 2. with a declared capacity, `n > capacity` exceeds the bound;
//!    without one, `n > ceiling` does;
//! 3. a known addressable extent (a slice length) is enforced like a capacity;
//! 4. an optional pointer-bounds probe may catch what the caller did not
//!    declare. No information from the probe is not a failure.
//!
//! Destination is validated before source and the first violation stops
//! validation for the call.

use crate::config::SafetyLevel;
use crate::errno::{BufferRole, ConstraintViolation, Guarded, ViolationKind};
use crate::metrics::MembraneMetrics;
use crate::registry::BoundsProbe;

/// What the membrane knows about one buffer argument for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFacts {
    /// Parameter name used in violation reasons (`b1`, `dest`, ...).
    pub param: &'static str,
    pub role: BufferRole,
    /// Buffer address; `None` for a null pointer.
    pub addr: Option<usize>,
    /// Declared capacity; `None` when unknown.
    pub capacity: Option<usize>,
    /// Addressable extent known with certainty.
    pub extent: Option<usize>,
}

impl BufferFacts {
    #[must_use]
    pub const fn new(param: &'static str, role: BufferRole, addr: Option<usize>) -> Self {
        Self {
            param,
            role,
            addr,
            capacity: None,
            extent: None,
        }
    }

    #[must_use]
    pub const fn dest(param: &'static str, addr: Option<usize>) -> Self {
        Self::new(param, BufferRole::Dest, addr)
    }

    #[must_use]
    pub const fn src(param: &'static str, addr: Option<usize>) -> Self {
        Self::new(param, BufferRole::Src, addr)
    }

    #[must_use]
    pub const fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_extent(mut self, extent: usize) -> Self {
        self.extent = Some(extent);
        self
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.addr.is_none()
    }
}

/// Stateless length validator for one call.
pub struct BoundsOracle<'a> {
    ceiling: usize,
    level: SafetyLevel,
    probe: Option<&'a dyn BoundsProbe>,
    metrics: &'a MembraneMetrics,
}

impl<'a> BoundsOracle<'a> {
    #[must_use]
    pub fn new(
        ceiling: usize,
        level: SafetyLevel,
        probe: Option<&'a dyn BoundsProbe>,
        metrics: &'a MembraneMetrics,
    ) -> Self {
        Self {
            ceiling,
            level,
            probe,
            metrics,
        }
    }

    #[must_use]
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Fail with `NullArgument` if the buffer is absent; otherwise its address.
    pub fn require_present(&self, op: &'static str, facts: &BufferFacts) -> Guarded<usize> {
        facts.addr.ok_or_else(|| {
            ConstraintViolation::new(
                op,
                ViolationKind::NullArgument,
                format!("{} is null", facts.param),
            )
            .at(facts.role, 0)
        })
    }

    /// Validate a length named `what` against one buffer.
    pub fn validate_len(
        &self,
        op: &'static str,
        what: &'static str,
        n: usize,
        facts: &BufferFacts,
    ) -> Guarded<()> {
        MembraneMetrics::inc(&self.metrics.validations);
        let addr = self.require_present(op, facts)?;
        let exceeds = |bound: &str| {
            Err(ConstraintViolation::new(
                op,
                ViolationKind::LengthExceedsBound,
                format!("{what} exceeds {bound}"),
            )
            .at(facts.role, addr))
        };

        match facts.capacity {
            Some(capacity) if n > capacity => return exceeds(facts.param),
            None if n > self.ceiling => return exceeds("max"),
            _ => {}
        }
        if let Some(extent) = facts.extent
            && n > extent
        {
            return exceeds(facts.param);
        }
        if n > 0 && self.should_probe(facts) {
            self.probe_extent(addr, n)
                .map_or(Ok(()), |_| exceeds(facts.param))?;
        }
        Ok(())
    }

    /// Validate `n` against one buffer.
    pub fn validate(&self, op: &'static str, n: usize, facts: &BufferFacts) -> Guarded<()> {
        self.validate_len(op, "n", n, facts)
    }

    /// Validate `n` against a destination then a source buffer.
    pub fn validate_pair(
        &self,
        op: &'static str,
        n: usize,
        dest: &BufferFacts,
        src: &BufferFacts,
    ) -> Guarded<()> {
        self.validate(op, n, dest)?;
        self.validate(op, n, src)
    }

    fn should_probe(&self, facts: &BufferFacts) -> bool {
        self.probe.is_some()
            && self.level.probe_enabled()
            && (facts.capacity.is_none() || self.level.probe_known_capacity())
    }

    /// Some(remaining) when the probe proves `n` overruns the region.
    fn probe_extent(&self, addr: usize, n: usize) -> Option<usize> {
        let probe = self.probe?;
        MembraneMetrics::inc(&self.metrics.probe_checks);
        match probe.remaining(addr) {
            Some(remaining) if n > remaining => {
                MembraneMetrics::inc(&self.metrics.probe_failures);
                Some(remaining)
            }
            Some(_) => None,
            None => {
                MembraneMetrics::inc(&self.metrics.probe_unknown);
                None
            }
        }
    }
}
