//! Constraint membrane for boundlibc.
//!
//! Every guarded memory/string operation passes through this crate before it
//! touches a byte. The membrane turns "length exceeds buffer capacity",
//! "required pointer is null" and "dangerous directive in data" from
//! undefined behavior into reportable violations.
//!
//! # Architecture
//!
//! - **Error taxonomy** (`errno`): violation kinds, the violation record and
//!   the `errno_t` codes used at the C boundary
//! - **Bounds oracle** (`bounds`): validates lengths against declared
//!   capacities or the global ceiling, destination before source
//! - **Constraint handlers** (`handler`): pluggable callbacks, one
//!   process-wide slot per family
//! - **Guard** (`guard`): the service guarded operations call into
//! - **Bounds probes** (`registry`): optional best-effort pointer-bounds facts
//! - **Configuration** (`config`): runtime mode and length ceilings
//! - **Metrics** (`metrics`): atomic counters for observability

#![deny(unsafe_code)]

pub mod bounds;
pub mod config;
pub mod errno;
pub mod guard;
pub mod handler;
pub mod metrics;
pub mod registry;

pub use bounds::{BoundsOracle, BufferFacts};
pub use config::SafetyLevel;
pub use errno::{BufferRole, ConstraintViolation, Guarded, ViolationKind};
pub use guard::ConstraintGuard;
pub use handler::{ConstraintHandler, HandlerFamily, HandlerRef, RecordingHandler};
pub use metrics::{MembraneMetrics, MetricsSnapshot};
pub use registry::{BoundsProbe, PointerRegistry};
