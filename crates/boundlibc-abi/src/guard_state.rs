//! Process-wide guard used by every C entry point.
//!
//! It follows the global configuration on each call (ceiling, mode and the
//! memory handler slot) and consults the process-wide pointer registry as
//! its bounds probe.

use std::sync::{Arc, OnceLock};

use boundlibc_membrane::registry::global_registry;
use boundlibc_membrane::{BoundsProbe, ConstraintGuard};

static MEM_GUARD: OnceLock<ConstraintGuard> = OnceLock::new();

pub(crate) fn mem_guard() -> &'static ConstraintGuard {
    MEM_GUARD.get_or_init(|| {
        let probe: Arc<dyn BoundsProbe> = global_registry().clone();
        ConstraintGuard::mem().probe_with(probe)
    })
}
