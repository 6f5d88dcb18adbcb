//! Pluggable constraint handlers.
//!
//! Every detected violation is reported synchronously to exactly one active
//! handler. Two process-wide slots exist, one for the memory family and one
//! for the string family. Replacing a handler is startup-time configuration.
//!
//! The slot lock is held only long enough to clone the active `Arc`; the
//! handler itself always runs unlocked, so a handler may re-register or
//! call guarded functions without deadlocking.
//!
//! Whatever a handler does, the guarded call still returns its violation.

use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};

use crate::config::{DefaultHandlerKind, default_handler_kind};
use crate::errno::ConstraintViolation;

/// Callback invoked on every constraint violation.
pub trait ConstraintHandler: Send + Sync {
    fn handle(&self, violation: &ConstraintViolation);
}

impl<F> ConstraintHandler for F
where
    F: Fn(&ConstraintViolation) + Send + Sync,
{
    fn handle(&self, violation: &ConstraintViolation) {
        self(violation);
    }
}

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn ConstraintHandler>;

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct IgnoreHandler;

impl ConstraintHandler for IgnoreHandler {
    fn handle(&self, _violation: &ConstraintViolation) {}
}

/// Writes one diagnostic line to stderr and returns.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl ConstraintHandler for LogHandler {
    fn handle(&self, violation: &ConstraintViolation) {
        eprintln!("{}", diagnostic_line(violation));
    }
}

/// Writes one diagnostic line to stderr and aborts the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct AbortHandler;

impl ConstraintHandler for AbortHandler {
    fn handle(&self, violation: &ConstraintViolation) {
        eprintln!("{}", diagnostic_line(violation));
        std::process::abort();
    }
}

/// Keeps every violation it sees. Used by contract tests.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<ConstraintViolation>>,
}

impl RecordingHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of invocations so far.
    #[must_use]
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Most recent violation.
    #[must_use]
    pub fn last(&self) -> Option<ConstraintViolation> {
        self.events.lock().last().cloned()
    }

    /// Drain everything recorded.
    pub fn take(&self) -> Vec<ConstraintViolation> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl ConstraintHandler for RecordingHandler {
    fn handle(&self, violation: &ConstraintViolation) {
        self.events.lock().push(violation.clone());
    }
}

fn diagnostic_line(violation: &ConstraintViolation) -> String {
    format!(
        "boundlibc: constraint violation: {violation} [{} {}] addr={:#x}",
        violation.kind.name(),
        violation.code(),
        violation.addr,
    )
}

/// Build the built-in handler for `kind`.
#[must_use]
pub fn builtin_handler(kind: DefaultHandlerKind) -> HandlerRef {
    match kind {
        DefaultHandlerKind::Log => Arc::new(LogHandler),
        DefaultHandlerKind::Abort => Arc::new(AbortHandler),
        DefaultHandlerKind::Ignore => Arc::new(IgnoreHandler),
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Which process-wide handler slot an operation reports to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerFamily {
    Mem,
    Str,
}

/// One replaceable handler slot.
pub struct HandlerRegistry {
    active: RwLock<HandlerRef>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new(handler: HandlerRef) -> Self {
        Self {
            active: RwLock::new(handler),
        }
    }

    /// Slot initialised from `BOUNDLIBC_CONSTRAINT_HANDLER`.
    #[must_use]
    pub fn with_default() -> Self {
        Self::new(builtin_handler(default_handler_kind()))
    }

    /// Currently active handler.
    #[must_use]
    pub fn current(&self) -> HandlerRef {
        Arc::clone(&*self.active.read())
    }

    /// Install `handler`, returning the one it replaced.
    pub fn replace(&self, handler: HandlerRef) -> HandlerRef {
        std::mem::replace(&mut *self.active.write(), handler)
    }

    /// Restore the environment-selected default, returning the replaced handler.
    pub fn reset(&self) -> HandlerRef {
        self.replace(builtin_handler(default_handler_kind()))
    }

    /// Invoke the active handler synchronously.
    pub fn invoke(&self, violation: &ConstraintViolation) {
        let handler = self.current();
        handler.handle(violation);
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry").finish_non_exhaustive()
    }
}

static MEM_HANDLERS: OnceLock<HandlerRegistry> = OnceLock::new();
static STR_HANDLERS: OnceLock<HandlerRegistry> = OnceLock::new();

/// Process-wide slot for `family`.
#[must_use]
pub fn global_handlers(family: HandlerFamily) -> &'static HandlerRegistry {
    match family {
        HandlerFamily::Mem => MEM_HANDLERS.get_or_init(HandlerRegistry::with_default),
        HandlerFamily::Str => STR_HANDLERS.get_or_init(HandlerRegistry::with_default),
    }
}

/// Install the memory-family handler. Returns the previous one.
pub fn set_mem_constraint_handler(handler: HandlerRef) -> HandlerRef {
    global_handlers(HandlerFamily::Mem).replace(handler)
}

/// Install the string-family handler. Returns the previous one.
pub fn set_str_constraint_handler(handler: HandlerRef) -> HandlerRef {
    global_handlers(HandlerFamily::Str).replace(handler)
}

/// Report `violation` to the process-wide handler of `family`.
pub fn invoke_constraint_handler(family: HandlerFamily, violation: &ConstraintViolation) {
    global_handlers(family).invoke(violation);
}
