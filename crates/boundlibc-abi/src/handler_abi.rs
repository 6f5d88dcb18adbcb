//! C registration of constraint handlers.
//!
//! A C handler has the `_s` family signature
//! `void handler(const char *msg, void *ptr, errno_t error)`. It is wrapped
//! in a [`CHandler`] and installed in the membrane's slot for its family.
//! Passing NULL restores the environment-selected default.
//!
//! The setter returns the previously installed C handler, or NULL when the
//! previous handler was a built-in or was installed from Rust.

use std::ffi::{CStr, CString, c_char, c_void};
use std::io::Write;
use std::sync::Arc;

use boundlibc_membrane::handler::global_handlers;
use boundlibc_membrane::{ConstraintHandler, ConstraintViolation, HandlerFamily, HandlerRef};
use parking_lot::Mutex;

use crate::errno_t;

/// `constraint_handler_t`.
pub type ConstraintHandlerFn = unsafe extern "C" fn(*const c_char, *mut c_void, errno_t);

/// Adapter running a C callback as a membrane handler.
pub struct CHandler {
    callback: ConstraintHandlerFn,
}

impl CHandler {
    #[must_use]
    pub fn new(callback: ConstraintHandlerFn) -> Self {
        Self { callback }
    }
}

impl ConstraintHandler for CHandler {
    fn handle(&self, violation: &ConstraintViolation) {
        let msg = CString::new(violation.to_string()).unwrap_or_default();
        // SAFETY: the callback was registered by the C caller with this signature;
        // msg outlives the call.
        unsafe {
            (self.callback)(
                msg.as_ptr(),
                violation.addr as *mut c_void,
                violation.code(),
            );
        }
    }
}

/// The handler last installed from C for one family, with the slot entry it became.
type Installed = Option<(HandlerRef, ConstraintHandlerFn)>;

static MEM_INSTALLED: Mutex<Installed> = Mutex::new(None);
static STR_INSTALLED: Mutex<Installed> = Mutex::new(None);

fn installed(family: HandlerFamily) -> &'static Mutex<Installed> {
    match family {
        HandlerFamily::Mem => &MEM_INSTALLED,
        HandlerFamily::Str => &STR_INSTALLED,
    }
}

/// Swap the slot of `family` and report the previous C handler, if any.
pub fn install_c_handler(
    family: HandlerFamily,
    handler: Option<ConstraintHandlerFn>,
) -> Option<ConstraintHandlerFn> {
    let slot = global_handlers(family);
    let mut record = installed(family).lock();
    let (previous, next) = match handler {
        Some(callback) => {
            let wrapped: HandlerRef = Arc::new(CHandler::new(callback));
            (slot.replace(Arc::clone(&wrapped)), Some((wrapped, callback)))
        }
        None => (slot.reset(), None),
    };
    let previous_c = record
        .take()
        .filter(|(wrapped, _)| std::ptr::addr_eq(Arc::as_ptr(wrapped), Arc::as_ptr(&previous)))
        .map(|(_, callback)| callback);
    *record = next;
    previous_c
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn set_mem_constraint_handler_s(
    handler: Option<ConstraintHandlerFn>,
) -> Option<ConstraintHandlerFn> {
    install_c_handler(HandlerFamily::Mem, handler)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn set_str_constraint_handler_s(
    handler: Option<ConstraintHandlerFn>,
) -> Option<ConstraintHandlerFn> {
    install_c_handler(HandlerFamily::Str, handler)
}

/// Built-in handler that does nothing.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ignore_handler_s(
    _msg: *const c_char,
    _ptr: *mut c_void,
    _error: errno_t,
) {
}

/// Built-in handler that prints the message and aborts.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn abort_handler_s(msg: *const c_char, _ptr: *mut c_void, error: errno_t) {
    let text = if msg.is_null() {
        std::borrow::Cow::Borrowed("(null)")
    } else {
        // SAFETY: a non-null msg is a NUL-terminated string from the caller.
        unsafe { CStr::from_ptr(msg) }.to_string_lossy()
    };
    let _ = writeln!(std::io::stderr(), "abort_handler_s: {text} (error {error})");
    // SAFETY: abort never returns and takes no arguments.
    unsafe { libc::abort() }
}
