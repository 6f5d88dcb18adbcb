//! Runtime configuration and pointer registration from C.
//!
//! These are startup-time calls. The ceilings and mode are process-wide and
//! apply to every later guarded call.

use std::ffi::{CStr, c_char, c_int, c_void};

use boundlibc_membrane::SafetyLevel;
use boundlibc_membrane::config::{
    rsize_max_mem, rsize_max_str, safety_level, set_rsize_max_mem, set_rsize_max_str,
    set_safety_level,
};
use boundlibc_membrane::errno::{EINVAL, EOK};
use boundlibc_membrane::registry::global_registry;

use crate::{errno_t, rsize_t};

/// Current `RSIZE_MAX_MEM`.
#[unsafe(no_mangle)]
pub extern "C" fn boundlibc_rsize_max_mem() -> rsize_t {
    rsize_max_mem()
}

/// Current `RSIZE_MAX_STR`.
#[unsafe(no_mangle)]
pub extern "C" fn boundlibc_rsize_max_str() -> rsize_t {
    rsize_max_str()
}

/// Set `RSIZE_MAX_MEM`. `EINVAL` for zero.
#[unsafe(no_mangle)]
pub extern "C" fn boundlibc_set_rsize_max_mem(value: rsize_t) -> errno_t {
    set_rsize_max_mem(value).map_or(EINVAL, |_| EOK)
}

/// Set `RSIZE_MAX_STR`. `EINVAL` for zero.
#[unsafe(no_mangle)]
pub extern "C" fn boundlibc_set_rsize_max_str(value: rsize_t) -> errno_t {
    set_rsize_max_str(value).map_or(EINVAL, |_| EOK)
}

/// Name of the current runtime mode as a static string.
#[unsafe(no_mangle)]
pub extern "C" fn boundlibc_mode() -> *const c_char {
    let name = match safety_level() {
        SafetyLevel::Strict => c"strict",
        SafetyLevel::Hardened => c"hardened",
        SafetyLevel::Off => c"off",
    };
    name.as_ptr()
}

/// Switch the runtime mode by name (`strict`, `hardened`, `off`).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn boundlibc_set_mode(name: *const c_char) -> errno_t {
    if name.is_null() {
        return EINVAL;
    }
    // SAFETY: non-null name is a NUL-terminated string from the caller.
    let Ok(name) = unsafe { CStr::from_ptr(name) }.to_str() else {
        return EINVAL;
    };
    set_safety_level(SafetyLevel::from_str_loose(name));
    EOK
}

/// Track `[ptr, ptr + len)` so calls with unknown capacity can be checked
/// against the real size of the allocation.
#[unsafe(no_mangle)]
pub extern "C" fn boundlibc_register_allocation(ptr: *const c_void, len: usize) -> errno_t {
    if ptr.is_null() {
        return EINVAL;
    }
    global_registry().register(ptr as usize, len);
    EOK
}

/// Forget the allocation starting at `ptr`. Returns 1 if it was tracked.
#[unsafe(no_mangle)]
pub extern "C" fn boundlibc_unregister_allocation(ptr: *const c_void) -> c_int {
    c_int::from(global_registry().unregister(ptr as usize))
}
