// SPDX-License-Identifier: GPL-3.0-only
//! Status code translation
//!
//! Zero is success and every other value is an error. Names and descriptions
//! always come from the library's own lookup functions.

use std::os::raw::c_int;

use crate::error::{Result, StatusError};
use crate::ffi::{Api, DdcaStatus};
use crate::marshal;

/// Status codes defined by ddcutil itself, for callers that want to match on
/// a specific failure. Linux errno values are returned negated.
pub mod codes {
    use std::os::raw::c_int;

    pub const OK: c_int = 0;
    pub const NULL_RESPONSE: c_int = -3006;
    pub const REPORTED_UNSUPPORTED: c_int = -3010;
    pub const RETRIES: c_int = -3015;
    pub const DETERMINED_UNSUPPORTED: c_int = -3017;
    pub const ARG: c_int = -3018;
    pub const INVALID_OPERATION: c_int = -3019;
    pub const UNIMPLEMENTED: c_int = -3020;
    pub const UNKNOWN_FEATURE: c_int = -3022;
    pub const INVALID_DISPLAY: c_int = -3025;
    pub const VERIFY: c_int = -3028;
    pub const NOT_FOUND: c_int = -3029;
}

/// Name of `code` as reported by `ddca_rc_name()`
pub fn name(api: &Api, code: c_int) -> Option<String> {
    // SAFETY: ddca_rc_name returns NULL or a static NUL terminated string.
    let ptr = unsafe { (api.ddca_rc_name)(code) };
    unsafe { marshal::lossy_string(ptr) }
}

/// Description of `code` as reported by `ddca_rc_desc()`
pub fn description(api: &Api, code: c_int) -> Option<String> {
    // SAFETY: as for `name`.
    let ptr = unsafe { (api.ddca_rc_desc)(code) };
    unsafe { marshal::lossy_string(ptr) }
}

/// Build the error for a non-zero status
pub fn to_error(api: &Api, code: DdcaStatus, operation: &'static str, context: Option<String>) -> StatusError {
    StatusError {
        code,
        name: name(api, code),
        description: description(api, code),
        operation,
        context,
    }
}

/// Check the status returned by `operation`
pub fn check(api: &Api, code: DdcaStatus, operation: &'static str) -> Result<()> {
    check_with(api, code, operation, || None)
}

/// Like [`check`], attaching the call's arguments to the error
pub fn check_with<F>(api: &Api, code: DdcaStatus, operation: &'static str, context: F) -> Result<()>
where
    F: FnOnce() -> Option<String>,
{
    if code == codes::OK {
        return Ok(());
    }

    let err = to_error(api, code, operation, context());
    debug!(
        operation,
        code,
        name = err.name.as_deref().unwrap_or("?"),
        "libddcutil call failed"
    );
    Err(err.into())
}
