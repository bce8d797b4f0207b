//! Local account lookups through the system user database.

use std::ffi::{CStr, CString};
use std::ptr;

/// Resolve an identifier to its canonical local username via `getpwnam_r`.
///
/// The resolved name is what the rest of the system uses to form per-user
/// paths, so it must agree with the system view even when the identifier
/// arrived in a different spelling.
#[must_use]
pub fn user_from_identifier(identifier: &str) -> Option<String> {
    let Ok(name) = CString::new(identifier) else {
        return None;
    };

    let mut passwd: libc::passwd = unsafe { std::mem::zeroed() };
    let mut buffer = vec![0i8; 16384];
    let mut result: *mut libc::passwd = ptr::null_mut();

    let rc = unsafe {
        libc::getpwnam_r(
            name.as_ptr(),
            &mut passwd,
            buffer.as_mut_ptr().cast::<libc::c_char>(),
            buffer.len(),
            &mut result,
        )
    };
    if rc != 0 || result.is_null() {
        return None;
    }

    let resolved = unsafe { CStr::from_ptr(passwd.pw_name) };
    resolved.to_str().ok().map(str::to_string)
}

/// Whether `username` names an existing local account.
#[must_use]
pub fn user_exists(username: &str) -> bool {
    user_from_identifier(username).is_some()
}
