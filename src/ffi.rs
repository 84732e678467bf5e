//! FFI bindings for beatmark
//!
//! C-compatible entry points taking and returning null-terminated JSON
//! strings. Returned strings are allocated by Rust and must be released with
//! `biomark_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::engine::compute_report_json;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Compute biomarkers and return the JSON report.
///
/// # Safety
/// - `config_json` and `recordings_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `biomark_free_string`.
/// - Returns NULL on error; call `biomark_last_error` for the message.
#[no_mangle]
pub unsafe extern "C" fn biomark_compute_json(
    config_json: *const c_char,
    recordings_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some(config) = cstr_to_str(config_json) else {
        set_last_error("Invalid configuration string pointer");
        return ptr::null_mut();
    };
    let Some(recordings) = cstr_to_str(recordings_json) else {
        set_last_error("Invalid recordings string pointer");
        return ptr::null_mut();
    };

    match compute_report_json(config, recordings) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by a beatmark function.
///
/// # Safety
/// - `ptr` must be a pointer returned by a beatmark function, or NULL.
/// - The pointer is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn biomark_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Last error message on this thread.
///
/// # Safety
/// - Valid until the next beatmark call on this thread. Do NOT free.
/// - NULL if the last call succeeded.
#[no_mangle]
pub unsafe extern "C" fn biomark_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn biomark_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
