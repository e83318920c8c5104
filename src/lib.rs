//! # Post Engagement Core
//!
//! A local-first engagement storage library for blog-style sites: per-post
//! like counters, visitor comments and share analytics persisted in an
//! embedded key-value store (sled), with a C-compatible FFI surface so host
//! UI layers (webviews, Flutter shells, native wrappers) can drive it the
//! same way a page script drives browser storage.
//!
//! ## Features
//!
//! - **Per-post records**: one interaction record, one comment list and one
//!   share-stats record per post key; all created lazily, persisted on
//!   every mutation, never deleted.
//! - **Legacy migration**: pre-per-post global like keys are promoted into
//!   a per-post record exactly once and then removed.
//! - **Input discipline**: a per-post cooldown absorbs rapid like toggles
//!   and a single-flight guard ignores overlapping share actions.
//! - **Best-effort enrichment**: baseline like counts and listing images
//!   come from a static post catalog; any fetch failure degrades to "no
//!   enrichment" and never blocks the caller.
//! - **Safe error handling**: storage failures are logged and swallowed at
//!   the adapter boundary; no `unwrap()` calls in production code.
//!
//! ## Quick Start
//!
//! ```no_run
//! use post_engagement_core::{create_store, toggle_like, free_response_string};
//! use std::ffi::CString;
//!
//! let name = CString::new("engagement_store").unwrap();
//! let state = create_store(name.as_ptr());
//!
//! let page = CString::new("/pages/hello-world").unwrap();
//! let response = toggle_like(state, page.as_ptr());
//! free_response_string(response as *mut _);
//! ```
//!
//! ## FFI Functions
//!
//! All functions except [`create_store`] and [`free_response_string`]
//! return a JSON-encoded [`AppResponse`] as a C string the caller must
//! release with [`free_response_string`]:
//!
//! - [`create_store`] / [`close_store`] - store lifecycle
//! - [`load_interactions`] / [`toggle_like`] / [`seed_interactions`] - likes
//! - [`get_comments`] / [`add_comment`] - comments
//! - [`record_share_attempt`] / [`record_share_success`] /
//!   [`record_clipboard_fallback`] - share counters
//! - [`begin_share`] / [`finish_share`] - single-flight share actions
//! - [`fetch_post_catalog`] - listing data with image enrichment

pub mod catalog;
pub mod engagement_model;
pub mod engagement_state;
mod app_response;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde::Serialize;

pub use crate::app_response::AppResponse;
use crate::catalog::CatalogClient;
use crate::engagement_model::ShareOutcome;
use crate::engagement_state::AppEngagementState;

/// Opens (or creates) the engagement store at the given path.
///
/// # Parameters
///
/// * `name` - A null-terminated C string with the store path
///
/// # Returns
///
/// A pointer to the [`AppEngagementState`] instance on success, or null on
/// failure. The caller owns the pointer and passes it to every other
/// function; [`close_store`] flushes it before the host drops its handle.
///
/// # Safety
///
/// `name` must point to a valid null-terminated UTF-8 string.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(name: *const c_char) -> *mut AppEngagementState {
    if name.is_null() {
        warn!("Null name pointer passed to create_store");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in store name: {e}");
            return std::ptr::null_mut();
        }
    };

    info!("Opening engagement store at: {name_str}");

    match AppEngagementState::init(name_str.to_string()) {
        Ok(state) => {
            info!("✅ Engagement store ready");
            Box::into_raw(Box::new(state))
        }
        Err(e) => {
            warn!("❌ Failed to open engagement store at '{name_str}': {e}");
            std::ptr::null_mut()
        }
    }
}

/// Loads the interaction record for a post.
///
/// Runs the one-shot legacy migration if the per-post record is absent and
/// the old global like keys are still present. Returns the record as JSON
/// inside an `Ok` response.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn load_interactions(
    state: *mut AppEngagementState,
    page_path: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "load_interactions") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let page_path = match c_ptr_to_string(page_path, "page_path") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let record = state.load_interactions(&page_path);
    response_to_c_string(&ok_json(&record))
}

/// Toggles the like state for a post and persists the result.
///
/// Liking increments the counter by one, unliking decrements it (clamped
/// at zero). A call landing inside the cooldown window of the previous one
/// is rejected with a `ValidationError` response and changes nothing.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn toggle_like(
    state: *mut AppEngagementState,
    page_path: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "toggle_like") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let page_path = match c_ptr_to_string(page_path, "page_path") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match state.toggle_like(&page_path) {
        Ok(record) => response_to_c_string(&ok_json(&record)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Seeds a fresh interaction record from the post catalog.
///
/// Fetches the catalog from `base_url` and, when the post's record still
/// has zero likes and was not migrated, persists the catalog's baseline
/// count once. A failed fetch is logged and the record is returned
/// unchanged; enrichment never blocks initialization.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn seed_interactions(
    state: *mut AppEngagementState,
    page_path: *const c_char,
    base_url: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "seed_interactions") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let page_path = match c_ptr_to_string(page_path, "page_path") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let base_url = match c_ptr_to_string(base_url, "base_url") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let catalog = match CatalogClient::new(base_url).fetch_catalog() {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("Catalog enrichment skipped: {e}");
            Vec::new()
        }
    };
    let record = state.seed_from_catalog(&page_path, &catalog);
    response_to_c_string(&ok_json(&record))
}

/// Returns a post's comments as a JSON array, oldest first. Absent or
/// malformed stored data reads as an empty array.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_comments(
    state: *mut AppEngagementState,
    page_path: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "get_comments") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let page_path = match c_ptr_to_string(page_path, "page_path") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let comments = state.comments(&page_path);
    response_to_c_string(&ok_json(&comments))
}

/// Appends a comment to a post.
///
/// `name` and `text` are trimmed; if either is empty the comment is
/// rejected with a `ValidationError` response and nothing is persisted.
/// On success the stored entry (with its assigned id and date) comes back
/// as JSON for immediate display.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_comment(
    state: *mut AppEngagementState,
    page_path: *const c_char,
    name: *const c_char,
    text: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "add_comment") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let page_path = match c_ptr_to_string(page_path, "page_path") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let name = match c_ptr_to_string(name, "name") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let text = match c_ptr_to_string(text, "text") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match state.add_comment(&page_path, &name, &text) {
        Ok(entry) => response_to_c_string(&ok_json(&entry)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Counts a share attempt for a post and stamps its `lastAttempt`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn record_share_attempt(
    state: *mut AppEngagementState,
    page_path: *const c_char,
) -> *const c_char {
    share_counter(state, page_path, "record_share_attempt", |s, p| {
        s.record_share_attempt(p)
    })
}

/// Counts a completed native share for a post.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn record_share_success(
    state: *mut AppEngagementState,
    page_path: *const c_char,
) -> *const c_char {
    share_counter(state, page_path, "record_share_success", |s, p| {
        s.record_share_success(p)
    })
}

/// Counts a copy-link fallback for a post. Tracked as its own success
/// channel, separate from native share successes.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn record_clipboard_fallback(
    state: *mut AppEngagementState,
    page_path: *const c_char,
) -> *const c_char {
    share_counter(state, page_path, "record_clipboard_fallback", |s, p| {
        s.record_clipboard_fallback(p)
    })
}

/// Starts a share action for a post.
///
/// At most one share per post is in flight at a time; while one is, this
/// returns a `ValidationError` response and the click should be dropped.
/// On admission the attempt is recorded and the updated stats returned.
/// Every admitted share must be resolved with [`finish_share`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn begin_share(
    state: *mut AppEngagementState,
    page_path: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "begin_share") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let page_path = match c_ptr_to_string(page_path, "page_path") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match state.begin_share(&page_path) {
        Some(stats) => response_to_c_string(&ok_json(&stats)),
        None => {
            let busy = AppResponse::ValidationError(format!(
                "A share for '{page_path}' is already in flight"
            ));
            response_to_c_string(&busy)
        }
    }
}

/// Resolves an in-flight share action.
///
/// `action` names the terminal state: `"success"` for a completed native
/// share, `"clipboard"` for the copy-link fallback, `"abandoned"` when the
/// viewer cancelled the dialog (which keeps the attempt but counts no
/// success and must not trigger the fallback). Unknown actions are
/// rejected as `BadRequest`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn finish_share(
    state: *mut AppEngagementState,
    page_path: *const c_char,
    action: *const c_char,
) -> *const c_char {
    let state = match state_ref(state, "finish_share") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let page_path = match c_ptr_to_string(page_path, "page_path") {
        Ok(s) => s,
        Err(err) => return err,
    };
    let action = match c_ptr_to_string(action, "action") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let Some(outcome) = ShareOutcome::from_action(&action) else {
        let error = AppResponse::BadRequest(format!("Unknown share action: '{action}'"));
        return response_to_c_string(&error);
    };

    let stats = state.finish_share(&page_path, outcome);
    response_to_c_string(&ok_json(&stats))
}

/// Fetches the post catalog from `base_url` and fills in missing listing
/// images with a best-effort probe of each post page.
///
/// Returns the enriched catalog as a JSON array, or a `NetworkError` /
/// `SerializationError` response when the catalog itself is unreachable
/// or malformed. Individual image probes fail silently.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn fetch_post_catalog(base_url: *const c_char) -> *const c_char {
    let base_url = match c_ptr_to_string(base_url, "base_url") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let client = CatalogClient::new(base_url);
    match client.fetch_catalog() {
        Ok(mut posts) => {
            client.enrich_images(&mut posts);
            response_to_c_string(&ok_json(&posts))
        }
        Err(e) => response_to_c_string(&e),
    }
}

/// Flushes pending writes.
///
/// The store itself closes when the host drops its handle; this is the
/// explicit signal that the pointer should no longer be used, which
/// matters for hosts with hot-restart semantics.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(state: *mut AppEngagementState) -> *const c_char {
    let state = match state_ref(state, "close_store") {
        Ok(s) => s,
        Err(err) => return err,
    };

    match state.close() {
        Ok(()) => response_to_c_string(&AppResponse::success("Engagement store flushed and closed")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Releases a response string previously returned by this library.
///
/// # Safety
///
/// `ptr` must be a pointer returned by one of the FFI functions above and
/// must not be used afterwards. Null is accepted and ignored.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(ptr));
    }
}

/// Shared body of the three share-counter endpoints.
fn share_counter<F>(
    state: *mut AppEngagementState,
    page_path: *const c_char,
    caller: &str,
    op: F,
) -> *const c_char
where
    F: FnOnce(&AppEngagementState, &str) -> crate::engagement_model::ShareStats,
{
    let state = match state_ref(state, caller) {
        Ok(s) => s,
        Err(err) => return err,
    };
    let page_path = match c_ptr_to_string(page_path, "page_path") {
        Ok(s) => s,
        Err(err) => return err,
    };

    let stats = op(state, &page_path);
    response_to_c_string(&ok_json(&stats))
}

/// Serializes a value into an `Ok` response, or a `SerializationError`
/// when encoding fails.
fn ok_json<T: Serialize>(value: &T) -> AppResponse {
    match serde_json::to_string(value) {
        Ok(json) => AppResponse::Ok(json),
        Err(e) => AppResponse::SerializationError(format!("Failed to serialize result: {e}")),
    }
}

/// Validates and dereferences the state pointer, or produces a
/// `BadRequest` response string for the caller to return.
fn state_ref<'a>(
    state: *mut AppEngagementState,
    caller: &str,
) -> Result<&'a AppEngagementState, *const c_char> {
    match unsafe { state.as_ref() } {
        Some(s) => Ok(s),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

/// Converts an [`AppResponse`] to a C string the FFI caller owns.
///
/// Returns null if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust `String`, rejecting null
/// pointers and invalid UTF-8 with a ready-to-return error response.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
