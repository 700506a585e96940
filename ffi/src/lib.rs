//! C-ABI wrapper around `founderwish-core`.
//!
//! # Overview
//! Exposes session configuration and the board API through `extern "C"`
//! functions so a Swift, Kotlin or C host can build and parse HTTP
//! requests/responses with its own HTTP stack, without linking to Rust's
//! async runtime.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Per-endpoint `build_*` / `parse_*` mirrors `BoardApi` 1:1; the client
//!   handle owns a `SessionStore`, so builders use the configured secret and
//!   `wish_parse_ingest_info` caches the slug for `wish_build_list_public_items`.
//! - A single `FfiWishResult` envelope with `FfiDataTag` + `void* data`
//!   conveys success payloads and errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `wish_free_*` function to release them.
//! - The handle also owns the vote ledger. A host brackets each upvote with
//!   `wish_vote_begin` / `wish_vote_finish` and sends nothing unless the
//!   vote started. The voted set lives in memory; hosts persist it with
//!   `wish_votes_export` and restore it with `wish_votes_import`.

pub mod types;

use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use founderwish_core::{
    BoardApi, FeedbackPayload, MemoryStore, SessionStore, VoteLedger, WishError,
};

use types::*;

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a new, unconfigured client.
///
/// The caller must free the returned pointer with `wish_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn wish_client_new() -> *mut FfiWishClient {
    catch_unwind(|| match VoteLedger::load(Arc::new(MemoryStore::new())) {
        Ok(votes) => Box::into_raw(Box::new(FfiWishClient {
            session: SessionStore::new(),
            votes,
        })),
        Err(_) => std::ptr::null_mut(),
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `wish_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn wish_client_free(client: *mut FfiWishClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Configure the board secret and, optionally, a base URL override (null for
/// the default host). Replaces any previous configuration and profile.
#[unsafe(no_mangle)]
pub extern "C" fn wish_configure(
    client: *const FfiWishClient,
    secret: *const c_char,
    base_url: *const c_char,
) -> *mut FfiWishResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiWishResult::null_arg("client");
        }
        let Some(secret) = read_c_str(secret) else {
            return FfiWishResult::null_arg("secret");
        };
        let client = unsafe { &*client };
        let base_url = read_c_str(base_url);
        match client.session.configure(secret, base_url.as_deref(), None) {
            Ok(()) => FfiWishResult::ok_empty(0),
            Err(e) => FfiWishResult::from_error(e, 0),
        }
    }))
    .unwrap_or_else(|_| FfiWishResult::panic("panic in wish_configure"))
}

/// Merge a profile update into the session's user profile.
#[unsafe(no_mangle)]
pub extern "C" fn wish_merge_profile(
    client: *const FfiWishClient,
    update: *const FfiProfileUpdate,
) -> *mut FfiWishResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiWishResult::null_arg("client");
        }
        if update.is_null() {
            return FfiWishResult::null_arg("update");
        }
        let client = unsafe { &*client };
        let update = unsafe { &*update };
        match update.to_core() {
            Ok(update) => {
                client.session.merge_profile(update);
                FfiWishResult::ok_empty(0)
            }
            Err(msg) => FfiWishResult::invalid_arg(msg),
        }
    }))
    .unwrap_or_else(|_| FfiWishResult::panic("panic in wish_merge_profile"))
}

/// The cached board slug, or null when none is cached yet.
/// The caller must free the returned string with `wish_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn wish_cached_slug(client: *const FfiWishClient) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let slug = client
            .session
            .current_config()
            .ok()
            .and_then(|config| config.cached_board_slug);
        opt_c_string(slug)
    }))
    .unwrap_or(std::ptr::null_mut())
}

fn board_api(client: &FfiWishClient) -> Option<BoardApi> {
    client
        .session
        .current_config()
        .ok()
        .map(|config| BoardApi::new(&config))
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Build the request resolving the board slug.
///
/// Returns null if `client` is null or not configured.
/// The caller must free the returned pointer with `wish_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn wish_build_ingest_info(client: *const FfiWishClient) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match board_api(client) {
            Some(api) => FfiHttpRequest::from_core(api.build_ingest_info()),
            None => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Build the feedback submission request, enriched with `device` and the
/// session's profile.
///
/// Returns null if any argument is null, the client is not configured, the
/// title is empty, or `install_date_unix` is out of range.
#[unsafe(no_mangle)]
pub extern "C" fn wish_build_submit_feedback(
    client: *const FfiWishClient,
    draft: *const FfiFeedbackDraft,
    device: *const FfiDeviceMetadata,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() || draft.is_null() || device.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let draft = unsafe { &*draft }.to_core();
        if draft.title.is_empty() {
            return std::ptr::null_mut();
        }
        let Some(device) = unsafe { &*device }.to_core() else {
            return std::ptr::null_mut();
        };
        let Some(api) = board_api(client) else {
            return std::ptr::null_mut();
        };
        let payload = FeedbackPayload::compose(draft, device, client.session.current_profile());
        match api.build_submit_feedback(&payload) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Build the public item listing request.
///
/// `public_id` may be null to use the cached slug. Returns null if `client`
/// is null, not configured, or no identifier is available.
#[unsafe(no_mangle)]
pub extern "C" fn wish_build_list_public_items(
    client: *const FfiWishClient,
    public_id: *const c_char,
    limit: u32,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let Ok(config) = client.session.current_config() else {
            return std::ptr::null_mut();
        };
        let Some(public_id) = read_c_str(public_id).or(config.cached_board_slug.clone()) else {
            return std::ptr::null_mut();
        };
        match BoardApi::new(&config).build_list_public_items(&public_id, limit as usize) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Build the upvote request for `feedback_id`.
///
/// Returns null if any argument is null or the client is not configured.
#[unsafe(no_mangle)]
pub extern "C" fn wish_build_upvote(
    client: *const FfiWishClient,
    feedback_id: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let Some(feedback_id) = read_c_str(feedback_id) else {
            return std::ptr::null_mut();
        };
        let client = unsafe { &*client };
        let Some(api) = board_api(client) else {
            return std::ptr::null_mut();
        };
        match api.build_upvote(&feedback_id) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Shared null checks and config lookup for the parse functions.
fn with_api(
    client: *const FfiWishClient,
    response: *const FfiHttpResponse,
    f: impl FnOnce(&FfiWishClient, BoardApi, founderwish_core::HttpResponse) -> *mut FfiWishResult,
) -> *mut FfiWishResult {
    if client.is_null() {
        return FfiWishResult::null_arg("client");
    }
    if response.is_null() {
        return FfiWishResult::null_arg("response");
    }
    let client = unsafe { &*client };
    let response = unsafe { &*response }.to_core();
    match board_api(client) {
        Some(api) => f(client, api, response),
        None => FfiWishResult::from_error(WishError::NotConfigured, response.status),
    }
}

/// Parse the slug resolution response and cache the slug on success.
///
/// Returns a result with `data_tag = Slug` on success.
#[unsafe(no_mangle)]
pub extern "C" fn wish_parse_ingest_info(
    client: *const FfiWishClient,
    response: *const FfiHttpResponse,
) -> *mut FfiWishResult {
    catch_unwind(AssertUnwindSafe(|| {
        with_api(client, response, |client, api, resp| {
            let status = resp.status;
            let slug = match api.parse_ingest_info(resp) {
                Ok(slug) => slug,
                Err(e) => return FfiWishResult::from_error(e, status),
            };
            match client.session.cache_board_slug(slug.as_str()) {
                Ok(()) => FfiWishResult::ok_slug(slug, status),
                Err(e) => FfiWishResult::from_error(e, status),
            }
        })
    }))
    .unwrap_or_else(|_| FfiWishResult::panic("panic in wish_parse_ingest_info"))
}

/// Parse the feedback submission response.
///
/// Returns a result with `data_tag = None` on success.
#[unsafe(no_mangle)]
pub extern "C" fn wish_parse_submit_feedback(
    client: *const FfiWishClient,
    response: *const FfiHttpResponse,
) -> *mut FfiWishResult {
    catch_unwind(AssertUnwindSafe(|| {
        with_api(client, response, |_, api, resp| {
            let status = resp.status;
            match api.parse_submit_feedback(resp) {
                Ok(()) => FfiWishResult::ok_empty(status),
                Err(e) => FfiWishResult::from_error(e, status),
            }
        })
    }))
    .unwrap_or_else(|_| FfiWishResult::panic("panic in wish_parse_submit_feedback"))
}

/// Parse the public item listing response, keeping at most `limit` items.
///
/// Returns a result with `data_tag = PublicItemList` on success.
#[unsafe(no_mangle)]
pub extern "C" fn wish_parse_list_public_items(
    client: *const FfiWishClient,
    response: *const FfiHttpResponse,
    limit: u32,
) -> *mut FfiWishResult {
    catch_unwind(AssertUnwindSafe(|| {
        with_api(client, response, |_, api, resp| {
            let status = resp.status;
            match api.parse_list_public_items(resp, limit as usize) {
                Ok(items) => FfiWishResult::ok_item_list(items, status),
                Err(e) => FfiWishResult::from_error(e, status),
            }
        })
    }))
    .unwrap_or_else(|_| FfiWishResult::panic("panic in wish_parse_list_public_items"))
}

/// Parse the upvote response.
///
/// Returns a result with `data_tag = Votes` on success.
#[unsafe(no_mangle)]
pub extern "C" fn wish_parse_upvote(
    client: *const FfiWishClient,
    response: *const FfiHttpResponse,
) -> *mut FfiWishResult {
    catch_unwind(AssertUnwindSafe(|| {
        with_api(client, response, |_, api, resp| {
            let status = resp.status;
            match api.parse_upvote(resp) {
                Ok(votes) => FfiWishResult::ok_votes(votes, status),
                Err(e) => FfiWishResult::from_error(e, status),
            }
        })
    }))
    .unwrap_or_else(|_| FfiWishResult::panic("panic in wish_parse_upvote"))
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// Start a vote for `item_id`. Only on `Started` should the host build and
/// send the upvote; it must then call `wish_vote_finish` exactly once.
#[unsafe(no_mangle)]
pub extern "C" fn wish_vote_begin(
    client: *const FfiWishClient,
    item_id: *const c_char,
) -> FfiVoteStart {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiVoteStart::Invalid;
        }
        let Some(item_id) = read_c_str(item_id) else {
            return FfiVoteStart::Invalid;
        };
        let client = unsafe { &*client };
        client.votes.start(&item_id).into()
    }))
    .unwrap_or(FfiVoteStart::Invalid)
}

/// Finish a vote started with `wish_vote_begin`. `accepted` is true when
/// `wish_parse_upvote` succeeded; the item is then recorded as voted.
/// The in-flight marker is cleared either way.
#[unsafe(no_mangle)]
pub extern "C" fn wish_vote_finish(
    client: *const FfiWishClient,
    item_id: *const c_char,
    accepted: bool,
) -> *mut FfiWishResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiWishResult::null_arg("client");
        }
        let Some(item_id) = read_c_str(item_id) else {
            return FfiWishResult::null_arg("item_id");
        };
        let client = unsafe { &*client };
        match client.votes.finish(&item_id, accepted) {
            Ok(()) => FfiWishResult::ok_empty(0),
            Err(e) => FfiWishResult::from_error(e, 0),
        }
    }))
    .unwrap_or_else(|_| FfiWishResult::panic("panic in wish_vote_finish"))
}

/// Whether this install already voted for `item_id`. False for null arguments.
#[unsafe(no_mangle)]
pub extern "C" fn wish_has_voted(client: *const FfiWishClient, item_id: *const c_char) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return false;
        }
        let client = unsafe { &*client };
        read_c_str(item_id).is_some_and(|id| client.votes.has_voted(&id))
    }))
    .unwrap_or(false)
}

/// Whether a vote for `item_id` is in flight. False for null arguments.
#[unsafe(no_mangle)]
pub extern "C" fn wish_is_voting(client: *const FfiWishClient, item_id: *const c_char) -> bool {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return false;
        }
        let client = unsafe { &*client };
        read_c_str(item_id).is_some_and(|id| client.votes.is_voting(&id))
    }))
    .unwrap_or(false)
}

/// The voted set as a JSON array of ids, for the host to persist.
/// The caller must free the returned string with `wish_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn wish_votes_export(client: *const FfiWishClient) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        match serde_json::to_string(&client.votes.voted_ids()) {
            Ok(json) => into_c_string(json),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Add the ids in `voted_ids_json` (a JSON array of strings, as produced by
/// `wish_votes_export`) to the voted set. Existing ids are kept.
#[unsafe(no_mangle)]
pub extern "C" fn wish_votes_import(
    client: *const FfiWishClient,
    voted_ids_json: *const c_char,
) -> *mut FfiWishResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiWishResult::null_arg("client");
        }
        let Some(raw) = read_c_str(voted_ids_json) else {
            return FfiWishResult::null_arg("voted_ids_json");
        };
        let client = unsafe { &*client };
        let ids: Vec<String> = match serde_json::from_str(&raw) {
            Ok(ids) => ids,
            Err(e) => return FfiWishResult::invalid_arg(format!("voted_ids_json: {e}")),
        };
        match client.votes.restore(ids) {
            Ok(()) => FfiWishResult::ok_empty(0),
            Err(e) => FfiWishResult::from_error(e, 0),
        }
    }))
    .unwrap_or_else(|_| FfiWishResult::panic("panic in wish_votes_import"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiHttpRequest` returned by any `wish_build_*` function.
/// Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn wish_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.path);
        free_c_string(req.body);
        if !req.headers.is_null() && req.headers_len > 0 {
            let headers: Box<[FfiHeader]> = unsafe {
                Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                    req.headers,
                    req.headers_len as usize,
                ))
            };
            for h in headers.iter() {
                free_c_string(h.key);
                free_c_string(h.value);
            }
        }
    }));
}

/// Free an `FfiWishResult` returned by `wish_configure`, `wish_merge_profile`,
/// `wish_vote_finish`, `wish_votes_import` or any `wish_parse_*` function.
/// Safe to call with null. Uses `data_tag` to determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn wish_free_result(result: *mut FfiWishResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Slug => free_c_string(result.data as *mut c_char),
            FfiDataTag::Votes => drop(unsafe { Box::from_raw(result.data as *mut i64) }),
            FfiDataTag::PublicItemList => {
                let list = unsafe { Box::from_raw(result.data as *mut FfiPublicItemList) };
                if !list.items.is_null() && list.len > 0 {
                    let items: Box<[FfiPublicItem]> = unsafe {
                        Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                            list.items,
                            list.len as usize,
                        ))
                    };
                    for item in items.iter() {
                        item.free_fields();
                    }
                }
            }
            FfiDataTag::None => {}
        }
    }));
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn wish_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| free_c_string(s)));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
