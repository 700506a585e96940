//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! tagged enums with explicit discriminants. Conversion functions live here
//! to keep `lib.rs` focused on the `extern "C"` surface.

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use chrono::{DateTime, TimeZone, Utc};
use founderwish_core::error::WishError;
use founderwish_core::http::HttpMethod;
use founderwish_core::profile::{FieldUpdate, ProfileUpdate};
use founderwish_core::types::iso8601;
use founderwish_core::{DeviceMetadata, FeedbackDraft, PublicItem, SessionStore, VoteCheck, VoteLedger};

/// Opaque handle owning one session and the install's vote ledger. C callers
/// receive a pointer to this and pass it back into every FFI function.
pub struct FfiWishClient {
    pub(crate) session: SessionStore,
    pub(crate) votes: VoteLedger,
}

// ---------------------------------------------------------------------------
// String helpers
// ---------------------------------------------------------------------------

/// Moves `s` into a C string owned by the caller. Interior NULs are dropped
/// rather than failing the whole call.
pub(crate) fn into_c_string(s: String) -> *mut c_char {
    let c = CString::new(s).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c.into_raw()
}

pub(crate) fn opt_c_string(s: Option<String>) -> *mut c_char {
    s.map_or(std::ptr::null_mut(), into_c_string)
}

/// Reads a borrowed C string; null yields `None`, invalid UTF-8 is replaced.
pub(crate) fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

pub(crate) fn free_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Built by `wish_build_*` functions. The C caller executes the request
/// and passes the response back through `wish_parse_*`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    /// Absolute URL, query string included.
    pub path: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub body: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: founderwish_core::HttpRequest) -> *mut Self {
        let headers_len = req.headers.len() as u32;
        let headers = if req.headers.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_headers: Box<[FfiHeader]> = req
                .headers
                .into_iter()
                .map(|(k, v)| FfiHeader {
                    key: into_c_string(k),
                    value: into_c_string(v),
                })
                .collect();
            Box::into_raw(ffi_headers) as *mut FfiHeader
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            path: into_c_string(req.path),
            headers,
            headers_len,
            body: opt_c_string(req.body),
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing an HTTP request,
/// then passes a pointer to a `wish_parse_*` function. The FFI layer reads
/// but does not free these fields. Use status 0 when no HTTP status was
/// received.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
}

impl FfiHttpResponse {
    pub(crate) fn to_core(&self) -> founderwish_core::HttpResponse {
        founderwish_core::HttpResponse::new(self.status, read_c_str(self.body).unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Caller-provided inputs
// ---------------------------------------------------------------------------

/// Tri-state field update for `wish_merge_profile`.
#[repr(C)]
#[derive(Clone, Copy)]
pub enum FfiFieldUpdate {
    Keep = 0,
    Clear = 1,
    Set = 2,
}

impl FfiFieldUpdate {
    fn to_core<T>(self, value: Option<T>) -> Result<FieldUpdate<T>, &'static str> {
        match (self, value) {
            (FfiFieldUpdate::Keep, _) => Ok(FieldUpdate::Keep),
            (FfiFieldUpdate::Clear, _) => Ok(FieldUpdate::Clear),
            (FfiFieldUpdate::Set, Some(v)) => Ok(FieldUpdate::Set(v)),
            (FfiFieldUpdate::Set, None) => Err("Set requires a value"),
        }
    }
}

/// Profile update. Each `*_value` is read only when its action is `Set`.
/// `custom_metadata_json` must be a JSON object of strings.
#[repr(C)]
pub struct FfiProfileUpdate {
    pub email: FfiFieldUpdate,
    pub email_value: *const c_char,
    pub subscription_status: FfiFieldUpdate,
    pub subscription_status_value: *const c_char,
    pub subscription_expires_at: FfiFieldUpdate,
    /// Seconds since the Unix epoch.
    pub subscription_expires_at_unix: i64,
    pub custom_metadata: FfiFieldUpdate,
    pub custom_metadata_json: *const c_char,
}

impl FfiProfileUpdate {
    pub(crate) fn to_core(&self) -> Result<ProfileUpdate, String> {
        let metadata = match self.custom_metadata {
            FfiFieldUpdate::Set => match read_c_str(self.custom_metadata_json) {
                Some(raw) => Some(
                    serde_json::from_str::<BTreeMap<String, String>>(&raw)
                        .map_err(|e| format!("custom_metadata_json: {e}"))?,
                ),
                None => None,
            },
            _ => None,
        };
        let expires_at = match self.subscription_expires_at {
            FfiFieldUpdate::Set => Some(
                from_unix(self.subscription_expires_at_unix)
                    .ok_or("subscription_expires_at_unix out of range")?,
            ),
            _ => None,
        };

        Ok(ProfileUpdate {
            email: self
                .email
                .to_core(read_c_str(self.email_value))
                .map_err(|e| format!("email: {e}"))?,
            subscription_status: self
                .subscription_status
                .to_core(read_c_str(self.subscription_status_value))
                .map_err(|e| format!("subscription_status: {e}"))?,
            subscription_expires_at: self
                .subscription_expires_at
                .to_core(expires_at)
                .map_err(|e| format!("subscription_expires_at: {e}"))?,
            custom_metadata: self
                .custom_metadata
                .to_core(metadata)
                .map_err(|e| format!("custom_metadata: {e}"))?,
        })
    }
}

/// Feedback form contents. Null `source` / `category` use the defaults.
#[repr(C)]
pub struct FfiFeedbackDraft {
    pub title: *const c_char,
    pub description: *const c_char,
    pub source: *const c_char,
    pub category: *const c_char,
}

impl FfiFeedbackDraft {
    pub(crate) fn to_core(&self) -> FeedbackDraft {
        let mut draft = FeedbackDraft::new(read_c_str(self.title).unwrap_or_default());
        draft.description = read_c_str(self.description);
        if let Some(source) = read_c_str(self.source) {
            draft = draft.source(source);
        }
        if let Some(category) = read_c_str(self.category) {
            draft = draft.category(category);
        }
        draft
    }
}

/// Device fields captured by the host. Null strings become empty.
#[repr(C)]
pub struct FfiDeviceMetadata {
    pub app_name: *const c_char,
    pub app_version: *const c_char,
    pub os_version: *const c_char,
    pub device_model: *const c_char,
    pub device_type: *const c_char,
    pub lang: *const c_char,
    pub timezone: *const c_char,
    pub screen_w: u32,
    pub screen_h: u32,
    pub user_identifier: *const c_char,
    /// Seconds since the Unix epoch.
    pub install_date_unix: i64,
}

impl FfiDeviceMetadata {
    pub(crate) fn to_core(&self) -> Option<DeviceMetadata> {
        let text = |ptr| read_c_str(ptr).unwrap_or_default();
        Some(DeviceMetadata {
            app_name: text(self.app_name),
            app_version: text(self.app_version),
            os_version: text(self.os_version),
            device_model: text(self.device_model),
            device_type: text(self.device_type),
            lang: text(self.lang),
            timezone: text(self.timezone),
            screen_w: self.screen_w,
            screen_h: self.screen_h,
            user_identifier: text(self.user_identifier),
            install_date: from_unix(self.install_date_unix)?,
        })
    }
}

/// Outcome of `wish_vote_begin`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiVoteStart {
    /// The item is now in flight; send the upvote, then call `wish_vote_finish`.
    Started = 0,
    /// This install already voted; send nothing.
    AlreadyVoted = 1,
    /// Another vote for the item is in flight; send nothing.
    InFlight = 2,
    /// A null argument was passed.
    Invalid = 3,
}

impl From<VoteCheck> for FfiVoteStart {
    fn from(check: VoteCheck) -> Self {
        match check {
            VoteCheck::Started => FfiVoteStart::Started,
            VoteCheck::AlreadyVoted => FfiVoteStart::AlreadyVoted,
            VoteCheck::InFlight => FfiVoteStart::InFlight,
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiWishResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    NotConfigured = 1,
    InvalidResponse = 2,
    Server = 3,
    InvalidBaseUrl = 4,
    EmptyTitle = 5,
    Serialization = 6,
    Transport = 7,
    Storage = 8,
    Panic = 9,
    NullArg = 10,
    InvalidArg = 11,
}

/// Tag that tells `wish_free_result` what `FfiWishResult::data` points to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    /// `data` is a `char*` holding the board slug.
    Slug = 1,
    /// `data` is an `FfiPublicItemList*`.
    PublicItemList = 2,
    /// `data` is an `int64_t*` holding the vote count.
    Votes = 3,
}

/// A public board item exposed to C. Nullable strings are null when absent.
#[repr(C)]
pub struct FfiPublicItem {
    pub id: *mut c_char,
    pub title: *mut c_char,
    pub description: *mut c_char,
    pub status: *mut c_char,
    pub source: *mut c_char,
    /// ISO-8601, e.g. `2024-01-01T00:00:00Z`.
    pub created_at: *mut c_char,
    pub has_votes: bool,
    pub votes: i64,
}

impl FfiPublicItem {
    fn from_core(item: PublicItem) -> Self {
        FfiPublicItem {
            id: into_c_string(item.id),
            title: into_c_string(item.title),
            description: opt_c_string(item.description),
            status: into_c_string(item.status),
            source: opt_c_string(item.source),
            created_at: into_c_string(iso8601(&item.created_at)),
            has_votes: item.votes.is_some(),
            votes: item.votes.unwrap_or(0),
        }
    }

    /// Free the C-string fields (but not the struct itself).
    pub(crate) fn free_fields(&self) {
        for ptr in [
            self.id,
            self.title,
            self.description,
            self.status,
            self.source,
            self.created_at,
        ] {
            free_c_string(ptr);
        }
    }
}

/// A list of public items exposed to C.
#[repr(C)]
pub struct FfiPublicItemList {
    pub items: *mut FfiPublicItem,
    pub len: u32,
}

/// Result envelope for configuration and parse operations.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data`
/// points to the parsed payload (tagged by `data_tag`).
/// On failure `error_code` describes the category, `error_message` is a
/// human-readable C string, and `data` is null. `http_status` echoes the
/// parsed response's status, or 0.
#[repr(C)]
pub struct FfiWishResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub data_tag: FfiDataTag,
    pub data: *mut std::ffi::c_void,
}

impl FfiWishResult {
    fn boxed(
        error_code: FfiErrorCode,
        error_message: *mut c_char,
        http_status: u16,
        data_tag: FfiDataTag,
        data: *mut std::ffi::c_void,
    ) -> *mut Self {
        Box::into_raw(Box::new(FfiWishResult {
            error_code,
            error_message,
            http_status,
            data_tag,
            data,
        }))
    }

    /// Build a success result with no data payload.
    pub(crate) fn ok_empty(http_status: u16) -> *mut Self {
        Self::boxed(
            FfiErrorCode::Ok,
            std::ptr::null_mut(),
            http_status,
            FfiDataTag::None,
            std::ptr::null_mut(),
        )
    }

    pub(crate) fn ok_slug(slug: String, http_status: u16) -> *mut Self {
        Self::boxed(
            FfiErrorCode::Ok,
            std::ptr::null_mut(),
            http_status,
            FfiDataTag::Slug,
            into_c_string(slug) as *mut std::ffi::c_void,
        )
    }

    /// Build a success result carrying an `FfiPublicItemList`.
    pub(crate) fn ok_item_list(items: Vec<PublicItem>, http_status: u16) -> *mut Self {
        let len = items.len() as u32;
        let items_ptr = if items.is_empty() {
            std::ptr::null_mut()
        } else {
            let ffi_items: Box<[FfiPublicItem]> =
                items.into_iter().map(FfiPublicItem::from_core).collect();
            Box::into_raw(ffi_items) as *mut FfiPublicItem
        };
        let list = Box::new(FfiPublicItemList {
            items: items_ptr,
            len,
        });
        Self::boxed(
            FfiErrorCode::Ok,
            std::ptr::null_mut(),
            http_status,
            FfiDataTag::PublicItemList,
            Box::into_raw(list) as *mut std::ffi::c_void,
        )
    }

    pub(crate) fn ok_votes(votes: i64, http_status: u16) -> *mut Self {
        Self::boxed(
            FfiErrorCode::Ok,
            std::ptr::null_mut(),
            http_status,
            FfiDataTag::Votes,
            Box::into_raw(Box::new(votes)) as *mut std::ffi::c_void,
        )
    }

    /// Build an error result from a `WishError`.
    pub(crate) fn from_error(err: WishError, http_status: u16) -> *mut Self {
        let error_code = match &err {
            WishError::NotConfigured => FfiErrorCode::NotConfigured,
            WishError::InvalidResponse => FfiErrorCode::InvalidResponse,
            WishError::ServerError(_) => FfiErrorCode::Server,
            WishError::InvalidBaseUrl(_) => FfiErrorCode::InvalidBaseUrl,
            WishError::EmptyTitle => FfiErrorCode::EmptyTitle,
            WishError::Serialization(_) => FfiErrorCode::Serialization,
            WishError::Transport(_) => FfiErrorCode::Transport,
            WishError::Storage(_) => FfiErrorCode::Storage,
        };
        Self::boxed(
            error_code,
            into_c_string(err.to_string()),
            http_status,
            FfiDataTag::None,
            std::ptr::null_mut(),
        )
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::boxed(
            FfiErrorCode::NullArg,
            into_c_string(format!("null argument: {name}")),
            0,
            FfiDataTag::None,
            std::ptr::null_mut(),
        )
    }

    /// Build an error result for an argument that could not be converted.
    pub(crate) fn invalid_arg(msg: String) -> *mut Self {
        Self::boxed(
            FfiErrorCode::InvalidArg,
            into_c_string(msg),
            0,
            FfiDataTag::None,
            std::ptr::null_mut(),
        )
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(
            FfiErrorCode::Panic,
            into_c_string(msg.to_string()),
            0,
            FfiDataTag::None,
            std::ptr::null_mut(),
        )
    }
}
