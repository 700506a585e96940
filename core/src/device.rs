//! Device metadata captured at submission time.
//!
//! Mobile hosts know far more about the device than Rust can discover on
//! its own, so they usually hand over a fully populated `DeviceMetadata`
//! through `StaticDeviceMetadata`. `SystemDeviceMetadata` fills what it can
//! from the process environment and substitutes defaults for the rest.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::storage::{InstallIdentity, KeyValueStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceMetadata {
    pub app_name: String,
    pub app_version: String,
    pub os_version: String,
    pub device_model: String,
    /// `phone`, `tablet`, `desktop`, ...
    pub device_type: String,
    pub lang: String,
    pub timezone: String,
    pub screen_w: u32,
    pub screen_h: u32,
    pub user_identifier: String,
    pub install_date: DateTime<Utc>,
}

/// Supplies device metadata. Never fails: missing platform information is
/// replaced by defaults.
pub trait DeviceMetadataProvider: Send + Sync {
    fn capture(&self) -> DeviceMetadata;
}

/// Returns the same metadata on every capture.
#[derive(Debug, Clone)]
pub struct StaticDeviceMetadata(pub DeviceMetadata);

impl DeviceMetadataProvider for StaticDeviceMetadata {
    fn capture(&self) -> DeviceMetadata {
        self.0.clone()
    }
}

/// Best-effort metadata from the running process plus the install identity
/// kept in the key-value store.
pub struct SystemDeviceMetadata {
    app_name: String,
    app_version: String,
    store: Arc<dyn KeyValueStore>,
}

impl SystemDeviceMetadata {
    pub fn new(
        app_name: impl Into<String>,
        app_version: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            app_version: app_version.into(),
            store,
        }
    }

    fn identity(&self) -> InstallIdentity {
        match InstallIdentity::load_or_create(self.store.as_ref()) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Install identity unavailable, using an ephemeral one");
                InstallIdentity {
                    user_identifier: Uuid::new_v4().to_string().to_uppercase(),
                    install_date: Utc::now(),
                }
            }
        }
    }
}

impl DeviceMetadataProvider for SystemDeviceMetadata {
    fn capture(&self) -> DeviceMetadata {
        let identity = self.identity();
        DeviceMetadata {
            app_name: non_empty_or(&self.app_name, "Unknown"),
            app_version: non_empty_or(&self.app_version, "0"),
            os_version: std::env::consts::OS.to_string(),
            device_model: std::env::consts::ARCH.to_string(),
            device_type: "desktop".to_string(),
            lang: language_from_env().unwrap_or_else(|| "en".to_string()),
            timezone: std::env::var("TZ")
                .ok()
                .filter(|tz| !tz.is_empty())
                .unwrap_or_else(|| "UTC".to_string()),
            screen_w: 0,
            screen_h: 0,
            user_identifier: identity.user_identifier,
            install_date: identity.install_date,
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Language code from `LC_ALL`/`LANG`, e.g. `de_DE.UTF-8` -> `de`.
fn language_from_env() -> Option<String> {
    ["LC_ALL", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .and_then(|value| parse_language(&value))
}

fn parse_language(locale: &str) -> Option<String> {
    let code: String = locale
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if code.is_empty() {
        None
    } else {
        Some(code.to_lowercase())
    }
}
