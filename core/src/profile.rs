//! User profile and the per-field merge used to update it.
//!
//! # Design
//! A plain `Option` cannot tell "leave this field alone" apart from "clear
//! this field", so every mergeable field goes through `FieldUpdate`. The
//! merge itself is a pure function on values; the session store only
//! decides which profile it is applied to.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription status used when none is known.
pub const UNKNOWN_SUBSCRIPTION_STATUS: &str = "unknown";

/// Custom metadata key holding a [`BillingCycle`].
pub const BILLING_CYCLE_KEY: &str = "billing_cycle";

/// Custom metadata key holding a display amount such as `$9.99`.
pub const AMOUNT_KEY: &str = "amount";

/// What the host application knows about the current user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub subscription_status: String,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub email: Option<String>,
    pub custom_metadata: Option<BTreeMap<String, String>>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            subscription_status: UNKNOWN_SUBSCRIPTION_STATUS.to_string(),
            subscription_expires_at: None,
            email: None,
            custom_metadata: None,
        }
    }
}

impl UserProfile {
    /// Applies `update` field by field and returns the result.
    pub fn merged(self, update: ProfileUpdate) -> UserProfile {
        UserProfile {
            subscription_status: update
                .subscription_status
                .apply_or(self.subscription_status, || {
                    UNKNOWN_SUBSCRIPTION_STATUS.to_string()
                }),
            subscription_expires_at: update
                .subscription_expires_at
                .apply(self.subscription_expires_at),
            email: update.email.apply(self.email),
            custom_metadata: update.custom_metadata.apply(self.custom_metadata),
        }
    }
}

/// A single field of a merge: keep the current value, clear it, or set it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldUpdate<T> {
    #[default]
    Keep,
    Clear,
    Set(T),
}

impl<T> FieldUpdate<T> {
    /// Maps `Some(v)` to `Set(v)` and `None` to `Keep`.
    pub fn keep_or_set(value: Option<T>) -> Self {
        match value {
            Some(v) => FieldUpdate::Set(v),
            None => FieldUpdate::Keep,
        }
    }

    /// Applies the update to an optional field; `Clear` yields `None`.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            FieldUpdate::Keep => current,
            FieldUpdate::Clear => None,
            FieldUpdate::Set(v) => Some(v),
        }
    }

    /// Applies the update to a required field; `Clear` yields `default()`.
    pub fn apply_or(self, current: T, default: impl FnOnce() -> T) -> T {
        match self {
            FieldUpdate::Keep => current,
            FieldUpdate::Clear => default(),
            FieldUpdate::Set(v) => v,
        }
    }

    pub fn is_keep(&self) -> bool {
        matches!(self, FieldUpdate::Keep)
    }
}

/// Partial update of a [`UserProfile`]. The default leaves every field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub email: FieldUpdate<String>,
    pub subscription_status: FieldUpdate<String>,
    pub subscription_expires_at: FieldUpdate<DateTime<Utc>>,
    pub custom_metadata: FieldUpdate<BTreeMap<String, String>>,
}

impl ProfileUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn email(mut self, update: FieldUpdate<String>) -> Self {
        self.email = update;
        self
    }

    pub fn subscription_status(mut self, update: FieldUpdate<String>) -> Self {
        self.subscription_status = update;
        self
    }

    pub fn subscription_expires_at(mut self, update: FieldUpdate<DateTime<Utc>>) -> Self {
        self.subscription_expires_at = update;
        self
    }

    pub fn custom_metadata(mut self, update: FieldUpdate<BTreeMap<String, String>>) -> Self {
        self.custom_metadata = update;
        self
    }
}

/// Payment status of the user, covering subscriptions and one-time purchases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Free,
    Trial,
    Paid,
    Premium,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Free => "free",
            PaymentStatus::Trial => "trial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Premium => "premium",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Weekly,
    Monthly,
    Yearly,
    Lifetime,
}

impl BillingCycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingCycle::Weekly => "weekly",
            BillingCycle::Monthly => "monthly",
            BillingCycle::Yearly => "yearly",
            BillingCycle::Lifetime => "lifetime",
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the `billing_cycle` / `amount` metadata map, or `None` when both
/// are absent.
pub fn billing_metadata(
    billing_cycle: Option<BillingCycle>,
    amount: Option<&str>,
) -> Option<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    if let Some(cycle) = billing_cycle {
        metadata.insert(BILLING_CYCLE_KEY.to_string(), cycle.as_str().to_string());
    }
    if let Some(amount) = amount {
        metadata.insert(AMOUNT_KEY.to_string(), amount.to_string());
    }
    if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn populated() -> UserProfile {
        UserProfile {
            subscription_status: "paid".to_string(),
            subscription_expires_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            email: Some("a@example.com".to_string()),
            custom_metadata: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
        }
    }

    #[test]
    fn default_profile_has_unknown_status() {
        let profile = UserProfile::default();
        assert_eq!(profile.subscription_status, "unknown");
        assert!(profile.email.is_none());
        assert!(profile.subscription_expires_at.is_none());
        assert!(profile.custom_metadata.is_none());
    }

    #[test]
    fn keep_leaves_every_field_untouched() {
        let merged = populated().merged(ProfileUpdate::new());
        assert_eq!(merged, populated());
    }

    #[test]
    fn clear_resets_fields_to_empty_or_default() {
        let update = ProfileUpdate::new()
            .email(FieldUpdate::Clear)
            .subscription_status(FieldUpdate::Clear)
            .subscription_expires_at(FieldUpdate::Clear)
            .custom_metadata(FieldUpdate::Clear);
        assert_eq!(populated().merged(update), UserProfile::default());
    }

    #[test]
    fn set_overwrites_only_the_named_field() {
        let merged = populated().merged(
            ProfileUpdate::new().email(FieldUpdate::Set("b@example.com".to_string())),
        );
        assert_eq!(merged.email.as_deref(), Some("b@example.com"));
        assert_eq!(merged.subscription_status, "paid");
        assert_eq!(merged.custom_metadata, populated().custom_metadata);
    }

    #[test]
    fn keep_or_set_maps_none_to_keep() {
        assert!(FieldUpdate::<String>::keep_or_set(None).is_keep());
        assert_eq!(
            FieldUpdate::keep_or_set(Some(1)),
            FieldUpdate::Set(1)
        );
    }

    #[test]
    fn payment_and_billing_wire_names() {
        assert_eq!(PaymentStatus::Free.as_str(), "free");
        assert_eq!(PaymentStatus::Trial.as_str(), "trial");
        assert_eq!(PaymentStatus::Paid.to_string(), "paid");
        assert_eq!(BillingCycle::Weekly.as_str(), "weekly");
        assert_eq!(BillingCycle::Lifetime.to_string(), "lifetime");
        assert_eq!(
            serde_json::to_value(BillingCycle::Monthly).unwrap(),
            serde_json::json!("monthly")
        );
    }

    #[test]
    fn billing_metadata_is_none_when_empty() {
        assert!(billing_metadata(None, None).is_none());
        let metadata = billing_metadata(Some(BillingCycle::Yearly), Some("$99.99")).unwrap();
        assert_eq!(metadata["billing_cycle"], "yearly");
        assert_eq!(metadata["amount"], "$99.99");
    }
}
