//! Subscription records and the `account list` decoder
//!
//! The CLI emits a JSON array; each entry needs `id`, `name`, `isDefault`
//! and a nested `user.name`. Everything else it prints is ignored.

use serde::Deserialize;

use crate::error::GatewayError;

/// A selectable account context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub display_name: String,
    pub is_default: bool,
    pub owner_account_name: String,
}

impl Subscription {
    /// List title
    pub fn title(&self) -> &str {
        &self.display_name
    }

    /// Second list line: "id (owner)"
    pub fn description(&self) -> String {
        format!("{} ({})", self.id, self.owner_account_name)
    }

    /// Text the fuzzy filter matches against
    pub fn filter_value(&self) -> String {
        format!("{}/{}", self.display_name, self.owner_account_name)
    }
}

#[derive(Deserialize)]
struct RawUser {
    name: String,
}

#[derive(Deserialize)]
struct RawSubscription {
    id: String,
    name: String,
    #[serde(rename = "isDefault")]
    is_default: bool,
    user: RawUser,
}

impl From<RawSubscription> for Subscription {
    fn from(raw: RawSubscription) -> Self {
        Self {
            id: raw.id,
            display_name: raw.name,
            is_default: raw.is_default,
            owner_account_name: raw.user.name,
        }
    }
}

/// Decode `account list` output, preserving order
pub fn parse(data: &[u8]) -> Result<Vec<Subscription>, GatewayError> {
    let raw: Vec<RawSubscription> =
        serde_json::from_slice(data).map_err(|e| GatewayError::MalformedData(e.to_string()))?;
    Ok(raw.into_iter().map(Subscription::from).collect())
}

/// Index of the entry the CLI reports as active
pub fn find_default(subscriptions: &[Subscription]) -> Option<usize> {
    subscriptions.iter().position(|s| s.is_default)
}
