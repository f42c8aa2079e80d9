//! User directory: who the caller is and whom they can reach.
//!
//! Used to ground the system prompt and to validate meeting attendees and
//! notification recipients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use crate::error::DirectoryError;

/// Profile fields of a known user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub role: String,
}

impl UserProfile {
    /// A profile carrying nothing but the email address.
    pub fn email_only(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by email (case-insensitive).
    async fn profile(&self, email: &str) -> std::result::Result<Option<UserProfile>, DirectoryError>;

    /// Up to `limit` known email addresses, in a stable order.
    async fn known_identities(&self, limit: usize) -> std::result::Result<Vec<String>, DirectoryError>;

    /// Whether `email` belongs to a known user.
    async fn contains(&self, email: &str) -> std::result::Result<bool, DirectoryError> {
        Ok(self.profile(email).await?.is_some())
    }
}

/// An in-memory directory, typically built from the `[[users]]` config table.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    users: BTreeMap<String, UserProfile>,
}

impl StaticDirectory {
    pub fn new(users: impl IntoIterator<Item = UserProfile>) -> Self {
        let users = users
            .into_iter()
            .map(|u| (u.email.to_lowercase(), u))
            .collect();
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for StaticDirectory {
    async fn profile(&self, email: &str) -> std::result::Result<Option<UserProfile>, DirectoryError> {
        Ok(self.users.get(&email.to_lowercase()).cloned())
    }

    async fn known_identities(&self, limit: usize) -> std::result::Result<Vec<String>, DirectoryError> {
        Ok(self.users.values().take(limit).map(|u| u.email.clone()).collect())
    }
}
