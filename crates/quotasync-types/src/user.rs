//! User types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ExternalAccountId, UserId};

/// Link between a local user and an external gateway account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalBinding {
    /// Account id on the gateway
    pub external_id: ExternalAccountId,
    /// Username on the gateway
    pub external_username: String,
}

/// Local user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,
    /// Login name
    pub username: String,
    /// Contact address for reminders
    pub email: Option<String>,
    /// Bound gateway account, if any
    pub binding: Option<ExternalBinding>,
    /// Whether expiry reminders are wanted
    pub remind_enabled: bool,
    /// How many days ahead of expiry to start reminding
    pub remind_days: i32,
    /// When the user was created
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the user is bound to a gateway account
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    /// Gateway account id when bound
    pub fn external_id(&self) -> Option<ExternalAccountId> {
        self.binding.as_ref().map(|b| b.external_id)
    }

    /// Address to remind, when reminders are enabled and an address is set
    pub fn reminder_address(&self) -> Option<&str> {
        if !self.remind_enabled {
            return None;
        }
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: Option<&str>, enabled: bool) -> User {
        User {
            id: UserId::new(),
            username: "alice".to_string(),
            email: email.map(str::to_string),
            binding: None,
            remind_enabled: enabled,
            remind_days: 3,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reminder_address_requires_opt_in() {
        assert_eq!(
            user(Some("a@example.com"), true).reminder_address(),
            Some("a@example.com")
        );
        assert_eq!(user(Some("a@example.com"), false).reminder_address(), None);
    }

    #[test]
    fn test_reminder_address_rejects_blank() {
        assert_eq!(user(Some("   "), true).reminder_address(), None);
        assert_eq!(user(None, true).reminder_address(), None);
    }

    #[test]
    fn test_binding_accessors() {
        let mut u = user(None, true);
        assert!(!u.is_bound());
        u.binding = Some(ExternalBinding {
            external_id: ExternalAccountId(7),
            external_username: "alice".to_string(),
        });
        assert!(u.is_bound());
        assert_eq!(u.external_id(), Some(ExternalAccountId(7)));
    }
}
