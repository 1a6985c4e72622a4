//! Staff directory and credential checks.
//!
//! Single-tenant tool: the staff directory is fixed in the binary and the
//! authenticated-user marker is a small JSON file in the data directory,
//! written on login and removed on logout or session expiry.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffRole {
    Admin,
    Faculty,
    Hod,
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffRole::Admin => write!(f, "Admin"),
            StaffRole::Faculty => write!(f, "Faculty"),
            StaffRole::Hod => write!(f, "HoD"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaffAccount {
    pub username: &'static str,
    password: &'static str,
    pub name: &'static str,
    pub role: StaffRole,
}

const STAFF_DIRECTORY: &[StaffAccount] = &[
    StaffAccount {
        username: "vallarasu",
        password: "vallu123",
        name: "Vallarasu P",
        role: StaffRole::Admin,
    },
    StaffAccount {
        username: "priyasettu",
        password: "avs2025",
        name: "Priyadarshini S",
        role: StaffRole::Faculty,
    },
    StaffAccount {
        username: "vijaykumar",
        password: "cse123",
        name: "Dr.Vijay Kumar",
        role: StaffRole::Hod,
    },
];

/// Checks a username/password pair against the staff directory.
pub fn authenticate(username: &str, password: &str) -> Option<&'static StaffAccount> {
    STAFF_DIRECTORY
        .iter()
        .find(|account| account.username == username && account.password == password)
}

/// The persisted authenticated-user marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub username: String,
    pub name: String,
    pub role: StaffRole,
    /// RFC3339 timestamp of the login.
    pub logged_in_at: String,
}

impl CurrentUser {
    pub fn new(account: &StaffAccount) -> Self {
        Self {
            username: account.username.to_string(),
            name: account.name.to_string(),
            role: account.role,
            logged_in_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_credentials_resolve_the_account() {
        let account = authenticate("vallarasu", "vallu123").expect("known staff member");
        assert_eq!(account.name, "Vallarasu P");
        assert_eq!(account.role, StaffRole::Admin);
    }

    #[test]
    fn wrong_password_is_rejected() {
        assert!(authenticate("vallarasu", "wrong").is_none());
    }

    #[test]
    fn unknown_username_is_rejected() {
        assert!(authenticate("nobody", "vallu123").is_none());
    }

    #[test]
    fn usernames_are_case_sensitive() {
        assert!(authenticate("Vallarasu", "vallu123").is_none());
    }
}
