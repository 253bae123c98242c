use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::UserId;

/// Display name the frontend uses for an anonymous visitor.
pub const GUEST_NAME: &str = "Guest User";

/// Profile of the signed-in learner, as stored alongside the token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Option<UserId>,
    pub name: String,
    pub email: Option<String>,
}

impl UserProfile {
    #[must_use]
    pub fn guest() -> Self {
        Self {
            id: None,
            name: GUEST_NAME.to_string(),
            email: None,
        }
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        if self.name == GUEST_NAME || self.name == "User" {
            return &self.name;
        }
        self.name.split(' ').next().unwrap_or(&self.name)
    }
}

/// Auth token plus profile. Authenticated fetches are skipped for guests.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    token: Option<String>,
    profile: UserProfile,
}

impl Session {
    #[must_use]
    pub fn new(token: Option<String>, profile: UserProfile) -> Self {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Self { token, profile }
    }

    #[must_use]
    pub fn guest() -> Self {
        Self::new(None, UserProfile::guest())
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// No token, or the guest profile.
    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.token.is_none() || self.profile.name == GUEST_NAME
    }

    /// Token for authenticated calls; `None` for guests.
    #[must_use]
    pub fn auth_token(&self) -> Option<&str> {
        self.token().filter(|_| !self.is_guest())
    }

    #[must_use]
    pub fn user_key(&self) -> UserKey {
        UserKey::for_profile(&self.profile)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("profile", &self.profile)
            .finish()
    }
}

/// Namespace for per-user cache entries.
///
/// Built from the e-mail (or name, or `guest`) with every character outside
/// `[a-zA-Z0-9]` replaced by `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey(String);

impl UserKey {
    #[must_use]
    pub fn for_profile(profile: &UserProfile) -> Self {
        let raw = profile
            .email
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| {
                if profile.name.is_empty() {
                    "guest"
                } else {
                    profile.name.as_str()
                }
            });
        Self::sanitize(raw)
    }

    #[must_use]
    pub fn sanitize(raw: &str) -> Self {
        Self(
            raw.chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect(),
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `<base>_<user>`, the key layout shared by every cache entry.
    #[must_use]
    pub fn scoped(&self, base: &str) -> String {
        format!("{base}_{}", self.0)
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str, email: Option<&str>) -> UserProfile {
        UserProfile {
            id: Some(UserId::new("u1")),
            name: name.to_string(),
            email: email.map(ToString::to_string),
        }
    }

    #[test]
    fn user_key_sanitizes_email() {
        let key = UserKey::for_profile(&profile("Ana Cruz", Some("ana.cruz+1@farm.ph")));
        assert_eq!(key.as_str(), "ana_cruz_1_farm_ph");
        assert_eq!(key.scoped("courseProgress_gap"), "courseProgress_gap_ana_cruz_1_farm_ph");
    }

    #[test]
    fn user_key_falls_back_to_name() {
        let key = UserKey::for_profile(&profile("Ana Cruz", None));
        assert_eq!(key.as_str(), "Ana_Cruz");
    }

    #[test]
    fn guest_detection() {
        assert!(Session::guest().is_guest());
        assert!(Session::new(Some("  ".into()), profile("Ana", None)).is_guest());
        assert!(Session::new(Some("tok".into()), UserProfile::guest()).is_guest());
        assert!(!Session::new(Some("tok".into()), profile("Ana", None)).is_guest());
    }

    #[test]
    fn debug_redacts_token() {
        let session = Session::new(Some("secret".into()), profile("Ana", None));
        assert!(!format!("{session:?}").contains("secret"));
    }

    #[test]
    fn first_name() {
        assert_eq!(profile("Ana Cruz", None).first_name(), "Ana");
        assert_eq!(UserProfile::guest().first_name(), GUEST_NAME);
    }
}
