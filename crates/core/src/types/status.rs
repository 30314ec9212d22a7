//! Account email verification status.

use serde::{Deserialize, Serialize};

/// Whether an account has confirmed its email address.
///
/// Derived from the nullable `email_verified_at` timestamp: a timestamp
/// means [`Verified`](Self::Verified), `NULL` means
/// [`Unverified`](Self::Unverified).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    #[default]
    Unverified,
}

impl VerificationStatus {
    /// Status for an account with the given verification timestamp.
    #[must_use]
    pub const fn from_timestamp<T>(verified_at: Option<&T>) -> Self {
        if verified_at.is_some() {
            Self::Verified
        } else {
            Self::Unverified
        }
    }

    /// Parse a status filter value.
    ///
    /// Returns `None` for anything that is not exactly `verified` or
    /// `unverified`, which list filters treat as "no filter".
    #[must_use]
    pub fn from_filter(value: &str) -> Option<Self> {
        value.parse().ok()
    }

    /// The lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Unverified => "unverified",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verified" => Ok(Self::Verified),
            "unverified" => Ok(Self::Unverified),
            _ => Err(format!("invalid verification status: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_timestamp() {
        assert_eq!(
            VerificationStatus::from_timestamp(Some(&"2024-01-01")),
            VerificationStatus::Verified
        );
        assert_eq!(
            VerificationStatus::from_timestamp::<&str>(None),
            VerificationStatus::Unverified
        );
    }

    #[test]
    fn test_from_filter_ignores_unknown_values() {
        assert_eq!(
            VerificationStatus::from_filter("verified"),
            Some(VerificationStatus::Verified)
        );
        assert_eq!(
            VerificationStatus::from_filter("unverified"),
            Some(VerificationStatus::Unverified)
        );
        assert_eq!(VerificationStatus::from_filter(""), None);
        assert_eq!(VerificationStatus::from_filter("Verified"), None);
        assert_eq!(VerificationStatus::from_filter("pending"), None);
    }

    #[test]
    fn test_display_matches_serde() {
        assert_eq!(VerificationStatus::Verified.to_string(), "verified");
        assert_eq!(
            serde_json::to_string(&VerificationStatus::Unverified).ok(),
            Some("\"unverified\"".to_owned())
        );
    }
}
