use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fixed taxonomy of support roles a user can be routed to.
/// The display strings are the canonical form used on the wire and in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdminType {
    #[serde(rename = "Billing Support")]
    BillingSupport,
    #[serde(rename = "Technical Support")]
    TechnicalSupport,
    #[serde(rename = "Account Manager")]
    AccountManager,
    #[serde(rename = "Sales Rep")]
    SalesRep,
    #[serde(rename = "HR")]
    Hr,
}

impl AdminType {
    pub const ALL: [AdminType; 5] = [
        AdminType::BillingSupport,
        AdminType::TechnicalSupport,
        AdminType::AccountManager,
        AdminType::SalesRep,
        AdminType::Hr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminType::BillingSupport => "Billing Support",
            AdminType::TechnicalSupport => "Technical Support",
            AdminType::AccountManager => "Account Manager",
            AdminType::SalesRep => "Sales Rep",
            AdminType::Hr => "HR",
        }
    }
}

impl fmt::Display for AdminType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAdminType(pub String);

impl fmt::Display for UnknownAdminType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown admin type: {}", self.0)
    }
}

impl std::error::Error for UnknownAdminType {}

impl FromStr for AdminType {
    type Err = UnknownAdminType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AdminType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownAdminType(s.to_string()))
    }
}

/// Whether a principal is an end-user or a support admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// The persistent 1:1 channel between a user and an admin type.
/// At most one room exists per (user_id, admin_type) pair; the admin is
/// bound at creation and never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub user_id: String,
    pub admin_username: String,
    pub admin_type: AdminType,
    pub created_at: DateTime<Utc>,
}

/// A decrypted message as seen by the chat engine. Stored ciphertext never
/// leaves the persistence layer undecrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Derived per-room aggregate from a given viewer's perspective.
/// Recomputed on every dashboard request, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummary {
    pub unread_count: u64,
    pub last_message: Option<String>,
    pub last_sender: Option<String>,
    pub last_message_read: bool,
    pub last_time: Option<DateTime<Utc>>,
}

/// Human-readable timestamp pattern the dashboards depend on, e.g.
/// "05 Jan, 14:32". Presentation contract — do not change.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%d %b, %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamp_format_is_stable() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 5, 14, 32, 9).unwrap();
        assert_eq!(format_timestamp(ts), "05 Jan, 14:32");
    }

    #[test]
    fn admin_type_roundtrips_through_display() {
        for t in AdminType::ALL {
            assert_eq!(t.as_str().parse::<AdminType>().unwrap(), t);
        }
        assert!("Night Shift".parse::<AdminType>().is_err());
    }

    #[test]
    fn admin_type_serializes_as_display_string() {
        let json = serde_json::to_string(&AdminType::BillingSupport).unwrap();
        assert_eq!(json, "\"Billing Support\"");
    }
}
