//! Request and response models for the API, plus the domain records
//! kept in client storage.
//!
//! Wire and storage models use camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Auth Models
// ============================================================================

/// Response containing a fresh nonce for signing.
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    pub nonce: String,
}

/// Request to verify a signed sign-in message.
///
/// Fields are optional so a missing field is reported as a bad request
/// instead of a body-parsing failure.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub wallet: Option<String>,
    pub signature: Option<String>,
    pub message: Option<String>,
    pub nonce: Option<String>,
}

/// Response after successful verification.
///
/// `ticket` is a short-lived signed proof that `wallet` passed
/// verification; it is required to open a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub verified: bool,
    pub wallet: String,
    pub ticket: String,
}

/// Request to open a session.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub wallet: Option<String>,
    pub ticket: Option<String>,
}

/// Response after a session cookie was set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub success: bool,
    pub wallet: String,
}

/// Response for `GET /auth/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
}

// ============================================================================
// Signed Payloads
// ============================================================================

/// Session data carried in the `session` cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub wallet: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
}

/// Proof of a successful signature verification, exchanged for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationTicket {
    pub wallet: String,
    pub purpose: String,
    /// Milliseconds since the Unix epoch.
    pub issued_at: i64,
}

// ============================================================================
// Crowdfunding Records
// ============================================================================

/// A fundraising campaign ("project").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    pub title: String,
    pub description: String,
    pub goal_amount: f64,
    pub current_amount: f64,
    pub creator_address: String,
    pub creator_name: String,
    pub created_at: DateTime<Utc>,
    pub image_url: String,
}

impl Campaign {
    /// Amount still missing to reach the goal (never negative).
    pub fn remaining(&self) -> f64 {
        (self.goal_amount - self.current_amount).max(0.0)
    }
}

/// Fields supplied by a user creating a campaign.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDraft {
    pub title: String,
    pub description: String,
    pub goal_amount: f64,
    #[serde(default)]
    pub image_url: String,
}

/// A single contribution to a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    pub project_id: String,
    pub amount: f64,
    pub donor_address: String,
    pub timestamp: DateTime<Utc>,
}

/// Derived donation statistics for a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileStats {
    pub campaigns_created: u32,
    pub total_donated: f64,
    pub donations_count: u32,
}

/// The local user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub wallet_address: String,
    pub avatar: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
    pub stats: ProfileStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_payload_uses_camel_case() {
        let payload = SessionPayload {
            wallet: "0xabc".to_string(),
            created_at: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["wallet"], "0xabc");
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_verify_request_tolerates_missing_fields() {
        let req: VerifyRequest = serde_json::from_str(r#"{"wallet":"0x1"}"#).unwrap();
        assert_eq!(req.wallet.as_deref(), Some("0x1"));
        assert!(req.signature.is_none());
        assert!(req.message.is_none());
        assert!(req.nonce.is_none());
    }

    #[test]
    fn test_session_status_omits_wallet_when_unauthenticated() {
        let json = serde_json::to_string(&SessionStatus {
            authenticated: false,
            wallet: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"authenticated":false}"#);
    }

    #[test]
    fn test_campaign_remaining_never_negative() {
        let campaign = Campaign {
            id: "campaign_4".to_string(),
            title: "t".to_string(),
            description: "d".to_string(),
            goal_amount: 250_000.0,
            current_amount: 260_000.0,
            creator_address: "0x4567890123456789012345678901234567890123".to_string(),
            creator_name: "c".to_string(),
            created_at: Utc::now(),
            image_url: String::new(),
        };
        assert_eq!(campaign.remaining(), 0.0);
    }
}
