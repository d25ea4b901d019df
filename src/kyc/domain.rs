//! Entities and views for the KYC verification workflow.
//!
//! Profiles, documents, accounts, and cards keep their PII as [`Encrypted`]
//! fields; only the response views carry decrypted (and where appropriate
//! masked) values. The audit entry is write-once and forms the compliance
//! record for every state transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::security::Encrypted;

/// Identifier wrapper for KYC profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub String);

impl ProfileId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Identifier of the platform user owning a profile (issued elsewhere).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Profile lifecycle status. Creation lands in `InProgress`; admin review
/// moves profiles to `Verified`/`Rejected`, and expiry is time-driven —
/// both transitions are external to this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    InProgress,
    Verified,
    Rejected,
    Expired,
}

impl KycStatus {
    pub const fn label(self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::InProgress => "in_progress",
            KycStatus::Verified => "verified",
            KycStatus::Rejected => "rejected",
            KycStatus::Expired => "expired",
        }
    }
}

/// Supported identity document types. At most one document per type may be
/// uploaded per profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    NationalId,
    TaxId,
    Passport,
    DrivingLicense,
    VoterId,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::NationalId => "national_id",
            DocumentType::TaxId => "tax_id",
            DocumentType::Passport => "passport",
            DocumentType::DrivingLicense => "driving_license",
            DocumentType::VoterId => "voter_id",
        }
    }

    /// Types that carry a holder photo and participate in face matching.
    pub const fn has_face(self) -> bool {
        matches!(self, DocumentType::NationalId | DocumentType::TaxId)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Verified,
    Rejected,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Verified => "verified",
            DocumentStatus::Rejected => "rejected",
        }
    }
}

/// Inbound personal details, plaintext at the boundary only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonalDetails {
    pub full_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub father_name: String,
    #[serde(default)]
    pub mother_name: Option<String>,
}

/// Inbound address details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressDetails {
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
}

/// Inbound document upload: the decoded images plus declared metadata.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub document_number: String,
    pub document_name: String,
    pub front_image: Vec<u8>,
    pub back_image: Option<Vec<u8>>,
}

/// Inbound bank account details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccountRequest {
    pub bank_name: String,
    #[serde(default)]
    pub branch_name: Option<String>,
    pub ifsc_code: String,
    pub account_number: String,
    pub account_holder_name: String,
    pub account_type: String,
    #[serde(default)]
    pub is_primary: bool,
}

/// Inbound payment card details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCardRequest {
    pub card_number: String,
    pub card_holder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub card_type: String,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub is_primary: bool,
}

/// Status of an assigned payment handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleStatus {
    Active,
    Suspended,
}

/// The KYC profile: one per user, never hard-deleted. PII is encrypted per
/// field; the verification level only ever rises while the profile is live,
/// and an assigned payment handle is never regenerated while active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycProfile {
    pub profile_id: ProfileId,
    pub user_id: UserId,
    pub status: KycStatus,
    pub verification_level: u8,
    pub full_name: Encrypted,
    pub date_of_birth: Encrypted,
    pub gender: Encrypted,
    pub father_name: Encrypted,
    pub mother_name: Encrypted,
    pub address_line1: Encrypted,
    pub address_line2: Encrypted,
    pub city: Encrypted,
    pub state: Encrypted,
    pub pincode: Encrypted,
    pub country: Encrypted,
    pub face_image_path: Option<Encrypted>,
    pub face_score: Option<f32>,
    pub upi_handle: Option<String>,
    pub upi_status: Option<HandleStatus>,
    pub verification_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Face-match verdict recorded against a document after face verification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentFaceMatch {
    pub score: f32,
    pub matched: bool,
}

/// An uploaded identity document. Number, holder name, storage paths, and
/// the extraction payload are encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityDocument {
    pub document_id: String,
    pub profile_id: ProfileId,
    pub document_type: DocumentType,
    pub number: Encrypted,
    pub holder_name: Encrypted,
    pub front_image_path: Encrypted,
    pub back_image_path: Option<Encrypted>,
    pub extraction: Encrypted,
    pub status: DocumentStatus,
    pub confidence: f32,
    pub face_match: Option<DocumentFaceMatch>,
    pub is_primary: bool,
    pub uploaded_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// A linked bank account. The primary flag is exclusive per profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_id: String,
    pub profile_id: ProfileId,
    pub bank_name: Encrypted,
    pub branch_name: Encrypted,
    pub ifsc_code: Encrypted,
    pub account_number: Encrypted,
    pub holder_name: Encrypted,
    pub account_type: String,
    pub is_verified: bool,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Card networks detected from the number prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardNetwork {
    Visa,
    Mastercard,
    Rupay,
    Amex,
    Unknown,
}

impl CardNetwork {
    /// Prefix rules: visa `4`; mastercard `51`-`55` or `22`; rupay `60`,
    /// `65`, `81`, `82`; amex `34`, `37`.
    pub fn detect(card_number: &str) -> Self {
        let digits: String = card_number.chars().filter(|c| *c != ' ').collect();
        if digits.starts_with('4') {
            CardNetwork::Visa
        } else if ["51", "52", "53", "54", "55", "22"]
            .iter()
            .any(|p| digits.starts_with(p))
        {
            CardNetwork::Mastercard
        } else if ["60", "65", "81", "82"].iter().any(|p| digits.starts_with(p)) {
            CardNetwork::Rupay
        } else if digits.starts_with("34") || digits.starts_with("37") {
            CardNetwork::Amex
        } else {
            CardNetwork::Unknown
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            CardNetwork::Visa => "visa",
            CardNetwork::Mastercard => "mastercard",
            CardNetwork::Rupay => "rupay",
            CardNetwork::Amex => "amex",
            CardNetwork::Unknown => "unknown",
        }
    }
}

/// A linked payment card. Only the last four digits are kept in the clear.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCard {
    pub card_id: String,
    pub profile_id: ProfileId,
    pub card_number: Encrypted,
    pub holder_name: Encrypted,
    pub expiry_month: Encrypted,
    pub expiry_year: Encrypted,
    pub card_type: String,
    pub last_four: String,
    pub bank_name: Encrypted,
    pub network: CardNetwork,
    pub is_verified: bool,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Outcome of an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failed,
    Pending,
}

/// Append-only audit entry; the compliance system of record. Entries for one
/// profile are observably ordered by their repository-assigned sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub audit_id: String,
    pub profile_id: ProfileId,
    pub action: String,
    pub step: String,
    pub outcome: AuditOutcome,
    pub payload: Encrypted,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        profile_id: ProfileId,
        action: impl Into<String>,
        outcome: AuditOutcome,
        payload: Encrypted,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4().to_string(),
            profile_id,
            action: action.into(),
            step: "main".to_string(),
            outcome,
            payload,
            ip_address: None,
            user_agent: None,
            recorded_at: Utc::now(),
        }
    }
}

/// Decrypted document view with the number masked for display.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub document_id: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub document_name: String,
    pub verification_status: &'static str,
    pub verification_score: f32,
    pub face_match_status: &'static str,
    pub face_match_score: f32,
    pub is_primary: bool,
    pub uploaded_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Decrypted bank account view with the account number masked.
#[derive(Debug, Clone, Serialize)]
pub struct BankAccountView {
    pub account_id: String,
    pub bank_name: String,
    pub branch_name: Option<String>,
    pub ifsc_code: String,
    pub account_number: String,
    pub holder_name: String,
    pub account_type: String,
    pub is_verified: bool,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Card view exposing only the stored last-four digits.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentCardView {
    pub card_id: String,
    pub last_four: String,
    pub holder_name: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub card_type: String,
    pub bank_name: Option<String>,
    pub network: &'static str,
    pub is_verified: bool,
    pub is_primary: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Composed profile status: decrypted profile attributes, related records,
/// and the calculator output.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileStatusView {
    pub profile_id: String,
    pub overall_status: &'static str,
    pub verification_level: u8,
    pub full_name: String,
    pub date_of_birth: String,
    pub gender: String,
    pub address_line1: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub upi_handle: Option<String>,
    pub upi_status: Option<HandleStatus>,
    pub upi_eligible: bool,
    pub verification_attempts: u32,
    pub completion_percentage: u8,
    pub pending_steps: Vec<&'static str>,
    pub next_action: &'static str,
    pub personal_details_complete: bool,
    pub address_verified: bool,
    pub documents_verified: bool,
    pub face_verified: bool,
    pub bank_account_added: bool,
    pub payment_card_added: bool,
    pub documents: Vec<DocumentView>,
    pub bank_accounts: Vec<BankAccountView>,
    pub cards: Vec<PaymentCardView>,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of a face verification upload.
#[derive(Debug, Clone, Serialize)]
pub struct FaceVerificationResult {
    pub verification_id: String,
    pub face_detected: bool,
    pub image_quality_score: f32,
    pub verification_status: &'static str,
    pub face_matches: Vec<FaceMatchView>,
}

/// Per-document face comparison result returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct FaceMatchView {
    pub document_type: DocumentType,
    pub similarity_score: f32,
    pub is_match: bool,
}

/// Result of a payment-handle assignment.
#[derive(Debug, Clone, Serialize)]
pub struct UpiAssignmentView {
    pub upi_handle: String,
    pub status: HandleStatus,
    pub activation_required: bool,
}

/// Result of a level recalculation.
#[derive(Debug, Clone, Serialize)]
pub struct LevelChangeView {
    pub profile_id: String,
    pub previous_level: u8,
    pub verification_level: u8,
    pub upi_eligible: bool,
    pub documents_uploaded: bool,
    pub face_verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_network_detection_by_prefix() {
        assert_eq!(CardNetwork::detect("4111111111111111"), CardNetwork::Visa);
        assert_eq!(CardNetwork::detect("5212345678901234"), CardNetwork::Mastercard);
        assert_eq!(CardNetwork::detect("2212345678901234"), CardNetwork::Mastercard);
        assert_eq!(CardNetwork::detect("6012345678901234"), CardNetwork::Rupay);
        assert_eq!(CardNetwork::detect("8112345678901234"), CardNetwork::Rupay);
        assert_eq!(CardNetwork::detect("341234567890123"), CardNetwork::Amex);
        assert_eq!(CardNetwork::detect("371234567890123"), CardNetwork::Amex);
        assert_eq!(CardNetwork::detect("9912345678901234"), CardNetwork::Unknown);
    }

    #[test]
    fn card_network_ignores_spaces() {
        assert_eq!(CardNetwork::detect("4111 1111 1111 1111"), CardNetwork::Visa);
    }

    #[test]
    fn face_bearing_document_types() {
        assert!(DocumentType::NationalId.has_face());
        assert!(DocumentType::TaxId.has_face());
        assert!(!DocumentType::Passport.has_face());
        assert!(!DocumentType::VoterId.has_face());
    }
}
