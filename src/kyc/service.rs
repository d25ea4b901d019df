//! The KYC orchestrator: profile lifecycle, document and face verification,
//! payment instruments, and handle issuance.
//!
//! Each operation validates before it writes, then commits the business
//! write together with its audit entry through one repository call, so a
//! failure after validation rolls back the whole operation. Rejections of
//! client input are audited as `failed` entries but never logged as system
//! faults.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::security::{CipherError, FieldCipher};

use super::domain::{
    AddressDetails, AuditEntry, AuditOutcome, BankAccount, BankAccountRequest, BankAccountView,
    CardNetwork, DocumentFaceMatch, DocumentStatus, DocumentUpload, DocumentView,
    FaceMatchView, FaceVerificationResult, HandleStatus, IdentityDocument, KycProfile,
    KycStatus, LevelChangeView, PaymentCard, PaymentCardRequest, PaymentCardView,
    PersonalDetails, ProfileId, ProfileStatusView, UpiAssignmentView, UserId,
};
use super::face::FaceEngine;
use super::identifiers::{self, MaskKind};
use super::level::{self, LevelSnapshot, UPI_ELIGIBLE_LEVEL};
use super::repository::{KycRepository, RepositoryError};
use super::upi::{self, HandleRegistry, IdentitySnapshot};

/// Stand-in for the stored document scan handed to the face matcher. The
/// real pipeline loads the scan from object storage via the encrypted path.
const DOCUMENT_FACE_PLACEHOLDER: &[u8] = b"document-face-scan";

/// Simulated OCR confidence: two extracted fields at 0.3 each, capped.
const EXTRACTION_CONFIDENCE: f32 = 0.6;

/// Error raised by the KYC orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum KycError {
    #[error("user not found")]
    UserNotFound,
    #[error("KYC profile not found")]
    ProfileNotFound,
    #[error("KYC profile already exists for this user")]
    DuplicateProfile,
    #[error("{0} document already uploaded")]
    DuplicateDocument(&'static str),
    #[error("invalid {0} number")]
    InvalidDocumentNumber(&'static str),
    #[error("face verification rejected: {0}")]
    FaceVerificationRejected(&'static str),
    #[error("full KYC verification is required before a payment handle can be issued")]
    NotEligible,
    #[error("payment handle already generated for this profile")]
    HandleAlreadyAssigned,
    #[error("no payment handle is currently available")]
    HandleUnavailable,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Service composing the validators, the face engine, the handle registry,
/// and the transactional repository. No internal mutable state: everything
/// flows through the injected collaborators.
pub struct KycService<R, C, F, G> {
    repository: Arc<R>,
    cipher: Arc<C>,
    faces: Arc<F>,
    registry: Arc<G>,
}

impl<R, C, F, G> KycService<R, C, F, G>
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    pub fn new(repository: Arc<R>, cipher: Arc<C>, faces: Arc<F>, registry: Arc<G>) -> Self {
        Self {
            repository,
            cipher,
            faces,
            registry,
        }
    }

    /// Create the profile for a user, encrypting all PII before it is
    /// persisted. One profile per user; creation moves the lifecycle to
    /// `InProgress`.
    pub fn create_profile(
        &self,
        user_id: UserId,
        personal: PersonalDetails,
        address: AddressDetails,
    ) -> Result<ProfileStatusView, KycError> {
        if !self.repository.user_exists(&user_id)? {
            return Err(KycError::UserNotFound);
        }
        if self.repository.profile_by_user(&user_id)?.is_some() {
            return Err(KycError::DuplicateProfile);
        }

        let now = Utc::now();
        let profile = KycProfile {
            profile_id: ProfileId::generate(),
            user_id,
            status: KycStatus::InProgress,
            verification_level: 0,
            full_name: self.cipher.encrypt(&personal.full_name)?,
            date_of_birth: self.cipher.encrypt(&personal.date_of_birth)?,
            gender: self.cipher.encrypt(&personal.gender)?,
            father_name: self.cipher.encrypt(&personal.father_name)?,
            mother_name: self
                .cipher
                .encrypt(personal.mother_name.as_deref().unwrap_or(""))?,
            address_line1: self.cipher.encrypt(&address.address_line1)?,
            address_line2: self
                .cipher
                .encrypt(address.address_line2.as_deref().unwrap_or(""))?,
            city: self.cipher.encrypt(&address.city)?,
            state: self.cipher.encrypt(&address.state)?,
            pincode: self.cipher.encrypt(&address.pincode)?,
            country: self.cipher.encrypt(&address.country)?,
            face_image_path: None,
            face_score: None,
            upi_handle: None,
            upi_status: None,
            verification_attempts: 0,
            created_at: now,
            updated_at: now,
            verified_at: None,
            expires_at: None,
        };

        let audit = self.audit(
            &profile.profile_id,
            "profile_creation",
            AuditOutcome::Success,
            json!({ "step": "profile_created" }),
        )?;

        match self.repository.insert_profile(profile.clone(), audit) {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => return Err(KycError::DuplicateProfile),
            Err(err) => return Err(err.into()),
        }

        info!(profile_id = %profile.profile_id.0, "kyc profile created");
        self.compose_status(profile, Vec::new(), Vec::new(), Vec::new())
    }

    /// Upload an identity document. The number is validated per type before
    /// any write; duplicates per (profile, type) are rejected.
    pub fn upload_document(
        &self,
        profile_id: &ProfileId,
        upload: DocumentUpload,
    ) -> Result<DocumentView, KycError> {
        let profile = self.require_profile(profile_id)?;

        let type_label = upload.document_type.label();
        let number_valid = match upload.document_type {
            super::domain::DocumentType::NationalId => {
                identifiers::validate_national_id(&upload.document_number)
            }
            super::domain::DocumentType::TaxId => {
                identifiers::validate_tax_id(&upload.document_number)
            }
            _ => !upload.document_number.trim().is_empty(),
        };
        if !number_valid {
            return Err(KycError::InvalidDocumentNumber(type_label));
        }

        if self
            .repository
            .documents(profile_id)?
            .iter()
            .any(|doc| doc.document_type == upload.document_type)
        {
            return Err(KycError::DuplicateDocument(type_label));
        }

        let document_id = Uuid::new_v4().to_string();
        let front_path = format!("documents/{document_id}_front.jpg");
        let back_path = upload
            .back_image
            .as_ref()
            .map(|_| format!("documents/{document_id}_back.jpg"));

        // Simulated OCR extraction; the real pipeline would run the scans
        // through an OCR engine and keep its structured output here.
        let masked_number = mask_for(upload.document_type, &upload.document_number);
        let extraction = json!({
            "document_type": type_label,
            "extracted_fields": {
                "number": masked_number,
                "name": upload.document_name,
            },
            "confidence": EXTRACTION_CONFIDENCE,
        });

        let document = IdentityDocument {
            document_id: document_id.clone(),
            profile_id: profile_id.clone(),
            document_type: upload.document_type,
            number: self.cipher.encrypt(&upload.document_number)?,
            holder_name: self.cipher.encrypt(&upload.document_name)?,
            front_image_path: self.cipher.encrypt(&front_path)?,
            back_image_path: back_path
                .map(|path| self.cipher.encrypt(&path))
                .transpose()?,
            extraction: self.cipher.encrypt(&extraction.to_string())?,
            status: DocumentStatus::Pending,
            confidence: EXTRACTION_CONFIDENCE,
            face_match: None,
            is_primary: upload.document_type.has_face(),
            uploaded_at: Utc::now(),
            verified_at: None,
        };

        let audit = self.audit(
            profile_id,
            "document_upload",
            AuditOutcome::Success,
            json!({ "document_type": type_label, "document_id": document_id }),
        )?;

        match self.repository.insert_document(document.clone(), audit) {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => {
                return Err(KycError::DuplicateDocument(type_label))
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            profile_id = %profile.profile_id.0,
            document_type = type_label,
            "identity document uploaded"
        );
        self.document_view(&document)
    }

    /// Upload and verify a face image. Acceptance promotes the profile to
    /// the UPI-eligible level when at least one document is on file; the
    /// per-document comparisons are recorded against the face-bearing
    /// documents in the same transaction.
    pub fn upload_face_image(
        &self,
        profile_id: &ProfileId,
        image: &[u8],
    ) -> Result<FaceVerificationResult, KycError> {
        let mut profile = self.require_profile(profile_id)?;

        let evaluation = self.faces.evaluate(image);
        if !evaluation.accepted {
            let audit = self.audit(
                profile_id,
                "face_verification",
                AuditOutcome::Failed,
                json!({ "error": evaluation.message }),
            )?;
            self.repository.append_audit(audit)?;
            warn!(profile_id = %profile_id.0, reason = evaluation.message, "face image rejected");
            return Err(KycError::FaceVerificationRejected(evaluation.message));
        }

        let mut documents = self.repository.documents(profile_id)?;
        let mut matches = Vec::new();
        for document in documents
            .iter_mut()
            .filter(|doc| doc.document_type.has_face())
        {
            let comparison = self.faces.compare(image, DOCUMENT_FACE_PLACEHOLDER);
            document.face_match = Some(DocumentFaceMatch {
                score: comparison.similarity,
                matched: comparison.is_match,
            });
            matches.push(FaceMatchView {
                document_type: document.document_type,
                similarity_score: comparison.similarity,
                is_match: comparison.is_match,
            });
        }

        let face_path = format!("faces/{}_face.jpg", profile_id.0);
        profile.face_image_path = Some(self.cipher.encrypt(&face_path)?);
        profile.face_score = Some(evaluation.quality_score);
        profile.verification_attempts += 1;
        profile.updated_at = Utc::now();
        if !documents.is_empty() {
            profile.verification_level =
                level::monotonic(profile.verification_level, UPI_ELIGIBLE_LEVEL);
        }

        let audit = self.audit(
            profile_id,
            "face_verification",
            AuditOutcome::Success,
            json!({
                "quality_score": evaluation.quality_score,
                "face_matches": matches
                    .iter()
                    .map(|m| json!({
                        "document_type": m.document_type.label(),
                        "similarity_score": m.similarity_score,
                        "is_match": m.is_match,
                    }))
                    .collect::<Vec<_>>(),
            }),
        )?;

        self.repository
            .record_face_verification(profile.clone(), documents, audit)?;

        info!(
            profile_id = %profile_id.0,
            quality = evaluation.quality_score,
            level = profile.verification_level,
            "face verification completed"
        );

        Ok(FaceVerificationResult {
            verification_id: Uuid::new_v4().to_string(),
            face_detected: true,
            image_quality_score: evaluation.quality_score,
            verification_status: "completed",
            face_matches: matches,
        })
    }

    /// Link a bank account. A primary account displaces any existing
    /// primary within the repository transaction.
    pub fn add_bank_account(
        &self,
        profile_id: &ProfileId,
        request: BankAccountRequest,
    ) -> Result<BankAccountView, KycError> {
        self.require_profile(profile_id)?;

        let account_id = Uuid::new_v4().to_string();
        let account = BankAccount {
            account_id: account_id.clone(),
            profile_id: profile_id.clone(),
            bank_name: self.cipher.encrypt(&request.bank_name)?,
            branch_name: self
                .cipher
                .encrypt(request.branch_name.as_deref().unwrap_or(""))?,
            ifsc_code: self.cipher.encrypt(&request.ifsc_code)?,
            account_number: self.cipher.encrypt(&request.account_number)?,
            holder_name: self.cipher.encrypt(&request.account_holder_name)?,
            account_type: request.account_type.clone(),
            is_verified: false,
            is_primary: request.is_primary,
            is_active: true,
            created_at: Utc::now(),
            verified_at: None,
        };

        let audit = self.audit(
            profile_id,
            "bank_account_add",
            AuditOutcome::Success,
            json!({ "account_id": account_id, "bank_name": request.bank_name }),
        )?;
        self.repository.insert_bank_account(account.clone(), audit)?;

        info!(profile_id = %profile_id.0, "bank account linked");
        self.bank_account_view(&account)
    }

    /// Link a payment card, detecting the network from the number prefix.
    pub fn add_payment_card(
        &self,
        profile_id: &ProfileId,
        request: PaymentCardRequest,
    ) -> Result<PaymentCardView, KycError> {
        self.require_profile(profile_id)?;

        let digits: String = request.card_number.chars().filter(|c| *c != ' ').collect();
        let network = CardNetwork::detect(&digits);
        let last_four: String = digits
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let card_id = Uuid::new_v4().to_string();
        let card = PaymentCard {
            card_id: card_id.clone(),
            profile_id: profile_id.clone(),
            card_number: self.cipher.encrypt(&digits)?,
            holder_name: self.cipher.encrypt(&request.card_holder_name)?,
            expiry_month: self.cipher.encrypt(&request.expiry_month)?,
            expiry_year: self.cipher.encrypt(&request.expiry_year)?,
            card_type: request.card_type.clone(),
            last_four,
            bank_name: self
                .cipher
                .encrypt(request.bank_name.as_deref().unwrap_or(""))?,
            network,
            is_verified: false,
            is_primary: request.is_primary,
            is_active: true,
            created_at: Utc::now(),
            verified_at: None,
        };

        let audit = self.audit(
            profile_id,
            "payment_card_add",
            AuditOutcome::Success,
            json!({ "card_id": card_id, "card_type": request.card_type }),
        )?;
        self.repository.insert_card(card.clone(), audit)?;

        info!(profile_id = %profile_id.0, network = network.label(), "payment card linked");
        self.payment_card_view(&card)
    }

    /// Issue the payment handle for a fully verified profile. Eligibility
    /// is recalculated eagerly first so a call made right after face
    /// verification succeeds without an explicit recalculation. A handle,
    /// once assigned, is never regenerated while active.
    pub fn generate_upi_id(
        &self,
        profile_id: &ProfileId,
        preferred_alias: Option<&str>,
    ) -> Result<UpiAssignmentView, KycError> {
        let mut profile = self.require_profile(profile_id)?;
        let documents = self.repository.documents(profile_id)?;
        let face_verified = profile.face_score.is_some();

        if !documents.is_empty()
            && face_verified
            && profile.verification_level < UPI_ELIGIBLE_LEVEL
        {
            profile.verification_level = UPI_ELIGIBLE_LEVEL;
        }

        if profile.verification_level < UPI_ELIGIBLE_LEVEL {
            warn!(
                profile_id = %profile_id.0,
                level = profile.verification_level,
                documents = documents.len(),
                face_verified,
                "handle requested before full verification"
            );
            return Err(KycError::NotEligible);
        }
        if profile.upi_handle.is_some() {
            return Err(KycError::HandleAlreadyAssigned);
        }

        let identity = IdentitySnapshot {
            full_name: self.cipher.decrypt(&profile.full_name)?,
            username: profile.user_id.0.chars().take(8).collect(),
        };

        let mut handle = upi::generate(&identity, preferred_alias);
        if !self.registry.is_available(&handle) {
            // Exactly one retry, without the preferred alias.
            handle = upi::generate(&identity, None);
            if !self.registry.is_available(&handle) {
                return Err(KycError::HandleUnavailable);
            }
        }

        profile.upi_handle = Some(handle.clone());
        profile.upi_status = Some(HandleStatus::Active);
        profile.updated_at = Utc::now();

        let audit = self.audit(
            profile_id,
            "upi_generation",
            AuditOutcome::Success,
            json!({ "upi_id": handle }),
        )?;
        self.repository.update_profile(profile, audit)?;

        info!(profile_id = %profile_id.0, "payment handle assigned");
        Ok(UpiAssignmentView {
            upi_handle: handle,
            status: HandleStatus::Active,
            activation_required: false,
        })
    }

    /// Assemble the full decrypted status for a profile.
    pub fn get_status(&self, profile_id: &ProfileId) -> Result<ProfileStatusView, KycError> {
        let profile = self.require_profile(profile_id)?;
        let documents = self.repository.documents(profile_id)?;
        let accounts = self.repository.bank_accounts(profile_id)?;
        let cards = self.repository.cards(profile_id)?;
        self.compose_status(profile, documents, accounts, cards)
    }

    /// Re-run the promotion logic; persists (and audits) only when the
    /// level actually changes. Never lowers a granted level.
    pub fn recalculate_level(&self, profile_id: &ProfileId) -> Result<LevelChangeView, KycError> {
        let mut profile = self.require_profile(profile_id)?;
        let documents = self.repository.documents(profile_id)?;
        let accounts = self.repository.bank_accounts(profile_id)?;
        let cards = self.repository.cards(profile_id)?;

        let snapshot = self.level_snapshot(&profile, &documents, &accounts, &cards)?;
        let report = level::assess(&snapshot);
        let previous_level = profile.verification_level;
        let new_level = level::monotonic(previous_level, report.verification_level);

        if new_level != previous_level {
            profile.verification_level = new_level;
            profile.updated_at = Utc::now();
            let audit = self.audit(
                profile_id,
                "verification_level_update",
                AuditOutcome::Success,
                json!({ "previous_level": previous_level, "new_level": new_level }),
            )?;
            self.repository.update_profile(profile.clone(), audit)?;
            info!(
                profile_id = %profile_id.0,
                previous_level,
                new_level,
                "verification level updated"
            );
        }

        Ok(LevelChangeView {
            profile_id: profile_id.0.clone(),
            previous_level,
            verification_level: new_level,
            upi_eligible: new_level >= UPI_ELIGIBLE_LEVEL,
            documents_uploaded: !documents.is_empty(),
            face_verified: profile.face_score.is_some(),
        })
    }

    /// Audit entries for a profile, in write order.
    pub fn audit_trail(&self, profile_id: &ProfileId) -> Result<Vec<AuditEntry>, KycError> {
        Ok(self.repository.audit_trail(profile_id)?)
    }

    fn require_profile(&self, profile_id: &ProfileId) -> Result<KycProfile, KycError> {
        self.repository
            .profile(profile_id)?
            .ok_or(KycError::ProfileNotFound)
    }

    fn audit(
        &self,
        profile_id: &ProfileId,
        action: &str,
        outcome: AuditOutcome,
        payload: serde_json::Value,
    ) -> Result<AuditEntry, KycError> {
        let sealed = self.cipher.encrypt(&payload.to_string())?;
        Ok(AuditEntry::new(profile_id.clone(), action, outcome, sealed))
    }

    fn level_snapshot(
        &self,
        profile: &KycProfile,
        documents: &[IdentityDocument],
        accounts: &[BankAccount],
        cards: &[PaymentCard],
    ) -> Result<LevelSnapshot, KycError> {
        let full_name = self.cipher.decrypt(&profile.full_name)?;
        let address_line1 = self.cipher.decrypt(&profile.address_line1)?;
        Ok(LevelSnapshot {
            has_personal_details: !full_name.is_empty(),
            has_address: !address_line1.is_empty(),
            total_documents: documents.len(),
            verified_documents: documents
                .iter()
                .filter(|doc| doc.status == DocumentStatus::Verified)
                .count(),
            face_score: profile.face_score,
            bank_accounts: accounts.len(),
            cards: cards.len(),
        })
    }

    fn compose_status(
        &self,
        profile: KycProfile,
        documents: Vec<IdentityDocument>,
        accounts: Vec<BankAccount>,
        cards: Vec<PaymentCard>,
    ) -> Result<ProfileStatusView, KycError> {
        let snapshot = self.level_snapshot(&profile, &documents, &accounts, &cards)?;
        let report = level::assess(&snapshot);

        let document_views = documents
            .iter()
            .map(|doc| self.document_view(doc))
            .collect::<Result<Vec<_>, _>>()?;
        let account_views = accounts
            .iter()
            .map(|account| self.bank_account_view(account))
            .collect::<Result<Vec<_>, _>>()?;
        let card_views = cards
            .iter()
            .map(|card| self.payment_card_view(card))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ProfileStatusView {
            profile_id: profile.profile_id.0.clone(),
            overall_status: profile.status.label(),
            verification_level: profile.verification_level,
            full_name: self.cipher.decrypt(&profile.full_name)?,
            date_of_birth: self.cipher.decrypt(&profile.date_of_birth)?,
            gender: self.cipher.decrypt(&profile.gender)?,
            address_line1: self.cipher.decrypt(&profile.address_line1)?,
            city: self.cipher.decrypt(&profile.city)?,
            state: self.cipher.decrypt(&profile.state)?,
            pincode: self.cipher.decrypt(&profile.pincode)?,
            upi_handle: profile.upi_handle.clone(),
            upi_status: profile.upi_status,
            upi_eligible: profile.verification_level >= UPI_ELIGIBLE_LEVEL,
            verification_attempts: profile.verification_attempts,
            completion_percentage: report.completion_percentage,
            pending_steps: report.pending_steps,
            next_action: report.next_action,
            personal_details_complete: snapshot.has_personal_details,
            address_verified: snapshot.has_address,
            documents_verified: snapshot.verified_documents > 0,
            face_verified: profile.face_score.is_some(),
            bank_account_added: !accounts.is_empty(),
            payment_card_added: !cards.is_empty(),
            documents: document_views,
            bank_accounts: account_views,
            cards: card_views,
            created_at: profile.created_at,
            verified_at: profile.verified_at,
            expires_at: profile.expires_at,
        })
    }

    fn document_view(&self, document: &IdentityDocument) -> Result<DocumentView, KycError> {
        let number = self.cipher.decrypt(&document.number)?;
        Ok(DocumentView {
            document_id: document.document_id.clone(),
            document_type: document.document_type,
            document_number: mask_for(document.document_type, &number),
            document_name: self.cipher.decrypt(&document.holder_name)?,
            verification_status: document.status.label(),
            verification_score: document.confidence,
            face_match_status: match document.face_match {
                Some(m) if m.matched => "matched",
                Some(_) => "not_matched",
                None => "pending",
            },
            face_match_score: document.face_match.map(|m| m.score).unwrap_or(0.0),
            is_primary: document.is_primary,
            uploaded_at: document.uploaded_at,
            verified_at: document.verified_at,
        })
    }

    fn bank_account_view(&self, account: &BankAccount) -> Result<BankAccountView, KycError> {
        let number = self.cipher.decrypt(&account.account_number)?;
        let branch = self.cipher.decrypt(&account.branch_name)?;
        Ok(BankAccountView {
            account_id: account.account_id.clone(),
            bank_name: self.cipher.decrypt(&account.bank_name)?,
            branch_name: (!branch.is_empty()).then_some(branch),
            ifsc_code: self.cipher.decrypt(&account.ifsc_code)?,
            account_number: identifiers::mask(MaskKind::AccountNumber, &number),
            holder_name: self.cipher.decrypt(&account.holder_name)?,
            account_type: account.account_type.clone(),
            is_verified: account.is_verified,
            is_primary: account.is_primary,
            is_active: account.is_active,
            created_at: account.created_at,
        })
    }

    fn payment_card_view(&self, card: &PaymentCard) -> Result<PaymentCardView, KycError> {
        let bank = self.cipher.decrypt(&card.bank_name)?;
        Ok(PaymentCardView {
            card_id: card.card_id.clone(),
            last_four: card.last_four.clone(),
            holder_name: self.cipher.decrypt(&card.holder_name)?,
            expiry_month: self.cipher.decrypt(&card.expiry_month)?,
            expiry_year: self.cipher.decrypt(&card.expiry_year)?,
            card_type: card.card_type.clone(),
            bank_name: (!bank.is_empty()).then_some(bank),
            network: card.network.label(),
            is_verified: card.is_verified,
            is_primary: card.is_primary,
            is_active: card.is_active,
            created_at: card.created_at,
        })
    }
}

fn mask_for(document_type: super::domain::DocumentType, number: &str) -> String {
    let kind = match document_type {
        super::domain::DocumentType::NationalId => MaskKind::NationalId,
        super::domain::DocumentType::TaxId => MaskKind::TaxId,
        _ => MaskKind::Other,
    };
    identifiers::mask(kind, number)
}
