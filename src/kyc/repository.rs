//! Storage abstraction for KYC state.
//!
//! Every trait method is one transaction: the business write and its audit
//! entry commit together or not at all, and the primary-flag flips happen
//! inside the same scope as the insert so no reader ever observes zero or
//! two primaries. A relational implementation backs this in production; the
//! in-memory implementation here serves the demo binary and the test suite.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::domain::{
    AuditEntry, BankAccount, IdentityDocument, KycProfile, PaymentCard, ProfileId, UserId,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("write failed and was rolled back: {0}")]
    Fatal(String),
}

/// Transactional persistence for profiles and their satellite records.
///
/// Uniqueness contracts: one profile per user, one document per
/// (profile, type), one payment handle platform-wide. Writes for a single
/// profile serialize; concurrent primary-flag updates are last-commit-wins
/// without an inconsistent intermediate state.
pub trait KycRepository: Send + Sync {
    fn user_exists(&self, user: &UserId) -> Result<bool, RepositoryError>;

    /// Insert a new profile with its creation audit entry. `Conflict` when
    /// the user already has a profile.
    fn insert_profile(&self, profile: KycProfile, audit: AuditEntry)
        -> Result<(), RepositoryError>;

    fn profile(&self, id: &ProfileId) -> Result<Option<KycProfile>, RepositoryError>;

    fn profile_by_user(&self, user: &UserId) -> Result<Option<KycProfile>, RepositoryError>;

    /// Persist profile mutations together with the audit entry describing
    /// them. `NotFound` when the profile does not exist.
    fn update_profile(&self, profile: KycProfile, audit: AuditEntry)
        -> Result<(), RepositoryError>;

    /// Insert a document; `Conflict` when one of the same type already
    /// exists for the profile.
    fn insert_document(
        &self,
        document: IdentityDocument,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError>;

    fn documents(&self, id: &ProfileId) -> Result<Vec<IdentityDocument>, RepositoryError>;

    /// Commit a face verification: the updated profile, the per-document
    /// match results, and the audit entry land in one transaction.
    fn record_face_verification(
        &self,
        profile: KycProfile,
        documents: Vec<IdentityDocument>,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError>;

    /// Insert a bank account. When the new account is primary, all prior
    /// primaries for the profile are unset in the same transaction.
    fn insert_bank_account(
        &self,
        account: BankAccount,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError>;

    fn bank_accounts(&self, id: &ProfileId) -> Result<Vec<BankAccount>, RepositoryError>;

    /// Insert a payment card with the same primary-exclusivity contract as
    /// bank accounts.
    fn insert_card(&self, card: PaymentCard, audit: AuditEntry) -> Result<(), RepositoryError>;

    fn cards(&self, id: &ProfileId) -> Result<Vec<PaymentCard>, RepositoryError>;

    /// Append a standalone audit entry (used for failed operations, which
    /// have no business write to share a transaction with).
    fn append_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError>;

    /// Audit entries for a profile in write order.
    fn audit_trail(&self, id: &ProfileId) -> Result<Vec<AuditEntry>, RepositoryError>;
}

#[derive(Default)]
struct MemoryState {
    users: HashSet<UserId>,
    profiles: HashMap<ProfileId, KycProfile>,
    profiles_by_user: HashMap<UserId, ProfileId>,
    documents: HashMap<ProfileId, Vec<IdentityDocument>>,
    accounts: HashMap<ProfileId, Vec<BankAccount>>,
    cards: HashMap<ProfileId, Vec<PaymentCard>>,
    audit: Vec<AuditEntry>,
}

/// In-memory repository. A single mutex stands in for transaction isolation:
/// each method runs to completion under the lock, so the transactional
/// contract above holds trivially.
#[derive(Default)]
pub struct MemoryKycRepository {
    state: Mutex<MemoryState>,
    accept_unknown_users: bool,
}

impl MemoryKycRepository {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("kyc state lock poisoned".to_string()))
    }

    /// Repository that treats every user reference as valid; used by the
    /// demo binary where no user store is wired up.
    pub fn open() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            accept_unknown_users: true,
        }
    }

    /// Mark a user as known so `create_profile` accepts it.
    pub fn register_user(&self, user: UserId) {
        if let Ok(mut state) = self.state.lock() {
            state.users.insert(user);
        }
    }
}

impl KycRepository for MemoryKycRepository {
    fn user_exists(&self, user: &UserId) -> Result<bool, RepositoryError> {
        if self.accept_unknown_users {
            return Ok(true);
        }
        let state = self.lock()?;
        Ok(state.users.contains(user))
    }

    fn insert_profile(
        &self,
        profile: KycProfile,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if state.profiles_by_user.contains_key(&profile.user_id) {
            return Err(RepositoryError::Conflict);
        }
        state
            .profiles_by_user
            .insert(profile.user_id.clone(), profile.profile_id.clone());
        state.profiles.insert(profile.profile_id.clone(), profile);
        state.audit.push(audit);
        Ok(())
    }

    fn profile(&self, id: &ProfileId) -> Result<Option<KycProfile>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.profiles.get(id).cloned())
    }

    fn profile_by_user(&self, user: &UserId) -> Result<Option<KycProfile>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .profiles_by_user
            .get(user)
            .and_then(|id| state.profiles.get(id))
            .cloned())
    }

    fn update_profile(
        &self,
        profile: KycProfile,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.profiles.contains_key(&profile.profile_id) {
            return Err(RepositoryError::NotFound);
        }
        state.profiles.insert(profile.profile_id.clone(), profile);
        state.audit.push(audit);
        Ok(())
    }

    fn insert_document(
        &self,
        document: IdentityDocument,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let documents = state.documents.entry(document.profile_id.clone()).or_default();
        if documents
            .iter()
            .any(|existing| existing.document_type == document.document_type)
        {
            return Err(RepositoryError::Conflict);
        }
        documents.push(document);
        state.audit.push(audit);
        Ok(())
    }

    fn documents(&self, id: &ProfileId) -> Result<Vec<IdentityDocument>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.documents.get(id).cloned().unwrap_or_default())
    }

    fn record_face_verification(
        &self,
        profile: KycProfile,
        documents: Vec<IdentityDocument>,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        if !state.profiles.contains_key(&profile.profile_id) {
            return Err(RepositoryError::NotFound);
        }
        let stored = state.documents.entry(profile.profile_id.clone()).or_default();
        for updated in documents {
            if let Some(slot) = stored
                .iter_mut()
                .find(|doc| doc.document_id == updated.document_id)
            {
                *slot = updated;
            }
        }
        state.profiles.insert(profile.profile_id.clone(), profile);
        state.audit.push(audit);
        Ok(())
    }

    fn insert_bank_account(
        &self,
        account: BankAccount,
        audit: AuditEntry,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let accounts = state.accounts.entry(account.profile_id.clone()).or_default();
        if account.is_primary {
            for existing in accounts.iter_mut() {
                existing.is_primary = false;
            }
        }
        accounts.push(account);
        state.audit.push(audit);
        Ok(())
    }

    fn bank_accounts(&self, id: &ProfileId) -> Result<Vec<BankAccount>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.accounts.get(id).cloned().unwrap_or_default())
    }

    fn insert_card(&self, card: PaymentCard, audit: AuditEntry) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        let cards = state.cards.entry(card.profile_id.clone()).or_default();
        if card.is_primary {
            for existing in cards.iter_mut() {
                existing.is_primary = false;
            }
        }
        cards.push(card);
        state.audit.push(audit);
        Ok(())
    }

    fn cards(&self, id: &ProfileId) -> Result<Vec<PaymentCard>, RepositoryError> {
        let state = self.lock()?;
        Ok(state.cards.get(id).cloned().unwrap_or_default())
    }

    fn append_audit(&self, entry: AuditEntry) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        state.audit.push(entry);
        Ok(())
    }

    fn audit_trail(&self, id: &ProfileId) -> Result<Vec<AuditEntry>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .audit
            .iter()
            .filter(|entry| entry.profile_id == *id)
            .cloned()
            .collect())
    }
}
