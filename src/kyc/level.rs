//! Completion and verification-level calculation.
//!
//! Two independent scales: the completion percentage weighs six onboarding
//! steps equally (cards included), while the verification level (0-2) gates
//! feature eligibility and ignores cards. "100% complete" and "level 2" are
//! deliberately not the same thing.

use serde::Serialize;

/// Number of equally weighted completion steps.
const TOTAL_STEPS: u32 = 6;

/// The level at which a profile becomes eligible for a payment handle.
pub const UPI_ELIGIBLE_LEVEL: u8 = 2;

pub const STEP_PERSONAL_DETAILS: &str = "Complete personal details";
pub const STEP_ADDRESS: &str = "Add address information";
pub const STEP_DOCUMENTS: &str = "Upload and verify identity documents";
pub const STEP_FACE: &str = "Complete face verification";
pub const STEP_BANK_ACCOUNT: &str = "Add bank account details";
pub const ALL_STEPS_COMPLETE: &str = "KYC verification complete";

/// Snapshot of completed steps, assembled by the orchestrator from persisted
/// state. Pure data: the calculator never touches storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelSnapshot {
    pub has_personal_details: bool,
    pub has_address: bool,
    pub total_documents: usize,
    pub verified_documents: usize,
    pub face_score: Option<f32>,
    pub bank_accounts: usize,
    pub cards: usize,
}

/// Calculator output: completion scale plus the discrete level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelReport {
    pub completion_percentage: u8,
    pub pending_steps: Vec<&'static str>,
    pub next_action: &'static str,
    pub verification_level: u8,
}

impl LevelSnapshot {
    fn face_verified(&self) -> bool {
        self.face_score.map(|score| score > 0.0).unwrap_or(false)
    }
}

/// Evaluate the snapshot. The returned level is the *computed* level; callers
/// must clamp against the persisted level via [`monotonic`] before writing.
pub fn assess(snapshot: &LevelSnapshot) -> LevelReport {
    let steps = [
        snapshot.has_personal_details,
        snapshot.has_address,
        snapshot.verified_documents > 0,
        snapshot.face_verified(),
        snapshot.bank_accounts > 0,
        snapshot.cards > 0,
    ];
    let completed = steps.iter().filter(|done| **done).count() as u32;
    let completion_percentage =
        ((completed as f32 / TOTAL_STEPS as f32) * 100.0).round() as u8;

    // Card setup is optional and never blocks completion messaging.
    let mut pending_steps = Vec::new();
    if !snapshot.has_personal_details {
        pending_steps.push(STEP_PERSONAL_DETAILS);
    }
    if !snapshot.has_address {
        pending_steps.push(STEP_ADDRESS);
    }
    if snapshot.verified_documents == 0 {
        pending_steps.push(STEP_DOCUMENTS);
    }
    if !snapshot.face_verified() {
        pending_steps.push(STEP_FACE);
    }
    if snapshot.bank_accounts == 0 {
        pending_steps.push(STEP_BANK_ACCOUNT);
    }

    let next_action = pending_steps.first().copied().unwrap_or(ALL_STEPS_COMPLETE);

    let mut verification_level = 0;
    if snapshot.total_documents > 0 {
        verification_level = 1;
    }
    if snapshot.total_documents > 0 && snapshot.face_score.is_some() {
        verification_level = UPI_ELIGIBLE_LEVEL;
    }

    LevelReport {
        completion_percentage,
        pending_steps,
        next_action,
        verification_level,
    }
}

/// Level transitions are monotonic: recomputation may raise but never lower
/// an already granted level.
pub fn monotonic(persisted: u8, computed: u8) -> u8 {
    computed.max(persisted)
}
