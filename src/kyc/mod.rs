//! Identity verification workflow: profile onboarding, document and face
//! verification, payment instruments, level progression, and handle issuance.

pub mod domain;
pub mod face;
pub mod identifiers;
pub mod level;
pub mod repository;
pub mod router;
pub mod service;
pub mod upi;

pub use repository::{KycRepository, MemoryKycRepository};
pub use router::kyc_router;
pub use service::{KycError, KycService};
