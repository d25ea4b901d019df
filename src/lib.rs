//! Core backend for the super-app platform: KYC identity verification and
//! semantic product search.
//!
//! The KYC side owns the profile lifecycle (documents, face verification,
//! verification levels, payment handles) behind a transactional repository
//! trait. The search side maintains an embedding index over the product
//! catalog with filtered nearest-neighbor retrieval. External collaborators
//! (storage, encryption keys, embedding models, the handle registry) are
//! injected at construction so every piece can be exercised in isolation.

pub mod config;
pub mod error;
pub mod kyc;
pub mod search;
pub mod security;
pub mod telemetry;
