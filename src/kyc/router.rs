//! HTTP surface for the KYC workflow. Image payloads arrive base64-encoded
//! inside the JSON bodies and are decoded at this boundary; everything past
//! the handlers works on raw bytes.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::security::FieldCipher;

use super::domain::{
    AddressDetails, BankAccountRequest, DocumentType, DocumentUpload, PaymentCardRequest,
    PersonalDetails, ProfileId, UserId,
};
use super::face::FaceEngine;
use super::repository::{KycRepository, RepositoryError};
use super::service::{KycError, KycService};
use super::upi::HandleRegistry;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateProfileRequest {
    user_id: String,
    personal_details: PersonalDetails,
    address: AddressDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentUploadRequest {
    document_type: DocumentType,
    document_number: String,
    document_name: String,
    front_image: String,
    #[serde(default)]
    back_image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FaceUploadRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HandleRequest {
    #[serde(default)]
    preferred_alias: Option<String>,
}

/// Router builder exposing the KYC endpoints.
pub fn kyc_router<R, C, F, G>(service: Arc<KycService<R, C, F, G>>) -> Router
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    Router::new()
        .route("/api/v1/kyc/profiles", post(create_profile_handler::<R, C, F, G>))
        .route(
            "/api/v1/kyc/profiles/:profile_id",
            get(status_handler::<R, C, F, G>),
        )
        .route(
            "/api/v1/kyc/profiles/:profile_id/documents",
            post(document_handler::<R, C, F, G>),
        )
        .route(
            "/api/v1/kyc/profiles/:profile_id/face",
            post(face_handler::<R, C, F, G>),
        )
        .route(
            "/api/v1/kyc/profiles/:profile_id/bank-accounts",
            post(bank_account_handler::<R, C, F, G>),
        )
        .route(
            "/api/v1/kyc/profiles/:profile_id/cards",
            post(card_handler::<R, C, F, G>),
        )
        .route(
            "/api/v1/kyc/profiles/:profile_id/upi",
            post(upi_handler::<R, C, F, G>),
        )
        .route(
            "/api/v1/kyc/profiles/:profile_id/level/recalculate",
            post(recalculate_handler::<R, C, F, G>),
        )
        .with_state(service)
}

pub(crate) async fn create_profile_handler<R, C, F, G>(
    State(service): State<Arc<KycService<R, C, F, G>>>,
    axum::Json(request): axum::Json<CreateProfileRequest>,
) -> Response
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    match service.create_profile(UserId(request.user_id), request.personal_details, request.address)
    {
        Ok(view) => (StatusCode::CREATED, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn status_handler<R, C, F, G>(
    State(service): State<Arc<KycService<R, C, F, G>>>,
    Path(profile_id): Path<String>,
) -> Response
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    match service.get_status(&ProfileId(profile_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn document_handler<R, C, F, G>(
    State(service): State<Arc<KycService<R, C, F, G>>>,
    Path(profile_id): Path<String>,
    axum::Json(request): axum::Json<DocumentUploadRequest>,
) -> Response
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    let front_image = match BASE64.decode(&request.front_image) {
        Ok(bytes) => bytes,
        Err(_) => return invalid_image_response(),
    };
    let back_image = match request.back_image {
        Some(encoded) => match BASE64.decode(&encoded) {
            Ok(bytes) => Some(bytes),
            Err(_) => return invalid_image_response(),
        },
        None => None,
    };

    let upload = DocumentUpload {
        document_type: request.document_type,
        document_number: request.document_number,
        document_name: request.document_name,
        front_image,
        back_image,
    };
    match service.upload_document(&ProfileId(profile_id), upload) {
        Ok(view) => (StatusCode::CREATED, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn face_handler<R, C, F, G>(
    State(service): State<Arc<KycService<R, C, F, G>>>,
    Path(profile_id): Path<String>,
    axum::Json(request): axum::Json<FaceUploadRequest>,
) -> Response
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    let image = match BASE64.decode(&request.image) {
        Ok(bytes) => bytes,
        Err(_) => return invalid_image_response(),
    };
    match service.upload_face_image(&ProfileId(profile_id), &image) {
        Ok(result) => (StatusCode::OK, axum::Json(result)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn bank_account_handler<R, C, F, G>(
    State(service): State<Arc<KycService<R, C, F, G>>>,
    Path(profile_id): Path<String>,
    axum::Json(request): axum::Json<BankAccountRequest>,
) -> Response
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    match service.add_bank_account(&ProfileId(profile_id), request) {
        Ok(view) => (StatusCode::CREATED, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn card_handler<R, C, F, G>(
    State(service): State<Arc<KycService<R, C, F, G>>>,
    Path(profile_id): Path<String>,
    axum::Json(request): axum::Json<PaymentCardRequest>,
) -> Response
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    match service.add_payment_card(&ProfileId(profile_id), request) {
        Ok(view) => (StatusCode::CREATED, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn upi_handler<R, C, F, G>(
    State(service): State<Arc<KycService<R, C, F, G>>>,
    Path(profile_id): Path<String>,
    axum::Json(request): axum::Json<HandleRequest>,
) -> Response
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    match service.generate_upi_id(&ProfileId(profile_id), request.preferred_alias.as_deref()) {
        Ok(view) => (StatusCode::CREATED, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recalculate_handler<R, C, F, G>(
    State(service): State<Arc<KycService<R, C, F, G>>>,
    Path(profile_id): Path<String>,
) -> Response
where
    R: KycRepository + 'static,
    C: FieldCipher + 'static,
    F: FaceEngine + 'static,
    G: HandleRegistry + 'static,
{
    match service.recalculate_level(&ProfileId(profile_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

fn invalid_image_response() -> Response {
    let payload = json!({ "error": "image payload is not valid base64" });
    (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
}

fn error_response(error: KycError) -> Response {
    let status = match &error {
        KycError::UserNotFound | KycError::ProfileNotFound => StatusCode::NOT_FOUND,
        KycError::DuplicateProfile
        | KycError::DuplicateDocument(_)
        | KycError::HandleAlreadyAssigned => StatusCode::CONFLICT,
        KycError::InvalidDocumentNumber(_) | KycError::FaceVerificationRejected(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        KycError::NotEligible => StatusCode::FORBIDDEN,
        KycError::HandleUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        KycError::Repository(RepositoryError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
