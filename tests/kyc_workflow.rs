//! End-to-end KYC scenarios through the service facade and the router.

use std::sync::Arc;

use axum::http::StatusCode;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tower::ServiceExt;

use superapp::kyc::domain::{
    AddressDetails, BankAccountRequest, DocumentType, DocumentUpload, PaymentCardRequest,
    PersonalDetails, ProfileId, UserId,
};
use superapp::kyc::face::{synthetic_png, HeuristicFaceEngine};
use superapp::kyc::repository::KycRepository;
use superapp::kyc::upi::{HandleRegistry, OpenRegistry};
use superapp::kyc::{kyc_router, KycError, KycService, MemoryKycRepository};
use superapp::security::AesFieldCipher;

const VALID_NATIONAL_ID: &str = "234123412346";
const VALID_TAX_ID: &str = "ABCDE1234F";

type TestService = KycService<MemoryKycRepository, AesFieldCipher, HeuristicFaceEngine, OpenRegistry>;

fn service() -> (Arc<TestService>, Arc<MemoryKycRepository>) {
    let repository = Arc::new(MemoryKycRepository::open());
    let service = Arc::new(KycService::new(
        repository.clone(),
        Arc::new(AesFieldCipher::new("workflow-test-key")),
        Arc::new(HeuristicFaceEngine::default()),
        Arc::new(OpenRegistry),
    ));
    (service, repository)
}

fn personal_details() -> PersonalDetails {
    PersonalDetails {
        full_name: "Asha Kumari Verma".to_string(),
        date_of_birth: "1993-04-11".to_string(),
        gender: "female".to_string(),
        father_name: "Ramesh Verma".to_string(),
        mother_name: Some("Sunita Verma".to_string()),
    }
}

fn address_details() -> AddressDetails {
    AddressDetails {
        address_line1: "14 Lakeview Road".to_string(),
        address_line2: None,
        city: "Pune".to_string(),
        state: "Maharashtra".to_string(),
        pincode: "411001".to_string(),
        country: "India".to_string(),
    }
}

fn national_id_upload() -> DocumentUpload {
    DocumentUpload {
        document_type: DocumentType::NationalId,
        document_number: VALID_NATIONAL_ID.to_string(),
        document_name: "Asha Kumari Verma".to_string(),
        front_image: synthetic_png(800, 600),
        back_image: Some(synthetic_png(800, 600)),
    }
}

fn bank_account(is_primary: bool) -> BankAccountRequest {
    BankAccountRequest {
        bank_name: "State Bank".to_string(),
        branch_name: Some("Pune Main".to_string()),
        ifsc_code: "SBIN0001234".to_string(),
        account_number: "123456789012".to_string(),
        account_holder_name: "Asha Kumari Verma".to_string(),
        account_type: "savings".to_string(),
        is_primary,
    }
}

fn payment_card(number: &str, is_primary: bool) -> PaymentCardRequest {
    PaymentCardRequest {
        card_number: number.to_string(),
        card_holder_name: "Asha Kumari Verma".to_string(),
        expiry_month: "09".to_string(),
        expiry_year: "2029".to_string(),
        card_type: "debit".to_string(),
        bank_name: Some("State Bank".to_string()),
        is_primary,
    }
}

fn onboard(service: &TestService) -> ProfileId {
    let status = service
        .create_profile(
            UserId("user-asha-0001".to_string()),
            personal_details(),
            address_details(),
        )
        .expect("profile creates");
    ProfileId(status.profile_id)
}

async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[test]
fn full_verification_path_reaches_handle_issuance() {
    let (service, _) = service();
    let profile_id = onboard(&service);

    let document = service
        .upload_document(&profile_id, national_id_upload())
        .expect("document uploads");
    assert_eq!(document.verification_status, "pending");
    assert!(document.is_primary);
    // Number comes back masked, never in the clear.
    assert!(document.document_number.ends_with("2346"));
    assert!(!document.document_number.contains(&VALID_NATIONAL_ID[..8]));

    let result = service
        .upload_face_image(&profile_id, &synthetic_png(500, 500))
        .expect("face accepted");
    assert!(result.face_detected);
    assert!((result.image_quality_score - 0.80).abs() < 0.005);
    assert_eq!(result.face_matches.len(), 1);

    let assignment = service
        .generate_upi_id(&profile_id, Some("ashapay"))
        .expect("handle issues after face verification without recalculation");
    assert!(assignment.upi_handle.starts_with("ashapay"));
    assert!(superapp::kyc::upi::validate_format(&assignment.upi_handle));

    let status = service.get_status(&profile_id).expect("status");
    assert_eq!(status.verification_level, 2);
    assert!(status.upi_eligible);
    assert_eq!(status.upi_handle.as_deref(), Some(assignment.upi_handle.as_str()));
    assert!(status.face_verified);
    assert_eq!(status.documents.len(), 1);
}

#[test]
fn strict_repository_rejects_unknown_user_references() {
    // Default construction only accepts users registered up front, unlike
    // `open()` which trusts every reference.
    let repository = Arc::new(MemoryKycRepository::default());
    repository.register_user(UserId("user-known".to_string()));
    let service = KycService::new(
        repository,
        Arc::new(AesFieldCipher::new("workflow-test-key")),
        Arc::new(HeuristicFaceEngine::default()),
        Arc::new(OpenRegistry),
    );

    match service.create_profile(
        UserId("user-unknown".to_string()),
        personal_details(),
        address_details(),
    ) {
        Err(KycError::UserNotFound) => {}
        other => panic!("expected user not found, got {other:?}"),
    }

    service
        .create_profile(
            UserId("user-known".to_string()),
            personal_details(),
            address_details(),
        )
        .expect("registered user onboards");
}

#[test]
fn invalid_document_number_rolls_back_cleanly() {
    let (service, repository) = service();
    let profile_id = onboard(&service);

    let mut upload = national_id_upload();
    // Flip one digit so the checksum fails.
    upload.document_number = "234123412345".to_string();
    match service.upload_document(&profile_id, upload) {
        Err(KycError::InvalidDocumentNumber("national_id")) => {}
        other => panic!("expected invalid document number, got {other:?}"),
    }

    assert!(repository.documents(&profile_id).unwrap().is_empty());
    let trail = service.audit_trail(&profile_id).expect("audit trail");
    assert!(trail.iter().all(|entry| entry.action != "document_upload"));
}

#[test]
fn rejected_face_leaves_a_failed_audit_entry_and_no_score() {
    let (service, _) = service();
    let profile_id = onboard(&service);
    service
        .upload_document(&profile_id, national_id_upload())
        .expect("document uploads");

    match service.upload_face_image(&profile_id, &synthetic_png(100, 100)) {
        Err(KycError::FaceVerificationRejected(reason)) => {
            assert_eq!(reason, "Image resolution too low");
        }
        other => panic!("expected face rejection, got {other:?}"),
    }

    let status = service.get_status(&profile_id).expect("status");
    assert!(!status.face_verified);
    assert_eq!(status.verification_attempts, 0);
    // Promotion only happens on acceptance or explicit recalculation.
    assert_eq!(status.verification_level, 0);
    let change = service.recalculate_level(&profile_id).expect("recalculate");
    assert_eq!(change.verification_level, 1);

    let trail = service.audit_trail(&profile_id).expect("audit trail");
    let face_entries: Vec<_> = trail
        .iter()
        .filter(|entry| entry.action == "face_verification")
        .collect();
    assert_eq!(face_entries.len(), 1);
    assert_eq!(
        face_entries[0].outcome,
        superapp::kyc::domain::AuditOutcome::Failed
    );
}

#[test]
fn oversized_and_undecodable_images_are_rejected_with_distinct_reasons() {
    let (service, _) = service();
    let profile_id = onboard(&service);

    let oversized = vec![0u8; 5 * 1024 * 1024 + 1];
    match service.upload_face_image(&profile_id, &oversized) {
        Err(KycError::FaceVerificationRejected("Image file too large")) => {}
        other => panic!("expected size rejection, got {other:?}"),
    }

    match service.upload_face_image(&profile_id, b"not an image") {
        Err(KycError::FaceVerificationRejected("Image could not be decoded")) => {}
        other => panic!("expected decode rejection, got {other:?}"),
    }
}

#[test]
fn handle_issuance_requires_full_verification() {
    let (service, _) = service();
    let profile_id = onboard(&service);

    match service.generate_upi_id(&profile_id, None) {
        Err(KycError::NotEligible) => {}
        other => panic!("expected not eligible, got {other:?}"),
    }

    // A document alone is not enough.
    service
        .upload_document(&profile_id, national_id_upload())
        .expect("document uploads");
    match service.generate_upi_id(&profile_id, None) {
        Err(KycError::NotEligible) => {}
        other => panic!("expected not eligible, got {other:?}"),
    }
}

#[test]
fn duplicate_guards_hold_across_the_workflow() {
    let (service, _) = service();
    let profile_id = onboard(&service);

    match service.create_profile(
        UserId("user-asha-0001".to_string()),
        personal_details(),
        address_details(),
    ) {
        Err(KycError::DuplicateProfile) => {}
        other => panic!("expected duplicate profile, got {other:?}"),
    }

    service
        .upload_document(&profile_id, national_id_upload())
        .expect("first upload succeeds");
    match service.upload_document(&profile_id, national_id_upload()) {
        Err(KycError::DuplicateDocument("national_id")) => {}
        other => panic!("expected duplicate document, got {other:?}"),
    }

    // A second document type is still allowed.
    let tax_upload = DocumentUpload {
        document_type: DocumentType::TaxId,
        document_number: VALID_TAX_ID.to_string(),
        document_name: "Asha Kumari Verma".to_string(),
        front_image: synthetic_png(800, 600),
        back_image: None,
    };
    service
        .upload_document(&profile_id, tax_upload)
        .expect("tax id uploads");

    service
        .upload_face_image(&profile_id, &synthetic_png(640, 480))
        .expect("face accepted");
    service
        .generate_upi_id(&profile_id, None)
        .expect("handle issues");
    match service.generate_upi_id(&profile_id, None) {
        Err(KycError::HandleAlreadyAssigned) => {}
        other => panic!("expected already assigned, got {other:?}"),
    }
}

#[test]
fn exhausted_registry_fails_after_one_retry() {
    struct ClosedRegistry;
    impl HandleRegistry for ClosedRegistry {
        fn is_available(&self, _handle: &str) -> bool {
            false
        }
    }

    let repository = Arc::new(MemoryKycRepository::open());
    let service = KycService::new(
        repository,
        Arc::new(AesFieldCipher::new("workflow-test-key")),
        Arc::new(HeuristicFaceEngine::default()),
        Arc::new(ClosedRegistry),
    );

    let status = service
        .create_profile(
            UserId("user-asha-0002".to_string()),
            personal_details(),
            address_details(),
        )
        .expect("profile creates");
    let profile_id = ProfileId(status.profile_id);
    service
        .upload_document(&profile_id, national_id_upload())
        .expect("document uploads");
    service
        .upload_face_image(&profile_id, &synthetic_png(640, 480))
        .expect("face accepted");

    match service.generate_upi_id(&profile_id, Some("ashapay")) {
        Err(KycError::HandleUnavailable) => {}
        other => panic!("expected handle unavailable, got {other:?}"),
    }
    // Nothing was persisted for the failed issuance.
    let status = service.get_status(&profile_id).expect("status");
    assert!(status.upi_handle.is_none());
}

#[test]
fn primary_flags_stay_exclusive_per_profile() {
    let (service, _) = service();
    let profile_id = onboard(&service);

    service
        .add_bank_account(&profile_id, bank_account(true))
        .expect("first account");
    service
        .add_bank_account(&profile_id, bank_account(true))
        .expect("second account");

    service
        .add_payment_card(&profile_id, payment_card("4111111111111111", true))
        .expect("first card");
    service
        .add_payment_card(&profile_id, payment_card("5212345678901234", true))
        .expect("second card");

    let status = service.get_status(&profile_id).expect("status");
    assert_eq!(
        status.bank_accounts.iter().filter(|a| a.is_primary).count(),
        1
    );
    assert_eq!(status.cards.iter().filter(|c| c.is_primary).count(), 1);
    // The new primary wins.
    assert!(status.bank_accounts[1].is_primary);
    assert!(status.cards[1].is_primary);
    assert_eq!(status.cards[0].network, "visa");
    assert_eq!(status.cards[1].network, "mastercard");
    assert_eq!(status.cards[0].last_four, "1111");
    // Account numbers come back masked.
    assert!(status.bank_accounts[0].account_number.ends_with("9012"));
    assert!(status.bank_accounts[0].account_number.starts_with('X'));
}

#[test]
fn status_is_idempotent_and_levels_never_regress() {
    let (service, _) = service();
    let profile_id = onboard(&service);
    service
        .upload_document(&profile_id, national_id_upload())
        .expect("document uploads");
    service
        .upload_face_image(&profile_id, &synthetic_png(640, 480))
        .expect("face accepted");

    let first = service.get_status(&profile_id).expect("status");
    let second = service.get_status(&profile_id).expect("status");
    assert_eq!(first.verification_level, second.verification_level);
    assert_eq!(first.completion_percentage, second.completion_percentage);
    assert_eq!(first.pending_steps, second.pending_steps);

    let change = service.recalculate_level(&profile_id).expect("recalculate");
    assert_eq!(change.previous_level, 2);
    assert_eq!(change.verification_level, 2);

    // Repeated recalculation with no new facts never lowers the level.
    let change = service.recalculate_level(&profile_id).expect("recalculate");
    assert_eq!(change.verification_level, 2);
}

#[test]
fn completion_counts_six_equal_steps() {
    let (service, _) = service();
    let profile_id = onboard(&service);

    let status = service.get_status(&profile_id).expect("status");
    // Personal details + address out of six steps.
    assert_eq!(status.completion_percentage, 33);
    assert_eq!(status.next_action, "Upload and verify identity documents");

    service
        .add_bank_account(&profile_id, bank_account(true))
        .expect("account");
    let status = service.get_status(&profile_id).expect("status");
    assert_eq!(status.completion_percentage, 50);
}

#[test]
fn audit_trail_is_ordered_by_write_sequence() {
    let (service, _) = service();
    let profile_id = onboard(&service);
    service
        .upload_document(&profile_id, national_id_upload())
        .expect("document uploads");
    service
        .upload_face_image(&profile_id, &synthetic_png(640, 480))
        .expect("face accepted");
    service
        .add_bank_account(&profile_id, bank_account(true))
        .expect("account");

    let actions: Vec<String> = service
        .audit_trail(&profile_id)
        .expect("audit trail")
        .into_iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        actions,
        vec![
            "profile_creation",
            "document_upload",
            "face_verification",
            "bank_account_add"
        ]
    );
}

#[tokio::test]
async fn router_runs_the_workflow_over_http() {
    let (service, _) = service();
    let router = kyc_router(service);

    let create = router
        .clone()
        .oneshot(
            axum::http::Request::post("/api/v1/kyc/profiles")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    json!({
                        "user_id": "user-asha-0003",
                        "personal_details": personal_details(),
                        "address": address_details(),
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(create.status(), StatusCode::CREATED);
    let profile = read_json_body(create).await;
    let profile_id = profile
        .get("profile_id")
        .and_then(Value::as_str)
        .expect("profile id")
        .to_string();

    let upload = router
        .clone()
        .oneshot(
            axum::http::Request::post(format!("/api/v1/kyc/profiles/{profile_id}/documents"))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    json!({
                        "document_type": "national_id",
                        "document_number": VALID_NATIONAL_ID,
                        "document_name": "Asha Kumari Verma",
                        "front_image": BASE64.encode(synthetic_png(800, 600)),
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(upload.status(), StatusCode::CREATED);

    let face = router
        .clone()
        .oneshot(
            axum::http::Request::post(format!("/api/v1/kyc/profiles/{profile_id}/face"))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    json!({ "image": BASE64.encode(synthetic_png(640, 480)) }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(face.status(), StatusCode::OK);

    let upi = router
        .clone()
        .oneshot(
            axum::http::Request::post(format!("/api/v1/kyc/profiles/{profile_id}/upi"))
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(json!({}).to_string()))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(upi.status(), StatusCode::CREATED);
    let assignment = read_json_body(upi).await;
    assert_eq!(
        assignment.get("status").and_then(Value::as_str),
        Some("active")
    );

    let status = router
        .oneshot(
            axum::http::Request::get(format!("/api/v1/kyc/profiles/{profile_id}"))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(status.status(), StatusCode::OK);
    let body = read_json_body(status).await;
    assert_eq!(body.get("verification_level").and_then(Value::as_u64), Some(2));
    assert_eq!(body.get("upi_eligible"), Some(&json!(true)));
}

#[tokio::test]
async fn router_maps_validation_and_missing_profile_errors() {
    let (service, _) = service();
    let router = kyc_router(service);

    let missing = router
        .clone()
        .oneshot(
            axum::http::Request::get("/api/v1/kyc/profiles/does-not-exist")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let garbage = router
        .oneshot(
            axum::http::Request::post("/api/v1/kyc/profiles/whatever/face")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    json!({ "image": "not base64 ***" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(garbage.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
