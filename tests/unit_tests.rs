use std::collections::HashSet;

use activator::activation_code::{
    generate_activation_code, generate_activation_codes, CodeBatchConfig,
};
use activator::errors::LicenseError;
use activator::key_derivation::derive_secret_key;
use activator::protocol::{ActivationRequest, ApiResponse, ResponseCode};

#[test]
fn derived_key_matches_known_vectors() {
    assert_eq!(
        derive_secret_key("machine-01"),
        "d32d987278dbb279179d75d43ce4c258858022c6891b6a7da0dd012b2158a12cecb8bb49db0572a5713c7e689f39e67deabf3499b6041747e3927891ec71a2ab"
    );
    assert_eq!(
        derive_secret_key(""),
        "08ff80b9440f7d2ac3dc13a8c96fdfaeef10196229778a27b079db2ce452341234e068615979f167ffe3c0635c5047781a2377b680f35e55b72a1edf75ae0152"
    );
}

#[test]
fn derived_key_is_deterministic_and_machine_specific() {
    let a = derive_secret_key("machine-01");
    assert_eq!(a, derive_secret_key("machine-01"));
    assert_ne!(a, derive_secret_key("machine-02"));
    assert_ne!(a, derive_secret_key("Machine-01"));

    assert_eq!(a.len(), 128);
    assert!(a.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
}

#[test]
fn single_code_is_lowercase_hex_sha256() {
    let code = generate_activation_code("license-activator");
    assert_eq!(code.len(), 64);
    assert!(code.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
}

#[test]
fn default_batch_is_a_thousand_distinct_codes() {
    let codes = generate_activation_codes(&CodeBatchConfig::default());
    assert_eq!(codes.len(), 1000);

    let unique: HashSet<&String> = codes.iter().collect();
    assert_eq!(unique.len(), 1000);
    assert!(codes.iter().all(|c| c.len() == 64));
}

#[test]
fn configured_batch_size_is_honored() {
    let config = CodeBatchConfig {
        batch_size: 7,
        seed: "custom".to_string(),
    };
    assert_eq!(generate_activation_codes(&config).len(), 7);
}

#[test]
fn envelope_shape_on_success_and_failure() {
    let ok = serde_json::to_value(ApiResponse::success("key".to_string())).unwrap();
    assert_eq!(ok["code"], 0);
    assert_eq!(ok["message"], "success");
    assert_eq!(ok["data"], "key");

    let err = serde_json::to_value(ApiResponse::<String>::failure(
        ResponseCode::AlreadyBound,
        ResponseCode::AlreadyBound.default_message(),
    ))
    .unwrap();
    assert_eq!(err["code"], 3);
    assert!(err["data"].is_null());
}

#[test]
fn request_fields_default_to_empty() {
    let req: ActivationRequest = serde_json::from_str("{}").unwrap();
    assert_eq!(req.activation_code, "");
    assert_eq!(req.protected_machine_code, "");
}

#[test]
fn error_codes_round_trip_through_envelope() {
    for err in [
        LicenseError::BadSecretKey,
        LicenseError::UnknownActivationCode,
        LicenseError::AlreadyBound,
    ] {
        let code = err.response_code().as_u16();
        let back = LicenseError::from_response(code, String::new());
        assert_eq!(back.response_code(), err.response_code());
    }
}
