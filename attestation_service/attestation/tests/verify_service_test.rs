/*
 * Copyright (c) Huawei Technologies Co., Ltd. 2025. All rights reserved.
 * Global Trust Authority is licensed under the Mulan PSL v2.
 * You can use this software according to the terms and conditions of the Mulan PSL v2.
 * You may obtain a copy of Mulan PSL v2 at:
 *     http://license.coscl.org.cn/MulanPSL2
 * THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND, EITHER EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT, MERCHANTABILITY OR FIT FOR A PARTICULAR
 * PURPOSE.
 * See the Mulan PSL v2 for more details.
 */

use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use attestation::service::verify_service::{check_hash_alg_supported, supported_quotes};
use attestation::{verify_attestation, Attestation, AttestationError, VerifyOpts};
use tpm_common_verifier::{AlgorithmId, PcrBank};

mod common;
use common::*;

fn attestation_with(prover: &Prover, quotes: Vec<attestation::Quote>) -> Attestation {
    Attestation {
        ak_pub: prover.ak_pub.clone(),
        quotes,
        event_log: separator_log(),
        ..Default::default()
    }
}

// Test Objective: Verify a well formed attestation from a trusted AK
// Expected Result: Machine state carries the separator and the SHA-256 bank algorithm
#[test]
fn test_verify_attestation_success() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let quote = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256));
    let attestation = attestation_with(&prover, vec![quote]);

    let state = verify_attestation(&attestation, &trusting(&prover)).unwrap();
    assert_eq!(state.hash_alg, Some(AlgorithmId::Sha256));
    assert_eq!(state.platform.separators.len(), 1);
    assert_eq!(state.platform.separators[0].pcr, 0);
    assert_eq!(state.events.len(), 1);
}

// Test Objective: Verify a quote over a different nonce is rejected
// Expected Result: Returns QuoteVerificationFailed with quote context
#[test]
fn test_verify_attestation_nonce_mismatch() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let quote = prover.quote(b"stale-nonce", &separator_bank(AlgorithmId::Sha256));
    let attestation = attestation_with(&prover, vec![quote]);

    match verify_attestation(&attestation, &trusting(&prover)) {
        Err(AttestationError::QuoteVerificationFailed(msg)) => assert!(msg.starts_with("failed to verify quote")),
        other => panic!("unexpected result: {:?}", other),
    }
}

// Test Objective: Verify a quoted PCR that disagrees with the event log is rejected
// Expected Result: Returns ReplayMismatch with PCClient context
#[test]
fn test_verify_attestation_replay_mismatch() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let mut bank = separator_bank(AlgorithmId::Sha256);
    bank.set_pcr_value(0, vec![0xAA; 32]);
    let quote = prover.quote(NONCE, &bank);
    let attestation = attestation_with(&prover, vec![quote]);

    match verify_attestation(&attestation, &trusting(&prover)) {
        Err(AttestationError::ReplayMismatch(msg)) => {
            assert!(msg.starts_with("failed to validate the PCClient event log"))
        },
        other => panic!("unexpected result: {:?}", other),
    }
}

// Test Objective: Verify SHA-256 quotes are preferred over SHA-1 quotes
// Expected Result: Succeeds with the SHA-256 bank even though SHA-1 is listed first
#[test]
fn test_verify_attestation_prefers_sha256() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let sha1 = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha1));
    let sha256 = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256));
    let attestation = attestation_with(&prover, vec![sha1, sha256]);

    let state = verify_attestation(&attestation, &trusting(&prover)).unwrap();
    assert_eq!(state.hash_alg, Some(AlgorithmId::Sha256));
}

// Test Objective: Verify the SHA-1 quote is only reached after the SHA-256 quote fails
// Expected Result: SHA-1 policy error is reported, and SHA-1 succeeds once allowed
#[test]
fn test_verify_attestation_sha1_fallback() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let sha1 = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha1));
    let mut sha256 = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256));
    let last = sha256.raw_sig.len() - 1;
    sha256.raw_sig[last] ^= 0xFF;
    let attestation = attestation_with(&prover, vec![sha256, sha1]);

    match verify_attestation(&attestation, &trusting(&prover)) {
        Err(AttestationError::UnsupportedHashAlgorithm(msg)) => {
            assert!(msg.starts_with("when verifying PCRs"));
            assert!(msg.contains("allow_sha1"));
        },
        other => panic!("unexpected result: {:?}", other),
    }

    let opts = VerifyOpts { allow_sha1: true, ..trusting(&prover) };
    let state = verify_attestation(&attestation, &opts).unwrap();
    assert_eq!(state.hash_alg, Some(AlgorithmId::Sha1));
}

// Test Objective: Verify an AK that is neither trusted nor certified is rejected
// Expected Result: Returns UntrustedAk carrying both failure reasons
#[test]
fn test_verify_attestation_untrusted_ak() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let other = Prover::new(TPM_ALG_SHA256);
    let quote = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256));
    let attestation = attestation_with(&prover, vec![quote]);

    match verify_attestation(&attestation, &trusting(&other)) {
        Err(AttestationError::UntrustedAk(msg)) => {
            assert!(msg.contains("AK public key is not trusted"));
            assert!(msg.contains("AKCert is empty"));
        },
        other => panic!("unexpected result: {:?}", other),
    }

    let opts = VerifyOpts { nonce: NONCE.to_vec(), ..Default::default() };
    match verify_attestation(&attestation, &opts) {
        Err(AttestationError::UntrustedAk(msg)) => {
            assert!(msg.contains("no mechanism for AK verification provided"))
        },
        other => panic!("unexpected result: {:?}", other),
    }
}

// Test Objective: Verify an AK certified by a trusted root CA is accepted
// Expected Result: Verification succeeds without any trusted AK configured
#[test]
fn test_verify_attestation_cert_chain() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let ca_key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let ca_cert = issue_cert("Test TPM Root CA", &ca_key, None, &ca_key, true);
    let ak_cert = issue_cert("Test AK", &prover.key, Some(&ca_cert), &ca_key, false);

    let quote = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256));
    let mut attestation = attestation_with(&prover, vec![quote]);
    attestation.ak_cert = ak_cert.to_der().unwrap();

    let opts = VerifyOpts {
        nonce: NONCE.to_vec(),
        trusted_root_certs: vec![ca_cert],
        ..Default::default()
    };
    let state = verify_attestation(&attestation, &opts).unwrap();
    assert_eq!(state.platform.separators.len(), 1);
}

// Test Objective: Verify a valid certificate for a different key does not vouch for the AK
// Expected Result: Returns UntrustedAk
#[test]
fn test_verify_attestation_cert_for_other_key() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let other = Prover::new(TPM_ALG_SHA256);
    let ca_key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
    let ca_cert = issue_cert("Test TPM Root CA", &ca_key, None, &ca_key, true);
    let other_cert = issue_cert("Other AK", &other.key, Some(&ca_cert), &ca_key, false);

    let quote = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256));
    let mut attestation = attestation_with(&prover, vec![quote]);
    attestation.ak_cert = other_cert.to_der().unwrap();

    let opts = VerifyOpts {
        nonce: NONCE.to_vec(),
        trusted_root_certs: vec![ca_cert],
        ..Default::default()
    };
    assert!(matches!(verify_attestation(&attestation, &opts), Err(AttestationError::UntrustedAk(_))));
}

// Test Objective: Verify attestations without a usable quote
// Expected Result: Returns NoSupportedQuote for no quotes and for unsupported banks only
#[test]
fn test_verify_attestation_no_supported_quote() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let attestation = attestation_with(&prover, Vec::new());
    match verify_attestation(&attestation, &trusting(&prover)) {
        Err(AttestationError::NoSupportedQuote(msg)) => {
            assert_eq!(msg, "attestation does not contain a supported quote")
        },
        other => panic!("unexpected result: {:?}", other),
    }

    let sm3 = prover.quote(NONCE, &PcrBank::new(AlgorithmId::Sm3));
    let attestation = attestation_with(&prover, vec![sm3]);
    assert!(matches!(
        verify_attestation(&attestation, &trusting(&prover)),
        Err(AttestationError::NoSupportedQuote(_))
    ));
}

// Test Objective: Verify a truncated AK public area is rejected before any quote is checked
// Expected Result: Returns MalformedKey
#[test]
fn test_verify_attestation_malformed_ak() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let mut attestation = attestation_with(&prover, Vec::new());
    attestation.ak_pub.truncate(10);

    assert!(matches!(
        verify_attestation(&attestation, &trusting(&prover)),
        Err(AttestationError::MalformedKey(_))
    ));
}

// Test Objective: Verify an AK signing with SHA-1 is refused unless SHA-1 is allowed
// Expected Result: Returns UnsupportedHashAlgorithm with AK public area context
#[test]
fn test_verify_attestation_sha1_ak() {
    let prover = Prover::new(TPM_ALG_SHA1);
    let quote = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256));
    let attestation = attestation_with(&prover, vec![quote]);

    match verify_attestation(&attestation, &trusting(&prover)) {
        Err(AttestationError::UnsupportedHashAlgorithm(msg)) => {
            assert!(msg.starts_with("in AK public area"))
        },
        other => panic!("unexpected result: {:?}", other),
    }
}

// Test Objective: Verify hash algorithm policy and quote selection order
// Expected Result: SHA-1 needs allow_sha1, SM3 is never supported, one quote kept per algorithm
#[test]
fn test_hash_policy_and_quote_order() {
    let opts = VerifyOpts::default();
    assert!(check_hash_alg_supported(AlgorithmId::Sha256, &opts).is_ok());
    assert!(check_hash_alg_supported(AlgorithmId::Sha1, &opts).is_err());
    assert!(check_hash_alg_supported(AlgorithmId::Sha1, &VerifyOpts { allow_sha1: true, ..Default::default() }).is_ok());
    assert!(check_hash_alg_supported(AlgorithmId::Sm3, &opts).is_err());

    let prover = Prover::new(TPM_ALG_SHA256);
    let quotes = vec![
        prover.quote(NONCE, &separator_bank(AlgorithmId::Sha1)),
        prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256)),
        prover.quote(b"second", &separator_bank(AlgorithmId::Sha256)),
    ];
    let selected = supported_quotes(&quotes);
    assert_eq!(selected.len(), 2);
    assert_eq!(selected[0].pcrs.hash_alg, AlgorithmId::Sha256);
    assert_eq!(selected[0].quote, quotes[1].quote);
    assert_eq!(selected[1].pcrs.hash_alg, AlgorithmId::Sha1);
}

// Test Objective: Verify the JSON form of an attestation carries base64 byte fields
// Expected Result: Parsed attestation equals the original
#[test]
fn test_attestation_json_roundtrip() {
    let prover = Prover::new(TPM_ALG_SHA256);
    let quote = prover.quote(NONCE, &separator_bank(AlgorithmId::Sha256));
    let attestation = attestation_with(&prover, vec![quote]);

    let json = serde_json::to_string(&attestation).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["ak_pub"].is_string());
    assert_eq!(Attestation::from_json(&json).unwrap(), attestation);
}
