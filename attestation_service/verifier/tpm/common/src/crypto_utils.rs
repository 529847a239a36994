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

//! Crypto utilities for signature verification and hash operations
//!
//! This module provides helper functions for:
//! - Converting algorithm IDs to OpenSSL message digests
//! - RSASSA, RSA-PSS and ECDSA signature verification over TPM structures
//! - One-shot digests with a TPM algorithm ID
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{hash, MessageDigest};
use openssl::pkey::{PKey, Public};
use openssl::rsa::Padding;
use openssl::sign::{Verifier, RsaPssSaltlen};
use crate::error::AttestationError;
use crate::structure::AlgorithmId;

pub struct CryptoVerifier;

impl CryptoVerifier {
    pub fn algorithm_to_message_digest(alg: &AlgorithmId) -> Result<MessageDigest, AttestationError> {
        match alg {
            AlgorithmId::Sha1 => Ok(MessageDigest::sha1()),
            AlgorithmId::Sha256 => Ok(MessageDigest::sha256()),
            AlgorithmId::Sha384 => Ok(MessageDigest::sha384()),
            AlgorithmId::Sha512 => Ok(MessageDigest::sha512()),
            AlgorithmId::Sm3 => Ok(MessageDigest::sm3()),
            _ => Err(AttestationError::UnsupportedHashAlgorithm(
                format!("Unsupported hash algorithm: {:?}", alg)
            ))
        }
    }

    /// Digest `data` with the given TPM hash algorithm
    pub fn digest(alg: &AlgorithmId, data: &[u8]) -> Result<Vec<u8>, AttestationError> {
        let md = Self::algorithm_to_message_digest(alg)?;
        Ok(hash(md, data)?.to_vec())
    }

    fn run_verifier(
        mut verifier: Verifier<'_>,
        data: &[u8],
        signature: &[u8],
        scheme: &str,
    ) -> Result<(), AttestationError> {
        verifier.update(data)
            .map_err(|e| AttestationError::InternalError(
                format!("Failed to update verifier: {}", e)
            ))?;

        // OpenSSL reports malformed signatures as errors rather than `false`
        let result = verifier.verify(signature).unwrap_or(false);
        if !result {
            return Err(AttestationError::QuoteVerificationFailed(
                format!("{} signature verification failed - signature does not match data", scheme)
            ));
        }

        Ok(())
    }

    pub fn verify_rsa_signature(
        data: &[u8],
        signature: &[u8],
        hash_alg: MessageDigest,
        public_key: &PKey<Public>
    ) -> Result<(), AttestationError> {
        let verifier = Verifier::new(hash_alg, public_key)
            .map_err(|e| AttestationError::InternalError(
                format!("Failed to create verifier: {}", e)
            ))?;
        Self::run_verifier(verifier, data, signature, "RSA")
    }

    pub fn verify_rsapss_signature(
        data: &[u8],
        signature: &[u8],
        hash_alg: MessageDigest,
        public_key: &PKey<Public>
    ) -> Result<(), AttestationError> {
        let mut verifier = Verifier::new(hash_alg, public_key)
            .map_err(|e| AttestationError::InternalError(
                format!("Failed to create verifier: {}", e)
            ))?;

        verifier.set_rsa_padding(Padding::PKCS1_PSS)
            .map_err(|e| AttestationError::InternalError(
                format!("Failed to set PSS padding: {}", e)
            ))?;

        verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)
            .map_err(|e| AttestationError::InternalError(
                format!("Failed to set salt length: {}", e)
            ))?;

        Self::run_verifier(verifier, data, signature, "RSA-PSS")
    }

    /// Verify an ECDSA signature given as the raw TPM `r` and `s` integers
    pub fn verify_ecdsa_signature(
        data: &[u8],
        signature_r: &[u8],
        signature_s: &[u8],
        hash_alg: MessageDigest,
        public_key: &PKey<Public>
    ) -> Result<(), AttestationError> {
        let r = BigNum::from_slice(signature_r)?;
        let s = BigNum::from_slice(signature_s)?;
        let der = EcdsaSig::from_private_components(r, s)?.to_der()?;

        let verifier = Verifier::new(hash_alg, public_key)
            .map_err(|e| AttestationError::InternalError(
                format!("Failed to create verifier: {}", e)
            ))?;
        Self::run_verifier(verifier, data, &der, "ECDSA")
    }
}
