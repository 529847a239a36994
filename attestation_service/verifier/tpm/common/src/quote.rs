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

//! Quote verifier, verify quote signature, nonce and the PCR values it covers.
//! # Examples
//! See the `verify` method for an example of how to use the QuoteVerifier struct.
use log::debug;
use openssl::memcmp;
use openssl::pkey::{PKey, Public};
use serde::{Serialize, Deserialize};
use crate::crypto_utils::CryptoVerifier;
use crate::error::AttestationError;
use crate::pcr::PcrBank;
use crate::structure::{TpmsAttest, TpmtSignature, SignatureData, Tpm2SignatureAlgID, AlgorithmId, TpmStType,
    TPM2_GENERATED_VALUE};

#[derive(Debug, Serialize, Deserialize)]
pub struct QuoteVerifier {
    quote_data: TpmsAttest,
    signature: TpmtSignature,
}

impl QuoteVerifier {
    /// Create QuoteVerifier from raw Quote and signature data
    ///
    /// # Arguments
    /// * `quote` - Marshalled TPMS_ATTEST bytes
    /// * `signature` - Marshalled TPMT_SIGNATURE bytes
    ///
    /// # Returns
    /// * `Result<Self, AttestationError>` - QuoteVerifier instance or error
    /// # Example
    /// ```ignore
    /// let quote_verifier = QuoteVerifier::new(&quote_bytes, &signature_bytes)?;
    /// ```
    pub fn new(quote: &[u8], signature: &[u8]) -> Result<Self, AttestationError> {
        let tpm_signature = TpmtSignature::deserialize(signature)
            .map_err(|e| e.with_context("failed to parse signature data"))?;

        let quote_data = TpmsAttest::deserialize(quote)
            .map_err(|e| e.with_context("failed to parse quote data"))?;

        Ok(Self {
            quote_data,
            signature: tpm_signature
        })
    }

    /// Verify the Quote against the attestation key, the expected nonce and the PCR bank
    ///
    /// # Arguments
    /// * `quote_data` - Raw quote data bytes the signature covers
    /// * `public_ak` - Public attestation key for signature verification
    /// * `nonce` - Expected nonce, must equal the quote's extra data exactly
    /// * `pcrs` - PCR values the quote is claimed to cover
    ///
    /// # Returns
    /// * `Result<(), AttestationError>` - Success or `QuoteVerificationFailed`
    /// # Example
    /// ```ignore
    /// let verifier = QuoteVerifier::new(&quote.quote, &quote.raw_sig)?;
    /// verifier.verify(&quote.quote, &ak, &nonce, &quote.pcrs)?;
    /// ```
    pub fn verify(
        &self,
        quote_data: &[u8],
        public_ak: &PKey<Public>,
        nonce: &[u8],
        pcrs: &PcrBank,
    ) -> Result<(), AttestationError> {
        self.verify_signature(quote_data, public_ak)?;
        self.verify_quote_data(nonce)?;
        self.verify_pcrs(pcrs)?;
        debug!("Quote over {} bank verified", pcrs.hash_alg);
        Ok(())
    }

    pub fn verify_signature(&self, quote_data: &[u8], public_ak: &PKey<Public>) -> Result<(), AttestationError> {
        let hash_alg = CryptoVerifier::algorithm_to_message_digest(&self.signature.hash_alg())
            .map_err(|e| AttestationError::QuoteVerificationFailed(e.to_string()))?;

        // Choose appropriate verification method according to signature algorithm
        match (&self.signature.signature, self.signature.sig_alg) {
            (SignatureData::RsaSignature(rsa), Tpm2SignatureAlgID::RsaSsa) => {
                CryptoVerifier::verify_rsa_signature(quote_data, &rsa.signature, hash_alg, public_ak)
            },
            (SignatureData::RsaSignature(rsa), Tpm2SignatureAlgID::RsaPss) => {
                CryptoVerifier::verify_rsapss_signature(quote_data, &rsa.signature, hash_alg, public_ak)
            },
            (SignatureData::EccSignature(ecc), Tpm2SignatureAlgID::Ecdsa) => {
                CryptoVerifier::verify_ecdsa_signature(quote_data, &ecc.signature_r, &ecc.signature_s, hash_alg,
                    public_ak)
            },
            (_, sig_alg) => Err(AttestationError::QuoteVerificationFailed(
                format!("Unsupported signature algorithm: {:?}", sig_alg)
            )),
        }
    }

    pub fn verify_quote_data(&self, nonce: &[u8]) -> Result<(), AttestationError> {
        if self.quote_data.magic != TPM2_GENERATED_VALUE {
            return Err(AttestationError::QuoteVerificationFailed(
                format!("Invalid TPM magic value: 0x{:08X}", self.quote_data.magic)
            ));
        }

        if self.quote_data.type_ != TpmStType::AttestQuote {
            return Err(AttestationError::QuoteVerificationFailed(
                format!("Attestation type is not quote: {:?}", self.quote_data.type_)
            ));
        }

        if !memcmp_eq(&self.quote_data.extra_data, nonce) {
            return Err(AttestationError::QuoteVerificationFailed(
                "Nonce in Quote does not match provided nonce".to_string()
            ));
        }

        Ok(())
    }

    /// Check the quote's PCR selection and digest against the given bank
    pub fn verify_pcrs(&self, pcrs: &PcrBank) -> Result<(), AttestationError> {
        let selections = &self.quote_data.attested.pcr_select;
        if selections.len() != 1 {
            return Err(AttestationError::QuoteVerificationFailed(
                format!("Quote selects {} PCR banks, expected 1", selections.len())
            ));
        }

        let selection = &selections[0];
        if selection.hash_alg != pcrs.hash_alg {
            return Err(AttestationError::QuoteVerificationFailed(format!(
                "PCR value algorithm {} does not match Quote algorithm {}", pcrs.hash_alg, selection.hash_alg
            )));
        }

        if selection.selected_pcrs() != pcrs.get_pcr_indices() {
            return Err(AttestationError::QuoteVerificationFailed(format!(
                "Quote selects PCRs {:?}, but PCR values cover {:?}", selection.selected_pcrs(), pcrs.get_pcr_indices()
            )));
        }

        pcrs.check_widths()?;

        let calculated_digest = pcrs.calculate_digest(&self.signature.hash_alg())?;
        if !memcmp_eq(&calculated_digest, &self.quote_data.attested.pcr_digest) {
            return Err(AttestationError::QuoteVerificationFailed("PCR digest mismatch".to_string()));
        }

        Ok(())
    }

    /// Get the hash algorithm of the quoted PCR bank
    ///
    /// # Returns
    /// * `Option<AlgorithmId>` - Hash algorithm identifier, None if the quote selects no bank
    pub fn get_hash_algorithm(&self) -> Option<AlgorithmId> {
        self.quote_data.attested.pcr_select.first().map(|s| s.hash_alg)
    }

    /// Hash algorithm of the quote signature
    pub fn signature_hash_alg(&self) -> AlgorithmId {
        self.signature.hash_alg()
    }

    /// Get the PCR digest from the Quote
    ///
    /// # Returns
    /// * `&[u8]` - PCR digest bytes
    pub fn get_pcr_digest(&self) -> &[u8] {
        &self.quote_data.attested.pcr_digest
    }

    pub fn get_nonce(&self) -> &[u8] {
        &self.quote_data.extra_data
    }
}

fn memcmp_eq(a: &[u8], b: &[u8]) -> bool {
    // memcmp::eq panics on length mismatch
    a.len() == b.len() && memcmp::eq(a, b)
}
