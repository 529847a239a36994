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

use log::{error, info, warn};
use openssl::pkey::{PKey, Public};
use tpm_boot_verifier::{parse_canonical_event_log, parse_pcclient_event_log, MachineState};
use tpm_common_verifier::{AlgorithmId, AttestationError, QuoteVerifier, TpmtPublic};
use crate::config::VerifyOpts;
use crate::constants::{NO_SUPPORTED_QUOTE, SUPPORTED_HASH_ALGS};
use crate::entities::attestation::{Attestation, Quote};
use crate::service::ak_trust::resolve_ak_trust;

/// Checks that a hash algorithm is supported and, for SHA-1, allowed
pub fn check_hash_alg_supported(hash_alg: AlgorithmId, opts: &VerifyOpts) -> Result<(), AttestationError> {
    if hash_alg == AlgorithmId::Sha1 && !opts.allow_sha1 {
        return Err(AttestationError::UnsupportedHashAlgorithm(
            "SHA-1 is not allowed for verification (set allow_sha1 to true to allow)".to_string()
        ));
    }
    if !SUPPORTED_HASH_ALGS.contains(&hash_alg) {
        return Err(AttestationError::UnsupportedHashAlgorithm(format!("unsupported hash algorithm: {}", hash_alg)));
    }
    Ok(())
}

/// At most one quote per supported algorithm, in order of preference
pub fn supported_quotes(quotes: &[Quote]) -> Vec<&Quote> {
    SUPPORTED_HASH_ALGS.iter()
        .filter_map(|alg| quotes.iter().find(|quote| quote.pcrs.hash_alg == *alg))
        .collect()
}

/// Verify one quote, then replay both event logs against its PCR bank
fn verify_with_quote(
    attestation: &Attestation,
    quote: &Quote,
    ak: &PKey<Public>,
    opts: &VerifyOpts,
) -> Result<MachineState, AttestationError> {
    QuoteVerifier::new(&quote.quote, &quote.raw_sig)
        .and_then(|verifier| verifier.verify(&quote.quote, ak, &opts.nonce, &quote.pcrs))
        .map_err(|e| e.with_context("failed to verify quote"))?;

    let pcrs = &quote.pcrs;
    let legacy_state = parse_pcclient_event_log(&attestation.event_log, pcrs)
        .map_err(|e| e.with_context("failed to validate the PCClient event log"))?;
    let cel_state = parse_canonical_event_log(&attestation.canonical_event_log, pcrs)
        .map_err(|e| e.with_context("failed to validate the Canonical event log"))?;

    let mut state = cel_state.merge(legacy_state);

    // PCR bank algorithm policy applies only once the logs replayed
    check_hash_alg_supported(pcrs.hash_alg, opts).map_err(|e| e.with_context("when verifying PCRs"))?;

    state.hash_alg = Some(pcrs.hash_alg);
    Ok(state)
}

/// Verify an attestation and return the machine state its event logs prove
///
/// # Steps
/// 1. Decode the AK public area and resolve trust in it
/// 2. Check the AK signing hash algorithm
/// 3. Try each supported quote in order of hash preference; the first quote whose signature,
///    nonce, PCR digest and event log replays all verify wins
///
/// # Errors
/// * `MalformedKey` - The AK public area cannot be decoded
/// * `UntrustedAk` - Neither the trusted keys nor the certificate chain establish trust
/// * `UnsupportedHashAlgorithm` - The AK signs with an unsupported or disallowed algorithm
/// * Any quote or replay error - The error of the last quote tried when none verified
/// * `NoSupportedQuote` - No quote uses a supported algorithm
pub fn verify_attestation(attestation: &Attestation, opts: &VerifyOpts) -> Result<MachineState, AttestationError> {
    let ak_public = TpmtPublic::decode(&attestation.ak_pub)
        .map_err(|e| e.with_context("failed to decode AK public area"))?;
    let ak = ak_public.to_public_key()
        .map_err(|e| e.with_context("failed to get AK public key"))?;

    resolve_ak_trust(&ak, &attestation.ak_cert, opts).map_err(|e| {
        error!("{}", e);
        e
    })?;

    let sign_hash_alg = ak_public.signing_hash_alg()
        .map_err(|e| e.with_context("bad AK public area"))?;
    check_hash_alg_supported(sign_hash_alg, opts)
        .map_err(|e| e.with_context("in AK public area"))?;

    let mut last_err: Option<AttestationError> = None;
    for quote in supported_quotes(&attestation.quotes) {
        match verify_with_quote(attestation, quote, &ak, opts) {
            Ok(state) => {
                info!("Attestation verified with {} quote, {} events", quote.pcrs.hash_alg, state.events.len());
                return Ok(state);
            },
            Err(e) => {
                warn!("Rejected {} quote: {}", quote.pcrs.hash_alg, e);
                last_err = Some(e);
            },
        }
    }

    Err(last_err.unwrap_or_else(|| AttestationError::NoSupportedQuote(NO_SUPPORTED_QUOTE.to_string())))
}
