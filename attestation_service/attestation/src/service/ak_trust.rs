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

//! Attestation key trust resolution
//!
//! An AK is trusted when it equals one of the configured keys, or when its certificate chains
//! to a configured root. AK certificates carry TCG key usage OIDs and often a critical SAN that
//! OpenSSL cannot interpret, so the chain is verified with the `any` purpose and unhandled
//! critical extensions ignored.

use log::{debug, info};
use openssl::pkey::{PKey, Public};
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::verify::X509VerifyFlags;
use openssl::x509::{X509, X509PurposeId, X509StoreContext};
use tpm_common_verifier::{public_keys_equal, AttestationError};
use crate::config::VerifyOpts;

/// Checks if the AK is one of the explicitly trusted keys
pub fn check_ak_trusted(ak: &PKey<Public>, trusted_aks: &[PKey<Public>]) -> Result<(), String> {
    if trusted_aks.is_empty() {
        return Err("no mechanism for AK verification provided".to_string());
    }
    for trusted in trusted_aks {
        if public_keys_equal(ak, trusted).map_err(|e| e.message())? {
            return Ok(());
        }
    }
    Err("AK public key is not trusted".to_string())
}

/// Verify the DER encoded AK certificate against the root and intermediate pools, and check
/// that it certifies this AK
pub fn validate_ak_cert(
    ak: &PKey<Public>,
    ak_cert: &[u8],
    intermediates: &[X509],
    roots: &[X509],
) -> Result<(), String> {
    if ak_cert.is_empty() {
        return Err("AKCert is empty".to_string());
    }
    let cert = X509::from_der(ak_cert).map_err(|e| format!("failed to parse AKCert: {}", e))?;

    let verified = verify_chain(&cert, intermediates, roots)
        .map_err(|e| format!("failed to verify AKCert against trusted roots: {}", e))?;
    if let Err(reason) = verified {
        return Err(format!("failed to verify AKCert against trusted roots: {}", reason));
    }

    let cert_key = cert.public_key().map_err(|e| format!("failed to read AKCert public key: {}", e))?;
    if !public_keys_equal(ak, &cert_key).map_err(|e| e.message())? {
        return Err("AKCert does not certify the AK public key".to_string());
    }
    Ok(())
}

fn verify_chain(
    cert: &X509,
    intermediates: &[X509],
    roots: &[X509],
) -> Result<Result<(), String>, openssl::error::ErrorStack> {
    let mut builder = X509StoreBuilder::new()?;
    builder.set_flags(X509VerifyFlags::IGNORE_CRITICAL)?;
    builder.set_purpose(X509PurposeId::ANY)?;
    for root in roots {
        builder.add_cert(root.clone())?;
    }
    let store = builder.build();

    let mut chain = Stack::new()?;
    for intermediate in intermediates {
        chain.push(intermediate.clone())?;
    }

    let mut context = X509StoreContext::new()?;
    context.init(&store, cert, &chain, |ctx| {
        if ctx.verify_cert()? {
            Ok(Ok(()))
        } else {
            Ok(Err(ctx.error().error_string().to_string()))
        }
    })
}

/// Establish trust in the AK: trusted key list first, then the certificate chain
///
/// # Errors
/// * `UntrustedAk` - Both paths failed, carrying both reasons
pub fn resolve_ak_trust(ak: &PKey<Public>, ak_cert: &[u8], opts: &VerifyOpts) -> Result<(), AttestationError> {
    let key_err = match check_ak_trusted(ak, &opts.trusted_aks) {
        Ok(()) => {
            info!("AK matched a trusted public key");
            return Ok(());
        },
        Err(e) => e,
    };
    debug!("AK not in trusted key list: {}", key_err);

    match validate_ak_cert(ak, ak_cert, &opts.intermediate_certs, &opts.trusted_root_certs) {
        Ok(()) => {
            info!("AK certificate chain verified");
            Ok(())
        },
        Err(cert_err) => Err(AttestationError::UntrustedAk(format!(
            "failed to validate attestation key: {} and {}", key_err, cert_err
        ))),
    }
}
