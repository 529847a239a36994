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

//! Verifier configuration
//!
//! `VerifyOpts` is what `verify_attestation` consumes and can be built directly in code.
//! `VerifierConfig` is its YAML form, naming PEM files instead of holding keys:
//!
//! ```yaml
//! nonce: "0102030405060708"
//! trusted_ak_paths:
//!   - /etc/verifier/ak.pem
//! allow_sha1: false
//! root_cert_paths:
//!   - /etc/verifier/tpm-root-ca.pem
//! intermediate_cert_paths: []
//! ```

use std::fs;
use std::path::Path;
use log::info;
use openssl::pkey::{PKey, Public};
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use tpm_common_verifier::AttestationError;

/// Options for a single verification call
#[derive(Debug, Clone, Default)]
pub struct VerifyOpts {
    /// Nonce the quote's extra data must equal
    pub nonce: Vec<u8>,
    /// Public keys trusted directly as attestation keys
    pub trusted_aks: Vec<PKey<Public>>,
    /// SHA-1 quotes and AKs are rejected unless set
    pub allow_sha1: bool,
    pub trusted_root_certs: Vec<X509>,
    pub intermediate_certs: Vec<X509>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct VerifierConfig {
    /// Hex encoded nonce
    pub nonce: String,
    #[serde(default)]
    pub trusted_ak_paths: Vec<String>,
    #[serde(default)]
    pub allow_sha1: bool,
    #[serde(default)]
    pub root_cert_paths: Vec<String>,
    #[serde(default)]
    pub intermediate_cert_paths: Vec<String>,
}

fn read_file(path: &str) -> Result<Vec<u8>, String> {
    fs::read(path).map_err(|e| format!("Failed to read {}: {}", path, e))
}

fn load_certs(paths: &[String]) -> Result<Vec<X509>, String> {
    let mut certs = Vec::new();
    for path in paths {
        let pem = read_file(path)?;
        let mut stack = X509::stack_from_pem(&pem).map_err(|e| format!("Invalid certificate in {}: {}", path, e))?;
        if stack.is_empty() {
            return Err(format!("No certificate found in {}", path));
        }
        certs.append(&mut stack);
    }
    Ok(certs)
}

impl VerifierConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file {}: {}", path.as_ref().display(), e))?;
        serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse config file: {}", e))
    }

    pub fn validate(&self) -> Result<(), String> {
        // 1. Validate nonce
        if self.nonce.is_empty() {
            return Err("Nonce cannot be empty".to_string());
        }
        if hex::decode(&self.nonce).is_err() {
            return Err(format!("Nonce is not valid hex: {}", self.nonce));
        }

        // 2. Validate trust anchors
        if self.trusted_ak_paths.is_empty() && self.root_cert_paths.is_empty() {
            return Err("Either trusted_ak_paths or root_cert_paths must be configured".to_string());
        }
        let all_paths = self.trusted_ak_paths.iter()
            .chain(self.root_cert_paths.iter())
            .chain(self.intermediate_cert_paths.iter());
        for path in all_paths {
            if path.is_empty() {
                return Err("Key and certificate paths cannot be empty".to_string());
            }
        }

        Ok(())
    }

    /// Validate and load the referenced PEM files
    ///
    /// # Errors
    /// * `InternalError` - The configuration is invalid or a file cannot be read or parsed
    pub fn into_verify_opts(self) -> Result<VerifyOpts, AttestationError> {
        self.validate().map_err(AttestationError::InternalError)?;

        let nonce = hex::decode(&self.nonce).map_err(|e| AttestationError::InternalError(e.to_string()))?;
        let mut trusted_aks = Vec::with_capacity(self.trusted_ak_paths.len());
        for path in &self.trusted_ak_paths {
            let pem = read_file(path).map_err(AttestationError::InternalError)?;
            let key = PKey::public_key_from_pem(&pem).map_err(|e| AttestationError::InternalError(
                format!("Invalid public key in {}: {}", path, e)
            ))?;
            trusted_aks.push(key);
        }
        let trusted_root_certs = load_certs(&self.root_cert_paths).map_err(AttestationError::InternalError)?;
        let intermediate_certs = load_certs(&self.intermediate_cert_paths).map_err(AttestationError::InternalError)?;

        info!(
            "Verifier configured with {} trusted AKs, {} root and {} intermediate certificates",
            trusted_aks.len(), trusted_root_certs.len(), intermediate_certs.len()
        );
        Ok(VerifyOpts {
            nonce,
            trusted_aks,
            allow_sha1: self.allow_sha1,
            trusted_root_certs,
            intermediate_certs,
        })
    }
}
