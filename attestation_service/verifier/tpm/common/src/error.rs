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

use thiserror::Error;

/// Error kinds reported by attestation verification and event log replay
#[derive(Debug, Error)]
pub enum AttestationError {
    /// The AK public area could not be decoded into a usable key
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// Neither the trusted AK list nor the AK certificate chain established trust
    #[error("Untrusted AK: {0}")]
    UntrustedAk(String),

    /// A signing or PCR hash algorithm is not in the supported or allowed set
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    /// An event log is structurally invalid
    #[error("Malformed log: {0}")]
    MalformedLog(String),

    /// A replayed digest disagrees with a quoted PCR value or with its own payload
    #[error("Replay mismatch: {0}")]
    ReplayMismatch(String),

    /// Quote signature, nonce, magic or PCR digest check failed
    #[error("Quote verification failed: {0}")]
    QuoteVerificationFailed(String),

    /// No quote survived filtering and verification
    #[error("No supported quote: {0}")]
    NoSupportedQuote(String),

    /// Failure in the crypto backend or another internal step
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AttestationError {
    /// Gets the error message as a string
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Prefixes the detail with the stage that produced it, keeping the error kind.
    ///
    /// # Parameters
    /// * `context` - Stage description, e.g. "failed to verify quote"
    ///
    /// # Returns
    /// * `Self` - Error of the same kind with the extended detail
    pub fn with_context(self, context: &str) -> Self {
        let wrap = |detail: String| format!("{}: {}", context, detail);
        match self {
            Self::MalformedKey(m) => Self::MalformedKey(wrap(m)),
            Self::UntrustedAk(m) => Self::UntrustedAk(wrap(m)),
            Self::UnsupportedHashAlgorithm(m) => Self::UnsupportedHashAlgorithm(wrap(m)),
            Self::MalformedLog(m) => Self::MalformedLog(wrap(m)),
            Self::ReplayMismatch(m) => Self::ReplayMismatch(wrap(m)),
            Self::QuoteVerificationFailed(m) => Self::QuoteVerificationFailed(wrap(m)),
            Self::NoSupportedQuote(m) => Self::NoSupportedQuote(wrap(m)),
            Self::InternalError(m) => Self::InternalError(wrap(m)),
        }
    }
}

impl From<openssl::error::ErrorStack> for AttestationError {
    fn from(error: openssl::error::ErrorStack) -> Self {
        Self::InternalError(format!("OpenSSL error: {}", error))
    }
}

impl From<std::io::Error> for AttestationError {
    fn from(error: std::io::Error) -> Self {
        Self::InternalError(error.to_string())
    }
}
