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

use serde::{Deserialize, Serialize};
use tpm_common_verifier::PcrBank;

/// Binary fields travel as standard base64 strings in JSON
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

/// One quote over a single PCR bank
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    /// PCR values the quote covers
    pub pcrs: PcrBank,
    /// Marshalled TPMS_ATTEST the signature covers
    #[serde(with = "base64_bytes")]
    pub quote: Vec<u8>,
    /// Marshalled TPMT_SIGNATURE
    #[serde(with = "base64_bytes")]
    pub raw_sig: Vec<u8>,
}

/// Evidence produced by the prover
///
/// Every field is untrusted until `verify_attestation` has validated it. Each event log format
/// has its own field; an empty field means the log was not provided.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Attestation {
    /// Marshalled TPMT_PUBLIC of the attestation key
    #[serde(with = "base64_bytes")]
    pub ak_pub: Vec<u8>,
    /// DER encoded AK certificate
    #[serde(default, with = "base64_bytes")]
    pub ak_cert: Vec<u8>,
    #[serde(default)]
    pub quotes: Vec<Quote>,
    /// PC client (TCG) event log
    #[serde(default, with = "base64_bytes")]
    pub event_log: Vec<u8>,
    #[serde(default, with = "base64_bytes")]
    pub canonical_event_log: Vec<u8>,
}

impl Attestation {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
