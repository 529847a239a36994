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

//! PCR bank carried next to a quote, plus the PCR extend and initial value rules used by replay.
//! # Examples
//! See the `from_json` method for an example of how to build a PcrBank.
use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use openssl::hash::Hasher;
use crate::crypto_utils::CryptoVerifier;
use crate::error::AttestationError;
use crate::structure::AlgorithmId;

/// Locality is encoded in the last byte of PCR 0 when set by a StartupLocality event
pub const LOCALITY_PCR: u32 = 0;

/// Highest PCR index on a PC client TPM
pub const MAX_PCR_INDEX: u32 = 23;

mod hex_values {
    use std::collections::BTreeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde::ser::SerializeMap;

    pub fn serialize<S>(values: &BTreeMap<u32, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(values.len()))?;
        for (index, value) in values {
            map.serialize_entry(index, &hex::encode(value))?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u32, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = BTreeMap::<u32, String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(index, value)| {
                hex::decode(&value)
                    .map(|bytes| (index, bytes))
                    .map_err(|e| serde::de::Error::custom(format!("PCR{} is not valid hex: {}", index, e)))
            })
            .collect()
    }
}

/// PCR values of a single bank, keyed by PCR index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcrBank {
    pub hash_alg: AlgorithmId,
    #[serde(with = "hex_values")]
    pub pcr_values: BTreeMap<u32, Vec<u8>>,
}

impl PcrBank {
    pub fn new(hash_alg: AlgorithmId) -> Self {
        Self {
            hash_alg,
            pcr_values: BTreeMap::new(),
        }
    }

    /// Create a new PcrBank instance from JSON
    ///
    /// # Arguments
    /// * `json` - JSON representation of PCR values
    ///
    /// # Returns
    /// * `Result<Self, AttestationError>` - PcrBank instance or error
    /// # Example
    /// ```
    /// use tpm_common_verifier::PcrBank;
    /// use serde_json::json;
    ///
    /// let json_value = json!({
    ///     "hash_alg": "sha256",
    ///     "pcr_values": {
    ///         "0": "9d7504bb0d32f62d43310f38df37cdd5e42bdb83dd0c0592fd9b1c3b16770c35",
    ///         "1": "38846271e2a86d6bf43ef388be2d1cb83a89f1c0bb154fe494a1dda198da29be"
    ///     }
    /// });
    /// let bank = PcrBank::from_json(&json_value).unwrap();
    /// assert_eq!(bank.get_pcr_indices(), vec![0, 1]);
    /// ```
    pub fn from_json(json: &serde_json::Value) -> Result<Self, AttestationError> {
        let bank: PcrBank = serde_json::from_value(json.clone())
            .map_err(|e| AttestationError::QuoteVerificationFailed(
                format!("Failed to parse PCR values: {}", e)
            ))?;
        bank.check_widths()?;
        Ok(bank)
    }

    /// Every value must have the bank's digest width
    pub fn check_widths(&self) -> Result<(), AttestationError> {
        let size = self.hash_alg.digest_size();
        for (index, value) in &self.pcr_values {
            if value.len() != size {
                return Err(AttestationError::QuoteVerificationFailed(format!(
                    "PCR{} has {} bytes, {} bank expects {}", index, value.len(), self.hash_alg, size
                )));
            }
        }
        Ok(())
    }

    pub fn get_pcr_value(&self, index: u32) -> Option<&[u8]> {
        self.pcr_values.get(&index).map(|v| v.as_slice())
    }

    /// PCR indices in ascending order
    pub fn get_pcr_indices(&self) -> Vec<u32> {
        self.pcr_values.keys().copied().collect()
    }

    pub fn set_pcr_value(&mut self, index: u32, value: Vec<u8>) {
        self.pcr_values.insert(index, value);
    }

    /// Hash of all PCR values concatenated in ascending index order
    pub fn calculate_digest(&self, digest_alg: &AlgorithmId) -> Result<Vec<u8>, AttestationError> {
        let md = CryptoVerifier::algorithm_to_message_digest(digest_alg)?;
        let mut hasher = Hasher::new(md)?;
        for value in self.pcr_values.values() {
            hasher.update(value)?;
        }
        Ok(hasher.finish()?.to_vec())
    }

    /// Create initial PCR value based on PCR index:
    /// PCR 0-16 and 23: all zeros
    /// PCR 17-22: all ones (dynamic root of trust, reset only by a DRTM event)
    /// PCR 0: locality is written to the last byte if provided
    pub fn create_initial_pcr_value(
        hash_alg: &AlgorithmId,
        pcr_index: u32,
        locality: Option<u8>,
    ) -> Result<Vec<u8>, AttestationError> {
        let digest_size = hash_alg.digest_size();
        if digest_size == 0 {
            return Err(AttestationError::UnsupportedHashAlgorithm(
                format!("Unsupported hash algorithm: {}", hash_alg)
            ));
        }

        let mut initial_value = match pcr_index {
            17..=22 => vec![0xffu8; digest_size],
            i if i <= MAX_PCR_INDEX => vec![0u8; digest_size],
            _ => return Err(AttestationError::MalformedLog(format!("Invalid PCR index: {}", pcr_index))),
        };

        if pcr_index == LOCALITY_PCR {
            if let Some(loc) = locality {
                initial_value[digest_size - 1] = loc;
            }
        }

        Ok(initial_value)
    }

    /// PCR extend: new = H(current || digest)
    pub fn extend(hash_alg: &AlgorithmId, current: &[u8], digest: &[u8]) -> Result<Vec<u8>, AttestationError> {
        let md = CryptoVerifier::algorithm_to_message_digest(hash_alg)?;
        let mut hasher = Hasher::new(md)?;
        hasher.update(current)?;
        hasher.update(digest)?;
        Ok(hasher.finish()?.to_vec())
    }

    /// Calculates the final PCR value by extending each digest in order onto `initial_value`
    pub fn replay(
        hash_alg: &AlgorithmId,
        initial_value: &[u8],
        digests: &[Vec<u8>],
    ) -> Result<Vec<u8>, AttestationError> {
        digests.iter().try_fold(initial_value.to_vec(), |current, digest| {
            Self::extend(hash_alg, &current, digest)
        })
    }
}
