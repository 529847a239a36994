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

//! Hashing of arbitrary length data, locally or through a TPM hash/event sequence
//!
//! Data is always pulled through a `ChunkReader`, so the local and the TPM paths see the same
//! chunk boundaries. A TPM sequence is driven as start, one or more updates, then complete;
//! any failure abandons it and the handle is flushed.

use log::{debug, warn};
use openssl::hash::Hasher;
use tpm_common_verifier::{AlgorithmId, CryptoVerifier};
use crate::buffer::{ChunkReader, MAX_DIGEST_BUFFER_SIZE};
use crate::device::{HashValue, Ticket, TpmDevice, TpmHandle, TPM_ALG_NULL, TPM_RH_NULL};
use crate::error::HashError;

/// Decides how data gets hashed: with which algorithm, and whether a TPM does the work
pub struct HashResolver<'a> {
    pub algorithm: Option<AlgorithmId>,
    pub device: Option<&'a mut dyn TpmDevice>,
}

impl<'a> HashResolver<'a> {
    pub fn local(algorithm: AlgorithmId) -> Self {
        HashResolver { algorithm: Some(algorithm), device: None }
    }

    pub fn with_device(algorithm: Option<AlgorithmId>, device: &'a mut dyn TpmDevice) -> Self {
        HashResolver { algorithm, device: Some(device) }
    }

    fn require_algorithm(&self) -> Result<AlgorithmId, HashError> {
        match self.algorithm {
            None => Err(HashError::UnsupportedAlgorithm("no hash algorithm resolved".to_string())),
            Some(AlgorithmId::Unknown) => Err(HashError::UnsupportedAlgorithm(
                "resolver returned an unknown algorithm".to_string()
            )),
            Some(algorithm) => Ok(algorithm),
        }
    }

    fn require_device(&mut self, operation: &str) -> Result<&mut (dyn TpmDevice + 'a), HashError> {
        self.device.as_deref_mut()
            .ok_or_else(|| HashError::DeviceRequired(format!("{} needs a TPM device", operation)))
    }
}

/// Open TPM sequence; flushed on drop unless completed
struct SequenceGuard<'d, 'a> {
    device: &'d mut (dyn TpmDevice + 'a),
    handle: TpmHandle,
    active: bool,
}

impl<'d, 'a> SequenceGuard<'d, 'a> {
    fn start(device: &'d mut (dyn TpmDevice + 'a), auth: &str, alg: u16) -> Result<Self, HashError> {
        let handle = device.hash_sequence_start(auth, alg)?;
        debug!("Started sequence 0x{:08X} with algorithm 0x{:04X}", handle, alg);
        Ok(SequenceGuard { device, handle, active: true })
    }

    fn update_all(&mut self, data: &[u8], auth: &str) -> Result<usize, HashError> {
        let device = &mut *self.device;
        let handle = self.handle;
        ChunkReader::new(data).drain(|chunk| device.sequence_update(auth, handle, chunk))
    }

    fn finish<T, F>(mut self, complete: F) -> Result<T, HashError>
    where
        F: FnOnce(&mut (dyn TpmDevice + 'a), TpmHandle) -> Result<T, HashError>,
    {
        let result = complete(&mut *self.device, self.handle)?;
        self.active = false;
        Ok(result)
    }
}

impl Drop for SequenceGuard<'_, '_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        match self.device.flush_context(self.handle) {
            Ok(()) => debug!("Abandoned sequence 0x{:08X}", self.handle),
            Err(e) => warn!("Failed to flush abandoned sequence 0x{:08X}: {}", self.handle, e),
        }
    }
}

fn hash_locally(data: &[u8], algorithm: AlgorithmId) -> Result<Vec<u8>, HashError> {
    let md = CryptoVerifier::algorithm_to_message_digest(&algorithm)
        .map_err(|e| HashError::UnsupportedAlgorithm(e.to_string()))?;
    let mut hasher = Hasher::new(md)?;
    ChunkReader::new(data).drain(|chunk| hasher.update(chunk).map_err(HashError::from))?;
    Ok(hasher.finish()?.to_vec())
}

/// Hash data, returning the digest and, when a TPM produced it, the hashcheck ticket
///
/// # Parameters
/// * `hierarchy` - With a device, selects the TPM path and the ticket's hierarchy
/// * `sequence_auth` - Forces the sequence path with this authorization
///
/// Data larger than one chunk never goes to TPM2_Hash; it is sequenced with an empty
/// authorization instead. Without a device or a hierarchy the digest is computed locally and
/// no ticket is returned.
pub fn hash(
    data: &[u8],
    resolver: &mut HashResolver<'_>,
    hierarchy: Option<TpmHandle>,
    sequence_auth: Option<&str>,
) -> Result<(Vec<u8>, Option<Ticket>), HashError> {
    if let Some(auth) = sequence_auth {
        let (digest, ticket) = hash_with_sequencing(data, resolver, auth, hierarchy.unwrap_or(TPM_RH_NULL))?;
        return Ok((digest, Some(ticket)));
    }

    let algorithm = resolver.require_algorithm()?;
    match hierarchy {
        Some(hierarchy) if resolver.device.is_some() => {
            if data.len() > MAX_DIGEST_BUFFER_SIZE {
                debug!("{} bytes exceed a single TPM2_Hash, sequencing instead", data.len());
                let (digest, ticket) = hash_with_sequencing(data, resolver, "", hierarchy)?;
                return Ok((digest, Some(ticket)));
            }
            let device = resolver.require_device("TPM2_Hash")?;
            let (digest, ticket) = device.hash(algorithm.to_tpm_alg(), data, hierarchy)?;
            Ok((digest, Some(ticket)))
        },
        _ => Ok((hash_locally(data, algorithm)?, None)),
    }
}

/// Hash data through a TPM hash sequence
///
/// # Errors
/// * `UnsupportedAlgorithm` - No usable algorithm resolved, checked before the sequence starts
/// * `DeviceRequired` - The resolver carries no device
/// * `Device` - Start, update or complete failed; the sequence is abandoned
pub fn hash_with_sequencing(
    data: &[u8],
    resolver: &mut HashResolver<'_>,
    auth: &str,
    hierarchy: TpmHandle,
) -> Result<(Vec<u8>, Ticket), HashError> {
    let algorithm = resolver.require_algorithm()?;
    let device = resolver.require_device("hash sequence")?;

    let mut sequence = SequenceGuard::start(device, auth, algorithm.to_tpm_alg())?;
    let chunks = sequence.update_all(data, auth)?;
    let (digest, ticket) = sequence.finish(|device, handle| device.sequence_complete(auth, handle, hierarchy))?;

    debug!("Hashed {} bytes with {} in {} sequence updates", data.len(), algorithm, chunks);
    Ok((digest, ticket))
}

/// Hash data through a TPM event sequence and return the digest of every bank
///
/// With no algorithm resolved the sequence starts with TPM_ALG_NULL. A `pcr` other than
/// TPM_RH_NULL is extended with the resulting digests.
pub fn event_with_sequencing(
    data: &[u8],
    resolver: &mut HashResolver<'_>,
    sequence_auth: &str,
    pcr_auth: &str,
    pcr: TpmHandle,
) -> Result<Vec<HashValue>, HashError> {
    let alg = match resolver.algorithm {
        None => TPM_ALG_NULL,
        Some(_) => resolver.require_algorithm()?.to_tpm_alg(),
    };
    let device = resolver.require_device("event sequence")?;

    let mut sequence = SequenceGuard::start(device, sequence_auth, alg)?;
    let chunks = sequence.update_all(data, sequence_auth)?;
    let values = sequence.finish(|device, handle| {
        device.event_sequence_complete(pcr_auth, sequence_auth, pcr, handle)
    })?;

    debug!("Event sequence over {} bytes in {} updates produced {} digests", data.len(), chunks, values.len());
    Ok(values)
}
