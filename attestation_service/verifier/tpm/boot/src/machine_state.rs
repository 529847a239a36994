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

//! Machine state
//!
//! Facts derived from event log records whose digests were confirmed by replay against quoted
//! PCR values. A state is built per log format and the partial states are merged field-wise.

use std::collections::BTreeMap;
use std::fmt::Debug;
use log::warn;
use serde::{Serialize, Deserialize};
use tpm_common_verifier::AlgorithmId;

/// One replayed record, whatever its type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedEvent {
    pub source: String,
    pub pcr: u32,
    pub event_type: String,
    pub digest: String,
}

/// Measured firmware blob. Load address and description are not covered by the digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareBlob {
    pub pcr: u32,
    pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Separator {
    pub pcr: u32,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformState {
    pub scrtm_version: Option<String>,
    pub firmware_blobs: Vec<FirmwareBlob>,
    pub separators: Vec<Separator>,
    pub actions: Vec<String>,
}

/// Signature database entry, with the database it was measured from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEntry {
    pub database: String,
    pub signature_type: String,
    pub owner: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureBootState {
    pub enabled: Option<bool>,
    pub pk: Vec<SignatureEntry>,
    pub kek: Vec<SignatureEntry>,
    pub db: Vec<SignatureEntry>,
    pub dbx: Vec<SignatureEntry>,
    pub authorities: Vec<SignatureEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootEntry {
    pub name: String,
    pub description: String,
    pub device_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EfiState {
    pub boot_order: Option<Vec<String>>,
    pub boot_entries: Vec<BootEntry>,
    /// PE image digests of loaded boot services applications, hex encoded
    pub apps: Vec<String>,
    pub gpt_partition_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedEvent {
    pub id: u32,
    pub data: String,
}

/// Container launch facts from the canonical event log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerState {
    pub image_reference: Option<String>,
    pub image_digest: Option<String>,
    pub image_id: Option<String>,
    pub restart_policy: Option<String>,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub override_args: Vec<String>,
    pub override_env: BTreeMap<String, String>,
    pub launch_separator_seen: bool,
}

/// Verified machine state returned to callers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    /// Bank of the quote the state was verified against
    pub hash_alg: Option<AlgorithmId>,
    pub platform: PlatformState,
    pub secure_boot: SecureBootState,
    pub efi: EfiState,
    pub tagged_events: Vec<TaggedEvent>,
    pub container: Option<ContainerState>,
    pub events: Vec<VerifiedEvent>,
}

fn merge_option<T: PartialEq + Debug>(field: &str, preferred: Option<T>, other: Option<T>) -> Option<T> {
    match (preferred, other) {
        (Some(a), Some(b)) => {
            if a != b {
                warn!("Conflicting {} in merged event logs: keeping {:?}, dropping {:?}", field, a, b);
            }
            Some(a)
        },
        (a, b) => a.or(b),
    }
}

/// Multiset union: an item of `other` is appended only for the copies beyond those already in
/// `preferred`, so repeated facts of one log survive and merging a list with itself is a no-op
fn merge_vec<T: PartialEq>(mut preferred: Vec<T>, other: Vec<T>) -> Vec<T> {
    let keep: Vec<bool> = other.iter().enumerate().map(|(index, item)| {
        let earlier = other[..index].iter().filter(|o| *o == item).count();
        earlier >= preferred.iter().filter(|p| *p == item).count()
    }).collect();
    preferred.extend(other.into_iter().zip(keep).filter_map(|(item, keep)| keep.then_some(item)));
    preferred
}

fn merge_map(mut preferred: BTreeMap<String, String>, other: BTreeMap<String, String>) -> BTreeMap<String, String> {
    for (key, value) in other {
        preferred.entry(key).or_insert(value);
    }
    preferred
}

impl ContainerState {
    fn merge(self, other: ContainerState) -> ContainerState {
        ContainerState {
            image_reference: merge_option("image reference", self.image_reference, other.image_reference),
            image_digest: merge_option("image digest", self.image_digest, other.image_digest),
            image_id: merge_option("image id", self.image_id, other.image_id),
            restart_policy: merge_option("restart policy", self.restart_policy, other.restart_policy),
            args: merge_vec(self.args, other.args),
            env: merge_map(self.env, other.env),
            override_args: merge_vec(self.override_args, other.override_args),
            override_env: merge_map(self.override_env, other.override_env),
            launch_separator_seen: self.launch_separator_seen || other.launch_separator_seen,
        }
    }
}

impl MachineState {
    /// Merge two partial states. Values of `self` take precedence over `other`, list items of
    /// `other` are appended when `self` holds fewer copies. Merging a state with itself is a no-op.
    pub fn merge(self, other: MachineState) -> MachineState {
        MachineState {
            hash_alg: merge_option("hash algorithm", self.hash_alg, other.hash_alg),
            platform: PlatformState {
                scrtm_version: merge_option("S-CRTM version", self.platform.scrtm_version, other.platform.scrtm_version),
                firmware_blobs: merge_vec(self.platform.firmware_blobs, other.platform.firmware_blobs),
                separators: merge_vec(self.platform.separators, other.platform.separators),
                actions: merge_vec(self.platform.actions, other.platform.actions),
            },
            secure_boot: SecureBootState {
                enabled: merge_option("secure boot state", self.secure_boot.enabled, other.secure_boot.enabled),
                pk: merge_vec(self.secure_boot.pk, other.secure_boot.pk),
                kek: merge_vec(self.secure_boot.kek, other.secure_boot.kek),
                db: merge_vec(self.secure_boot.db, other.secure_boot.db),
                dbx: merge_vec(self.secure_boot.dbx, other.secure_boot.dbx),
                authorities: merge_vec(self.secure_boot.authorities, other.secure_boot.authorities),
            },
            efi: EfiState {
                boot_order: merge_option("boot order", self.efi.boot_order, other.efi.boot_order),
                boot_entries: merge_vec(self.efi.boot_entries, other.efi.boot_entries),
                apps: merge_vec(self.efi.apps, other.efi.apps),
                gpt_partition_count: merge_option(
                    "GPT partition count", self.efi.gpt_partition_count, other.efi.gpt_partition_count
                ),
            },
            tagged_events: merge_vec(self.tagged_events, other.tagged_events),
            container: match (self.container, other.container) {
                (Some(a), Some(b)) => Some(a.merge(b)),
                (a, b) => a.or(b),
            },
            events: merge_vec(self.events, other.events),
        }
    }
}
