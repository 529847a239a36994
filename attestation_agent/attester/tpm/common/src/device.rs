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

//! TPM primitives consumed by the hashing engine
//!
//! The engine never talks to a transport directly. Any TPM access layer (a TSS context, a
//! simulator or a test double) plugs in by implementing `TpmDevice`.

use mockall::automock;
use crate::error::HashError;

/// Raw TPM handle value (TPM_HANDLE)
pub type TpmHandle = u32;

/// TPM_ALG_NULL, starts an event sequence that hashes into every active PCR bank
pub const TPM_ALG_NULL: u16 = 0x0010;
/// TPM_RH_NULL hierarchy, yields a NULL ticket
pub const TPM_RH_NULL: TpmHandle = 0x4000_0007;
/// TPM_ST_HASHCHECK ticket tag
pub const TPM_ST_HASHCHECK: u16 = 0x8024;

/// TPMT_TK_HASHCHECK produced by TPM2_Hash and TPM2_SequenceComplete
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ticket {
    pub tag: u16,
    pub hierarchy: TpmHandle,
    pub digest: Vec<u8>,
}

/// One TPMT_HA entry of a TPML_DIGEST_VALUES
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashValue {
    pub alg: u16,
    pub digest: Vec<u8>,
}

#[automock]
pub trait TpmDevice {
    /// TPM2_Hash over data that fits a single command
    fn hash(&mut self, alg: u16, data: &[u8], hierarchy: TpmHandle) -> Result<(Vec<u8>, Ticket), HashError>;

    /// TPM2_HashSequenceStart, `TPM_ALG_NULL` starts an event sequence
    fn hash_sequence_start(&mut self, auth: &str, alg: u16) -> Result<TpmHandle, HashError>;

    fn sequence_update(&mut self, auth: &str, sequence: TpmHandle, chunk: &[u8]) -> Result<(), HashError>;

    fn sequence_complete(
        &mut self,
        auth: &str,
        sequence: TpmHandle,
        hierarchy: TpmHandle,
    ) -> Result<(Vec<u8>, Ticket), HashError>;

    /// TPM2_EventSequenceComplete, extends `pcr` in every bank unless it is TPM_RH_NULL
    fn event_sequence_complete(
        &mut self,
        pcr_auth: &str,
        sequence_auth: &str,
        pcr: TpmHandle,
        sequence: TpmHandle,
    ) -> Result<Vec<HashValue>, HashError>;

    /// TPM2_FlushContext
    fn flush_context(&mut self, handle: TpmHandle) -> Result<(), HashError>;
}
