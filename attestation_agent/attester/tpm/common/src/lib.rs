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

pub mod error;
pub mod device;
pub mod buffer;
pub mod hash;

pub use error::HashError;
pub use device::{HashValue, Ticket, TpmDevice, TpmHandle, MockTpmDevice, TPM_ALG_NULL, TPM_RH_NULL, TPM_ST_HASHCHECK};
pub use buffer::{ChunkReader, U32Bytes, MAX_BYTES_BUFFER_SIZE, MAX_DIGEST_BUFFER_SIZE};
pub use hash::{HashResolver, hash, hash_with_sequencing, event_with_sequencing};
