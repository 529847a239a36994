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

mod crypto_utils;
mod structure;
mod quote;
pub mod error;
pub mod pcr;
pub mod public_area;

pub use crypto_utils::CryptoVerifier;
pub use error::AttestationError;
pub use structure::{TpmsAttest, TpmtSignature, SignatureData, Tpm2SignatureAlgID, AlgorithmId, TpmReader,
    TpmsPcrSelection, TPM_ALG_NULL, TPM2_GENERATED_VALUE, MAX_BYTES_BUFFER_SIZE};
pub use quote::QuoteVerifier;
pub use pcr::PcrBank;
pub use public_area::{TpmtPublic, public_keys_equal};
