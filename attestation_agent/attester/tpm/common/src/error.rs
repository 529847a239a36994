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

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("TPM device required: {0}")]
    DeviceRequired(String),

    #[error("TPM device error: {0}")]
    Device(String),

    #[error("Buffer too large: {0}")]
    BufferTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<openssl::error::ErrorStack> for HashError {
    fn from(err: openssl::error::ErrorStack) -> Self {
        HashError::Internal(err.to_string())
    }
}
