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
use tpm_common_verifier::AttestationError;

/// Rejection reasons for an event type read from an untrusted log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EventTypeError {
    #[error("{}", out_of_range_message(.0))]
    OutOfRange(u32),

    #[error("unknown event type {0:#x}")]
    Unknown(u32),
}

/// Names the range the value overshot: below 0x80000000 only the BIOS range can apply
fn out_of_range_message(value: &u32) -> String {
    if *value < 0x80000000 {
        format!("event type {:#x} is past the BIOS range [0x0, 0x12] and below the EFI range [0x80000000, 0x800000FF]", value)
    } else {
        format!("event type {:#x} is past the EFI range [0x80000000, 0x800000FF]", value)
    }
}

impl From<EventTypeError> for AttestationError {
    fn from(error: EventTypeError) -> Self {
        AttestationError::MalformedLog(error.to_string())
    }
}
