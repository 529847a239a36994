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

use tpm_common_verifier::AlgorithmId;

/// config file name
pub const YAML_CONFIG_FILE_PATH: &str = "verifier.yaml";

/// Hash algorithms accepted for quotes and AK signing, in order of preference
pub const SUPPORTED_HASH_ALGS: [AlgorithmId; 4] = [
    AlgorithmId::Sha512,
    AlgorithmId::Sha384,
    AlgorithmId::Sha256,
    AlgorithmId::Sha1,
];

pub const NO_SUPPORTED_QUOTE: &str = "attestation does not contain a supported quote";
