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

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Logger name whose settings also drive the root logger
pub const ROOT_PREFIX: &str = "root";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub loggers: Vec<LoggerConfig>,
}

/// One rolling log file, receiving records of modules under `path_prefix`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub path_prefix: String,
    pub log_directory: String,
    pub log_file_name: String,
    pub max_file_size: u64,
    pub max_zip_count: u32,
    pub level: String,
}

impl LogConfig {
    pub fn from_yaml(path: impl Into<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_str = std::fs::read_to_string(path.into())?;
        let config: LogConfig = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.loggers.is_empty() {
            return Err("At least one logger must be configured".to_string());
        }
        for logger in &self.loggers {
            if logger.path_prefix.is_empty() {
                return Err("Logger path_prefix cannot be empty".to_string());
            }
            if logger.log_file_name.is_empty() {
                return Err(format!("Logger {} has an empty log_file_name", logger.path_prefix));
            }
            if logger.max_file_size == 0 {
                return Err(format!("Logger {} max_file_size must be positive", logger.path_prefix));
            }
            if parse_level(&logger.level).is_none() {
                return Err(format!("Logger {} has unknown level: {}", logger.path_prefix, logger.level));
            }
        }
        Ok(())
    }

    pub fn get_logger_config(&self, path_prefix: &str) -> Option<&LoggerConfig> {
        self.loggers.iter().find(|l| path_prefix.starts_with(&l.path_prefix))
    }

    pub fn get_root_config(&self) -> Option<&LoggerConfig> {
        self.loggers.iter().find(|l| l.path_prefix == ROOT_PREFIX)
    }
}

pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.to_lowercase().as_str() {
        "trace" => Some(LevelFilter::Trace),
        "debug" => Some(LevelFilter::Debug),
        "info" => Some(LevelFilter::Info),
        "warn" => Some(LevelFilter::Warn),
        "error" => Some(LevelFilter::Error),
        "off" => Some(LevelFilter::Off),
        _ => None,
    }
}
