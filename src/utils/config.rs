//! 配置管理模块

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::{HubError, Result};

/// 计算图配置
///
/// ```toml
/// # 每个节点最多保留的记录数，不设置则不裁剪
/// max_cache_size = 5000
/// # 相同时间键连续到达超过该次数视为上游异常
/// overflow_threshold = 100
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub max_cache_size: Option<usize>,

    #[serde(default = "default_overflow_threshold")]
    pub overflow_threshold: u32,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_cache_size: None,
            overflow_threshold: default_overflow_threshold(),
        }
    }
}

impl HubConfig {
    /// 从文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, String> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read hub config file: {}", e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse hub config: {}", e))
    }

    /// 加载默认配置文件
    pub fn load_default() -> std::result::Result<Self, String> {
        Self::load_from_file("config/hub.toml")
    }

    pub fn with_max_cache_size(mut self, max_cache_size: usize) -> Self {
        self.max_cache_size = Some(max_cache_size);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_cache_size == Some(0) {
            return Err(HubError::Configuration {
                indicator: "HubConfig".to_string(),
                reason: "max_cache_size must be greater than 0".to_string(),
            });
        }
        if self.overflow_threshold == 0 {
            return Err(HubError::Configuration {
                indicator: "HubConfig".to_string(),
                reason: "overflow_threshold must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

// 默认值函数
fn default_overflow_threshold() -> u32 {
    100
}
