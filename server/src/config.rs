use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 未指定时读取的配置文件
pub const DEFAULT_CONFIG_FILE: &str = "formforge.json";
/// 覆盖配置文件路径的环境变量
pub const CONFIG_ENV: &str = "FORMFORGE_CONFIG";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ 服务 ============
    /// 监听地址
    pub bind_address: String,
    /// 上传文件目录
    pub uploads_dir: PathBuf,
    /// 请求体上限（字节）
    pub max_body_bytes: usize,
    /// 默认日志级别，RUST_LOG 优先
    pub log_level: String,

    // ============ 字段检测 ============
    /// 外部检测程序，未配置时上传不做检测
    pub detector: Option<DetectorConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:5000".to_string(),
            uploads_dir: PathBuf::from("uploads"),
            max_body_bytes: 50 * 1024 * 1024,
            log_level: "info".to_string(),
            detector: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectorConfig {
    pub program: String,
    /// PDF 路径追加在这些参数之后
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 命令行参数优先，其次环境变量，最后是当前目录下的默认文件
pub fn config_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        log::info!("[Config] {} 不存在，使用默认配置", path.display());
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
