//! 外部字段检测程序
//!
//! 上传后运行配置的程序，PDF 路径作为最后一个参数；标准输出应为
//! FieldDescriptor 的 JSON 数组。任何失败都只记录日志并返回空列表。

use std::path::Path;

use formforge_core::FieldDescriptor;
use tokio::process::Command;

use crate::config::DetectorConfig;

#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    pub async fn detect(&self, pdf: &Path) -> Vec<FieldDescriptor> {
        log::info!("[Detector] 运行 {} {:?} {}", self.program, self.args, pdf.display());

        let output = match Command::new(&self.program)
            .args(&self.args)
            .arg(pdf)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                log::warn!("[Detector] 无法启动 {}: {}", self.program, e);
                return Vec::new();
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            log::debug!("[Detector] stderr: {}", stderr.trim());
        }
        if !output.status.success() {
            log::warn!("[Detector] 退出状态 {}", output.status);
            return Vec::new();
        }

        match parse_detector_output(&output.stdout) {
            Ok(fields) => {
                log::info!("[Detector] 检测到 {} 个字段", fields.len());
                fields
            }
            Err(e) => {
                log::warn!("[Detector] 输出不是有效的字段列表: {}", e);
                Vec::new()
            }
        }
    }
}

/// 解析检测程序的标准输出
pub fn parse_detector_output(stdout: &[u8]) -> Result<Vec<FieldDescriptor>, serde_json::Error> {
    serde_json::from_slice(stdout)
}
