//! 上传文件存储
//!
//! 文件以 `doc_<毫秒时间戳>_<原文件名>` 保存在上传目录下，该名称即为句柄。

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const MAX_CREATE_ATTEMPTS: usize = 1000;
const FALLBACK_NAME: &str = "upload.pdf";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("Failed to compile upload name pattern"));

// 不允许以 . 开头，排除 `.` 和 `..`
static HANDLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_-][A-Za-z0-9._-]*$").expect("Failed to compile handle pattern")
});

/// 只保留文件名部分，去掉路径和不安全字符
pub fn sanitize_upload_name(original: &str) -> String {
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("");
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// 打开上传目录，不存在时创建
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        log::info!("[Store] 上传目录: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 保存上传内容，返回新句柄
    ///
    /// 同一毫秒内的多次上传会顺延时间戳，保证句柄唯一。
    pub fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let name = sanitize_upload_name(original_name);
        let mut millis = chrono::Utc::now().timestamp_millis();

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let handle = format!("doc_{}_{}", millis, name);
            let path = self.root.join(&handle);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(bytes)?;
                    log::info!("[Store] 保存 {} ({} 字节)", handle, bytes.len());
                    return Ok(handle);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => millis += 1,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free handle for {}", name),
        )))
    }

    /// 句柄对应的路径；不合法或不存在的句柄都视为未找到
    pub fn path(&self, handle: &str) -> Result<PathBuf, StoreError> {
        if !HANDLE_PATTERN.is_match(handle) {
            log::warn!("[Store] 拒绝非法句柄: {:?}", handle);
            return Err(StoreError::NotFound(handle.to_string()));
        }
        let path = self.root.join(handle);
        if !path.is_file() {
            return Err(StoreError::NotFound(handle.to_string()));
        }
        Ok(path)
    }

    pub fn read(&self, handle: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path(handle)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::NotFound(handle.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
