//! 处理入口：解析句柄、读取文档并放置字段

use formforge_core::FieldDescriptor;
use formforge_pdf::{materialize as materialize_bytes, Materialized, PdfError, SkippedField};
use serde_json::Value;
use thiserror::Error;

use crate::store::{DocumentStore, StoreError};

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Missing filename or fields")]
    MissingInput,

    #[error("File not found")]
    NotFound(String),

    #[error("{0}")]
    Processing(String),
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(handle) => CommandError::NotFound(handle),
            StoreError::Io(e) => CommandError::Processing(e.to_string()),
        }
    }
}

impl From<PdfError> for CommandError {
    fn from(err: PdfError) -> Self {
        CommandError::Processing(err.to_string())
    }
}

/// 为句柄对应的文档生成表单
///
/// 句柄或描述符缺失时返回 `MissingInput`；空字符串句柄视为缺失，
/// 空描述符列表则是合法输入。
pub fn materialize(
    store: &DocumentStore,
    handle: Option<&str>,
    descriptors: Option<&[FieldDescriptor]>,
) -> Result<Materialized, CommandError> {
    let (handle, descriptors) = match (handle.filter(|h| !h.is_empty()), descriptors) {
        (Some(handle), Some(descriptors)) => (handle, descriptors),
        _ => return Err(CommandError::MissingInput),
    };

    let source = store.read(handle)?;
    log::info!(
        "[Materialize] {}: {} 字节, {} 个描述符",
        handle,
        source.len(),
        descriptors.len()
    );

    let materialized = materialize_bytes(&source, descriptors).map_err(|e| {
        log::error!("[Materialize] {} 处理失败: {}", handle, e);
        CommandError::from(e)
    })?;
    Ok(materialized)
}

/// 逐条解析请求中的描述符，解析失败的条目记为跳过
pub fn parse_descriptors(values: &[Value]) -> (Vec<FieldDescriptor>, Vec<SkippedField>) {
    let mut descriptors = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();

    for (index, value) in values.iter().enumerate() {
        match serde_json::from_value::<FieldDescriptor>(value.clone()) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => {
                let id = value
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("#{}", index));
                log::warn!("[Materialize] 描述符 {} 无法解析，跳过: {}", id, e);
                rejected.push(SkippedField {
                    id,
                    name: value
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    (descriptors, rejected)
}

/// 同 [`materialize`]，描述符为未经校验的 JSON；无法解析的条目计入报告的 skipped
pub fn materialize_entries(
    store: &DocumentStore,
    handle: Option<&str>,
    entries: Option<&[Value]>,
) -> Result<Materialized, CommandError> {
    let parsed = entries.map(parse_descriptors);
    let mut materialized = materialize(
        store,
        handle,
        parsed.as_ref().map(|(descriptors, _)| descriptors.as_slice()),
    )?;

    if let Some((_, rejected)) = parsed {
        materialized.report.skipped.splice(0..0, rejected);
    }
    Ok(materialized)
}
