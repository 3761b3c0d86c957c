//! 字段名称处理
//!
//! PDF 字段全名以 `.` 分隔层级，叶子名称中出现 `.` 会导致歧义或创建失败。

use std::collections::HashMap;

/// 没有名称也无法从 id 推导时使用的名称
const FALLBACK_NAME: &str = "field";

fn is_allowed(c: char) -> bool {
    c.is_alphanumeric() || c == ' ' || c == '-' || c == '_'
}

/// 将不允许的字符替换为 `_`，并去掉首尾空白
///
/// 对已处理过的名称再次调用结果不变。
pub fn sanitize_name(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| if is_allowed(c) { c } else { '_' })
        .collect();
    replaced.trim().to_string()
}

/// 从 id 生成名称，同一 id 总是得到同一结果
pub fn synthesize_name(id: &str) -> String {
    let name = sanitize_name(id);
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

/// 单次处理内已占用的名称
///
/// 记录每个基础名称被请求的次数，冲突时追加 `_<n>`。
#[derive(Debug, Default)]
pub struct NameRegistry {
    hits: HashMap<String, usize>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预先登记文档中已存在的名称
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.hits.entry(name.into()).or_insert(1);
    }

    /// 取得一个未被占用的名称并登记
    pub fn claim(&mut self, base: &str) -> String {
        let mut count = match self.hits.get(base) {
            Some(count) => *count,
            None => {
                self.hits.insert(base.to_string(), 1);
                return base.to_string();
            }
        };

        loop {
            count += 1;
            let candidate = format!("{}_{}", base, count);
            if !self.hits.contains_key(&candidate) {
                self.hits.insert(base.to_string(), count);
                self.hits.insert(candidate.clone(), 1);
                return candidate;
            }
        }
    }
}
