//! 字段描述符
//!
//! 编辑器（或外部检测器）产生的字段描述，坐标位于 800 宽的参考像素空间。

use serde::{Deserialize, Serialize};

/// 文本字段未指定字号时使用的默认值
pub const DEFAULT_FONT_SIZE: f64 = 11.0;

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Checkbox,
}

/// 文本对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// 对应 AcroForm 的 /Q 值
    pub fn quadding(self) -> i64 {
        match self {
            Align::Left => 0,
            Align::Center => 1,
            Align::Right => 2,
        }
    }
}

/// 一个待放置的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// 创建时分配的唯一标识
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    /// 页码，从 0 开始
    #[serde(default)]
    pub page: usize,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub align: Option<Align>,
}

impl FieldDescriptor {
    /// 生效的字号：缺省、为 0、负数或非有限值时回退到 11
    pub fn effective_font_size(&self) -> f64 {
        match self.font_size {
            Some(size) if size.is_finite() && size > 0.0 => size,
            _ => DEFAULT_FONT_SIZE,
        }
    }

    pub fn effective_align(&self) -> Align {
        self.align.unwrap_or_default()
    }

    pub fn raw_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}
