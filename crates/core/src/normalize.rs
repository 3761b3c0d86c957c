//! 描述符规范化
//!
//! 在放置字段之前解析名称、过滤越界页码。此步骤不会失败。

use std::collections::HashSet;

use serde::Serialize;

use crate::descriptor::{Align, FieldDescriptor, FieldKind};
use crate::geometry::PixelRect;
use crate::naming::{sanitize_name, synthesize_name, NameRegistry};

/// 字段类型相关的外观参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum WidgetKind {
    Text {
        /// 参考像素空间中的字号
        font_size: f64,
        align: Align,
    },
    Checkbox,
}

/// 规范化后的字段，名称已唯一且合法
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedField {
    pub id: String,
    pub name: String,
    pub page: usize,
    pub rect: PixelRect,
    pub required: bool,
    pub widget: WidgetKind,
}

/// 因页码越界被丢弃的描述符
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedField {
    pub id: String,
    pub page: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Normalized {
    pub fields: Vec<NormalizedField>,
    pub dropped: Vec<DroppedField>,
}

/// 针对一个目标文档的规范化器
#[derive(Debug)]
pub struct Normalizer {
    page_count: usize,
    registry: NameRegistry,
}

impl Normalizer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            registry: NameRegistry::new(),
        }
    }

    /// 文档表单中已有的字段名称，新字段不得与之重复
    pub fn reserve<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.registry.reserve(name);
        }
        self
    }

    /// 按列表顺序处理，输入不会被修改
    pub fn normalize(mut self, descriptors: &[FieldDescriptor]) -> Normalized {
        let mut out = Normalized::default();
        let mut seen_ids = HashSet::new();

        for descriptor in descriptors {
            if descriptor.page >= self.page_count {
                log::debug!(
                    "[Normalize] 丢弃字段 {}: 页码 {} 超出范围 (共 {} 页)",
                    descriptor.id,
                    descriptor.page,
                    self.page_count
                );
                out.dropped.push(DroppedField {
                    id: descriptor.id.clone(),
                    page: descriptor.page,
                });
                continue;
            }

            if !seen_ids.insert(descriptor.id.as_str()) {
                log::warn!("[Normalize] 重复的字段 id: {}", descriptor.id);
            }

            let name = self.resolve_name(descriptor);
            out.fields.push(NormalizedField {
                id: descriptor.id.clone(),
                name,
                page: descriptor.page,
                rect: PixelRect {
                    x: descriptor.x,
                    y: descriptor.y,
                    w: descriptor.w,
                    h: descriptor.h,
                },
                required: descriptor.required,
                widget: match descriptor.kind {
                    FieldKind::Text => WidgetKind::Text {
                        font_size: descriptor.effective_font_size(),
                        align: descriptor.effective_align(),
                    },
                    FieldKind::Checkbox => WidgetKind::Checkbox,
                },
            });
        }

        out
    }

    fn resolve_name(&mut self, descriptor: &FieldDescriptor) -> String {
        let raw = descriptor.raw_name();
        let mut base = sanitize_name(raw);
        if base.is_empty() {
            base = synthesize_name(&descriptor.id);
        }
        if base != raw {
            log::debug!("[Normalize] 字段名称 {:?} -> {:?}", raw, base);
        }
        self.registry.claim(&base)
    }
}

/// 不带预留名称的便捷入口
pub fn normalize(descriptors: &[FieldDescriptor], page_count: usize) -> Normalized {
    Normalizer::new(page_count).normalize(descriptors)
}
