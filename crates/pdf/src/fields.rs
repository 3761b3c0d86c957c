//! 文本字段与复选框控件
//!
//! 字段与控件合并为同一个字典。外观流总是在样式最终确定之后由
//! 同一份 [`TextStyle`] 生成，避免 /DA 与外观不一致。

use formforge_core::{Align, PointRect};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

use crate::appearance::{AppearanceBuilder, FontRef, Rgb, BLACK, WHITE};
use crate::error::PdfError;
use crate::utils::{format_number, text_string};

/// 字段标志 Ff 第 2 位：必填
pub const FLAG_REQUIRED: i64 = 1 << 1;
/// 注释标志 F 第 3 位：打印
pub const ANNOT_PRINT: i64 = 1 << 2;

/// 复选框选中状态的外观名
pub const CHECKBOX_ON: &str = "Yes";
pub const CHECKBOX_OFF: &str = "Off";

/// 记录本次创建的对象，失败时整体移除
pub struct ObjectBatch<'d> {
    doc: &'d mut Document,
    created: Vec<ObjectId>,
}

impl<'d> ObjectBatch<'d> {
    pub fn new(doc: &'d mut Document) -> Self {
        Self {
            doc,
            created: Vec::new(),
        }
    }

    pub fn add<T: Into<Object>>(&mut self, object: T) -> ObjectId {
        let id = self.doc.add_object(object);
        self.created.push(id);
        id
    }

    pub fn doc(&mut self) -> &mut Document {
        self.doc
    }

    pub fn rollback(self) {
        for id in &self.created {
            self.doc.objects.remove(id);
        }
        log::debug!("[Field] 回滚 {} 个对象", self.created.len());
    }

    pub fn commit(self) -> Vec<ObjectId> {
        self.created
    }
}

/// 控件的公共部分
#[derive(Debug, Clone)]
pub struct WidgetSpec<'a> {
    pub name: &'a str,
    pub page_id: ObjectId,
    pub rect: PointRect,
    pub required: bool,
}

impl WidgetSpec<'_> {
    /// 白色背景、无边框的控件字典
    fn base(&self, field_type: &str) -> Dictionary {
        let [x1, y1, x2, y2] = self.rect.corners();
        let mut dict = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => field_type,
            "T" => text_string(self.name),
            "Rect" => vec![
                (x1 as f32).into(),
                (y1 as f32).into(),
                (x2 as f32).into(),
                (y2 as f32).into(),
            ],
            "P" => Object::Reference(self.page_id),
            "F" => ANNOT_PRINT,
            "MK" => dictionary! {
                "BG" => vec![WHITE.0.into(), WHITE.1.into(), WHITE.2.into()],
            },
            "BS" => dictionary! {
                "W" => 0,
                "S" => "S",
            },
            "Border" => vec![0.into(), 0.into(), 0.into()],
        };
        if self.required {
            dict.set("Ff", FLAG_REQUIRED);
        }
        dict
    }

    fn size(&self) -> (f32, f32) {
        (self.rect.width as f32, self.rect.height as f32)
    }
}

/// 文本字段的最终样式
#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub font: FontRef,
    /// 点空间字号
    pub font_size: f64,
    pub align: Align,
    pub color: Rgb,
    pub background: Rgb,
}

impl TextStyle {
    pub fn new(font: FontRef, font_size: f64, align: Align) -> Self {
        Self {
            font,
            font_size,
            align,
            color: BLACK,
            background: WHITE,
        }
    }

    /// /DA 字符串，例如 `/Helv 8.25 Tf 0 g`
    pub fn default_appearance(&self) -> String {
        let (r, g, b) = self.color;
        let color = if r == g && g == b {
            format!("{} g", format_number(r as f64))
        } else {
            format!(
                "{} {} {} rg",
                format_number(r as f64),
                format_number(g as f64),
                format_number(b as f64)
            )
        };
        format!(
            "/{} {} Tf {}",
            self.font.resource,
            format_number(self.font_size),
            color
        )
    }
}

/// 创建文本字段控件，返回控件 ID
pub fn build_text_field(
    batch: &mut ObjectBatch<'_>,
    spec: &WidgetSpec<'_>,
    style: &TextStyle,
) -> Result<ObjectId, PdfError> {
    let mut dict = spec.base("Tx");
    dict.set("V", Object::string_literal(""));
    dict.set("DA", Object::string_literal(style.default_appearance()));
    dict.set("Q", style.align.quadding());

    // 所有样式写入之后再生成外观
    let (width, height) = spec.size();
    let normal = AppearanceBuilder::new()
        .with_background(style.background)
        .text_field(
            width,
            height,
            style.font,
            style.font_size as f32,
            style.color,
        )?;
    let normal_id = batch.add(normal);
    dict.set("AP", dictionary! { "N" => Object::Reference(normal_id) });

    Ok(batch.add(dict))
}

/// 创建复选框控件，默认未选中，返回控件 ID
pub fn build_checkbox(
    batch: &mut ObjectBatch<'_>,
    spec: &WidgetSpec<'_>,
    font: FontRef,
) -> Result<ObjectId, PdfError> {
    let mut dict = spec.base("Btn");
    dict.set("V", CHECKBOX_OFF);
    dict.set("AS", CHECKBOX_OFF);
    dict.set(
        "DA",
        Object::string_literal(format!("/{} 0 Tf 0 g", font.resource)),
    );
    if let Ok(Object::Dictionary(mk)) = dict.get_mut(b"MK") {
        mk.set("CA", Object::string_literal(crate::appearance::CHECK_GLYPH));
    }

    let (width, height) = spec.size();
    let builder = AppearanceBuilder::new().with_background(WHITE);
    let on_id = batch.add(builder.checkbox_on(width, height, font, BLACK)?);
    let off_id = batch.add(builder.checkbox_off(width, height)?);
    dict.set(
        "AP",
        dictionary! {
            "N" => dictionary! {
                CHECKBOX_ON => Object::Reference(on_id),
                CHECKBOX_OFF => Object::Reference(off_id),
            },
        },
    );

    Ok(batch.add(dict))
}
