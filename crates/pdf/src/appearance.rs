//! 表单字段外观流生成
//!
//! 外观流是 BBox 为 `[0 0 w h]` 的 Form XObject，
//! 查看器直接绘制它而不依赖自身的默认控件主题。

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};

use crate::error::PdfError;

/// RGB 颜色，分量 0-1
pub type Rgb = (f32, f32, f32);

pub const WHITE: Rgb = (1.0, 1.0, 1.0);
pub const BLACK: Rgb = (0.0, 0.0, 0.0);

/// ZapfDingbats 中的对勾字符
pub const CHECK_GLYPH: &str = "4";

/// 外观中引用的字体资源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontRef {
    pub resource: &'static str,
    pub id: ObjectId,
}

impl FontRef {
    fn resources(&self) -> Dictionary {
        dictionary! {
            "Font" => dictionary! {
                self.resource => Object::Reference(self.id),
            },
        }
    }
}

fn color_operands((r, g, b): Rgb) -> Vec<Object> {
    vec![Object::Real(r), Object::Real(g), Object::Real(b)]
}

/// 外观生成器：可选背景，无边框
#[derive(Debug, Clone, Default)]
pub struct AppearanceBuilder {
    background: Option<Rgb>,
}

impl AppearanceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_background(mut self, color: Rgb) -> Self {
        self.background = Some(color);
        self
    }

    fn frame(&self, width: f32, height: f32) -> Vec<Operation> {
        let mut ops = Vec::new();

        if let Some(color) = self.background {
            ops.push(Operation::new("rg", color_operands(color)));
            ops.push(Operation::new(
                "re",
                vec![0.into(), 0.into(), width.into(), height.into()],
            ));
            ops.push(Operation::new("f", vec![]));
        }

        ops
    }

    /// 文本字段外观：值为空，只保留字体和颜色设置
    pub fn text_field(
        &self,
        width: f32,
        height: f32,
        font: FontRef,
        font_size: f32,
        color: Rgb,
    ) -> Result<Stream, PdfError> {
        let mut ops = self.frame(width, height);
        ops.push(Operation::new("BMC", vec![Object::Name(b"Tx".to_vec())]));
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource.as_bytes().to_vec()), font_size.into()],
        ));
        ops.push(Operation::new("rg", color_operands(color)));
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));
        ops.push(Operation::new("EMC", vec![]));

        form_xobject(width, height, Some(font.resources()), ops)
    }

    /// 复选框选中状态：居中的对勾
    pub fn checkbox_on(
        &self,
        width: f32,
        height: f32,
        font: FontRef,
        color: Rgb,
    ) -> Result<Stream, PdfError> {
        let size = width.min(height) * 0.8;
        // ZapfDingbats "4" 宽 0.846 em，可见高度约 0.7 em
        let tx = (width - size * 0.846) / 2.0;
        let ty = (height - size * 0.7) / 2.0;

        let mut ops = self.frame(width, height);
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource.as_bytes().to_vec()), size.into()],
        ));
        ops.push(Operation::new("rg", color_operands(color)));
        ops.push(Operation::new("Td", vec![tx.into(), ty.into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(CHECK_GLYPH)]));
        ops.push(Operation::new("ET", vec![]));
        ops.push(Operation::new("Q", vec![]));

        form_xobject(width, height, Some(font.resources()), ops)
    }

    /// 复选框未选中状态：只有背景
    pub fn checkbox_off(&self, width: f32, height: f32) -> Result<Stream, PdfError> {
        form_xobject(width, height, None, self.frame(width, height))
    }
}

fn form_xobject(
    width: f32,
    height: f32,
    resources: Option<Dictionary>,
    operations: Vec<Operation>,
) -> Result<Stream, PdfError> {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    };
    if let Some(resources) = resources {
        dict.set("Resources", resources);
    }

    let content = Content { operations }.encode()?;
    Ok(Stream::new(dict, content))
}
