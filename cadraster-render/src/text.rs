use cadraster_core::document::{Dimension, Document};

const DEFAULT_DIMENSION_TEXT_HEIGHT: f64 = 2.5;
const MIN_FONT_SIZE: f64 = 6.0;
const MAX_TEXT_FONT_SIZE: f64 = 22.0;
const MAX_DIMENSION_FONT_SIZE: f64 = 16.0;

/// 清理 CAD 文本控制码：换行码转为 `\n`，去除不间断空格并还原转义字符。
pub fn clean_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    text.replace("\\P", "\n")
        .replace("^J", "\n")
        .replace("^M", "\n")
        .replace("\\~", "")
        .replace("\\\\", "\\")
        .replace("\\{", "{")
        .replace("\\}", "}")
}

/// 数值最多保留两位小数并去掉末尾的零。
pub fn format_measurement(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = (value * 100.0).round() / 100.0;
    let mut text = format!("{rounded:.2}");
    while text.ends_with('0') {
        text.pop();
    }
    if text.ends_with('.') {
        text.pop();
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

/// 标注的有效样式值：单个标注的覆盖优先，其次为命名样式。
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDimensionStyle {
    pub text_height: f64,
    pub overall_scale: f64,
    pub prefix: String,
    pub suffix: String,
}

pub fn resolve_dimension_style(dimension: &Dimension, document: &Document) -> ResolvedDimensionStyle {
    let style = document.dimension_style(&dimension.style);
    let overrides = &dimension.overrides;

    let text_height = overrides
        .text_height
        .or_else(|| style.map(|s| s.text_height).filter(|h| *h > 0.0))
        .unwrap_or(DEFAULT_DIMENSION_TEXT_HEIGHT);
    let overall_scale = overrides
        .overall_scale
        .or_else(|| style.map(|s| s.overall_scale))
        .filter(|s| *s > 0.0)
        .unwrap_or(1.0);
    let prefix = overrides
        .prefix
        .clone()
        .or_else(|| style.map(|s| s.prefix.clone()))
        .unwrap_or_default();
    let suffix = overrides
        .suffix
        .clone()
        .or_else(|| style.map(|s| s.suffix.clone()))
        .unwrap_or_default();

    ResolvedDimensionStyle {
        text_height,
        overall_scale,
        prefix,
        suffix,
    }
}

/// 组合标注文字：用户文字优先，否则为样式前缀 + 种类前缀 + 数值 + 种类后缀 + 样式后缀。
pub fn dimension_text(
    dimension: &Dimension,
    style: &ResolvedDimensionStyle,
    measurement: f64,
    kind_prefix: &str,
    kind_suffix: &str,
) -> String {
    if !dimension.user_text.trim().is_empty() {
        return dimension.user_text.clone();
    }
    let mut text = String::new();
    text.push_str(&style.prefix);
    text.push_str(kind_prefix);
    text.push_str(&format_measurement(measurement));
    text.push_str(kind_suffix);
    text.push_str(&style.suffix);
    clean_text(&text)
}

/// 普通文字的字号：字高 × 缩放，限制在 [6, 22]。
pub fn text_font_size(height: f64, scale: f64) -> f64 {
    (height * scale).clamp(MIN_FONT_SIZE, MAX_TEXT_FONT_SIZE)
}

/// 标注字号：字高 × 全局比例 × 缩放，限制在 [6, 16]。
pub fn dimension_font_size(style: &ResolvedDimensionStyle, scale: f64) -> f64 {
    (style.text_height * style.overall_scale * scale).clamp(MIN_FONT_SIZE, MAX_DIMENSION_FONT_SIZE)
}
