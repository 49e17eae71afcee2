use serde::{Deserialize, Serialize};

/// 渲染选项：一次渲染会话内不可变。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub draw_dimensions: bool,
    pub draw_text: bool,
    pub draw_hatch: bool,
    /// 保留原始颜色时背景为黑色，否则统一为白底黑线。
    pub keep_original_colors: bool,
    pub width: u32,
    pub height: u32,
    pub line_width: f64,
    pub margin: f64,
    pub crop_empty_edges: bool,
    pub draw_debug_bounds: bool,
    pub force_recompute_bounds: bool,
    pub show_wipeout_frame: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            draw_dimensions: true,
            draw_text: true,
            draw_hatch: false,
            keep_original_colors: false,
            width: 1200,
            height: 1600,
            line_width: 1.0,
            margin: 20.0,
            crop_empty_edges: false,
            draw_debug_bounds: false,
            force_recompute_bounds: false,
            show_wipeout_frame: false,
        }
    }
}

impl RenderOptions {
    #[inline]
    pub fn canvas_width(&self) -> f64 {
        f64::from(self.width)
    }

    #[inline]
    pub fn canvas_height(&self) -> f64 {
        f64::from(self.height)
    }

    /// 去除两侧边距后的可用宽度。
    #[inline]
    pub fn available_width(&self) -> f64 {
        self.canvas_width() - 2.0 * self.margin
    }

    #[inline]
    pub fn available_height(&self) -> f64 {
        self.canvas_height() - 2.0 * self.margin
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}
