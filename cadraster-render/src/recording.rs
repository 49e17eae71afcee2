use glam::{DAffine2, DVec2};
use image::RgbaImage;

use crate::errors::SurfaceError;
use crate::resources::Rgba;
use crate::surface::{Brush, DrawingSurface, Font, Pen, SurfacePath, TextLayout};

/// 记录下来的绘图调用，坐标为调用方传入的原始值。
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Rgba),
    Line {
        pen: Pen,
        start: DVec2,
        end: DVec2,
    },
    Lines {
        pen: Pen,
        points: Vec<DVec2>,
    },
    Polygon {
        pen: Pen,
        points: Vec<DVec2>,
    },
    FillPolygon {
        brush: Brush,
        points: Vec<DVec2>,
    },
    Arc {
        pen: Pen,
        center: DVec2,
        radii: DVec2,
        start: f64,
        sweep: f64,
    },
    Ellipse {
        pen: Pen,
        center: DVec2,
        radii: DVec2,
    },
    FillEllipse {
        brush: Brush,
        center: DVec2,
        radii: DVec2,
    },
    StrokePath {
        pen: Pen,
        path: SurfacePath,
    },
    FillPath {
        brush: Brush,
        path: SurfacePath,
    },
    Text {
        text: String,
        font: Font,
        brush: Brush,
        origin: DVec2,
        layout: TextLayout,
    },
    Image {
        pixels: (u32, u32),
        origin: DVec2,
        size: DVec2,
    },
}

/// 一条记录及其发生时的表面变换。
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub command: DrawCommand,
    pub transform: DAffine2,
}

impl RecordedCommand {
    /// 将记录中的点变换到设备坐标。
    #[inline]
    pub fn to_device(&self, point: DVec2) -> DVec2 {
        self.transform.transform_point2(point)
    }
}

/// 只记录调用、不产生像素的绘图表面，用于测试和调用方检查绘制结果。
///
/// 文字按固定比例估算尺寸：宽 = 字号 × 0.6 × 字符数，高 = 字号 × 1.2。
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    transform: DAffine2,
    stack: Vec<DAffine2>,
    commands: Vec<RecordedCommand>,
    fail_pattern_fills: bool,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            transform: DAffine2::IDENTITY,
            stack: Vec::new(),
            commands: Vec::new(),
            fail_pattern_fills: false,
        }
    }

    /// 让点阵画刷填充返回错误，用于检验回退描边。
    pub fn failing_pattern_fills(mut self) -> Self {
        self.fail_pattern_fills = true;
        self
    }

    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    /// 当前保存的状态层数。
    pub fn state_depth(&self) -> usize {
        self.stack.len()
    }

    fn record(&mut self, command: DrawCommand) {
        self.commands.push(RecordedCommand {
            command,
            transform: self.transform,
        });
    }
}

impl DrawingSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba) {
        self.record(DrawCommand::Clear(color));
    }

    fn save(&mut self) {
        self.stack.push(self.transform);
    }

    fn restore(&mut self) {
        if let Some(transform) = self.stack.pop() {
            self.transform = transform;
        }
    }

    fn transform(&self) -> DAffine2 {
        self.transform
    }

    fn set_transform(&mut self, transform: DAffine2) {
        self.transform = transform;
    }

    fn fill_path(&mut self, brush: &Brush, path: &SurfacePath) -> Result<(), SurfaceError> {
        if path.is_empty() {
            return Err(SurfaceError::EmptyPath);
        }
        if self.fail_pattern_fills && matches!(brush, Brush::Hatch { .. }) {
            return Err(SurfaceError::UnsupportedFill);
        }
        self.record(DrawCommand::FillPath {
            brush: brush.clone(),
            path: path.clone(),
        });
        Ok(())
    }

    fn stroke_path(&mut self, pen: &Pen, path: &SurfacePath) {
        self.record(DrawCommand::StrokePath {
            pen: pen.clone(),
            path: path.clone(),
        });
    }

    fn draw_text(&mut self, text: &str, font: &Font, brush: &Brush, origin: DVec2, layout: &TextLayout) {
        self.record(DrawCommand::Text {
            text: text.to_string(),
            font: font.clone(),
            brush: brush.clone(),
            origin,
            layout: *layout,
        });
    }

    fn measure_text(&self, text: &str, font: &Font) -> DVec2 {
        let longest = text.lines().map(|line| line.chars().count()).max().unwrap_or(0);
        let lines = text.lines().count().max(1);
        DVec2::new(
            font.size * 0.6 * longest as f64,
            font.size * 1.2 * lines as f64,
        )
    }

    fn draw_image(&mut self, image: &RgbaImage, origin: DVec2, size: DVec2) {
        self.record(DrawCommand::Image {
            pixels: image.dimensions(),
            origin,
            size,
        });
    }

    fn draw_line(&mut self, pen: &Pen, start: DVec2, end: DVec2) {
        self.record(DrawCommand::Line {
            pen: pen.clone(),
            start,
            end,
        });
    }

    fn draw_lines(&mut self, pen: &Pen, points: &[DVec2]) {
        if points.len() >= 2 {
            self.record(DrawCommand::Lines {
                pen: pen.clone(),
                points: points.to_vec(),
            });
        }
    }

    fn draw_polygon(&mut self, pen: &Pen, points: &[DVec2]) {
        if points.len() >= 2 {
            self.record(DrawCommand::Polygon {
                pen: pen.clone(),
                points: points.to_vec(),
            });
        }
    }

    fn fill_polygon(&mut self, brush: &Brush, points: &[DVec2]) -> Result<(), SurfaceError> {
        if points.len() < 3 {
            return Err(SurfaceError::EmptyPath);
        }
        self.record(DrawCommand::FillPolygon {
            brush: brush.clone(),
            points: points.to_vec(),
        });
        Ok(())
    }

    fn draw_arc(&mut self, pen: &Pen, center: DVec2, radii: DVec2, start: f64, sweep: f64) {
        self.record(DrawCommand::Arc {
            pen: pen.clone(),
            center,
            radii,
            start,
            sweep,
        });
    }

    fn draw_ellipse(&mut self, pen: &Pen, center: DVec2, radii: DVec2) {
        self.record(DrawCommand::Ellipse {
            pen: pen.clone(),
            center,
            radii,
        });
    }

    fn fill_ellipse(&mut self, brush: &Brush, center: DVec2, radii: DVec2) -> Result<(), SurfaceError> {
        self.record(DrawCommand::FillEllipse {
            brush: brush.clone(),
            center,
            radii,
        });
        Ok(())
    }
}
