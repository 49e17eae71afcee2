use glam::{DAffine2, DVec2};
use image::RgbaImage;

use crate::curves;
use crate::errors::SurfaceError;
use crate::hatch::HatchStyle;
use crate::resources::Rgba;

/// 圆头圆角画笔，可选虚线模式（以线宽为单位的间隔序列）。
#[derive(Debug, Clone, PartialEq)]
pub struct Pen {
    pub color: Rgba,
    pub width: f64,
    pub dash: Option<Vec<f64>>,
}

impl Pen {
    pub fn solid(color: Rgba, width: f64) -> Self {
        Self {
            color,
            width,
            dash: None,
        }
    }

    pub fn dashed(color: Rgba, width: f64) -> Self {
        Self {
            color,
            width,
            dash: Some(vec![4.0, 2.0]),
        }
    }

    pub fn with_width(&self, width: f64) -> Self {
        Self {
            width,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Brush {
    Solid(Rgba),
    /// 8x8 点阵填充，前景色绘制图样位，背景色填充其余位置。
    Hatch {
        style: HatchStyle,
        foreground: Rgba,
        background: Rgba,
    },
}

impl Brush {
    pub fn color(&self) -> Rgba {
        match self {
            Brush::Solid(color) => *color,
            Brush::Hatch { foreground, .. } => *foreground,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub family: String,
    pub size: f64,
}

impl Font {
    pub fn new(size: f64) -> Self {
        Self {
            family: "Arial".to_string(),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Near,
    Center,
    Far,
}

/// 文本排版：`origin` 为锚点；`max_width > 0` 时在该宽度内按词换行。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TextLayout {
    pub horizontal: TextAlign,
    pub vertical: TextAlign,
    pub max_width: f64,
}

impl TextLayout {
    pub fn near() -> Self {
        Self::default()
    }

    pub fn centered() -> Self {
        Self {
            horizontal: TextAlign::Center,
            vertical: TextAlign::Center,
            max_width: 0.0,
        }
    }

    pub fn with_max_width(mut self, max_width: f64) -> Self {
        self.max_width = max_width;
        self
    }
}

/// 路径中的一个子图形。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Figure {
    pub points: Vec<DVec2>,
    pub closed: bool,
}

/// 由若干折线子图形组成的路径，语义与常见 2D 图形库的路径对象一致：
/// 连续添加的线段连接到当前子图形，多边形自成闭合子图形。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SurfacePath {
    figures: Vec<Figure>,
    open: bool,
}

impl SurfacePath {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> &mut Figure {
        if !self.open || self.figures.is_empty() {
            self.figures.push(Figure::default());
            self.open = true;
        }
        let last = self.figures.len() - 1;
        &mut self.figures[last]
    }

    pub fn add_line(&mut self, start: DVec2, end: DVec2) {
        self.add_lines(&[start, end]);
    }

    pub fn add_lines(&mut self, points: &[DVec2]) {
        if points.is_empty() {
            return;
        }
        let figure = self.current();
        for point in points {
            if figure.points.last() != Some(point) {
                figure.points.push(*point);
            }
        }
    }

    pub fn add_polygon(&mut self, points: &[DVec2]) {
        if points.len() < 2 {
            return;
        }
        self.figures.push(Figure {
            points: points.to_vec(),
            closed: true,
        });
        self.open = false;
    }

    /// 闭合当前子图形，后续线段开启新的子图形。
    pub fn close_figure(&mut self) {
        if self.open {
            if let Some(figure) = self.figures.last_mut() {
                figure.closed = true;
            }
        }
        self.open = false;
    }

    pub fn figures(&self) -> impl Iterator<Item = &Figure> {
        self.figures.iter().filter(|figure| figure.points.len() >= 2)
    }

    pub fn is_empty(&self) -> bool {
        self.figures().next().is_none()
    }

    pub fn from_polyline(points: &[DVec2], closed: bool) -> Self {
        let mut path = Self::new();
        if closed {
            path.add_polygon(points);
        } else {
            path.add_lines(points);
        }
        path
    }
}

/// 外部绘图表面抽象。坐标均经过当前变换矩阵；变换组合时新变换先作用于点。
///
/// 只有少数方法必须实现，其余图元默认转换为路径。
pub trait DrawingSurface {
    fn size(&self) -> (u32, u32);

    fn clear(&mut self, color: Rgba);

    /// 压入图形状态（当前变换）。
    fn save(&mut self);

    /// 弹出图形状态；栈为空时保持不变。
    fn restore(&mut self);

    fn transform(&self) -> DAffine2;

    fn set_transform(&mut self, transform: DAffine2);

    fn concat_transform(&mut self, transform: DAffine2) {
        let combined = self.transform() * transform;
        self.set_transform(combined);
    }

    fn reset_transform(&mut self) {
        self.set_transform(DAffine2::IDENTITY);
    }

    fn fill_path(&mut self, brush: &Brush, path: &SurfacePath) -> Result<(), SurfaceError>;

    fn stroke_path(&mut self, pen: &Pen, path: &SurfacePath);

    fn draw_text(&mut self, text: &str, font: &Font, brush: &Brush, origin: DVec2, layout: &TextLayout);

    /// 测量单行文本的宽高（设备单位）。
    fn measure_text(&self, text: &str, font: &Font) -> DVec2;

    fn draw_image(&mut self, image: &RgbaImage, origin: DVec2, size: DVec2);

    fn draw_line(&mut self, pen: &Pen, start: DVec2, end: DVec2) {
        self.stroke_path(pen, &SurfacePath::from_polyline(&[start, end], false));
    }

    fn draw_lines(&mut self, pen: &Pen, points: &[DVec2]) {
        if points.len() >= 2 {
            self.stroke_path(pen, &SurfacePath::from_polyline(points, false));
        }
    }

    fn draw_polygon(&mut self, pen: &Pen, points: &[DVec2]) {
        if points.len() >= 2 {
            self.stroke_path(pen, &SurfacePath::from_polyline(points, true));
        }
    }

    fn fill_polygon(&mut self, brush: &Brush, points: &[DVec2]) -> Result<(), SurfaceError> {
        self.fill_path(brush, &SurfacePath::from_polyline(points, true))
    }

    fn draw_rectangle(&mut self, pen: &Pen, min: DVec2, size: DVec2) {
        let corners = rectangle_corners(min, size);
        self.draw_polygon(pen, &corners);
    }

    fn fill_rectangle(&mut self, brush: &Brush, min: DVec2, size: DVec2) -> Result<(), SurfaceError> {
        let corners = rectangle_corners(min, size);
        self.fill_polygon(brush, &corners)
    }

    /// 以圆心与半轴描述的弧，角度为弧度，`sweep` 为正时沿坐标系正方向。
    fn draw_arc(&mut self, pen: &Pen, center: DVec2, radii: DVec2, start: f64, sweep: f64) {
        let points = curves::arc_points(center, radii, 0.0, start, sweep, curves::DEFAULT_ARC_SEGMENTS);
        self.draw_lines(pen, &points);
    }

    fn draw_ellipse(&mut self, pen: &Pen, center: DVec2, radii: DVec2) {
        let mut points = curves::arc_points(
            center,
            radii,
            0.0,
            0.0,
            std::f64::consts::TAU,
            curves::DEFAULT_ARC_SEGMENTS,
        );
        points.pop();
        self.draw_polygon(pen, &points);
    }

    fn fill_ellipse(&mut self, brush: &Brush, center: DVec2, radii: DVec2) -> Result<(), SurfaceError> {
        let mut points = curves::arc_points(
            center,
            radii,
            0.0,
            0.0,
            std::f64::consts::TAU,
            curves::DEFAULT_ARC_SEGMENTS,
        );
        points.pop();
        self.fill_polygon(brush, &points)
    }
}

pub fn rectangle_corners(min: DVec2, size: DVec2) -> [DVec2; 4] {
    [
        min,
        DVec2::new(min.x + size.x, min.y),
        min + size,
        DVec2::new(min.x, min.y + size.y),
    ]
}
