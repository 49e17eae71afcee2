pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，模型坐标统一使用双精度。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn distance(self, other: Point2) -> f64 {
            self.0.distance(other.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        /// 以 `center` 为圆心、`angle`（弧度）为方向偏移 `radius`。
        #[inline]
        pub fn polar(center: Point2, radius: f64, angle: f64) -> Point2 {
            Self(center.0 + DVec2::new(angle.cos(), angle.sin()) * radius)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        /// 单位化；长度过小时返回 None。
        #[inline]
        pub fn normalize(self) -> Option<Self> {
            let len = self.0.length();
            if len <= f64::EPSILON {
                None
            } else {
                Some(Self(self.0 / len))
            }
        }

        /// 逆时针旋转 90° 的法向量。
        #[inline]
        pub fn perp(self) -> Self {
            Self(self.0.perp())
        }

        #[inline]
        pub fn dot(self, other: Vector2) -> f64 {
            self.0.dot(other.0)
        }

        #[inline]
        pub fn angle(self) -> f64 {
            self.0.y.atan2(self.0.x)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于估算文档/实体范围。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        /// 以左下角和宽高构造。
        #[inline]
        pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Self {
            Self {
                min: Point2::new(x, y),
                max: Point2::new(x + width, y + height),
            }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        #[inline]
        pub fn width(&self) -> f64 {
            self.max.x() - self.min.x()
        }

        #[inline]
        pub fn height(&self) -> f64 {
            self.max.y() - self.min.y()
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 由点集构造；空集返回 None。
        pub fn from_points<I>(points: I) -> Option<Self>
        where
            I: IntoIterator<Item = Point2>,
        {
            let mut bounds = Self::empty();
            for point in points {
                bounds.include_point(point);
            }
            if bounds.is_empty() { None } else { Some(bounds) }
        }

        /// 四周各扩展 `margin`。
        #[inline]
        pub fn expand(&self, margin: f64) -> Self {
            Self {
                min: Point2::new(self.min.x() - margin, self.min.y() - margin),
                max: Point2::new(self.max.x() + margin, self.max.y() + margin),
            }
        }

        #[inline]
        pub fn contains_point(&self, point: Point2, tolerance: f64) -> bool {
            point.x() >= self.min.x() - tolerance
                && point.x() <= self.max.x() + tolerance
                && point.y() >= self.min.y() - tolerance
                && point.y() <= self.max.y() + tolerance
        }

        #[inline]
        pub fn contains_bounds(&self, other: &Bounds2D, tolerance: f64) -> bool {
            self.contains_point(other.min, tolerance) && self.contains_point(other.max, tolerance)
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }
}

pub mod document {
    use std::collections::HashMap;
    use std::f64::consts::TAU;
    use std::path::PathBuf;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        #[inline]
        pub fn new(raw: u64) -> Self {
            Self(raw)
        }

        /// 提供原始数值，便于序列化或日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    /// 实体颜色：随层、随块或 ACI 索引色。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum EntityColor {
        #[default]
        ByLayer,
        ByBlock,
        Index(u8),
    }

    impl EntityColor {
        /// 按 ACI 约定解析：0 为随块，256 为随层。
        pub fn from_aci(index: i16) -> Self {
            match index {
                0 => EntityColor::ByBlock,
                256 => EntityColor::ByLayer,
                1..=255 => EntityColor::Index(index as u8),
                _ => EntityColor::ByLayer,
            }
        }

        #[inline]
        pub fn is_by_layer(self) -> bool {
            matches!(self, EntityColor::ByLayer)
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
        pub is_visible: bool,
        #[serde(default = "Layer::default_color")]
        pub color: EntityColor,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                is_visible: true,
                color: Self::default_color(),
            }
        }

        fn default_color() -> EntityColor {
            EntityColor::Index(7)
        }
    }

    /// 文字锚点（单行文字的对齐方式与多行文字的附着点共用）。
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum TextAnchor {
        TopLeft,
        TopCenter,
        TopRight,
        MiddleLeft,
        MiddleCenter,
        MiddleRight,
        #[default]
        BottomLeft,
        BottomCenter,
        BottomRight,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum HorizontalAnchor {
        Left,
        Center,
        Right,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum VerticalAnchor {
        Top,
        Middle,
        Bottom,
    }

    impl TextAnchor {
        pub fn horizontal(self) -> HorizontalAnchor {
            match self {
                TextAnchor::TopLeft | TextAnchor::MiddleLeft | TextAnchor::BottomLeft => {
                    HorizontalAnchor::Left
                }
                TextAnchor::TopCenter | TextAnchor::MiddleCenter | TextAnchor::BottomCenter => {
                    HorizontalAnchor::Center
                }
                TextAnchor::TopRight | TextAnchor::MiddleRight | TextAnchor::BottomRight => {
                    HorizontalAnchor::Right
                }
            }
        }

        pub fn vertical(self) -> VerticalAnchor {
            match self {
                TextAnchor::TopLeft | TextAnchor::TopCenter | TextAnchor::TopRight => {
                    VerticalAnchor::Top
                }
                TextAnchor::MiddleLeft | TextAnchor::MiddleCenter | TextAnchor::MiddleRight => {
                    VerticalAnchor::Middle
                }
                TextAnchor::BottomLeft | TextAnchor::BottomCenter | TextAnchor::BottomRight => {
                    VerticalAnchor::Bottom
                }
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Ellipse(Ellipse),
        Point(Point),
        Polyline(Polyline),
        MultiLine(MultiLine),
        Spline(Spline),
        Text(Text),
        MText(MText),
        Leader(Leader),
        Dimension(Dimension),
        Hatch(Hatch),
        BlockReference(BlockReference),
        RasterImage(RasterImage),
        Wipeout(Wipeout),
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Ellipse(ellipse) => &ellipse.layer,
                Entity::Point(point) => &point.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::MultiLine(mline) => &mline.layer,
                Entity::Spline(spline) => &spline.layer,
                Entity::Text(text) => &text.layer,
                Entity::MText(mtext) => &mtext.layer,
                Entity::Leader(leader) => &leader.layer,
                Entity::Dimension(dimension) => &dimension.layer,
                Entity::Hatch(hatch) => &hatch.layer,
                Entity::BlockReference(reference) => &reference.layer,
                Entity::RasterImage(image) => &image.layer,
                Entity::Wipeout(wipeout) => &wipeout.layer,
            }
        }

        #[inline]
        pub fn color(&self) -> EntityColor {
            match self {
                Entity::Line(line) => line.color,
                Entity::Circle(circle) => circle.color,
                Entity::Arc(arc) => arc.color,
                Entity::Ellipse(ellipse) => ellipse.color,
                Entity::Point(point) => point.color,
                Entity::Polyline(polyline) => polyline.color,
                Entity::MultiLine(mline) => mline.color,
                Entity::Spline(spline) => spline.color,
                Entity::Text(text) => text.color,
                Entity::MText(mtext) => mtext.color,
                Entity::Leader(leader) => leader.color,
                Entity::Dimension(dimension) => dimension.color,
                Entity::Hatch(hatch) => hatch.color,
                Entity::BlockReference(reference) => reference.color,
                Entity::RasterImage(image) => image.color,
                Entity::Wipeout(wipeout) => wipeout.color,
            }
        }

        /// 用于日志的类型名。
        pub fn kind_name(&self) -> &'static str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Circle(_) => "CIRCLE",
                Entity::Arc(_) => "ARC",
                Entity::Ellipse(_) => "ELLIPSE",
                Entity::Point(_) => "POINT",
                Entity::Polyline(_) => "LWPOLYLINE",
                Entity::MultiLine(_) => "MLINE",
                Entity::Spline(_) => "SPLINE",
                Entity::Text(_) => "TEXT",
                Entity::MText(_) => "MTEXT",
                Entity::Leader(_) => "LEADER",
                Entity::Dimension(_) => "DIMENSION",
                Entity::Hatch(_) => "HATCH",
                Entity::BlockReference(_) => "INSERT",
                Entity::RasterImage(_) => "IMAGE",
                Entity::Wipeout(_) => "WIPEOUT",
            }
        }

        #[inline]
        pub fn is_text(&self) -> bool {
            matches!(self, Entity::Text(_) | Entity::MText(_))
        }

        #[inline]
        pub fn is_dimension(&self) -> bool {
            matches!(self, Entity::Dimension(_))
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    /// 圆弧实体，角度以弧度形式储存，遵循数学正方向（逆时针）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    /// 椭圆实体，记录半长轴向量与参数范围（单位为弧度）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    impl Ellipse {
        #[inline]
        pub fn semi_major(&self) -> f64 {
            self.major_axis.length()
        }

        #[inline]
        pub fn semi_minor(&self) -> f64 {
            self.semi_major() * self.ratio.abs()
        }

        /// 长轴相对 X 轴的旋转角。
        #[inline]
        pub fn rotation(&self) -> f64 {
            self.major_axis.angle()
        }

        /// 参数跨度为 0 或 2π 时视为完整椭圆。
        pub fn is_full(&self) -> bool {
            let span = (self.end_parameter - self.start_parameter).abs();
            span < 1e-9 || (span - TAU).abs() < 1e-9
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Point {
        pub location: Point2,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    /// 多线：沿顶点路径按各元素偏移量生成平行线。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MultiLine {
        pub vertices: Vec<Point2>,
        pub offsets: Vec<f64>,
        pub scale: f64,
        pub is_closed: bool,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Spline {
        pub degree: usize,
        pub control_points: Vec<Point2>,
        #[serde(default)]
        pub knots: Vec<f64>,
        #[serde(default)]
        pub weights: Vec<f64>,
        pub is_closed: bool,
        #[serde(default)]
        pub is_periodic: bool,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Text {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        pub rotation: f64,
        #[serde(default)]
        pub alignment: TextAnchor,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MText {
        pub insert: Point2,
        pub content: String,
        pub height: f64,
        /// 参考矩形宽度，0 表示未指定。
        #[serde(default)]
        pub rectangle_width: f64,
        #[serde(default)]
        pub rotation: f64,
        #[serde(default = "MText::default_attachment")]
        pub attachment: TextAnchor,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    impl MText {
        fn default_attachment() -> TextAnchor {
            TextAnchor::TopLeft
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Leader {
        pub vertices: Vec<Point2>,
        #[serde(default = "Leader::default_arrowhead")]
        pub has_arrowhead: bool,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    impl Leader {
        fn default_arrowhead() -> bool {
            true
        }
    }

    /// 标注样式（命名共享）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DimensionStyle {
        pub name: String,
        pub text_height: f64,
        pub overall_scale: f64,
        #[serde(default)]
        pub prefix: String,
        #[serde(default)]
        pub suffix: String,
    }

    impl DimensionStyle {
        pub fn standard() -> Self {
            Self {
                name: "Standard".to_string(),
                text_height: 2.5,
                overall_scale: 1.0,
                prefix: String::new(),
                suffix: String::new(),
            }
        }
    }

    /// 单个标注上的样式覆盖，优先于命名样式。
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct DimensionStyleOverrides {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub text_height: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub overall_scale: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub prefix: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub suffix: Option<String>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum OrdinateAxis {
        X,
        Y,
    }

    /// 七种标注的几何定义。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    pub enum DimensionKind {
        /// 线性标注，尺寸线经过文字参考点，方向由 `rotation` 决定。
        Linear {
            first: Point2,
            second: Point2,
            rotation: f64,
        },
        Aligned {
            first: Point2,
            second: Point2,
            dimension_line: Point2,
        },
        Radial {
            center: Point2,
            reference: Point2,
        },
        Diametric {
            center: Point2,
            reference: Point2,
        },
        /// 两线角度标注，顶点为两条直线的交点。
        Angular2Line {
            first_start: Point2,
            first_end: Point2,
            second_start: Point2,
            second_end: Point2,
        },
        Ordinate {
            origin: Point2,
            feature: Point2,
            axis: OrdinateAxis,
        },
        ArcLength {
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            offset: f64,
        },
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Dimension {
        pub kind: DimensionKind,
        pub text_reference: Point2,
        #[serde(default)]
        pub user_text: String,
        /// 显式测量值；缺省时按几何计算。
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub measurement: Option<f64>,
        #[serde(default = "Dimension::default_style")]
        pub style: String,
        #[serde(default)]
        pub overrides: DimensionStyleOverrides,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    impl Dimension {
        fn default_style() -> String {
            "Standard".to_string()
        }

        pub fn new(kind: DimensionKind, text_reference: Point2, layer: impl Into<String>) -> Self {
            Self {
                kind,
                text_reference,
                user_text: String::new(),
                measurement: None,
                style: Self::default_style(),
                overrides: DimensionStyleOverrides::default(),
                layer: layer.into(),
                color: EntityColor::ByLayer,
            }
        }

        /// 标注数值：线性/对齐为长度，角度为度数，弧长为弧长。
        pub fn measurement(&self) -> f64 {
            if let Some(value) = self.measurement {
                return value;
            }
            match &self.kind {
                DimensionKind::Linear {
                    first,
                    second,
                    rotation,
                } => {
                    let direction = Vector2::new(rotation.cos(), rotation.sin());
                    first.vector_to(*second).dot(direction).abs()
                }
                DimensionKind::Aligned { first, second, .. } => first.distance(*second),
                DimensionKind::Radial { center, reference } => center.distance(*reference),
                DimensionKind::Diametric { center, reference } => {
                    center.distance(*reference) * 2.0
                }
                DimensionKind::Angular2Line {
                    first_start,
                    first_end,
                    second_start,
                    second_end,
                } => {
                    let a = first_start.vector_to(*first_end).angle();
                    let b = second_start.vector_to(*second_end).angle();
                    let mut diff = (b - a).abs() % TAU;
                    if diff > std::f64::consts::PI {
                        diff = TAU - diff;
                    }
                    diff.to_degrees()
                }
                DimensionKind::Ordinate {
                    origin,
                    feature,
                    axis,
                } => match axis {
                    OrdinateAxis::X => feature.x() - origin.x(),
                    OrdinateAxis::Y => feature.y() - origin.y(),
                },
                DimensionKind::ArcLength {
                    radius,
                    start_angle,
                    end_angle,
                    ..
                } => {
                    let mut sweep = end_angle - start_angle;
                    if sweep < 0.0 {
                        sweep += TAU;
                    }
                    radius.abs() * sweep
                }
            }
        }

        /// 两线角度标注的顶点；两线平行时返回 None。
        pub fn angular_vertex(&self) -> Option<Point2> {
            let DimensionKind::Angular2Line {
                first_start,
                first_end,
                second_start,
                second_end,
            } = &self.kind
            else {
                return None;
            };
            line_intersection(*first_start, *first_end, *second_start, *second_end)
        }
    }

    fn line_intersection(a0: Point2, a1: Point2, b0: Point2, b1: Point2) -> Option<Point2> {
        let da = a0.vector_to(a1).as_vec2();
        let db = b0.vector_to(b1).as_vec2();
        let denom = da.perp_dot(db);
        if denom.abs() <= 1e-12 {
            return None;
        }
        let t = a0.vector_to(b0).as_vec2().perp_dot(db) / denom;
        Some(Point2::from_vec(a0.as_vec2() + da * t))
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct BoundaryFlags {
        #[serde(default)]
        pub external: bool,
        #[serde(default)]
        pub outermost: bool,
    }

    impl BoundaryFlags {
        /// 外部或最外层边界需要闭合。
        #[inline]
        pub fn closes_figure(self) -> bool {
            self.external || self.outermost
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum HatchEdge {
        Line {
            start: Point2,
            end: Point2,
        },
        Polyline {
            vertices: Vec<Point2>,
            is_closed: bool,
        },
        Spline {
            degree: usize,
            control_points: Vec<Point2>,
            #[serde(default)]
            knots: Vec<f64>,
            #[serde(default)]
            weights: Vec<f64>,
        },
        Arc {
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            is_counter_clockwise: bool,
        },
        Ellipse {
            center: Point2,
            major_axis: Vector2,
            ratio: f64,
            start_parameter: f64,
            end_parameter: f64,
            is_counter_clockwise: bool,
        },
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct HatchLoop {
        #[serde(default)]
        pub flags: BoundaryFlags,
        pub edges: Vec<HatchEdge>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Hatch {
        pub pattern_name: String,
        pub is_solid: bool,
        pub loops: Vec<HatchLoop>,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockReference {
        pub name: String,
        pub insert: Point2,
        pub scale: Vector2,
        pub rotation: f64,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BlockDefinition {
        pub name: String,
        pub base_point: Point2,
        pub entities: Vec<Entity>,
    }

    /// 光栅图像，`position` 为左下角，旋转以弧度计。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct RasterImage {
        pub position: Point2,
        pub width: f64,
        pub height: f64,
        #[serde(default)]
        pub rotation: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub file_path: Option<String>,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum WipeoutBoundary {
        Rectangular(Point2, Point2),
        Polygonal(Vec<Point2>),
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Wipeout {
        pub boundary: WipeoutBoundary,
        pub layer: String,
        #[serde(default)]
        pub color: EntityColor,
    }

    /// 文档级范围提示（来自文件头的最小/最大角点）。
    #[derive(Debug, Clone, Copy, Serialize, Deserialize)]
    pub struct ExtentHint {
        pub min: Option<Point2>,
        pub max: Option<Point2>,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
        blocks: HashMap<String, BlockDefinition>,
        #[serde(default)]
        dimension_styles: HashMap<String, DimensionStyle>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        extent_hint: Option<ExtentHint>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_dir: Option<PathBuf>,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc.add_dimension_style(DimensionStyle::standard());
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        /// 添加任意实体，自动补建图层。
        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        pub fn add_line(
            &mut self,
            start: Point2,
            end: Point2,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Line(Line {
                start,
                end,
                layer: layer.into(),
                color: EntityColor::ByLayer,
            }))
        }

        pub fn add_circle(
            &mut self,
            center: Point2,
            radius: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Circle(Circle {
                center,
                radius,
                layer: layer.into(),
                color: EntityColor::ByLayer,
            }))
        }

        pub fn add_arc(
            &mut self,
            center: Point2,
            radius: f64,
            start_angle: f64,
            end_angle: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Arc(Arc {
                center,
                radius,
                start_angle,
                end_angle,
                layer: layer.into(),
                color: EntityColor::ByLayer,
            }))
        }

        pub fn add_polyline<I>(
            &mut self,
            vertices: I,
            is_closed: bool,
            layer: impl Into<String>,
        ) -> EntityId
        where
            I: IntoIterator<Item = PolylineVertex>,
        {
            self.add_entity(Entity::Polyline(Polyline {
                vertices: vertices.into_iter().collect(),
                is_closed,
                layer: layer.into(),
                color: EntityColor::ByLayer,
            }))
        }

        pub fn add_text(
            &mut self,
            insert: Point2,
            content: impl Into<String>,
            height: f64,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::Text(Text {
                insert,
                content: content.into(),
                height,
                rotation,
                alignment: TextAnchor::BottomLeft,
                layer: layer.into(),
                color: EntityColor::ByLayer,
            }))
        }

        pub fn add_dimension(&mut self, dimension: Dimension) -> EntityId {
            self.add_entity(Entity::Dimension(dimension))
        }

        pub fn add_block_reference(
            &mut self,
            name: impl Into<String>,
            insert: Point2,
            scale: Vector2,
            rotation: f64,
            layer: impl Into<String>,
        ) -> EntityId {
            self.add_entity(Entity::BlockReference(BlockReference {
                name: name.into(),
                insert,
                scale,
                rotation,
                layer: layer.into(),
                color: EntityColor::ByLayer,
            }))
        }

        pub fn add_block_definition(&mut self, definition: BlockDefinition) {
            for entity in &definition.entities {
                self.ensure_layer(entity.layer_name());
            }
            self.blocks.insert(definition.name.clone(), definition);
        }

        #[inline]
        pub fn block(&self, name: &str) -> Option<&BlockDefinition> {
            self.blocks.get(name)
        }

        pub fn add_dimension_style(&mut self, style: DimensionStyle) {
            self.dimension_styles.insert(style.name.clone(), style);
        }

        #[inline]
        pub fn dimension_style(&self, name: &str) -> Option<&DimensionStyle> {
            self.dimension_styles.get(name)
        }

        #[inline]
        pub fn layer(&self, name: &str) -> Option<&Layer> {
            self.layers.get(name)
        }

        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        /// 设置图层可见性，图层不存在时返回 false。
        pub fn set_layer_visible(&mut self, name: &str, visible: bool) -> bool {
            match self.layers.get_mut(name) {
                Some(layer) => {
                    layer.is_visible = visible;
                    true
                }
                None => false,
            }
        }

        pub fn set_layer_color(&mut self, name: &str, color: EntityColor) -> bool {
            match self.layers.get_mut(name) {
                Some(layer) => {
                    layer.color = color;
                    true
                }
                None => false,
            }
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        pub fn entity(&self, id: EntityId) -> Option<&Entity> {
            self.entities
                .iter()
                .find(|(entity_id, _)| *entity_id == id)
                .map(|(_, entity)| entity)
        }

        pub fn set_extent_hint(&mut self, min: Option<Point2>, max: Option<Point2>) {
            self.extent_hint = Some(ExtentHint { min, max });
        }

        /// 两个角点都存在时才返回提示范围。
        pub fn extent_hint(&self) -> Option<Bounds2D> {
            let hint = self.extent_hint?;
            Some(Bounds2D::new(hint.min?, hint.max?))
        }

        pub fn set_base_dir(&mut self, dir: impl Into<PathBuf>) {
            self.base_dir = Some(dir.into());
        }

        /// 相对图像路径的解析目录。
        #[inline]
        pub fn base_dir(&self) -> Option<&PathBuf> {
            self.base_dir.as_ref()
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::f64::consts::{FRAC_PI_2, PI};

        #[test]
        fn document_stores_entities_and_layers() {
            let mut doc = Document::new();
            let line = doc.add_line(Point2::new(0.0, 0.0), Point2::new(10.0, 0.0), "0");
            let circle = doc.add_circle(Point2::new(5.0, 5.0), 2.0, "ANNOT");
            let arc = doc.add_arc(Point2::new(5.0, 0.0), 3.5, 0.0, FRAC_PI_2, "GEOM");

            assert_eq!(line.get(), 0);
            assert_eq!(circle.get(), 1);
            assert_eq!(arc.get(), 2);
            assert_eq!(doc.entity_count(), 3);
            assert!(doc.layer("ANNOT").is_some());
            assert!(doc.layer("GEOM").is_some());
            assert!(doc.dimension_style("Standard").is_some());

            match doc.entity(arc) {
                Some(Entity::Arc(arc)) => {
                    assert_eq!(arc.layer, "GEOM");
                    assert!((arc.radius - 3.5).abs() < f64::EPSILON);
                }
                other => panic!("unexpected entity lookup result: {other:?}"),
            }
        }

        #[test]
        fn layer_visibility_and_color_can_be_changed() {
            let mut doc = Document::new();
            doc.add_line(Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), "HIDDEN");
            assert!(doc.set_layer_visible("HIDDEN", false));
            assert!(doc.set_layer_color("HIDDEN", EntityColor::Index(1)));
            let layer = doc.layer("HIDDEN").expect("layer exists");
            assert!(!layer.is_visible);
            assert_eq!(layer.color, EntityColor::Index(1));
            assert!(!doc.set_layer_visible("MISSING", false));
        }

        #[test]
        fn aci_codes_map_to_by_block_and_by_layer() {
            assert_eq!(EntityColor::from_aci(0), EntityColor::ByBlock);
            assert_eq!(EntityColor::from_aci(256), EntityColor::ByLayer);
            assert_eq!(EntityColor::from_aci(3), EntityColor::Index(3));
        }

        #[test]
        fn extent_hint_requires_both_corners() {
            let mut doc = Document::new();
            assert!(doc.extent_hint().is_none());
            doc.set_extent_hint(Some(Point2::new(0.0, 0.0)), None);
            assert!(doc.extent_hint().is_none());
            doc.set_extent_hint(Some(Point2::new(-1.0, -2.0)), Some(Point2::new(3.0, 4.0)));
            let hint = doc.extent_hint().expect("hint");
            assert!((hint.width() - 4.0).abs() < 1e-12);
            assert!((hint.height() - 6.0).abs() < 1e-12);
        }

        #[test]
        fn dimension_measurements_follow_geometry() {
            let linear = Dimension::new(
                DimensionKind::Linear {
                    first: Point2::new(0.0, 0.0),
                    second: Point2::new(100.0, 30.0),
                    rotation: 0.0,
                },
                Point2::new(50.0, 20.0),
                "DIM",
            );
            assert!((linear.measurement() - 100.0).abs() < 1e-9);

            let vertical = Dimension::new(
                DimensionKind::Linear {
                    first: Point2::new(0.0, 0.0),
                    second: Point2::new(100.0, 30.0),
                    rotation: FRAC_PI_2,
                },
                Point2::new(50.0, 20.0),
                "DIM",
            );
            assert!((vertical.measurement() - 30.0).abs() < 1e-9);

            let diametric = Dimension::new(
                DimensionKind::Diametric {
                    center: Point2::new(0.0, 0.0),
                    reference: Point2::new(3.0, 4.0),
                },
                Point2::new(6.0, 8.0),
                "DIM",
            );
            assert!((diametric.measurement() - 10.0).abs() < 1e-9);

            let arc_length = Dimension::new(
                DimensionKind::ArcLength {
                    center: Point2::new(0.0, 0.0),
                    radius: 2.0,
                    start_angle: 0.0,
                    end_angle: PI,
                    offset: 3.0,
                },
                Point2::new(0.0, 3.0),
                "DIM",
            );
            assert!((arc_length.measurement() - 2.0 * PI).abs() < 1e-9);
        }

        #[test]
        fn angular_vertex_is_line_intersection() {
            let dimension = Dimension::new(
                DimensionKind::Angular2Line {
                    first_start: Point2::new(1.0, 1.0),
                    first_end: Point2::new(5.0, 1.0),
                    second_start: Point2::new(1.0, 1.0),
                    second_end: Point2::new(1.0, 7.0),
                },
                Point2::new(3.0, 3.0),
                "DIM",
            );
            let vertex = dimension.angular_vertex().expect("lines intersect");
            assert!((vertex.x() - 1.0).abs() < 1e-9);
            assert!((vertex.y() - 1.0).abs() < 1e-9);
            assert!((dimension.measurement() - 90.0).abs() < 1e-9);
        }

        #[test]
        fn ellipse_reports_axes_and_fullness() {
            let ellipse = Ellipse {
                center: Point2::new(0.0, 0.0),
                major_axis: Vector2::new(0.0, 4.0),
                ratio: 0.5,
                start_parameter: 0.0,
                end_parameter: TAU,
                layer: "0".to_string(),
                color: EntityColor::ByLayer,
            };
            assert!((ellipse.semi_major() - 4.0).abs() < 1e-12);
            assert!((ellipse.semi_minor() - 2.0).abs() < 1e-12);
            assert!((ellipse.rotation() - FRAC_PI_2).abs() < 1e-12);
            assert!(ellipse.is_full());
        }

        #[test]
        fn document_round_trips_through_json() {
            let mut doc = Document::new();
            doc.add_text(Point2::new(1.0, 2.0), "Hello", 2.5, 0.0, "TEXT");
            doc.set_extent_hint(Some(Point2::new(0.0, 0.0)), Some(Point2::new(10.0, 10.0)));
            let json = serde_json::to_string(&doc).expect("serialize");
            let restored: Document = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(restored.entity_count(), 1);
            assert!(restored.layer("TEXT").is_some());
            assert!(restored.extent_hint().is_some());
        }
    }
}
