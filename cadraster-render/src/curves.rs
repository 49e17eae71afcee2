use std::f64::consts::TAU;

use glam::{DVec2, DVec3};
use thiserror::Error;

pub const DEFAULT_ARC_SEGMENTS: usize = 64;

const MIN_ARC_SEGMENTS: usize = 8;
const MAX_ARC_SEGMENTS: usize = 1024;
const MIN_SPLINE_PRECISION: usize = 50;
const MAX_SPLINE_PRECISION: usize = 500;
const MIN_HATCH_SPLINE_PRECISION: usize = 20;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CurveError {
    #[error("spline of degree {degree} needs at least {required} control points, got {actual}")]
    NotEnoughControlPoints {
        degree: usize,
        required: usize,
        actual: usize,
    },
    #[error("spline degree must be at least 1")]
    InvalidDegree,
    #[error("knot vector has {actual} entries, expected {expected}")]
    KnotCount { expected: usize, actual: usize },
    #[error("knot vector is not non-decreasing")]
    KnotOrder,
    #[error("weight count {actual} does not match control point count {expected}")]
    WeightCount { expected: usize, actual: usize },
    #[error("spline evaluates to a degenerate weight at parameter {0}")]
    DegenerateWeight(f64),
}

/// 按弧长估算折线段数（`radius` 为设备像素）。
pub fn arc_segment_count(radius: f64, sweep: f64) -> usize {
    let estimate = (sweep.abs() * radius.max(1.0) / 3.0).ceil();
    if !estimate.is_finite() {
        return MIN_ARC_SEGMENTS;
    }
    (estimate as usize).clamp(MIN_ARC_SEGMENTS, MAX_ARC_SEGMENTS)
}

/// 在旋转后的椭圆（圆为半轴相等的特例）上均匀采样 `segments + 1` 个点。
pub fn arc_points(
    center: DVec2,
    radii: DVec2,
    rotation: f64,
    start: f64,
    sweep: f64,
    segments: usize,
) -> Vec<DVec2> {
    let segments = segments.max(1);
    let axis = DVec2::from_angle(rotation);
    (0..=segments)
        .map(|i| {
            let t = start + sweep * i as f64 / segments as f64;
            let local = DVec2::new(radii.x * t.cos(), radii.y * t.sin());
            center + axis.rotate(local)
        })
        .collect()
}

/// 圆弧扫掠角：终止角小于起始角时视为跨越 0。
#[inline]
pub fn sweep_angle(start: f64, end: f64) -> f64 {
    let end = if end < start { end + TAU } else { end };
    end - start
}

/// 椭圆弧扫掠角，归一化到 (0, 2π]，零扫掠视为完整椭圆。
pub fn ellipse_sweep(start: f64, end: f64) -> f64 {
    let mut sweep = end - start;
    if sweep < 0.0 {
        sweep += TAU;
    }
    if sweep.abs() < 1e-10 {
        sweep = TAU;
    }
    sweep
}

/// 由凸度重建的圆弧，`sweep` 为正表示逆时针。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulgeArc {
    pub center: DVec2,
    pub radius: f64,
    pub start_angle: f64,
    pub sweep: f64,
}

impl BulgeArc {
    pub fn points(&self, segments: usize) -> Vec<DVec2> {
        arc_points(
            self.center,
            DVec2::splat(self.radius),
            0.0,
            self.start_angle,
            self.sweep,
            segments,
        )
    }
}

/// 多段线的一段。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    Line(DVec2, DVec2),
    Arc(BulgeArc),
}

/// 由弦端点与凸度构造弧；弦长近零时返回 None。
pub fn bulge_arc(start: DVec2, end: DVec2, bulge: f64) -> Option<BulgeArc> {
    let delta = end - start;
    let chord = delta.length();
    if chord < 1e-10 || bulge.abs() < 1e-10 {
        return None;
    }

    let radius = chord * (1.0 + bulge * bulge) / (4.0 * bulge.abs());
    let mid = (start + end) * 0.5;
    let perp = DVec2::new(-delta.y, delta.x) / chord;
    let sagitta = bulge.abs() * chord / 2.0;
    let center_distance = radius - sagitta;
    let center = if bulge > 0.0 {
        mid + perp * center_distance
    } else {
        mid - perp * center_distance
    };

    let start_angle = (start.y - center.y).atan2(start.x - center.x);
    let end_angle = (end.y - center.y).atan2(end.x - center.x);
    let sweep = if bulge > 0.0 {
        let mut sweep = end_angle - start_angle;
        if sweep <= 0.0 {
            sweep += TAU;
        }
        sweep
    } else {
        let mut sweep = start_angle - end_angle;
        if sweep <= 0.0 {
            sweep += TAU;
        }
        -sweep
    };

    Some(BulgeArc {
        center,
        radius,
        start_angle,
        sweep,
    })
}

/// 将一段带凸度的多段线转换为直线或圆弧；零长度弧段返回 None。
pub fn polyline_segment(start: DVec2, end: DVec2, bulge: f64) -> Option<Segment> {
    if bulge.abs() < 1e-10 {
        return Some(Segment::Line(start, end));
    }
    bulge_arc(start, end, bulge).map(Segment::Arc)
}

/// 样条采样精度随缩放变化，限制在 [50, 500]。
pub fn spline_precision(scale: f64) -> usize {
    let raw = (100.0 * scale).max(0.0);
    let raw = if raw.is_finite() { raw as usize } else { MAX_SPLINE_PRECISION };
    raw.clamp(MIN_SPLINE_PRECISION, MAX_SPLINE_PRECISION)
}

/// 填充边界中的样条采样精度。
pub fn hatch_spline_precision(control_points: usize) -> usize {
    (control_points * 5).max(MIN_HATCH_SPLINE_PRECISION)
}

/// NURBS 曲线定义（只读借用）。
#[derive(Debug, Clone, Copy)]
pub struct NurbsCurve<'a> {
    pub degree: usize,
    pub control_points: &'a [DVec2],
    pub knots: &'a [f64],
    pub weights: &'a [f64],
    pub closed: bool,
    pub periodic: bool,
}

impl NurbsCurve<'_> {
    /// 按 de Boor 算法采样 `precision` 个点；闭合曲线不重复终点。
    pub fn evaluate(&self, precision: usize) -> Result<Vec<DVec2>, CurveError> {
        let degree = self.degree;
        if degree == 0 {
            return Err(CurveError::InvalidDegree);
        }

        let mut points: Vec<DVec2> = self.control_points.to_vec();
        let mut weights: Vec<f64> = if self.weights.is_empty() {
            vec![1.0; points.len()]
        } else {
            self.weights.to_vec()
        };
        if weights.len() != points.len() {
            return Err(CurveError::WeightCount {
                expected: points.len(),
                actual: weights.len(),
            });
        }

        let wrap = self.periodic && self.knots.is_empty();
        if wrap && points.len() > degree {
            for i in 0..degree {
                points.push(points[i]);
                weights.push(weights[i]);
            }
        }

        let count = points.len();
        if count <= degree {
            return Err(CurveError::NotEnoughControlPoints {
                degree,
                required: degree.saturating_add(1),
                actual: count,
            });
        }

        let knots = if self.knots.is_empty() {
            if wrap {
                uniform_knots(count, degree)
            } else {
                clamped_knots(count, degree)
            }
        } else {
            self.knots.to_vec()
        };
        let expected = count + degree + 1;
        if knots.len() != expected {
            return Err(CurveError::KnotCount {
                expected,
                actual: knots.len(),
            });
        }
        if knots.windows(2).any(|pair| pair[1] < pair[0]) {
            return Err(CurveError::KnotOrder);
        }

        let homogeneous: Vec<DVec3> = points
            .iter()
            .zip(&weights)
            .map(|(point, weight)| DVec3::new(point.x * weight, point.y * weight, *weight))
            .collect();

        let u_start = knots[degree];
        let u_end = knots[count];
        let precision = precision.max(2);
        let closed = self.closed || self.periodic;
        let divisions = if closed { precision } else { precision - 1 };

        let mut samples = Vec::with_capacity(precision);
        for i in 0..precision {
            let u = u_start + (u_end - u_start) * i as f64 / divisions as f64;
            let point = de_boor(&homogeneous, &knots, degree, u);
            if point.z.abs() < 1e-12 {
                return Err(CurveError::DegenerateWeight(u));
            }
            samples.push(DVec2::new(point.x / point.z, point.y / point.z));
        }
        Ok(samples)
    }
}

fn clamped_knots(count: usize, degree: usize) -> Vec<f64> {
    let interior = count - degree;
    let mut knots = Vec::with_capacity(count + degree + 1);
    knots.extend(std::iter::repeat_n(0.0, degree + 1));
    for i in 1..interior {
        knots.push(i as f64 / interior as f64);
    }
    knots.extend(std::iter::repeat_n(1.0, degree + 1));
    knots
}

fn uniform_knots(count: usize, degree: usize) -> Vec<f64> {
    (0..count + degree + 1).map(|i| i as f64).collect()
}

fn find_span(knots: &[f64], degree: usize, count: usize, u: f64) -> usize {
    if u >= knots[count] {
        let mut span = count - 1;
        while span > degree && knots[span] >= knots[span + 1] {
            span -= 1;
        }
        return span;
    }
    let mut span = degree;
    while span + 1 < count && knots[span + 1] <= u {
        span += 1;
    }
    span
}

fn de_boor(points: &[DVec3], knots: &[f64], degree: usize, u: f64) -> DVec3 {
    let span = find_span(knots, degree, points.len(), u);
    let mut d: Vec<DVec3> = (0..=degree).map(|j| points[span - degree + j]).collect();
    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let index = span - degree + j;
            let denom = knots[index + degree + 1 - r] - knots[index];
            let alpha = if denom.abs() < 1e-15 {
                0.0
            } else {
                (u - knots[index]) / denom
            };
            d[j] = d[j - 1] * (1.0 - alpha) + d[j] * alpha;
        }
    }
    d[degree]
}

/// 按多线元素偏移量生成一条平行折线，转角处使用斜接法向。
pub fn offset_polyline(vertices: &[DVec2], offset: f64, closed: bool) -> Vec<DVec2> {
    let count = vertices.len();
    if count < 2 {
        return Vec::new();
    }

    let segment_normal = |from: DVec2, to: DVec2| -> Option<DVec2> {
        (to - from).try_normalize().map(|direction| direction.perp())
    };

    (0..count)
        .map(|i| {
            let prev = if i > 0 {
                Some(vertices[i - 1])
            } else if closed {
                Some(vertices[count - 1])
            } else {
                None
            };
            let next = if i + 1 < count {
                Some(vertices[i + 1])
            } else if closed {
                Some(vertices[0])
            } else {
                None
            };
            let incoming = prev.and_then(|p| segment_normal(p, vertices[i]));
            let outgoing = next.and_then(|n| segment_normal(vertices[i], n));
            let normal = match (incoming, outgoing) {
                (Some(a), Some(b)) => match (a + b).try_normalize() {
                    Some(miter) => {
                        let cos = miter.dot(a).max(0.1);
                        miter / cos
                    }
                    None => a,
                },
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => DVec2::ZERO,
            };
            vertices[i] + normal * offset
        })
        .collect()
}

/// 多线分解为直线段：每个元素一条平行折线。
pub fn explode_multiline(vertices: &[DVec2], offsets: &[f64], scale: f64, closed: bool) -> Vec<(DVec2, DVec2)> {
    let mut lines = Vec::new();
    for offset in offsets {
        let points = offset_polyline(vertices, offset * scale, closed);
        lines.extend(points.windows(2).map(|pair| (pair[0], pair[1])));
        if closed && points.len() > 2 {
            lines.push((points[points.len() - 1], points[0]));
        }
    }
    lines
}
