use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use cadraster_core::document::{Document, Entity, EntityColor};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::options::RenderOptions;
use crate::surface::{Brush, Font, Pen};

/// 8 位 RGBA 颜色（非预乘）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(255, 255, 255);
    pub const RED: Rgba = Rgba::rgb(255, 0, 0);
    pub const YELLOW: Rgba = Rgba::rgb(255, 255, 0);
    pub const GREEN: Rgba = Rgba::rgb(0, 128, 0);
    pub const CYAN: Rgba = Rgba::rgb(0, 255, 255);
    pub const BLUE: Rgba = Rgba::rgb(0, 0, 255);
    pub const MAGENTA: Rgba = Rgba::rgb(255, 0, 255);
    pub const GRAY: Rgba = Rgba::rgb(128, 128, 128);
    pub const LIGHT_GRAY: Rgba = Rgba::rgb(211, 211, 211);
    pub const DARK_BLUE: Rgba = Rgba::rgb(0, 0, 139);
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// ACI 索引色映射：1-9 为固定调色板，其余一律为黑色。
pub fn aci_to_rgba(index: u8) -> Rgba {
    match index {
        1 => Rgba::RED,
        2 => Rgba::YELLOW,
        3 => Rgba::GREEN,
        4 => Rgba::CYAN,
        5 => Rgba::BLUE,
        6 => Rgba::MAGENTA,
        7 => Rgba::WHITE,
        8 => Rgba::GRAY,
        9 => Rgba::LIGHT_GRAY,
        _ => Rgba::BLACK,
    }
}

/// 将实体颜色模式解析为实际颜色。随层/随块在保留原色时为白色，否则为黑色。
pub fn convert_color(color: EntityColor, options: &RenderOptions) -> Rgba {
    match color {
        EntityColor::ByLayer | EntityColor::ByBlock => {
            if options.keep_original_colors {
                Rgba::WHITE
            } else {
                Rgba::BLACK
            }
        }
        EntityColor::Index(index) => aci_to_rgba(index),
    }
}

/// 解析实体绘制颜色。
pub fn entity_color(entity: &Entity, document: &Document, options: &RenderOptions) -> Rgba {
    if !options.keep_original_colors {
        return if entity.is_dimension() {
            Rgba::DARK_BLUE
        } else {
            Rgba::BLACK
        };
    }

    let color = entity.color();
    if color.is_by_layer() {
        if let Some(layer) = document.layer(entity.layer_name()) {
            return convert_color(layer.color, options);
        }
    }
    convert_color(color, options)
}

/// 背景色与擦除色。
#[inline]
pub fn background_color(options: &RenderOptions) -> Rgba {
    if options.keep_original_colors {
        Rgba::BLACK
    } else {
        Rgba::WHITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PenKey {
    color: Rgba,
    width_bits: u64,
}

/// 画笔、画刷、字体池。每个池各自加锁，按值相等复用。
#[derive(Debug, Default)]
pub struct ResourceCache {
    pens: Mutex<HashMap<PenKey, Arc<Pen>>>,
    brushes: Mutex<HashMap<Rgba, Arc<Brush>>>,
    fonts: Mutex<HashMap<u64, Arc<Font>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取或创建圆头圆角画笔。
    pub fn pen(&self, color: Rgba, width: f64) -> Arc<Pen> {
        let key = PenKey {
            color,
            width_bits: width.to_bits(),
        };
        let mut pens = lock(&self.pens);
        pens.entry(key)
            .or_insert_with(|| Arc::new(Pen::solid(color, width)))
            .clone()
    }

    pub fn brush(&self, color: Rgba) -> Arc<Brush> {
        let mut brushes = lock(&self.brushes);
        brushes
            .entry(color)
            .or_insert_with(|| Arc::new(Brush::Solid(color)))
            .clone()
    }

    pub fn font(&self, size: f64) -> Arc<Font> {
        let mut fonts = lock(&self.fonts);
        fonts
            .entry(size.to_bits())
            .or_insert_with(|| Arc::new(Font::new(size)))
            .clone()
    }

    /// 各池当前条目数（画笔、画刷、字体）。
    pub fn len(&self) -> (usize, usize, usize) {
        (
            lock(&self.pens).len(),
            lock(&self.brushes).len(),
            lock(&self.fonts).len(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.len() == (0, 0, 0)
    }

    /// 释放三个池中的全部资源。
    pub fn clear(&self) {
        let (pens, brushes, fonts) = self.len();
        lock(&self.pens).clear();
        lock(&self.brushes).clear();
        lock(&self.fonts).clear();
        debug!(pens, brushes, fonts, "资源缓存已清空");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadraster_core::document::{Document, Line};
    use cadraster_core::geometry::Point2;

    fn line(layer: &str, color: EntityColor) -> Entity {
        Entity::Line(Line {
            start: Point2::new(0.0, 0.0),
            end: Point2::new(1.0, 1.0),
            layer: layer.to_string(),
            color,
        })
    }

    #[test]
    fn flattened_palette_ignores_entity_colors() {
        let doc = Document::new();
        let options = RenderOptions::default();
        assert_eq!(
            entity_color(&line("0", EntityColor::Index(1)), &doc, &options),
            Rgba::BLACK
        );
    }

    #[test]
    fn keep_original_colors_resolves_layer_color() {
        let mut doc = Document::new();
        doc.ensure_layer("RED");
        doc.set_layer_color("RED", EntityColor::Index(1));
        let options = RenderOptions {
            keep_original_colors: true,
            ..RenderOptions::default()
        };
        assert_eq!(
            entity_color(&line("RED", EntityColor::ByLayer), &doc, &options),
            Rgba::RED
        );
        assert_eq!(
            entity_color(&line("RED", EntityColor::Index(3)), &doc, &options),
            Rgba::GREEN
        );
        assert_eq!(
            entity_color(&line("RED", EntityColor::ByBlock), &doc, &options),
            Rgba::WHITE
        );
    }

    #[test]
    fn aci_table_falls_back_to_black() {
        assert_eq!(aci_to_rgba(8), Rgba::GRAY);
        assert_eq!(aci_to_rgba(9), Rgba::LIGHT_GRAY);
        assert_eq!(aci_to_rgba(42), Rgba::BLACK);
    }

    #[test]
    fn pools_reuse_entries_and_clear() {
        let cache = ResourceCache::new();
        let a = cache.pen(Rgba::RED, 1.0);
        let b = cache.pen(Rgba::RED, 1.0);
        let c = cache.pen(Rgba::RED, 0.5);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        cache.brush(Rgba::BLUE);
        cache.font(12.0);
        cache.font(12.0);
        assert_eq!(cache.len(), (2, 1, 1));
        cache.clear();
        assert!(cache.is_empty());
    }
}
