use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use cadraster_core::document::{
    BlockDefinition, BlockReference, BoundaryFlags, Circle, Dimension, DimensionKind, Document, Entity,
    EntityColor, Hatch, HatchEdge, HatchLoop, Line, PolylineVertex,
};
use cadraster_core::geometry::{Point2, Vector2};

/// 未指定输入时使用的示例图纸：外框、孔位块（含嵌套块）、标注、文字与实心填充。
pub fn demo_document() -> Document {
    let mut doc = Document::new();

    doc.add_polyline(
        [
            PolylineVertex::new(Point2::new(0.0, 0.0)),
            PolylineVertex::new(Point2::new(400.0, 0.0)),
            PolylineVertex::with_bulge(Point2::new(400.0, 200.0), 0.4),
            PolylineVertex::new(Point2::new(0.0, 200.0)),
        ],
        true,
        "OUTLINE",
    );
    doc.set_layer_color("OUTLINE", EntityColor::from_aci(5));
    doc.add_line(Point2::new(0.0, 100.0), Point2::new(400.0, 100.0), "CENTER");
    doc.add_circle(Point2::new(200.0, 100.0), 40.0, "OUTLINE");
    doc.add_arc(Point2::new(200.0, 100.0), 60.0, FRAC_PI_4, 3.0 * FRAC_PI_4, "OUTLINE");

    doc.add_block_definition(BlockDefinition {
        name: "BOLT".to_string(),
        base_point: Point2::new(0.0, 0.0),
        entities: vec![
            Entity::Circle(Circle {
                center: Point2::new(0.0, 0.0),
                radius: 6.0,
                layer: "HOLES".to_string(),
                color: EntityColor::ByLayer,
            }),
            Entity::Line(Line {
                start: Point2::new(-9.0, 0.0),
                end: Point2::new(9.0, 0.0),
                layer: "HOLES".to_string(),
                color: EntityColor::ByLayer,
            }),
        ],
    });
    doc.add_block_definition(BlockDefinition {
        name: "FLANGE".to_string(),
        base_point: Point2::new(0.0, 0.0),
        entities: vec![
            Entity::Circle(Circle {
                center: Point2::new(0.0, 0.0),
                radius: 20.0,
                layer: "HOLES".to_string(),
                color: EntityColor::ByLayer,
            }),
            Entity::BlockReference(BlockReference {
                name: "BOLT".to_string(),
                insert: Point2::new(14.0, 0.0),
                scale: Vector2::new(0.5, 0.5),
                rotation: 0.0,
                layer: "HOLES".to_string(),
                color: EntityColor::ByLayer,
            }),
        ],
    });
    for (index, x) in [50.0, 350.0].into_iter().enumerate() {
        doc.add_block_reference(
            "FLANGE",
            Point2::new(x, 50.0),
            Vector2::new(1.0, 1.0),
            index as f64 * FRAC_PI_2,
            "HOLES",
        );
    }

    doc.add_dimension(Dimension::new(
        DimensionKind::Linear {
            first: Point2::new(0.0, 0.0),
            second: Point2::new(400.0, 0.0),
            rotation: 0.0,
        },
        Point2::new(200.0, -30.0),
        "DIM",
    ));
    doc.add_dimension(Dimension::new(
        DimensionKind::Radial {
            center: Point2::new(200.0, 100.0),
            reference: Point2::new(228.28, 128.28),
        },
        Point2::new(250.0, 150.0),
        "DIM",
    ));

    doc.add_text(Point2::new(10.0, 210.0), "示例零件 DEMO-01", 12.0, 0.0, "TEXT");

    doc.add_entity(Entity::Hatch(Hatch {
        pattern_name: "SOLID".to_string(),
        is_solid: true,
        loops: vec![HatchLoop {
            flags: BoundaryFlags {
                external: true,
                outermost: false,
            },
            edges: vec![
                HatchEdge::Polyline {
                    vertices: vec![
                        Point2::new(300.0, 150.0),
                        Point2::new(380.0, 150.0),
                        Point2::new(380.0, 190.0),
                        Point2::new(300.0, 190.0),
                    ],
                    is_closed: true,
                },
            ],
        }],
        layer: "HATCH".to_string(),
        color: EntityColor::from_aci(1),
    }));

    doc
}
