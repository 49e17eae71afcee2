use cadraster_core::document::{
    BoundaryFlags, Dimension, DimensionKind, Document, Entity, EntityColor, Hatch, HatchEdge, HatchLoop,
    PolylineVertex,
};
use cadraster_core::geometry::{Bounds2D, Point2};
use cadraster_render::bounds::document_bounds;
use cadraster_render::recording::RecordedCommand;
use cadraster_render::{DrawCommand, RecordingSurface, RenderOptions, Renderer};
use glam::{DAffine2, DVec2};

fn rectangle_document(width: f64, height: f64) -> Document {
    let mut doc = Document::new();
    doc.add_polyline(
        [
            PolylineVertex::new(Point2::new(0.0, 0.0)),
            PolylineVertex::new(Point2::new(width, 0.0)),
            PolylineVertex::new(Point2::new(width, height)),
            PolylineVertex::new(Point2::new(0.0, height)),
        ],
        true,
        "0",
    );
    doc
}

fn lines(commands: &[RecordedCommand]) -> Vec<(DVec2, DVec2)> {
    commands
        .iter()
        .filter_map(|c| match c.command {
            DrawCommand::Line { start, end, .. } => Some((start, end)),
            _ => None,
        })
        .collect()
}

fn contains_line(lines: &[(DVec2, DVec2)], a: DVec2, b: DVec2) -> bool {
    lines.iter().any(|(start, end)| {
        (start.distance(a) < 1e-6 && end.distance(b) < 1e-6)
            || (start.distance(b) < 1e-6 && end.distance(a) < 1e-6)
    })
}

fn hatch_with_broken_edge(is_solid: bool) -> Hatch {
    Hatch {
        pattern_name: if is_solid { "SOLID".to_string() } else { "ANSI31".to_string() },
        is_solid,
        loops: vec![HatchLoop {
            flags: BoundaryFlags {
                external: true,
                outermost: false,
            },
            edges: vec![
                HatchEdge::Line {
                    start: Point2::new(0.0, 0.0),
                    end: Point2::new(50.0, 0.0),
                },
                HatchEdge::Spline {
                    degree: 3,
                    control_points: vec![Point2::new(50.0, 0.0)],
                    knots: Vec::new(),
                    weights: Vec::new(),
                },
                HatchEdge::Line {
                    start: Point2::new(50.0, 0.0),
                    end: Point2::new(50.0, 50.0),
                },
                HatchEdge::Line {
                    start: Point2::new(50.0, 50.0),
                    end: Point2::new(0.0, 50.0),
                },
            ],
        }],
        layer: "HATCH".to_string(),
        color: EntityColor::ByLayer,
    }
}

#[test]
fn wide_document_is_scaled_and_centered() {
    let mut renderer = Renderer::new(rectangle_document(1000.0, 500.0), RenderOptions::default());
    let mut surface = RecordingSurface::new(1200, 1600);
    let summary = renderer.render(&mut surface).expect("render");
    assert!((summary.scale - 1.16).abs() < 1e-9);

    let view = renderer.view().expect("view");
    let center = view.map_point(Point2::new(500.0, 250.0));
    assert!((center.x - 600.0).abs() < 1e-9);
    assert!((center.y - 800.0).abs() < 1e-9);
    let screen = view.to_screen(center);
    assert!((screen.y - 800.0).abs() < 1e-9);
}

#[test]
fn empty_document_falls_back_to_canvas_bounds() {
    let doc = Document::new();
    let options = RenderOptions::default();
    let bounds = document_bounds(&doc, &options);
    assert_eq!(bounds, Bounds2D::from_origin_size(0.0, 0.0, 1200.0, 1600.0));

    let mut renderer = Renderer::new(doc, options);
    let mut surface = RecordingSurface::new(1200, 1600);
    let summary = renderer.render(&mut surface).expect("render");
    assert_eq!(summary.drawn, 0);
    assert!((summary.scale - 1160.0 / 1200.0).abs() < 1e-9);

    let rendered = renderer.render_to_pixmap().expect("pixmap");
    assert_eq!((rendered.pixmap.width(), rendered.pixmap.height()), (1200, 1600));
}

#[test]
fn horizontal_linear_dimension_layout() {
    let mut doc = Document::new();
    doc.add_dimension(Dimension::new(
        DimensionKind::Linear {
            first: Point2::new(0.0, 0.0),
            second: Point2::new(100.0, 0.0),
            rotation: 0.0,
        },
        Point2::new(50.0, 20.0),
        "DIM",
    ));
    let mut renderer = Renderer::new(doc, RenderOptions::default());
    let mut surface = RecordingSurface::new(1200, 1600);
    renderer.render(&mut surface).expect("render");
    let view = renderer.view().expect("view");
    let map = |x: f64, y: f64| view.map_point(Point2::new(x, y));

    let drawn = lines(surface.commands());
    assert!(contains_line(&drawn, map(0.0, 0.0), map(0.0, 20.0)));
    assert!(contains_line(&drawn, map(100.0, 0.0), map(100.0, 20.0)));
    assert!(contains_line(&drawn, map(0.0, 20.0), map(100.0, 20.0)));
    assert_eq!(drawn.len(), 3);

    // 两个箭头互相指向：尖端位于各自端点内侧一侧。
    let arrows: Vec<Vec<DVec2>> = surface
        .commands()
        .iter()
        .filter_map(|c| match &c.command {
            DrawCommand::FillPolygon { points, .. } => Some(points.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(arrows.len(), 2);
    let left_tip = arrows[0][0];
    let left_base = (arrows[0][1] + arrows[0][2]) / 2.0;
    assert!(left_tip.x > left_base.x);
    let right_tip = arrows[1][0];
    let right_base = (arrows[1][1] + arrows[1][2]) / 2.0;
    assert!(right_tip.x < right_base.x);

    let text = surface
        .commands()
        .iter()
        .find_map(|c| match &c.command {
            DrawCommand::Text { text, origin, .. } => Some((text.clone(), *origin, c.transform)),
            _ => None,
        })
        .expect("dimension text");
    assert_eq!(text.0, "100");
    assert!(text.1.distance(view.to_screen(map(50.0, 20.0))) < 1e-6);
    assert_eq!(text.2, DAffine2::IDENTITY);
}

#[test]
fn hatch_with_unconvertible_edge_still_fills() {
    let mut doc = rectangle_document(100.0, 100.0);
    doc.add_entity(Entity::Hatch(hatch_with_broken_edge(true)));
    let options = RenderOptions {
        draw_hatch: true,
        ..RenderOptions::default()
    };
    let mut renderer = Renderer::new(doc, options);
    let mut surface = RecordingSurface::new(1200, 1600);
    let summary = renderer.render(&mut surface).expect("render");
    assert_eq!(summary.drawn, 2);

    let path = surface
        .commands()
        .iter()
        .find_map(|c| match &c.command {
            DrawCommand::FillPath { path, .. } => Some(path.clone()),
            _ => None,
        })
        .expect("hatch fill");
    let figures: Vec<_> = path.figures().collect();
    assert_eq!(figures.len(), 1);
    assert!(figures[0].closed);
    assert_eq!(figures[0].points.len(), 4);
}

fn square_loop(min: Point2, side: f64, flags: BoundaryFlags) -> HatchLoop {
    let corners = [
        min,
        Point2::new(min.x() + side, min.y()),
        Point2::new(min.x() + side, min.y() + side),
        Point2::new(min.x(), min.y() + side),
    ];
    HatchLoop {
        flags,
        edges: (0..4)
            .map(|i| HatchEdge::Line {
                start: corners[i],
                end: corners[(i + 1) % 4],
            })
            .collect(),
    }
}

fn render_hatch_loops(loops: Vec<HatchLoop>, surface: &mut RecordingSurface) {
    let mut doc = rectangle_document(100.0, 100.0);
    doc.add_entity(Entity::Hatch(Hatch {
        pattern_name: "ANSI31".to_string(),
        is_solid: false,
        loops,
        layer: "0".to_string(),
        color: EntityColor::ByLayer,
    }));
    let options = RenderOptions {
        draw_hatch: true,
        ..RenderOptions::default()
    };
    let mut renderer = Renderer::new(doc, options);
    renderer.render(surface).expect("render");
}

fn fill_figure_counts(commands: &[RecordedCommand]) -> Vec<usize> {
    commands
        .iter()
        .filter_map(|c| match &c.command {
            DrawCommand::FillPath { path, .. } => Some(path.figures().count()),
            _ => None,
        })
        .collect()
}

#[test]
fn each_hatch_loop_is_filled_separately() {
    let mut surface = RecordingSurface::new(1200, 1600);
    render_hatch_loops(
        vec![
            square_loop(Point2::new(0.0, 0.0), 10.0, BoundaryFlags::default()),
            square_loop(Point2::new(50.0, 50.0), 10.0, BoundaryFlags::default()),
        ],
        &mut surface,
    );
    assert_eq!(fill_figure_counts(surface.commands()), vec![1, 1]);
}

#[test]
fn nested_external_loops_do_not_punch_holes() {
    let external = BoundaryFlags {
        external: true,
        outermost: false,
    };
    let mut surface = RecordingSurface::new(1200, 1600);
    render_hatch_loops(
        vec![
            square_loop(Point2::new(0.0, 0.0), 100.0, external),
            square_loop(Point2::new(25.0, 25.0), 50.0, external),
        ],
        &mut surface,
    );
    assert_eq!(fill_figure_counts(surface.commands()), vec![1, 1]);
}

#[test]
fn failed_fill_strokes_only_its_own_loop() {
    let mut surface = RecordingSurface::new(1200, 1600).failing_pattern_fills();
    render_hatch_loops(
        vec![
            square_loop(Point2::new(0.0, 0.0), 10.0, BoundaryFlags::default()),
            square_loop(Point2::new(50.0, 50.0), 10.0, BoundaryFlags::default()),
        ],
        &mut surface,
    );
    let strokes: Vec<usize> = surface
        .commands()
        .iter()
        .filter_map(|c| match &c.command {
            DrawCommand::StrokePath { path, .. } => Some(path.figures().count()),
            _ => None,
        })
        .collect();
    assert_eq!(strokes, vec![1, 1]);
}

#[test]
fn failed_pattern_fill_strokes_outline() {
    let mut doc = rectangle_document(100.0, 100.0);
    doc.add_entity(Entity::Hatch(hatch_with_broken_edge(false)));
    let options = RenderOptions {
        draw_hatch: true,
        ..RenderOptions::default()
    };
    let mut renderer = Renderer::new(doc, options);
    let mut surface = RecordingSurface::new(1200, 1600).failing_pattern_fills();
    renderer.render(&mut surface).expect("render");
    let commands = surface.commands();
    assert!(
        !commands
            .iter()
            .any(|c| matches!(c.command, DrawCommand::FillPath { .. }))
    );
    assert!(
        commands
            .iter()
            .any(|c| matches!(c.command, DrawCommand::StrokePath { .. }))
    );
}

#[test]
fn hatch_is_skipped_by_default() {
    let mut doc = rectangle_document(100.0, 100.0);
    doc.add_entity(Entity::Hatch(hatch_with_broken_edge(true)));
    let mut renderer = Renderer::new(doc, RenderOptions::default());
    let mut surface = RecordingSurface::new(1200, 1600);
    let summary = renderer.render(&mut surface).expect("render");
    assert_eq!(summary.drawn, 1);
    assert_eq!(summary.skipped, 1);
}

#[test]
fn hidden_layers_do_not_contribute_bounds() {
    let mut doc = rectangle_document(100.0, 100.0);
    doc.add_line(Point2::new(0.0, 0.0), Point2::new(5000.0, 0.0), "FAR");
    doc.set_layer_visible("FAR", false);
    let bounds = document_bounds(&doc, &RenderOptions::default());
    assert!((bounds.width() - 100.0).abs() < 1e-9);
}

#[test]
fn png_output_creates_directories_and_crops() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("nested").join("out").join("drawing.png");
    let options = RenderOptions {
        crop_empty_edges: true,
        ..RenderOptions::default()
    };
    let mut renderer = Renderer::new(rectangle_document(1000.0, 500.0), options);
    renderer.render_to_png(&target).expect("png");

    let bytes = std::fs::read(&target).expect("read png");
    assert_eq!(&bytes[..4], b"\x89PNG");
    let decoded = image::load_from_memory(&bytes).expect("decode");
    assert!(decoded.width() <= 1161);
    assert!(decoded.height() < 1600);
}
