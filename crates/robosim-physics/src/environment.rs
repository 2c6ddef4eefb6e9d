//! Static bodies derived from the world description: arena bounds and
//! drawn strokes.

use robosim_scenario::{BodyDesc, Bounds, StrokeDesc, StrokeKind, WorldDesc};

/// Thickness of the arena boundary walls (m).
pub const BOUNDS_THICKNESS: f64 = 0.05;

/// Thinnest stroke turned into a body (m).
const MIN_STROKE_THICKNESS: f64 = 1e-4;

/// Shortest stroke segment turned into a body (m).
const MIN_SEGMENT_LENGTH: f64 = 1e-6;

/// All static bodies implied by `world`: terrain (forced static), bounds
/// walls, wall strokes and line strokes, in that order.
pub fn environment_bodies(world: &WorldDesc) -> Vec<BodyDesc> {
    let mut bodies: Vec<BodyDesc> = world
        .terrain
        .iter()
        .cloned()
        .map(BodyDesc::fixed)
        .collect();
    if let Some(bounds) = &world.bounds {
        bodies.extend(bound_walls(bounds));
    }
    bodies.extend(stroke_bodies(&world.strokes));
    bodies
}

fn slab(name: String, corners: [[f64; 2]; 4]) -> BodyDesc {
    BodyDesc::polygon(&name, corners.to_vec()).fixed()
}

fn bound_walls(b: &Bounds) -> Vec<BodyDesc> {
    let h = BOUNDS_THICKNESS / 2.0;
    let (x0, x1, y0, y1) = (b.min_x - h, b.max_x + h, b.min_y - h, b.max_y + h);
    vec![
        slab(
            "bounds_bottom".into(),
            [[x0, b.min_y - h], [x1, b.min_y - h], [x1, b.min_y + h], [x0, b.min_y + h]],
        ),
        slab(
            "bounds_top".into(),
            [[x0, b.max_y - h], [x1, b.max_y - h], [x1, b.max_y + h], [x0, b.max_y + h]],
        ),
        slab(
            "bounds_left".into(),
            [[b.min_x - h, y0], [b.min_x + h, y0], [b.min_x + h, y1], [b.min_x - h, y1]],
        ),
        slab(
            "bounds_right".into(),
            [[b.max_x - h, y0], [b.max_x + h, y0], [b.max_x + h, y1], [b.max_x - h, y1]],
        ),
    ]
}

fn stroke_bodies(strokes: &[StrokeDesc]) -> Vec<BodyDesc> {
    let mut bodies = Vec::new();
    let (mut walls, mut lines) = (0, 0);
    for stroke in strokes {
        if stroke.kind == StrokeKind::Mark || stroke.points.len() < 2 {
            continue;
        }
        let half = stroke.thickness.max(MIN_STROKE_THICKNESS) / 2.0;
        for seg in stroke.points.windows(2) {
            let (p0, p1) = (seg[0], seg[1]);
            let (dx, dy) = (p1[0] - p0[0], p1[1] - p0[1]);
            let len = dx.hypot(dy);
            if !(len >= MIN_SEGMENT_LENGTH) {
                continue;
            }
            let (nx, ny) = (-dy / len * half, dx / len * half);
            let corners = [
                [p0[0] - nx, p0[1] - ny],
                [p1[0] - nx, p1[1] - ny],
                [p1[0] + nx, p1[1] + ny],
                [p0[0] + nx, p0[1] + ny],
            ];
            let body = match stroke.kind {
                StrokeKind::Wall => {
                    walls += 1;
                    slab(format!("wall_{}", walls - 1), corners)
                }
                StrokeKind::Line => {
                    lines += 1;
                    let mut body = slab(format!("line_{}", lines - 1), corners).decorative();
                    body.material.line_intensity = Some(stroke.line_intensity.unwrap_or(1.0));
                    body
                }
                StrokeKind::Mark => continue,
            };
            bodies.push(body);
        }
    }
    bodies
}
