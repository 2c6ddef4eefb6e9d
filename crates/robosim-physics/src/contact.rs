//! Contact generation.
//!
//! Contacts are rebuilt from scratch every tick: a sort-and-sweep broad
//! phase over world bounding boxes, then a separating-axis test between the
//! convex parts of each surviving pair with reference/incident edge clipping
//! for up to two points per part pair.

use std::collections::HashSet;

use robosim_math::{Aabb2, Vec2};

use crate::body::Body;
use crate::ids::BodyId;
use crate::shape::ConvexPart;

/// Relative tolerance preferring the first body's face as reference.
const REFERENCE_BIAS: f64 = 0.98;
const ABSOLUTE_BIAS: f64 = 1e-9;

/// One contact point between two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    /// First body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
    /// Unit normal pointing from A towards B.
    pub normal: Vec2,
    /// World contact point on B at generation time.
    pub point: Vec2,
    /// Penetration depth at generation time (positive when overlapping).
    pub depth: f64,
    /// Contact point on A, in A's center-of-mass frame.
    pub(crate) local_a: Vec2,
    /// Contact point on B, in B's center-of-mass frame.
    pub(crate) local_b: Vec2,
    /// Relative normal velocity before the position solve.
    pub(crate) approach_speed: f64,
    pub(crate) friction: f64,
    pub(crate) restitution: f64,
    /// Accumulated normal multiplier for this tick.
    pub(crate) lambda_normal: f64,
}

impl Contact {
    /// Current penetration depth along the stored normal.
    pub(crate) fn current_depth(&self, bodies: &[Body]) -> f64 {
        let p_a = bodies[self.body_a.index()].world_point(&self.local_a);
        let p_b = bodies[self.body_b.index()].world_point(&self.local_b);
        (p_a - p_b).dot(&self.normal)
    }
}

/// A raw manifold point from the narrow phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ManifoldPoint {
    /// Normal from the first part towards the second.
    pub normal: Vec2,
    /// Surface point on the first part.
    pub on_a: Vec2,
    /// Surface point on the second part.
    pub on_b: Vec2,
    pub depth: f64,
}

/// Candidate pairs `(lo, hi)` whose boxes overlap, in ascending order.
pub(crate) fn broad_phase(boxes: &[Aabb2]) -> Vec<(usize, usize)> {
    let mut order: Vec<usize> = (0..boxes.len()).collect();
    order.sort_by(|&a, &b| boxes[a].min.x.total_cmp(&boxes[b].min.x).then(a.cmp(&b)));

    let mut pairs = Vec::new();
    for (k, &i) in order.iter().enumerate() {
        for &j in &order[k + 1..] {
            if boxes[j].min.x > boxes[i].max.x {
                break;
            }
            if boxes[i].overlaps(&boxes[j]) {
                pairs.push((i.min(j), i.max(j)));
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

/// Whether two bodies may collide at all.
pub(crate) fn should_collide(a: &Body, b: &Body) -> bool {
    (a.can_move || b.can_move) && (a.blockage & b.blockage) != 0
}

/// Generate this tick's contacts.
///
/// `jointed` holds `(lo, hi)` index pairs that never collide.
pub(crate) fn generate_contacts(
    bodies: &[Body],
    jointed: &HashSet<(usize, usize)>,
    margin: f64,
) -> Vec<Contact> {
    let boxes: Vec<Aabb2> = bodies
        .iter()
        .map(|b| {
            let mut aabb = b.shape.world_aabb(&b.pose);
            aabb.expand(margin);
            aabb
        })
        .collect();

    let mut contacts = Vec::new();
    for (i, j) in broad_phase(&boxes) {
        let (a, b) = (&bodies[i], &bodies[j]);
        if !should_collide(a, b) || jointed.contains(&(i, j)) {
            continue;
        }
        let parts_a: Vec<ConvexPart> = a.shape.parts().iter().map(|p| p.transformed(&a.pose)).collect();
        let parts_b: Vec<ConvexPart> = b.shape.parts().iter().map(|p| p.transformed(&b.pose)).collect();
        let friction = 0.5 * (a.material.friction + b.material.friction);
        let restitution = a.material.restitution.max(b.material.restitution);

        for pa in &parts_a {
            for pb in &parts_b {
                for m in collide_parts(pa, pb) {
                    let r_a = m.on_a - a.pose.position;
                    let r_b = m.on_b - b.pose.position;
                    let approach = (b.point_velocity(&r_b) - a.point_velocity(&r_a)).dot(&m.normal);
                    contacts.push(Contact {
                        body_a: BodyId::from_index(i),
                        body_b: BodyId::from_index(j),
                        normal: m.normal,
                        point: m.on_b,
                        depth: m.depth,
                        local_a: a.pose.inverse_transform_point(&m.on_a),
                        local_b: b.pose.inverse_transform_point(&m.on_b),
                        approach_speed: approach,
                        friction,
                        restitution,
                        lambda_normal: 0.0,
                    });
                }
            }
        }
    }
    contacts
}

/// Deepest separation of `b` along `a`'s edge normals: `(separation, edge)`.
fn max_separation(a: &ConvexPart, b: &ConvexPart) -> (f64, usize) {
    let mut best = (f64::NEG_INFINITY, 0);
    for (i, (v, n)) in a.vertices.iter().zip(&a.normals).enumerate() {
        let s = b
            .vertices
            .iter()
            .map(|w| n.dot(&(w - v)))
            .fold(f64::INFINITY, f64::min);
        if s > best.0 {
            best = (s, i);
        }
    }
    best
}

/// Edge of `incident` most anti-parallel to `normal`.
fn incident_edge(incident: &ConvexPart, normal: &Vec2) -> (Vec2, Vec2) {
    let mut best = 0;
    let mut min_dot = f64::INFINITY;
    for (i, n) in incident.normals.iter().enumerate() {
        let d = n.dot(normal);
        if d < min_dot {
            min_dot = d;
            best = i;
        }
    }
    let m = incident.vertices.len();
    (incident.vertices[best], incident.vertices[(best + 1) % m])
}

/// Keep the part of segment `(p, q)` with `n·x <= offset`.
fn clip_segment(p: Vec2, q: Vec2, n: &Vec2, offset: f64) -> Option<(Vec2, Vec2)> {
    let dp = n.dot(&p) - offset;
    let dq = n.dot(&q) - offset;
    match (dp <= 0.0, dq <= 0.0) {
        (true, true) => Some((p, q)),
        (false, false) => None,
        (true, false) => Some((p, p + (q - p) * (dp / (dp - dq)))),
        (false, true) => Some((p + (q - p) * (dp / (dp - dq)), q)),
    }
}

/// Separating-axis test plus clipping between two world-space convex parts.
pub(crate) fn collide_parts(a: &ConvexPart, b: &ConvexPart) -> Vec<ManifoldPoint> {
    let (sep_a, edge_a) = max_separation(a, b);
    if sep_a > 0.0 {
        return Vec::new();
    }
    let (sep_b, edge_b) = max_separation(b, a);
    if sep_b > 0.0 {
        return Vec::new();
    }

    let flip = sep_b > REFERENCE_BIAS * sep_a + ABSOLUTE_BIAS;
    let (reference, incident, edge) = if flip { (b, a, edge_b) } else { (a, b, edge_a) };

    let m = reference.vertices.len();
    let v1 = reference.vertices[edge];
    let v2 = reference.vertices[(edge + 1) % m];
    let ref_normal = reference.normals[edge];
    let tangent = (v2 - v1).normalize();

    let (i1, i2) = incident_edge(incident, &ref_normal);
    let Some((c1, c2)) = clip_segment(i1, i2, &-tangent, -tangent.dot(&v1)) else {
        return Vec::new();
    };
    let Some((c1, c2)) = clip_segment(c1, c2, &tangent, tangent.dot(&v2)) else {
        return Vec::new();
    };

    let mut points = Vec::with_capacity(2);
    for c in [c1, c2] {
        let separation = ref_normal.dot(&(c - v1));
        if separation > 0.0 {
            continue;
        }
        let on_reference = c - ref_normal * separation;
        let point = if flip {
            // reference is B; its normal points towards A
            ManifoldPoint {
                normal: -ref_normal,
                on_a: c,
                on_b: on_reference,
                depth: -separation,
            }
        } else {
            ManifoldPoint {
                normal: ref_normal,
                on_a: on_reference,
                on_b: c,
                depth: -separation,
            }
        };
        if points.last() != Some(&point) {
            points.push(point);
        }
    }
    points
}
