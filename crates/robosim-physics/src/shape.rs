//! Polygon footprints: validation, convex decomposition, mass properties
//! and point/ray queries.
//!
//! A [`Shape`] is stored in its body's local frame. Simple polygons are
//! normalized to counter-clockwise winding; convex ones are kept as a single
//! part and concave ones are ear-clipped into triangles.

use robosim_math::{cross, Aabb2, Pose2, Vec2};

use crate::error::{PhysicsError, Result};

/// Relative tolerance for collinearity and winding tests.
const COLLINEAR_EPS: f64 = 1e-12;

/// A convex piece of a shape, counter-clockwise, with outward edge normals.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPart {
    pub(crate) vertices: Vec<Vec2>,
    pub(crate) normals: Vec<Vec2>,
}

impl ConvexPart {
    fn new(vertices: Vec<Vec2>) -> Self {
        let n = vertices.len();
        let normals = (0..n)
            .map(|i| {
                let e = vertices[(i + 1) % n] - vertices[i];
                Vec2::new(e.y, -e.x).normalize()
            })
            .collect();
        Self { vertices, normals }
    }

    /// Vertices in counter-clockwise order.
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Copy of this part mapped through `pose`.
    pub(crate) fn transformed(&self, pose: &Pose2) -> ConvexPart {
        ConvexPart {
            vertices: self.vertices.iter().map(|v| pose.transform_point(v)).collect(),
            normals: self.normals.iter().map(|n| pose.transform_vector(n)).collect(),
        }
    }

    /// Inside or on the boundary.
    pub(crate) fn contains(&self, p: &Vec2) -> bool {
        self.vertices
            .iter()
            .zip(&self.normals)
            .all(|(v, n)| n.dot(&(p - v)) <= 0.0)
    }

    /// Cyrus-Beck clip of the ray `origin + t * dir`, `t` in `[0, max_t]`.
    ///
    /// Returns the entry parameter, which is 0 when the origin is inside.
    pub(crate) fn ray_cast(&self, origin: &Vec2, dir: &Vec2, max_t: f64) -> Option<f64> {
        let mut t_lo = 0.0_f64;
        let mut t_hi = max_t;
        for (v, n) in self.vertices.iter().zip(&self.normals) {
            let denom = n.dot(dir);
            let num = n.dot(&(v - origin));
            if denom.abs() < COLLINEAR_EPS {
                if num < 0.0 {
                    return None;
                }
                continue;
            }
            let t = num / denom;
            if denom < 0.0 {
                t_lo = t_lo.max(t);
            } else {
                t_hi = t_hi.min(t);
            }
            if t_lo > t_hi {
                return None;
            }
        }
        Some(t_lo)
    }
}

/// A simple polygon footprint split into convex parts.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    outline: Vec<Vec2>,
    parts: Vec<ConvexPart>,
    area: f64,
    centroid: Vec2,
    polar_moment: f64,
    radius: f64,
}

impl Shape {
    /// Validate `points` and build a shape. `name` is used in error messages.
    pub fn from_points(points: &[[f64; 2]], name: &str) -> Result<Self> {
        let malformed = |reason: &str| PhysicsError::MalformedPolygon {
            body: name.to_string(),
            reason: reason.to_string(),
        };

        if points.len() < 3 {
            return Err(malformed("need at least 3 vertices"));
        }
        if points.iter().flatten().any(|c| !c.is_finite()) {
            return Err(malformed("non-finite vertex"));
        }

        let mut outline: Vec<Vec2> = points.iter().map(|p| Vec2::new(p[0], p[1])).collect();
        let n = outline.len();
        if (0..n).any(|i| outline[i] == outline[(i + 1) % n]) {
            return Err(malformed("repeated consecutive vertex"));
        }

        let signed = signed_area(&outline);
        let scale = outline.iter().map(|v| v.norm_squared()).fold(0.0, f64::max);
        if signed.abs() <= COLLINEAR_EPS * scale.max(1.0) {
            return Err(malformed("zero area"));
        }
        if signed < 0.0 {
            outline.reverse();
        }

        drop_collinear(&mut outline).map_err(|()| malformed("edge folds back on itself"))?;
        if outline.len() < 3 {
            return Err(malformed("zero area"));
        }
        if self_intersects(&outline) {
            return Err(malformed("edges self-intersect"));
        }

        let parts = if is_convex(&outline) {
            vec![ConvexPart::new(outline.clone())]
        } else {
            ear_clip(&outline)
                .ok_or_else(|| malformed("triangulation failed"))?
                .into_iter()
                .map(ConvexPart::new)
                .collect()
        };

        let (area, centroid, polar_moment) = mass_properties(&outline);
        let radius = bounding_radius(&outline);
        Ok(Self {
            outline,
            parts,
            area,
            centroid,
            polar_moment,
            radius,
        })
    }

    /// Copy of the shape with every vertex shifted by `offset`.
    pub(crate) fn translated(&self, offset: &Vec2) -> Self {
        let shift = |vs: &[Vec2]| vs.iter().map(|v| v + offset).collect::<Vec<_>>();
        let outline = shift(&self.outline);
        let parts = self
            .parts
            .iter()
            .map(|p| ConvexPart {
                vertices: shift(&p.vertices),
                normals: p.normals.clone(),
            })
            .collect();
        let centroid = self.centroid + offset;
        // parallel axis: J_new = J_c + A * |c_new|^2
        let about_centroid = self.polar_moment - self.area * self.centroid.norm_squared();
        let polar_moment = about_centroid + self.area * centroid.norm_squared();
        let radius = bounding_radius(&outline);
        Self {
            outline,
            parts,
            area: self.area,
            centroid,
            polar_moment,
            radius,
        }
    }

    /// Counter-clockwise outline.
    pub fn outline(&self) -> &[Vec2] {
        &self.outline
    }

    /// Convex decomposition.
    pub fn parts(&self) -> &[ConvexPart] {
        &self.parts
    }

    /// Polygon area.
    pub fn area(&self) -> f64 {
        self.area
    }

    /// Area centroid in the shape frame.
    pub fn centroid(&self) -> Vec2 {
        self.centroid
    }

    /// Moment of inertia of a uniform lamina of `mass` about the centroid.
    pub fn inertia_about_centroid(&self, mass: f64) -> f64 {
        let about_centroid = self.polar_moment - self.area * self.centroid.norm_squared();
        mass * about_centroid / self.area
    }

    /// Largest distance from the frame origin to a vertex.
    pub fn bounding_radius(&self) -> f64 {
        self.radius
    }

    /// World-space bounding box for the shape placed at `pose`.
    pub fn world_aabb(&self, pose: &Pose2) -> Aabb2 {
        let mut aabb = Aabb2::empty();
        for v in &self.outline {
            aabb.include_point(&pose.transform_point(v));
        }
        aabb
    }

    /// True when the local point lies inside or on the shape.
    pub fn contains_local(&self, p: &Vec2) -> bool {
        self.parts.iter().any(|part| part.contains(p))
    }

    /// First hit of a local-frame ray against any part.
    pub fn ray_cast_local(&self, origin: &Vec2, dir: &Vec2, max_t: f64) -> Option<f64> {
        self.parts
            .iter()
            .filter_map(|part| part.ray_cast(origin, dir, max_t))
            .min_by(f64::total_cmp)
    }
}

fn signed_area(vs: &[Vec2]) -> f64 {
    let n = vs.len();
    (0..n).map(|i| cross(&vs[i], &vs[(i + 1) % n])).sum::<f64>() * 0.5
}

/// Area, centroid and polar second moment about the frame origin (unit density).
fn mass_properties(vs: &[Vec2]) -> (f64, Vec2, f64) {
    let n = vs.len();
    let mut area = 0.0;
    let mut first = Vec2::zeros();
    let mut second = 0.0;
    for i in 0..n {
        let (a, b) = (vs[i], vs[(i + 1) % n]);
        let c = cross(&a, &b);
        area += c;
        first += (a + b) * c;
        second += c * (a.dot(&a) + a.dot(&b) + b.dot(&b));
    }
    let area = area * 0.5;
    (area, first / (6.0 * area), second / 12.0)
}

fn bounding_radius(vs: &[Vec2]) -> f64 {
    vs.iter().map(|v| v.norm()).fold(0.0, f64::max)
}

/// Remove vertices lying on a straight continuation of their neighbors.
/// Fails on a spike where an edge doubles back.
fn drop_collinear(vs: &mut Vec<Vec2>) -> std::result::Result<(), ()> {
    let mut i = 0;
    while vs.len() >= 3 && i < vs.len() {
        let n = vs.len();
        let prev = vs[(i + n - 1) % n];
        let next = vs[(i + 1) % n];
        let (e0, e1) = (vs[i] - prev, next - vs[i]);
        let c = cross(&e0, &e1);
        if c.abs() <= COLLINEAR_EPS * e0.norm() * e1.norm() {
            if e0.dot(&e1) < 0.0 {
                return Err(());
            }
            vs.remove(i);
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
    Ok(())
}

fn is_convex(vs: &[Vec2]) -> bool {
    let n = vs.len();
    (0..n).all(|i| {
        let (a, b, c) = (vs[i], vs[(i + 1) % n], vs[(i + 2) % n]);
        cross(&(b - a), &(c - b)) > 0.0
    })
}

fn orientation(a: &Vec2, b: &Vec2, c: &Vec2) -> f64 {
    cross(&(b - a), &(c - a))
}

fn on_segment(a: &Vec2, b: &Vec2, p: &Vec2) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Closed-segment intersection test (touching counts).
fn segments_intersect(p1: &Vec2, p2: &Vec2, q1: &Vec2, q2: &Vec2) -> bool {
    let d1 = orientation(q1, q2, p1);
    let d2 = orientation(q1, q2, p2);
    let d3 = orientation(p1, p2, q1);
    let d4 = orientation(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}

fn self_intersects(vs: &[Vec2]) -> bool {
    let n = vs.len();
    for i in 0..n {
        let (a1, a2) = (vs[i], vs[(i + 1) % n]);
        for j in (i + 2)..n {
            // first and last edges share a vertex
            if i == 0 && j == n - 1 {
                continue;
            }
            let (b1, b2) = (vs[j], vs[(j + 1) % n]);
            if segments_intersect(&a1, &a2, &b1, &b2) {
                return true;
            }
        }
    }
    false
}

fn point_in_triangle(p: &Vec2, a: &Vec2, b: &Vec2, c: &Vec2) -> bool {
    orientation(a, b, p) >= 0.0 && orientation(b, c, p) >= 0.0 && orientation(c, a, p) >= 0.0
}

/// Ear-clip a simple counter-clockwise polygon into triangles.
fn ear_clip(vs: &[Vec2]) -> Option<Vec<Vec<Vec2>>> {
    let mut remaining: Vec<usize> = (0..vs.len()).collect();
    let mut triangles = Vec::with_capacity(vs.len() - 2);

    while remaining.len() > 3 {
        let m = remaining.len();
        let ear = (0..m).find(|&k| {
            let (ia, ib, ic) = (remaining[(k + m - 1) % m], remaining[k], remaining[(k + 1) % m]);
            let (a, b, c) = (vs[ia], vs[ib], vs[ic]);
            if orientation(&a, &b, &c) <= 0.0 {
                return false;
            }
            !remaining
                .iter()
                .filter(|&&j| j != ia && j != ib && j != ic)
                .any(|&j| point_in_triangle(&vs[j], &a, &b, &c))
        })?;
        let (ia, ib, ic) = (
            remaining[(ear + m - 1) % m],
            remaining[ear],
            remaining[(ear + 1) % m],
        );
        triangles.push(vec![vs[ia], vs[ib], vs[ic]]);
        remaining.remove(ear);
    }
    triangles.push(remaining.iter().map(|&i| vs[i]).collect());
    Some(triangles)
}
