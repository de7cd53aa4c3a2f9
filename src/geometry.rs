//! Geometry primitives shared by detection, selection and motion planning.
//!
//! All coordinates are capture-region pixels with the origin at the top-left
//! corner of the region.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned rectangle `(x1, y1, x2, y2)`.
///
/// `x1 <= x2` and `y1 <= y2` hold for every box built through `new` or
/// deserialized from a `[x1, y1, x2, y2]` array.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    /// Build a box from two opposite corners, in any order.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Build a box from its center and size (YOLO-style `cx, cy, w, h`).
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        let (hw, hh) = (w.abs() / 2.0, h.abs() / 2.0);
        Self::new(cx - hw, cy - hh, cx + hw, cy + hh)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with `other`, 0.0 for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(corners: [f32; 4]) -> Self {
        Self::new(corners[0], corners[1], corners[2], corners[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x1, bbox.y1, bbox.x2, bbox.y2]
    }
}

/// True when every edge of `inner` lies on or inside the matching edge of `outer`.
pub fn is_box_inside(inner: &BoundingBox, outer: &BoundingBox) -> bool {
    inner.x1 >= outer.x1 && inner.y1 >= outer.y1 && inner.x2 <= outer.x2 && inner.y2 <= outer.y2
}

/// True when `point` lies on or inside `bbox`.
pub fn is_point_inside(point: Point, bbox: &BoundingBox) -> bool {
    (bbox.x1..=bbox.x2).contains(&point.x) && (bbox.y1..=bbox.y2).contains(&point.y)
}

/// True when `bbox` touches the circle of `radius` around `center`.
///
/// Uses the point of the rectangle closest to the circle center.
pub fn box_intersects_circle(bbox: &BoundingBox, center: Point, radius: f32) -> bool {
    let closest = Point::new(
        center.x.min(bbox.x2).max(bbox.x1),
        center.y.min(bbox.y2).max(bbox.y1),
    );
    closest.distance_to(center) <= radius
}
