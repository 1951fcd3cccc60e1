//! Axis-aligned rectangle used for world, local and composite bounds

use crate::foundation::math::Vec2;

/// Axis-aligned bounding rectangle in screen/world space
///
/// `x`/`y` is the top-left corner; `width`/`height` extend right and down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Horizontal extent
    pub width: f32,
    /// Vertical extent
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Smallest rectangle containing every point
    ///
    /// Returns a zero rectangle at the origin for an empty slice.
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Right edge
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Center point
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Width times height
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Check if this rectangle contains a point
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x <= self.right() &&
        point.y >= self.y && point.y <= self.bottom()
    }

    /// Check if this rectangle intersects another
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.right() && self.right() >= other.x &&
        self.y <= other.bottom() && self.bottom() >= other.y
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let rect = Rect::from_points(&[
            Vec2::new(3.0, -1.0),
            Vec2::new(-2.0, 4.0),
            Vec2::new(1.0, 1.0),
        ]);
        assert_eq!(rect, Rect::new(-2.0, -1.0, 5.0, 5.0));
        assert_eq!(Rect::from_points(&[]), Rect::default());
    }

    #[test]
    fn test_union_and_intersects() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 2.0);
        let c = Rect::new(20.0, 20.0, 1.0, 1.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.union(&c), Rect::new(0.0, 0.0, 21.0, 21.0));
        assert!(a.contains_point(Vec2::new(10.0, 0.0)));
    }
}
