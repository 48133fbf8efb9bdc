//! Grid coordinates and inclusive rectangles over the landscape vertex lattice.
//!
//! Every raster the editor touches (heights, weights, selection, visibility,
//! XY offsets) is addressed by integer vertex coordinates. Components group
//! `N x N` quads and share their edge vertices with their neighbours.

use std::fmt;

/// An integer vertex position on the landscape lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Squared distance to a fractional position.
    pub fn dist_sq_to(self, px: f32, py: f32) -> f32 {
        let dx = self.x as f32 - px;
        let dy = self.y as f32 - py;
        dx * dx + dy * dy
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Index of a landscape component (a square block of quads).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ComponentCoord {
    pub x: i32,
    pub y: i32,
}

impl ComponentCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component whose quads contain the vertex. Edge vertices belong to the
    /// component on their positive side; see [`owners_of`] for all owners.
    pub fn containing(coord: GridCoord, size_quads: i32) -> Self {
        Self::new(coord.x.div_euclid(size_quads), coord.y.div_euclid(size_quads))
    }

    /// Vertex rectangle covered by this component, shared edges included.
    pub fn vertex_region(self, size_quads: i32) -> Region {
        Region::new(
            self.x * size_quads,
            self.y * size_quads,
            self.x * size_quads + size_quads,
            self.y * size_quads + size_quads,
        )
    }
}

/// Every component that stores a copy of this vertex (1, 2 or 4 of them).
pub fn owners_of(coord: GridCoord, size_quads: i32) -> impl Iterator<Item = ComponentCoord> {
    let cx = coord.x.div_euclid(size_quads);
    let cy = coord.y.div_euclid(size_quads);
    let xs: &[i32] = if coord.x.rem_euclid(size_quads) == 0 { &[0, -1] } else { &[0] };
    let ys: &[i32] = if coord.y.rem_euclid(size_quads) == 0 { &[0, -1] } else { &[0] };
    let mut owners = Vec::with_capacity(4);
    for &dy in ys {
        for &dx in xs {
            owners.push(ComponentCoord::new(cx + dx, cy + dy));
        }
    }
    owners.into_iter()
}

/// Inclusive integer rectangle `(x1, y1) ..= (x2, y2)`.
///
/// A rectangle with `x1 > x2` or `y1 > y2` is empty and means "no effect"
/// wherever it is consumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Default for Region {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Region {
    /// Empty rectangle that acts as the identity for [`Region::union`].
    pub const EMPTY: Region = Region {
        x1: i32::MAX,
        y1: i32::MAX,
        x2: i32::MIN,
        y2: i32::MIN,
    };

    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn from_coord(coord: GridCoord) -> Self {
        Self::new(coord.x, coord.y, coord.x, coord.y)
    }

    /// Smallest rectangle containing the fractional square `center ± extent`.
    pub fn around(x: f32, y: f32, extent: f32) -> Self {
        Self::new(
            (x - extent).floor() as i32,
            (y - extent).floor() as i32,
            (x + extent).ceil() as i32,
            (y + extent).ceil() as i32,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.x1 > self.x2 || self.y1 > self.y2
    }

    /// Number of columns (0 when empty).
    pub fn width(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.x2 - self.x1 + 1) as usize
        }
    }

    /// Number of rows (0 when empty).
    pub fn height(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.y2 - self.y1 + 1) as usize
        }
    }

    pub fn len(&self) -> usize {
        self.width() * self.height()
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.x >= self.x1 && coord.x <= self.x2 && coord.y >= self.y1 && coord.y <= self.y2
    }

    pub fn contains_region(&self, other: &Region) -> bool {
        other.is_empty()
            || (!self.is_empty()
                && other.x1 >= self.x1
                && other.x2 <= self.x2
                && other.y1 >= self.y1
                && other.y2 <= self.y2)
    }

    /// Bounding rectangle of both. Empty operands are ignored.
    pub fn union(&self, other: &Region) -> Region {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Region::new(
            self.x1.min(other.x1),
            self.y1.min(other.y1),
            self.x2.max(other.x2),
            self.y2.max(other.y2),
        )
    }

    /// Overlap of both; empty (possibly inverted) when they do not meet.
    pub fn intersect(&self, other: &Region) -> Region {
        Region::new(
            self.x1.max(other.x1),
            self.y1.max(other.y1),
            self.x2.min(other.x2),
            self.y2.min(other.y2),
        )
    }

    /// Grow by `amount` cells on every side. Empty rectangles stay empty.
    pub fn grown(&self, amount: i32) -> Region {
        if self.is_empty() {
            return *self;
        }
        Region::new(
            self.x1 - amount,
            self.y1 - amount,
            self.x2 + amount,
            self.y2 + amount,
        )
    }

    pub fn include(&mut self, coord: GridCoord) {
        *self = self.union(&Region::from_coord(coord));
    }

    /// Row-major index of `coord` inside this rectangle.
    pub fn index_of(&self, coord: GridCoord) -> usize {
        (coord.x - self.x1) as usize + (coord.y - self.y1) as usize * self.width()
    }

    /// Coordinates in row-major order (x fastest).
    pub fn iter(&self) -> impl Iterator<Item = GridCoord> {
        let r = *self;
        let (ys, xs) = if r.is_empty() {
            (1..=0, 1..=0)
        } else {
            (r.y1..=r.y2, r.x1..=r.x2)
        };
        ys.flat_map(move |y| xs.clone().map(move |x| GridCoord::new(x, y)))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X({}-{}), Y({}-{})", self.x1, self.x2, self.y1, self.y2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_region() {
        assert!(Region::EMPTY.is_empty());
        assert_eq!(Region::EMPTY.len(), 0);
        assert_eq!(Region::EMPTY.iter().count(), 0);
        assert!(Region::new(3, 0, 2, 5).is_empty(), "Inverted X is empty");
    }

    #[test]
    fn test_union_ignores_empty() {
        let a = Region::new(0, 0, 2, 2);
        assert_eq!(a.union(&Region::EMPTY), a);
        assert_eq!(Region::EMPTY.union(&a), a);
        assert_eq!(a.union(&Region::new(5, -1, 6, 1)), Region::new(0, -1, 6, 2));
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = Region::new(0, 0, 2, 2);
        let b = Region::new(4, 4, 6, 6);
        assert!(a.intersect(&b).is_empty());
        assert_eq!(a.intersect(&Region::new(1, 1, 9, 9)), Region::new(1, 1, 2, 2));
    }

    #[test]
    fn test_row_major_iteration_matches_index() {
        let r = Region::new(-1, 2, 1, 3);
        let coords: Vec<GridCoord> = r.iter().collect();
        assert_eq!(coords.len(), 6);
        for (i, c) in coords.iter().enumerate() {
            assert_eq!(r.index_of(*c), i);
        }
        assert_eq!(coords[1], GridCoord::new(0, 2), "X varies fastest");
    }

    #[test]
    fn test_around_rounds_outward() {
        let r = Region::around(5.5, 5.0, 2.0);
        assert_eq!(r, Region::new(3, 3, 8, 7));
    }

    #[test]
    fn test_component_math_negative() {
        assert_eq!(
            ComponentCoord::containing(GridCoord::new(-1, 0), 4),
            ComponentCoord::new(-1, 0)
        );
        assert_eq!(
            ComponentCoord::new(1, 0).vertex_region(4),
            Region::new(4, 0, 8, 4)
        );
    }

    #[test]
    fn test_edge_vertex_owners() {
        let corner: Vec<_> = owners_of(GridCoord::new(4, 4), 4).collect();
        assert_eq!(corner.len(), 4);
        assert!(corner.contains(&ComponentCoord::new(0, 0)));
        assert!(corner.contains(&ComponentCoord::new(1, 1)));

        let edge: Vec<_> = owners_of(GridCoord::new(4, 5), 4).collect();
        assert_eq!(edge.len(), 2);

        let interior: Vec<_> = owners_of(GridCoord::new(5, 5), 4).collect();
        assert_eq!(interior, vec![ComponentCoord::new(1, 1)]);
    }
}
