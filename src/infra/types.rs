use std::fmt;

/// Continuous world coordinate (pixels in the original facility units).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Point reached by moving `length` units along `angle` (radians).
    pub fn offset_polar(&self, length: f64, angle: f64) -> Point {
        Point::new(self.x + length * angle.cos(), self.y + length * angle.sin())
    }

    pub fn bearing_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// Integer cell coordinate on the navigation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance in cell units.
    pub fn distance(&self, other: &Cell) -> f64 {
        f64::from(self.x - other.x).hypot(f64::from(self.y - other.y))
    }

    /// 8-connected neighbours with their step cost.
    pub fn neighbors(&self) -> [(Cell, f64); 8] {
        [
            (Cell::new(self.x, self.y + 1), 1.0),
            (Cell::new(self.x + 1, self.y), 1.0),
            (Cell::new(self.x, self.y - 1), 1.0),
            (Cell::new(self.x - 1, self.y), 1.0),
            (Cell::new(self.x + 1, self.y + 1), DIAGONAL_COST),
            (Cell::new(self.x - 1, self.y + 1), DIAGONAL_COST),
            (Cell::new(self.x + 1, self.y - 1), DIAGONAL_COST),
            (Cell::new(self.x - 1, self.y - 1), DIAGONAL_COST),
        ]
    }
}

pub const DIAGONAL_COST: f64 = 1.4;

/// Axis-aligned rectangle in world coordinates (shelves, lanes, checkouts, obstacles).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}
