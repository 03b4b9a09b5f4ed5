use crate::infra::{Cell, Point, Rect};

/// Static occupancy map over square cells of `cell_size` world units.
#[derive(Clone, Debug)]
pub struct NavigationGrid {
    pub width: i32,
    pub height: i32,
    cell_size: f64,
    cells: Vec<bool>,
}

impl NavigationGrid {
    /// Fully navigable grid of `width` x `height` cells.
    pub fn new(width: i32, height: i32, cell_size: f64) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cell_size,
            cells: vec![true; (width * height) as usize],
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn world_width(&self) -> f64 {
        f64::from(self.width) * self.cell_size
    }

    pub fn world_height(&self) -> f64 {
        f64::from(self.height) * self.cell_size
    }

    pub fn in_bounds(&self, cell: &Cell) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }

    fn index(&self, cell: &Cell) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| (cell.y * self.width + cell.x) as usize)
    }

    /// Out-of-bounds cells are never navigable.
    pub fn is_navigable(&self, cell: &Cell) -> bool {
        self.index(cell).is_some_and(|i| self.cells[i])
    }

    pub fn set_navigable(&mut self, cell: &Cell, navigable: bool) {
        if let Some(i) = self.index(cell) {
            self.cells[i] = navigable;
        }
    }

    /// Mark every cell touched by `rect` (edges inclusive) as blocked.
    pub fn block_rect(&mut self, rect: &Rect) {
        let x1 = (rect.x / self.cell_size).floor() as i32;
        let y1 = (rect.y / self.cell_size).floor() as i32;
        let x2 = (rect.right() / self.cell_size).floor() as i32;
        let y2 = (rect.bottom() / self.cell_size).floor() as i32;

        for x in x1.max(0)..=x2.min(self.width - 1) {
            for y in y1.max(0)..=y2.min(self.height - 1) {
                self.set_navigable(&Cell::new(x, y), false);
            }
        }
    }

    /// Cell containing `point`, not clamped.
    pub fn cell_at(&self, point: Point) -> Cell {
        Cell::new(
            (point.x / self.cell_size).floor() as i32,
            (point.y / self.cell_size).floor() as i32,
        )
    }

    pub fn clamp(&self, cell: Cell) -> Cell {
        Cell::new(
            cell.x.clamp(0, self.width - 1),
            cell.y.clamp(0, self.height - 1),
        )
    }

    pub fn cell_center(&self, cell: Cell) -> Point {
        let half = (self.cell_size / 2.0).floor();
        Point::new(
            f64::from(cell.x) * self.cell_size + half,
            f64::from(cell.y) * self.cell_size + half,
        )
    }

    /// Nearest navigable cell on expanding square rings around `cell`.
    /// Returns `cell` unchanged when it is already navigable or nothing is found.
    pub fn nearest_navigable(&self, cell: Cell) -> Cell {
        if self.is_navigable(&cell) {
            return cell;
        }

        let max_radius = self.width.max(self.height);
        for radius in 1..max_radius {
            // Top and bottom rows of the ring
            for dx in -radius..=radius {
                for dy in [-radius, radius] {
                    let candidate = Cell::new(cell.x + dx, cell.y + dy);
                    if self.is_navigable(&candidate) {
                        return candidate;
                    }
                }
            }
            // Left and right columns, corners already covered
            for dx in [-radius, radius] {
                for dy in (-radius + 1)..radius {
                    let candidate = Cell::new(cell.x + dx, cell.y + dy);
                    if self.is_navigable(&candidate) {
                        return candidate;
                    }
                }
            }
        }

        cell
    }

    pub fn navigable_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}
