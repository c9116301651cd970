//! # Tile Reservations
//!
//! Per-run claim grid. Carving passes ask the grid before writing a tile so
//! that geometry laid down by one pass is never corrupted by another.

use crate::Position;

/// Claim state of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reservation {
    /// Nothing has claimed the tile
    Open,
    /// Already carved; carving it again is harmless
    Structure,
    /// Must never be overwritten
    Locked,
}

/// Reservation grid owned by a single generation run.
#[derive(Debug, Clone)]
pub struct TileReservations {
    width: u32,
    height: u32,
    cells: Vec<Reservation>,
}

impl TileReservations {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Reservation::Open; (width * height) as usize],
        }
    }

    /// Creates a grid whose outer ring is locked so nothing carves the map edge.
    pub fn with_locked_border(width: u32, height: u32) -> Self {
        let mut grid = Self::new(width, height);
        for x in 0..width as i32 {
            grid.lock(Position::new(x, 0));
            grid.lock(Position::new(x, height as i32 - 1));
        }
        for y in 0..height as i32 {
            grid.lock(Position::new(0, y));
            grid.lock(Position::new(width as i32 - 1, y));
        }
        grid
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x < 0 || pos.y < 0 || pos.x >= self.width as i32 || pos.y >= self.height as i32 {
            return None;
        }
        Some(pos.y as usize * self.width as usize + pos.x as usize)
    }

    /// Out-of-bounds tiles read as `Locked`.
    pub fn get(&self, pos: Position) -> Reservation {
        self.index(pos)
            .map(|i| self.cells[i])
            .unwrap_or(Reservation::Locked)
    }

    pub fn is_writable(&self, pos: Position) -> bool {
        self.get(pos) != Reservation::Locked
    }

    /// Marks the tile as carved structure.
    ///
    /// Returns `false` without touching the grid when the tile is locked.
    pub fn claim(&mut self, pos: Position) -> bool {
        match self.index(pos) {
            Some(i) if self.cells[i] != Reservation::Locked => {
                self.cells[i] = Reservation::Structure;
                true
            }
            _ => false,
        }
    }

    pub fn lock(&mut self, pos: Position) {
        if let Some(i) = self.index(pos) {
            self.cells[i] = Reservation::Locked;
        }
    }

    pub fn count(&self, state: Reservation) -> usize {
        self.cells.iter().filter(|&&cell| cell == state).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_open_and_structure_tiles() {
        let mut grid = TileReservations::new(4, 4);
        let pos = Position::new(1, 1);
        assert_eq!(grid.get(pos), Reservation::Open);
        assert!(grid.claim(pos));
        assert_eq!(grid.get(pos), Reservation::Structure);
        assert!(grid.claim(pos));
    }

    #[test]
    fn test_locked_tiles_refuse_claims() {
        let mut grid = TileReservations::new(4, 4);
        let pos = Position::new(2, 3);
        grid.lock(pos);
        assert!(!grid.claim(pos));
        assert_eq!(grid.get(pos), Reservation::Locked);
        assert!(!grid.is_writable(pos));
    }

    #[test]
    fn test_out_of_bounds_reads_as_locked() {
        let mut grid = TileReservations::new(3, 3);
        assert_eq!(grid.get(Position::new(-1, 0)), Reservation::Locked);
        assert!(!grid.claim(Position::new(3, 0)));
    }

    #[test]
    fn test_locked_border() {
        let grid = TileReservations::with_locked_border(5, 4);
        assert_eq!(grid.count(Reservation::Locked), 14);
        assert_eq!(grid.get(Position::new(2, 2)), Reservation::Open);
        assert_eq!(grid.get(Position::new(4, 2)), Reservation::Locked);
    }
}
