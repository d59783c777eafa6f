//! Tiling of a raster extent into evaluation windows.
//!
//! The lazy executor walks a `TileGrid` over the output raster and pulls
//! each tile's inputs on demand. Focal operations read a halo around their
//! output window; `Window::expanded` reports both the clamped read window
//! and how much of the requested halo fell outside the raster and must be
//! synthesized with a fill value.

use log::debug;

/// A half-open 2-D window `[row0, row1) x [col0, col1)` in cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub row0: usize,
    pub row1: usize,
    pub col0: usize,
    pub col1: usize,
}

/// Cells requested beyond the raster edge, per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgePad {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Window {
    pub fn new(row0: usize, row1: usize, col0: usize, col1: usize) -> Self {
        Window {
            row0,
            row1,
            col0,
            col1,
        }
    }

    /// The full extent of a raster with the given shape.
    pub fn full(rows: usize, cols: usize) -> Self {
        Window::new(0, rows, 0, cols)
    }

    pub fn rows(&self) -> usize {
        self.row1 - self.row0
    }

    pub fn cols(&self) -> usize {
        self.col1 - self.col0
    }

    pub fn cells(&self) -> usize {
        self.rows() * self.cols()
    }

    /// Expands this window by a halo, clamped to the raster extent.
    /// Returns the clamped read window and the amount clipped per side.
    pub fn expanded(
        &self,
        halo_rows: usize,
        halo_cols: usize,
        raster_rows: usize,
        raster_cols: usize,
    ) -> (Window, EdgePad) {
        let read = Window::new(
            self.row0.saturating_sub(halo_rows),
            (self.row1 + halo_rows).min(raster_rows),
            self.col0.saturating_sub(halo_cols),
            (self.col1 + halo_cols).min(raster_cols),
        );
        let pad = EdgePad {
            top: halo_rows - (self.row0 - read.row0),
            bottom: halo_rows - (read.row1 - self.row1),
            left: halo_cols - (self.col0 - read.col0),
            right: halo_cols - (read.col1 - self.col1),
        };
        (read, pad)
    }

    /// Maps this output window back to the input window of a block
    /// aggregation with the given y/x factors.
    pub fn upscaled(&self, fy: usize, fx: usize) -> Window {
        Window::new(
            self.row0 * fy,
            self.row1 * fy,
            self.col0 * fx,
            self.col1 * fx,
        )
    }
}

/// Decomposes a raster extent into tiles of a configured shape.
pub struct TileGrid {
    raster_rows: usize,
    raster_cols: usize,
    tile_rows: usize,
    tile_cols: usize,
    pub tiles_y: usize,
    pub tiles_x: usize,
}

impl TileGrid {
    pub fn new(raster_rows: usize, raster_cols: usize, tile_rows: usize, tile_cols: usize) -> Self {
        // Ceiling division; a zero-sized raster still yields zero tiles.
        let tiles_y = raster_rows.div_ceil(tile_rows);
        let tiles_x = raster_cols.div_ceil(tile_cols);

        debug!(
            "TileGrid: {}x{} raster, tiles {}x{} -> {}x{} tiles ({} total)",
            raster_rows,
            raster_cols,
            tile_rows,
            tile_cols,
            tiles_y,
            tiles_x,
            tiles_y * tiles_x
        );

        TileGrid {
            raster_rows,
            raster_cols,
            tile_rows,
            tile_cols,
            tiles_y,
            tiles_x,
        }
    }

    pub fn len(&self) -> usize {
        self.tiles_y * self.tiles_x
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The output window of tile `idx` (row-major tile order).
    pub fn window(&self, idx: usize) -> Window {
        let ty = idx / self.tiles_x;
        let tx = idx % self.tiles_x;
        Window::new(
            ty * self.tile_rows,
            ((ty + 1) * self.tile_rows).min(self.raster_rows),
            tx * self.tile_cols,
            ((tx + 1) * self.tile_cols).min(self.raster_cols),
        )
    }

    pub fn windows(&self) -> impl Iterator<Item = Window> + '_ {
        (0..self.len()).map(|i| self.window(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_grid_counts() {
        let grid = TileGrid::new(4000, 4000, 2000, 2000);
        assert_eq!(grid.tiles_y, 2);
        assert_eq!(grid.tiles_x, 2);
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn test_ragged_edge_tiles() {
        let grid = TileGrid::new(100, 250, 64, 64);
        assert_eq!(grid.tiles_y, 2);
        assert_eq!(grid.tiles_x, 4);
        let last = grid.window(grid.len() - 1);
        assert_eq!(last, Window::new(64, 100, 192, 250));
    }

    #[test]
    fn test_windows_cover_extent_exactly() {
        let grid = TileGrid::new(50, 37, 16, 16);
        let total: usize = grid.windows().map(|w| w.cells()).sum();
        assert_eq!(total, 50 * 37);
    }

    #[test]
    fn test_expanded_interior_has_no_pad() {
        let w = Window::new(10, 20, 10, 20);
        let (read, pad) = w.expanded(3, 3, 100, 100);
        assert_eq!(read, Window::new(7, 23, 7, 23));
        assert_eq!(pad, EdgePad::default());
    }

    #[test]
    fn test_expanded_clips_at_edges() {
        let w = Window::new(0, 10, 90, 100);
        let (read, pad) = w.expanded(4, 4, 100, 100);
        assert_eq!(read, Window::new(0, 14, 86, 100));
        assert_eq!(pad.top, 4);
        assert_eq!(pad.bottom, 0);
        assert_eq!(pad.left, 0);
        assert_eq!(pad.right, 4);
    }

    #[test]
    fn test_upscaled_window() {
        let w = Window::new(1, 3, 0, 2);
        assert_eq!(w.upscaled(2, 3), Window::new(2, 6, 0, 6));
    }
}
