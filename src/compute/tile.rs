//! The typed pixel buffer flowing between kernels.
//!
//! A `Tile` is a band-major, row-major buffer of raw bytes plus the dtype
//! needed to view it as a typed slice, and an optional validity mask
//! (one byte per cell, 1 = null). A fully materialized raster is simply a
//! tile covering the whole extent.

use crate::error::{RasterError, Result};
use crate::grid::Window;
use crate::kernels::cast;
use crate::null_handling::mask;
use crate::traits::RasterElement;
use crate::types::RasterDataType;
use crate::utils::{safe_bytes_to_typed_slice, safe_bytes_to_typed_slice_mut, typed_slice_to_bytes};

#[derive(Debug, Clone)]
pub struct Tile {
    dtype: RasterDataType,
    bands: usize,
    rows: usize,
    cols: usize,
    data: Vec<u8>,
    mask: Option<Vec<u8>>,
}

impl Tile {
    pub fn from_bytes(
        dtype: RasterDataType,
        bands: usize,
        rows: usize,
        cols: usize,
        data: Vec<u8>,
        mask: Option<Vec<u8>>,
    ) -> Result<Self> {
        let cells = bands * rows * cols;
        if data.len() != cells * dtype.size_of() {
            return Err(RasterError::BufferMismatch(
                cells * dtype.size_of(),
                data.len(),
            ));
        }
        if let Some(m) = &mask {
            if m.len() != cells {
                return Err(RasterError::BufferMismatch(cells, m.len()));
            }
        }
        Ok(Tile {
            dtype,
            bands,
            rows,
            cols,
            data,
            mask,
        })
    }

    pub fn from_typed<T: RasterElement>(
        dtype: RasterDataType,
        bands: usize,
        rows: usize,
        cols: usize,
        data: Vec<T>,
        mask: Option<Vec<u8>>,
    ) -> Result<Self> {
        Self::from_bytes(dtype, bands, rows, cols, typed_slice_to_bytes(&data), mask)
    }

    pub fn dtype(&self) -> RasterDataType {
        self.dtype
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Cells per band.
    pub fn cells_per_band(&self) -> usize {
        self.rows * self.cols
    }

    /// Total cells across bands.
    pub fn cells(&self) -> usize {
        self.bands * self.rows * self.cols
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn typed<T: RasterElement>(&self) -> Result<&[T]> {
        safe_bytes_to_typed_slice(&self.data)
    }

    pub fn typed_mut<T: RasterElement>(&mut self) -> Result<&mut [T]> {
        safe_bytes_to_typed_slice_mut(&mut self.data)
    }

    /// One band's cells as a typed slice.
    pub fn typed_band<T: RasterElement>(&self, band: usize) -> Result<&[T]> {
        let all = self.typed::<T>()?;
        let n = self.cells_per_band();
        Ok(&all[band * n..(band + 1) * n])
    }

    pub fn mask(&self) -> Option<&[u8]> {
        self.mask.as_deref()
    }

    pub fn mask_band(&self, band: usize) -> Option<&[u8]> {
        let n = self.cells_per_band();
        self.mask.as_deref().map(|m| &m[band * n..(band + 1) * n])
    }

    /// Attaches a mask, dropping it when every cell is valid so unmasked
    /// rasters keep the fast path.
    pub fn set_mask(&mut self, mask: Option<Vec<u8>>) {
        self.mask = match mask {
            Some(m) if !mask::is_all_valid(&m) => Some(m),
            _ => None,
        };
    }

    pub fn take_mask(&mut self) -> Option<Vec<u8>> {
        self.mask.take()
    }

    /// A copy of this tile reinterpreted in another dtype (mask carried).
    pub fn cast_to(&self, to: RasterDataType) -> Result<Tile> {
        if to == self.dtype {
            return Ok(self.clone());
        }
        let data = cast::cast_bytes(&self.data, self.dtype, to)?;
        Tile::from_bytes(to, self.bands, self.rows, self.cols, data, self.mask.clone())
    }

    /// Copies a spatial window (all bands) out of this tile.
    pub fn window_copy(&self, w: Window) -> Result<Tile> {
        if w.row1 > self.rows || w.col1 > self.cols {
            return Err(RasterError::InternalError(format!(
                "window {:?} exceeds tile shape {}x{}",
                w, self.rows, self.cols
            )));
        }
        let esize = self.dtype.size_of();
        let out_cells = w.cells();
        let mut data = Vec::with_capacity(self.bands * out_cells * esize);
        let mut out_mask = self.mask.as_ref().map(|_| Vec::with_capacity(self.bands * out_cells));
        for band in 0..self.bands {
            let band_off = band * self.cells_per_band();
            for r in w.row0..w.row1 {
                let start = (band_off + r * self.cols + w.col0) * esize;
                let end = start + w.cols() * esize;
                data.extend_from_slice(&self.data[start..end]);
                if let (Some(out), Some(m)) = (out_mask.as_mut(), self.mask.as_ref()) {
                    let mstart = band_off + r * self.cols + w.col0;
                    out.extend_from_slice(&m[mstart..mstart + w.cols()]);
                }
            }
        }
        Tile::from_bytes(self.dtype, self.bands, w.rows(), w.cols(), data, out_mask)
    }

    /// Pastes `src` (covering window `w` of this tile) into place.
    pub fn paste(&mut self, src: &Tile, w: Window) -> Result<()> {
        if src.dtype != self.dtype || src.bands != self.bands {
            return Err(RasterError::InternalError(
                "paste source does not match destination layout".to_string(),
            ));
        }
        let esize = self.dtype.size_of();
        // Pasting into a masked destination requires a mask buffer even if
        // this particular source tile is fully valid.
        if self.mask.is_none() && src.mask.is_some() {
            self.mask = Some(vec![0u8; self.cells()]);
        }
        for band in 0..self.bands {
            let src_band_off = band * src.cells_per_band();
            let dst_band_off = band * self.cells_per_band();
            for (i, r) in (w.row0..w.row1).enumerate() {
                let src_start = (src_band_off + i * src.cols) * esize;
                let dst_start = (dst_band_off + r * self.cols + w.col0) * esize;
                self.data[dst_start..dst_start + src.cols * esize]
                    .copy_from_slice(&src.data[src_start..src_start + src.cols * esize]);
                if let Some(dst_mask) = self.mask.as_mut() {
                    let dst_mstart = dst_band_off + r * self.cols + w.col0;
                    match src.mask.as_ref() {
                        Some(src_mask) => {
                            let src_mstart = src_band_off + i * src.cols;
                            dst_mask[dst_mstart..dst_mstart + src.cols]
                                .copy_from_slice(&src_mask[src_mstart..src_mstart + src.cols]);
                        }
                        None => {
                            dst_mask[dst_mstart..dst_mstart + src.cols].fill(0);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// An uninitialized (zero-filled) tile of the given layout.
    pub fn zeroed(dtype: RasterDataType, bands: usize, rows: usize, cols: usize) -> Tile {
        Tile {
            dtype,
            bands,
            rows,
            cols,
            data: vec![0u8; bands * rows * cols * dtype.size_of()],
            mask: None,
        }
    }
}
