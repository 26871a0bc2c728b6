//! Fixed-depth time × frequency history of spectrum rows.
//!
//! Rows live in one flat `depth * width` allocation used as a ring of rows:
//! `push_row` overwrites the oldest slot in place and advances the head, so the
//! matrix always holds exactly `depth` rows and never allocates after
//! construction.

use crate::error::{Result, SpectraError};

#[derive(Debug, Clone)]
pub struct SpectrogramMatrix {
    depth: usize,
    width: usize,
    cells: Vec<f64>,
    /// Slot index of the oldest row.
    head: usize,
    pushes: u64,
}

impl SpectrogramMatrix {
    /// Create a `depth × width` matrix with every cell at `0.0`.
    ///
    /// # Errors
    /// `SpectraError::InvalidCapacity` if `depth` or `width` is zero.
    pub fn new(depth: usize, width: usize) -> Result<Self> {
        if depth == 0 {
            return Err(SpectraError::InvalidCapacity(depth));
        }
        if width == 0 {
            return Err(SpectraError::InvalidCapacity(width));
        }
        Ok(Self {
            depth,
            width,
            cells: vec![0.0; depth * width],
            head: 0,
            pushes: 0,
        })
    }

    /// Evict the oldest row and append `spectrum` as the newest.
    ///
    /// # Errors
    /// `SpectraError::WidthMismatch` if `spectrum.len() != width`; the matrix is unchanged.
    pub fn push_row(&mut self, spectrum: &[f64]) -> Result<()> {
        if spectrum.len() != self.width {
            return Err(SpectraError::WidthMismatch {
                expected: self.width,
                actual: spectrum.len(),
            });
        }
        let start = self.head * self.width;
        self.cells[start..start + self.width].copy_from_slice(spectrum);
        self.head = (self.head + 1) % self.depth;
        self.pushes += 1;
        Ok(())
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of successful `push_row` calls.
    pub fn pushes(&self) -> u64 {
        self.pushes
    }

    /// Row `index` in chronological order (0 = oldest, `depth - 1` = newest).
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        if index >= self.depth {
            return None;
        }
        let slot = (self.head + index) % self.depth;
        let start = slot * self.width;
        Some(&self.cells[start..start + self.width])
    }

    /// The most recently pushed row (a zero row before the first push).
    pub fn newest(&self) -> &[f64] {
        let slot = (self.head + self.depth - 1) % self.depth;
        let start = slot * self.width;
        &self.cells[start..start + self.width]
    }

    /// Iterate rows oldest → newest.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.depth).filter_map(move |i| self.row(i))
    }

    /// Owned `depth × width` grid, oldest row first.
    pub fn snapshot(&self) -> Vec<Vec<f64>> {
        self.rows().map(<[f64]>::to_vec).collect()
    }
}
