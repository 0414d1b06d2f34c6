use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::engine::block::MatrixBlock;

type CellFn = Box<dyn Fn(usize, usize) -> f64>;

/// Builder for test matrices: constant columns, patterned cells, or seeded
/// random fills with a bounded per-column cardinality.
pub struct MatrixBlockFactory {
    rows: usize,
    cols: usize,
    sparse: bool,
    cell: CellFn,
}

impl MatrixBlockFactory {
    pub fn new() -> Self {
        Self {
            rows: 4,
            cols: 2,
            sparse: false,
            cell: Box::new(|_, _| 0.0),
        }
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_cols(mut self, cols: usize) -> Self {
        self.cols = cols;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }

    /// Column `j` holds `values[j]` in every row.
    pub fn with_constant_columns(mut self, values: &[f64]) -> Self {
        self.cols = values.len();
        let values = values.to_vec();
        self.cell = Box::new(move |_, c| values[c]);
        self
    }

    pub fn with_cell_fn(mut self, f: impl Fn(usize, usize) -> f64 + 'static) -> Self {
        self.cell = Box::new(f);
        self
    }

    /// Seeded i.i.d. fill drawing each cell from `{1 .. cardinality}`.
    pub fn with_random_cardinality(mut self, cardinality: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = self.rows;
        let cols = self.cols;
        let mut cells = vec![0.0; rows * cols];
        for cell in cells.iter_mut() {
            *cell = rng.gen_range(1..=cardinality) as f64;
        }
        self.cell = Box::new(move |r, c| cells[r * cols + c]);
        self
    }

    pub fn create(self) -> MatrixBlock {
        let mut mb = if self.sparse {
            MatrixBlock::new_sparse(self.rows, self.cols)
        } else {
            MatrixBlock::new_dense(self.rows, self.cols)
        };
        for r in 0..self.rows {
            for c in 0..self.cols {
                let v = (self.cell)(r, c);
                if v != 0.0 {
                    mb.set(r, c, v);
                }
            }
        }
        mb.recompute_nnz();
        mb
    }
}

impl Default for MatrixBlockFactory {
    fn default() -> Self {
        Self::new()
    }
}
