use crate::engine::block::MatrixBlock;
use crate::engine::compress::agg::{AggBuffer, AggDir, AggOp};
use crate::engine::compress::bitmap::ColumnSource;
use crate::engine::compress::scalar::{ScalarOp, apply_to_block};

/// Catch-all group: the planner's escape hatch for columns that do not
/// compress. Wraps a conventional sub-block holding the group's columns in
/// group-local order.
#[derive(Clone, Debug, PartialEq)]
pub struct UncompressedGroup {
    cols: Vec<u32>,
    data: MatrixBlock,
}

impl UncompressedGroup {
    pub fn new(cols: Vec<u32>, data: MatrixBlock) -> Self {
        debug_assert_eq!(cols.len(), data.num_cols());
        Self { cols, data }
    }

    /// Gathers the group's columns out of the planner's working copy.
    pub fn from_source(cols: Vec<u32>, src: &ColumnSource, sparse: bool) -> Self {
        let num_rows = src.num_rows();
        let mut data = if sparse {
            MatrixBlock::new_sparse(num_rows, cols.len())
        } else {
            MatrixBlock::new_dense(num_rows, cols.len())
        };
        for (k, col) in cols.iter().enumerate() {
            for row in 0..num_rows {
                let v = src.value(*col, row);
                if v != 0.0 {
                    data.append_value(row, k, v);
                }
            }
        }
        data.sort_sparse_rows();
        data.recompute_nnz();
        Self { cols, data }
    }

    pub fn col_indices(&self) -> &[u32] {
        &self.cols
    }

    pub(super) fn col_indices_mut(&mut self) -> &mut Vec<u32> {
        &mut self.cols
    }

    pub fn num_rows(&self) -> usize {
        self.data.num_rows()
    }

    pub fn data(&self) -> &MatrixBlock {
        &self.data
    }

    pub fn count_nonzeros(&self) -> u64 {
        self.data.nnz()
    }

    pub fn right_mult_by_vector(&self, v: &[f64], out: &mut [f64], row_lo: usize, row_hi: usize) {
        let width = self.cols.len();
        if let Some(values) = self.data.dense_values() {
            for row in row_lo..row_hi {
                let base = row * width;
                let mut acc = 0.0;
                for (k, col) in self.cols.iter().enumerate() {
                    acc += values[base + k] * v[*col as usize];
                }
                out[row - row_lo] += acc;
            }
        } else {
            for row in row_lo..row_hi {
                let mut acc = 0.0;
                for (k, val) in self.data.sparse_row(row).unwrap_or(&[]) {
                    acc += val * v[self.cols[*k as usize] as usize];
                }
                out[row - row_lo] += acc;
            }
        }
    }

    pub fn left_mult_by_row_vector(&self, v: &[f64], out: &mut [f64]) {
        let width = self.cols.len();
        if let Some(values) = self.data.dense_values() {
            for row in 0..self.data.num_rows() {
                let weight = v[row];
                if weight == 0.0 {
                    continue;
                }
                let base = row * width;
                for (k, col) in self.cols.iter().enumerate() {
                    out[*col as usize] += weight * values[base + k];
                }
            }
        } else {
            for row in 0..self.data.num_rows() {
                let weight = v[row];
                if weight == 0.0 {
                    continue;
                }
                for (k, val) in self.data.sparse_row(row).unwrap_or(&[]) {
                    out[self.cols[*k as usize] as usize] += weight * val;
                }
            }
        }
    }

    pub fn unary_aggregate(&self, op: AggOp, buf: &mut AggBuffer) {
        let width = self.cols.len();
        for row in 0..self.data.num_rows() {
            if let Some(entries) = self.data.sparse_row(row) {
                for (k, val) in entries {
                    self.accumulate(op, buf, row, *k as usize, *val);
                }
            } else {
                for k in 0..width {
                    let val = self.data.get(row, k);
                    if val != 0.0 {
                        self.accumulate(op, buf, row, k, val);
                    }
                }
            }
        }
    }

    fn accumulate(&self, op: AggOp, buf: &mut AggBuffer, row: usize, local_col: usize, val: f64) {
        let cell = op.func.cell(val);
        match (op.dir, buf) {
            (AggDir::Full, AggBuffer::Full(p)) => p.add(cell),
            (AggDir::Row, AggBuffer::Row(pairs)) => pairs[row].add(cell),
            (AggDir::Col, AggBuffer::Col(pairs)) => {
                pairs[self.cols[local_col] as usize].add(cell)
            }
            _ => unreachable!("aggregate buffer shape mismatch"),
        }
    }

    pub fn scalar_op(&self, op: ScalarOp) -> UncompressedGroup {
        UncompressedGroup {
            cols: self.cols.clone(),
            data: apply_to_block(&self.data, op),
        }
    }

    pub fn decompress_to_block(&self, out: &mut MatrixBlock) {
        for row in 0..self.data.num_rows() {
            if let Some(entries) = self.data.sparse_row(row) {
                for (k, val) in entries {
                    out.append_value(row, self.cols[*k as usize] as usize, *val);
                }
            } else {
                for (k, col) in self.cols.iter().enumerate() {
                    let val = self.data.get(row, k);
                    if val != 0.0 {
                        out.append_value(row, *col as usize, val);
                    }
                }
            }
        }
    }

    pub fn decompress_column(&self, local_col: usize, out: &mut [f64]) {
        for row in 0..self.data.num_rows() {
            out[row] = self.data.get(row, local_col);
        }
    }

    pub fn count_nonzeros_per_row(&self, counts: &mut [u32]) {
        for row in 0..self.data.num_rows() {
            if let Some(entries) = self.data.sparse_row(row) {
                counts[row] += entries.len() as u32;
            } else {
                for k in 0..self.cols.len() {
                    if self.data.get(row, k) != 0.0 {
                        counts[row] += 1;
                    }
                }
            }
        }
    }

    pub fn estimate_in_memory_size(&self) -> u64 {
        self.data.estimate_in_memory_size() + (self.cols.capacity() * 4) as u64
    }

    pub fn serialized_payload_size(&self) -> u64 {
        self.data.exact_serialized_size()
    }
}
