pub mod ole;
pub mod rle;
pub mod uncompressed;

pub use ole::OleGroup;
pub use rle::RleGroup;
pub use uncompressed::UncompressedGroup;

#[cfg(test)]
mod rle_test;
#[cfg(test)]
mod uncompressed_test;

use crate::engine::block::MatrixBlock;
use crate::engine::compress::agg::{AggBuffer, AggFunc, AggOp};
use crate::engine::compress::scalar::ScalarOp;
use crate::shared::le_bytes::{SIZE_F64, SIZE_U16, SIZE_U32};

/// Data shared by the bitmap encodings: the group's columns, the distinct
/// value tuples (tuple-major), and a `u16` payload indexed per tuple by
/// `ptr`. The payload layout is encoding-specific.
#[derive(Clone, Debug, PartialEq)]
pub struct BitmapPayload {
    pub cols: Vec<u32>,
    pub num_rows: usize,
    pub values: Vec<f64>,
    pub data: Vec<u16>,
    pub ptr: Vec<u32>,
}

impl BitmapPayload {
    pub fn num_cols(&self) -> usize {
        self.cols.len()
    }

    pub fn num_tuples(&self) -> usize {
        self.ptr.len().saturating_sub(1)
    }

    pub fn tuple_values(&self, i: usize) -> &[f64] {
        let n = self.num_cols();
        &self.values[i * n..(i + 1) * n]
    }

    pub fn tuple_data(&self, i: usize) -> &[u16] {
        &self.data[self.ptr[i] as usize..self.ptr[i + 1] as usize]
    }

    /// Dot product of tuple `i` with the group-relevant entries of `v`.
    pub fn tuple_dot(&self, i: usize, v: &[f64]) -> f64 {
        self.tuple_values(i)
            .iter()
            .zip(self.cols.iter())
            .map(|(val, col)| val * v[*col as usize])
            .sum()
    }

    /// Sum of `func` over tuple `i`'s values.
    pub fn tuple_cell_sum(&self, i: usize, func: AggFunc) -> f64 {
        self.tuple_values(i).iter().map(|v| func.cell(*v)).sum()
    }

    pub fn tuple_nonzeros(&self, i: usize) -> usize {
        self.tuple_values(i).iter().filter(|v| **v != 0.0).count()
    }

    pub fn map_values(&self, op: ScalarOp) -> Vec<f64> {
        self.values.iter().map(|v| op.apply(*v)).collect()
    }

    pub fn estimate_in_memory_size(&self) -> u64 {
        (self.cols.capacity() * SIZE_U32
            + self.values.capacity() * SIZE_F64
            + self.data.capacity() * SIZE_U16
            + self.ptr.capacity() * SIZE_U32) as u64
            + std::mem::size_of::<Self>() as u64
    }

    /// Payload bytes on disk: tuple count, values table, ptr index, data
    /// length, data words.
    pub fn serialized_payload_size(&self) -> u64 {
        4 + (self.values.len() * SIZE_F64) as u64
            + (self.ptr.len() * SIZE_U32) as u64
            + 4
            + (self.data.len() * SIZE_U16) as u64
    }
}

/// A column group: the unit of compressed storage. Tagged variant rather
/// than trait objects so kernel inner loops stay monomorphic.
#[derive(Clone, Debug, PartialEq)]
pub enum ColGroup {
    Uncompressed(UncompressedGroup),
    Ole(OleGroup),
    Rle(RleGroup),
}

impl ColGroup {
    pub fn col_indices(&self) -> &[u32] {
        match self {
            ColGroup::Uncompressed(g) => g.col_indices(),
            ColGroup::Ole(g) => &g.base.cols,
            ColGroup::Rle(g) => &g.base.cols,
        }
    }

    pub fn num_cols(&self) -> usize {
        self.col_indices().len()
    }

    pub fn num_rows(&self) -> usize {
        match self {
            ColGroup::Uncompressed(g) => g.num_rows(),
            ColGroup::Ole(g) => g.base.num_rows,
            ColGroup::Rle(g) => g.base.num_rows,
        }
    }

    pub fn is_uncompressed(&self) -> bool {
        matches!(self, ColGroup::Uncompressed(_))
    }

    /// Structurally non-zero cells contributed by this group.
    pub fn count_nonzeros(&self) -> u64 {
        match self {
            ColGroup::Uncompressed(g) => g.count_nonzeros(),
            ColGroup::Ole(g) => g.count_nonzeros(),
            ColGroup::Rle(g) => g.count_nonzeros(),
        }
    }

    /// Adds this group's contribution to `M*v` for rows `[row_lo, row_hi)`;
    /// `out[0]` corresponds to `row_lo`.
    pub fn right_mult_by_vector(&self, v: &[f64], out: &mut [f64], row_lo: usize, row_hi: usize) {
        match self {
            ColGroup::Uncompressed(g) => g.right_mult_by_vector(v, out, row_lo, row_hi),
            ColGroup::Ole(g) => g.right_mult_by_vector(v, out, row_lo, row_hi),
            ColGroup::Rle(g) => g.right_mult_by_vector(v, out, row_lo, row_hi),
        }
    }

    /// Adds this group's contribution to `v^T * M`; `out` is full-width.
    pub fn left_mult_by_row_vector(&self, v: &[f64], out: &mut [f64]) {
        match self {
            ColGroup::Uncompressed(g) => g.left_mult_by_row_vector(v, out),
            ColGroup::Ole(g) => g.left_mult_by_row_vector(v, out),
            ColGroup::Rle(g) => g.left_mult_by_row_vector(v, out),
        }
    }

    pub fn unary_aggregate(&self, op: AggOp, buf: &mut AggBuffer) {
        match self {
            ColGroup::Uncompressed(g) => g.unary_aggregate(op, buf),
            ColGroup::Ole(g) => g.unary_aggregate(op, buf),
            ColGroup::Rle(g) => g.unary_aggregate(op, buf),
        }
    }

    /// Applies a scalar op, rewriting the distinct-values table when the op
    /// keeps zero at zero and decompressing the group otherwise.
    pub fn scalar_op(&self, op: ScalarOp) -> ColGroup {
        match self {
            ColGroup::Uncompressed(g) => ColGroup::Uncompressed(g.scalar_op(op)),
            ColGroup::Ole(g) => g.scalar_op(op),
            ColGroup::Rle(g) => g.scalar_op(op),
        }
    }

    pub fn decompress_to_block(&self, out: &mut MatrixBlock) {
        match self {
            ColGroup::Uncompressed(g) => g.decompress_to_block(out),
            ColGroup::Ole(g) => g.decompress_to_block(out),
            ColGroup::Rle(g) => g.decompress_to_block(out),
        }
    }

    /// Restores one group-local column into a dense row-indexed buffer.
    pub fn decompress_column(&self, local_col: usize, out: &mut [f64]) {
        match self {
            ColGroup::Uncompressed(g) => g.decompress_column(local_col, out),
            ColGroup::Ole(g) => g.decompress_column(local_col, out),
            ColGroup::Rle(g) => g.decompress_column(local_col, out),
        }
    }

    pub fn count_nonzeros_per_row(&self, counts: &mut [u32]) {
        match self {
            ColGroup::Uncompressed(g) => g.count_nonzeros_per_row(counts),
            ColGroup::Ole(g) => g.count_nonzeros_per_row(counts),
            ColGroup::Rle(g) => g.count_nonzeros_per_row(counts),
        }
    }

    pub fn shift_col_indices(&mut self, offset: u32) {
        let cols = match self {
            ColGroup::Uncompressed(g) => g.col_indices_mut(),
            ColGroup::Ole(g) => &mut g.base.cols,
            ColGroup::Rle(g) => &mut g.base.cols,
        };
        for c in cols {
            *c += offset;
        }
    }

    pub fn estimate_in_memory_size(&self) -> u64 {
        match self {
            ColGroup::Uncompressed(g) => g.estimate_in_memory_size(),
            ColGroup::Ole(g) => g.base.estimate_in_memory_size(),
            ColGroup::Rle(g) => g.base.estimate_in_memory_size(),
        }
    }

    /// On-disk size including the group record header.
    pub fn exact_serialized_size(&self) -> u64 {
        let header = (1 + 4 + 4 * self.num_cols() + 4) as u64;
        let payload = match self {
            ColGroup::Uncompressed(g) => g.serialized_payload_size(),
            ColGroup::Ole(g) => g.base.serialized_payload_size(),
            ColGroup::Rle(g) => g.base.serialized_payload_size(),
        };
        header + payload
    }
}
