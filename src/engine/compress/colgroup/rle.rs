use crate::engine::block::MatrixBlock;
use crate::engine::compress::agg::{AggBuffer, AggDir, AggOp};
use crate::engine::compress::bitmap::Bitmap;
use crate::engine::compress::colgroup::{BitmapPayload, ColGroup, UncompressedGroup};
use crate::engine::compress::scalar::ScalarOp;

const MAX_U16: usize = u16::MAX as usize;

/// Run-length encoding over row offsets. Each tuple's row list is a
/// sequence of `(gap, run)` u16 pairs: `gap` zero rows since the end of the
/// previous run, then `run` covered rows. Oversized gaps chain as
/// `(0xFFFF, 0)` sentinel-zero-run records; oversized runs split into
/// maximal pairs.
#[derive(Clone, Debug, PartialEq)]
pub struct RleGroup {
    pub base: BitmapPayload,
}

impl RleGroup {
    pub fn from_bitmap(cols: Vec<u32>, num_rows: usize, bm: &Bitmap) -> Self {
        let num_tuples = bm.num_tuples();
        let mut data: Vec<u16> = Vec::new();
        let mut ptr: Vec<u32> = Vec::with_capacity(num_tuples + 1);
        ptr.push(0);

        for i in 0..num_tuples {
            let offsets = bm.offsets(i);
            let mut cursor = 0usize;
            let mut ix = 0usize;
            while ix < offsets.len() {
                let start = offsets[ix] as usize;
                let mut end = start + 1;
                ix += 1;
                while ix < offsets.len() && offsets[ix] as usize == end {
                    end += 1;
                    ix += 1;
                }
                let mut gap = start - cursor;
                while gap > MAX_U16 {
                    data.push(u16::MAX);
                    data.push(0);
                    gap -= MAX_U16;
                }
                let mut run = end - start;
                while run > MAX_U16 {
                    data.push(gap as u16);
                    data.push(u16::MAX);
                    gap = 0;
                    run -= MAX_U16;
                }
                data.push(gap as u16);
                data.push(run as u16);
                cursor = end;
            }
            ptr.push(data.len() as u32);
        }

        Self {
            base: BitmapPayload {
                cols,
                num_rows,
                values: bm.values().to_vec(),
                data,
                ptr,
            },
        }
    }

    pub fn from_payload(base: BitmapPayload) -> Self {
        Self { base }
    }

    /// Walks the runs of tuple `i` as `[start, end)` row ranges.
    fn for_each_run<F: FnMut(usize, usize)>(&self, i: usize, mut f: F) {
        let data = &self.base.data;
        let mut pos = self.base.ptr[i] as usize;
        let end = self.base.ptr[i + 1] as usize;
        let mut cursor = 0usize;
        while pos < end {
            let gap = data[pos] as usize;
            let run = data[pos + 1] as usize;
            let start = cursor + gap;
            if run > 0 {
                f(start, start + run);
            }
            cursor = start + run;
            pos += 2;
        }
    }

    fn tuple_hits(&self, i: usize) -> u64 {
        let data = &self.base.data;
        let mut pos = self.base.ptr[i] as usize;
        let end = self.base.ptr[i + 1] as usize;
        let mut hits = 0u64;
        while pos < end {
            hits += data[pos + 1] as u64;
            pos += 2;
        }
        hits
    }

    pub fn count_nonzeros(&self) -> u64 {
        (0..self.base.num_tuples())
            .map(|i| self.tuple_hits(i) * self.base.tuple_nonzeros(i) as u64)
            .sum()
    }

    pub fn right_mult_by_vector(&self, v: &[f64], out: &mut [f64], row_lo: usize, row_hi: usize) {
        for i in 0..self.base.num_tuples() {
            let dot = self.base.tuple_dot(i, v);
            if dot == 0.0 {
                continue;
            }
            self.for_each_run(i, |start, end| {
                let lo = start.max(row_lo);
                let hi = end.min(row_hi);
                for row in lo..hi {
                    out[row - row_lo] += dot;
                }
            });
        }
    }

    pub fn left_mult_by_row_vector(&self, v: &[f64], out: &mut [f64]) {
        for i in 0..self.base.num_tuples() {
            let mut scale = 0.0;
            self.for_each_run(i, |start, end| {
                for row in start..end {
                    scale += v[row];
                }
            });
            if scale == 0.0 {
                continue;
            }
            for (val, col) in self.base.tuple_values(i).iter().zip(self.base.cols.iter()) {
                out[*col as usize] += val * scale;
            }
        }
    }

    pub fn unary_aggregate(&self, op: AggOp, buf: &mut AggBuffer) {
        match (op.dir, buf) {
            (AggDir::Full, AggBuffer::Full(pair)) => {
                for i in 0..self.base.num_tuples() {
                    let cell_sum = self.base.tuple_cell_sum(i, op.func);
                    pair.add(cell_sum * self.tuple_hits(i) as f64);
                }
            }
            (AggDir::Row, AggBuffer::Row(pairs)) => {
                for i in 0..self.base.num_tuples() {
                    let cell_sum = self.base.tuple_cell_sum(i, op.func);
                    self.for_each_run(i, |start, end| {
                        for row in start..end {
                            pairs[row].add(cell_sum);
                        }
                    });
                }
            }
            (AggDir::Col, AggBuffer::Col(pairs)) => {
                for i in 0..self.base.num_tuples() {
                    let hits = self.tuple_hits(i) as f64;
                    for (val, col) in self.base.tuple_values(i).iter().zip(self.base.cols.iter()) {
                        pairs[*col as usize].add(op.func.cell(*val) * hits);
                    }
                }
            }
            _ => unreachable!("aggregate buffer shape mismatch"),
        }
    }

    pub fn scalar_op(&self, op: ScalarOp) -> ColGroup {
        if op.preserves_zero() {
            let mut base = self.base.clone();
            base.values = self.base.map_values(op);
            return ColGroup::Rle(RleGroup { base });
        }
        let mut block = MatrixBlock::new_dense(self.base.num_rows, self.base.num_cols());
        self.decompress_local(&mut block);
        ColGroup::Uncompressed(
            UncompressedGroup::new(self.base.cols.clone(), block).scalar_op(op),
        )
    }

    fn decompress_local(&self, out: &mut MatrixBlock) {
        for i in 0..self.base.num_tuples() {
            let values = self.base.tuple_values(i).to_vec();
            self.for_each_run(i, |start, end| {
                for row in start..end {
                    for (k, val) in values.iter().enumerate() {
                        if *val != 0.0 {
                            out.set(row, k, *val);
                        }
                    }
                }
            });
        }
        out.recompute_nnz();
    }

    pub fn decompress_to_block(&self, out: &mut MatrixBlock) {
        let cols = self.base.cols.clone();
        for i in 0..self.base.num_tuples() {
            let values = self.base.tuple_values(i).to_vec();
            self.for_each_run(i, |start, end| {
                for row in start..end {
                    for (k, val) in values.iter().enumerate() {
                        if *val != 0.0 {
                            out.append_value(row, cols[k] as usize, *val);
                        }
                    }
                }
            });
        }
    }

    pub fn decompress_column(&self, local_col: usize, out: &mut [f64]) {
        for i in 0..self.base.num_tuples() {
            let val = self.base.tuple_values(i)[local_col];
            if val == 0.0 {
                continue;
            }
            self.for_each_run(i, |start, end| {
                for row in start..end {
                    out[row] = val;
                }
            });
        }
    }

    pub fn count_nonzeros_per_row(&self, counts: &mut [u32]) {
        for i in 0..self.base.num_tuples() {
            let nz = self.base.tuple_nonzeros(i) as u32;
            if nz == 0 {
                continue;
            }
            self.for_each_run(i, |start, end| {
                for row in start..end {
                    counts[row] += nz;
                }
            });
        }
    }
}
