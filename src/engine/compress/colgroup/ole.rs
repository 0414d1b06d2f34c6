use crate::engine::block::MatrixBlock;
use crate::engine::compress::agg::{AggBuffer, AggDir, AggOp};
use crate::engine::compress::bitmap::Bitmap;
use crate::engine::compress::colgroup::{BitmapPayload, ColGroup, UncompressedGroup};
use crate::engine::compress::scalar::ScalarOp;

/// A segment record's count saturates at this value; a saturated record is
/// continued by the next record within the same segment.
const SEG_CONTINUED: u16 = u16::MAX;

/// Offset-list encoding. Each tuple's row list is cut into fixed segments of
/// `seg_len` rows; every segment up to the last hit emits a record
/// `[count u16][within-segment offset u16 x count]` (empty segments emit a
/// zero count). Decode is `row = segment_base + offset`, all in 16-bit
/// arithmetic.
#[derive(Clone, Debug, PartialEq)]
pub struct OleGroup {
    pub base: BitmapPayload,
    pub seg_len: usize,
}

impl OleGroup {
    pub fn from_bitmap(cols: Vec<u32>, num_rows: usize, bm: &Bitmap, seg_len: usize) -> Self {
        let num_tuples = bm.num_tuples();
        let mut data: Vec<u16> = Vec::new();
        let mut ptr: Vec<u32> = Vec::with_capacity(num_tuples + 1);
        ptr.push(0);

        for i in 0..num_tuples {
            let offsets = bm.offsets(i);
            if let Some(last) = offsets.last() {
                let mut pos = 0usize;
                let mut seg_start = 0usize;
                while seg_start <= *last as usize {
                    let seg_end = seg_start + seg_len;
                    let begin = pos;
                    while pos < offsets.len() && (offsets[pos] as usize) < seg_end {
                        pos += 1;
                    }
                    let mut emitted = begin;
                    loop {
                        let chunk = (pos - emitted).min(SEG_CONTINUED as usize);
                        data.push(chunk as u16);
                        for o in &offsets[emitted..emitted + chunk] {
                            data.push((*o as usize - seg_start) as u16);
                        }
                        emitted += chunk;
                        if chunk < SEG_CONTINUED as usize {
                            break;
                        }
                    }
                    seg_start = seg_end;
                }
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
            seg_len,
        }
    }

    pub fn from_payload(base: BitmapPayload, seg_len: usize) -> Self {
        Self { base, seg_len }
    }

    /// Walks the rows of tuple `i` that fall inside `[row_lo, row_hi)`,
    /// skipping whole leading segments.
    fn for_each_row_in_range<F: FnMut(usize)>(
        &self,
        i: usize,
        row_lo: usize,
        row_hi: usize,
        mut f: F,
    ) {
        let data = &self.base.data;
        let mut pos = self.base.ptr[i] as usize;
        let end = self.base.ptr[i + 1] as usize;
        let mut seg_start = 0usize;
        while pos < end && seg_start < row_hi {
            let raw = data[pos];
            let count = raw as usize;
            if seg_start + self.seg_len > row_lo {
                for t in 0..count {
                    let row = seg_start + data[pos + 1 + t] as usize;
                    if row >= row_lo && row < row_hi {
                        f(row);
                    }
                }
            }
            pos += 1 + count;
            if raw != SEG_CONTINUED {
                seg_start += self.seg_len;
            }
        }
    }

    fn for_each_row<F: FnMut(usize)>(&self, i: usize, f: F) {
        self.for_each_row_in_range(i, 0, self.base.num_rows, f);
    }

    /// Hit count of tuple `i` (sum of its segment record counts).
    fn tuple_hits(&self, i: usize) -> u64 {
        let data = &self.base.data;
        let mut pos = self.base.ptr[i] as usize;
        let end = self.base.ptr[i + 1] as usize;
        let mut hits = 0u64;
        while pos < end {
            let count = data[pos] as usize;
            hits += count as u64;
            pos += 1 + count;
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
            self.for_each_row_in_range(i, row_lo, row_hi, |row| {
                out[row - row_lo] += dot;
            });
        }
    }

    pub fn left_mult_by_row_vector(&self, v: &[f64], out: &mut [f64]) {
        for i in 0..self.base.num_tuples() {
            let mut scale = 0.0;
            self.for_each_row(i, |row| {
                scale += v[row];
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
                    self.for_each_row(i, |row| {
                        pairs[row].add(cell_sum);
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
            return ColGroup::Ole(OleGroup {
                base,
                seg_len: self.seg_len,
            });
        }
        // op moves the zero background: fall back to an uncompressed group
        let mut block = MatrixBlock::new_dense(self.base.num_rows, self.base.num_cols());
        self.decompress_local(&mut block);
        ColGroup::Uncompressed(
            UncompressedGroup::new(self.base.cols.clone(), block).scalar_op(op),
        )
    }

    fn decompress_local(&self, out: &mut MatrixBlock) {
        for i in 0..self.base.num_tuples() {
            let values = self.base.tuple_values(i).to_vec();
            self.for_each_row(i, |row| {
                for (k, val) in values.iter().enumerate() {
                    if *val != 0.0 {
                        out.set(row, k, *val);
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
            self.for_each_row(i, |row| {
                for (k, val) in values.iter().enumerate() {
                    if *val != 0.0 {
                        out.append_value(row, cols[k] as usize, *val);
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
            self.for_each_row(i, |row| {
                out[row] = val;
            });
        }
    }

    pub fn count_nonzeros_per_row(&self, counts: &mut [u32]) {
        for i in 0..self.base.num_tuples() {
            let nz = self.base.tuple_nonzeros(i) as u32;
            if nz == 0 {
                continue;
            }
            self.for_each_row(i, |row| {
                counts[row] += nz;
            });
        }
    }
}
