use crate::engine::errors::{CompressError, FormatError};
use crate::shared::le_bytes::{LeSliceReader, LeVecWriter, SIZE_F64, SIZE_U32};

/// Elementwise binary operators supported on uncompressed blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

impl BinOp {
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Min => a.min(b),
            BinOp::Max => a.max(b),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum BlockData {
    /// Row-major values, len == rows * cols.
    Dense(Vec<f64>),
    /// Per-row (col, value) pairs, column-sorted within each row.
    Sparse(Vec<Vec<(u32, f64)>>),
}

/// Conventional dense/sparse matrix block. The compressed engine treats this
/// as an external collaborator: source of input columns, target of results.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixBlock {
    rows: usize,
    cols: usize,
    nnz: u64,
    data: BlockData,
}

impl MatrixBlock {
    pub fn new_dense(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            nnz: 0,
            data: BlockData::Dense(vec![0.0; rows * cols]),
        }
    }

    pub fn new_sparse(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            nnz: 0,
            data: BlockData::Sparse(vec![Vec::new(); rows]),
        }
    }

    pub fn from_dense(rows: usize, cols: usize, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), rows * cols, "dense payload length mismatch");
        let mut mb = Self {
            rows,
            cols,
            nnz: 0,
            data: BlockData::Dense(values),
        };
        mb.recompute_nnz();
        mb
    }

    /// Column vector (n x 1) from a plain slice.
    pub fn col_vector(values: &[f64]) -> Self {
        Self::from_dense(values.len(), 1, values.to_vec())
    }

    /// Row vector (1 x n) from a plain slice.
    pub fn row_vector(values: &[f64]) -> Self {
        Self::from_dense(1, values.len(), values.to_vec())
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn num_cols(&self) -> usize {
        self.cols
    }

    pub fn nnz(&self) -> u64 {
        self.nnz
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self.data, BlockData::Sparse(_))
    }

    pub fn is_empty_block(&self) -> bool {
        self.nnz == 0
    }

    pub fn sparsity(&self) -> f64 {
        let cells = (self.rows * self.cols) as f64;
        if cells == 0.0 {
            0.0
        } else {
            self.nnz as f64 / cells
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        debug_assert!(row < self.rows && col < self.cols);
        match &self.data {
            BlockData::Dense(v) => v[row * self.cols + col],
            BlockData::Sparse(rows) => rows[row]
                .binary_search_by_key(&(col as u32), |e| e.0)
                .map(|ix| rows[row][ix].1)
                .unwrap_or(0.0),
        }
    }

    /// Overwrites a cell. Non-zero bookkeeping is deferred to
    /// `recompute_nnz`, matching the collaborator contract.
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.rows && col < self.cols);
        match &mut self.data {
            BlockData::Dense(v) => v[row * self.cols + col] = value,
            BlockData::Sparse(rows) => {
                let r = &mut rows[row];
                match r.binary_search_by_key(&(col as u32), |e| e.0) {
                    Ok(ix) => {
                        if value == 0.0 {
                            r.remove(ix);
                        } else {
                            r[ix].1 = value;
                        }
                    }
                    Err(ix) => {
                        if value != 0.0 {
                            r.insert(ix, (col as u32, value));
                        }
                    }
                }
            }
        }
    }

    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value == 0.0 {
            return;
        }
        let cur = self.get(row, col);
        self.set(row, col, cur + value);
    }

    /// Appends a value to the end of a sparse row without searching; rows
    /// must be sorted afterwards via `sort_sparse_rows`. Dense targets fall
    /// back to `set`.
    pub fn append_value(&mut self, row: usize, col: usize, value: f64) {
        if value == 0.0 {
            return;
        }
        match &mut self.data {
            BlockData::Dense(v) => v[row * self.cols + col] = value,
            BlockData::Sparse(rows) => rows[row].push((col as u32, value)),
        }
    }

    /// Reserves per-row capacity on a sparse block before bulk appends.
    pub fn allocate_sparse_rows(&mut self, row_nnz: &[u32]) {
        if let BlockData::Sparse(rows) = &mut self.data {
            for (r, cnt) in row_nnz.iter().enumerate().take(rows.len()) {
                rows[r].reserve(*cnt as usize);
            }
        }
    }

    pub fn sort_sparse_rows(&mut self) {
        if let BlockData::Sparse(rows) = &mut self.data {
            for r in rows.iter_mut() {
                r.sort_unstable_by_key(|e| e.0);
            }
        }
    }

    pub fn recompute_nnz(&mut self) -> u64 {
        self.nnz = match &self.data {
            BlockData::Dense(v) => v.iter().filter(|x| **x != 0.0).count() as u64,
            BlockData::Sparse(rows) => rows
                .iter()
                .map(|r| r.iter().filter(|e| e.1 != 0.0).count() as u64)
                .sum(),
        };
        self.nnz
    }

    /// Dense row-major payload, when dense.
    pub fn dense_values(&self) -> Option<&[f64]> {
        match &self.data {
            BlockData::Dense(v) => Some(v),
            BlockData::Sparse(_) => None,
        }
    }

    pub fn dense_values_mut(&mut self) -> Option<&mut [f64]> {
        match &mut self.data {
            BlockData::Dense(v) => Some(v),
            BlockData::Sparse(_) => None,
        }
    }

    /// Sparse (col, value) pairs of one row, when sparse.
    pub fn sparse_row(&self, row: usize) -> Option<&[(u32, f64)]> {
        match &self.data {
            BlockData::Dense(_) => None,
            BlockData::Sparse(rows) => Some(&rows[row]),
        }
    }

    /// Non-zero (row, value) pairs of one column, in row order.
    pub fn col_iter(&self, col: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        (0..self.rows).filter_map(move |r| {
            let v = self.get(r, col);
            (v != 0.0).then_some((r, v))
        })
    }

    pub fn transpose(&self) -> MatrixBlock {
        match &self.data {
            BlockData::Dense(v) => {
                let mut out = vec![0.0; self.rows * self.cols];
                for i in 0..self.rows {
                    for j in 0..self.cols {
                        out[j * self.rows + i] = v[i * self.cols + j];
                    }
                }
                MatrixBlock {
                    rows: self.cols,
                    cols: self.rows,
                    nnz: self.nnz,
                    data: BlockData::Dense(out),
                }
            }
            BlockData::Sparse(rows) => {
                let mut counts = vec![0usize; self.cols];
                for r in rows {
                    for (c, _) in r {
                        counts[*c as usize] += 1;
                    }
                }
                let mut out: Vec<Vec<(u32, f64)>> =
                    counts.iter().map(|c| Vec::with_capacity(*c)).collect();
                for (i, r) in rows.iter().enumerate() {
                    for (c, v) in r {
                        out[*c as usize].push((i as u32, *v));
                    }
                }
                MatrixBlock {
                    rows: self.cols,
                    cols: self.rows,
                    nnz: self.nnz,
                    data: BlockData::Sparse(out),
                }
            }
        }
    }

    /// Flattens a row or column vector into a dense `Vec<f64>`.
    pub fn to_dense_vector(&self) -> Result<Vec<f64>, CompressError> {
        if self.rows != 1 && self.cols != 1 {
            return Err(CompressError::Shape(format!(
                "expected a vector, got {}x{}",
                self.rows, self.cols
            )));
        }
        let len = self.rows.max(self.cols);
        let mut out = vec![0.0; len];
        match &self.data {
            BlockData::Dense(v) => out.copy_from_slice(v),
            BlockData::Sparse(rows) => {
                if self.cols == 1 {
                    for (i, r) in rows.iter().enumerate() {
                        if let Some((_, v)) = r.first() {
                            out[i] = *v;
                        }
                    }
                } else {
                    for (c, v) in &rows[0] {
                        out[*c as usize] = *v;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Elementwise binary op against a same-shaped block; result is dense.
    pub fn binary_op(&self, other: &MatrixBlock, op: BinOp) -> Result<MatrixBlock, CompressError> {
        if self.rows != other.rows || self.cols != other.cols {
            return Err(CompressError::Shape(format!(
                "binary op on {}x{} vs {}x{}",
                self.rows, self.cols, other.rows, other.cols
            )));
        }
        let mut out = vec![0.0; self.rows * self.cols];
        for i in 0..self.rows {
            for j in 0..self.cols {
                out[i * self.cols + j] = op.apply(self.get(i, j), other.get(i, j));
            }
        }
        Ok(MatrixBlock::from_dense(self.rows, self.cols, out))
    }

    pub fn binary_op_in_place(
        &mut self,
        other: &MatrixBlock,
        op: BinOp,
    ) -> Result<(), CompressError> {
        let res = self.binary_op(other, op)?;
        *self = res;
        Ok(())
    }

    pub fn estimate_in_memory_size(&self) -> u64 {
        let payload = match &self.data {
            BlockData::Dense(v) => (v.capacity() * SIZE_F64) as u64,
            BlockData::Sparse(rows) => rows
                .iter()
                .map(|r| (r.capacity() * (SIZE_U32 + SIZE_F64) + 24) as u64)
                .sum(),
        };
        std::mem::size_of::<MatrixBlock>() as u64 + payload
    }

    pub fn exact_serialized_size(&self) -> u64 {
        // sparse flag + rows + cols + nnz
        let header = 1 + 4 + 4 + 8;
        let payload = match &self.data {
            BlockData::Dense(_) => (self.rows * self.cols * SIZE_F64) as u64,
            BlockData::Sparse(_) => {
                self.rows as u64 * 4 + self.nnz * (SIZE_U32 + SIZE_F64) as u64
            }
        };
        header + payload
    }

    pub fn write_to(&self, w: &mut LeVecWriter) {
        w.write_u8(self.is_sparse() as u8);
        w.write_u32(self.rows as u32);
        w.write_u32(self.cols as u32);
        w.write_u64(self.nnz);
        match &self.data {
            BlockData::Dense(v) => {
                for x in v {
                    w.write_f64(*x);
                }
            }
            BlockData::Sparse(rows) => {
                for r in rows {
                    w.write_u32(r.len() as u32);
                    for (c, v) in r {
                        w.write_u32(*c);
                        w.write_f64(*v);
                    }
                }
            }
        }
    }

    pub fn read_from(r: &mut LeSliceReader) -> Result<Self, FormatError> {
        let sparse = r.read_u8().ok_or(FormatError::Truncated("block header"))? != 0;
        let rows = r.read_u32().ok_or(FormatError::Truncated("block rows"))? as usize;
        let cols = r.read_u32().ok_or(FormatError::Truncated("block cols"))? as usize;
        let nnz = r.read_u64().ok_or(FormatError::Truncated("block nnz"))?;
        if !sparse {
            let mut values = Vec::with_capacity(rows * cols);
            for _ in 0..rows * cols {
                values.push(r.read_f64().ok_or(FormatError::Truncated("dense values"))?);
            }
            let mut mb = MatrixBlock::from_dense(rows, cols, values);
            mb.nnz = nnz;
            Ok(mb)
        } else {
            let mut data = Vec::with_capacity(rows);
            for _ in 0..rows {
                let cnt = r
                    .read_u32()
                    .ok_or(FormatError::Truncated("sparse row length"))?
                    as usize;
                if cnt > cols {
                    return Err(FormatError::Truncated("sparse row length"));
                }
                let mut entries = Vec::with_capacity(cnt);
                for _ in 0..cnt {
                    let c = r.read_u32().ok_or(FormatError::Truncated("sparse col"))?;
                    let v = r.read_f64().ok_or(FormatError::Truncated("sparse value"))?;
                    entries.push((c, v));
                }
                data.push(entries);
            }
            Ok(MatrixBlock {
                rows,
                cols,
                nnz,
                data: BlockData::Sparse(data),
            })
        }
    }
}
