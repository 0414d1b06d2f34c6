use crate::engine::block::MatrixBlock;

/// Scalar elementwise transforms applied to a matrix. Bitmap groups apply
/// these to their distinct-values table only; an op that maps the zero
/// background to a non-zero value forces decompression of the group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScalarOp {
    Add(f64),
    Sub(f64),
    Mul(f64),
    Div(f64),
    Pow(f64),
    Abs,
}

impl ScalarOp {
    pub fn apply(&self, v: f64) -> f64 {
        match self {
            ScalarOp::Add(s) => v + s,
            ScalarOp::Sub(s) => v - s,
            ScalarOp::Mul(s) => v * s,
            ScalarOp::Div(s) => v / s,
            ScalarOp::Pow(s) => v.powf(*s),
            ScalarOp::Abs => v.abs(),
        }
    }

    /// True when the zero background stays zero under this op.
    pub fn preserves_zero(&self) -> bool {
        self.apply(0.0) == 0.0
    }
}

/// Applies a scalar op to a whole block. Zero-breaking ops densify first so
/// the untouched background picks up its new value.
pub fn apply_to_block(block: &MatrixBlock, op: ScalarOp) -> MatrixBlock {
    let rows = block.num_rows();
    let cols = block.num_cols();
    if block.is_sparse() && op.preserves_zero() {
        let mut out = MatrixBlock::new_sparse(rows, cols);
        for r in 0..rows {
            for (c, v) in block.sparse_row(r).unwrap_or(&[]) {
                out.append_value(r, *c as usize, op.apply(*v));
            }
        }
        out.recompute_nnz();
        return out;
    }
    let mut values = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            values.push(op.apply(block.get(r, c)));
        }
    }
    MatrixBlock::from_dense(rows, cols, values)
}
