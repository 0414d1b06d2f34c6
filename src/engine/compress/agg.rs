use crate::engine::block::MatrixBlock;
use crate::engine::compress::kahan::KahanPair;

/// Only the sum families are supported on compressed groups; everything
/// else degrades to `Unsupported` at the matrix level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    SumSq,
}

impl AggFunc {
    pub fn cell(&self, v: f64) -> f64 {
        match self {
            AggFunc::Sum => v,
            AggFunc::SumSq => v * v,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggDir {
    Full,
    Row,
    Col,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AggOp {
    pub func: AggFunc,
    pub dir: AggDir,
}

impl AggOp {
    pub fn sum() -> Self {
        Self {
            func: AggFunc::Sum,
            dir: AggDir::Full,
        }
    }

    pub fn sum_sq() -> Self {
        Self {
            func: AggFunc::SumSq,
            dir: AggDir::Full,
        }
    }

    pub fn row_sums() -> Self {
        Self {
            func: AggFunc::Sum,
            dir: AggDir::Row,
        }
    }

    pub fn col_sums() -> Self {
        Self {
            func: AggFunc::Sum,
            dir: AggDir::Col,
        }
    }

    pub fn row_sums_sq() -> Self {
        Self {
            func: AggFunc::SumSq,
            dir: AggDir::Row,
        }
    }

    pub fn col_sums_sq() -> Self {
        Self {
            func: AggFunc::SumSq,
            dir: AggDir::Col,
        }
    }
}

/// Accumulation target for one aggregate pass. Each cell is a Kahan pair so
/// partials can be merged without dropping corrections.
#[derive(Clone, Debug)]
pub enum AggBuffer {
    Full(KahanPair),
    Row(Vec<KahanPair>),
    Col(Vec<KahanPair>),
}

impl AggBuffer {
    pub fn new(op: AggOp, num_rows: usize, num_cols: usize) -> Self {
        match op.dir {
            AggDir::Full => AggBuffer::Full(KahanPair::default()),
            AggDir::Row => AggBuffer::Row(vec![KahanPair::default(); num_rows]),
            AggDir::Col => AggBuffer::Col(vec![KahanPair::default(); num_cols]),
        }
    }

    /// Folds a partial buffer of the same shape into this one. Callers must
    /// merge partials in a fixed order to keep results reproducible.
    pub fn merge(&mut self, other: &AggBuffer) {
        match (self, other) {
            (AggBuffer::Full(a), AggBuffer::Full(b)) => a.merge(*b),
            (AggBuffer::Row(a), AggBuffer::Row(b)) | (AggBuffer::Col(a), AggBuffer::Col(b)) => {
                for (x, y) in a.iter_mut().zip(b.iter()) {
                    x.merge(*y);
                }
            }
            _ => unreachable!("mismatched aggregate buffer shapes"),
        }
    }

    pub fn into_block(self) -> MatrixBlock {
        match self {
            AggBuffer::Full(p) => MatrixBlock::from_dense(1, 1, vec![p.value()]),
            AggBuffer::Row(pairs) => {
                let values: Vec<f64> = pairs.iter().map(|p| p.value()).collect();
                MatrixBlock::from_dense(values.len(), 1, values)
            }
            AggBuffer::Col(pairs) => {
                let values: Vec<f64> = pairs.iter().map(|p| p.value()).collect();
                MatrixBlock::from_dense(1, values.len(), values)
            }
        }
    }
}
