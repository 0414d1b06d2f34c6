pub mod matrix_block;

pub use matrix_block::{BinOp, MatrixBlock};
