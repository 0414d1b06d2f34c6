pub mod matrix_block_factory;

pub use matrix_block_factory::MatrixBlockFactory;
