pub use super::factories::MatrixBlockFactory;

pub struct Factory;

impl Factory {
    pub fn matrix_block() -> MatrixBlockFactory {
        MatrixBlockFactory::new()
    }
}
