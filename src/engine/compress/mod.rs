pub mod agg;
pub mod bitmap;
pub mod cocoder;
pub mod colgroup;
pub mod estimator;
pub mod kahan;
pub mod matrix;
pub mod parallel;
pub mod sample;
pub mod scalar;
pub mod serialize;
pub mod stats;

pub use matrix::{CompressedMatrix, TransposeType};

#[cfg(test)]
mod bitmap_test;
#[cfg(test)]
mod estimator_test;
#[cfg(test)]
mod kahan_test;
#[cfg(test)]
mod serialize_test;
