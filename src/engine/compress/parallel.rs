use rayon::ThreadPool;

use crate::engine::errors::CompressError;
use crate::shared::config::CONFIG;

/// Worker count for parallel kernels: config override, else host parallelism.
pub fn degree_of_parallelism() -> usize {
    CONFIG.parallel.worker_threads.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    })
}

/// Builds the fixed-size pool for one parallel operation. Pools are
/// per-operation and dropped at the end of the call, never shared.
pub fn build_pool(k: usize) -> Result<ThreadPool, CompressError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(k.max(1))
        .build()
        .map_err(|e| CompressError::Resource(format!("worker pool: {e}")))
}

/// Row-block length for right-multiply tasks: `ceil(rows / k)` rounded up
/// to the OLE segment alignment so tasks never straddle a segment.
pub fn aligned_row_block_len(num_rows: usize, k: usize, align: usize) -> usize {
    let mut blklen = num_rows.div_ceil(k.max(1));
    if align > 0 && blklen % align != 0 {
        blklen += align - blklen % align;
    }
    blklen.max(1)
}

/// Splits a column range into `parts` equal blocks for the self-transpose
/// multiply; the tail block absorbs the remainder.
pub fn column_block_len(num_cols: usize, parts: usize) -> usize {
    num_cols.div_ceil(parts.max(1)).max(1)
}
