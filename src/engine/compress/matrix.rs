use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use tracing::debug;

use crate::engine::block::{BinOp, MatrixBlock};
use crate::engine::compress::agg::{AggBuffer, AggDir, AggOp};
use crate::engine::compress::bitmap::{ColumnSource, extract_bitmap};
use crate::engine::compress::cocoder::{ColumnInfo, plan_cocoding};
use crate::engine::compress::colgroup::{ColGroup, OleGroup, RleGroup, UncompressedGroup};
use crate::engine::compress::estimator::SizeEstimator;
use crate::engine::compress::parallel::{aligned_row_block_len, build_pool, column_block_len};
use crate::engine::compress::scalar::{ScalarOp, apply_to_block};
use crate::engine::compress::serialize;
use crate::engine::compress::stats::CompressionStats;
use crate::engine::errors::CompressError;
use crate::shared::config::CONFIG;

/// Self-transpose multiply form. Only the left form `t(M) * M` runs on
/// compressed groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransposeType {
    Left,
    Right,
}

/// Matrix-multiply chain form: `t(X) * (X * v)`, optionally with an
/// elementwise row weighting `t(X) * (w o (X * v))`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainType {
    Xtxv,
    Xtwxv,
}

/// Output sparsity below which the right-multiply accumulates into a shared
/// sparse builder instead of a dense vector.
const SPARSE_OUTPUT_SPARSITY: f64 = 0.01;

/// A matrix held as bitmap-compressed column groups. Built by wrapping a
/// conventional block and calling `compress` exactly once; structurally
/// read-only afterwards, every kernel produces a fresh result block.
#[derive(Clone, Debug)]
pub struct CompressedMatrix {
    num_rows: usize,
    num_cols: usize,
    nnz: u64,
    sparse: bool,
    groups: Option<Vec<ColGroup>>,
    block: Option<MatrixBlock>,
    stats: Option<CompressionStats>,
}

impl CompressedMatrix {
    pub fn new_empty(num_rows: usize, num_cols: usize, sparse: bool) -> Self {
        let block = if sparse {
            MatrixBlock::new_sparse(num_rows, num_cols)
        } else {
            MatrixBlock::new_dense(num_rows, num_cols)
        };
        Self {
            num_rows,
            num_cols,
            nnz: 0,
            sparse,
            groups: None,
            block: Some(block),
            stats: None,
        }
    }

    /// Wraps an uncompressed block without compressing it.
    pub fn from_block(mut block: MatrixBlock) -> Self {
        block.recompute_nnz();
        Self {
            num_rows: block.num_rows(),
            num_cols: block.num_cols(),
            nnz: block.nnz(),
            sparse: block.is_sparse(),
            groups: None,
            block: Some(block),
            stats: None,
        }
    }

    pub(crate) fn from_parts(
        num_rows: usize,
        num_cols: usize,
        nnz: u64,
        sparse: bool,
        groups: Vec<ColGroup>,
    ) -> Self {
        Self {
            num_rows,
            num_cols,
            nnz,
            sparse,
            groups: Some(groups),
            block: None,
            stats: None,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn nnz(&self) -> u64 {
        self.nnz
    }

    pub fn sparsity(&self) -> f64 {
        let cells = (self.num_rows * self.num_cols) as f64;
        if cells == 0.0 { 0.0 } else { self.nnz as f64 / cells }
    }

    pub fn is_compressed(&self) -> bool {
        self.groups.is_some()
    }

    pub fn is_sparse_format(&self) -> bool {
        self.sparse
    }

    pub fn col_groups(&self) -> Option<&[ColGroup]> {
        self.groups.as_deref()
    }

    pub(crate) fn uncompressed_block(&self) -> Option<&MatrixBlock> {
        self.block.as_ref()
    }

    pub fn stats(&self) -> Option<&CompressionStats> {
        self.stats.as_ref()
    }

    fn is_empty_block(&self) -> bool {
        self.nnz == 0
    }

    /// Compresses the wrapped block in place. The uncompressed payload is
    /// discarded on success; calling this twice fails.
    pub fn compress(&mut self) -> Result<(), CompressError> {
        if self.is_compressed() {
            return Err(CompressError::AlreadyCompressed);
        }
        let cfg = &CONFIG.compression;
        let block = self
            .block
            .take()
            .ok_or_else(|| CompressError::Resource("missing uncompressed payload".into()))?;

        let num_rows = self.num_rows;
        let num_cols = self.num_cols;
        let sparsity = if self.sparse { block.sparsity() } else { 1.0 };

        let mut stats = CompressionStats::default();
        let mut phase_start = Instant::now();

        // Column-major working copy; the transpose makes per-column scans
        // sequential for the estimator and the bitmap extraction.
        let transposed = cfg.transpose_input;
        let working = if transposed {
            let t = block.transpose();
            drop(block);
            t
        } else {
            block
        };
        let src = if transposed {
            ColumnSource::transposed(&working)
        } else {
            ColumnSource::direct(&working)
        };

        // All sample-based decisions of this run share one row sample.
        let estimator = SizeEstimator::new(src, cfg);
        let ucol_size = 8.0 * num_rows as f64;

        // Phase 1: classify columns by their singleton compression ratio.
        let mut compressible: Vec<ColumnInfo> = Vec::new();
        let mut ratios: HashMap<u32, f64> = HashMap::new();
        for col in 0..num_cols as u32 {
            let info = estimator.estimate_cols(&[col]);
            if info.est_cardinality == 0 {
                // all-zero column: nothing to encode, keep it uncompressed
                continue;
            }
            let ratio = ucol_size / info.min_size() as f64;
            if ratio >= cfg.min_compression_ratio {
                ratios.insert(col, ratio);
                compressible.push(ColumnInfo {
                    col,
                    est_cardinality: info.est_cardinality,
                    est_size: info.min_size(),
                    ratio,
                    coverage: info.est_hits as f64 / num_rows.max(1) as f64,
                });
            }
        }
        stats.time_classify = phase_start.elapsed();
        phase_start = Instant::now();
        debug!("compression phase 1 (classify): {:?}", stats.time_classify);

        // Phase 2: partition compressible columns into candidate groups.
        let plans: Vec<Vec<u32>> = if compressible.len() > cfg.max_cocoding {
            compressible.iter().map(|c| vec![c.col]).collect()
        } else {
            plan_cocoding(&compressible, num_rows, sparsity, cfg)
        };
        let mut est_size = (num_cols - compressible.len()) as f64 * ucol_size;
        for plan in &plans {
            est_size += estimator.estimate_cols(plan).min_size() as f64;
        }
        stats.est_size = est_size;
        stats.time_group = phase_start.elapsed();
        phase_start = Instant::now();
        debug!("compression phase 2 (group): {:?}", stats.time_group);

        // Phase 3: verify each candidate on its full bitmap; on failure,
        // shed the weakest phase-1 column and retry.
        let mut remaining: HashSet<u32> = (0..num_cols as u32).collect();
        let mut groups: Vec<ColGroup> = Vec::new();
        for plan in plans {
            let mut cols = plan;
            let mut heap: Option<BinaryHeap<Reverse<RatioEntry>>> = None;
            while !cols.is_empty() {
                let bm = extract_bitmap(&cols, &src, None, cfg.materialize_zeros);
                let info = estimator.estimate_bitmap(&bm);
                let ratio = ucol_size * cols.len() as f64 / info.min_size() as f64;
                if ratio >= cfg.min_compression_ratio {
                    for c in &cols {
                        remaining.remove(c);
                    }
                    let rle_ratio = info.ole_size as f64 / info.rle_size as f64;
                    let grp = if rle_ratio > cfg.min_rle_ratio {
                        ColGroup::Rle(RleGroup::from_bitmap(cols, num_rows, &bm))
                    } else {
                        ColGroup::Ole(OleGroup::from_bitmap(
                            cols,
                            num_rows,
                            &bm,
                            cfg.bitmap_block_sz,
                        ))
                    };
                    groups.push(grp);
                    break;
                }
                let heap = heap.get_or_insert_with(|| {
                    cols.iter()
                        .enumerate()
                        .map(|(seq, c)| {
                            Reverse(RatioEntry {
                                ratio: ratios[c],
                                seq,
                                col: *c,
                            })
                        })
                        .collect()
                });
                // drop the column with the weakest phase-1 ratio
                if let Some(Reverse(worst)) = heap.pop() {
                    cols.retain(|c| *c != worst.col);
                } else {
                    cols.clear();
                }
            }
        }
        stats.time_encode = phase_start.elapsed();
        phase_start = Instant::now();
        debug!("compression phase 3 (encode): {:?}", stats.time_encode);

        // Phase 4: everything left over lands in one uncompressed group.
        if !remaining.is_empty() {
            let mut cols: Vec<u32> = remaining.into_iter().collect();
            cols.sort_unstable();
            groups.push(ColGroup::Uncompressed(UncompressedGroup::from_source(
                cols,
                &src,
                self.sparse,
            )));
        }
        drop(estimator);
        drop(working); // release the working copy before returning

        self.nnz = groups.iter().map(|g| g.count_nonzeros()).sum();
        self.groups = Some(groups);
        stats.time_finalize = phase_start.elapsed();
        debug!("compression phase 4 (finalize): {:?}", stats.time_finalize);
        self.stats = Some(stats);
        Ok(())
    }

    /// Restores a conventional block with the matrix contents.
    pub fn decompress(&self) -> Result<MatrixBlock, CompressError> {
        let Some(groups) = &self.groups else {
            return Ok(self
                .block
                .clone()
                .expect("uncompressed matrix always carries a block"));
        };
        let mut out = if self.sparse {
            let mut rnnz = vec![0u32; self.num_rows];
            for grp in groups {
                grp.count_nonzeros_per_row(&mut rnnz);
            }
            let mut mb = MatrixBlock::new_sparse(self.num_rows, self.num_cols);
            mb.allocate_sparse_rows(&rnnz);
            mb
        } else {
            MatrixBlock::new_dense(self.num_rows, self.num_cols)
        };
        for grp in groups {
            grp.decompress_to_block(&mut out);
        }
        out.sort_sparse_rows();
        out.recompute_nnz();
        Ok(out)
    }

    /// `M * v` for a column vector `v`. `k` is the worker count; `k <= 1`
    /// stays on the caller thread.
    pub fn right_mult_by_vector(
        &self,
        vector: &MatrixBlock,
        k: usize,
    ) -> Result<MatrixBlock, CompressError> {
        if vector.num_cols() != 1 || vector.num_rows() != self.num_cols {
            return Err(CompressError::Shape(format!(
                "right multiply needs a {}x1 vector, got {}x{}",
                self.num_cols,
                vector.num_rows(),
                vector.num_cols()
            )));
        }
        let v = vector.to_dense_vector()?;
        let Some(groups) = &self.groups else {
            return Ok(block_mat_vec(self.block_ref()?, &v));
        };
        if self.sparse && self.sparsity() < SPARSE_OUTPUT_SPARSITY {
            return self.right_mult_sparse_out(groups, &v, k);
        }

        let num_rows = self.num_rows;
        let mut out = vec![0.0; num_rows];
        if k <= 1 {
            right_mult_groups(groups, &v, &mut out, 0, num_rows);
        } else {
            let blklen =
                aligned_row_block_len(num_rows, k, CONFIG.compression.bitmap_block_sz);
            let pool = build_pool(k)?;
            pool.install(|| {
                out.par_chunks_mut(blklen).enumerate().for_each(|(bi, chunk)| {
                    let row_lo = bi * blklen;
                    let row_hi = row_lo + chunk.len();
                    right_mult_groups(groups, &v, chunk, row_lo, row_hi);
                });
            });
        }
        Ok(MatrixBlock::from_dense(num_rows, 1, out))
    }

    // Sparse output mode: per-task dense scratch, non-zeros funnelled into a
    // shared builder under a lock, rows sorted once at the end.
    fn right_mult_sparse_out(
        &self,
        groups: &[ColGroup],
        v: &[f64],
        k: usize,
    ) -> Result<MatrixBlock, CompressError> {
        let num_rows = self.num_rows;
        let result = Mutex::new(MatrixBlock::new_sparse(num_rows, 1));
        let blklen = aligned_row_block_len(num_rows, k, CONFIG.compression.bitmap_block_sz);
        let run_block = |row_lo: usize, row_hi: usize| {
            let mut local = vec![0.0; row_hi - row_lo];
            right_mult_groups(groups, v, &mut local, row_lo, row_hi);
            let mut guard = result.lock();
            for (i, val) in local.iter().enumerate() {
                if *val != 0.0 {
                    guard.append_value(row_lo + i, 0, *val);
                }
            }
        };
        if k <= 1 {
            run_block(0, num_rows);
        } else {
            let blocks = num_rows.div_ceil(blklen);
            let pool = build_pool(k)?;
            pool.install(|| {
                (0..blocks).into_par_iter().for_each(|bi| {
                    let row_lo = bi * blklen;
                    let row_hi = (row_lo + blklen).min(num_rows);
                    run_block(row_lo, row_hi);
                });
            });
        }
        let mut out = result.into_inner();
        out.sort_sparse_rows();
        out.recompute_nnz();
        Ok(out)
    }

    /// `v^T * M` for a vector of length `num_rows`; returns a `1 x num_cols`
    /// row vector. Parallelised one task per group.
    pub fn left_mult_by_row_vector(
        &self,
        vector: &MatrixBlock,
        k: usize,
    ) -> Result<MatrixBlock, CompressError> {
        let v = vector.to_dense_vector()?;
        if v.len() != self.num_rows {
            return Err(CompressError::Shape(format!(
                "left multiply needs a vector of length {}, got {}",
                self.num_rows,
                v.len()
            )));
        }
        let Some(groups) = &self.groups else {
            return Ok(block_vec_mat(self.block_ref()?, &v));
        };
        let num_cols = self.num_cols;
        let mut out = vec![0.0; num_cols];
        if k <= 1 || groups.len() == 1 {
            for grp in groups {
                grp.left_mult_by_row_vector(&v, &mut out);
            }
        } else {
            let pool = build_pool(k.min(groups.len()))?;
            let partials: Vec<Vec<f64>> = pool.install(|| {
                groups
                    .par_iter()
                    .map(|grp| {
                        let mut buf = vec![0.0; num_cols];
                        grp.left_mult_by_row_vector(&v, &mut buf);
                        buf
                    })
                    .collect()
            });
            // groups write disjoint columns, merged in group order
            for partial in partials {
                for (j, val) in partial.into_iter().enumerate() {
                    if val != 0.0 {
                        out[j] += val;
                    }
                }
            }
        }
        Ok(MatrixBlock::from_dense(1, num_cols, out))
    }

    /// Self-transpose multiply `t(M) * M`; only the left form is supported.
    pub fn transpose_self_mult(
        &self,
        ttype: TransposeType,
        k: usize,
    ) -> Result<MatrixBlock, CompressError> {
        if ttype != TransposeType::Left {
            return Err(CompressError::Unsupported(
                "only the left transpose-self multiply is supported".into(),
            ));
        }
        let Some(groups) = &self.groups else {
            return Ok(block_tsmm(self.block_ref()?));
        };
        let num_cols = self.num_cols;
        let mut out = vec![0.0; num_cols * num_cols];
        if !self.is_empty_block() && num_cols > 0 {
            // map each absolute column to its owning group
            let mut col_map = vec![(0usize, 0usize); num_cols];
            for (gi, grp) in groups.iter().enumerate() {
                for (j, col) in grp.col_indices().iter().enumerate() {
                    col_map[*col as usize] = (gi, j);
                }
            }
            if k <= 1 {
                tsmm_col_block(groups, &col_map, self.num_rows, num_cols, &mut out, 0);
            } else {
                // 2k column blocks, each writing a disjoint row stripe
                let blklen = column_block_len(num_cols, 2 * k);
                let pool = build_pool(k)?;
                pool.install(|| {
                    out.par_chunks_mut(blklen * num_cols)
                        .enumerate()
                        .for_each(|(bi, stripe)| {
                            tsmm_col_block(
                                groups,
                                &col_map,
                                self.num_rows,
                                num_cols,
                                stripe,
                                bi * blklen,
                            );
                        });
                });
            }
            // the kernels fill the group-order triangle; mirror it
            for i in 0..num_cols {
                for j in i + 1..num_cols {
                    let upper = out[i * num_cols + j];
                    if upper == 0.0 {
                        out[i * num_cols + j] = out[j * num_cols + i];
                    } else {
                        out[j * num_cols + i] = upper;
                    }
                }
            }
        }
        Ok(MatrixBlock::from_dense(num_cols, num_cols, out))
    }

    /// Sum-family aggregates. Each group accumulates into its own Kahan
    /// partial and the partials fold in group order, so results are
    /// bit-identical for every worker count. Workers engage only above the
    /// serialized-size threshold.
    pub fn unary_aggregate(&self, op: AggOp, k: usize) -> Result<MatrixBlock, CompressError> {
        let Some(groups) = &self.groups else {
            return Ok(block_aggregate(self.block_ref()?, op));
        };
        let parallel = k > 1
            && groups.len() > 1
            && self.exact_serialized_size() > CONFIG.compression.min_par_agg_threshold;
        let group_partial = |grp: &ColGroup| {
            let mut local = AggBuffer::new(op, self.num_rows, self.num_cols);
            grp.unary_aggregate(op, &mut local);
            local
        };
        let partials: Vec<AggBuffer> = if parallel {
            let pool = build_pool(k.min(groups.len()))?;
            pool.install(|| groups.par_iter().map(group_partial).collect())
        } else {
            groups.iter().map(group_partial).collect()
        };
        let mut buf = AggBuffer::new(op, self.num_rows, self.num_cols);
        for partial in &partials {
            buf.merge(partial);
        }
        Ok(buf.into_block())
    }

    /// Elementwise scalar transform; bitmap groups rewrite their values
    /// table, zero-breaking ops degrade groups to uncompressed form.
    pub fn scalar_op(&self, op: ScalarOp) -> Result<CompressedMatrix, CompressError> {
        match &self.groups {
            None => Ok(CompressedMatrix::from_block(apply_to_block(
                self.block_ref()?,
                op,
            ))),
            Some(groups) => {
                let new_groups: Vec<ColGroup> = groups.iter().map(|g| g.scalar_op(op)).collect();
                Ok(CompressedMatrix {
                    num_rows: self.num_rows,
                    num_cols: self.num_cols,
                    // scalar ops on the zero background rarely keep sparsity
                    nnz: (self.num_rows * self.num_cols) as u64,
                    sparse: self.sparse,
                    groups: Some(new_groups),
                    block: None,
                    stats: None,
                })
            }
        }
    }

    /// Elementwise binary op against an uncompressed block, executed on the
    /// decompressed form.
    pub fn binary_op(&self, other: &MatrixBlock, op: BinOp) -> Result<MatrixBlock, CompressError> {
        self.decompress()?.binary_op(other, op)
    }

    /// Horizontal concatenation `[self | other]`. Left groups are taken as
    /// is; an uncompressed right operand is compressed first; right groups
    /// shift their column indices by `self.num_cols`.
    pub fn append(&self, other: &CompressedMatrix) -> Result<CompressedMatrix, CompressError> {
        if self.num_rows != other.num_rows {
            return Err(CompressError::Shape(format!(
                "append needs equal row counts, got {} and {}",
                self.num_rows, other.num_rows
            )));
        }
        let Some(groups) = &self.groups else {
            // uncompressed left side: plain block concatenation
            let left = self.block_ref()?;
            let right = other.decompress()?;
            return Ok(CompressedMatrix::from_block(block_append(left, &right)));
        };
        let mut out_groups = groups.clone();
        let right_groups = match &other.groups {
            Some(g) => g.clone(),
            None => {
                let mut tmp = CompressedMatrix::from_block(
                    other
                        .block
                        .clone()
                        .expect("uncompressed matrix always carries a block"),
                );
                tmp.compress()?;
                tmp.groups.expect("compress populates groups")
            }
        };
        for mut grp in right_groups {
            grp.shift_col_indices(self.num_cols as u32);
            out_groups.push(grp);
        }
        Ok(CompressedMatrix {
            num_rows: self.num_rows,
            num_cols: self.num_cols + other.num_cols,
            nnz: self.nnz + other.nnz,
            sparse: self.sparse,
            groups: Some(out_groups),
            block: None,
            stats: None,
        })
    }

    /// Matrix multiply with one uncompressed operand. Supported only when
    /// the operand degenerates to a vector on the stated side.
    pub fn mat_mult(
        &self,
        other: &MatrixBlock,
        other_on_right: bool,
        k: usize,
    ) -> Result<MatrixBlock, CompressError> {
        if other_on_right {
            if other.num_cols() == 1 && other.num_rows() == self.num_cols {
                return self.right_mult_by_vector(other, k);
            }
        } else if other.num_rows() == 1 && other.num_cols() == self.num_rows {
            return self.left_mult_by_row_vector(other, k);
        }
        Err(CompressError::Unsupported(
            "matrix-matrix multiplication over a compressed operand needs a vector side".into(),
        ))
    }

    /// `t(X) * (X * v)`, optionally weighting the intermediate with `w`.
    pub fn chain_mult(
        &self,
        v: &MatrixBlock,
        w: Option<&MatrixBlock>,
        ctype: ChainType,
        k: usize,
    ) -> Result<MatrixBlock, CompressError> {
        let mut tmp = self.right_mult_by_vector(v, k)?;
        if ctype == ChainType::Xtwxv {
            let w = w.ok_or_else(|| {
                CompressError::Shape("weighted chain multiply needs a weight vector".into())
            })?;
            tmp.binary_op_in_place(w, BinOp::Mul)?;
        }
        let row = self.left_mult_by_row_vector(&tmp, k)?;
        Ok(row.transpose())
    }

    pub fn estimate_in_memory_size(&self) -> u64 {
        let base = std::mem::size_of::<CompressedMatrix>() as u64;
        match &self.groups {
            Some(groups) => {
                base + groups
                    .iter()
                    .map(|g| g.estimate_in_memory_size())
                    .sum::<u64>()
            }
            None => base + self.block.as_ref().map_or(0, |b| b.estimate_in_memory_size()),
        }
    }

    pub fn exact_serialized_size(&self) -> u64 {
        serialize::exact_serialized_size(self)
    }

    fn block_ref(&self) -> Result<&MatrixBlock, CompressError> {
        self.block
            .as_ref()
            .ok_or_else(|| CompressError::Resource("missing uncompressed payload".into()))
    }
}

// Phase-3 shrink heap entry: weakest phase-1 ratio first, insertion order
// breaking ties.
#[derive(Debug, Clone, Copy)]
struct RatioEntry {
    ratio: f64,
    seq: usize,
    col: u32,
}

impl PartialEq for RatioEntry {
    fn eq(&self, other: &Self) -> bool {
        self.ratio.total_cmp(&other.ratio).is_eq() && self.seq == other.seq
    }
}

impl Eq for RatioEntry {}

impl PartialOrd for RatioEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RatioEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ratio
            .total_cmp(&other.ratio)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// One right-multiply pass over a row window: uncompressed groups first so
/// bitmap accumulation never reads stale cells, bitmap groups add on top.
fn right_mult_groups(
    groups: &[ColGroup],
    v: &[f64],
    out: &mut [f64],
    row_lo: usize,
    row_hi: usize,
) {
    for grp in groups.iter().filter(|g| g.is_uncompressed()) {
        grp.right_mult_by_vector(v, out, row_lo, row_hi);
    }
    for grp in groups.iter().filter(|g| !g.is_uncompressed()) {
        grp.right_mult_by_vector(v, out, row_lo, row_hi);
    }
}

/// TSMM over the column window starting at `col_lo`, writing the stripe
/// `stripe[(col - col_lo) * num_cols ..]` per column: decompress the column,
/// row-vector multiply against the owning group and everything after it.
fn tsmm_col_block(
    groups: &[ColGroup],
    col_map: &[(usize, usize)],
    num_rows: usize,
    num_cols: usize,
    stripe: &mut [f64],
    col_lo: usize,
) {
    let cols_in_stripe = stripe.len() / num_cols;
    let mut lhs = vec![0.0; num_rows];
    let mut tmp = vec![0.0; num_cols];
    for local in 0..cols_in_stripe {
        let col = col_lo + local;
        let (gi, j) = col_map[col];
        lhs.fill(0.0);
        groups[gi].decompress_column(j, &mut lhs);
        if lhs.iter().all(|x| *x == 0.0) {
            continue;
        }
        tmp.fill(0.0);
        for grp in &groups[gi..] {
            grp.left_mult_by_row_vector(&lhs, &mut tmp);
        }
        let row = &mut stripe[local * num_cols..(local + 1) * num_cols];
        for (cix, val) in tmp.iter().enumerate() {
            if *val != 0.0 {
                row[cix] = *val;
            }
        }
    }
}

// Fallback kernels for not-yet-compressed matrices, mirroring the dense
// collaborator the original delegates to.

fn block_mat_vec(block: &MatrixBlock, v: &[f64]) -> MatrixBlock {
    let rows = block.num_rows();
    let cols = block.num_cols();
    let mut out = vec![0.0; rows];
    for r in 0..rows {
        if let Some(entries) = block.sparse_row(r) {
            out[r] = entries.iter().map(|(c, val)| val * v[*c as usize]).sum();
        } else {
            out[r] = (0..cols).map(|c| block.get(r, c) * v[c]).sum();
        }
    }
    MatrixBlock::from_dense(rows, 1, out)
}

fn block_vec_mat(block: &MatrixBlock, v: &[f64]) -> MatrixBlock {
    let rows = block.num_rows();
    let cols = block.num_cols();
    let mut out = vec![0.0; cols];
    for r in 0..rows {
        let weight = v[r];
        if weight == 0.0 {
            continue;
        }
        if let Some(entries) = block.sparse_row(r) {
            for (c, val) in entries {
                out[*c as usize] += weight * val;
            }
        } else {
            for (c, slot) in out.iter_mut().enumerate() {
                *slot += weight * block.get(r, c);
            }
        }
    }
    MatrixBlock::from_dense(1, cols, out)
}

fn block_tsmm(block: &MatrixBlock) -> MatrixBlock {
    let rows = block.num_rows();
    let cols = block.num_cols();
    let mut out = vec![0.0; cols * cols];
    for i in 0..cols {
        for j in i..cols {
            let mut acc = 0.0;
            for r in 0..rows {
                acc += block.get(r, i) * block.get(r, j);
            }
            out[i * cols + j] = acc;
            out[j * cols + i] = acc;
        }
    }
    MatrixBlock::from_dense(cols, cols, out)
}

fn block_aggregate(block: &MatrixBlock, op: AggOp) -> MatrixBlock {
    let mut buf = AggBuffer::new(op, block.num_rows(), block.num_cols());
    for r in 0..block.num_rows() {
        for c in 0..block.num_cols() {
            let val = block.get(r, c);
            if val == 0.0 {
                continue;
            }
            let cell = op.func.cell(val);
            match (&op.dir, &mut buf) {
                (AggDir::Full, AggBuffer::Full(p)) => p.add(cell),
                (AggDir::Row, AggBuffer::Row(pairs)) => pairs[r].add(cell),
                (AggDir::Col, AggBuffer::Col(pairs)) => pairs[c].add(cell),
                _ => unreachable!("aggregate buffer shape mismatch"),
            }
        }
    }
    buf.into_block()
}

fn block_append(left: &MatrixBlock, right: &MatrixBlock) -> MatrixBlock {
    let rows = left.num_rows();
    let cols = left.num_cols() + right.num_cols();
    let mut out = MatrixBlock::new_dense(rows, cols);
    for r in 0..rows {
        for c in 0..left.num_cols() {
            out.set(r, c, left.get(r, c));
        }
        for c in 0..right.num_cols() {
            out.set(r, left.num_cols() + c, right.get(r, c));
        }
    }
    out.recompute_nnz();
    out
}
