use crate::engine::block::MatrixBlock;
use crate::engine::compress::agg::{AggBuffer, AggOp};
use crate::engine::compress::bitmap::{Bitmap, ColumnSource, extract_bitmap};
use crate::engine::compress::colgroup::{ColGroup, RleGroup};
use crate::engine::compress::scalar::ScalarOp;

fn bitmap_for(block: &MatrixBlock, cols: &[u32]) -> Bitmap {
    let t = block.transpose();
    extract_bitmap(cols, &ColumnSource::transposed(&t), None, false)
}

// two clustered runs: rows 2..5 and 9..12 hold 4.0
fn run_block(rows: usize) -> MatrixBlock {
    let mut values = vec![0.0; rows];
    for r in 2..5 {
        values[r] = 4.0;
    }
    for r in 9..12 {
        values[r] = 4.0;
    }
    MatrixBlock::from_dense(rows, 1, values)
}

#[test]
fn encode_decode_roundtrip() {
    let block = run_block(16);
    let bm = bitmap_for(&block, &[0]);
    let grp = RleGroup::from_bitmap(vec![0], 16, &bm);

    // one tuple, two runs: (gap 2, run 3), (gap 4, run 3)
    assert_eq!(grp.base.num_tuples(), 1);
    assert_eq!(grp.base.data, vec![2, 3, 4, 3]);

    let mut out = MatrixBlock::new_dense(16, 1);
    grp.decompress_to_block(&mut out);
    out.recompute_nnz();
    assert_eq!(out, block);
}

#[test]
fn right_mult_with_window_clips_runs() {
    let block = run_block(16);
    let bm = bitmap_for(&block, &[0]);
    let grp = RleGroup::from_bitmap(vec![0], 16, &bm);

    let v = [3.0];
    let mut out = vec![0.0; 8];
    // window 4..12 clips the first run to row 4 and keeps the second whole
    grp.right_mult_by_vector(&v, &mut out, 4, 12);
    assert_eq!(out, vec![12.0, 0.0, 0.0, 0.0, 0.0, 12.0, 12.0, 12.0]);
}

#[test]
fn left_mult_sums_run_weights() {
    let block = run_block(16);
    let bm = bitmap_for(&block, &[0]);
    let grp = RleGroup::from_bitmap(vec![0], 16, &bm);

    let v: Vec<f64> = (0..16).map(|i| i as f64).collect();
    let mut out = vec![0.0; 1];
    grp.left_mult_by_row_vector(&v, &mut out);
    // (2+3+4 + 9+10+11) * 4.0
    assert_eq!(out[0], 39.0 * 4.0);
}

#[test]
fn aggregates_match_dense_reference() {
    let block = run_block(16);
    let bm = bitmap_for(&block, &[0]);
    let grp = RleGroup::from_bitmap(vec![0], 16, &bm);

    let mut full = AggBuffer::new(AggOp::sum(), 16, 1);
    grp.unary_aggregate(AggOp::sum(), &mut full);
    assert_eq!(full.into_block().get(0, 0), 24.0);

    let mut rows = AggBuffer::new(AggOp::row_sums(), 16, 1);
    grp.unary_aggregate(AggOp::row_sums(), &mut rows);
    let rows = rows.into_block();
    assert_eq!(rows.get(3, 0), 4.0);
    assert_eq!(rows.get(6, 0), 0.0);

    let mut cols = AggBuffer::new(AggOp::col_sums(), 16, 1);
    grp.unary_aggregate(AggOp::col_sums(), &mut cols);
    assert_eq!(cols.into_block().get(0, 0), 24.0);
}

#[test]
fn long_gap_chains_through_sentinel_records() {
    // single hit far past the u16 gap limit
    let rows = 70_000usize;
    let mut values = vec![0.0; rows];
    values[69_999] = 1.5;
    let block = MatrixBlock::from_dense(rows, 1, values);
    let bm = bitmap_for(&block, &[0]);
    let grp = RleGroup::from_bitmap(vec![0], rows, &bm);

    // chained records: (65535, 0) then (4464, 1)
    assert_eq!(grp.base.data, vec![65535, 0, 4464, 1]);

    let mut out = vec![0.0; rows];
    grp.decompress_column(0, &mut out);
    assert_eq!(out[69_999], 1.5);
    assert_eq!(out.iter().filter(|v| **v != 0.0).count(), 1);
}

#[test]
fn long_run_splits_into_maximal_pairs() {
    let rows = 70_000usize;
    let block = MatrixBlock::from_dense(rows, 1, vec![2.0; rows]);
    let bm = bitmap_for(&block, &[0]);
    let grp = RleGroup::from_bitmap(vec![0], rows, &bm);

    assert_eq!(grp.base.data, vec![0, 65535, 0, 4465]);
    assert_eq!(grp.count_nonzeros(), 70_000);
}

#[test]
fn scalar_op_keeps_encoding_when_zero_survives() {
    let block = run_block(16);
    let bm = bitmap_for(&block, &[0]);
    let grp = RleGroup::from_bitmap(vec![0], 16, &bm);

    match grp.scalar_op(ScalarOp::Mul(0.5)) {
        ColGroup::Rle(halved) => {
            assert_eq!(halved.base.values, vec![2.0]);
            assert_eq!(halved.base.data, grp.base.data);
        }
        other => panic!("expected RLE group, got {other:?}"),
    }

    assert!(matches!(
        grp.scalar_op(ScalarOp::Add(3.0)),
        ColGroup::Uncompressed(_)
    ));
}
