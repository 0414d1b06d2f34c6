use crate::engine::block::MatrixBlock;
use crate::engine::compress::bitmap::{ColumnSource, extract_bitmap};

fn extract(block: &MatrixBlock, cols: &[u32]) -> crate::engine::compress::bitmap::Bitmap {
    let t = block.transpose();
    extract_bitmap(cols, &ColumnSource::transposed(&t), None, false)
}

#[test]
fn distinct_tuples_with_sorted_offsets() {
    let block = MatrixBlock::from_dense(
        6,
        2,
        vec![
            1.0, 2.0, //
            3.0, 4.0, //
            1.0, 2.0, //
            0.0, 0.0, //
            3.0, 4.0, //
            1.0, 2.0,
        ],
    );
    let bm = extract(&block, &[0, 1]);
    assert_eq!(bm.num_tuples(), 2);
    // ascending lexicographic order: (1,2) before (3,4)
    assert_eq!(bm.tuple(0), &[1.0, 2.0]);
    assert_eq!(bm.tuple(1), &[3.0, 4.0]);
    assert_eq!(bm.offsets(0), &[0, 2, 5]);
    assert_eq!(bm.offsets(1), &[1, 4]);
    assert_eq!(bm.total_hits(), 5);
}

#[test]
fn zero_tuples_are_skipped_by_default() {
    let block = MatrixBlock::from_dense(4, 1, vec![0.0, 1.0, 0.0, 1.0]);
    let bm = extract(&block, &[0]);
    assert_eq!(bm.num_tuples(), 1);
    assert_eq!(bm.offsets(0), &[1, 3]);
}

#[test]
fn materialize_zeros_keeps_the_background_tuple() {
    let block = MatrixBlock::from_dense(4, 1, vec![0.0, 1.0, 0.0, 1.0]);
    let t = block.transpose();
    let bm = extract_bitmap(&[0], &ColumnSource::transposed(&t), None, true);
    assert_eq!(bm.num_tuples(), 2);
    assert_eq!(bm.tuple(0), &[0.0]);
    assert_eq!(bm.offsets(0), &[0, 2]);
}

#[test]
fn partial_zero_tuples_are_kept() {
    let block = MatrixBlock::from_dense(2, 2, vec![1.0, 0.0, 0.0, 2.0]);
    let bm = extract(&block, &[0, 1]);
    assert_eq!(bm.num_tuples(), 2);
    assert_eq!(bm.tuple(0), &[0.0, 2.0]);
    assert_eq!(bm.tuple(1), &[1.0, 0.0]);
    assert_eq!(bm.tuple_nonzeros(0), 1);
}

#[test]
fn negative_zero_folds_into_the_background() {
    let block = MatrixBlock::from_dense(3, 1, vec![-0.0, 5.0, 0.0]);
    let bm = extract(&block, &[0]);
    assert_eq!(bm.num_tuples(), 1);
    assert_eq!(bm.offsets(0), &[1]);
}

#[test]
fn extraction_is_deterministic() {
    let values: Vec<f64> = (0..500).map(|i| ((i * 7) % 5) as f64).collect();
    let block = MatrixBlock::from_dense(500, 1, values);
    let a = extract(&block, &[0]);
    let b = extract(&block, &[0]);
    assert_eq!(a.values(), b.values());
    for i in 0..a.num_tuples() {
        assert_eq!(a.offsets(i), b.offsets(i));
    }
}

#[test]
fn sparse_and_dense_sources_agree() {
    let mut sparse = MatrixBlock::new_sparse(8, 2);
    let mut dense = MatrixBlock::new_dense(8, 2);
    for (r, c, v) in [(0, 0, 1.0), (2, 0, 1.0), (2, 1, 3.0), (7, 1, 3.0)] {
        sparse.set(r, c, v);
        dense.set(r, c, v);
    }
    sparse.recompute_nnz();
    dense.recompute_nnz();

    let ts = sparse.transpose();
    let td = dense.transpose();
    let bs = extract_bitmap(&[0, 1], &ColumnSource::transposed(&ts), None, false);
    let bd = extract_bitmap(&[0, 1], &ColumnSource::transposed(&td), None, false);
    assert_eq!(bs.values(), bd.values());
    assert_eq!(bs.num_tuples(), bd.num_tuples());
    for i in 0..bs.num_tuples() {
        assert_eq!(bs.offsets(i), bd.offsets(i));
    }
}

#[test]
fn row_subset_restricts_extraction() {
    let block = MatrixBlock::from_dense(6, 1, vec![1.0, 1.0, 2.0, 2.0, 1.0, 2.0]);
    let t = block.transpose();
    let sample = [0u32, 3, 4];
    let bm = extract_bitmap(&[0], &ColumnSource::transposed(&t), Some(&sample), false);
    assert_eq!(bm.num_tuples(), 2);
    assert_eq!(bm.offsets(0), &[0, 4]); // value 1.0
    assert_eq!(bm.offsets(1), &[3]); // value 2.0
}
