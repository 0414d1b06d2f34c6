use crate::engine::block::MatrixBlock;
use crate::engine::compress::agg::{AggBuffer, AggOp};
use crate::engine::compress::bitmap::ColumnSource;
use crate::engine::compress::colgroup::UncompressedGroup;
use crate::engine::compress::scalar::ScalarOp;

// 4x3 source; the group carries absolute columns {0, 2}
fn source_block() -> MatrixBlock {
    MatrixBlock::from_dense(
        4,
        3,
        vec![
            1.0, 9.0, 2.0, //
            0.0, 9.0, 3.0, //
            4.0, 9.0, 0.0, //
            5.0, 9.0, 6.0,
        ],
    )
}

fn group() -> (UncompressedGroup, MatrixBlock) {
    let block = source_block();
    let t = block.transpose();
    let grp = UncompressedGroup::from_source(vec![0, 2], &ColumnSource::transposed(&t), false);
    (grp, block)
}

#[test]
fn from_source_gathers_group_columns() {
    let (grp, block) = group();
    assert_eq!(grp.col_indices(), &[0, 2]);
    assert_eq!(grp.num_rows(), 4);
    for r in 0..4 {
        assert_eq!(grp.data().get(r, 0), block.get(r, 0));
        assert_eq!(grp.data().get(r, 1), block.get(r, 2));
    }
    assert_eq!(grp.count_nonzeros(), 6);
}

#[test]
fn from_source_sparse_keeps_rows_sorted() {
    let block = source_block();
    let t = block.transpose();
    let grp = UncompressedGroup::from_source(vec![0, 2], &ColumnSource::transposed(&t), true);
    assert!(grp.data().is_sparse());
    assert_eq!(grp.data().sparse_row(0).unwrap(), &[(0, 1.0), (1, 2.0)]);
    assert_eq!(grp.count_nonzeros(), 6);
}

#[test]
fn right_mult_uses_absolute_column_indices() {
    let (grp, block) = group();
    let v = [2.0, 100.0, -1.0]; // column 1 belongs to another group
    let mut out = vec![0.0; 4];
    grp.right_mult_by_vector(&v, &mut out, 0, 4);
    for r in 0..4 {
        assert_eq!(out[r], block.get(r, 0) * 2.0 + block.get(r, 2) * -1.0);
    }
}

#[test]
fn left_mult_writes_only_group_columns() {
    let (grp, _) = group();
    let v = [1.0, 1.0, 1.0, 1.0];
    let mut out = vec![0.0; 3];
    grp.left_mult_by_row_vector(&v, &mut out);
    assert_eq!(out, vec![10.0, 0.0, 11.0]);
}

#[test]
fn aggregates_cover_group_cells_only() {
    let (grp, _) = group();
    let mut buf = AggBuffer::new(AggOp::sum(), 4, 3);
    grp.unary_aggregate(AggOp::sum(), &mut buf);
    assert_eq!(buf.into_block().get(0, 0), 21.0);

    let mut buf = AggBuffer::new(AggOp::col_sums(), 4, 3);
    grp.unary_aggregate(AggOp::col_sums(), &mut buf);
    let cols = buf.into_block();
    assert_eq!(cols.get(0, 0), 10.0);
    assert_eq!(cols.get(0, 1), 0.0);
    assert_eq!(cols.get(0, 2), 11.0);
}

#[test]
fn decompress_restores_absolute_positions() {
    let (grp, block) = group();
    let mut out = MatrixBlock::new_dense(4, 3);
    grp.decompress_to_block(&mut out);
    for r in 0..4 {
        assert_eq!(out.get(r, 0), block.get(r, 0));
        assert_eq!(out.get(r, 1), 0.0);
        assert_eq!(out.get(r, 2), block.get(r, 2));
    }
}

#[test]
fn scalar_op_applies_to_sub_block() {
    let (grp, _) = group();
    let scaled = grp.scalar_op(ScalarOp::Mul(10.0));
    assert_eq!(scaled.data().get(0, 0), 10.0);
    assert_eq!(scaled.data().get(3, 1), 60.0);
}

#[test]
fn per_row_nonzero_counts() {
    let (grp, _) = group();
    let mut counts = vec![0u32; 4];
    grp.count_nonzeros_per_row(&mut counts);
    assert_eq!(counts, vec![2, 1, 1, 2]);
}
