use crate::engine::compress::matrix::CompressedMatrix;
use crate::engine::compress::serialize::{
    MAGIC, load_from_path, read_matrix, write_matrix, write_to_path,
};
use crate::engine::errors::FormatError;
use crate::test_helpers::factory::Factory;

fn compressed_sample() -> CompressedMatrix {
    // one RLE group, one OLE group, one uncompressed catch-all
    let block = Factory::matrix_block()
        .with_rows(128)
        .with_cols(4)
        .with_cell_fn(|r, c| match c {
            0 => 2.0,
            1 => {
                if r % 2 == 0 {
                    5.0
                } else {
                    0.0
                }
            }
            _ => (r as f64) * 1.5 + 0.1,
        })
        .create();
    let mut cm = CompressedMatrix::from_block(block);
    cm.compress().expect("compression");
    cm
}

#[test]
fn compressed_roundtrip_preserves_groups_and_meta() {
    let cm = compressed_sample();
    let bytes = write_matrix(&cm);
    assert_eq!(bytes.len() as u64, cm.exact_serialized_size());

    let back = read_matrix(&bytes).expect("read back");
    assert_eq!(back.num_rows(), cm.num_rows());
    assert_eq!(back.num_cols(), cm.num_cols());
    assert_eq!(back.nnz(), cm.nnz());
    assert_eq!(back.col_groups().unwrap(), cm.col_groups().unwrap());
    assert_eq!(back.decompress().unwrap(), cm.decompress().unwrap());
}

#[test]
fn uncompressed_fallback_uses_block_format() {
    let block = Factory::matrix_block()
        .with_rows(6)
        .with_cols(3)
        .with_cell_fn(|r, c| (r * 3 + c) as f64)
        .create();
    let cm = CompressedMatrix::from_block(block.clone());
    let bytes = write_matrix(&cm);
    assert_eq!(bytes.len() as u64, cm.exact_serialized_size());

    let back = read_matrix(&bytes).expect("read back");
    assert!(!back.is_compressed());
    assert_eq!(back.decompress().unwrap(), block);
}

#[test]
fn bad_magic_is_rejected() {
    let cm = compressed_sample();
    let mut bytes = write_matrix(&cm);
    bytes[0] ^= 0xFF;
    assert!(matches!(read_matrix(&bytes), Err(FormatError::BadMagic)));
}

#[test]
fn unknown_version_is_rejected() {
    let cm = compressed_sample();
    let mut bytes = write_matrix(&cm);
    bytes[4] = 0x7F;
    assert!(matches!(
        read_matrix(&bytes),
        Err(FormatError::UnsupportedVersion(_))
    ));
}

#[test]
fn unknown_group_tag_is_rejected() {
    let cm = compressed_sample();
    let mut bytes = write_matrix(&cm);
    // first group record starts right after the 27-byte matrix header
    assert_eq!(&bytes[0..4], &MAGIC);
    bytes[27] = 9;
    assert!(matches!(
        read_matrix(&bytes),
        Err(FormatError::UnknownTag(9))
    ));
}

#[test]
fn corrupt_group_length_is_rejected() {
    let cm = compressed_sample();
    let mut bytes = write_matrix(&cm);
    // the first group's column-count field sits at offset 28
    bytes[28] ^= 0xFF;
    assert!(read_matrix(&bytes).is_err());
}

#[test]
fn truncated_stream_is_rejected() {
    let cm = compressed_sample();
    let bytes = write_matrix(&cm);
    for cut in [5usize, 26, 40, bytes.len() - 1] {
        assert!(read_matrix(&bytes[..cut]).is_err(), "cut at {cut}");
    }
}

#[test]
fn trailing_garbage_is_rejected() {
    let cm = compressed_sample();
    let mut bytes = write_matrix(&cm);
    bytes.push(0);
    assert!(matches!(
        read_matrix(&bytes),
        Err(FormatError::Truncated("trailing bytes"))
    ));
}

#[test]
fn file_roundtrip() {
    let cm = compressed_sample();
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("matrix.kmx");
    write_to_path(&cm, &path).expect("write");
    let back = load_from_path(&path).expect("load");
    assert_eq!(back.col_groups().unwrap(), cm.col_groups().unwrap());
}

#[test]
fn missing_file_surfaces_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("absent.kmx");
    assert!(matches!(load_from_path(&path), Err(FormatError::Io(_))));
}
