use crate::shared::le_bytes::{LeSliceReader, LeVecWriter};

#[test]
fn writer_reader_roundtrip_all_widths() {
    let mut w = LeVecWriter::new();
    w.write_u8(0xAB);
    w.write_u16(0xBEEF);
    w.write_u32(0xDEAD_BEEF);
    w.write_u64(0x0123_4567_89AB_CDEF);
    w.write_f64(-42.5);
    let bytes = w.into_bytes();

    let mut r = LeSliceReader::new(&bytes);
    assert_eq!(r.read_u8(), Some(0xAB));
    assert_eq!(r.read_u16(), Some(0xBEEF));
    assert_eq!(r.read_u32(), Some(0xDEAD_BEEF));
    assert_eq!(r.read_u64(), Some(0x0123_4567_89AB_CDEF));
    assert_eq!(r.read_f64(), Some(-42.5));
    assert_eq!(r.remaining(), 0);
}

#[test]
fn reader_returns_none_past_end() {
    let bytes = [1u8, 2, 3];
    let mut r = LeSliceReader::new(&bytes);
    assert_eq!(r.read_u16(), Some(0x0201));
    assert_eq!(r.read_u32(), None);
    assert_eq!(r.read_u8(), Some(3));
    assert_eq!(r.read_u8(), None);
}

#[test]
fn nan_bits_survive_f64_roundtrip() {
    let mut w = LeVecWriter::new();
    w.write_f64(f64::NAN);
    let bytes = w.into_bytes();
    let mut r = LeSliceReader::new(&bytes);
    assert!(r.read_f64().unwrap().is_nan());
}
