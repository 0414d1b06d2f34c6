use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::engine::block::MatrixBlock;
use crate::engine::compress::colgroup::{
    BitmapPayload, ColGroup, OleGroup, RleGroup, UncompressedGroup,
};
use crate::engine::compress::matrix::CompressedMatrix;
use crate::engine::errors::FormatError;
use crate::shared::config::CONFIG;
use crate::shared::le_bytes::{LeSliceReader, LeVecWriter};

pub const MAGIC: [u8; 4] = *b"KMX1";
pub const VERSION: u16 = 1;

const TAG_UNCOMPRESSED: u8 = 0;
const TAG_OLE: u8 = 1;
const TAG_RLE: u8 = 2;

// magic + version + compressed flag
const PREAMBLE_LEN: u64 = 4 + 2 + 1;
// rows + cols + nnz + group count
const COMPRESSED_HEADER_LEN: u64 = 4 + 4 + 8 + 4;

pub fn exact_serialized_size(matrix: &CompressedMatrix) -> u64 {
    match matrix.col_groups() {
        Some(groups) => {
            PREAMBLE_LEN
                + COMPRESSED_HEADER_LEN
                + groups.iter().map(|g| g.exact_serialized_size()).sum::<u64>()
        }
        None => {
            PREAMBLE_LEN
                + matrix
                    .uncompressed_block()
                    .map_or(0, |b| b.exact_serialized_size())
        }
    }
}

/// Serializes a matrix to the persistent layout: little-endian header
/// `magic | version | compressed_flag`, then either the group records or
/// the collaborator block's own format.
pub fn write_matrix(matrix: &CompressedMatrix) -> Vec<u8> {
    let mut w = LeVecWriter::with_capacity(exact_serialized_size(matrix) as usize);
    for b in MAGIC {
        w.write_u8(b);
    }
    w.write_u16(VERSION);
    match matrix.col_groups() {
        Some(groups) => {
            w.write_u8(1);
            w.write_u32(matrix.num_rows() as u32);
            w.write_u32(matrix.num_cols() as u32);
            w.write_u64(matrix.nnz());
            w.write_u32(groups.len() as u32);
            for grp in groups {
                write_group(&mut w, grp);
            }
        }
        None => {
            w.write_u8(0);
            if let Some(block) = matrix.uncompressed_block() {
                block.write_to(&mut w);
            }
        }
    }
    w.into_bytes()
}

pub fn read_matrix(bytes: &[u8]) -> Result<CompressedMatrix, FormatError> {
    let mut r = LeSliceReader::new(bytes);
    let mut magic = [0u8; 4];
    for b in magic.iter_mut() {
        *b = r.read_u8().ok_or(FormatError::Truncated("magic"))?;
    }
    if magic != MAGIC {
        return Err(FormatError::BadMagic);
    }
    let version = r.read_u16().ok_or(FormatError::Truncated("version"))?;
    if version != VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }
    let compressed = r
        .read_u8()
        .ok_or(FormatError::Truncated("compressed flag"))?
        != 0;
    if !compressed {
        let block = MatrixBlock::read_from(&mut r)?;
        if r.remaining() != 0 {
            return Err(FormatError::Truncated("trailing bytes"));
        }
        return Ok(CompressedMatrix::from_block(block));
    }

    let num_rows = r.read_u32().ok_or(FormatError::Truncated("rows"))? as usize;
    let num_cols = r.read_u32().ok_or(FormatError::Truncated("cols"))? as usize;
    let nnz = r.read_u64().ok_or(FormatError::Truncated("nnz"))?;
    let group_count = r.read_u32().ok_or(FormatError::Truncated("group count"))? as usize;

    let mut groups = Vec::with_capacity(group_count.min(4096));
    let mut sparse = false;
    for _ in 0..group_count {
        let grp = read_group(&mut r)?;
        if let ColGroup::Uncompressed(u) = &grp {
            sparse = sparse || u.data().is_sparse();
        }
        groups.push(grp);
    }
    if r.remaining() != 0 {
        return Err(FormatError::Truncated("trailing bytes"));
    }
    Ok(CompressedMatrix::from_parts(
        num_rows, num_cols, nnz, sparse, groups,
    ))
}

pub fn write_to_path(matrix: &CompressedMatrix, path: &Path) -> Result<(), FormatError> {
    let bytes = write_matrix(matrix);
    let mut file = File::create(path)?;
    file.write_all(&bytes)?;
    file.flush()?;
    Ok(())
}

pub fn load_from_path(path: &Path) -> Result<CompressedMatrix, FormatError> {
    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    read_matrix(&bytes)
}

fn write_group(w: &mut LeVecWriter, grp: &ColGroup) {
    let tag = match grp {
        ColGroup::Uncompressed(_) => TAG_UNCOMPRESSED,
        ColGroup::Ole(_) => TAG_OLE,
        ColGroup::Rle(_) => TAG_RLE,
    };
    w.write_u8(tag);
    let cols = grp.col_indices();
    w.write_u32(cols.len() as u32);
    for c in cols {
        w.write_u32(*c);
    }
    w.write_u32(grp.num_rows() as u32);
    match grp {
        ColGroup::Uncompressed(u) => u.data().write_to(w),
        ColGroup::Ole(g) => write_bitmap_payload(w, &g.base),
        ColGroup::Rle(g) => write_bitmap_payload(w, &g.base),
    }
}

fn write_bitmap_payload(w: &mut LeVecWriter, base: &BitmapPayload) {
    w.write_u32(base.num_tuples() as u32);
    for v in &base.values {
        w.write_f64(*v);
    }
    for p in &base.ptr {
        w.write_u32(*p);
    }
    w.write_u32(base.data.len() as u32);
    for d in &base.data {
        w.write_u16(*d);
    }
}

fn read_group(r: &mut LeSliceReader) -> Result<ColGroup, FormatError> {
    let tag = r.read_u8().ok_or(FormatError::Truncated("group tag"))?;
    let col_count = r.read_u32().ok_or(FormatError::Truncated("column count"))? as usize;
    if col_count as u64 * 4 > r.remaining() as u64 {
        return Err(FormatError::Truncated("column indices"));
    }
    let mut cols = Vec::with_capacity(col_count);
    for _ in 0..col_count {
        cols.push(r.read_u32().ok_or(FormatError::Truncated("column index"))?);
    }
    let num_rows = r.read_u32().ok_or(FormatError::Truncated("group rows"))? as usize;
    match tag {
        TAG_UNCOMPRESSED => {
            let block = MatrixBlock::read_from(r)?;
            if block.num_cols() != col_count || block.num_rows() != num_rows {
                return Err(FormatError::Truncated("uncompressed group shape"));
            }
            Ok(ColGroup::Uncompressed(UncompressedGroup::new(cols, block)))
        }
        TAG_OLE => {
            let base = read_bitmap_payload(r, cols, num_rows)?;
            Ok(ColGroup::Ole(OleGroup::from_payload(
                base,
                CONFIG.compression.bitmap_block_sz,
            )))
        }
        TAG_RLE => {
            let base = read_bitmap_payload(r, cols, num_rows)?;
            Ok(ColGroup::Rle(RleGroup::from_payload(base)))
        }
        other => Err(FormatError::UnknownTag(other)),
    }
}

fn read_bitmap_payload(
    r: &mut LeSliceReader,
    cols: Vec<u32>,
    num_rows: usize,
) -> Result<BitmapPayload, FormatError> {
    let num_tuples = r.read_u32().ok_or(FormatError::Truncated("tuple count"))? as usize;
    let value_count = num_tuples * cols.len();
    if value_count as u64 * 8 > r.remaining() as u64 {
        return Err(FormatError::Truncated("values table"));
    }
    let mut values = Vec::with_capacity(value_count);
    for _ in 0..value_count {
        values.push(r.read_f64().ok_or(FormatError::Truncated("tuple value"))?);
    }
    let mut ptr = Vec::with_capacity(num_tuples + 1);
    for _ in 0..num_tuples + 1 {
        ptr.push(r.read_u32().ok_or(FormatError::Truncated("tuple pointer"))?);
    }
    let data_len = r.read_u32().ok_or(FormatError::Truncated("data length"))? as usize;
    if data_len as u64 * 2 > r.remaining() as u64 {
        return Err(FormatError::Truncated("offset data"));
    }
    let mut data = Vec::with_capacity(data_len);
    for _ in 0..data_len {
        data.push(r.read_u16().ok_or(FormatError::Truncated("offset word"))?);
    }
    // pointer index must stay inside the data array and ascend
    if ptr.first() != Some(&0)
        || ptr.last().map(|p| *p as usize) != Some(data.len())
        || ptr.windows(2).any(|w| w[0] > w[1])
    {
        return Err(FormatError::Truncated("tuple pointer index"));
    }
    Ok(BitmapPayload {
        cols,
        num_rows,
        values,
        data,
        ptr,
    })
}
