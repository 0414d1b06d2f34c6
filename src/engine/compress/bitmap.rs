use std::collections::HashMap;

use crate::engine::block::MatrixBlock;

/// Read adapter over the planner's working copy of the input. The default
/// configuration transposes the input so a group column is a contiguous row
/// of the working block; the non-transposed orientation is kept as a
/// fallback for `transpose_input = false`.
#[derive(Clone, Copy)]
pub struct ColumnSource<'a> {
    block: &'a MatrixBlock,
    transposed: bool,
}

impl<'a> ColumnSource<'a> {
    pub fn transposed(block: &'a MatrixBlock) -> Self {
        Self {
            block,
            transposed: true,
        }
    }

    pub fn direct(block: &'a MatrixBlock) -> Self {
        Self {
            block,
            transposed: false,
        }
    }

    /// Logical row count of the original matrix.
    pub fn num_rows(&self) -> usize {
        if self.transposed {
            self.block.num_cols()
        } else {
            self.block.num_rows()
        }
    }

    pub fn num_cols(&self) -> usize {
        if self.transposed {
            self.block.num_rows()
        } else {
            self.block.num_cols()
        }
    }

    pub fn value(&self, col: u32, row: usize) -> f64 {
        if self.transposed {
            self.block.get(col as usize, row)
        } else {
            self.block.get(row, col as usize)
        }
    }

    fn sparse_transposed_row(&self, col: u32) -> Option<&'a [(u32, f64)]> {
        if self.transposed {
            self.block.sparse_row(col as usize)
        } else {
            None
        }
    }
}

/// Distinct non-zero value tuples of a column group, with the sorted row
/// offsets where each tuple occurs. Transient: consumed by the encoders and
/// dropped after compression.
#[derive(Clone, Debug)]
pub struct Bitmap {
    num_cols: usize,
    values: Vec<f64>,
    offsets: Vec<Vec<u32>>,
}

impl Bitmap {
    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn num_tuples(&self) -> usize {
        self.offsets.len()
    }

    pub fn tuple(&self, i: usize) -> &[f64] {
        &self.values[i * self.num_cols..(i + 1) * self.num_cols]
    }

    pub fn offsets(&self, i: usize) -> &[u32] {
        &self.offsets[i]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn total_hits(&self) -> u64 {
        self.offsets.iter().map(|o| o.len() as u64).sum()
    }

    pub fn tuple_nonzeros(&self, i: usize) -> usize {
        self.tuple(i).iter().filter(|v| **v != 0.0).count()
    }
}

// Zero normalisation: -0.0 keys as 0.0 so the implicit background follows
// IEEE equality; NaNs collapse by bit pattern.
fn key_bits(v: f64) -> u64 {
    if v == 0.0 { 0 } else { v.to_bits() }
}

/// Extracts the bitmap of a column group, scanning all rows or a sorted
/// subset. Rows are visited in ascending order so per-tuple offset lists
/// come out sorted; tuples are emitted in ascending lexicographic order of
/// their value vectors.
pub fn extract_bitmap(
    cols: &[u32],
    src: &ColumnSource,
    rows: Option<&[u32]>,
    materialize_zeros: bool,
) -> Bitmap {
    let width = cols.len();
    let mut index: HashMap<Vec<u64>, usize> = HashMap::new();
    let mut tuples: Vec<Vec<f64>> = Vec::new();
    let mut offsets: Vec<Vec<u32>> = Vec::new();

    let mut tuple = vec![0.0f64; width];
    let mut key = vec![0u64; width];

    // Cursor-based readers for the hot path: sparse transposed input, where
    // a group column is one sparse row of the working block.
    let cursors: Option<Vec<&[(u32, f64)]>> = cols
        .iter()
        .map(|c| src.sparse_transposed_row(*c))
        .collect();
    let mut cursor_pos = vec![0usize; width];

    let mut visit = |row: u32, tuple: &mut Vec<f64>, key: &mut Vec<u64>| {
        match &cursors {
            Some(rows_by_col) => {
                for (k, entries) in rows_by_col.iter().enumerate() {
                    let pos = &mut cursor_pos[k];
                    while *pos < entries.len() && entries[*pos].0 < row {
                        *pos += 1;
                    }
                    tuple[k] = if *pos < entries.len() && entries[*pos].0 == row {
                        entries[*pos].1
                    } else {
                        0.0
                    };
                }
            }
            None => {
                for (k, c) in cols.iter().enumerate() {
                    tuple[k] = src.value(*c, row as usize);
                }
            }
        }
        for k in 0..width {
            key[k] = key_bits(tuple[k]);
        }
        if !materialize_zeros && key.iter().all(|b| *b == 0) {
            return;
        }
        let next_ix = tuples.len();
        let ix = *index.entry(key.clone()).or_insert_with(|| {
            tuples.push(tuple.clone());
            offsets.push(Vec::new());
            next_ix
        });
        offsets[ix].push(row);
    };

    match rows {
        Some(sample) => {
            for row in sample {
                visit(*row, &mut tuple, &mut key);
            }
        }
        None => {
            for row in 0..src.num_rows() as u32 {
                visit(row, &mut tuple, &mut key);
            }
        }
    }

    // Deterministic tuple order: ascending lexicographic on value vectors.
    let mut order: Vec<usize> = (0..tuples.len()).collect();
    order.sort_by(|a, b| {
        tuples[*a]
            .iter()
            .zip(tuples[*b].iter())
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut values = Vec::with_capacity(tuples.len() * width);
    let mut sorted_offsets = Vec::with_capacity(offsets.len());
    for ix in order {
        values.extend_from_slice(&tuples[ix]);
        sorted_offsets.push(std::mem::take(&mut offsets[ix]));
    }

    Bitmap {
        num_cols: width,
        values,
        offsets: sorted_offsets,
    }
}
