use crate::shared::config::CompressionConfig;

/// Phase-1 record for one compressible column.
#[derive(Clone, Copy, Debug)]
pub struct ColumnInfo {
    pub col: u32,
    pub est_cardinality: usize,
    pub est_size: u64,
    pub ratio: f64,
    /// Estimated fraction of rows with a non-zero value.
    pub coverage: f64,
}

struct Bin {
    cols: Vec<u32>,
    load: f64,
    cardinality: f64,
}

/// Partitions compressible columns into candidate co-coded groups by bin
/// packing: columns sorted by estimated size descending (ties on ascending
/// column index), bins bounded by a byte capacity proportional to
/// `num_rows * sparsity` and by a joint-cardinality ceiling on the product
/// of member cardinalities. Emitted groups carry sorted column indices.
pub fn plan_cocoding(
    columns: &[ColumnInfo],
    num_rows: usize,
    sparsity: f64,
    cfg: &CompressionConfig,
) -> Vec<Vec<u32>> {
    // thin columns go straight to singleton groups
    let mut groups: Vec<Vec<u32>> = columns
        .iter()
        .filter(|c| c.coverage < cfg.cocode_min_coverage)
        .map(|c| vec![c.col])
        .collect();

    let mut order: Vec<&ColumnInfo> = columns
        .iter()
        .filter(|c| c.coverage >= cfg.cocode_min_coverage)
        .collect();
    order.sort_by(|a, b| {
        b.est_size
            .cmp(&a.est_size)
            .then_with(|| a.col.cmp(&b.col))
    });

    let capacity = cfg.bin_capacity_factor * num_rows as f64 * sparsity.max(f64::MIN_POSITIVE);
    let ceiling = cfg.max_group_cardinality as f64;

    let mut bins: Vec<Bin> = Vec::new();
    for info in order {
        let card = info.est_cardinality.max(1) as f64;
        let size = info.est_size as f64;
        let fit = bins.iter_mut().find(|b| {
            b.load + size <= capacity && b.cardinality * card <= ceiling
        });
        match fit {
            Some(bin) => {
                bin.cols.push(info.col);
                bin.load += size;
                bin.cardinality *= card;
            }
            None => bins.push(Bin {
                cols: vec![info.col],
                load: size,
                cardinality: card,
            }),
        }
    }

    groups.extend(bins.into_iter().map(|mut b| {
        b.cols.sort_unstable();
        b.cols
    }));
    groups
}
