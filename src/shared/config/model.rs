use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub compression: CompressionConfig,
    pub parallel: ParallelConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Above this many compressible columns, co-coding is skipped and
    /// singleton groups are emitted.
    pub max_cocoding: usize,
    /// Minimum uncompressed/compressed ratio before a column or group is
    /// kept in bitmap form.
    pub min_compression_ratio: f64,
    /// OLE size / RLE size must exceed this before RLE wins.
    pub min_rle_ratio: f64,
    /// Rows per OLE segment; also the row alignment of parallel tasks.
    pub bitmap_block_sz: usize,
    pub transpose_input: bool,
    /// Emit all-zero tuples into bitmaps instead of treating zero as the
    /// implicit background.
    pub materialize_zeros: bool,
    /// Serialized-size gate below which unary aggregates stay single-threaded.
    pub min_par_agg_threshold: u64,
    pub sample_fraction: f64,
    pub sample_min_rows: usize,
    pub sample_seed: u64,
    /// Co-coding bin capacity in dense-column-byte equivalents.
    pub bin_capacity_factor: f64,
    /// Ceiling on the estimated joint cardinality of a co-coded group.
    pub max_group_cardinality: u64,
    /// Columns whose estimated non-zero row coverage falls below this stay
    /// out of co-coding; thin columns rarely overlap enough to amortise the
    /// shared tuple overhead.
    pub cocode_min_coverage: f64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_cocoding: 1000,
            min_compression_ratio: 2.0,
            min_rle_ratio: 1.0,
            bitmap_block_sz: 65536,
            transpose_input: true,
            materialize_zeros: false,
            min_par_agg_threshold: 16 * 1024 * 1024,
            sample_fraction: 0.05,
            sample_min_rows: 2048,
            sample_seed: 7919,
            bin_capacity_factor: 32.0,
            max_group_cardinality: 65536,
            cocode_min_coverage: 0.7,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ParallelConfig {
    /// Worker count for parallel kernels; None means host parallelism.
    pub worker_threads: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: String,
    pub stdout_level: String,
    pub file_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            stdout_level: "info".to_string(),
            file_level: "debug".to_string(),
        }
    }
}

pub fn load_settings() -> Result<Settings, config::ConfigError> {
    let config_path = env::var("KRIMP_CONFIG").unwrap_or_else(|_| "config".to_string());

    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(&config_path).required(false))
        .build()?
        .try_deserialize()?;

    Ok(settings)
}
