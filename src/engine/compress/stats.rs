use std::time::Duration;

/// Wall-clock timings of the four planner phases plus the estimator's
/// predicted compressed size, kept for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct CompressionStats {
    pub time_classify: Duration,
    pub time_group: Duration,
    pub time_encode: Duration,
    pub time_finalize: Duration,
    pub est_size: f64,
}
