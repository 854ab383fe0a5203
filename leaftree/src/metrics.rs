use lazy_static::lazy_static;
use prometheus::{exponential_buckets, Histogram, HistogramOpts, IntCounter, Opts, Registry};

lazy_static! {
    pub static ref LEAF_PUT_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("leaf_put_time", "Complete time to store leafs",)
            .namespace("leaftree")
            .buckets(exponential_buckets(0.00001, 2.0, 17).unwrap()),
    )
    .unwrap();
    pub static ref LEAF_GET_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("leaf_get_time", "Complete time to fetch leafs",)
            .namespace("leaftree")
            .buckets(exponential_buckets(0.00001, 2.0, 17).unwrap()),
    )
    .unwrap();
    pub static ref LEAF_PUT_SIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("leaf_put_size", "Size of leafs being written",)
            .namespace("leaftree")
            .buckets(exponential_buckets(64.0, 2.0, 16).unwrap()),
    )
    .unwrap();
    pub static ref LEAF_PRUNED: IntCounter = IntCounter::with_opts(
        Opts::new("leaf_pruned", "Number of leafs deleted by pruning").namespace("leaftree"),
    )
    .unwrap();
    pub static ref MMAP_SIZE_HIST: Histogram = Histogram::with_opts(
        HistogramOpts::new("mmap_size", "Size of files being mapped",)
            .namespace("leaftree")
            .buckets(exponential_buckets(64.0, 4.0, 16).unwrap()),
    )
    .unwrap();
    pub static ref MMAP_REJECTED: IntCounter = IntCounter::with_opts(
        Opts::new("mmap_rejected", "Number of files rejected for exceeding the size limit")
            .namespace("leaftree"),
    )
    .unwrap();
}

/// register all leaftree metrics with the given registry
pub fn register_metrics(registry: &Registry) -> crate::Result<()> {
    registry.register(Box::new(LEAF_PUT_HIST.clone()))?;
    registry.register(Box::new(LEAF_GET_HIST.clone()))?;
    registry.register(Box::new(LEAF_PUT_SIZE_HIST.clone()))?;
    registry.register(Box::new(LEAF_PRUNED.clone()))?;
    registry.register(Box::new(MMAP_SIZE_HIST.clone()))?;
    registry.register(Box::new(MMAP_REJECTED.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_once() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();
        // same collectors twice is an error
        assert!(register_metrics(&registry).is_err());
    }
}
