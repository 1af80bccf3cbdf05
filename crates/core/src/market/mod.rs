pub mod aggregator;
pub mod detector;
pub mod summary;
pub mod targeting;

pub use aggregator::{MetricAggregator, MetricReading, MetricTrend, SegmentKey, SegmentMetrics};
pub use detector::{signal_id, SignalDetector, SignalDetectorConfig, TrendDirection, TrendReading};
pub use summary::{PortalInventory, SegmentSummaryInput, SummaryCompiler, DEFAULT_MAX_SUMMARY_CHARS};
pub use targeting::SignalRouter;
