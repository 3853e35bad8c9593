/// Internal modules for the bitcoin-feerate-estimator library.
/// These are implementation details and should not be used directly by library consumers.
pub(crate) mod quantile_projector;
pub(crate) mod sliding_window;
pub(crate) mod stats;
pub(crate) mod trend_tracker;

// Re-export for internal use only
pub(crate) use quantile_projector::QuantileProjector;
pub(crate) use sliding_window::SlidingWindow;
pub(crate) use trend_tracker::TrendTracker;
