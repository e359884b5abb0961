pub mod funnel;
pub mod percentile;
