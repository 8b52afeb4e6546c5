pub mod adapter;
pub mod comparator;
pub mod limiter;
