pub mod adapter;
pub mod problem;
