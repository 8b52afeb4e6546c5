pub mod adapters;
pub mod api;
pub mod compare;
pub mod config;
pub mod constants;
pub mod core;
pub mod generator;
pub mod native;
pub mod problem;

#[cfg(test)]
mod stubs;
