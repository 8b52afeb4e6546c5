/// Native module contains the process limiter, built directly on
/// setrlimit, process groups and procfs instead of containers.
pub mod identity;
pub mod limiter;
pub mod procfs;
pub mod rlimits;
