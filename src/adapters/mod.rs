pub mod c;
pub mod cpp;
pub mod java;
pub mod javascript;
pub mod python;
pub mod registry;
pub mod toolchain;

pub use registry::AdapterRegistry;
pub use toolchain::{NativeAdapter, Toolchain};
