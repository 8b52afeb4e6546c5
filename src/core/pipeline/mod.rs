pub mod compiling;
pub mod dispatch;
pub mod running;
pub mod session;
