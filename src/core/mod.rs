pub mod configure;
pub mod log;
pub mod session;
pub mod sync;
