pub mod config;
pub mod exec;
pub mod frontend;
pub mod log;
pub mod top;
pub mod trace;
