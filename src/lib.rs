pub mod base;
pub mod collector;
pub mod sim;
pub mod utils;
pub mod workload;
