pub mod benchmark;
pub mod benchmark_utils;
pub mod config;
pub mod dispatch;
pub mod extract;
pub mod generator;
pub mod instance;
pub mod report;
pub mod store;
