pub mod catalog;
pub mod cli;
pub mod config;
pub mod load_config;
pub mod pipeline;
pub mod retention;
pub mod s3;
pub mod store;
pub mod upload;
