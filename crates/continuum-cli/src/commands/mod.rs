pub mod config;
pub mod import;
pub mod scan;
pub mod sessions;
pub mod utils;
