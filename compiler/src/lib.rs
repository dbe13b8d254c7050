pub mod app;
pub mod core;
pub mod filters;
pub mod utils;
