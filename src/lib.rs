pub mod config;
pub mod describe;
pub mod display;
pub mod enumerate;
pub mod errors;
pub mod invoke;
pub mod orchestrate;
pub mod persist;
pub mod timing;
pub mod types;
