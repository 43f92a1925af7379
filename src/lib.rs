pub mod actors;
pub mod config;
pub mod learning;
pub mod pipeline;
pub mod random;
pub mod sink;
pub mod util;
