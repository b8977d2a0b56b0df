pub mod agent;
pub mod core;
pub mod data;
