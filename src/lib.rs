pub mod aggregate;
pub mod config;
pub mod date;
pub mod grid;
pub mod model;
pub mod ribbon;
pub mod sentiment;
pub mod store;
pub mod summarizer;
