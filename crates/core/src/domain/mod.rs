pub mod catalog;
pub mod line;
pub mod plan;
