pub mod duplicates;
pub mod statistics;
