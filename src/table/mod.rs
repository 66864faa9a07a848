pub mod feature_table;
pub mod filter;
pub mod loader;
pub mod merge;
