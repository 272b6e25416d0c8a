pub mod cache;
pub mod tree;
