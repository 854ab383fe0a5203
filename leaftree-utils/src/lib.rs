pub mod dump;
pub mod file_store;
pub mod random;
