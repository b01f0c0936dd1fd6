pub mod audio;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod exercises;
pub mod handlers;
pub mod llm;
pub mod planning;
pub mod srs;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod testing;
