//! Concrete embedding providers.

pub mod hashing;
pub mod ollama;
