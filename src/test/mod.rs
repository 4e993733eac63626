mod config;
mod extraction;
mod flashcards;
mod sessions;
pub mod utils;

pub use utils::test_utils;
