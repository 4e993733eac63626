pub mod academic;
pub mod flashcard;
pub mod learning_path;
pub mod material;
pub mod practice;
pub mod question;
pub mod student;

pub use academic::*;
pub use flashcard::*;
pub use learning_path::*;
pub use material::*;
pub use practice::*;
pub use question::*;
pub use student::*;
pub use test::*;

/// Parses a JSON column, falling back to the empty value for malformed rows.
pub(crate) fn json_column<T>(raw: Option<String>) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    raw.and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}
