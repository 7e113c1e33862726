pub mod engine;
pub mod outcome;

pub use engine::Converter;
pub use outcome::{FileReport, Outcome};
