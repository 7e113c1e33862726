//! Comment-based conditional compilation for text source files.
//!
//! Directives such as `//#if cond` select which blocks of a file stay
//! active; inactive code is commented out with an eval tag so the file can
//! be converted again under a different set of variables.

pub mod config;
pub mod converter;
pub mod output;
pub mod preprocessor;
pub mod remap;

pub use config::Config;
pub use converter::{Converter, FileReport, Outcome};
pub use preprocessor::{ParseError, ParseErrorKind};
