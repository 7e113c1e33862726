pub mod error;
pub mod expr;
pub mod keywords;
pub mod transform;
pub mod vars;

pub use error::{ParseError, ParseErrorKind};
pub use expr::Evaluator;
pub use keywords::{Directive, KeywordRegistry, Keywords};
pub use transform::Preprocessor;
pub use vars::Variables;
