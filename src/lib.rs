pub mod ast;
pub mod callable;
pub mod environment;
pub mod instance;
pub mod interpreter;
pub mod parser;
pub mod scanner;
pub mod token;
pub mod value;

pub use crate::ast::Program;
pub use crate::interpreter::{interpret, Interpreter, InterpreterConfig, RuntimeError};
pub use crate::parser::ParseError;
pub use crate::scanner::{ScanError, ScanLimits};
pub use crate::value::Value;

use thiserror::Error;

/// Any failure between source text and a finished run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Scans and parses a whole program.
pub fn parse_source(source: &str, limits: ScanLimits) -> Result<Program, Error> {
    let tokens = scanner::scan_tokens(source, limits)?;
    Ok(parser::parse(&tokens)?)
}

#[cfg(test)]
mod lib_tests {
    use crate::{parse_source, Error, ScanLimits};

    #[test]
    fn errors_keep_their_stage() {
        let limits = ScanLimits::default();
        assert!(matches!(parse_source("{ # }", limits), Err(Error::Scan(_))));
        assert!(matches!(parse_source("{ Void }", limits), Err(Error::Parse(_))));
        assert!(parse_source("{ Void main() { } }", limits).is_ok());
    }

    #[test]
    fn error_messages_are_passed_through() {
        let err = parse_source("{ Void main() { x + 1; } }", ScanLimits::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "[1:19] Parse Error: expected '(' or '=' after a name, found '+'"
        );
    }
}
