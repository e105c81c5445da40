use std::fmt;
use strum_macros::Display;

/// A 1-based location in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Position {
        Position { row, column }
    }
}

impl Default for Position {
    fn default() -> Position {
        Position { row: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

#[rustfmt::skip]
#[derive(Debug, Clone, PartialEq, Display)]
pub enum TokenType {
    // Type keywords.
    #[strum(serialize = "'Integer'")] IntegerType,
    #[strum(serialize = "'Double'")] DoubleType,
    #[strum(serialize = "'Boolean'")] BooleanType,
    #[strum(serialize = "'String'")] StringType,
    #[strum(serialize = "'Void'")] VoidType,

    // Control keywords.
    #[strum(serialize = "'if'")] If,
    #[strum(serialize = "'else'")] Else,
    #[strum(serialize = "'class'")] Class,
    #[strum(serialize = "'return'")] Return,
    #[strum(serialize = "'while'")] While,
    #[strum(serialize = "'true'")] True,
    #[strum(serialize = "'false'")] False,

    // Punctuation.
    #[strum(serialize = "'{'")] LeftBrace,
    #[strum(serialize = "'}'")] RightBrace,
    #[strum(serialize = "'('")] LeftParen,
    #[strum(serialize = "')'")] RightParen,
    #[strum(serialize = "','")] Comma,
    #[strum(serialize = "'.'")] Dot,
    #[strum(serialize = "';'")] Semicolon,

    // Operators.
    #[strum(serialize = "'+'")] Plus,
    #[strum(serialize = "'-'")] Minus,
    #[strum(serialize = "'*'")] Star,
    #[strum(serialize = "'/'")] Slash,
    #[strum(serialize = "'|'")] Pipe,
    #[strum(serialize = "'&'")] Ampersand,
    #[strum(serialize = "'!'")] Bang,
    #[strum(serialize = "'<'")] Less,
    #[strum(serialize = "'<='")] LessEqual,
    #[strum(serialize = "'>'")] Greater,
    #[strum(serialize = "'>='")] GreaterEqual,
    #[strum(serialize = "'=='")] EqualEqual,
    #[strum(serialize = "'!='")] BangEqual,
    #[strum(serialize = "'='")] Equal,

    // Literals.
    #[strum(serialize = "identifier")] Identifier(String),
    #[strum(serialize = "integer literal")] Integer(i64),
    #[strum(serialize = "double literal")] Double { int_part: i64, decimal: i64, denominator: u32 },
    #[strum(serialize = "string literal")] String(String),

    #[strum(serialize = "end of text")] EOT
}

impl TokenType {
    /// True for the keywords that name a value type (everything but `Void`).
    pub fn is_parameter_type(&self) -> bool {
        match self {
            TokenType::IntegerType
            | TokenType::DoubleType
            | TokenType::BooleanType
            | TokenType::StringType => true,
            _ => false,
        }
    }

    /// Parameter types plus `Void`, i.e. what may precede a function name.
    pub fn is_function_type(&self) -> bool {
        match self {
            TokenType::VoidType => true,
            other => other.is_parameter_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tokentype: TokenType,
    pub lexeme: String,
    pub start: Position,
    pub end: Position,
}

impl Token {
    /// What a diagnostic should call this token.
    pub fn describe(&self) -> String {
        match self.tokentype {
            TokenType::EOT => self.tokentype.to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}
