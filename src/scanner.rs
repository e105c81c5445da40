use crate::token::{Position, Token, TokenType};
use phf::phf_map;
use std::iter::Peekable;
use std::str::CharIndices;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("[{position}] Error: Unexpected character '{character}'.")]
    UnexpectedCharacter { character: char, position: Position },
    #[error("[{position}] Error: Unterminated string.")]
    UnterminatedString { position: Position },
    #[error("[{position}] Error: Identifier is {length} characters long, the limit is {limit}.")]
    IdentifierTooLong {
        length: usize,
        limit: usize,
        position: Position,
    },
    #[error("[{position}] Error: String literal is {length} characters long, the limit is {limit}.")]
    StringTooLong {
        length: usize,
        limit: usize,
        position: Position,
    },
    #[error("[{position}] Error: Invalid number literal '{literal}'.")]
    InvalidNumber { literal: String, position: Position },
}

/// Length limits enforced while tokenizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    pub max_identifier_length: usize,
    pub max_string_length: usize,
}

impl Default for ScanLimits {
    fn default() -> ScanLimits {
        ScanLimits {
            max_identifier_length: 64,
            max_string_length: 256,
        }
    }
}

pub struct Scanner<'a> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    start: usize,
    start_position: Position,
    position: Position,
    limits: ScanLimits,
}

/// Tokenizes the whole source. The returned stream always ends with `EOT`.
pub fn scan_tokens(source: &str, limits: ScanLimits) -> Result<Vec<Token>, ScanError> {
    let mut scanner = Scanner::new(source, limits);
    let mut tokens: Vec<Token> = Vec::new();
    loop {
        let token = scanner.next_token()?;
        let done = token.tokentype == TokenType::EOT;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str, limits: ScanLimits) -> Scanner<'a> {
        Scanner {
            source,
            iter: source.char_indices().peekable(),
            start: 0,
            start_position: Position::default(),
            position: Position::default(),
            limits,
        }
    }

    /// Produces the next token, or `EOT` once the input is exhausted.
    pub fn next_token(&mut self) -> Result<Token, ScanError> {
        self.skip_ignorable();
        self.start = self.current();
        self.start_position = self.position;
        let c = match self.advance() {
            None => return Ok(self.token(TokenType::EOT)),
            Some(c) => c,
        };
        match c {
            '{' => Ok(self.token(TokenType::LeftBrace)),
            '}' => Ok(self.token(TokenType::RightBrace)),
            '(' => Ok(self.token(TokenType::LeftParen)),
            ')' => Ok(self.token(TokenType::RightParen)),
            ',' => Ok(self.token(TokenType::Comma)),
            '.' => Ok(self.token(TokenType::Dot)),
            ';' => Ok(self.token(TokenType::Semicolon)),
            '+' => Ok(self.token(TokenType::Plus)),
            '-' => Ok(self.token(TokenType::Minus)),
            '*' => Ok(self.token(TokenType::Star)),
            '/' => Ok(self.token(TokenType::Slash)),
            '|' => Ok(self.token(TokenType::Pipe)),
            '&' => Ok(self.token(TokenType::Ampersand)),
            '!' => {
                if self.next_if('=') {
                    Ok(self.token(TokenType::BangEqual))
                } else {
                    Ok(self.token(TokenType::Bang))
                }
            }
            '=' => {
                if self.next_if('=') {
                    Ok(self.token(TokenType::EqualEqual))
                } else {
                    Ok(self.token(TokenType::Equal))
                }
            }
            '<' => {
                if self.next_if('=') {
                    Ok(self.token(TokenType::LessEqual))
                } else {
                    Ok(self.token(TokenType::Less))
                }
            }
            '>' => {
                if self.next_if('=') {
                    Ok(self.token(TokenType::GreaterEqual))
                } else {
                    Ok(self.token(TokenType::Greater))
                }
            }
            '"' => self.string(),
            '0'..='9' => self.number(c),
            'a'..='z' | 'A'..='Z' | '_' => self.identifier(),
            _ => Err(ScanError::UnexpectedCharacter {
                character: c,
                position: self.start_position,
            }),
        }
    }

    // Whitespace, newlines and `//` comments never reach the parser.
    fn skip_ignorable(&mut self) {
        loop {
            match self.peek() {
                Some(' ') | Some('\t') | Some('\r') | Some('\n') => {
                    self.advance();
                }
                Some('/') if self.peek_next() == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    /// Byte offset of the next unread character.
    fn current(&mut self) -> usize {
        match self.iter.peek() {
            None => self.source.len(),
            Some((idx, _)) => *idx,
        }
    }

    fn token(&mut self, tokentype: TokenType) -> Token {
        let current = self.current();
        Token {
            tokentype,
            lexeme: self.source[self.start..current].to_string(),
            start: self.start_position,
            end: self.position,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.iter.peek().map(|(_, c)| *c)
    }

    fn peek_next(&self) -> Option<char> {
        let mut lookahead = self.iter.clone();
        lookahead.next();
        lookahead.peek().map(|(_, c)| *c)
    }

    fn next_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            return true;
        }
        false
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.iter.next()?;
        if c == '\n' {
            self.position.row += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        Some(c)
    }

    fn string(&mut self) -> Result<Token, ScanError> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(ScanError::UnterminatedString {
                        position: self.start_position,
                    })
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('"') => value.push('"'),
                        Some('\\') => value.push('\\'),
                        Some(other) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => {
                            return Err(ScanError::UnterminatedString {
                                position: self.start_position,
                            })
                        }
                    }
                }
                Some(c) => {
                    self.advance();
                    value.push(c);
                }
            }
        }
        let length = value.chars().count();
        if length > self.limits.max_string_length {
            return Err(ScanError::StringTooLong {
                length,
                limit: self.limits.max_string_length,
                position: self.start_position,
            });
        }
        Ok(self.token(TokenType::String(value)))
    }

    fn digits(&mut self) -> String {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    digits.push(c);
                    self.advance();
                }
                _ => break,
            }
        }
        digits
    }

    fn number(&mut self, first: char) -> Result<Token, ScanError> {
        let mut int_digits = first.to_string();
        int_digits.push_str(&self.digits());

        let mut decimal_digits: Option<String> = None;
        if self.peek() == Some('.') {
            if let Some('0'..='9') = self.peek_next() {
                self.advance();
                decimal_digits = Some(self.digits());
            }
        }

        // `012` and `12abc` are both rejected, as is anything that overflows.
        let trailing_word = match self.peek() {
            Some(c) => c.is_ascii_alphanumeric() || c == '_',
            None => false,
        };
        let leading_zero = int_digits.len() > 1 && int_digits.starts_with('0');
        if trailing_word || leading_zero {
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    self.advance();
                } else {
                    break;
                }
            }
            return Err(self.invalid_number());
        }

        let int_part: i64 = int_digits.parse().map_err(|_| self.invalid_number())?;
        match decimal_digits {
            None => Ok(self.token(TokenType::Integer(int_part))),
            Some(digits) => {
                let decimal: i64 = digits.parse().map_err(|_| self.invalid_number())?;
                Ok(self.token(TokenType::Double {
                    int_part,
                    decimal,
                    denominator: digits.len() as u32,
                }))
            }
        }
    }

    fn invalid_number(&mut self) -> ScanError {
        let current = self.current();
        ScanError::InvalidNumber {
            literal: self.source[self.start..current].to_string(),
            position: self.start_position,
        }
    }

    fn identifier(&mut self) -> Result<Token, ScanError> {
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | 'a'..='z' | 'A'..='Z' | '_' => {
                    self.advance();
                }
                _ => break,
            }
        }
        let current = self.current();
        let source = self.source;
        let text = &source[self.start..current];
        match KEYWORDS.get(text) {
            Some(keyword) => Ok(self.token(keyword.clone())),
            None => {
                if text.len() > self.limits.max_identifier_length {
                    return Err(ScanError::IdentifierTooLong {
                        length: text.len(),
                        limit: self.limits.max_identifier_length,
                        position: self.start_position,
                    });
                }
                let name = text.to_string();
                Ok(self.token(TokenType::Identifier(name)))
            }
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "Integer" => TokenType::IntegerType,
    "Double" => TokenType::DoubleType,
    "Boolean" => TokenType::BooleanType,
    "String" => TokenType::StringType,
    "Void" => TokenType::VoidType,
    "if" => TokenType::If,
    "else" => TokenType::Else,
    "class" => TokenType::Class,
    "return" => TokenType::Return,
    "while" => TokenType::While,
    "true" => TokenType::True,
    "false" => TokenType::False,
};

#[cfg(test)]
mod scanner_tests {
    use crate::scanner::{scan_tokens, ScanError, ScanLimits, Scanner};
    use crate::token::{Position, TokenType};

    fn types(source: &str) -> Vec<TokenType> {
        scan_tokens(source, ScanLimits::default())
            .unwrap()
            .into_iter()
            .map(|t| t.tokentype)
            .collect()
    }

    #[test]
    fn basic_scanner_test() {
        let tokens = scan_tokens("x = 2;", ScanLimits::default()).unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0].tokentype, TokenType::Identifier("x".to_string()));
        assert_eq!(tokens[1].tokentype, TokenType::Equal);
        assert_eq!(tokens[2].tokentype, TokenType::Integer(2));
        assert_eq!(tokens[3].tokentype, TokenType::Semicolon);
        assert_eq!(tokens[4].tokentype, TokenType::EOT);
    }

    #[test]
    fn keywords_and_operators() {
        assert_eq!(
            types("Integer Void class while <= >= == != ! & | ="),
            vec![
                TokenType::IntegerType,
                TokenType::VoidType,
                TokenType::Class,
                TokenType::While,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::EqualEqual,
                TokenType::BangEqual,
                TokenType::Bang,
                TokenType::Ampersand,
                TokenType::Pipe,
                TokenType::Equal,
                TokenType::EOT,
            ]
        );
        // Keywords are matched whole, not as prefixes.
        assert_eq!(
            types("Integers iff"),
            vec![
                TokenType::Identifier("Integers".to_string()),
                TokenType::Identifier("iff".to_string()),
                TokenType::EOT,
            ]
        );
    }

    #[test]
    fn double_literal_keeps_digits_apart() {
        assert_eq!(
            types("3.05 10.5"),
            vec![
                TokenType::Double {
                    int_part: 3,
                    decimal: 5,
                    denominator: 2
                },
                TokenType::Double {
                    int_part: 10,
                    decimal: 5,
                    denominator: 1
                },
                TokenType::EOT,
            ]
        );
    }

    #[test]
    fn member_access_is_not_a_double() {
        assert_eq!(
            types("a.b 1.x"),
            vec![
                TokenType::Identifier("a".to_string()),
                TokenType::Dot,
                TokenType::Identifier("b".to_string()),
                TokenType::Integer(1),
                TokenType::Dot,
                TokenType::Identifier("x".to_string()),
                TokenType::EOT,
            ]
        );
    }

    #[test]
    fn comments_and_newlines_are_skipped() {
        let tokens = scan_tokens("// nothing here\n  x // trailing\ny", ScanLimits::default())
            .unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].start, Position::new(2, 3));
        assert_eq!(tokens[0].end, Position::new(2, 4));
        assert_eq!(tokens[1].start, Position::new(3, 1));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            types(r#""say \"hi\"\n""#),
            vec![TokenType::String("say \"hi\"\n".to_string()), TokenType::EOT]
        );
    }

    #[test]
    fn eot_repeats() {
        let mut scanner = Scanner::new("", ScanLimits::default());
        assert_eq!(scanner.next_token().unwrap().tokentype, TokenType::EOT);
        assert_eq!(scanner.next_token().unwrap().tokentype, TokenType::EOT);
    }

    #[test]
    fn lexical_errors() {
        let limits = ScanLimits {
            max_identifier_length: 4,
            max_string_length: 3,
        };
        assert!(matches!(
            scan_tokens("abcde", limits),
            Err(ScanError::IdentifierTooLong { length: 5, limit: 4, .. })
        ));
        assert!(matches!(
            scan_tokens("\"abcd\"", limits),
            Err(ScanError::StringTooLong { length: 4, .. })
        ));
        assert!(matches!(
            scan_tokens("\"abc", limits),
            Err(ScanError::UnterminatedString { .. })
        ));
        assert_eq!(
            scan_tokens("x # y", limits),
            Err(ScanError::UnexpectedCharacter {
                character: '#',
                position: Position::new(1, 3)
            })
        );
        assert!(matches!(
            scan_tokens("012", limits),
            Err(ScanError::InvalidNumber { ref literal, .. }) if literal == "012"
        ));
        assert!(matches!(
            scan_tokens("12ab", limits),
            Err(ScanError::InvalidNumber { ref literal, .. }) if literal == "12ab"
        ));
        assert!(matches!(
            scan_tokens("99999999999999999999", limits),
            Err(ScanError::InvalidNumber { .. })
        ));
    }
}
