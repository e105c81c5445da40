use crate::ast::{
    BinaryOperator, Class, DeclaredType, Expression, FunctionDef, InitStat, LogicalOperator,
    Parameter, Program, Reference, RelationalOperator, Statement,
};
use crate::token::{Position, Token, TokenType};
use std::mem;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{position}] Parse Error: expected {expected}, found {found}")]
pub struct ParseError {
    pub found: String,
    pub expected: String,
    pub position: Position,
}

// Stands in for a missing end-of-text token so `peek` never runs off the end.
static END_OF_TEXT: Token = Token {
    tokentype: TokenType::EOT,
    lexeme: String::new(),
    start: Position { row: 1, column: 1 },
    end: Position { row: 1, column: 1 },
};

/// Parses a complete token stream into a `Program`.
pub fn parse(tokens: &[Token]) -> Result<Program, ParseError> {
    Parser::new(tokens).parse()
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    program: Program,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Parser<'a> {
        Parser {
            tokens,
            current: 0,
            program: Program::default(),
        }
    }

    pub fn parse(mut self) -> Result<Program, ParseError> {
        self.consume(TokenType::LeftBrace, "'{' opening the program")?;
        loop {
            if self.starts_declaration(true) {
                self.function_definition()?;
                continue;
            }
            match self.peek().tokentype {
                TokenType::Class => {
                    self.advance();
                    self.class_definition()?;
                }
                _ => break,
            }
        }
        self.consume(TokenType::RightBrace, "'}' closing the program")?;
        match self.peek().tokentype {
            TokenType::EOT => Ok(self.program),
            _ => Err(self.error("end of text after the program")),
        }
    }

    fn function_definition(&mut self) -> Result<(), ParseError> {
        let return_type = self.declared_type(true)?;
        let name_token = self.peek();
        let name = self.identifier("function name")?;
        if self.program.functions.contains_key(&name) {
            return Err(redefinition(name_token, "function"));
        }
        let function = self.rest_of_function(return_type, name)?;
        self.program
            .functions
            .insert(function.name.clone(), function);
        Ok(())
    }

    fn rest_of_function(
        &mut self,
        return_type: DeclaredType,
        name: String,
    ) -> Result<FunctionDef, ParseError> {
        self.consume(TokenType::LeftParen, "'(' after function name")?;
        let params = self.parameters()?;
        self.consume(TokenType::RightParen, "')' after parameters")?;
        let body = self.block()?;
        Ok(FunctionDef {
            return_type,
            name,
            params,
            body,
        })
    }

    fn parameters(&mut self) -> Result<Vec<Parameter>, ParseError> {
        let mut params = Vec::new();
        if self.check(&TokenType::RightParen) {
            return Ok(params);
        }
        loop {
            params.push(self.parameter()?);
            if !self.matches(&TokenType::Comma) {
                return Ok(params);
            }
        }
    }

    fn parameter(&mut self) -> Result<Parameter, ParseError> {
        let declared_type = match self.peek().tokentype {
            TokenType::Identifier(_) => self.declared_type(false)?,
            ref t if t.is_parameter_type() => self.declared_type(false)?,
            _ => return Err(self.error("parameter type")),
        };
        let by_reference = self.matches(&TokenType::Star);
        let name = self.identifier("parameter name")?;
        Ok(Parameter {
            declared_type,
            name,
            by_reference,
        })
    }

    fn class_definition(&mut self) -> Result<(), ParseError> {
        let name_token = self.peek();
        let name = self.identifier("class name")?;
        if self.program.classes.contains_key(&name) {
            return Err(redefinition(name_token, "class"));
        }
        self.consume(TokenType::LeftBrace, "'{' opening the class body")?;

        let mut member_variables: Vec<InitStat> = Vec::new();
        let mut member_methods: Vec<FunctionDef> = Vec::new();
        while self.starts_declaration(true) {
            let member_type = self.declared_type(true)?;
            let member_token = self.peek();
            let member_name = self.identifier("member name")?;
            let taken = member_variables.iter().any(|v| v.name == member_name)
                || member_methods.iter().any(|m| m.name == member_name);
            if taken {
                return Err(redefinition(member_token, "member"));
            }
            match self.peek().tokentype {
                TokenType::LeftParen => {
                    member_methods.push(self.rest_of_function(member_type, member_name)?);
                }
                _ => {
                    let member = self.rest_of_init(member_type, member_name)?;
                    self.consume(TokenType::Semicolon, "';' after member declaration")?;
                    member_variables.push(member);
                }
            }
        }

        self.consume(TokenType::RightBrace, "'}' closing the class body")?;
        self.program.classes.insert(
            name.clone(),
            Class {
                name,
                member_variables,
                member_methods,
            },
        );
        Ok(())
    }

    fn rest_of_init(
        &mut self,
        declared_type: DeclaredType,
        name: String,
    ) -> Result<InitStat, ParseError> {
        let initializer = if self.matches(&TokenType::Equal) {
            Some(self.or()?)
        } else {
            None
        };
        Ok(InitStat {
            declared_type,
            name,
            initializer,
        })
    }

    fn block(&mut self) -> Result<Vec<Statement>, ParseError> {
        self.consume(TokenType::LeftBrace, "'{' opening a block")?;
        let mut statements: Vec<Statement> = Vec::new();
        while let Some(statement) = self.block_instruction()? {
            statements.push(statement);
        }
        self.consume(TokenType::RightBrace, "'}' closing a block")?;
        Ok(statements)
    }

    /// One statement of a block, or `None` when nothing here starts one.
    fn block_instruction(&mut self) -> Result<Option<Statement>, ParseError> {
        match self.peek().tokentype {
            TokenType::If => {
                self.advance();
                self.if_statement().map(Some)
            }
            TokenType::While => {
                self.advance();
                self.while_statement().map(Some)
            }
            TokenType::Return => {
                self.advance();
                let value = self.or()?;
                self.consume(TokenType::Semicolon, "';' after return value")?;
                Ok(Some(Statement::Return(value)))
            }
            ref t if t.is_parameter_type() => self.init_statement().map(Some),
            TokenType::Identifier(_) => {
                if self.starts_declaration(false) {
                    self.init_statement().map(Some)
                } else {
                    self.assign_or_call().map(Some)
                }
            }
            TokenType::LeftBrace => Ok(Some(Statement::Block(self.block()?))),
            _ => Ok(None),
        }
    }

    fn if_statement(&mut self) -> Result<Statement, ParseError> {
        self.consume(TokenType::LeftParen, "'(' after 'if'")?;
        let condition = self.or()?;
        self.consume(TokenType::RightParen, "')' after if condition")?;
        let then_block = self.block()?;
        let else_block = if self.matches(&TokenType::Else) {
            Some(self.block()?)
        } else {
            None
        };
        Ok(Statement::IfElse {
            condition,
            then_block,
            else_block,
        })
    }

    fn while_statement(&mut self) -> Result<Statement, ParseError> {
        self.consume(TokenType::LeftParen, "'(' after 'while'")?;
        let condition = self.or()?;
        self.consume(TokenType::RightParen, "')' after while condition")?;
        let body = self.block()?;
        Ok(Statement::While { condition, body })
    }

    fn init_statement(&mut self) -> Result<Statement, ParseError> {
        let declared_type = self.declared_type(false)?;
        let name = self.identifier("variable name")?;
        let init = self.rest_of_init(declared_type, name)?;
        self.consume(TokenType::Semicolon, "';' after variable declaration")?;
        Ok(Statement::Init(init))
    }

    fn assign_or_call(&mut self) -> Result<Statement, ParseError> {
        let parent = self.identifier("identifier")?;
        let path = self.member_path()?;
        let target = if path.is_empty() {
            Reference::Variable(parent)
        } else {
            Reference::Member { parent, path }
        };
        match self.peek().tokentype {
            TokenType::LeftParen => {
                self.advance();
                let arguments = self.arguments()?;
                self.consume(TokenType::Semicolon, "';' after call")?;
                Ok(Statement::Call(Expression::FunctionCall {
                    name: target,
                    arguments,
                }))
            }
            TokenType::Equal => {
                self.advance();
                let value = self.or()?;
                self.consume(TokenType::Semicolon, "';' after assignment")?;
                Ok(Statement::Assign { target, value })
            }
            _ => Err(self.error("'(' or '=' after a name")),
        }
    }

    fn member_path(&mut self) -> Result<Vec<String>, ParseError> {
        let mut path = Vec::new();
        while self.matches(&TokenType::Dot) {
            path.push(self.identifier("member name after '.'")?);
        }
        Ok(path)
    }

    // Called with the opening parenthesis already consumed.
    fn arguments(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut arguments = Vec::new();
        if self.matches(&TokenType::RightParen) {
            return Ok(arguments);
        }
        loop {
            arguments.push(self.or()?);
            if !self.matches(&TokenType::Comma) {
                break;
            }
        }
        self.consume(TokenType::RightParen, "')' after arguments")?;
        Ok(arguments)
    }

    fn or(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.and()?;
        while self.matches(&TokenType::Pipe) {
            let right = self.and()?;
            expr = Expression::Logical {
                operator: LogicalOperator::Or,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn and(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.equality()?;
        while self.matches(&TokenType::Ampersand) {
            let right = self.equality()?;
            expr = Expression::Logical {
                operator: LogicalOperator::And,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    // Non-chaining: at most one `==` or `!=`.
    fn equality(&mut self) -> Result<Expression, ParseError> {
        let left = self.relational()?;
        let operator = match self.peek().tokentype {
            TokenType::EqualEqual => BinaryOperator::Equal,
            TokenType::BangEqual => BinaryOperator::NotEqual,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.relational()?;
        Ok(Expression::Binary {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn relational(&mut self) -> Result<Expression, ParseError> {
        match self.peek().tokentype {
            TokenType::True => {
                self.advance();
                return Ok(Expression::Boolean(true));
            }
            TokenType::False => {
                self.advance();
                return Ok(Expression::Boolean(false));
            }
            _ => (),
        }

        let negated = self.matches(&TokenType::Bang);
        let mut expr = self.additive()?;
        let operator = match self.peek().tokentype {
            TokenType::LessEqual => Some(RelationalOperator::LessEqual),
            TokenType::GreaterEqual => Some(RelationalOperator::GreaterEqual),
            TokenType::Less => Some(RelationalOperator::Less),
            TokenType::Greater => Some(RelationalOperator::Greater),
            _ => None,
        };
        if let Some(operator) = operator {
            self.advance();
            let right = self.additive()?;
            expr = Expression::Relational {
                operator,
                negated,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        if negated {
            expr = Expression::Not(Box::new(expr));
        }
        Ok(expr)
    }

    fn additive(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.multiplicative()?;
        loop {
            let operator = match self.peek().tokentype {
                TokenType::Plus => BinaryOperator::Add,
                TokenType::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.advance();
            let right = self.multiplicative()?;
            expr = Expression::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut expr = self.primary()?;
        loop {
            let operator = match self.peek().tokentype {
                TokenType::Star => BinaryOperator::Mul,
                TokenType::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.advance();
            let right = self.primary()?;
            expr = Expression::Binary {
                operator,
                left: Box::new(expr),
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expression, ParseError> {
        match &self.peek().tokentype {
            TokenType::Integer(x) => {
                self.advance();
                Ok(Expression::Integer(*x))
            }
            TokenType::Double {
                int_part,
                decimal,
                denominator,
            } => {
                self.advance();
                Ok(Expression::Float {
                    int_part: *int_part,
                    decimal: *decimal,
                    denominator: *denominator,
                })
            }
            TokenType::String(x) => {
                self.advance();
                Ok(Expression::String(x.clone()))
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.or()?;
                self.consume(TokenType::RightParen, "')' after expression")?;
                Ok(expr)
            }
            TokenType::Identifier(_) => self.reference_expression(),
            _ => Err(self.error("expression")),
        }
    }

    // Variable, object member, function call or object method call.
    fn reference_expression(&mut self) -> Result<Expression, ParseError> {
        let parent = self.identifier("identifier")?;
        let path = self.member_path()?;
        if self.matches(&TokenType::LeftParen) {
            let arguments = self.arguments()?;
            if path.is_empty() {
                return Ok(Expression::FunctionCall {
                    name: Reference::Variable(parent),
                    arguments,
                });
            }
            return Ok(Expression::ObjectMethod {
                parent,
                path,
                arguments,
            });
        }
        if path.is_empty() {
            Ok(Expression::Variable(parent))
        } else {
            Ok(Expression::ObjectVariable { parent, path })
        }
    }

    /// A type keyword, or a class name followed by the declared name.
    fn starts_declaration(&self, allow_void: bool) -> bool {
        match self.peek().tokentype {
            TokenType::Identifier(_) => match self.peek_next().tokentype {
                TokenType::Identifier(_) => true,
                _ => false,
            },
            ref t if allow_void => t.is_function_type(),
            ref t => t.is_parameter_type(),
        }
    }

    fn declared_type(&mut self, allow_void: bool) -> Result<DeclaredType, ParseError> {
        let declared = match &self.peek().tokentype {
            TokenType::IntegerType => DeclaredType::Integer,
            TokenType::DoubleType => DeclaredType::Double,
            TokenType::BooleanType => DeclaredType::Boolean,
            TokenType::StringType => DeclaredType::String,
            TokenType::VoidType if allow_void => DeclaredType::Void,
            TokenType::Identifier(name) => DeclaredType::Class(name.clone()),
            _ => return Err(self.error("type name")),
        };
        self.advance();
        Ok(declared)
    }

    fn identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        match &self.peek().tokentype {
            TokenType::Identifier(name) => {
                self.advance();
                Ok(name.clone())
            }
            _ => Err(self.error(expected)),
        }
    }

    fn consume(&mut self, tokentype: TokenType, expected: &str) -> Result<&'a Token, ParseError> {
        if self.check(&tokentype) {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn matches(&mut self, tokentype: &TokenType) -> bool {
        if self.check(tokentype) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, tokentype: &TokenType) -> bool {
        mem::discriminant(&self.peek().tokentype) == mem::discriminant(tokentype)
    }

    fn advance(&mut self) -> &'a Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        match self.peek().tokentype {
            TokenType::EOT => true,
            _ => false,
        }
    }

    fn peek(&self) -> &'a Token {
        self.tokens.get(self.current).unwrap_or(&END_OF_TEXT)
    }

    fn peek_next(&self) -> &'a Token {
        if self.is_at_end() {
            return self.peek();
        }
        self.tokens.get(self.current + 1).unwrap_or(&END_OF_TEXT)
    }

    fn previous(&self) -> &'a Token {
        let index = if self.current > 0 { self.current - 1 } else { 0 };
        self.tokens.get(index).unwrap_or(&END_OF_TEXT)
    }

    fn error(&self, expected: &str) -> ParseError {
        let token = self.peek();
        ParseError {
            found: token.describe(),
            expected: expected.to_string(),
            position: token.start,
        }
    }
}

fn redefinition(name: &Token, kind: &str) -> ParseError {
    ParseError {
        found: format!("redefinition of {}", name.describe()),
        expected: format!("a {} name not defined before", kind),
        position: name.start,
    }
}

#[cfg(test)]
mod parser_tests {
    use crate::ast::{DeclaredType, Expression, Reference, RelationalOperator, Statement};
    use crate::parser::{parse, ParseError, Parser};
    use crate::scanner::{scan_tokens, ScanLimits};
    use crate::token::Position;

    fn parse_str(source: &str) -> Result<crate::ast::Program, ParseError> {
        let tokens = scan_tokens(source, ScanLimits::default()).unwrap();
        parse(&tokens)
    }

    fn expression(source: &str) -> Expression {
        let tokens = scan_tokens(source, ScanLimits::default()).unwrap();
        Parser::new(&tokens).or().unwrap()
    }

    fn main_body(source: &str) -> Vec<Statement> {
        let program = parse_str(&format!("{{ Void main() {{ {} }} }}", source)).unwrap();
        program.functions["main"].body.clone()
    }

    #[test]
    fn precedence() {
        assert_eq!(expression("a * 2 + 6 / b()").to_string(), "(+ (* a 2) (/ 6 b()))");
        assert_eq!(expression("1 - 2 - 3").to_string(), "(- (- 1 2) 3)");
        assert_eq!(expression("(1 - 2) * 3").to_string(), "(* (- 1 2) 3)");
        assert_eq!(expression("a | b & c == d").to_string(), "(| a (& b (== c d)))");
        assert_eq!(expression("x + 1 < y * 2").to_string(), "(< (+ x 1) (* y 2))");
    }

    #[test]
    fn negation_wraps_whole_relation() {
        match expression("!a < b") {
            Expression::Not(inner) => match *inner {
                Expression::Relational {
                    operator, negated, ..
                } => {
                    assert_eq!(operator, RelationalOperator::Less);
                    assert!(negated);
                }
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            expression("!flag"),
            Expression::Not(Box::new(Expression::Variable("flag".to_string())))
        );
    }

    #[test]
    fn boolean_literals_and_member_references() {
        assert_eq!(expression("true"), Expression::Boolean(true));
        assert_eq!(expression("false == x").to_string(), "(== false x)");
        assert_eq!(
            expression("obj.inner.value"),
            Expression::ObjectVariable {
                parent: "obj".to_string(),
                path: vec!["inner".to_string(), "value".to_string()],
            }
        );
        assert_eq!(
            expression("obj.get()"),
            Expression::ObjectMethod {
                parent: "obj".to_string(),
                path: vec!["get".to_string()],
                arguments: vec![],
            }
        );
    }

    #[test]
    fn equality_does_not_chain() {
        let err = parse_str("{ Boolean main() { return 1 == 2 == 3; } }").unwrap_err();
        assert_eq!(err.expected, "';' after return value");
        assert_eq!(err.found, "'=='");
    }

    #[test]
    fn functions_and_classes() {
        let program = parse_str(
            "{
                Void inc(Integer * x, String label, Counter * c) { x = x + 1; }
                class Counter {
                    Integer count = 0;
                    Double ratio;
                    Integer next() { count = count + 1; return count; }
                }
                Integer main() { Counter c = Counter; c.next(); return c.next(); }
            }",
        )
        .unwrap();
        let inc = &program.functions["inc"];
        assert_eq!(inc.return_type, DeclaredType::Void);
        assert_eq!(
            inc.params
                .iter()
                .map(|p| (p.name.as_str(), p.by_reference))
                .collect::<Vec<_>>(),
            vec![("x", true), ("label", false), ("c", true)]
        );
        assert_eq!(
            inc.params[2].declared_type,
            DeclaredType::Class("Counter".to_string())
        );
        let class = &program.classes["Counter"];
        assert_eq!(class.member_variables.len(), 2);
        assert!(class.member_variables[1].initializer.is_none());
        assert_eq!(class.member_methods[0].name, "next");
        assert_eq!(program.functions["main"].body.len(), 3);
    }

    #[test]
    fn statements() {
        let body = main_body(
            "Integer a = 1;
             a = a + 1;
             System.out.print(a, \"x\");
             if (a > 1) { a = 0; } else { { a = 2; } }
             while (a < 10) { a = a * 2; }
             Point p;",
        );
        assert_eq!(body.len(), 6);
        assert!(matches!(body[0], Statement::Init(_)));
        assert!(matches!(
            body[1],
            Statement::Assign {
                target: Reference::Variable(_),
                ..
            }
        ));
        match &body[2] {
            Statement::Call(Expression::FunctionCall { name, arguments }) => {
                assert_eq!(name.joined(), "System.out.print");
                assert_eq!(arguments.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &body[3] {
            Statement::IfElse {
                else_block: Some(else_block),
                ..
            } => assert!(matches!(else_block[0], Statement::Block(_))),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(body[4], Statement::While { .. }));
        match &body[5] {
            Statement::Init(init) => {
                assert_eq!(init.declared_type, DeclaredType::Class("Point".to_string()));
                assert_eq!(init.name, "p");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn calls_without_arguments() {
        let body = main_body("f(); g(1, h());");
        match &body[1] {
            Statement::Call(Expression::FunctionCall { arguments, .. }) => {
                assert_eq!(arguments.len(), 2);
                assert_eq!(arguments[1].to_string(), "h()");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn redefinitions_are_rejected() {
        let err = parse_str("{ Void f() { } Integer f() { return 1; } }").unwrap_err();
        assert_eq!(err.position, Position::new(1, 24));
        assert!(err.found.contains("'f'"));

        let err = parse_str("{ class A { } class A { } }").unwrap_err();
        assert_eq!(err.expected, "a class name not defined before");

        let err = parse_str("{ class A { Integer x; Void x() { } } }").unwrap_err();
        assert_eq!(err.expected, "a member name not defined before");
    }

    #[test]
    fn program_framing() {
        let err = parse_str("{ Void main() { } } Void").unwrap_err();
        assert_eq!(err.expected, "end of text after the program");
        assert_eq!(err.found, "'Void'");

        let err = parse_str("Void main() { }").unwrap_err();
        assert_eq!(err.expected, "'{' opening the program");

        let err = parse_str("{ Void main() { }").unwrap_err();
        assert_eq!(err.found, "end of text");

        assert!(parse_str("{ }").unwrap().functions.is_empty());
    }

    #[test]
    fn malformed_statements() {
        let err = parse_str("{ Void main() { x + 1; } }").unwrap_err();
        assert_eq!(err.expected, "'(' or '=' after a name");
        assert_eq!(err.found, "'+'");

        let err = parse_str("{ Void main() { f(1,); } }").unwrap_err();
        assert_eq!(err.expected, "expression");

        let err = parse_str("{ Void f(Integer a, ) { } }").unwrap_err();
        assert_eq!(err.expected, "parameter type");

        let err = parse_str("{ Void main() { Void x; } }").unwrap_err();
        assert_eq!(err.expected, "'}' closing a block");
    }
}
