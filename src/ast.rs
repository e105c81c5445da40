use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Formatter;
use strum_macros::Display;

/// A type as written in a declaration, or as inferred from a runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    Integer,
    Double,
    Boolean,
    String,
    Void,
    Class(String),
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeclaredType::Integer => write!(f, "Integer"),
            DeclaredType::Double => write!(f, "Double"),
            DeclaredType::Boolean => write!(f, "Boolean"),
            DeclaredType::String => write!(f, "String"),
            DeclaredType::Void => write!(f, "Void"),
            DeclaredType::Class(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LogicalOperator {
    #[strum(serialize = "|")]
    Or,
    #[strum(serialize = "&")]
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RelationalOperator {
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<=")]
    LessEqual,
    #[strum(serialize = ">=")]
    GreaterEqual,
}

/// Something a name can be resolved to: a plain variable or a dotted member.
#[derive(Debug, Clone, PartialEq)]
pub enum Reference {
    Variable(String),
    Member { parent: String, path: Vec<String> },
}

impl Reference {
    /// The dot-joined spelling, e.g. `System.out.print`.
    pub fn joined(&self) -> String {
        match self {
            Reference::Variable(name) => name.clone(),
            Reference::Member { parent, path } => joined(parent, path),
        }
    }
}

pub fn joined(parent: &str, path: &[String]) -> String {
    let mut name = parent.to_string();
    for segment in path {
        name.push('.');
        name.push_str(segment);
    }
    name
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Integer(i64),
    Float {
        int_part: i64,
        decimal: i64,
        denominator: u32,
    },
    String(String),
    Boolean(bool),
    Variable(String),
    ObjectVariable {
        parent: String,
        path: Vec<String>,
    },
    Not(Box<Expression>),
    Logical {
        operator: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// `negated` records a leading `!`; the parser also wraps the node in `Not`.
    Relational {
        operator: RelationalOperator,
        negated: bool,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    FunctionCall {
        name: Reference,
        arguments: Vec<Expression>,
    },
    ObjectMethod {
        parent: String,
        path: Vec<String>,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// The caller-side binding a by-reference parameter may write back to.
    pub fn reference(&self) -> Option<Reference> {
        match self {
            Expression::Variable(name) => Some(Reference::Variable(name.clone())),
            Expression::ObjectVariable { parent, path } => Some(Reference::Member {
                parent: parent.clone(),
                path: path.clone(),
            }),
            _ => None,
        }
    }
}

/// Real value of a double literal: `int_part + decimal / 10^denominator`.
pub fn float_value(int_part: i64, decimal: i64, denominator: u32) -> f64 {
    int_part as f64 + decimal as f64 / 10f64.powi(denominator as i32)
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitStat {
    pub declared_type: DeclaredType,
    pub name: String,
    pub initializer: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Init(InitStat),
    Assign {
        target: Reference,
        value: Expression,
    },
    /// A call evaluated for its side effects.
    Call(Expression),
    Return(Expression),
    IfElse {
        condition: Expression,
        then_block: Vec<Statement>,
        else_block: Option<Vec<Statement>>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Block(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub declared_type: DeclaredType,
    pub name: String,
    pub by_reference: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub return_type: DeclaredType,
    pub name: String,
    pub params: Vec<Parameter>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub name: String,
    pub member_variables: Vec<InitStat>,
    pub member_methods: Vec<FunctionDef>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub functions: BTreeMap<String, FunctionDef>,
    pub classes: BTreeMap<String, Class>,
}

fn parenthesize(f: &mut Formatter<'_>, name: &str, args: &[&Expression]) -> fmt::Result {
    write!(f, "({}", name)?;
    for arg in args {
        write!(f, " {}", arg)?;
    }
    write!(f, ")")
}

fn call(f: &mut Formatter<'_>, name: &str, arguments: &[Expression]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (idx, arg) in arguments.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", arg)?;
    }
    write!(f, ")")
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Integer(x) => write!(f, "{}", x),
            Expression::Float {
                int_part,
                decimal,
                denominator,
            } => write!(
                f,
                "{}.{:0width$}",
                int_part,
                decimal,
                width = *denominator as usize
            ),
            Expression::String(x) => write!(f, "\"{}\"", x),
            Expression::Boolean(x) => write!(f, "{}", x),
            Expression::Variable(name) => write!(f, "{}", name),
            Expression::ObjectVariable { parent, path } => write!(f, "{}", joined(parent, path)),
            Expression::Not(right) => parenthesize(f, "!", &[&**right]),
            Expression::Logical {
                operator,
                left,
                right,
            } => parenthesize(f, &operator.to_string(), &[&**left, &**right]),
            Expression::Binary {
                operator,
                left,
                right,
            } => parenthesize(f, &operator.to_string(), &[&**left, &**right]),
            Expression::Relational {
                operator,
                left,
                right,
                ..
            } => parenthesize(f, &operator.to_string(), &[&**left, &**right]),
            Expression::FunctionCall { name, arguments } => call(f, &name.joined(), arguments),
            Expression::ObjectMethod {
                parent,
                path,
                arguments,
            } => call(f, &joined(parent, path), arguments),
        }
    }
}
