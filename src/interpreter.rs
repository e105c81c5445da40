use crate::ast::{
    self, BinaryOperator, Class, DeclaredType, Expression, FunctionDef, InitStat, LogicalOperator,
    Program, Reference, RelationalOperator, Statement,
};
use crate::callable::{self, NativeFunction};
use crate::environment::Environment;
use crate::instance::Instance;
use crate::value::Value;
use log::{debug, info};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("Runtime Error: function 'main' is not declared")]
    MainNotDeclared,
    #[error("Runtime Error: type mismatch in {context}: expected {expected}, found {found}")]
    TypeMismatch {
        context: String,
        expected: DeclaredType,
        found: DeclaredType,
    },
    #[error("Runtime Error: '{name}' is declared {expected} but initialised with {found}")]
    InvalidInitialisation {
        name: String,
        expected: DeclaredType,
        found: DeclaredType,
    },
    #[error("Runtime Error: '{name}' takes {expected} arguments but was given {found}")]
    IncorrectArgumentsNumber {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Runtime Error: division by zero in {context}")]
    DivisionByZero { context: String },
    #[error("Runtime Error: undeclared symbol '{name}'")]
    UndeclaredSymbol { name: String },
    #[error("Runtime Error: undeclared method '{name}'")]
    UndeclaredMethod { name: String },
    #[error("Runtime Error: '{name}' is already declared in this scope")]
    AlreadyDeclared { name: String },
    #[error("Runtime Error: invalid call to '{name}'")]
    InvalidCall { name: String },
    #[error("Runtime Error: operator '{operator}' is not supported for {operand}")]
    UnsupportedOperation {
        operator: String,
        operand: DeclaredType,
    },
    #[error("Runtime Error: '{name}' is not an object")]
    NotAnObject { name: String },
    #[error("Runtime Error: integer overflow in {context}")]
    Overflow { context: String },
    #[error("Runtime Error: call depth exceeded {limit}")]
    CallDepthExceeded { limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Bound on nested user calls and object constructions.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> InterpreterConfig {
        InterpreterConfig {
            max_call_depth: 200,
        }
    }
}

/// Runs `main` of `program` with the given natives and returns its result.
pub fn interpret<'a>(
    program: &'a Program,
    natives: Vec<NativeFunction>,
) -> Result<Value<'a>, RuntimeError> {
    Interpreter::new(program, natives).run()
}

macro_rules! arithmetic {
    ($expr:expr, $operator:expr, $lv:expr, $rv:expr, $checked:ident, $op:tt) => {
        match ($lv, $rv) {
            (Value::Integer(l), Value::Integer(r)) => {
                l.$checked(r)
                    .map(Value::Integer)
                    .ok_or_else(|| RuntimeError::Overflow {
                        context: $expr.to_string(),
                    })
            }
            (Value::Double(l), Value::Double(r)) => Ok(Value::Double(l $op r)),
            (l, _) => Err(unsupported($operator, &l)),
        }
    };
}

pub struct Interpreter<'a> {
    program: &'a Program,
    environment: Environment<'a>,
    config: InterpreterConfig,
    depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a Program, natives: Vec<NativeFunction>) -> Interpreter<'a> {
        Interpreter::with_config(program, natives, InterpreterConfig::default())
    }

    pub fn with_config(
        program: &'a Program,
        natives: Vec<NativeFunction>,
        config: InterpreterConfig,
    ) -> Interpreter<'a> {
        let mut environment = Environment::new();
        for native in natives {
            environment.define_native(native);
        }
        for function in program.functions.values() {
            environment.define_function(function);
        }
        Interpreter {
            program,
            environment,
            config,
            depth: 0,
        }
    }

    pub fn run(&mut self) -> Result<Value<'a>, RuntimeError> {
        info!(
            "interpreting {} functions and {} classes",
            self.program.functions.len(),
            self.program.classes.len()
        );
        let program: &'a Program = self.program;
        let main = program
            .functions
            .get("main")
            .ok_or(RuntimeError::MainNotDeclared)?;
        let result = self.invoke(main, &[], None)?;
        info!("main returned {}", result);
        Ok(result)
    }

    fn evaluate(&mut self, expr: &'a Expression) -> Result<Value<'a>, RuntimeError> {
        match expr {
            Expression::Integer(x) => Ok(Value::Integer(*x)),
            Expression::Float {
                int_part,
                decimal,
                denominator,
            } => Ok(Value::Double(ast::float_value(
                *int_part,
                *decimal,
                *denominator,
            ))),
            Expression::String(x) => Ok(Value::String(x.clone())),
            Expression::Boolean(x) => Ok(Value::Boolean(*x)),
            Expression::Variable(name) => match self.environment.get(name) {
                Ok(value) => Ok(value),
                Err(err) => self.class(name).map(Value::Class).map_err(|_| err),
            },
            Expression::ObjectVariable { parent, path } => self.member(parent, path),
            Expression::Not(right) => {
                let value = self.evaluate(right)?;
                Ok(Value::Boolean(!value.is_truthy()))
            }
            Expression::Logical {
                operator,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                match operator {
                    LogicalOperator::Or => {
                        if left.is_truthy() {
                            Ok(Value::Boolean(true))
                        } else {
                            Ok(Value::Boolean(self.evaluate(right)?.is_truthy()))
                        }
                    }
                    LogicalOperator::And => {
                        let right = self.evaluate(right)?;
                        Ok(Value::Boolean(left.is_truthy() && right.is_truthy()))
                    }
                }
            }
            Expression::Binary {
                operator,
                left,
                right,
            } => {
                let lv = self.evaluate(left)?;
                let rv = self.evaluate(right)?;
                check_operands(expr, &lv, &rv)?;
                binary(expr, *operator, lv, rv)
            }
            // A leading `!` is applied by the enclosing `Not`.
            Expression::Relational {
                operator,
                left,
                right,
                ..
            } => {
                let lv = self.evaluate(left)?;
                let rv = self.evaluate(right)?;
                check_operands(expr, &lv, &rv)?;
                relational(*operator, lv, rv)
            }
            Expression::FunctionCall { name, arguments } => match name {
                Reference::Variable(name) => self.call_function(name, arguments),
                Reference::Member { parent, path } => self.call_member(parent, path, arguments),
            },
            Expression::ObjectMethod {
                parent,
                path,
                arguments,
            } => self.call_member(parent, path, arguments),
        }
    }

    fn execute(&mut self, stmt: &'a Statement) -> Result<(), RuntimeError> {
        match stmt {
            Statement::Init(init) => {
                let value = self.initial_value(init)?;
                self.environment.declare(&init.name, value)
            }
            Statement::Assign { target, value } => match self.evaluate(value)? {
                Value::Class(class) => {
                    let instance = Value::Instance(self.construct(class)?);
                    match target {
                        Reference::Variable(name) if !self.environment.contains(name) => {
                            self.environment.declare(name, instance)
                        }
                        target => self.write(target, instance),
                    }
                }
                value => self.write(target, value),
            },
            Statement::Call(expr) => {
                self.evaluate(expr)?;
                Ok(())
            }
            Statement::Return(expr) => {
                let value = self.evaluate(expr)?;
                self.environment.set_return(value);
                Ok(())
            }
            Statement::IfElse {
                condition,
                then_block,
                else_block,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute_block(then_block)
                } else if let Some(else_block) = else_block {
                    self.execute_block(else_block)
                } else {
                    Ok(())
                }
            }
            Statement::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute_block(body)?;
                    if self.environment.is_returning() {
                        break;
                    }
                }
                Ok(())
            }
            Statement::Block(statements) => self.execute_block(statements),
        }
    }

    fn execute_block(&mut self, statements: &'a [Statement]) -> Result<(), RuntimeError> {
        self.environment.start_block();
        let result = self.execute_statements(statements);
        self.environment.end_block();
        result
    }

    fn execute_statements(&mut self, statements: &'a [Statement]) -> Result<(), RuntimeError> {
        for stmt in statements {
            self.execute(stmt)?;
            if self.environment.is_returning() {
                break;
            }
        }
        Ok(())
    }

    fn initial_value(&mut self, init: &'a InitStat) -> Result<Value<'a>, RuntimeError> {
        let value = match &init.initializer {
            None => match &init.declared_type {
                DeclaredType::Class(name) => {
                    let class = self.class(name)?;
                    return Ok(Value::Instance(self.construct(class)?));
                }
                declared => return Ok(Value::zero(declared).unwrap_or(Value::Void)),
            },
            Some(initializer) => match self.evaluate(initializer)? {
                Value::Class(class) => Value::Instance(self.construct(class)?),
                value => value,
            },
        };
        let found = value.value_type();
        if found != init.declared_type {
            return Err(RuntimeError::InvalidInitialisation {
                name: init.name.clone(),
                expected: init.declared_type.clone(),
                found,
            });
        }
        Ok(value)
    }

    fn class(&self, name: &str) -> Result<&'a Class, RuntimeError> {
        let program: &'a Program = self.program;
        program
            .classes
            .get(name)
            .ok_or_else(|| RuntimeError::UndeclaredSymbol {
                name: name.to_string(),
            })
    }

    /// Builds an instance, evaluating member initialisers in declaration
    /// order. Later initialisers can read earlier members.
    fn construct(&mut self, class: &'a Class) -> Result<Instance<'a>, RuntimeError> {
        self.enter_depth()?;
        debug!("constructing {} instance", class.name);
        self.environment.start_block();
        let fields = self.member_values(class);
        self.environment.end_block();
        self.depth -= 1;
        Ok(Instance::new(class, fields?))
    }

    fn member_values(
        &mut self,
        class: &'a Class,
    ) -> Result<BTreeMap<String, Value<'a>>, RuntimeError> {
        let mut fields = BTreeMap::new();
        for member in &class.member_variables {
            let value = self.initial_value(member)?;
            self.environment.declare(&member.name, value.clone())?;
            fields.insert(member.name.clone(), value);
        }
        Ok(fields)
    }

    fn call_function(
        &mut self,
        name: &str,
        arguments: &'a [Expression],
    ) -> Result<Value<'a>, RuntimeError> {
        if let Ok(class) = self.class(name) {
            if !arguments.is_empty() {
                return Err(RuntimeError::IncorrectArgumentsNumber {
                    name: name.to_string(),
                    expected: 0,
                    found: arguments.len(),
                });
            }
            return Ok(Value::Class(class));
        }
        match self.environment.method(name) {
            Ok(function) => self.invoke(function, arguments, None),
            Err(err) => match self.environment.native(name) {
                Some(native) => self.call_native(&native, arguments),
                None => Err(err),
            },
        }
    }

    /// A dotted call: a native under the joined name, otherwise a method of
    /// the object the path leads to.
    fn call_member(
        &mut self,
        parent: &str,
        path: &[String],
        arguments: &'a [Expression],
    ) -> Result<Value<'a>, RuntimeError> {
        let name = ast::joined(parent, path);
        if let Some(native) = self.environment.native(&name) {
            return self.call_native(&native, arguments);
        }
        let (method_name, owner_path) = match (self.environment.get(parent), path.split_last()) {
            (Ok(Value::Instance(_)), Some(split)) => split,
            _ => return Err(RuntimeError::InvalidCall { name }),
        };
        let receiver = self.instance(parent, owner_path)?;
        let method = receiver
            .method(method_name)
            .ok_or(RuntimeError::UndeclaredMethod { name })?;
        self.invoke(method, arguments, Some(receiver))
    }

    fn call_native(
        &mut self,
        native: &NativeFunction,
        arguments: &'a [Expression],
    ) -> Result<Value<'a>, RuntimeError> {
        let values = self.evaluate_arguments(arguments)?;
        debug!("calling native {} with {} arguments", native.name, values.len());
        native.call(&values);
        Ok(Value::Void)
    }

    fn evaluate_arguments(
        &mut self,
        arguments: &'a [Expression],
    ) -> Result<Vec<Value<'a>>, RuntimeError> {
        arguments.iter().map(|arg| self.evaluate(arg)).collect()
    }

    /// Calls a user function or, with a receiver, a method of that instance.
    fn invoke(
        &mut self,
        function: &'a FunctionDef,
        arguments: &'a [Expression],
        receiver: Option<Instance<'a>>,
    ) -> Result<Value<'a>, RuntimeError> {
        let values = self.evaluate_arguments(arguments)?;
        callable::check_arguments(function, &values)?;
        let mut bindings = callable::reference_bindings(function, arguments);
        // A bare class name passed by reference names no binding to write to.
        let environment = &self.environment;
        bindings.retain(|(target, _)| match target {
            Reference::Variable(name) => environment.contains(name),
            Reference::Member { .. } => true,
        });

        self.enter_depth()?;
        debug!("calling {} at depth {}", function.name, self.depth);
        self.environment.enter_call();
        let outcome = self.run_call(function, values, receiver.as_ref(), &bindings);
        let returned = self.environment.leave_call();
        self.depth -= 1;
        let (written, fields) = outcome?;

        if let Some(instance) = &receiver {
            for (name, value) in fields {
                instance.set(&name, value);
            }
        }
        let found = returned.value_type();
        if found != function.return_type {
            return Err(RuntimeError::TypeMismatch {
                context: format!("return value of '{}'", function.name),
                expected: function.return_type.clone(),
                found,
            });
        }
        for ((target, _), value) in bindings.iter().zip(written) {
            self.write(target, value)?;
        }
        Ok(returned)
    }

    /// Body of `invoke` inside the call scope. Yields the final values of the
    /// by-reference parameters and of the receiver's fields.
    fn run_call(
        &mut self,
        function: &'a FunctionDef,
        values: Vec<Value<'a>>,
        receiver: Option<&Instance<'a>>,
        bindings: &[(Reference, &'a str)],
    ) -> Result<(Vec<Value<'a>>, Vec<(String, Value<'a>)>), RuntimeError> {
        if let Some(instance) = receiver {
            for (name, value) in instance.fields() {
                self.environment.declare(&name, value)?;
            }
            for method in instance.methods() {
                self.environment.declare_method(method);
            }
        }
        for (param, value) in function.params.iter().zip(values) {
            self.environment.declare(&param.name, value)?;
        }

        self.execute_statements(&function.body)?;

        let written = bindings
            .iter()
            .map(|(_, param)| self.environment.get(param))
            .collect::<Result<Vec<_>, _>>()?;
        let mut fields = Vec::new();
        if let Some(instance) = receiver {
            for (name, _) in instance.fields() {
                let value = self.environment.get(&name)?;
                fields.push((name, value));
            }
        }
        Ok((written, fields))
    }

    fn enter_depth(&mut self) -> Result<(), RuntimeError> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn member(&self, parent: &str, path: &[String]) -> Result<Value<'a>, RuntimeError> {
        let mut value = self.environment.get(parent)?;
        let mut name = parent.to_string();
        for segment in path {
            let instance = match value {
                Value::Instance(instance) => instance,
                _ => return Err(RuntimeError::NotAnObject { name }),
            };
            name.push('.');
            name.push_str(segment);
            value = instance
                .get(segment)
                .ok_or_else(|| RuntimeError::UndeclaredSymbol { name: name.clone() })?;
        }
        Ok(value)
    }

    fn instance(&self, parent: &str, path: &[String]) -> Result<Instance<'a>, RuntimeError> {
        match self.member(parent, path)? {
            Value::Instance(instance) => Ok(instance),
            _ => Err(RuntimeError::NotAnObject {
                name: ast::joined(parent, path),
            }),
        }
    }

    fn write(&mut self, target: &Reference, value: Value<'a>) -> Result<(), RuntimeError> {
        match target {
            Reference::Variable(name) => self.environment.assign(name, value),
            Reference::Member { parent, path } => {
                let (field, owner_path) = match path.split_last() {
                    Some(split) => split,
                    None => return self.environment.assign(parent, value),
                };
                let owner = self.instance(parent, owner_path)?;
                if owner.set(field, value) {
                    Ok(())
                } else {
                    Err(RuntimeError::UndeclaredSymbol {
                        name: target.joined(),
                    })
                }
            }
        }
    }
}

fn check_operands(expr: &Expression, lv: &Value, rv: &Value) -> Result<(), RuntimeError> {
    let expected = lv.value_type();
    let found = rv.value_type();
    if expected != found {
        return Err(RuntimeError::TypeMismatch {
            context: expr.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

fn unsupported(operator: impl ToString, operand: &Value) -> RuntimeError {
    RuntimeError::UnsupportedOperation {
        operator: operator.to_string(),
        operand: operand.value_type(),
    }
}

// Operands have already been checked to share a type.
fn binary<'a>(
    expr: &Expression,
    operator: BinaryOperator,
    lv: Value<'a>,
    rv: Value<'a>,
) -> Result<Value<'a>, RuntimeError> {
    match operator {
        BinaryOperator::Equal => Ok(Value::Boolean(lv.equals(&rv))),
        BinaryOperator::NotEqual => Ok(Value::Boolean(!lv.equals(&rv))),
        BinaryOperator::Add => match (lv, rv) {
            (Value::String(mut l), Value::String(r)) => {
                l.push_str(&r);
                Ok(Value::String(l))
            }
            (lv, rv) => arithmetic!(expr, operator, lv, rv, checked_add, +),
        },
        BinaryOperator::Sub => arithmetic!(expr, operator, lv, rv, checked_sub, -),
        BinaryOperator::Mul => arithmetic!(expr, operator, lv, rv, checked_mul, *),
        BinaryOperator::Div => match (lv, rv) {
            (Value::Integer(_), Value::Integer(0)) => Err(RuntimeError::DivisionByZero {
                context: expr.to_string(),
            }),
            (Value::Double(_), Value::Double(r)) if r == 0.0 => {
                Err(RuntimeError::DivisionByZero {
                    context: expr.to_string(),
                })
            }
            (Value::Integer(l), Value::Integer(r)) => Ok(Value::Double(l as f64 / r as f64)),
            (Value::Double(l), Value::Double(r)) => Ok(Value::Double(l / r)),
            (l, _) => Err(unsupported(operator, &l)),
        },
    }
}

fn relational<'a>(
    operator: RelationalOperator,
    lv: Value<'a>,
    rv: Value<'a>,
) -> Result<Value<'a>, RuntimeError> {
    let result = match (&lv, &rv) {
        (Value::Integer(l), Value::Integer(r)) => compare(operator, l, r),
        (Value::Double(l), Value::Double(r)) => compare(operator, l, r),
        (Value::String(l), Value::String(r)) => compare(operator, l, r),
        (Value::Boolean(l), Value::Boolean(r)) => compare(operator, l, r),
        _ => return Err(unsupported(operator, &lv)),
    };
    Ok(Value::Boolean(result))
}

fn compare<T: PartialOrd>(operator: RelationalOperator, l: T, r: T) -> bool {
    match operator {
        RelationalOperator::Less => l < r,
        RelationalOperator::Greater => l > r,
        RelationalOperator::LessEqual => l <= r,
        RelationalOperator::GreaterEqual => l >= r,
    }
}
