use crate::ast::{Expression, FunctionDef, Reference};
use crate::interpreter::RuntimeError;
use crate::value::Value;
use log::warn;
use std::cell::RefCell;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

/// A host function reachable from programs under a dotted name.
#[derive(Clone)]
pub struct NativeFunction {
    pub name: String,
    callback: Rc<dyn for<'v> Fn(&[Value<'v>])>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, callback: F) -> NativeFunction
    where
        F: for<'v> Fn(&[Value<'v>]) + 'static,
    {
        NativeFunction {
            name: name.to_string(),
            callback: Rc::new(callback),
        }
    }
    pub fn call(&self, arguments: &[Value<'_>]) {
        (self.callback)(arguments)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn>")
    }
}

pub const PRINT: &str = "System.out.print";

/// `System.out.print` writing to `sink`. One argument is printed as is,
/// several are concatenated.
pub fn print_to<W: Write + 'static>(sink: Rc<RefCell<W>>) -> NativeFunction {
    NativeFunction::new(PRINT, move |arguments| {
        let line: String = arguments.iter().map(|arg| arg.to_string()).collect();
        if let Err(err) = writeln!(sink.borrow_mut(), "{}", line) {
            warn!("{} failed: {}", PRINT, err);
        }
    })
}

/// The natives every program gets, printing to stdout.
pub fn standard_library() -> Vec<NativeFunction> {
    vec![print_to(Rc::new(RefCell::new(io::stdout())))]
}

/// Arity and declared-type guard for a user function call.
pub fn check_arguments(function: &FunctionDef, arguments: &[Value<'_>]) -> Result<(), RuntimeError> {
    if function.params.len() != arguments.len() {
        return Err(RuntimeError::IncorrectArgumentsNumber {
            name: function.name.clone(),
            expected: function.params.len(),
            found: arguments.len(),
        });
    }
    for (param, argument) in function.params.iter().zip(arguments) {
        let found = argument.value_type();
        if found != param.declared_type {
            return Err(RuntimeError::TypeMismatch {
                context: format!("argument '{}' of '{}'", param.name, function.name),
                expected: param.declared_type.clone(),
                found,
            });
        }
    }
    Ok(())
}

/// Caller-side targets of by-reference parameters, paired with the parameter
/// name whose final value is written back. Arguments that are not a variable
/// or member reference have nothing to write to and are skipped.
pub fn reference_bindings<'a>(
    function: &'a FunctionDef,
    arguments: &[Expression],
) -> Vec<(Reference, &'a str)> {
    function
        .params
        .iter()
        .zip(arguments)
        .filter(|(param, _)| param.by_reference)
        .filter_map(|(param, argument)| {
            argument
                .reference()
                .map(|target| (target, param.name.as_str()))
        })
        .collect()
}

#[cfg(test)]
mod callable_tests {
    use crate::ast::{DeclaredType, Expression, FunctionDef, Parameter, Reference};
    use crate::callable::{check_arguments, print_to, reference_bindings};
    use crate::interpreter::RuntimeError;
    use crate::value::Value;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn param(name: &str, declared_type: DeclaredType, by_reference: bool) -> Parameter {
        Parameter {
            declared_type,
            name: name.to_string(),
            by_reference,
        }
    }

    fn function(params: Vec<Parameter>) -> FunctionDef {
        FunctionDef {
            return_type: DeclaredType::Void,
            name: "f".to_string(),
            params,
            body: vec![],
        }
    }

    #[test]
    fn print_concatenates_arguments() {
        let sink = Rc::new(RefCell::new(Vec::<u8>::new()));
        let print = print_to(sink.clone());
        print.call(&[Value::String("x = ".to_string()), Value::Integer(3)]);
        print.call(&[Value::Double(1.0)]);
        print.call(&[]);
        assert_eq!(
            String::from_utf8(sink.borrow().clone()).unwrap(),
            "x = 3\n1.0\n\n"
        );
        assert_eq!(format!("{:?}", print), "<native fn System.out.print>");
    }

    #[test]
    fn argument_guard() {
        let f = function(vec![
            param("a", DeclaredType::Integer, false),
            param("b", DeclaredType::Integer, false),
        ]);
        assert_eq!(
            check_arguments(&f, &[Value::Integer(1)]),
            Err(RuntimeError::IncorrectArgumentsNumber {
                name: "f".to_string(),
                expected: 2,
                found: 1,
            })
        );
        match check_arguments(&f, &[Value::Integer(1), Value::String("2".to_string())]) {
            Err(RuntimeError::TypeMismatch {
                expected, found, ..
            }) => {
                assert_eq!(expected, DeclaredType::Integer);
                assert_eq!(found, DeclaredType::String);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(check_arguments(&f, &[Value::Integer(1), Value::Integer(2)]).is_ok());
    }

    #[test]
    fn bindings_survive_trailing_value_parameters() {
        let f = function(vec![
            param("x", DeclaredType::Integer, true),
            param("y", DeclaredType::Integer, false),
            param("z", DeclaredType::Integer, false),
            param("w", DeclaredType::Integer, true),
        ]);
        let arguments = vec![
            Expression::Variable("a".to_string()),
            Expression::Variable("b".to_string()),
            Expression::Integer(3),
            Expression::ObjectVariable {
                parent: "p".to_string(),
                path: vec!["q".to_string()],
            },
        ];
        assert_eq!(
            reference_bindings(&f, &arguments),
            vec![
                (Reference::Variable("a".to_string()), "x"),
                (
                    Reference::Member {
                        parent: "p".to_string(),
                        path: vec!["q".to_string()],
                    },
                    "w"
                ),
            ]
        );
    }

    #[test]
    fn literals_are_not_written_back() {
        let f = function(vec![param("x", DeclaredType::Integer, true)]);
        assert!(reference_bindings(&f, &[Expression::Integer(5)]).is_empty());
    }
}
