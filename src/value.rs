use crate::ast::{Class, DeclaredType};
use crate::instance::Instance;
use std::fmt;

/// A runtime value. Class descriptors and instances borrow their class from
/// the `Program` being interpreted.
#[derive(Debug, Clone)]
pub enum Value<'a> {
    Integer(i64),
    Double(f64),
    String(String),
    Boolean(bool),
    Void,
    Class(&'a Class),
    Instance(Instance<'a>),
}

impl<'a> Value<'a> {
    /// The type a value has at runtime, in the same terms declarations use.
    pub fn value_type(&self) -> DeclaredType {
        match self {
            Value::Integer(_) => DeclaredType::Integer,
            Value::Double(_) => DeclaredType::Double,
            Value::String(_) => DeclaredType::String,
            Value::Boolean(_) => DeclaredType::Boolean,
            Value::Void => DeclaredType::Void,
            Value::Class(class) => DeclaredType::Class(class.name.clone()),
            Value::Instance(instance) => DeclaredType::Class(instance.class_name().to_string()),
        }
    }

    /// Default value of an uninitialised declaration. Class types have none:
    /// they are constructed instead.
    pub fn zero(declared_type: &DeclaredType) -> Option<Value<'a>> {
        match declared_type {
            DeclaredType::Integer => Some(Value::Integer(0)),
            DeclaredType::Double => Some(Value::Double(0.0)),
            DeclaredType::String => Some(Value::String(String::new())),
            DeclaredType::Boolean => Some(Value::Boolean(false)),
            DeclaredType::Void => Some(Value::Void),
            DeclaredType::Class(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(x) => *x != 0,
            Value::Double(x) => *x != 0.0,
            Value::String(x) => !x.is_empty(),
            Value::Boolean(x) => *x,
            Value::Void => false,
            Value::Class(_) | Value::Instance(_) => true,
        }
    }

    /// Equality as `==` sees it. Objects compare by identity.
    pub fn equals(&self, other: &Value<'a>) -> bool {
        match (self, other) {
            (Value::Integer(l), Value::Integer(r)) => l == r,
            (Value::Double(l), Value::Double(r)) => l == r,
            (Value::String(l), Value::String(r)) => l == r,
            (Value::Boolean(l), Value::Boolean(r)) => l == r,
            (Value::Void, Value::Void) => true,
            (Value::Class(l), Value::Class(r)) => std::ptr::eq(*l, *r),
            (Value::Instance(l), Value::Instance(r)) => l.equals(r),
            _ => false,
        }
    }
}

impl<'a> PartialEq for Value<'a> {
    fn eq(&self, other: &Value<'a>) -> bool {
        self.equals(other)
    }
}

impl<'a> fmt::Display for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(x) => write!(f, "{}", x),
            Value::Double(x) if x.is_finite() && x.fract() == 0.0 => write!(f, "{:.1}", x),
            Value::Double(x) => write!(f, "{}", x),
            Value::String(x) => write!(f, "{}", x),
            Value::Boolean(x) => write!(f, "{}", x),
            Value::Void => write!(f, "void"),
            Value::Class(class) => write!(f, "<class {}>", class.name),
            Value::Instance(instance) => write!(f, "{}", instance),
        }
    }
}

#[cfg(test)]
mod value_tests {
    use crate::ast::{Class, DeclaredType};
    use crate::instance::Instance;
    use crate::value::Value;
    use std::collections::BTreeMap;

    fn class(name: &str) -> Class {
        Class {
            name: name.to_string(),
            member_variables: vec![],
            member_methods: vec![],
        }
    }

    #[test]
    fn runtime_types() {
        let point = class("Point");
        assert_eq!(Value::Integer(1).value_type(), DeclaredType::Integer);
        assert_eq!(Value::Double(1.5).value_type(), DeclaredType::Double);
        assert_eq!(Value::Void.value_type(), DeclaredType::Void);
        assert_eq!(
            Value::Class(&point).value_type(),
            DeclaredType::Class("Point".to_string())
        );
        let instance = Instance::new(&point, BTreeMap::new());
        assert_eq!(
            Value::Instance(instance).value_type(),
            DeclaredType::Class("Point".to_string())
        );
    }

    #[test]
    fn zero_values() {
        assert_eq!(Value::zero(&DeclaredType::Integer), Some(Value::Integer(0)));
        assert_eq!(
            Value::zero(&DeclaredType::String),
            Some(Value::String(String::new()))
        );
        assert_eq!(Value::zero(&DeclaredType::Boolean), Some(Value::Boolean(false)));
        assert!(Value::zero(&DeclaredType::Class("Point".to_string())).is_none());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(-3).is_truthy());
        assert!(!Value::Double(0.0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::String("a".to_string()).is_truthy());
        assert!(!Value::Void.is_truthy());
    }

    #[test]
    fn identity_equality() {
        let point = class("Point");
        let a = Instance::new(&point, BTreeMap::new());
        let b = Instance::new(&point, BTreeMap::new());
        assert!(Value::Instance(a.clone()).equals(&Value::Instance(a.clone())));
        assert!(!Value::Instance(a).equals(&Value::Instance(b)));
        assert!(!Value::Integer(1).equals(&Value::Double(1.0)));
    }

    #[test]
    fn display() {
        let point = class("Point");
        assert_eq!(Value::Double(2.0).to_string(), "2.0");
        assert_eq!(Value::Double(0.75).to_string(), "0.75");
        assert_eq!(Value::Void.to_string(), "void");
        assert_eq!(Value::Class(&point).to_string(), "<class Point>");
        assert_eq!(
            Value::Instance(Instance::new(&point, BTreeMap::new())).to_string(),
            "Point instance"
        );
    }
}
