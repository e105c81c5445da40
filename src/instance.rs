use crate::ast::{Class, FunctionDef};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// An object. Clones share the same fields, so assignment and argument
/// passing alias rather than copy.
#[derive(Clone)]
pub struct Instance<'a> {
    data: Rc<RefCell<InstanceImpl<'a>>>,
}

struct InstanceImpl<'a> {
    class: &'a Class,
    fields: BTreeMap<String, Value<'a>>,
    methods: BTreeMap<String, &'a FunctionDef>,
}

impl<'a> Instance<'a> {
    pub fn new(class: &'a Class, fields: BTreeMap<String, Value<'a>>) -> Instance<'a> {
        let methods = class
            .member_methods
            .iter()
            .map(|method| (method.name.clone(), method))
            .collect();
        Instance {
            data: Rc::new(RefCell::new(InstanceImpl {
                class,
                fields,
                methods,
            })),
        }
    }
    pub fn class_name(&self) -> &'a str {
        let class: &'a Class = self.data.borrow().class;
        &class.name
    }
    pub fn get(&self, name: &str) -> Option<Value<'a>> {
        self.data.borrow().fields.get(name).cloned()
    }
    /// Overwrites an existing field. Returns false if there is no such field.
    pub fn set(&self, name: &str, value: Value<'a>) -> bool {
        match self.data.borrow_mut().fields.get_mut(name) {
            Some(field) => {
                *field = value;
                true
            }
            None => false,
        }
    }
    pub fn fields(&self) -> Vec<(String, Value<'a>)> {
        self.data
            .borrow()
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
    pub fn method(&self, name: &str) -> Option<&'a FunctionDef> {
        self.data.borrow().methods.get(name).copied()
    }
    pub fn methods(&self) -> Vec<&'a FunctionDef> {
        self.data.borrow().methods.values().copied().collect()
    }
    pub fn equals(&self, other: &Instance<'a>) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }
}

// Fields may refer back to the instance, so only the class is shown.
impl<'a> fmt::Debug for Instance<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.class_name())
    }
}

impl<'a> fmt::Display for Instance<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class_name())
    }
}
