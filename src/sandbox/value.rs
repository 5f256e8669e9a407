//! Runtime values

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

/// Object instance
#[derive(Debug)]
pub struct Instance {
    /// Class file declaring the instance's class
    pub class_name: String,
    /// User-visible class name
    pub type_name: String,
    pub fields: IndexMap<String, Value>,
}

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Null,
    Object(Arc<Mutex<Instance>>),
    Void,
}

impl Value {
    /// Text used by string concatenation and `println`
    pub fn to_text(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Double(v) => format_double(*v),
            Value::Bool(v) => v.to_string(),
            Value::Str(s) => s.clone(),
            Value::Null => "null".to_string(),
            Value::Object(obj) => {
                let obj_ref = obj.lock();
                format!("{}@{:x}", obj_ref.type_name, Arc::as_ptr(obj) as usize & 0xff_ffff)
            }
            Value::Void => String::new(),
        }
    }

    /// Form reported as a snippet value; strings are quoted
    pub fn display(&self) -> Option<String> {
        match self {
            Value::Void => None,
            Value::Str(s) => Some(format!("{:?}", s)),
            other => Some(other.to_text()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Reference and primitive equality for `==`
    pub fn same(
        &self,
        other: &Value,
    ) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (a, b) => match (a.as_double(), b.as_double()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }
}

fn format_double(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

/// Abrupt completion of interpreted code
#[derive(Debug, Clone)]
pub enum Trap {
    /// `return` unwinding to the enclosing call
    Return(Value),
    /// User exception
    Exception(String),
    /// Execution reached a stubbed body
    Unresolved { class_name: String, member: String },
    /// `lib.sys.exit`
    Exit(i64),
    /// Interrupted from outside
    Stopped,
    /// Loaded code is inconsistent with what is installed
    Internal(String),
}
