//! Property keys and dynamically typed property values

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, TrackingError};

/// Identifies a tracked property on an owner type
///
/// Keys are interned `&'static str` names, normally declared as associated
/// constants on the owner:
///
/// ```
/// use changekeeper_tracking::PropertyKey;
///
/// struct Node;
///
/// impl Node {
///     const LABEL: PropertyKey = PropertyKey::new("label");
/// }
///
/// assert_eq!(Node::LABEL.name(), "label");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyKey(&'static str);

impl PropertyKey {
    /// Create a key from its static name
    pub const fn new(name: &'static str) -> Self {
        PropertyKey(name)
    }

    /// The property name
    pub const fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Shared handle to an arbitrary object, compared by identity
#[derive(Clone)]
pub struct ObjectRef(Rc<dyn Any>);

impl ObjectRef {
    /// Wrap a shared object
    pub fn new<T: Any>(object: Rc<T>) -> Self {
        ObjectRef(object)
    }

    /// Get the object back as its concrete type
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.0.clone().downcast::<T>().ok()
    }

    fn addr(&self) -> *const () {
        Rc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", self.addr())
    }
}

/// Value held by a tracked property before or after a change
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// Text
    Text(String),
    /// 2D point, used for positions and sizes
    Point {
        /// Horizontal component
        x: f64,
        /// Vertical component
        y: f64,
    },
    /// Ordered list of values
    List(Vec<Value>),
    /// Reference to another object in the model
    Object(ObjectRef),
}

impl Value {
    /// Short name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Point { .. } => "point",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Whether this is `Value::Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Read as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as float; integers widen
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Read as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Read as point
    pub fn as_point(&self) -> Option<(f64, f64)> {
        match self {
            Value::Point { x, y } => Some((*x, *y)),
            _ => None,
        }
    }

    /// Read as an object of a concrete type
    pub fn as_object<T: Any>(&self) -> Option<Rc<T>> {
        match self {
            Value::Object(object) => object.downcast::<T>(),
            _ => None,
        }
    }

    /// Read as float or fail with an error naming the property
    pub fn expect_float(&self, property: PropertyKey) -> Result<f64> {
        self.as_float()
            .ok_or_else(|| TrackingError::invalid_value(property.name(), self.mismatch("float")))
    }

    /// Read as integer or fail with an error naming the property
    pub fn expect_int(&self, property: PropertyKey) -> Result<i64> {
        self.as_int()
            .ok_or_else(|| TrackingError::invalid_value(property.name(), self.mismatch("int")))
    }

    /// Read as bool or fail with an error naming the property
    pub fn expect_bool(&self, property: PropertyKey) -> Result<bool> {
        self.as_bool()
            .ok_or_else(|| TrackingError::invalid_value(property.name(), self.mismatch("bool")))
    }

    /// Read as text or fail with an error naming the property
    pub fn expect_text(&self, property: PropertyKey) -> Result<&str> {
        self.as_text()
            .ok_or_else(|| TrackingError::invalid_value(property.name(), self.mismatch("text")))
    }

    /// Read as point or fail with an error naming the property
    pub fn expect_point(&self, property: PropertyKey) -> Result<(f64, f64)> {
        self.as_point()
            .ok_or_else(|| TrackingError::invalid_value(property.name(), self.mismatch("point")))
    }

    fn mismatch(&self, expected: &str) -> String {
        format!("expected {}, got {}", expected, self.kind())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Point { x, y } => write!(f, "({}, {})", x, y),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Object(object) => write!(f, "{:?}", object),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<(f64, f64)> for Value {
    fn from((x, y): (f64, f64)) -> Self {
        Value::Point { x, y }
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
