//! Container storage.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::value::{Shape, Value};

/// Host closure backing an accessor property.
pub type Getter = Rc<dyn Fn() -> Value>;

/// A named property of a record.
#[derive(Clone)]
pub enum Property {
    Data(Value),
    Accessor(Getter),
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Property::Accessor(_) => f.write_str("Accessor(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Container {
    Record(IndexMap<String, Property>),
    /// `None` slots are holes left by sparse writes or element deletes.
    Ordered(Vec<Option<Value>>),
}

impl Container {
    pub(crate) fn shape(&self) -> Shape {
        match self {
            Container::Record(_) => Shape::Record,
            Container::Ordered(_) => Shape::Ordered,
        }
    }

    /// Whether any data slot holds `target`.
    pub(crate) fn holds(&self, target: &Value) -> bool {
        match self {
            Container::Record(props) => props
                .values()
                .any(|prop| matches!(prop, Property::Data(v) if v == target)),
            Container::Ordered(items) => items.iter().flatten().any(|v| v == target),
        }
    }
}
