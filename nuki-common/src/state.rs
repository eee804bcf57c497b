//! Types for the hierarchical object/state tree of the host platform.

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The type of value a state holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// A number
    Number,

    /// A string
    String,

    /// A boolean
    Boolean,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Number => write!(f, "number"),
            ValueType::String => write!(f, "string"),
            ValueType::Boolean => write!(f, "boolean"),
        }
    }
}

/// Hint to the host platform how a state should be presented.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A generic value
    Value,

    /// Free text
    Text,

    /// A point in time
    Time,
}

/// The kind of object in the tree.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    /// A physical device, parent of a number of states
    Device,

    /// A leaf holding a value
    State,
}

/// Common metadata of an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Common {
    /// Display name
    pub name: String,

    /// The type of value, only set for states
    #[serde(rename = "type", skip_serializing_if = "Option::is_none", default)]
    pub value_type: Option<ValueType>,

    /// The role, only set for states
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub role: Option<Role>,
}

/// Describes an object in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Device or state
    #[serde(rename = "type")]
    pub object_type: ObjectType,

    /// The common metadata
    pub common: Common,
}

impl ObjectDescriptor {
    /// Describe a device.
    #[must_use]
    pub fn device(name: impl Into<String>) -> Self {
        ObjectDescriptor {
            object_type: ObjectType::Device,
            common: Common {
                name: name.into(),
                value_type: None,
                role: None,
            },
        }
    }

    /// Describe a state holding values of the given type.
    #[must_use]
    pub fn state(name: impl Into<String>, value_type: ValueType, role: Role) -> Self {
        ObjectDescriptor {
            object_type: ObjectType::State,
            common: Common {
                name: name.into(),
                value_type: Some(value_type),
                role: Some(role),
            },
        }
    }
}

/// A typed value stored in a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    /// A boolean value
    Boolean(bool),

    /// A numeric value
    Number(serde_json::Number),

    /// A string value
    String(String),
}

impl StateValue {
    /// The type of this value.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            StateValue::Boolean(_) => ValueType::Boolean,
            StateValue::Number(_) => ValueType::Number,
            StateValue::String(_) => ValueType::String,
        }
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Number(value.into())
    }
}

impl From<serde_json::Number> for StateValue {
    fn from(value: serde_json::Number) -> Self {
        StateValue::Number(value)
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        StateValue::Boolean(value)
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::String(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::String(value.to_string())
    }
}

impl Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Boolean(v) => write!(f, "{v}"),
            StateValue::Number(v) => write!(f, "{v}"),
            StateValue::String(v) => write!(f, "{v:?}"),
        }
    }
}

/// The current value of a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// The value
    pub val: StateValue,

    /// Was this a confirmed fact (true) or a command still to be executed (false)?
    pub ack: bool,

    /// When the value was written
    pub ts: DateTime<Utc>,
}

/// Notification that a state was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// The full path of the state
    pub path: String,

    /// The new state
    pub state: State,
}
