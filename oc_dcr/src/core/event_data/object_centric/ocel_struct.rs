//! OCEL 2.0 JSON data model
//!
//! Field names follow the OCEL 2.0 JSON format (`eventTypes`, `objectTypes`, `objectId`, ...).
//! Only E2O relationships and timestamps are used by discovery; attributes are carried along.
use chrono::{DateTime, FixedOffset};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Object-centric event log in the OCEL 2.0 format
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, JsonSchema)]
pub struct OCEL {
    /// Declared activities
    #[serde(rename = "eventTypes")]
    pub event_types: Vec<OCELType>,
    /// Declared object types
    #[serde(rename = "objectTypes")]
    pub object_types: Vec<OCELType>,
    /// Events
    #[serde(default)]
    pub events: Vec<OCELEvent>,
    /// Objects
    #[serde(default)]
    pub objects: Vec<OCELObject>,
}

/// Declaration of an activity or object type
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct OCELType {
    /// Activity or object type
    pub name: String,
    /// Declared attributes
    #[serde(default)]
    pub attributes: Vec<OCELTypeAttribute>,
}

impl OCELType {
    /// Declaration without attributes
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }
}

/// Declared attribute of a type
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, JsonSchema)]
pub struct OCELTypeAttribute {
    /// Attribute name
    pub name: String,
    /// Value type (e.g., `string`, `float`, `time`)
    #[serde(rename = "type")]
    pub value_type: String,
}

/// Attribute value of an event
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct OCELEventAttribute {
    /// Attribute name
    pub name: String,
    /// Value
    pub value: OCELAttributeValue,
}

/// An event with its E2O relationships
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct OCELEvent {
    /// Unique event ID
    pub id: String,
    /// Activity
    #[serde(rename = "type")]
    pub event_type: String,
    /// Timestamp
    pub time: DateTime<FixedOffset>,
    /// Attribute values
    #[serde(default)]
    pub attributes: Vec<OCELEventAttribute>,
    /// Related objects
    #[serde(default)]
    pub relationships: Vec<OCELRelationship>,
}

impl OCELEvent {
    /// Create an event
    pub fn new<I: Into<String>, T: Into<String>>(
        id: I,
        event_type: T,
        time: DateTime<FixedOffset>,
        attributes: Vec<OCELEventAttribute>,
        relationships: Vec<OCELRelationship>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            time,
            attributes,
            relationships,
        }
    }
}

/// Qualified reference to an object (E2O or O2O)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct OCELRelationship {
    /// Referenced object
    #[serde(rename = "objectId")]
    pub object_id: String,
    /// Qualifier
    pub qualifier: String,
}

impl OCELRelationship {
    /// Create a relationship
    pub fn new<I: Into<String>, Q: Into<String>>(object_id: I, qualifier: Q) -> Self {
        Self {
            object_id: object_id.into(),
            qualifier: qualifier.into(),
        }
    }
}

/// An object with its O2O relationships
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct OCELObject {
    /// Unique object ID
    pub id: String,
    /// Object type
    #[serde(rename = "type")]
    pub object_type: String,
    /// Timed attribute values
    #[serde(default)]
    pub attributes: Vec<OCELObjectAttribute>,
    /// Related objects
    #[serde(default)]
    pub relationships: Vec<OCELRelationship>,
}

/// Attribute value of an object, valid from `time` on
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
pub struct OCELObjectAttribute {
    /// Attribute name
    pub name: String,
    /// Value
    pub value: OCELAttributeValue,
    /// Start of validity
    pub time: DateTime<FixedOffset>,
}

/// Attribute value (untagged in JSON)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum OCELAttributeValue {
    /// Timestamp
    Time(DateTime<FixedOffset>),
    /// Integer
    Integer(i64),
    /// Float
    Float(f64),
    /// Boolean
    Boolean(bool),
    /// Text
    String(String),
    /// Missing or unparsable value
    Null,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocel_json_layout() {
        let json = r#"{
            "eventTypes": [{"name": "Create Order", "attributes": []}],
            "objectTypes": [{"name": "Order", "attributes": [{"name": "price", "type": "float"}]}],
            "events": [{
                "id": "e1",
                "type": "Create Order",
                "time": "2020-01-01T00:00:00+01:00",
                "relationships": [{"objectId": "o1", "qualifier": "order"}]
            }],
            "objects": [{"id": "o1", "type": "Order", "attributes": [
                {"name": "price", "value": 2.5, "time": "2020-01-01T00:00:00Z"}
            ]}]
        }"#;
        let ocel: OCEL = serde_json::from_str(json).unwrap();
        assert_eq!(ocel.events[0].relationships[0].object_id, "o1");
        assert_eq!(ocel.object_types[0].attributes[0].value_type, "float");
        assert_eq!(ocel.objects[0].attributes[0].value, OCELAttributeValue::Float(2.5));
        assert!(ocel.objects[0].relationships.is_empty());

        let back: OCEL = serde_json::from_str(&serde_json::to_string(&ocel).unwrap()).unwrap();
        assert_eq!(back, ocel);
    }
}
