use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A stored row: attribute name to typed wire value.
pub type Item = BTreeMap<String, AttributeValue>;

/// Typed wire representation of a single attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Numbers travel as decimal strings.
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null(true))
    }

    /// Wire tag of the value, as it appears in serialized form.
    pub fn tag(&self) -> &'static str {
        match self {
            AttributeValue::S(_) => "S",
            AttributeValue::N(_) => "N",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::Null(_) => "NULL",
            AttributeValue::Ss(_) => "SS",
            AttributeValue::Ns(_) => "NS",
            AttributeValue::L(_) => "L",
            AttributeValue::M(_) => "M",
        }
    }
}

/// Raw response of a store scan.
///
/// A response without `items` is treated as an empty page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<Item>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scanned_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_key: Option<Item>,
}

impl ScanOutput {
    pub fn new(items: Vec<Item>, last_evaluated_key: Option<Item>) -> Self {
        let count = items.len() as u32;
        Self {
            items: Some(items),
            count: Some(count),
            scanned_count: None,
            last_evaluated_key,
        }
    }
}
