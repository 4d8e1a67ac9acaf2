use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    adapters::{AttributeValue, Item},
    error::Error,
    query::Value,
    schema::Schema,
    scan::operator::ComparisonOperator,
};

/// -----------------------------
/// Scan Request (storage contract)
/// -----------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScanRequest {
    pub table_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_filter: Option<BTreeMap<String, Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes_to_get: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_start_key: Option<Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Condition {
    pub attribute_value_list: Vec<AttributeValue>,
    pub comparison_operator: ComparisonOperator,
}

/// A finalized filter on one attribute, with literals not yet encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub name: String,
    pub operator: ComparisonOperator,
    pub values: Vec<Value>,
}

/// Opaque position to resume a scan from, as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Item);

impl Cursor {
    pub fn new(key: Item) -> Self {
        Self(key)
    }

    pub fn key(&self) -> &Item {
        &self.0
    }
}

/// Scan configuration. Can be loaded from any serde source and handed to
/// `Engine::scan_with`; chained option calls override it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Projection: only these attributes are returned
    pub attributes: Option<Vec<String>>,
    /// Maximum number of rows the store evaluates for one page. Zero means
    /// no limit.
    pub limit: Option<u32>,
    pub exclusive_start_key: Option<Cursor>,
}

impl ScanRequest {
    /// Translate finalized filters and options into a store request.
    ///
    /// Every literal is encoded through the schema before anything is sent,
    /// so encoding failures never reach the store.
    pub fn build(
        table: &str,
        schema: &Schema,
        filters: &BTreeMap<String, Filter>,
        options: &ScanOptions,
    ) -> Result<Self, Error> {
        let scan_filter = if filters.is_empty() {
            None
        } else {
            let mut conditions = BTreeMap::new();
            for (name, filter) in filters {
                let attribute = schema.get(name).ok_or_else(|| {
                    Error::Encoding(format!("`{}` is not an attribute of `{}`", name, table))
                })?;
                let attribute_value_list = filter
                    .values
                    .iter()
                    .map(|value| attribute.to_wire(value, true))
                    .collect::<Result<Vec<_>, _>>()?;
                conditions.insert(
                    name.clone(),
                    Condition {
                        attribute_value_list,
                        comparison_operator: filter.operator,
                    },
                );
            }
            Some(conditions)
        };

        Ok(Self {
            table_name: table.to_string(),
            scan_filter,
            attributes_to_get: options.attributes.clone(),
            limit: options.limit.filter(|limit| *limit > 0),
            exclusive_start_key: options
                .exclusive_start_key
                .as_ref()
                .map(|cursor| cursor.key().clone()),
        })
    }
}
