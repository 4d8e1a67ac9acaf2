use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{AttributeValue, Item, ScanOutput, Store};
use crate::{
    error::Error,
    scan::{ComparisonOperator, Condition, ScanRequest},
};

#[derive(Debug)]
pub enum MemoryStoreError {
    TableNotFound(String),
    Validation(String),
    Poisoned,
}

impl fmt::Display for MemoryStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TableNotFound(name) => write!(f, "Table not found: {}", name),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::Poisoned => write!(f, "Store lock poisoned"),
        }
    }
}

impl std::error::Error for MemoryStoreError {}

impl From<MemoryStoreError> for Error {
    fn from(err: MemoryStoreError) -> Self {
        Error::store(err)
    }
}

struct MemoryTable {
    key: Vec<String>,
    rows: Vec<Item>,
}

impl MemoryTable {
    fn key_of(&self, row: &Item) -> Result<Item, MemoryStoreError> {
        self.key
            .iter()
            .map(|name| {
                row.get(name)
                    .map(|value| (name.clone(), value.clone()))
                    .ok_or_else(|| {
                        MemoryStoreError::Validation(format!("missing key attribute `{}`", name))
                    })
            })
            .collect()
    }

    fn position(&self, key: &Item) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| self.key.iter().all(|name| row.get(name) == key.get(name)))
    }
}

/// Table store kept in process memory.
///
/// Rows are scanned in insertion order. Cloning shares the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or reset) a table keyed by the given attributes.
    pub fn create_table(&self, name: &str, key: &[&str]) -> Result<(), Error> {
        let mut tables = self.tables.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        tables.insert(
            name.to_string(),
            MemoryTable {
                key: key.iter().map(|k| k.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        Ok(())
    }

    /// Insert a row, replacing any row with the same key.
    pub fn put(&self, table: &str, item: Item) -> Result<(), Error> {
        let mut tables = self.tables.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        let table = tables
            .get_mut(table)
            .ok_or_else(|| MemoryStoreError::TableNotFound(table.to_string()))?;

        let key = table.key_of(&item)?;
        match table.position(&key) {
            Some(index) => table.rows[index] = item,
            None => table.rows.push(item),
        }
        Ok(())
    }

    pub fn row_count(&self, table: &str) -> Result<usize, Error> {
        let tables = self.tables.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        tables
            .get(table)
            .map(|t| t.rows.len())
            .ok_or_else(|| MemoryStoreError::TableNotFound(table.to_string()).into())
    }

    fn scan_table(&self, request: &ScanRequest) -> Result<ScanOutput, MemoryStoreError> {
        let tables = self.tables.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| MemoryStoreError::TableNotFound(request.table_name.clone()))?;

        if request.limit == Some(0) {
            return Err(MemoryStoreError::Validation(
                "limit must be at least 1".to_string(),
            ));
        }
        let conditions = request.scan_filter.clone().unwrap_or_default();
        for (name, condition) in &conditions {
            validate(name, condition)?;
        }

        let start = match &request.exclusive_start_key {
            Some(key) => {
                table.position(key).ok_or_else(|| {
                    MemoryStoreError::Validation(
                        "exclusive start key does not match any item".to_string(),
                    )
                })? + 1
            }
            None => 0,
        };

        let remaining = &table.rows[start..];
        let budget = request
            .limit
            .map(|limit| limit as usize)
            .unwrap_or(remaining.len())
            .min(remaining.len());
        let evaluated = &remaining[..budget];

        let items: Vec<Item> = evaluated
            .iter()
            .filter(|row| {
                conditions
                    .iter()
                    .all(|(name, condition)| evaluate(condition, row.get(name)))
            })
            .map(|row| project(row, request.attributes_to_get.as_deref()))
            .collect();

        let last_evaluated_key = if budget < remaining.len() {
            evaluated.last().map(|row| table.key_of(row)).transpose()?
        } else {
            None
        };

        Ok(ScanOutput {
            count: Some(items.len() as u32),
            scanned_count: Some(evaluated.len() as u32),
            items: Some(items),
            last_evaluated_key,
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn scan(&self, request: ScanRequest) -> Result<ScanOutput, Error> {
        Ok(self.scan_table(&request)?)
    }
}

fn validate(name: &str, condition: &Condition) -> Result<(), MemoryStoreError> {
    let operator = condition.comparison_operator;
    let count = condition.attribute_value_list.len();
    let valid = match operator.arity() {
        Some(arity) => count == arity,
        None => count > 0,
    };
    if valid {
        Ok(())
    } else {
        Err(MemoryStoreError::Validation(format!(
            "{} on `{}` cannot take {} operand(s)",
            operator, name, count
        )))
    }
}

fn project(row: &Item, attributes: Option<&[String]>) -> Item {
    match attributes {
        Some(names) => row
            .iter()
            .filter(|(name, _)| names.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        None => row.clone(),
    }
}

fn evaluate(condition: &Condition, value: Option<&AttributeValue>) -> bool {
    use ComparisonOperator as Op;

    let operands = &condition.attribute_value_list;
    match (condition.comparison_operator, value) {
        (Op::Null, value) => value.is_none(),
        (Op::NotNull, value) => value.is_some(),
        (Op::Ne, None) | (Op::NotContains, None) => true,
        (_, None) => false,
        (Op::Eq, Some(v)) => equals(v, &operands[0]),
        (Op::Ne, Some(v)) => !equals(v, &operands[0]),
        (Op::Lt, Some(v)) => compare(v, &operands[0]) == Some(Ordering::Less),
        (Op::Le, Some(v)) => matches!(
            compare(v, &operands[0]),
            Some(Ordering::Less | Ordering::Equal)
        ),
        (Op::Gt, Some(v)) => compare(v, &operands[0]) == Some(Ordering::Greater),
        (Op::Ge, Some(v)) => matches!(
            compare(v, &operands[0]),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        (Op::Contains, Some(v)) => contains(v, &operands[0]),
        (Op::NotContains, Some(v)) => !contains(v, &operands[0]),
        (Op::BeginsWith, Some(v)) => match (v, &operands[0]) {
            (AttributeValue::S(s), AttributeValue::S(prefix)) => s.starts_with(prefix.as_str()),
            _ => false,
        },
        (Op::In, Some(v)) => operands.iter().any(|operand| equals(v, operand)),
        (Op::Between, Some(v)) => {
            matches!(
                compare(v, &operands[0]),
                Some(Ordering::Greater | Ordering::Equal)
            ) && matches!(
                compare(v, &operands[1]),
                Some(Ordering::Less | Ordering::Equal)
            )
        }
    }
}

fn compare_numbers(a: &str, b: &str) -> Option<Ordering> {
    // Integers beyond 2^53 lose precision as f64.
    if let (Ok(a), Ok(b)) = (a.parse::<i64>(), b.parse::<i64>()) {
        return Some(a.cmp(&b));
    }
    a.parse::<f64>().ok()?.partial_cmp(&b.parse::<f64>().ok()?)
}

fn compare(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    match (a, b) {
        (AttributeValue::N(a), AttributeValue::N(b)) => compare_numbers(a, b),
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn equals(a: &AttributeValue, b: &AttributeValue) -> bool {
    match (a, b) {
        (AttributeValue::N(_), AttributeValue::N(_)) => compare(a, b) == Some(Ordering::Equal),
        (AttributeValue::Ss(a), AttributeValue::Ss(b)) => {
            let mut a = a.clone();
            let mut b = b.clone();
            a.sort();
            b.sort();
            a == b
        }
        _ => a == b,
    }
}

fn contains(haystack: &AttributeValue, needle: &AttributeValue) -> bool {
    match (haystack, needle) {
        (AttributeValue::S(s), AttributeValue::S(sub)) => s.contains(sub.as_str()),
        (AttributeValue::Ss(members), AttributeValue::S(s)) => members.contains(s),
        (AttributeValue::Ns(members), AttributeValue::N(_)) => members
            .iter()
            .any(|member| equals(&AttributeValue::N(member.clone()), needle)),
        (AttributeValue::L(items), needle) => items.iter().any(|item| equals(item, needle)),
        _ => false,
    }
}

/// Build an `Item` from `(name, value)` pairs.
pub fn item<I, K>(pairs: I) -> Item
where
    I: IntoIterator<Item = (K, AttributeValue)>,
    K: Into<String>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value))
        .collect::<BTreeMap<_, _>>()
}
