pub mod operator;
pub mod request;

use std::{collections::BTreeMap, marker::PhantomData, time::Instant};

use metrics::histogram;
use tracing::{debug, trace};

pub use operator::*;
pub use request::*;

use crate::{
    adapters::Store,
    error::Error,
    object::Object,
    query::{ToValue, Value},
};

/// Where the builder is in the `filter(name)` → comparison cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BuildState {
    Idle,
    Selected(String),
    SelectedNegated(String),
}

/// One page of scan results.
#[derive(Debug)]
pub struct ScanPage<T> {
    pub items: Vec<T>,
    /// Where the next page starts. `None` once the table is exhausted.
    pub last_key: Option<Cursor>,
}

impl<T> ScanPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            last_key: None,
        }
    }

    pub fn is_last(&self) -> bool {
        self.last_key.is_none()
    }
}

/// Fluent scan builder.
///
/// ```rust,ignore
/// let page = engine
///     .scan_where::<User>("age")
///     .ge(21)?
///     .filter("tags")?
///     .not()?
///     .contains("banned")?
///     .limit(50)
///     .exec()
///     .await?;
/// ```
///
/// Each attribute can be filtered once; filters are combined with AND.
/// Ordering mistakes fail at the offending call.
pub struct Scan<'a, T>
where
    T: Object,
{
    store: &'a dyn Store,
    state: BuildState,
    filters: BTreeMap<String, Filter>,
    options: ScanOptions,
    _marker: PhantomData<T>,
}

impl<T: Object> std::fmt::Debug for Scan<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scan")
            .field("table", &T::TABLE)
            .field("state", &self.state)
            .field("filters", &self.filters)
            .field("options", &self.options)
            .finish()
    }
}

impl<'a, T> Scan<'a, T>
where
    T: Object,
{
    pub fn new(store: &'a dyn Store) -> Self {
        Self::with_options(store, ScanOptions::default())
    }

    pub fn with_options(store: &'a dyn Store, options: ScanOptions) -> Self {
        Self {
            store,
            state: BuildState::Idle,
            filters: BTreeMap::new(),
            options,
            _marker: PhantomData,
        }
    }

    /// Scan whose first comparison applies to `attribute`.
    pub fn with_attribute(store: &'a dyn Store, attribute: impl Into<String>) -> Self {
        let mut scan = Self::new(store);
        scan.state = BuildState::Selected(attribute.into());
        scan
    }

    /// Select the attribute the next comparison applies to.
    pub fn filter(mut self, attribute: impl Into<String>) -> Result<Self, Error> {
        let attribute = attribute.into();
        if let BuildState::Selected(pending) | BuildState::SelectedNegated(pending) = &self.state {
            return Err(Error::InvalidState(format!(
                "filter(\"{}\") must follow a comparison on `{}`",
                attribute, pending
            )));
        }
        if self.filters.contains_key(&attribute) {
            return Err(Error::InvalidState(format!(
                "`{}` can only be filtered once",
                attribute
            )));
        }

        self.state = BuildState::Selected(attribute);
        Ok(self)
    }

    pub fn and(self) -> Self {
        self
    }

    /// Negate the pending comparison. Repeated calls keep it negated.
    pub fn not(mut self) -> Result<Self, Error> {
        self.state = match std::mem::replace(&mut self.state, BuildState::Idle) {
            BuildState::Idle => {
                return Err(Error::InvalidState(
                    "not() must follow scan(\"attribute\") or filter(\"attribute\")".to_string(),
                ));
            }
            BuildState::Selected(name) | BuildState::SelectedNegated(name) => {
                BuildState::SelectedNegated(name)
            }
        };
        Ok(self)
    }

    pub fn null(self) -> Result<Self, Error> {
        self.compare(Comparison::Null, Vec::new())
    }

    pub fn eq(self, value: impl ToValue) -> Result<Self, Error> {
        self.compare(Comparison::Eq, vec![value.to_value()])
    }

    pub fn lt(self, value: impl ToValue) -> Result<Self, Error> {
        self.compare(Comparison::Lt, vec![value.to_value()])
    }

    pub fn le(self, value: impl ToValue) -> Result<Self, Error> {
        self.compare(Comparison::Le, vec![value.to_value()])
    }

    pub fn ge(self, value: impl ToValue) -> Result<Self, Error> {
        self.compare(Comparison::Ge, vec![value.to_value()])
    }

    pub fn gt(self, value: impl ToValue) -> Result<Self, Error> {
        self.compare(Comparison::Gt, vec![value.to_value()])
    }

    pub fn contains(self, value: impl ToValue) -> Result<Self, Error> {
        self.compare(Comparison::Contains, vec![value.to_value()])
    }

    pub fn begins_with(self, value: impl ToValue) -> Result<Self, Error> {
        self.compare(Comparison::BeginsWith, vec![value.to_value()])
    }

    pub fn is_in<I, V>(self, values: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = V>,
        V: ToValue,
    {
        let values = values.into_iter().map(|v| v.to_value()).collect();
        self.compare(Comparison::In, values)
    }

    pub fn between(self, low: impl ToValue, high: impl ToValue) -> Result<Self, Error> {
        self.compare(Comparison::Between, vec![low.to_value(), high.to_value()])
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn start_at(mut self, cursor: Cursor) -> Self {
        self.options.exclusive_start_key = Some(cursor);
        self
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    fn compare(mut self, comparison: Comparison, values: Vec<Value>) -> Result<Self, Error> {
        let (name, negated) = match std::mem::replace(&mut self.state, BuildState::Idle) {
            BuildState::Idle => {
                return Err(Error::InvalidState(format!(
                    "{} must follow scan(\"attribute\") or filter(\"attribute\")",
                    comparison.method()
                )));
            }
            BuildState::Selected(name) => (name, false),
            BuildState::SelectedNegated(name) => (name, true),
        };

        let operator = comparison.operator(negated).ok_or_else(|| {
            Error::InvalidState(format!("{} cannot follow not()", comparison.method()))
        })?;

        self.filters.insert(
            name.clone(),
            Filter {
                name,
                operator,
                values,
            },
        );
        Ok(self)
    }

    /// The store request this scan would send.
    pub fn request(&self) -> Result<ScanRequest, Error> {
        if let BuildState::Selected(pending) | BuildState::SelectedNegated(pending) = &self.state {
            return Err(Error::InvalidState(format!(
                "filter on `{}` is missing a comparison",
                pending
            )));
        }
        ScanRequest::build(T::TABLE, T::schema(), &self.filters, &self.options)
    }

    /// Run the scan and materialize one page of objects.
    pub async fn exec(self) -> Result<ScanPage<T>, Error> {
        debug!(table = T::TABLE, filters = self.filters.len(), "exec scan");
        let request = self.request()?;
        debug!(?request, "scan request");

        let start = Instant::now();
        let output = self.store.scan(request).await.inspect_err(|err| {
            debug!(table = T::TABLE, error = %err, "error returned by scan");
        })?;
        histogram!("ousia.scan.duration_ms",
            "table" => T::TABLE
        )
        .record(start.elapsed().as_millis() as f64);
        debug!(
            count = ?output.count,
            scanned_count = ?output.scanned_count,
            "scan response"
        );

        let Some(rows) = output.items else {
            return Ok(ScanPage::empty());
        };

        let schema = T::schema();
        let items = rows
            .iter()
            .map(|row| {
                let mut obj = T::persisted();
                schema.parse_row(&mut obj, row)?;
                trace!(table = T::TABLE, "scan parsed object");
                Ok(obj)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(ScanPage {
            items,
            last_key: output.last_evaluated_key.map(Cursor::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use once_cell::sync::Lazy;
    use serde::Deserialize;

    use super::*;
    use crate::{
        adapters::{AttributeValue, Item, ScanOutput},
        object::{Meta, ObjectMeta},
        schema::{AttributeType, Schema},
    };

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct User {
        #[serde(skip)]
        _meta: Meta,
        id: String,
        age: i64,
        name: String,
        tags: Vec<String>,
    }

    impl Object for User {
        const TABLE: &'static str = "users";

        fn schema() -> &'static Schema {
            static SCHEMA: Lazy<Schema> = Lazy::new(|| {
                Schema::new()
                    .attribute("id", AttributeType::String)
                    .attribute("age", AttributeType::Number)
                    .attribute("name", AttributeType::String)
                    .attribute("tags", AttributeType::StringSet)
            });
            &SCHEMA
        }

        fn meta(&self) -> &Meta {
            &self._meta
        }

        fn meta_mut(&mut self) -> &mut Meta {
            &mut self._meta
        }
    }

    /// Returns a canned response and remembers what it was asked.
    #[derive(Default)]
    struct StubStore {
        response: Mutex<Option<Result<ScanOutput, Error>>>,
        requests: Mutex<Vec<ScanRequest>>,
    }

    impl StubStore {
        fn answering(response: Result<ScanOutput, Error>) -> Self {
            Self {
                response: Mutex::new(Some(response)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<ScanRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Store for StubStore {
        async fn scan(&self, request: ScanRequest) -> Result<ScanOutput, Error> {
            self.requests.lock().unwrap().push(request);
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(ScanOutput::default()))
        }
    }

    fn operator_of(request: &ScanRequest, name: &str) -> ComparisonOperator {
        request.scan_filter.as_ref().unwrap()[name].comparison_operator
    }

    fn row(id: &str, age: i64) -> Item {
        Item::from([
            ("id".to_string(), AttributeValue::S(id.to_string())),
            ("age".to_string(), AttributeValue::N(age.to_string())),
        ])
    }

    #[test]
    fn starting_attribute_accepts_comparison() {
        let store = StubStore::default();
        let request = Scan::<User>::with_attribute(&store, "age")
            .ge(21)
            .unwrap()
            .request()
            .unwrap();

        let condition = &request.scan_filter.unwrap()["age"];
        assert_eq!(condition.comparison_operator, ComparisonOperator::Ge);
        assert_eq!(
            condition.attribute_value_list,
            vec![AttributeValue::N("21".into())]
        );
    }

    #[test]
    fn negated_contains() {
        let store = StubStore::default();
        let request = Scan::<User>::new(&store)
            .filter("tags")
            .unwrap()
            .not()
            .unwrap()
            .contains("x")
            .unwrap()
            .request()
            .unwrap();

        let condition = &request.scan_filter.unwrap()["tags"];
        assert_eq!(condition.comparison_operator, ComparisonOperator::NotContains);
        assert_eq!(
            condition.attribute_value_list,
            vec![AttributeValue::S("x".into())]
        );
    }

    #[test]
    fn negation_round_trip() {
        let store = StubStore::default();
        let request = Scan::<User>::new(&store)
            .filter("age")
            .unwrap()
            .not()
            .unwrap()
            .lt(30)
            .unwrap()
            .filter("id")
            .unwrap()
            .not()
            .unwrap()
            .eq("u1")
            .unwrap()
            .and()
            .filter("name")
            .unwrap()
            .eq("bob")
            .unwrap()
            .request()
            .unwrap();

        assert_eq!(operator_of(&request, "age"), ComparisonOperator::Ge);
        assert_eq!(operator_of(&request, "id"), ComparisonOperator::Ne);
        assert_eq!(operator_of(&request, "name"), ComparisonOperator::Eq);
        assert_eq!(request.scan_filter.unwrap().len(), 3);
    }

    #[test]
    fn negated_gt_is_le() {
        let store = StubStore::default();
        let request = Scan::<User>::with_attribute(&store, "age")
            .not()
            .unwrap()
            .gt(30)
            .unwrap()
            .request()
            .unwrap();
        assert_eq!(operator_of(&request, "age"), ComparisonOperator::Le);
    }

    #[test]
    fn double_not_stays_negated() {
        let store = StubStore::default();
        let request = Scan::<User>::with_attribute(&store, "age")
            .not()
            .unwrap()
            .not()
            .unwrap()
            .null()
            .unwrap()
            .request()
            .unwrap();
        assert_eq!(operator_of(&request, "age"), ComparisonOperator::NotNull);
    }

    #[test]
    fn negation_resets_after_comparison() {
        let store = StubStore::default();
        let request = Scan::<User>::with_attribute(&store, "age")
            .not()
            .unwrap()
            .le(30)
            .unwrap()
            .filter("name")
            .unwrap()
            .begins_with("b")
            .unwrap()
            .request()
            .unwrap();
        assert_eq!(operator_of(&request, "age"), ComparisonOperator::Gt);
        assert_eq!(operator_of(&request, "name"), ComparisonOperator::BeginsWith);
    }

    #[test]
    fn in_and_between_operands() {
        let store = StubStore::default();
        let request = Scan::<User>::with_attribute(&store, "id")
            .is_in(["a", "b", "c"])
            .unwrap()
            .filter("age")
            .unwrap()
            .between(18, 65)
            .unwrap()
            .request()
            .unwrap();

        let filter = request.scan_filter.unwrap();
        assert_eq!(filter["id"].comparison_operator, ComparisonOperator::In);
        assert_eq!(filter["id"].attribute_value_list.len(), 3);
        assert_eq!(filter["age"].comparison_operator, ComparisonOperator::Between);
        assert_eq!(
            filter["age"].attribute_value_list,
            vec![AttributeValue::N("18".into()), AttributeValue::N("65".into())]
        );
    }

    #[test]
    fn comparison_without_attribute_fails() {
        let store = StubStore::default();
        let err = Scan::<User>::new(&store).eq(1).unwrap_err();
        assert!(err.is_invalid_state());

        let err = Scan::<User>::with_attribute(&store, "age")
            .eq(1)
            .unwrap()
            .gt(2)
            .unwrap_err();
        assert!(err.is_invalid_state());
    }

    #[test]
    fn not_without_attribute_fails() {
        let store = StubStore::default();
        assert!(Scan::<User>::new(&store).not().unwrap_err().is_invalid_state());
    }

    #[test]
    fn unnegatable_comparisons_fail_after_not() {
        let store = StubStore::default();
        let negated = || Scan::<User>::with_attribute(&store, "name").not().unwrap();

        assert!(negated().begins_with("b").unwrap_err().is_invalid_state());
        assert!(negated().is_in(["a"]).unwrap_err().is_invalid_state());
        assert!(negated().between("a", "m").unwrap_err().is_invalid_state());
    }

    #[test]
    fn attribute_can_only_be_filtered_once() {
        let store = StubStore::default();
        let err = Scan::<User>::with_attribute(&store, "age")
            .gt(1)
            .unwrap()
            .filter("age")
            .err()
            .unwrap();
        assert!(err.is_invalid_state());
    }

    #[test]
    fn filter_while_pending_fails() {
        let store = StubStore::default();
        let err = Scan::<User>::new(&store)
            .filter("age")
            .unwrap()
            .filter("name")
            .err()
            .unwrap();
        assert!(err.is_invalid_state());
    }

    #[test]
    fn pending_filter_blocks_request() {
        let store = StubStore::default();
        let scan = Scan::<User>::new(&store).filter("age").unwrap();
        assert!(scan.request().unwrap_err().is_invalid_state());
    }

    #[test]
    fn chained_options_override_config() {
        let store = StubStore::default();
        let options = ScanOptions {
            attributes: Some(vec!["id".into()]),
            limit: Some(5),
            exclusive_start_key: None,
        };
        let request = Scan::<User>::with_options(&store, options)
            .limit(10)
            .attributes(["id", "age"])
            .request()
            .unwrap();

        assert_eq!(request.scan_filter, None);
        assert_eq!(request.limit, Some(10));
        assert_eq!(
            request.attributes_to_get,
            Some(vec!["id".to_string(), "age".to_string()])
        );
    }

    #[tokio::test]
    async fn exec_materializes_rows_in_order() {
        let last = row("u2", 40);
        let store = StubStore::answering(Ok(ScanOutput::new(
            vec![row("u1", 30), row("u2", 40)],
            Some(last.clone()),
        )));

        let page = Scan::<User>::new(&store).exec().await.unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, "u1");
        assert_eq!(page.items[0].age, 30);
        assert_eq!(page.items[1].id, "u2");
        assert!(page.items.iter().all(|user| !user.is_new()));
        assert_eq!(page.last_key, Some(Cursor::new(last)));
        assert!(!page.is_last());
    }

    #[tokio::test]
    async fn exec_sends_options_verbatim() {
        let store = StubStore::default();
        let cursor = Cursor::new(row("u7", 1));

        Scan::<User>::with_attribute(&store, "age")
            .ge(21)
            .unwrap()
            .limit(3)
            .start_at(cursor.clone())
            .attributes(["id"])
            .exec()
            .await
            .unwrap();

        let requests = store.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].table_name, "users");
        assert_eq!(requests[0].limit, Some(3));
        assert_eq!(requests[0].exclusive_start_key.as_ref(), Some(cursor.key()));
        assert_eq!(requests[0].attributes_to_get, Some(vec!["id".to_string()]));
    }

    #[tokio::test]
    async fn empty_response_is_empty_page() {
        let store = StubStore::answering(Ok(ScanOutput::default()));
        let page = Scan::<User>::new(&store).exec().await.unwrap();
        assert!(page.items.is_empty());
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn zero_rows_have_no_cursor() {
        let store = StubStore::answering(Ok(ScanOutput::new(vec![], None)));
        let page = Scan::<User>::new(&store).exec().await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.last_key, None);
    }

    #[tokio::test]
    async fn store_error_is_returned_unchanged() {
        let store = StubStore::answering(Err(Error::store(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "access denied",
        ))));

        let err = Scan::<User>::new(&store).exec().await.unwrap_err();
        match err {
            Error::Store(inner) => {
                let io = inner.downcast_ref::<std::io::Error>().unwrap();
                assert_eq!(io.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn encoding_error_skips_store() {
        let store = StubStore::default();
        let err = Scan::<User>::with_attribute(&store, "age")
            .eq("old")
            .unwrap()
            .exec()
            .await
            .unwrap_err();

        assert!(err.is_encoding());
        assert!(store.requests().is_empty());
    }

    #[tokio::test]
    async fn bad_row_aborts_page() {
        let mut bad = row("u2", 1);
        bad.insert("age".to_string(), AttributeValue::S("old".into()));
        let store = StubStore::answering(Ok(ScanOutput::new(vec![row("u1", 30), bad], None)));

        let err = Scan::<User>::new(&store).exec().await.unwrap_err();
        assert!(err.is_decoding());
    }
}
