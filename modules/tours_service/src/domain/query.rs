//! Query translation: raw URL parameters to a single read operation
//!
//! `QueryTranslator` threads an immutable `QuerySpec` through four stages
//! (`filter`, `sort`, `limit_fields`, `paginate`). Each stage consumes the
//! translator and returns a new one, so stages compose in any order. Nothing
//! touches storage until `execute`.

use crate::contract::{Collection, Document, StorageError, CREATED_AT_FIELD, VERSION_FIELD};
use crate::domain::repository::DocumentStore;
use serde_json::{json, Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Control keys that never become filter conditions
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

// ===== Raw parameters =====

/// Value of one query parameter; repeated keys collapse into `Multi`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// Every value in arrival order
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(v) => vec![v.as_str()],
            Self::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// The last value given, which wins for scalar parameters
    pub fn last(&self) -> &str {
        match self {
            Self::Single(v) => v,
            Self::Multi(vs) => vs.last().map(String::as_str).unwrap_or_default(),
        }
    }

    /// All values joined with commas, for list-shaped parameters
    pub fn joined(&self) -> String {
        self.values().join(",")
    }

    fn push(&mut self, value: String) {
        match self {
            Self::Single(first) => {
                *self = Self::Multi(vec![std::mem::take(first), value]);
            }
            Self::Multi(vs) => vs.push(value),
        }
    }
}

/// Query parameters of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded `key=value` pairs, keeping repeated keys
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map: BTreeMap<String, ParamValue> = BTreeMap::new();
        for (key, value) in pairs {
            match map.entry(key.into()) {
                Entry::Vacant(slot) => {
                    slot.insert(ParamValue::Single(value.into()));
                }
                Entry::Occupied(mut slot) => slot.get_mut().push(value.into()),
            }
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Replace a parameter, dropping earlier values for the key
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), ParamValue::Single(value.into()));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ===== Query specification =====

/// Inclusive/exclusive bounds on one field
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Range {
    pub gte: Option<Value>,
    pub gt: Option<Value>,
    pub lte: Option<Value>,
    pub lt: Option<Value>,
}

impl Range {
    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.gt.is_none() && self.lte.is_none() && self.lt.is_none()
    }

    fn bounds_mut(&mut self) -> [(&'static str, &mut Option<Value>); 4] {
        [
            ("gte", &mut self.gte),
            ("gt", &mut self.gt),
            ("lte", &mut self.lte),
            ("lt", &mut self.lt),
        ]
    }

    pub fn bounds(&self) -> [(&'static str, &Option<Value>); 4] {
        [
            ("gte", &self.gte),
            ("gt", &self.gt),
            ("lte", &self.lte),
            ("lt", &self.lt),
        ]
    }
}

/// Condition on one field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    In(Vec<Value>),
    Range(Range),
}

impl Condition {
    /// Store-style rendering (`$in`, `$gte`, ...), used in logs
    pub fn to_json(&self) -> Value {
        match self {
            Self::Eq(v) => v.clone(),
            Self::In(vs) => json!({ "$in": vs }),
            Self::Range(range) => {
                let mut map = Map::new();
                for (op, bound) in range.bounds() {
                    if let Some(v) = bound {
                        map.insert(format!("${}", op), v.clone());
                    }
                }
                Value::Object(map)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub skip: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            skip: page.saturating_sub(1).saturating_mul(limit),
        }
    }
}

/// Filter, sort, projection and pagination of one read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    filter: BTreeMap<String, Condition>,
    sort: Vec<SortKey>,
    projection: Projection,
    pagination: Option<Pagination>,
}

impl QuerySpec {
    pub fn filter(&self) -> &BTreeMap<String, Condition> {
        &self.filter
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.pagination
    }

    /// Filter rendered as a store-style document
    pub fn filter_document(&self) -> Value {
        Value::Object(
            self.filter
                .iter()
                .map(|(field, cond)| (field.clone(), cond.to_json()))
                .collect(),
        )
    }
}

// ===== Filter policy =====

/// Which fields a collection lets callers filter on
#[derive(Debug, Clone, Copy)]
pub struct FilterPolicy {
    /// Fields matched by exact value
    pub exact_fields: &'static [&'static str],
    /// Fields that accept `min*`/`max*` and `field[op]` bounds
    pub range_fields: &'static [&'static str],
}

impl FilterPolicy {
    fn is_exact(&self, key: &str) -> bool {
        self.exact_fields.contains(&key)
    }
}

/// `price` -> `Price`, for `minPrice`/`maxPrice`
fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parse a raw parameter into a JSON scalar
pub fn coerce(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        if float.is_finite() {
            return json!(float);
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

// ===== Stages =====

/// Exact matches first, then ranges, so a range overwrites an exact match
/// on the same field.
fn filter_stage(
    mut spec: QuerySpec,
    params: &QueryParams,
    policy: &FilterPolicy,
) -> QuerySpec {
    let mut filter = BTreeMap::new();

    for (key, value) in params.iter() {
        if RESERVED_KEYS.contains(&key.as_str()) || !policy.is_exact(key) {
            continue;
        }
        let condition = match value {
            ParamValue::Single(v) => Condition::Eq(coerce(v)),
            ParamValue::Multi(vs) => Condition::In(vs.iter().map(|v| coerce(v)).collect()),
        };
        filter.insert(key.clone(), condition);
    }

    for field in policy.range_fields {
        let mut range = Range::default();
        let suffix = capitalize(field);
        if let Some(min) = params.get(&format!("min{}", suffix)) {
            range.gte = Some(coerce(min.last()));
        }
        if let Some(max) = params.get(&format!("max{}", suffix)) {
            range.lte = Some(coerce(max.last()));
        }
        for (op, bound) in range.bounds_mut() {
            if let Some(value) = params.get(&format!("{}[{}]", field, op)) {
                *bound = Some(coerce(value.last()));
            }
        }
        if !range.is_empty() {
            filter.insert((*field).to_string(), Condition::Range(range));
        }
    }

    spec.filter = filter;
    spec
}

/// Comma list with optional `-` prefixes, or `-createdAt` by default
fn sort_stage(mut spec: QuerySpec, params: &QueryParams) -> QuerySpec {
    let keys: Vec<SortKey> = params
        .get("sort")
        .map(|v| v.joined())
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty() && *f != "-")
        .map(|f| match f.strip_prefix('-') {
            Some(field) => SortKey::desc(field),
            None => SortKey::asc(f),
        })
        .collect();

    spec.sort = if keys.is_empty() {
        vec![SortKey::desc(CREATED_AT_FIELD)]
    } else {
        keys
    };
    spec
}

/// Inclusion list, exclusion list when every entry is negated, or hide `__v`
fn limit_fields_stage(mut spec: QuerySpec, params: &QueryParams) -> QuerySpec {
    let fields: Vec<String> = params
        .get("fields")
        .map(|v| v.joined())
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty() && *f != "-")
        .map(str::to_string)
        .collect();

    spec.projection = if fields.is_empty() {
        Projection::Exclude(vec![VERSION_FIELD.to_string()])
    } else if fields.iter().all(|f| f.starts_with('-')) {
        Projection::Exclude(fields.iter().map(|f| f[1..].to_string()).collect())
    } else {
        Projection::Include(fields.into_iter().filter(|f| !f.starts_with('-')).collect())
    };
    spec
}

fn positive(params: &QueryParams, key: &str, default: u64) -> u64 {
    params
        .get(key)
        .and_then(|v| v.last().trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

/// `limit` has no upper bound
fn paginate_stage(mut spec: QuerySpec, params: &QueryParams) -> QuerySpec {
    let page = positive(params, "page", DEFAULT_PAGE);
    let limit = positive(params, "limit", DEFAULT_LIMIT);
    spec.pagination = Some(Pagination::new(page, limit));
    spec
}

// ===== Translator =====

/// Fluent front end over the stages
#[derive(Debug, Clone)]
pub struct QueryTranslator<'a> {
    params: &'a QueryParams,
    spec: QuerySpec,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(params: &'a QueryParams) -> Self {
        Self {
            params,
            spec: QuerySpec::default(),
        }
    }

    pub fn filter(self, policy: &FilterPolicy) -> Self {
        Self {
            spec: filter_stage(self.spec, self.params, policy),
            ..self
        }
    }

    pub fn sort(self) -> Self {
        Self {
            spec: sort_stage(self.spec, self.params),
            ..self
        }
    }

    pub fn limit_fields(self) -> Self {
        Self {
            spec: limit_fields_stage(self.spec, self.params),
            ..self
        }
    }

    pub fn paginate(self) -> Self {
        Self {
            spec: paginate_stage(self.spec, self.params),
            ..self
        }
    }

    pub fn into_spec(self) -> QuerySpec {
        self.spec
    }

    /// Run the read; the spec is consumed
    pub async fn execute(
        self,
        store: &dyn DocumentStore,
        collection: Collection,
    ) -> Result<Vec<Document>, StorageError> {
        tracing::debug!(
            collection = %collection,
            filter = %self.spec.filter_document(),
            "executing query"
        );
        store.find(collection, &self.spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOURS: FilterPolicy = FilterPolicy {
        exact_fields: &["difficulty", "price", "duration"],
        range_fields: &["duration", "price"],
    };

    fn params(query: &[(&str, &str)]) -> QueryParams {
        QueryParams::from_pairs(query.iter().copied())
    }

    #[test]
    fn reserved_and_undesignated_keys_are_dropped() {
        let p = params(&[
            ("page", "2"),
            ("sort", "price"),
            ("limit", "5"),
            ("fields", "name"),
            ("difficulty", "easy"),
            ("secretTour", "true"),
        ]);
        let spec = QueryTranslator::new(&p).filter(&TOURS).into_spec();
        assert_eq!(spec.filter().len(), 1);
        assert_eq!(
            spec.filter().get("difficulty"),
            Some(&Condition::Eq(json!("easy")))
        );
    }

    #[test]
    fn closed_range_from_min_and_max() {
        let p = params(&[("minPrice", "10"), ("maxPrice", "100")]);
        let spec = QueryTranslator::new(&p).filter(&TOURS).into_spec();
        assert_eq!(spec.filter_document(), json!({ "price": { "$gte": 10, "$lte": 100 } }));
    }

    #[test]
    fn one_sided_range() {
        let p = params(&[("minDuration", "5")]);
        let spec = QueryTranslator::new(&p).filter(&TOURS).into_spec();
        assert_eq!(spec.filter_document(), json!({ "duration": { "$gte": 5 } }));
    }

    #[test]
    fn range_overwrites_exact_match() {
        let p = params(&[("price", "50"), ("minPrice", "10"), ("maxPrice", "100")]);
        let spec = QueryTranslator::new(&p).filter(&TOURS).into_spec();
        assert_eq!(
            spec.filter().get("price"),
            Some(&Condition::Range(Range {
                gte: Some(json!(10)),
                lte: Some(json!(100)),
                ..Range::default()
            }))
        );
    }

    #[test]
    fn bracket_operators() {
        let p = params(&[("duration[gt]", "3"), ("price[lt]", "1500.5")]);
        let spec = QueryTranslator::new(&p).filter(&TOURS).into_spec();
        assert_eq!(
            spec.filter_document(),
            json!({ "duration": { "$gt": 3 }, "price": { "$lt": 1500.5 } })
        );
    }

    #[test]
    fn repeated_exact_values_become_in() {
        let p = params(&[("difficulty", "easy"), ("difficulty", "medium")]);
        let spec = QueryTranslator::new(&p).filter(&TOURS).into_spec();
        assert_eq!(
            spec.filter_document(),
            json!({ "difficulty": { "$in": ["easy", "medium"] } })
        );
    }

    #[test]
    fn coercion() {
        assert_eq!(coerce("42"), json!(42));
        assert_eq!(coerce("4.5"), json!(4.5));
        assert_eq!(coerce("true"), json!(true));
        assert_eq!(coerce("NaN"), json!("NaN"));
        assert_eq!(coerce("easy"), json!("easy"));
    }

    #[test]
    fn sort_defaults_to_newest_first() {
        let p = QueryParams::new();
        let spec = QueryTranslator::new(&p).sort().into_spec();
        assert_eq!(spec.sort_keys(), &[SortKey::desc("createdAt")]);
    }

    #[test]
    fn sort_parses_directions_in_order() {
        let p = params(&[("sort", "-ratingsAverage, price,")]);
        let spec = QueryTranslator::new(&p).sort().into_spec();
        assert_eq!(
            spec.sort_keys(),
            &[SortKey::desc("ratingsAverage"), SortKey::asc("price")]
        );

        let p = params(&[("sort", "price"), ("sort", "-duration")]);
        let spec = QueryTranslator::new(&p).sort().into_spec();
        assert_eq!(spec.sort_keys(), &[SortKey::asc("price"), SortKey::desc("duration")]);
    }

    #[test]
    fn projection_variants() {
        let p = QueryParams::new();
        let spec = QueryTranslator::new(&p).limit_fields().into_spec();
        assert_eq!(spec.projection(), &Projection::Exclude(vec!["__v".to_string()]));

        let p = params(&[("fields", "name,price")]);
        let spec = QueryTranslator::new(&p).limit_fields().into_spec();
        assert_eq!(
            spec.projection(),
            &Projection::Include(vec!["name".to_string(), "price".to_string()])
        );

        let p = params(&[("fields", "-description,-images")]);
        let spec = QueryTranslator::new(&p).limit_fields().into_spec();
        assert_eq!(
            spec.projection(),
            &Projection::Exclude(vec!["description".to_string(), "images".to_string()])
        );
    }

    #[test]
    fn pagination_defaults_and_skip() {
        let p = QueryParams::new();
        let spec = QueryTranslator::new(&p).paginate().into_spec();
        assert_eq!(spec.pagination(), Some(Pagination { page: 1, limit: 10, skip: 0 }));

        let p = params(&[("page", "2"), ("limit", "10")]);
        let spec = QueryTranslator::new(&p).paginate().into_spec();
        assert_eq!(spec.pagination().map(|p| p.skip), Some(10));
    }

    #[test]
    fn pagination_rejects_garbage_but_not_large_limits() {
        let p = params(&[("page", "abc"), ("limit", "0")]);
        let spec = QueryTranslator::new(&p).paginate().into_spec();
        assert_eq!(spec.pagination(), Some(Pagination { page: 1, limit: 10, skip: 0 }));

        let p = params(&[("page", "3"), ("limit", "100000")]);
        let spec = QueryTranslator::new(&p).paginate().into_spec();
        assert_eq!(
            spec.pagination(),
            Some(Pagination { page: 3, limit: 100000, skip: 200000 })
        );
    }

    #[test]
    fn stage_order_does_not_matter() {
        let p = params(&[("sort", "price"), ("page", "2"), ("difficulty", "easy")]);
        let a = QueryTranslator::new(&p)
            .filter(&TOURS)
            .sort()
            .limit_fields()
            .paginate()
            .into_spec();
        let b = QueryTranslator::new(&p)
            .paginate()
            .limit_fields()
            .sort()
            .filter(&TOURS)
            .into_spec();
        assert_eq!(a, b);
    }

    #[test]
    fn untouched_stages_keep_defaults() {
        let p = params(&[("sort", "price")]);
        let spec = QueryTranslator::new(&p).into_spec();
        assert!(spec.filter().is_empty());
        assert!(spec.sort_keys().is_empty());
        assert_eq!(spec.projection(), &Projection::All);
        assert_eq!(spec.pagination(), None);
    }
}
