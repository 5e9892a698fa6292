use std::collections::BTreeMap;

use crate::saved_query::SavedQueryRecord;

pub const NAME_DEFAULT: &str = "Untitled query";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multiple(Vec<String>),
}

impl ParamValue {
    fn values(&self) -> &[String] {
        match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multiple(values) => values,
        }
    }

    fn first(&self) -> Option<&str> {
        self.values().first().map(String::as_str)
    }
}

/// Query-string parameters in deterministic key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_single(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), ParamValue::Single(value.into()));
    }

    /// Empty lists are not inserted.
    pub fn insert_multiple<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        if !values.is_empty() {
            self.0.insert(key.into(), ParamValue::Multiple(values));
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    #[must_use]
    pub fn single(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(ParamValue::first)
    }

    #[must_use]
    pub fn all(&self, key: &str) -> &[String] {
        match self.0.get(key) {
            Some(value) => value.values(),
            None => &[],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut pairs = Vec::new();
        for (key, value) in &self.0 {
            for item in value.values() {
                pairs.push(format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(item)
                ));
            }
        }
        pairs.join("&")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub kind: SortKind,
}

impl Sort {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (field, kind) = match raw.strip_prefix('-') {
            Some(field) => (field, SortKind::Desc),
            None => (raw, SortKind::Asc),
        };
        if field.is_empty() {
            return None;
        }
        Some(Self {
            field: field.to_string(),
            kind,
        })
    }

    #[must_use]
    pub fn encode(&self) -> String {
        match self.kind {
            SortKind::Asc => self.field.clone(),
            SortKind::Desc => format!("-{}", self.field),
        }
    }
}

fn parse_sorts(orderby: Option<&str>) -> Vec<Sort> {
    orderby
        .map(|raw| raw.split(',').filter_map(Sort::parse).collect())
        .unwrap_or_default()
}

/// One saved query's full definition as shown to the user.
///
/// Instances are never mutated after construction; every change produces a
/// new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryView {
    pub id: Option<String>,
    pub name: String,
    pub version: u8,
    pub fields: Vec<String>,
    pub sorts: Vec<Sort>,
    pub query: String,
    pub project: Vec<u64>,
    pub environment: Vec<String>,
    pub stats_period: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl QueryView {
    #[must_use]
    pub fn new_query() -> Self {
        Self {
            id: None,
            name: String::new(),
            version: 2,
            fields: Vec::new(),
            sorts: Vec::new(),
            query: String::new(),
            project: Vec::new(),
            environment: Vec::new(),
            stats_period: None,
            start: None,
            end: None,
        }
    }

    #[must_use]
    pub fn from_record(record: &SavedQueryRecord) -> Self {
        Self {
            id: Some(record.id.clone()),
            name: record.name.clone(),
            version: record.version,
            fields: record.fields.clone(),
            sorts: parse_sorts(record.orderby.as_deref()),
            query: record.query.clone(),
            project: record.projects.clone(),
            environment: record.environment.clone(),
            stats_period: record.range.clone(),
            start: record.start.clone(),
            end: record.end.clone(),
        }
    }

    /// Rebuilds a view from the parameters written by
    /// [`QueryView::to_query_string_params`]. Unparseable project ids are
    /// skipped.
    #[must_use]
    pub fn from_query_params(params: &QueryParams) -> Self {
        Self {
            id: params.single("id").map(str::to_string),
            name: params.single("name").unwrap_or_default().to_string(),
            version: params
                .single("version")
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(2),
            fields: params.all("field").to_vec(),
            sorts: params
                .all("sort")
                .iter()
                .filter_map(|raw| Sort::parse(raw))
                .collect(),
            query: params.single("query").unwrap_or_default().to_string(),
            project: params
                .all("project")
                .iter()
                .filter_map(|raw| raw.parse().ok())
                .collect(),
            environment: params.all("environment").to_vec(),
            stats_period: params.single("statsPeriod").map(str::to_string),
            start: params.single("start").map(str::to_string),
            end: params.single("end").map(str::to_string),
        }
    }

    #[must_use]
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_query(&self, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            NAME_DEFAULT
        } else {
            &self.name
        }
    }

    #[must_use]
    pub fn to_query_string_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(id) = &self.id {
            params.insert_single("id", id.clone());
        }
        params.insert_single("name", self.name.clone());
        params.insert_single("version", self.version.to_string());
        params.insert_multiple("field", self.fields.iter().cloned());
        params.insert_multiple("sort", self.sorts.iter().map(Sort::encode));
        params.insert_single("query", self.query.clone());
        params.insert_multiple("project", self.project.iter().map(ToString::to_string));
        params.insert_multiple("environment", self.environment.iter().cloned());
        if let Some(stats_period) = &self.stats_period {
            params.insert_single("statsPeriod", stats_period.clone());
        }
        if let Some(start) = &self.start {
            params.insert_single("start", start.clone());
        }
        if let Some(end) = &self.end {
            params.insert_single("end", end.clone());
        }
        params
    }

    /// The record shape sent to the server. Unsaved views carry an empty id.
    #[must_use]
    pub fn to_record_payload(&self) -> SavedQueryRecord {
        let orderby = if self.sorts.is_empty() {
            None
        } else {
            Some(
                self.sorts
                    .iter()
                    .map(Sort::encode)
                    .collect::<Vec<_>>()
                    .join(","),
            )
        };

        SavedQueryRecord {
            id: self.id.clone().unwrap_or_default(),
            name: self.name.clone(),
            version: self.version,
            projects: self.project.clone(),
            fields: self.fields.clone(),
            orderby,
            query: self.query.clone(),
            environment: self.environment.clone(),
            range: self.stats_period.clone(),
            start: self.start.clone(),
            end: self.end.clone(),
            date_created: None,
            date_updated: None,
        }
    }
}
