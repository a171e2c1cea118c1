//! Span and trace records in the Jaeger JSON schema.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Reference type linking a span to its parent.
pub const CHILD_OF: &str = "CHILD_OF";

/// A key/value pair as it appears in span tags, log fields and process tags.
///
/// Jaeger emits typed values (`"error": true`, `"http.status_code": 200`), so the
/// value is kept as raw JSON and compared through [`KeyValue::value_str`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Textual form of the value: strings as-is, other scalars as rendered JSON.
    pub fn value_str(&self) -> std::borrow::Cow<'_, str> {
        match &self.value {
            serde_json::Value::String(s) => s.as_str().into(),
            other => other.to_string().into(),
        }
    }
}

/// One entry of a span's log, a list of structured fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fields: Vec<KeyValue>,
}

/// The service that emitted a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    pub service_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<KeyValue>,
}

impl Process {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            tags: Vec::new(),
        }
    }
}

/// A link from one span to another within the same trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    pub ref_type: String,
    #[serde(rename = "spanID")]
    pub span_id: String,
}

impl Reference {
    pub fn child_of(span_id: impl Into<String>) -> Self {
        Self {
            ref_type: CHILD_OF.to_string(),
            span_id: span_id.into(),
        }
    }

    pub fn is_child_of(&self) -> bool {
        self.ref_type == CHILD_OF
    }
}

/// A single timed unit of work. Times are microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    #[serde(rename = "traceID")]
    pub trace_id: String,
    #[serde(rename = "spanID")]
    pub span_id: String,
    pub operation_name: String,
    pub start_time: u64,
    pub duration: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<KeyValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<LogEntry>,
    /// Inline process, as written by the Elasticsearch span exporter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Process>,
    /// Key into the trace-level `processes` map, as written by Jaeger's own export.
    #[serde(rename = "processID", default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub references: Vec<Reference>,
}

impl Span {
    /// Value of the first tag named `key`.
    pub fn tag(&self, key: &str) -> Option<&KeyValue> {
        self.tags.iter().find(|tag| tag.key == key)
    }

    pub fn service_name(&self) -> Option<&str> {
        self.process.as_ref().map(|p| p.service_name.as_str())
    }

    /// Span ids this span declares as `CHILD_OF` parents, in declaration order.
    pub fn parent_ids(&self) -> impl Iterator<Item = &str> {
        self.references
            .iter()
            .filter(|r| r.is_child_of())
            .map(|r| r.span_id.as_str())
    }

    /// End timestamp (`startTime + duration`), saturating on overflow.
    pub fn end_time(&self) -> u64 {
        self.start_time.saturating_add(self.duration)
    }

    /// True if any log field on this span has `key` with the given value.
    pub fn has_log_field(&self, key: &str, value: &str) -> bool {
        self.logs
            .iter()
            .flat_map(|log| &log.fields)
            .any(|field| field.key == key && field.value_str() == value)
    }
}

/// All spans sharing one trace id.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub trace_id: String,
    pub spans: Vec<Span>,
    /// Process metadata per service name; the first span seen for a service wins.
    pub processes: IndexMap<String, Process>,
}

impl Trace {
    pub fn new(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            spans: Vec::new(),
            processes: IndexMap::new(),
        }
    }

    /// Append a span, recording its service's process on first sight.
    pub fn push_span(&mut self, span: Span) {
        if let Some(process) = &span.process
            && !self.processes.contains_key(&process.service_name)
        {
            self.processes
                .insert(process.service_name.clone(), process.clone());
        }
        self.spans.push(span);
    }

    /// Span at position `index` in the current order.
    pub fn span(&self, index: usize) -> Option<&Span> {
        self.spans.get(index)
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
