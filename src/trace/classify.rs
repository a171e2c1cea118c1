//! Decide per trace whether the traced request succeeded, by protocol.
//!
//! Every rule reads fixed positions of a resolved trace: index 0 is the
//! benchmark client's root span and index 1 its outgoing call. Traces with
//! fewer than two spans carry no call and are skipped.
//!
//! Synchronous protocols take the call span's own duration. The async
//! broker protocols have no single span covering the round trip, so the
//! latency is correlated from the send span (index 1) to the end of the
//! receive span (index 4).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::bucket::{Classification, DurationBuckets, Sample};
use super::ingest::TraceSet;
use super::model::{Span, Trace};

/// Requests slower than this (microseconds) are never successes.
pub const DEFAULT_DURATION_CEILING: u64 = 60_000_000;

/// Service name of the benchmark client whose outgoing call is classified.
pub const CLIENT_SERVICE: &str = "microservice1";

const CALL_SPAN: usize = 1;
const SEND_SPAN: usize = 1;
const RECEIVE_SPAN: usize = 4;

const OUTCOME_TAG: &str = "outcome";
const GRPC_STATUS_TAG: &str = "grpc.status_code";
const GRPC_OK: &str = "OK";
const ERROR_TAG: &str = "error";
const EXCEPTION_TYPE_FIELD: &str = "exception.type";
const THRIFT_TRANSPORT_EXCEPTION: &str = "org.apache.thrift.transport.TTransportException";

/// Communication protocol under test.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::IntoStaticStr,
)]
pub enum Protocol {
    #[serde(rename = "rest")]
    #[strum(serialize = "rest")]
    Rest,
    #[serde(rename = "grpc")]
    #[strum(serialize = "grpc")]
    Grpc,
    #[serde(rename = "thrift")]
    #[strum(serialize = "thrift")]
    Thrift,
    #[serde(rename = "RabbitMQ sync")]
    #[strum(serialize = "RabbitMQ sync")]
    RabbitMqSync,
    #[serde(rename = "RabbitMQ async")]
    #[strum(serialize = "RabbitMQ async")]
    RabbitMqAsync,
    #[serde(rename = "Kafka sync")]
    #[strum(serialize = "Kafka sync")]
    KafkaSync,
    #[serde(rename = "Kafka async")]
    #[strum(serialize = "Kafka async")]
    KafkaAsync,
}

/// Operation names bracketing an async round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncSignature {
    pub send: &'static str,
    pub receive: &'static str,
}

impl Protocol {
    pub const ALL: [Protocol; 7] = [
        Protocol::Rest,
        Protocol::Grpc,
        Protocol::Thrift,
        Protocol::RabbitMqSync,
        Protocol::RabbitMqAsync,
        Protocol::KafkaSync,
        Protocol::KafkaAsync,
    ];

    /// Operation name of the client's call span, for synchronous protocols.
    pub fn call_operation(self) -> Option<&'static str> {
        match self {
            Protocol::Rest => Some("http get"),
            Protocol::Grpc => Some("ExperimentService/getResponse"),
            Protocol::Thrift => Some("thrift client getPayload"),
            Protocol::RabbitMqSync => Some("rabbit rpc request"),
            Protocol::KafkaSync => Some("kafka-producer#get-payload"),
            Protocol::RabbitMqAsync | Protocol::KafkaAsync => None,
        }
    }

    /// Send/receive operation names, for async protocols.
    pub fn async_signature(self) -> Option<AsyncSignature> {
        match self {
            Protocol::RabbitMqAsync => Some(AsyncSignature {
                send: "events/requests send",
                receive: "responses receive",
            }),
            Protocol::KafkaAsync => Some(AsyncSignature {
                send: "events.requests send",
                receive: "events.responses receive",
            }),
            _ => None,
        }
    }

    /// Async protocols are the only ones that produce unmeasurable samples.
    pub fn is_async(self) -> bool {
        self.async_signature().is_some()
    }
}

/// Send and receive timestamps of one async round trip; `None` if unresolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AsyncEndpoints {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl AsyncEndpoints {
    /// Read the endpoints off a resolved trace. `None` for traces under two spans.
    pub fn from_trace(trace: &Trace, signature: AsyncSignature) -> Option<Self> {
        if trace.len() < 2 {
            return None;
        }
        let start = trace
            .span(SEND_SPAN)
            .filter(|span| span.operation_name == signature.send)
            .map(|span| span.start_time);
        let end = trace
            .span(RECEIVE_SPAN)
            .filter(|span| span.operation_name == signature.receive)
            .map(Span::end_time);
        Some(Self { start, end })
    }

    /// Success only when both ends resolved and `0 < end - start < ceiling`.
    pub fn correlate(self, ceiling: u64) -> Classification {
        let (Some(start), Some(end)) = (self.start, self.end) else {
            return Classification::failure(Sample::Unmeasurable);
        };
        match end.checked_sub(start) {
            Some(elapsed) if elapsed > 0 && elapsed < ceiling => Classification::success(elapsed),
            _ => Classification::failure(Sample::Unmeasurable),
        }
    }
}

/// Collects async endpoints per trace id, then correlates them in one pass.
#[derive(Debug, Clone)]
pub struct AsyncCorrelator {
    signature: AsyncSignature,
    endpoints: IndexMap<String, AsyncEndpoints>,
}

impl AsyncCorrelator {
    pub fn new(signature: AsyncSignature) -> Self {
        Self {
            signature,
            endpoints: IndexMap::new(),
        }
    }

    /// Record a trace. A later trace with the same id fills in endpoints the
    /// earlier one left unresolved.
    pub fn record(&mut self, trace: &Trace) {
        let Some(found) = AsyncEndpoints::from_trace(trace, self.signature) else {
            return;
        };
        match self.endpoints.get_mut(&trace.trace_id) {
            Some(known) => {
                known.start = found.start.or(known.start);
                known.end = found.end.or(known.end);
            }
            None => {
                self.endpoints.insert(trace.trace_id.clone(), found);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn finish(self, ceiling: u64) -> DurationBuckets {
        self.endpoints
            .into_values()
            .map(|endpoints| endpoints.correlate(ceiling))
            .collect()
    }
}

/// Applies one protocol's rule to traces.
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    protocol: Protocol,
    ceiling: u64,
}

impl Classifier {
    pub fn new(protocol: Protocol, ceiling: u64) -> Self {
        Self { protocol, ceiling }
    }

    /// Classify a single resolved trace. `None` means the trace is skipped.
    pub fn classify(&self, trace: &Trace) -> Option<Classification> {
        if trace.len() < 2 {
            return None;
        }
        let ceiling = self.ceiling;
        match self.protocol {
            Protocol::Rest => self.call_span(trace).map(classify_by_outcome),
            Protocol::Grpc => self.call_span(trace).map(classify_by_grpc_status),
            Protocol::Thrift => {
                let call = self.call_span(trace)?;
                Some(classify_thrift(trace, call, ceiling))
            }
            Protocol::RabbitMqSync | Protocol::KafkaSync => self
                .call_span(trace)
                .map(|call| classify_by_error_tag(call, ceiling)),
            Protocol::RabbitMqAsync | Protocol::KafkaAsync => {
                let signature = self.protocol.async_signature()?;
                AsyncEndpoints::from_trace(trace, signature)
                    .map(|endpoints| endpoints.correlate(ceiling))
            }
        }
    }

    /// Classify every trace in the set into one bucket set.
    pub fn classify_all(&self, traces: &TraceSet) -> DurationBuckets {
        let buckets = match self.protocol.async_signature() {
            Some(signature) => {
                let mut correlator = AsyncCorrelator::new(signature);
                for trace in traces.iter() {
                    correlator.record(trace);
                }
                correlator.finish(self.ceiling)
            }
            None => traces.iter().filter_map(|t| self.classify(t)).collect(),
        };
        log::debug!(
            "{}: classified {} of {} traces (OK={} KO={})",
            self.protocol,
            buckets.total(),
            traces.len(),
            buckets.success.len(),
            buckets.failure.len()
        );
        buckets
    }

    /// The client's call span, if it has this protocol's operation name.
    fn call_span<'a>(&self, trace: &'a Trace) -> Option<&'a Span> {
        let operation = self.protocol.call_operation()?;
        trace.span(CALL_SPAN).filter(|span| {
            span.operation_name == operation && span.service_name() == Some(CLIENT_SERVICE)
        })
    }
}

fn classify_by_outcome(call: &Span) -> Classification {
    let ok = call
        .tag(OUTCOME_TAG)
        .is_some_and(|tag| tag.value_str() == "SUCCESS");
    verdict(ok, call.duration)
}

fn classify_by_grpc_status(call: &Span) -> Classification {
    let ok = call
        .tag(GRPC_STATUS_TAG)
        .is_some_and(|tag| tag.value_str() == GRPC_OK);
    verdict(ok, call.duration)
}

/// Thrift marks transport failures with an exception log on the client's root span.
fn classify_thrift(trace: &Trace, call: &Span, ceiling: u64) -> Classification {
    let transport_failed = trace
        .span(0)
        .is_some_and(|root| root.has_log_field(EXCEPTION_TYPE_FIELD, THRIFT_TRANSPORT_EXCEPTION));
    verdict(!transport_failed && call.duration <= ceiling, call.duration)
}

fn classify_by_error_tag(call: &Span, ceiling: u64) -> Classification {
    let no_error = call
        .tag(ERROR_TAG)
        .is_none_or(|tag| tag.value_str() == "false");
    verdict(no_error && call.duration <= ceiling, call.duration)
}

fn verdict(ok: bool, micros: u64) -> Classification {
    if ok {
        Classification::success(micros)
    } else {
        Classification::failure(Sample::Measured(micros))
    }
}
