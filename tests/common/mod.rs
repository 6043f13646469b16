//! Shared test infrastructure for query-flow integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use usage_dns::error::{ResolveError, TrackError};
use usage_dns::{
    EventSink, QueryCodec, ReleaseResolver, TrackingEvent, UsageHandler, UsageReporter,
};

// --- Constants ---

pub const ZONE: &str = "usage.example.com";

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// Implements `ResponseHandler` so it can be passed to
/// `UsageHandler::handle_request()`. The response is serialized via
/// `MessageResponse::destructive_emit()` and stored as raw wire-format
/// bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Stub release resolver ---

/// Per-project outcome served by [`StubResolver`].
pub enum StubOutcome {
    Tag(String),
    NotFound,
    NoReleases,
    Upstream,
    Status(u16),
}

/// In-memory `ReleaseResolver`; unknown projects resolve as `NotFound`.
pub struct StubResolver {
    outcomes: HashMap<String, StubOutcome>,
    calls: AtomicU64,
}

impl StubResolver {
    pub fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_release(mut self, project: &str, tag: &str) -> Self {
        self.outcomes
            .insert(project.to_string(), StubOutcome::Tag(tag.to_string()));
        self
    }

    pub fn with_outcome(mut self, project: &str, outcome: StubOutcome) -> Self {
        self.outcomes.insert(project.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

/// The only reqwest::Error constructible without IO is a URL build error.
fn upstream_error(project: &str) -> ResolveError {
    let source = reqwest::Client::new().get("://invalid").build().unwrap_err();
    ResolveError::Upstream {
        project: project.to_string(),
        source,
    }
}

#[async_trait]
impl ReleaseResolver for StubResolver {
    async fn latest(&self, project: &str) -> Result<String, ResolveError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        match self.outcomes.get(project) {
            Some(StubOutcome::Tag(tag)) => Ok(tag.clone()),
            Some(StubOutcome::NoReleases) => Err(ResolveError::NoReleases {
                project: project.to_string(),
            }),
            Some(StubOutcome::Upstream) => Err(upstream_error(project)),
            Some(StubOutcome::Status(status)) => Err(ResolveError::Status {
                project: project.to_string(),
                status: *status,
            }),
            Some(StubOutcome::NotFound) | None => Err(ResolveError::NotFound {
                project: project.to_string(),
            }),
        }
    }
}

// --- Event sinks ---

/// Sink recording every delivered batch.
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<TrackingEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            batches: Mutex::new(Vec::new()),
        })
    }

    pub fn batches(&self) -> Vec<Vec<TrackingEvent>> {
        self.batches.lock().unwrap().clone()
    }

    /// All delivered events, flattened.
    pub fn events(&self) -> Vec<TrackingEvent> {
        self.batches().into_iter().flatten().collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn submit(&self, batch: &[TrackingEvent]) -> Result<(), TrackError> {
        self.batches.lock().unwrap().push(batch.to_vec());
        Ok(())
    }
}

/// Sink that always fails delivery.
pub struct FailingSink;

#[async_trait]
impl EventSink for FailingSink {
    async fn submit(&self, _batch: &[TrackingEvent]) -> Result<(), TrackError> {
        Err(TrackError::Status(503))
    }
}

// --- Service builders ---

/// A handler wired to a stub resolver and a recording sink.
pub struct TestService {
    pub handler: UsageHandler,
    pub resolver: Arc<StubResolver>,
    pub reporter: Arc<UsageReporter>,
    pub sink: Arc<RecordingSink>,
}

pub fn build_service(resolver: StubResolver) -> TestService {
    let resolver = Arc::new(resolver);
    let sink = RecordingSink::new();
    let reporter = Arc::new(UsageReporter::new(
        sink.clone(),
        Duration::from_secs(1),
        64,
    ));
    let handler = UsageHandler::new(QueryCodec::new(ZONE), resolver.clone(), reporter.clone());
    TestService {
        handler,
        resolver,
        reporter,
        sink,
    }
}

/// A handler whose reporter uses the given sink and buffer capacity.
pub fn build_service_with_sink(
    resolver: StubResolver,
    sink: Arc<dyn EventSink>,
    max_pending: usize,
) -> (UsageHandler, Arc<UsageReporter>) {
    let reporter = Arc::new(UsageReporter::new(
        sink,
        Duration::from_secs(1),
        max_pending,
    ));
    let handler = UsageHandler::new(
        QueryCodec::new(ZONE),
        Arc::new(resolver),
        reporter.clone(),
    );
    (handler, reporter)
}

// --- Query/Request construction ---

pub fn client_src() -> SocketAddr {
    "192.0.2.7:4242".parse().unwrap()
}

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` with a crafted source address.
pub fn build_request(name: &str, record_type: RecordType, src: SocketAddr, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let msg = parse_message_request(&bytes);
    Request::new(msg, src, Protocol::Udp)
}

// --- Response helpers ---

/// Execute a query through the handler and return the parsed response.
pub async fn execute_query(
    handler: &UsageHandler,
    name: &str,
    record_type: RecordType,
    src: SocketAddr,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, src, id);
    let capture = TestResponseHandler::new();
    handler.handle_request(&request, capture.clone()).await;
    capture.into_message()
}

/// Extract PTR targets from a response.
pub fn extract_ptr_targets(msg: &Message) -> Vec<Name> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::PTR(ptr) => Some(ptr.0.clone()),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert the response carries exactly one zero-TTL PTR answer with the
/// expected owner and target names.
pub fn assert_ptr_answer(msg: &Message, owner: &str, target: &str) {
    assert_response_code(msg, ResponseCode::NoError);
    assert_eq!(msg.answers().len(), 1, "expected exactly one answer");

    let record = &msg.answers()[0];
    assert_eq!(record.record_type(), RecordType::PTR);
    assert_eq!(record.ttl(), 0, "answers must never be cacheable");
    assert_eq!(record.name(), &Name::from_ascii(owner).unwrap());

    let targets = extract_ptr_targets(msg);
    assert_eq!(targets, vec![Name::from_ascii(target).unwrap()]);
}
