//! Per-query control flow: decode, resolve, track, respond.

use async_trait::async_trait;
use hickory_proto::op::{Header, ResponseCode};
use hickory_proto::rr::rdata::PTR;
use hickory_proto::rr::{DNSClass, Name, RData, Record};
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::codec::{ProjectVersion, QueryCodec};
use crate::error::{ResolveError, ServiceError};
use crate::metrics::{self, QueryOutcome, Timer};
use crate::registry::ReleaseResolver;
use crate::reporter::{TrackingEvent, UsageReporter};

/// Map a resolve failure to its client-visible response code.
///
/// Absence is NXDOMAIN; infrastructure trouble is SERVFAIL, so resolvers
/// know a retry may succeed.
fn negative_code(err: &ResolveError) -> ResponseCode {
    match err {
        ResolveError::NotFound { .. } | ResolveError::NoReleases { .. } => ResponseCode::NXDomain,
        ResolveError::Upstream { .. } | ResolveError::Status { .. } => ResponseCode::ServFail,
    }
}

/// Answers version queries with zero-TTL PTR records and reports each
/// answered query to the usage reporter.
///
/// Collaborators are injected at construction and immutable afterwards; the
/// handler itself holds no other state, so concurrent requests share only
/// the reporter's internal buffer.
pub struct UsageHandler {
    codec: QueryCodec,
    resolver: Arc<dyn ReleaseResolver>,
    reporter: Arc<UsageReporter>,
}

impl UsageHandler {
    /// Create a handler over the given collaborators.
    pub fn new(
        codec: QueryCodec,
        resolver: Arc<dyn ReleaseResolver>,
        reporter: Arc<UsageReporter>,
    ) -> Self {
        Self {
            codec,
            resolver,
            reporter,
        }
    }

    /// Build the answer record for a resolved query: owner is the canonical
    /// `latest` form, target carries the resolved version, TTL is always 0
    /// so resolvers never cache a stale "latest".
    fn answer_record(&self, pv: &ProjectVersion, latest: &str) -> Result<Record, ServiceError> {
        let owner = Name::from_ascii(&self.codec.encode(&pv.latest()))?;
        let target = Name::from_ascii(
            &self
                .codec
                .encode(&ProjectVersion::new(pv.project.clone(), latest)),
        )?;

        let mut record = Record::from_rdata(owner, 0, RData::PTR(PTR(target)));
        record.set_dns_class(DNSClass::IN);
        Ok(record)
    }
}

#[async_trait]
impl RequestHandler for UsageHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();

        let request_info = match request.request_info() {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "failed to parse request info");
                metrics::record_query(QueryOutcome::Error, timer.elapsed());
                return send_error_response(request, &mut response_handle, ResponseCode::FormErr)
                    .await;
            }
        };

        let qname = request_info.query.name().to_string();
        let client = request.src();

        let pv = match self.codec.decode(&qname) {
            Ok(pv) => pv,
            Err(e) => {
                warn!(name = %qname, client = %client.ip(), error = %e, "malformed query name");
                metrics::record_query(QueryOutcome::Malformed, timer.elapsed());
                return send_error_response(request, &mut response_handle, ResponseCode::NXDomain)
                    .await;
            }
        };

        let latest = match self.resolver.latest(&pv.project).await {
            Ok(tag) => tag,
            Err(e) => {
                let code = negative_code(&e);
                warn!(project = %pv.project, error = %e, code = ?code, "failed to resolve latest release");
                let outcome = match code {
                    ResponseCode::NXDomain => QueryOutcome::NotFound,
                    _ => QueryOutcome::UpstreamError,
                };
                metrics::record_query(outcome, timer.elapsed());
                return send_error_response(request, &mut response_handle, code).await;
            }
        };

        // Track only resolved queries, and track the client-reported
        // version, not the resolved one. A tracking failure never changes
        // the response.
        let event = TrackingEvent::new(&pv, client.ip().to_string());
        if let Err(e) = self.reporter.track(event) {
            warn!(project = %pv.project, error = %e, "failed to enqueue tracking event");
        }

        let record = match self.answer_record(&pv, &latest) {
            Ok(record) => record,
            Err(e) => {
                error!(project = %pv.project, tag = %latest, error = %e, "failed to build answer record");
                metrics::record_query(QueryOutcome::Error, timer.elapsed());
                return send_error_response(request, &mut response_handle, ResponseCode::ServFail)
                    .await;
            }
        };

        debug!(
            project = %pv.project,
            reported = %pv.version,
            latest = %latest,
            client = %client.ip(),
            "answering version query"
        );
        metrics::record_query(QueryOutcome::Answered, timer.elapsed());

        let mut header = Header::response_from_request(request.header());
        header.set_authoritative(true);

        let answers = [record];
        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(header, answers.iter(), &[], &[], &[]);

        match response_handle.send_response(response).await {
            Ok(info) => info,
            Err(e) => {
                error!(error = %e, "failed to send response");
                ResponseInfo::from(*request.header())
            }
        }
    }
}

async fn send_error_response<R: ResponseHandler>(
    request: &Request,
    response_handle: &mut R,
    code: ResponseCode,
) -> ResponseInfo {
    let mut header = Header::response_from_request(request.header());
    header.set_authoritative(true);
    header.set_response_code(code);

    let builder = MessageResponseBuilder::from_message_request(request);
    let response = builder.build(header, &[], &[], &[], &[]);

    match response_handle.send_response(response).await {
        Ok(info) => info,
        Err(e) => {
            error!(error = %e, code = ?code, "failed to send error response");
            ResponseInfo::from(*request.header())
        }
    }
}
