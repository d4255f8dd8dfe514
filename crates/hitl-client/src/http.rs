//! HTTP implementations of the backend seams

use crate::error::ClientError;
use async_trait::async_trait;
use hitl_core::{
    ApplyRequest, ApplyResponse, BackendError, DecisionBackend, DecisionRecord, Interrupt,
    InterruptStream, ResumePayload, ReviewConfig, ScopeContext, SessionProvider,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header carrying the active organization
pub const ORG_CONTEXT_HEADER: &str = "X-Organization-Context";

/// Shared request plumbing: base URL, bearer token, tenant header, timeouts
///
/// Reads (`GET`) are bounded by `read_timeout`, writes by `write_timeout`.
#[derive(Debug, Clone)]
struct Transport {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl Transport {
    fn new(base_url: &str, session: Arc<dyn SessionProvider>) -> Result<Self, ClientError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            read_timeout: None,
            write_timeout: None,
        })
    }

    fn timeout_for(&self, method: &Method) -> Option<Duration> {
        if *method == Method::GET {
            self.read_timeout
        } else {
            self.write_timeout
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str, scope: Option<&ScopeContext>) -> RequestBuilder {
        let timeout = self.timeout_for(&method);
        let mut request = self.client.request(method, self.url(path));
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        if let Some(token) = self.session.bearer_token() {
            request = request.bearer_auth(token);
        }
        if let Some(org_id) = scope.and_then(|s| s.org_id.as_deref()) {
            request = request.header(ORG_CONTEXT_HEADER, org_id);
        }
        request
    }

    async fn send(request: RequestBuilder) -> Result<Response, ClientError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let text = Self::send(request).await?.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Query pairs for a scope; absent ids are omitted
fn scope_query(scope: &ScopeContext) -> Vec<(&'static str, &str)> {
    let mut query = Vec::with_capacity(2);
    if let Some(project_id) = scope.project_id.as_deref() {
        query.push(("project_id", project_id));
    }
    if let Some(org_id) = scope.org_id.as_deref() {
        query.push(("org_id", org_id));
    }
    query
}

/// List responses come bare or wrapped; elements are decoded one by one
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordList {
    Bare(Vec<Value>),
    Wrapped { decisions: Vec<Value> },
}

/// Decode each element on its own, skipping the ones that do not fit
///
/// A malformed element is logged with its `id` and dropped; its siblings
/// are kept.
pub(crate) fn decode_each<T: DeserializeOwned>(values: Vec<Value>, kind: &'static str) -> Vec<T> {
    values
        .into_iter()
        .filter_map(|value| {
            let id = value
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("-")
                .to_string();
            match serde_json::from_value(value) {
                Ok(decoded) => Some(decoded),
                Err(err) => {
                    warn!(kind, id = %id, error = %err, "skipping malformed element");
                    None
                }
            }
        })
        .collect()
}

/// Decision backend over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    transport: Transport,
}

impl HttpBackend {
    /// Create client for `base_url` (no trailing slash needed)
    ///
    /// # Errors
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, session: Arc<dyn SessionProvider>) -> Result<Self, ClientError> {
        Ok(Self {
            transport: Transport::new(base_url, session)?,
        })
    }

    /// With timeouts: `read` bounds listing, `write` bounds apply and persist
    #[inline]
    #[must_use]
    pub fn with_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.transport.read_timeout = Some(read);
        self.transport.write_timeout = Some(write);
        self
    }

    /// Create client for the configured backend and timeouts
    ///
    /// # Errors
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &ReviewConfig, session: Arc<dyn SessionProvider>) -> Result<Self, ClientError> {
        Ok(Self::new(&config.backend_url, session)?
            .with_timeouts(config.request_timeout(), config.apply_timeout()))
    }

    /// `GET /decisions?project_id=&org_id=`
    ///
    /// # Errors
    /// Returns [`ClientError`] on transport, status, or decode failure.
    pub async fn list(&self, scope: &ScopeContext) -> Result<Vec<DecisionRecord>, ClientError> {
        let request = self
            .transport
            .request(Method::GET, "decisions", Some(scope))
            .query(&scope_query(scope));
        debug!(%scope, "listing decisions");
        let records: Vec<DecisionRecord> = match Transport::json::<RecordList>(request).await? {
            RecordList::Bare(values) | RecordList::Wrapped { decisions: values } => {
                decode_each(values, "decision record")
            }
        };
        info!(count = records.len(), "listed decisions");
        Ok(records)
    }

    /// `POST /decisions/apply`
    ///
    /// # Errors
    /// Returns [`ClientError`] on transport, status, or decode failure.
    pub async fn apply(
        &self,
        scope: &ScopeContext,
        body: &ApplyRequest,
    ) -> Result<ApplyResponse, ClientError> {
        let request = self
            .transport
            .request(Method::POST, "decisions/apply", Some(scope))
            .json(body);
        info!(
            decision_id = %body.decision_id,
            proposal_type = %body.proposal_type,
            "applying decision"
        );
        Transport::json(request).await
    }

    /// `POST /decisions`
    ///
    /// # Errors
    /// Returns [`ClientError`] on transport or status failure.
    pub async fn persist(&self, scope: &ScopeContext, record: &DecisionRecord) -> Result<(), ClientError> {
        let request = self
            .transport
            .request(Method::POST, "decisions", Some(scope))
            .json(record);
        Transport::send(request).await?;
        debug!(record_id = %record.id, "persisted decision record");
        Ok(())
    }
}

#[async_trait]
impl DecisionBackend for HttpBackend {
    async fn list_pending_decisions(
        &self,
        scope: &ScopeContext,
    ) -> Result<Vec<DecisionRecord>, BackendError> {
        Ok(self.list(scope).await?)
    }

    async fn apply_decision(
        &self,
        scope: &ScopeContext,
        request: &ApplyRequest,
    ) -> Result<ApplyResponse, BackendError> {
        Ok(self.apply(scope, request).await?)
    }

    async fn persist_decision(
        &self,
        scope: &ScopeContext,
        record: &DecisionRecord,
    ) -> Result<(), BackendError> {
        Ok(self.persist(scope, record).await?)
    }
}

/// Thread state as returned by the run API; one interrupt or a list
#[derive(Deserialize)]
struct ThreadInterrupts {
    #[serde(default)]
    interrupts: Option<Value>,
}

impl ThreadInterrupts {
    fn into_interrupts(self) -> Vec<Interrupt> {
        match self.interrupts {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(values)) => decode_each(values, "interrupt"),
            Some(single) => decode_each(vec![single], "interrupt"),
        }
    }
}

/// Run interrupt stream over HTTP
///
/// Polls `GET /threads/{id}/interrupts` and resumes through
/// `POST /threads/{id}/resume`.
#[derive(Debug, Clone)]
pub struct HttpInterruptStream {
    transport: Transport,
    thread_id: Option<String>,
}

impl HttpInterruptStream {
    /// Create stream for `thread_id`; without a thread there is nothing to follow
    ///
    /// # Errors
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        session: Arc<dyn SessionProvider>,
        thread_id: Option<String>,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            transport: Transport::new(base_url, session)?,
            thread_id,
        })
    }

    /// With timeouts: `read` bounds polling, `write` bounds resuming
    #[inline]
    #[must_use]
    pub fn with_timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.transport.read_timeout = Some(read);
        self.transport.write_timeout = Some(write);
        self
    }

    /// Create stream for the configured backend, thread and timeouts
    ///
    /// # Errors
    /// Returns [`ClientError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &ReviewConfig, session: Arc<dyn SessionProvider>) -> Result<Self, ClientError> {
        Ok(Self::new(&config.backend_url, session, config.thread_id.clone())?
            .with_timeouts(config.request_timeout(), config.apply_timeout()))
    }

    fn thread_path(&self, suffix: &str) -> Result<String, ClientError> {
        let thread_id = self.thread_id.as_deref().ok_or(ClientError::NoThread)?;
        Ok(format!("threads/{thread_id}/{suffix}"))
    }

    /// Outstanding interrupts
    ///
    /// # Errors
    /// Returns [`ClientError`] on transport, status, or decode failure.
    pub async fn fetch(&self) -> Result<Vec<Interrupt>, ClientError> {
        if self.thread_id.is_none() {
            return Ok(Vec::new());
        }
        let request = self
            .transport
            .request(Method::GET, &self.thread_path("interrupts")?, None);
        let state: ThreadInterrupts = Transport::json(request).await?;
        Ok(state.into_interrupts())
    }

    /// Resume the run
    ///
    /// # Errors
    /// Returns [`ClientError::NoThread`] without a thread, otherwise
    /// transport or status failures.
    pub async fn resume(&self, scope: &ScopeContext, payload: &ResumePayload) -> Result<(), ClientError> {
        let request = self
            .transport
            .request(Method::POST, &self.thread_path("resume")?, Some(scope))
            .json(payload);
        info!(
            interrupt_id = %payload.interrupt_id,
            request_index = payload.request_index,
            "resuming interrupt"
        );
        Transport::send(request).await?;
        Ok(())
    }
}

#[async_trait]
impl InterruptStream for HttpInterruptStream {
    async fn current_interrupts(&self) -> Result<Vec<Interrupt>, BackendError> {
        Ok(self.fetch().await?)
    }

    async fn submit(&self, scope: &ScopeContext, payload: &ResumePayload) -> Result<(), BackendError> {
        Ok(self.resume(scope, payload).await?)
    }

    fn thread_id(&self) -> Option<String> {
        self.thread_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hitl_core::StaticSession;

    fn session() -> Arc<dyn SessionProvider> {
        Arc::new(StaticSession::anonymous().with_token("tok"))
    }

    #[test]
    fn base_url_is_normalized() {
        let backend = HttpBackend::new("http://localhost:8000/", session()).unwrap();
        assert_eq!(backend.transport.url("/decisions"), "http://localhost:8000/decisions");
        assert_eq!(backend.transport.url("decisions/apply"), "http://localhost:8000/decisions/apply");
    }

    #[test]
    fn scope_query_omits_missing_ids() {
        assert_eq!(
            scope_query(&ScopeContext::new(Some("o1"), Some("p1"))),
            vec![("project_id", "p1"), ("org_id", "o1")]
        );
        assert_eq!(scope_query(&ScopeContext::new(Some("o1"), None)), vec![("org_id", "o1")]);
    }

    #[test]
    fn request_carries_bearer_and_org_header() {
        let backend = HttpBackend::new("http://localhost:8000", session()).unwrap();
        let request = backend
            .transport
            .request(Method::GET, "decisions", Some(&ScopeContext::new(Some("o1"), None)))
            .build()
            .unwrap();

        assert_eq!(request.headers()[ORG_CONTEXT_HEADER], "o1");
        assert_eq!(request.headers()[reqwest::header::AUTHORIZATION], "Bearer tok");
    }

    #[test]
    fn configured_timeouts_bound_each_request() {
        let config = ReviewConfig::default()
            .with_request_timeout(Duration::from_millis(1_500))
            .with_apply_timeout(Duration::from_secs(45));
        let backend = HttpBackend::from_config(&config, session()).unwrap();

        let list = backend
            .transport
            .request(Method::GET, "decisions", None)
            .build()
            .unwrap();
        let apply = backend
            .transport
            .request(Method::POST, "decisions/apply", None)
            .build()
            .unwrap();
        assert_eq!(list.timeout(), Some(&Duration::from_millis(1_500)));
        assert_eq!(apply.timeout(), Some(&Duration::from_secs(45)));

        let stream = HttpInterruptStream::from_config(&config, session()).unwrap();
        assert_eq!(stream.transport.read_timeout, Some(Duration::from_millis(1_500)));
        assert_eq!(stream.transport.write_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn unconfigured_client_has_no_timeout() {
        let backend = HttpBackend::new("http://localhost:8000", session()).unwrap();
        let request = backend
            .transport
            .request(Method::GET, "decisions", None)
            .build()
            .unwrap();
        assert_eq!(request.timeout(), None);
    }

    #[test]
    fn anonymous_unscoped_request_has_no_auth_headers() {
        let backend =
            HttpBackend::new("http://localhost:8000", Arc::new(StaticSession::anonymous())).unwrap();
        let request = backend
            .transport
            .request(Method::GET, "decisions", None)
            .build()
            .unwrap();
        assert!(request.headers().get(reqwest::header::AUTHORIZATION).is_none());
        assert!(request.headers().get(ORG_CONTEXT_HEADER).is_none());
    }

    #[test]
    fn list_response_shapes() {
        let bare: RecordList =
            serde_json::from_str(r#"[{"id": "r1", "type": "x", "status": "pending"}]"#).unwrap();
        let wrapped: RecordList = serde_json::from_str(
            r#"{"decisions": [{"id": "r1", "type": "x", "status": "pending"}]}"#,
        )
        .unwrap();
        assert!(matches!(bare, RecordList::Bare(r) if r.len() == 1));
        assert!(matches!(wrapped, RecordList::Wrapped { decisions } if decisions.len() == 1));
    }

    #[test]
    fn malformed_record_does_not_sink_its_siblings() {
        let RecordList::Bare(values) = serde_json::from_str(
            r#"[
                {"id": "r1", "type": "select_standards", "status": "pending"},
                {"id": "r2", "type": "select_standards", "status": "pending",
                 "diff": {"type": "no_such_kind"}},
                {"id": "r3", "type": "classify_intent", "status": "proposed"}
            ]"#,
        )
        .unwrap() else {
            panic!("expected a bare list");
        };

        let records: Vec<DecisionRecord> = decode_each(values, "decision record");
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "r3"]);
    }

    #[test]
    fn interrupt_shapes() {
        let single: ThreadInterrupts =
            serde_json::from_str(r#"{"interrupts": {"id": "int-1"}}"#).unwrap();
        assert_eq!(single.into_interrupts().len(), 1);

        let mixed: ThreadInterrupts = serde_json::from_str(
            r#"{"interrupts": [{"id": "int-1"}, {"id": 7}, {"id": "int-3"}]}"#,
        )
        .unwrap();
        let ids: Vec<String> = mixed.into_interrupts().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["int-1", "int-3"]);

        let none: ThreadInterrupts = serde_json::from_str(r#"{"interrupts": null}"#).unwrap();
        assert!(none.into_interrupts().is_empty());
    }

    #[tokio::test]
    async fn no_thread_means_no_interrupts() {
        let stream = HttpInterruptStream::new("http://localhost:1", session(), None).unwrap();
        assert!(stream.fetch().await.unwrap().is_empty());
        assert!(matches!(
            stream.thread_path("resume"),
            Err(ClientError::NoThread)
        ));
    }
}
