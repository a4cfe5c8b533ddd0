//! The request task.
//!
//! A [`SessionTask`] describes one outbound request, tracks it through the
//! lifecycle/cache state machine and notifies its listener at each
//! transition. One task can be run many times; every attempt starts by
//! clearing the previous attempt's output.
//!
//! ## Attempt flow
//!
//! 1. [`SessionTask::prepare`] - reset output, rebuild the URL and cache key,
//!    enter `Running`
//! 2. [`SessionTask::import_cache`] - apply the cache policy, notify `sending`
//! 3. One of [`SessionTask::response_session`] or [`SessionTask::no_reach`]
//!    once the transport reports back
//!
//! [`SessionTask::start_session`] performs steps 1 and 2 together; the
//! [`TaskRunner`](crate::runner::TaskRunner) drives the whole flow.

use sessiontask_core::{CacheKey, CachePhase, Lifecycle, Method, Params, Payload, TaskError, TaskState};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::context::{NetworkConfig, TaskContext};
use crate::listener::TaskListener;
use crate::transport::PreparedRequest;
use crate::url::{BuiltUrl, UrlBuilder};

// ============================================================================
// Cancel Handle
// ============================================================================

/// Requests cancellation of a task's current attempt from anywhere.
///
/// Cancellation is cooperative: the task moves to `Cancelled` at its next
/// state check. A handle is tied to the attempt that is current (or next)
/// when it was taken; once that attempt ends the handle has no effect.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Notification {
    Sending,
    Connected,
    Lost,
}

// ============================================================================
// Session Task
// ============================================================================

/// One request's identity, cache policy, output and state.
pub struct SessionTask {
    // Identity
    method: Method,
    path: String,
    path_substitutions: Vec<String>,
    params: Params,
    base_url: Option<String>,
    request_type: String,
    page: Option<u32>,
    page_size: Option<u32>,
    headers: BTreeMap<String, String>,

    // Policy
    cached: bool,
    import_cache_once: bool,
    should_check_code: bool,

    // Output
    absolute_url: String,
    cache_key: Option<CacheKey>,
    response_object: Option<Payload>,
    error: Option<TaskError>,
    message: Option<String>,
    code_key: Option<i64>,

    state: TaskState,
    listener: Weak<dyn TaskListener>,
    cancel: CancellationToken,
}

impl SessionTask {
    /// Creates a task in `Runnable` + `NotTried`.
    ///
    /// The listener is held weakly; the caller keeps it alive.
    pub fn new<L: TaskListener + 'static>(
        method: Method,
        path: impl Into<String>,
        params: Params,
        listener: &Arc<L>,
        request_type: impl Into<String>,
    ) -> Self {
        let listener: Weak<L> = Arc::downgrade(listener);
        let listener: Weak<dyn TaskListener> = listener;
        Self {
            method,
            path: path.into(),
            path_substitutions: Vec::new(),
            params,
            base_url: None,
            request_type: request_type.into(),
            page: None,
            page_size: None,
            headers: BTreeMap::new(),
            cached: true,
            import_cache_once: true,
            should_check_code: true,
            absolute_url: String::new(),
            cache_key: None,
            response_object: None,
            error: None,
            message: None,
            code_key: None,
            state: TaskState::new(),
            listener,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a task whose path template takes positional substitutions.
    pub fn with_path_substitutions<L: TaskListener + 'static>(
        method: Method,
        path: impl Into<String>,
        params: Params,
        path_substitutions: Vec<String>,
        listener: &Arc<L>,
        request_type: impl Into<String>,
    ) -> Self {
        let mut task = Self::new(method, path, params, listener, request_type);
        task.path_substitutions = path_substitutions;
        task
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Returns the HTTP method.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the path template.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the path substitutions.
    pub fn path_substitutions(&self) -> &[String] {
        &self.path_substitutions
    }

    /// Replaces the path substitutions for the next attempt.
    pub fn set_path_substitutions(&mut self, substitutions: Vec<String>) {
        self.path_substitutions = substitutions;
    }

    /// Returns the params.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Returns the params for modification before the next attempt.
    pub fn params_mut(&mut self) -> &mut Params {
        &mut self.params
    }

    /// Returns the task's own base URL, if set.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Sets the base URL; `None` falls back to the configured default.
    pub fn set_base_url(&mut self, base_url: Option<String>) {
        self.base_url = base_url;
    }

    /// Returns the caller's request type tag.
    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    /// Returns the page number.
    pub fn page(&self) -> Option<u32> {
        self.page
    }

    /// Sets the page number folded into the params.
    pub fn set_page(&mut self, page: Option<u32>) {
        self.page = page;
    }

    /// Returns the page size.
    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    /// Sets the page size folded into the params.
    pub fn set_page_size(&mut self, page_size: Option<u32>) {
        self.page_size = page_size;
    }

    /// Replaces the listener.
    pub fn set_listener<L: TaskListener + 'static>(&mut self, listener: &Arc<L>) {
        let listener: Weak<L> = Arc::downgrade(listener);
        let listener: Weak<dyn TaskListener> = listener;
        self.listener = listener;
    }

    // ========================================================================
    // Headers
    // ========================================================================

    /// Sets a header for this task, overriding any default of the same name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers
            .retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Returns this task's headers merged over the configured defaults.
    pub fn http_request_fields(&self, config: &NetworkConfig) -> BTreeMap<String, String> {
        config.merge_headers(&self.headers)
    }

    // ========================================================================
    // Policy
    // ========================================================================

    /// Returns true if successful responses are cached.
    pub fn is_cached(&self) -> bool {
        self.cached
    }

    /// Enables or disables caching for this task (disable for uploads).
    pub fn set_cached(&mut self, cached: bool) {
        self.cached = cached;
    }

    /// Returns true if the next attempt imports the cache.
    pub fn import_cache_once(&self) -> bool {
        self.import_cache_once
    }

    /// Controls cache import (disable for pages after the first).
    pub fn set_import_cache_once(&mut self, import: bool) {
        self.import_cache_once = import;
    }

    /// Returns true if the server's business code decides success.
    pub fn should_check_code(&self) -> bool {
        self.should_check_code
    }

    /// Controls whether the business code decides success.
    pub fn set_should_check_code(&mut self, check: bool) {
        self.should_check_code = check;
    }

    // ========================================================================
    // Output
    // ========================================================================

    /// Returns the payload of a successful response or cache import.
    pub fn response_object(&self) -> Option<&Payload> {
        self.response_object.as_ref()
    }

    /// Returns the error of the last attempt.
    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    /// Returns the message of the last attempt.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the URL built for the last attempt.
    pub fn absolute_url(&self) -> &str {
        &self.absolute_url
    }

    /// Returns the cache key of the last attempt.
    pub fn cache_key(&self) -> Option<&CacheKey> {
        self.cache_key.as_ref()
    }

    /// Returns the business code reported by the server.
    pub fn code_key(&self) -> Option<i64> {
        self.code_key
    }

    /// Returns the combined state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Returns true before the first attempt.
    pub fn is_runnable(&self) -> bool {
        self.state.is_runnable()
    }

    /// Returns true while an attempt is in flight.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Returns true if the last attempt succeeded.
    pub fn is_succeeded(&self) -> bool {
        self.state.is_succeeded()
    }

    /// Returns true if the last attempt failed.
    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }

    /// Returns true if the last attempt was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }

    /// Returns true if the server could not be reached.
    pub fn is_no_reach(&self) -> bool {
        self.state.is_no_reach()
    }

    /// Returns true if a cached payload was imported.
    pub fn is_cache_success(&self) -> bool {
        self.state.is_cache_success()
    }

    /// Returns true if the cache was consulted and missed.
    pub fn is_cache_fail(&self) -> bool {
        self.state.is_cache_fail()
    }

    /// Returns a handle that can cancel the current or next attempt.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            token: self.cancel.clone(),
        }
    }

    /// Builds this task's URLs against `config`. Pure.
    pub fn build_url(&self, config: &NetworkConfig) -> BuiltUrl {
        let base_url = self.base_url.as_deref().unwrap_or(&config.base_url);
        UrlBuilder::new(base_url, &self.path, &self.params)
            .substitutions(&self.path_substitutions)
            .pagination(&config.page_param, self.page)
            .pagination(&config.page_size_param, self.page_size)
            .build()
    }

    /// Clears `response_object`, `error`, `message` and `code_key`.
    pub fn rest_all_output(&mut self) {
        self.response_object = None;
        self.error = None;
        self.message = None;
        self.code_key = None;
    }

    // ========================================================================
    // Start
    // ========================================================================

    /// Starts an attempt: prepares the request and imports the cache.
    ///
    /// Returns the request to hand to the transport. Fails with
    /// [`TaskError::AlreadyRunning`] if an attempt is in flight and with
    /// [`TaskError::Cancelled`] if the attempt was cancelled before dispatch.
    pub async fn start_session(&mut self, ctx: &TaskContext) -> Result<PreparedRequest, TaskError> {
        let request = self.prepare(ctx)?;
        self.import_cache(ctx).await;
        if self.state.is_cancelled() {
            return Err(TaskError::Cancelled);
        }
        Ok(request)
    }

    /// Resets output, rebuilds the URL and cache key and enters `Running`.
    ///
    /// No notification fires here; `import_cache` sends the `sending`
    /// notification once the cache phase is known.
    pub(crate) fn prepare(&mut self, ctx: &TaskContext) -> Result<PreparedRequest, TaskError> {
        if self.state.is_running() {
            warn!(request_type = %self.request_type, "Task already running");
            return Err(TaskError::AlreadyRunning);
        }
        if self.cancel.is_cancelled() {
            self.apply_cancel();
            return Err(TaskError::Cancelled);
        }

        self.rest_all_output();

        let built = self.build_url(&ctx.config);
        self.cache_key = Some(ctx.digest.digest(&built.absolute));
        self.absolute_url.clone_from(&built.absolute);
        self.state = self.state.started();

        debug!(
            request_type = %self.request_type,
            url = %self.absolute_url,
            "Task prepared"
        );

        Ok(PreparedRequest {
            method: self.method,
            endpoint_url: built.endpoint,
            absolute_url: built.absolute,
            headers: self.http_request_fields(&ctx.config),
            params: built.params,
        })
    }

    /// Applies the cache import policy and sends the `sending` notification.
    pub(crate) async fn import_cache(&mut self, ctx: &TaskContext) {
        if self.check_cancelled() || !self.state.is_running() {
            return;
        }

        let (phase, payload) = if self.cached && self.import_cache_once {
            self.lookup_cache(ctx).await
        } else {
            (CachePhase::CacheNoTry, None)
        };

        // Cancellation may have arrived during the lookup.
        if self.check_cancelled() {
            return;
        }

        if payload.is_some() {
            self.response_object = payload;
        }
        self.state = self.state.with_cache(phase);
        debug!(request_type = %self.request_type, state = %self.state, "Cache import done");
        self.notify(Notification::Sending);
    }

    async fn lookup_cache(&self, ctx: &TaskContext) -> (CachePhase, Option<Payload>) {
        let Some(key) = &self.cache_key else {
            return (CachePhase::CacheFail, None);
        };
        match ctx.cache.get(key).await {
            Ok(Some(payload)) => (CachePhase::CacheSuccess, Some(payload)),
            Ok(None) => (CachePhase::CacheFail, None),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                (CachePhase::CacheFail, None)
            }
        }
    }

    // ========================================================================
    // Completion
    // ========================================================================

    /// Applies the transport's answer and sends `connected`.
    ///
    /// `result` is the parsed payload, `error` a transport-level failure.
    /// When the code check is on, the payload's business code must equal
    /// the configured success code.
    pub async fn response_session(
        &mut self,
        ctx: &TaskContext,
        result: Option<Payload>,
        error: Option<TaskError>,
    ) {
        if self.check_cancelled() {
            debug!(request_type = %self.request_type, "Discarding response for cancelled task");
            return;
        }
        if !self.state.is_running() {
            warn!(state = %self.state, "Ignoring response for task that is not running");
            return;
        }

        self.rest_all_output();

        let config = &ctx.config;
        let code = result
            .as_ref()
            .and_then(|payload| read_code(payload, &config.code_field));
        let code_present = result
            .as_ref()
            .is_some_and(|payload| payload.get(&config.code_field).is_some());
        let server_message = result
            .as_ref()
            .and_then(|payload| read_message(payload, &config.message_field));

        let error = match error {
            Some(error) => Some(error),
            None if self.should_check_code && code != Some(config.success_code) => {
                Some(TaskError::Business {
                    code,
                    message: server_message.clone().unwrap_or_else(|| match code {
                        Some(code) => format!("unexpected code {code}"),
                        None if code_present => {
                            format!("non-integer `{}` in response", config.code_field)
                        }
                        None => format!("missing `{}` in response", config.code_field),
                    }),
                })
            }
            None => None,
        };

        self.code_key = code;
        self.message = error.as_ref().map(ToString::to_string).or(server_message);

        if let Some(error) = error {
            self.error = Some(error);
            self.finish(Lifecycle::Fail);
        } else {
            self.response_object = result;
            self.finish(Lifecycle::Success);
            if self.cached {
                self.write_back(ctx).await;
            }
        }

        self.notify(Notification::Connected);
    }

    async fn write_back(&self, ctx: &TaskContext) {
        let (Some(key), Some(payload)) = (&self.cache_key, &self.response_object) else {
            return;
        };
        match ctx.cache.put(key, payload).await {
            Ok(()) => debug!(key = %key, "Cached response"),
            Err(e) => warn!(key = %key, error = %e, "Cache write failed"),
        }
    }

    /// Marks the server unreachable and sends `lost`.
    ///
    /// A payload imported from the cache stays available as a fallback.
    pub fn no_reach(&mut self) {
        self.no_reach_with_reason("the network connection was lost");
    }

    /// Like [`SessionTask::no_reach`], recording the transport's reason.
    pub fn no_reach_with_reason(&mut self, reason: impl Into<String>) {
        if self.check_cancelled() {
            debug!(request_type = %self.request_type, "Discarding no-reach for cancelled task");
            return;
        }
        if !self.state.is_running() {
            warn!(state = %self.state, "Ignoring no-reach for task that is not running");
            return;
        }

        let error = TaskError::Connectivity(reason.into());
        self.message = Some(error.to_string());
        self.error = Some(error);
        self.finish(Lifecycle::NoReach);

        self.notify(Notification::Lost);
    }

    // ========================================================================
    // Cancellation
    // ========================================================================

    /// Cancels the current attempt if it has not reached an end state.
    ///
    /// Returns true if the task moved to `Cancelled`.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.apply_cancel();
        true
    }

    /// Applies a pending cancellation request. Returns true if cancelled.
    fn check_cancelled(&mut self) -> bool {
        if self.state.is_cancelled() {
            return true;
        }
        if self.cancel.is_cancelled() && !self.state.is_terminal() {
            self.apply_cancel();
            return true;
        }
        false
    }

    fn apply_cancel(&mut self) {
        self.finish(Lifecycle::Cancelled);
        self.notify(Notification::Sending);
    }

    fn finish(&mut self, lifecycle: Lifecycle) {
        self.state = self.state.with_lifecycle(lifecycle);
        // Handles taken from here on apply to the next attempt.
        self.cancel = CancellationToken::new();
        info!(
            request_type = %self.request_type,
            url = %self.absolute_url,
            state = %self.state,
            "Task finished"
        );
    }

    fn notify(&self, notification: Notification) {
        let Some(listener) = self.listener.upgrade() else {
            debug!(?notification, "Listener dropped, skipping notification");
            return;
        };
        match notification {
            Notification::Sending => listener.on_sending(self),
            Notification::Connected => listener.on_connected(self),
            Notification::Lost => listener.on_lost(self),
        }
    }
}

impl std::fmt::Debug for SessionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTask")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("request_type", &self.request_type)
            .field("absolute_url", &self.absolute_url)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Reads the business code, accepting integers, integral floats and
/// numeric strings.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp
)]
fn read_code(payload: &Payload, field: &str) -> Option<i64> {
    let value = payload.get(field)?;
    if let Some(code) = value.as_i64() {
        return Some(code);
    }
    if let Some(code) = value.as_f64() {
        let in_range = code >= i64::MIN as f64 && code < i64::MAX as f64;
        return (code.fract() == 0.0 && in_range).then(|| code as i64);
    }
    value.as_str().and_then(|s| s.trim().parse().ok())
}

fn read_message(payload: &Payload, field: &str) -> Option<String> {
    payload.get(field)?.as_str().map(str::to_string)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, MemoryCacheStore};
    use crate::digest::cache_key_for;
    use crate::error::CacheError;
    use crate::transport::{Transport, TransportOutcome};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ------------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------------

    #[derive(Debug, Clone, PartialEq)]
    struct Event {
        kind: &'static str,
        state: TaskState,
        has_response: bool,
        has_error: bool,
    }

    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingListener {
        fn record(&self, kind: &'static str, task: &SessionTask) {
            self.events.lock().unwrap().push(Event {
                kind,
                state: task.state(),
                has_response: task.response_object().is_some(),
                has_error: task.error().is_some(),
            });
        }

        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        fn count(&self, kind: &str) -> usize {
            self.events().iter().filter(|e| e.kind == kind).count()
        }
    }

    impl TaskListener for RecordingListener {
        fn on_sending(&self, task: &SessionTask) {
            self.record("sending", task);
        }

        fn on_connected(&self, task: &SessionTask) {
            self.record("connected", task);
        }

        fn on_lost(&self, task: &SessionTask) {
            self.record("lost", task);
        }
    }

    struct IdleTransport;

    #[async_trait]
    impl Transport for IdleTransport {
        async fn execute(&self, _request: &PreparedRequest) -> TransportOutcome {
            TransportOutcome::Unreachable("idle".to_string())
        }
    }

    #[derive(Default)]
    struct CountingCache {
        inner: MemoryCacheStore,
        reads: AtomicUsize,
        writes: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for CountingCache {
        async fn get(&self, key: &CacheKey) -> Result<Option<Payload>, CacheError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn put(&self, key: &CacheKey, payload: &Payload) -> Result<(), CacheError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.put(key, payload).await
        }

        async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
            self.inner.remove(key).await
        }

        async fn clear(&self) -> Result<usize, CacheError> {
            self.inner.clear().await
        }
    }

    struct BrokenCache;

    #[async_trait]
    impl CacheStore for BrokenCache {
        async fn get(&self, _key: &CacheKey) -> Result<Option<Payload>, CacheError> {
            Err(CacheError::Other("disk on fire".to_string()))
        }

        async fn put(&self, _key: &CacheKey, _payload: &Payload) -> Result<(), CacheError> {
            Err(CacheError::Other("disk on fire".to_string()))
        }

        async fn remove(&self, _key: &CacheKey) -> Result<bool, CacheError> {
            Ok(false)
        }

        async fn clear(&self) -> Result<usize, CacheError> {
            Ok(0)
        }
    }

    fn context(cache: Arc<dyn CacheStore>) -> TaskContext {
        TaskContext::builder()
            .base_url("http://api.test")
            .transport(Arc::new(IdleTransport))
            .cache(cache)
            .build()
    }

    fn items_task(listener: &Arc<RecordingListener>) -> SessionTask {
        SessionTask::new(
            Method::Get,
            "/items",
            Params::new().with("q", "x"),
            listener,
            "items",
        )
    }

    // ------------------------------------------------------------------------
    // Construction and URL
    // ------------------------------------------------------------------------

    #[test]
    fn test_new_task_is_runnable_with_empty_output() {
        let listener = Arc::new(RecordingListener::default());
        let mut task = items_task(&listener);

        assert!(task.is_runnable());
        assert_eq!(task.state().cache(), CachePhase::NotTried);
        assert!(task.is_cached());
        assert!(task.import_cache_once());
        assert!(task.should_check_code());

        task.rest_all_output();
        assert!(task.response_object().is_none());
        assert!(task.error().is_none());
        assert!(task.message().is_none());
        assert!(task.code_key().is_none());
    }

    #[tokio::test]
    async fn test_start_builds_url_and_cache_key() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        let request = task.start_session(&ctx).await.unwrap();

        assert_eq!(task.absolute_url(), "http://api.test/items?q=x");
        assert_eq!(
            task.cache_key(),
            Some(&cache_key_for("http://api.test/items?q=x"))
        );
        assert_eq!(request.absolute_url, task.absolute_url());
        assert!(task.is_running());

        let events = listener.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "sending");
        assert!(events[0].state.is_running());
    }

    #[tokio::test]
    async fn test_task_base_url_overrides_default() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = SessionTask::with_path_substitutions(
            Method::Get,
            "/items/:id",
            Params::new(),
            vec!["42".to_string()],
            &listener,
            "item",
        );
        task.set_base_url(Some("https://other.test".to_string()));

        task.start_session(&ctx).await.unwrap();
        assert_eq!(task.absolute_url(), "https://other.test/items/42");
    }

    #[tokio::test]
    async fn test_url_is_rebuilt_for_every_attempt() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.no_reach();
        let first_key = task.cache_key().cloned();

        task.params_mut().set("q", "y");
        task.set_page(Some(2));
        task.start_session(&ctx).await.unwrap();

        assert_eq!(task.absolute_url(), "http://api.test/items?q=y&page=2");
        assert_ne!(task.cache_key().cloned(), first_key);
    }

    #[test]
    fn test_headers_merge_over_defaults() {
        let listener = Arc::new(RecordingListener::default());
        let mut task = items_task(&listener);
        let mut config = NetworkConfig::default();
        config
            .default_headers
            .insert("Accept".to_string(), "*/*".to_string());
        config
            .default_headers
            .insert("X-Client".to_string(), "app".to_string());

        task.set_header("accept", "application/json");
        task.set_header("X-Trace", "1");

        let headers = task.http_request_fields(&config);
        assert_eq!(headers.len(), 3);
        assert_eq!(headers["accept"], "application/json");
        assert_eq!(headers["X-Client"], "app");
        assert_eq!(headers["X-Trace"], "1");
    }

    #[tokio::test]
    async fn test_second_start_while_running_is_rejected() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        let err = task.start_session(&ctx).await.unwrap_err();

        assert_eq!(err, TaskError::AlreadyRunning);
        assert!(task.is_running());
        assert_eq!(listener.count("sending"), 1);
    }

    // ------------------------------------------------------------------------
    // Cache policy
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_uncached_task_never_touches_cache() {
        let listener = Arc::new(RecordingListener::default());
        let cache = Arc::new(CountingCache::default());
        let ctx = context(cache.clone());
        let mut task = items_task(&listener);
        task.set_cached(false);

        task.start_session(&ctx).await.unwrap();
        assert!(task.state().is_cache_no_try());

        task.response_session(&ctx, Some(json!({"code": 0})), None)
            .await;

        assert!(task.is_succeeded());
        assert_eq!(cache.reads.load(Ordering::SeqCst), 0);
        assert_eq!(cache.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_skip_import_still_writes_back() {
        let listener = Arc::new(RecordingListener::default());
        let cache = Arc::new(CountingCache::default());
        let ctx = context(cache.clone());
        let mut task = items_task(&listener);
        task.set_import_cache_once(false);

        task.start_session(&ctx).await.unwrap();
        assert!(task.state().is_cache_no_try());
        assert_eq!(cache.reads.load(Ordering::SeqCst), 0);

        task.response_session(&ctx, Some(json!({"code": 0, "items": [1]})), None)
            .await;

        assert_eq!(cache.writes.load(Ordering::SeqCst), 1);
        let key = task.cache_key().unwrap();
        assert_eq!(
            cache.inner.get(key).await.unwrap(),
            Some(json!({"code": 0, "items": [1]}))
        );
    }

    #[tokio::test]
    async fn test_cache_hit_surfaces_payload_while_running() {
        let listener = Arc::new(RecordingListener::default());
        let cache = Arc::new(MemoryCacheStore::new());
        cache
            .put(&cache_key_for("http://api.test/items?q=x"), &json!({"cached": true}))
            .await
            .unwrap();
        let ctx = context(cache);
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();

        assert!(task.is_running());
        assert!(task.is_cache_success());
        assert_eq!(task.response_object(), Some(&json!({"cached": true})));
        let events = listener.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, "sending");
        assert!(events[0].state.is_cache_success());
        assert!(events[0].has_response);
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();

        assert!(task.is_cache_fail());
        assert!(task.response_object().is_none());
        assert!(task.error().is_none());
        assert_eq!(listener.events()[0].state.cache(), CachePhase::CacheFail);
    }

    #[tokio::test]
    async fn test_cache_errors_are_not_task_errors() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(BrokenCache));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        assert!(task.is_cache_fail());

        task.response_session(&ctx, Some(json!({"code": 0})), None)
            .await;
        assert!(task.is_succeeded());
        assert!(task.error().is_none());
    }

    // ------------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_success_writes_back_and_notifies_once() {
        let listener = Arc::new(RecordingListener::default());
        let cache = Arc::new(MemoryCacheStore::new());
        let ctx = context(cache.clone());
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.response_session(
            &ctx,
            Some(json!({"code": 0, "message": "ok", "items": []})),
            None,
        )
        .await;

        assert!(task.is_succeeded());
        assert_eq!(task.code_key(), Some(0));
        assert_eq!(task.message(), Some("ok"));
        assert_eq!(listener.count("connected"), 1);
        assert_eq!(
            cache.get(task.cache_key().unwrap()).await.unwrap(),
            Some(json!({"code": 0, "message": "ok", "items": []}))
        );
    }

    #[tokio::test]
    async fn test_business_code_mismatch_fails() {
        let listener = Arc::new(RecordingListener::default());
        let cache = Arc::new(CountingCache::default());
        let ctx = context(cache.clone());
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.response_session(
            &ctx,
            Some(json!({"code": "401", "message": "token expired"})),
            None,
        )
        .await;

        assert!(task.is_failed());
        assert_eq!(task.code_key(), Some(401));
        assert_eq!(task.message(), Some("Business error: token expired"));
        assert_eq!(
            task.error(),
            Some(&TaskError::Business {
                code: Some(401),
                message: "token expired".to_string(),
            })
        );
        assert!(task.response_object().is_none());
        assert_eq!(cache.writes.load(Ordering::SeqCst), 0);

        let last = listener.events().pop().unwrap();
        assert_eq!(last.kind, "connected");
        assert!(last.state.is_failed());
    }

    #[tokio::test]
    async fn test_missing_code_fails_when_checking() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.response_session(&ctx, Some(json!({"items": []})), None)
            .await;

        assert!(task.is_failed());
        assert!(task.error().is_some_and(TaskError::is_business));
        assert_eq!(task.message(), Some("Business error: missing `code` in response"));
    }

    #[tokio::test]
    async fn test_integral_float_code_is_accepted() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.response_session(&ctx, Some(json!({"code": 0.0})), None)
            .await;

        assert!(task.is_succeeded());
        assert_eq!(task.code_key(), Some(0));
    }

    #[tokio::test]
    async fn test_unreadable_code_is_not_reported_missing() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.response_session(&ctx, Some(json!({"code": 1.5})), None)
            .await;

        assert!(task.is_failed());
        assert_eq!(task.code_key(), None);
        assert_eq!(task.message(), Some("Business error: non-integer `code` in response"));
    }

    #[test]
    fn test_read_code_forms() {
        assert_eq!(read_code(&json!({"code": 7}), "code"), Some(7));
        assert_eq!(read_code(&json!({"code": "7"}), "code"), Some(7));
        assert_eq!(read_code(&json!({"code": 7.0}), "code"), Some(7));
        assert_eq!(read_code(&json!({"code": u64::MAX}), "code"), None);
        assert_eq!(read_code(&json!({}), "code"), None);
    }

    #[tokio::test]
    async fn test_without_code_check_transport_success_wins() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);
        task.set_should_check_code(false);

        task.start_session(&ctx).await.unwrap();
        task.response_session(&ctx, Some(json!({"code": 500})), None)
            .await;

        assert!(task.is_succeeded());
        assert_eq!(task.code_key(), Some(500));
    }

    #[tokio::test]
    async fn test_transport_error_fails() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);
        task.set_should_check_code(false);

        task.start_session(&ctx).await.unwrap();
        task.response_session(&ctx, None, Some(TaskError::HttpStatus { status: 503 }))
            .await;

        assert!(task.is_failed());
        assert_eq!(task.message(), Some("HTTP status 503"));
        assert_eq!(listener.count("connected"), 1);
    }

    #[tokio::test]
    async fn test_response_clears_imported_payload() {
        let listener = Arc::new(RecordingListener::default());
        let cache = Arc::new(MemoryCacheStore::new());
        cache
            .put(&cache_key_for("http://api.test/items?q=x"), &json!({"stale": true}))
            .await
            .unwrap();
        let ctx = context(cache);
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.response_session(&ctx, Some(json!({"code": 7})), None)
            .await;

        assert!(task.is_failed());
        assert!(task.response_object().is_none());
    }

    #[tokio::test]
    async fn test_no_reach_keeps_cached_payload() {
        let listener = Arc::new(RecordingListener::default());
        let cache = Arc::new(MemoryCacheStore::new());
        cache
            .put(&cache_key_for("http://api.test/items?q=x"), &json!({"p": 1}))
            .await
            .unwrap();
        let ctx = context(cache);
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.no_reach_with_reason("connection refused");

        assert!(task.is_no_reach());
        assert!(task.is_cache_success());
        assert_eq!(task.response_object(), Some(&json!({"p": 1})));
        assert_eq!(
            task.error(),
            Some(&TaskError::Connectivity("connection refused".to_string()))
        );
        assert_eq!(listener.count("lost"), 1);
        assert_eq!(listener.count("connected"), 0);
    }

    #[tokio::test]
    async fn test_output_is_cleared_before_next_attempt_notifies() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);
        task.set_cached(false);

        task.start_session(&ctx).await.unwrap();
        task.response_session(&ctx, Some(json!({"code": 3, "message": "nope"})), None)
            .await;
        assert!(task.error().is_some());

        task.start_session(&ctx).await.unwrap();

        let last = listener.events().pop().unwrap();
        assert_eq!(last.kind, "sending");
        assert!(!last.has_response);
        assert!(!last.has_error);
        assert!(task.message().is_none());
        assert!(task.code_key().is_none());
    }

    #[tokio::test]
    async fn test_completion_without_start_is_ignored() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.response_session(&ctx, Some(json!({"code": 0})), None)
            .await;
        task.no_reach();

        assert!(task.is_runnable());
        assert!(listener.events().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_listener_is_harmless() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);
        drop(listener);

        task.start_session(&ctx).await.unwrap();
        task.response_session(&ctx, Some(json!({"code": 0})), None)
            .await;

        assert!(task.is_succeeded());
    }

    #[tokio::test]
    async fn test_replaced_listener_receives_notifications() {
        let first = Arc::new(RecordingListener::default());
        let second = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&first);
        task.set_listener(&second);

        task.start_session(&ctx).await.unwrap();

        assert!(first.events().is_empty());
        assert_eq!(second.events().len(), 1);
        assert_eq!(second.events()[0].kind, "sending");
    }

    // ------------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_cancel_while_running_discards_late_result() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        task.cancel_handle().cancel();

        task.response_session(&ctx, Some(json!({"code": 0})), None)
            .await;
        task.no_reach();

        assert!(task.is_cancelled());
        assert!(task.response_object().is_none());
        let cancelled: Vec<_> = listener
            .events()
            .into_iter()
            .filter(|e| e.state.is_cancelled())
            .collect();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].kind, "sending");
        assert_eq!(listener.count("connected"), 0);
        assert_eq!(listener.count("lost"), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_finish_has_no_effect() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.start_session(&ctx).await.unwrap();
        let stale = task.cancel_handle();
        task.response_session(&ctx, Some(json!({"code": 0})), None)
            .await;

        stale.cancel();
        assert!(!task.cancel());
        assert!(task.is_succeeded());

        // The next attempt is unaffected by the stale handle.
        task.start_session(&ctx).await.unwrap();
        assert!(task.is_running());
    }

    #[tokio::test]
    async fn test_cancel_before_start_rejects_start() {
        let listener = Arc::new(RecordingListener::default());
        let ctx = context(Arc::new(MemoryCacheStore::new()));
        let mut task = items_task(&listener);

        task.cancel_handle().cancel();
        let err = task.start_session(&ctx).await.unwrap_err();

        assert_eq!(err, TaskError::Cancelled);
        assert!(task.is_cancelled());
        assert_eq!(listener.count("sending"), 1);

        // A cancelled task can be started again.
        task.start_session(&ctx).await.unwrap();
        assert!(task.is_running());
    }
}
