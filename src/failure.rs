//! Classifies transport failures and drives the terminal or retryable UI
//! states. Connection errors keep the failed request for manual replay; every
//! other failure freezes the application.

use std::cell::RefCell;

use crate::batcher::OutgoingRequest;
use crate::events::EventTranslator;
use crate::host::{ShellFeedback, TransportReply};
use crate::response::{ErrorEnvelope, ProcessError};

pub const CONNECTION_NOTICE: &str = "The server seems to be temporarily unavailable";

/// Injectable predicate deciding whether a status code means the network
/// layer rejected the request. The encoding differs by execution environment,
/// so platform variants are supplied as constructors rather than detected at
/// runtime.
pub struct ConnectionErrorPolicy {
    predicate: Box<dyn Fn(u16) -> bool>,
}

impl ConnectionErrorPolicy {
    pub fn new(predicate: impl Fn(u16) -> bool + 'static) -> ConnectionErrorPolicy {
        ConnectionErrorPolicy {
            predicate: Box::new(predicate),
        }
    }

    /// Modern user agents report connection-level failures as status 0.
    pub fn status_zero() -> ConnectionErrorPolicy {
        ConnectionErrorPolicy::new(|status| status == 0)
    }

    /// Legacy WinINet stacks surface dedicated error codes instead.
    pub fn wininet() -> ConnectionErrorPolicy {
        ConnectionErrorPolicy::new(|status| {
            matches!(status, 12007 | 12029 | 12030 | 12031 | 12152)
        })
    }

    pub fn is_connection_error(&self, status: u16) -> bool {
        (self.predicate)(status)
    }
}

pub struct FailureHandler {
    policy: ConnectionErrorPolicy,
    retry_request: RefCell<Option<OutgoingRequest>>,
}

impl FailureHandler {
    pub fn new(policy: ConnectionErrorPolicy) -> FailureHandler {
        FailureHandler {
            policy,
            retry_request: RefCell::new(None),
        }
    }

    pub fn is_connection_error(&self, status: u16) -> bool {
        self.policy.is_connection_error(status)
    }

    /// Connection failures are recoverable: present a persistent notice and
    /// keep the exact failed request, body and dispatch mode unchanged, for
    /// manual replay.
    pub fn connection_lost(
        &self,
        shell: &dyn ShellFeedback,
        failed_request: OutgoingRequest,
        status: u16,
    ) {
        tracing::warn!(status, "connection error; offering manual retry");
        *self.retry_request.borrow_mut() = Some(failed_request);
        shell.show_retry_notice(CONNECTION_NOTICE);
    }

    pub fn take_retry_request(&self) -> Option<OutgoingRequest> {
        self.retry_request.borrow_mut().take()
    }

    pub fn has_retry_request(&self) -> bool {
        self.retry_request.borrow().is_some()
    }

    /// Non-2xx replies are terminal. A JSON body carries a structured server
    /// message; anything else is shown as raw diagnostic text.
    pub fn status_failure(
        &self,
        translator: &EventTranslator,
        shell: &dyn ShellFeedback,
        reply: &TransportReply,
    ) {
        let content = if reply.body.is_empty() {
            format!("Request failed.\nHTTP status code: {}", reply.status)
        } else if reply.is_json() {
            match serde_json::from_str::<ErrorEnvelope>(&reply.body) {
                Ok(envelope) => envelope
                    .meta
                    .message
                    .unwrap_or_else(|| reply.body.clone()),
                Err(_) => reply.body.clone(),
            }
        } else {
            reply.body.clone()
        };
        tracing::error!(status = reply.status, "server reported request failure");
        self.terminate(translator, shell, &content);
    }

    /// A thrown error while applying a response leaves the UI state suspect;
    /// capture the offending instruction context and freeze.
    pub fn processing_failure(
        &self,
        translator: &EventTranslator,
        shell: &dyn ShellFeedback,
        error: &ProcessError,
        request_body: &str,
    ) {
        tracing::error!(%error, "failed to process server response");
        let content = format!(
            "Could not process server response:\n  error: {error}\n  request: {request_body}"
        );
        self.terminate(translator, shell, &content);
    }

    fn terminate(&self, translator: &EventTranslator, shell: &dyn ShellFeedback, content: &str) {
        translator.freeze();
        shell.freeze();
        shell.show_diagnostic_page(content);
    }
}
