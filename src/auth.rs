//! Header-level guard run before any webhook business logic

use axum::http::{HeaderMap, Method, header};

pub const DEFAULT_REQUIRED_USER_AGENT: &str = "GitHub-Hookshot/";
pub const DEFAULT_EVENT_HEADER: &str = "x-github-event";

/// Events the relay accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEvent {
    Ping,
    Push,
}

impl WebhookEvent {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ping" => Some(WebhookEvent::Ping),
            "push" => Some(WebhookEvent::Push),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthRejection {
    #[error("method {0} is not allowed")]
    Method(Method),

    #[error("user agent {0:?} does not carry the required prefix")]
    UserAgent(Option<String>),

    #[error("event {0:?} is not allowed")]
    Event(Option<String>),
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    required_agent_prefix: String,
    event_header: String,
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new(DEFAULT_REQUIRED_USER_AGENT, DEFAULT_EVENT_HEADER)
    }
}

impl Authenticator {
    pub fn new(required_agent_prefix: impl Into<String>, event_header: impl Into<String>) -> Self {
        Self {
            required_agent_prefix: required_agent_prefix.into(),
            event_header: event_header.into().to_ascii_lowercase(),
        }
    }

    /// Accepts a POST from the expected client with a ping or push event.
    pub fn authenticate(
        &self,
        method: &Method,
        headers: &HeaderMap,
    ) -> Result<WebhookEvent, AuthRejection> {
        if *method != Method::POST {
            return Err(AuthRejection::Method(method.clone()));
        }

        let agent = header_str(headers, header::USER_AGENT.as_str());
        if !agent.is_some_and(|a| a.starts_with(&self.required_agent_prefix)) {
            return Err(AuthRejection::UserAgent(agent.map(String::from)));
        }

        let event = header_str(headers, &self.event_header);
        event
            .and_then(WebhookEvent::parse)
            .ok_or_else(|| AuthRejection::Event(event.map(String::from)))
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
