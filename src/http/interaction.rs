//! Recorded request/response pairs

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};

use super::{Headers, Request, Response};

/// One recorded exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpInteraction {
    /// The request
    pub request: Request,
    /// The response it produced
    pub response: Response,
    /// When the exchange was recorded
    pub recorded_at: DateTime<Utc>,
}

impl HttpInteraction {
    /// Create an interaction stamped with the current time
    pub fn new(request: Request, response: Response) -> Self {
        Self {
            request,
            response,
            recorded_at: Utc::now(),
        }
    }

    /// Create an interaction with an explicit timestamp
    pub fn with_timestamp(
        request: Request,
        response: Response,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request,
            response,
            recorded_at,
        }
    }

    /// Short description used in diagnostics
    #[must_use]
    pub fn summary(&self) -> String {
        let snippet: String = String::from_utf8_lossy(self.response.body.as_bytes())
            .chars()
            .take(80)
            .collect();
        format!(
            "[{} {}] => [{} {:?}]",
            self.request.method, self.request.uri, self.response.status.code, snippet
        )
    }
}

/// Mutation wrapper handed to hooks
///
/// The ignored flag lives only as long as this wrapper; it is never persisted.
#[derive(Debug)]
pub struct HookAwareInteraction<'a> {
    interaction: &'a mut HttpInteraction,
    ignored: bool,
}

impl<'a> HookAwareInteraction<'a> {
    /// Wrap an interaction for hook execution
    pub fn new(interaction: &'a mut HttpInteraction) -> Self {
        Self {
            interaction,
            ignored: false,
        }
    }

    /// Exclude this interaction from the current load or write
    pub fn ignore(&mut self) {
        self.ignored = true;
    }

    /// Whether a hook ignored this interaction
    #[must_use]
    pub fn is_ignored(&self) -> bool {
        self.ignored
    }

    /// Replace `text` with `replacement` in headers, bodies, the URI and the status message
    ///
    /// Empty arguments make this a no-op.
    pub fn filter(&mut self, text: &str, replacement: &str) {
        if text.is_empty() || replacement.is_empty() {
            return;
        }

        let interaction = &mut *self.interaction;
        filter_headers(&mut interaction.request.headers, text, replacement);
        filter_headers(&mut interaction.response.headers, text, replacement);
        interaction.request.body.replace(text, replacement);
        interaction.response.body.replace(text, replacement);
        interaction.request.uri = interaction.request.uri.replace(text, replacement);
        interaction.response.status.message = interaction
            .response
            .status
            .message
            .replace(text, replacement);
    }
}

impl Deref for HookAwareInteraction<'_> {
    type Target = HttpInteraction;

    fn deref(&self) -> &Self::Target {
        self.interaction
    }
}

impl DerefMut for HookAwareInteraction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.interaction
    }
}

fn filter_headers(headers: &mut Headers, text: &str, replacement: &str) {
    let filtered: Headers = std::mem::take(headers)
        .into_iter()
        .map(|(name, values)| {
            let values = values
                .into_iter()
                .map(|value| value.replace(text, replacement))
                .collect::<Vec<_>>();
            (name.replace(text, replacement), values)
        })
        .fold(Headers::new(), |mut acc, (name, values)| {
            acc.entry(name).or_default().extend(values);
            acc
        });
    *headers = filtered;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, ResponseStatus};

    fn interaction() -> HttpInteraction {
        HttpInteraction::new(
            Request::new(Method::Post, "http://example.com/login?key=secret")
                .with_header("Authorization", "Bearer secret")
                .with_header("X-secret", "1")
                .with_body("password=secret"),
            Response::new(ResponseStatus::new(200, "OK secret"))
                .with_header("Set-Cookie", "session=secret")
                .with_body("{\"token\":\"secret\"}"),
        )
    }

    #[test]
    fn test_filter_replaces_everywhere() {
        let mut original = interaction();
        let mut hooked = HookAwareInteraction::new(&mut original);
        hooked.filter("secret", "<TOKEN>");

        assert_eq!(hooked.request.uri, "http://example.com:80/login?key=<TOKEN>");
        assert_eq!(hooked.request.headers["Authorization"], vec!["Bearer <TOKEN>"]);
        assert!(hooked.request.headers.contains_key("X-<TOKEN>"));
        assert_eq!(hooked.request.body.as_str(), Some("password=<TOKEN>"));
        assert_eq!(hooked.response.status.message, "OK <TOKEN>");
        assert_eq!(hooked.response.headers["Set-Cookie"], vec!["session=<TOKEN>"]);
        assert_eq!(hooked.response.body.as_str(), Some("{\"token\":\"<TOKEN>\"}"));
    }

    #[test]
    fn test_filter_round_trip_is_identity() {
        let before = interaction();
        let mut copy = before.clone();
        {
            let mut hooked = HookAwareInteraction::new(&mut copy);
            hooked.filter("secret", "<TOKEN>");
            hooked.filter("<TOKEN>", "secret");
        }
        assert_eq!(copy, before);
    }

    #[test]
    fn test_filter_empty_is_noop() {
        let before = interaction();
        let mut copy = before.clone();
        {
            let mut hooked = HookAwareInteraction::new(&mut copy);
            hooked.filter("", "<TOKEN>");
            hooked.filter("secret", "");
        }
        assert_eq!(copy, before);
    }

    #[test]
    fn test_filter_whitespace_arguments_apply() {
        let mut original = interaction();
        let mut hooked = HookAwareInteraction::new(&mut original);
        hooked.filter(" ", "_");
        assert_eq!(hooked.response.status.message, "OK_secret");

        hooked.filter("secret", " ");
        assert_eq!(hooked.request.body.as_str(), Some("password= "));
    }

    #[test]
    fn test_ignore_flag() {
        let mut original = interaction();
        let mut hooked = HookAwareInteraction::new(&mut original);
        assert!(!hooked.is_ignored());
        hooked.ignore();
        assert!(hooked.is_ignored());
    }

    #[test]
    fn test_summary_mentions_method_uri_status() {
        let summary = interaction().summary();
        assert!(summary.contains("post http://example.com:80/login"));
        assert!(summary.contains("200"));
    }
}
