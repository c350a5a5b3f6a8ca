//! Helpers for building server-driven datastar SSE responses.

use std::convert::Infallible;

use async_stream::stream;
use axum::response::{
    IntoResponse, Response,
    sse::{Event, Sse},
};
use datastar::prelude::{ElementPatchMode, PatchElements, PatchSignals};
use futures::Stream;

/// Event patching `html` into the element matched by `selector`.
pub fn patch_event(html: String, selector: &str, mode: ElementPatchMode) -> Event {
    PatchElements::new(html)
        .selector(selector)
        .mode(mode)
        .write_as_axum_sse_event()
}

pub fn signals_event(payload: &str) -> Event {
    PatchSignals::new(payload).write_as_axum_sse_event()
}

/// Wrap an event stream produced incrementally, e.g. a placeholder sent before
/// awaiting the real content.
pub fn into_sse_response<S>(events: S) -> Response
where
    S: Stream<Item = Event> + Send + 'static,
{
    let stream = stream! {
        for await event in events {
            yield Ok::<Event, Infallible>(event);
        }
    };
    Sse::new(stream).into_response()
}

/// Builder for datastar responses whose events are all known up front.
pub struct StreamBuilder {
    events: Vec<Event>,
}

impl StreamBuilder {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Append an element patch targeting the supplied selector.
    pub fn push_patch(
        &mut self,
        html: String,
        selector: &str,
        mode: ElementPatchMode,
    ) -> &mut Self {
        self.events.push(patch_event(html, selector, mode));
        self
    }

    pub fn push_signals(&mut self, payload: &str) -> &mut Self {
        self.events.push(signals_event(payload));
        self
    }

    pub fn push_event(&mut self, event: Event) -> &mut Self {
        self.events.push(event);
        self
    }

    pub fn into_response(self) -> Response {
        into_sse_response(futures::stream::iter(self.events))
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

impl Default for StreamBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[tokio::test]
    async fn builder_emits_events_in_order() {
        let mut builder = StreamBuilder::new();
        builder
            .push_patch(
                "<p id=\"status\">first</p>".to_string(),
                "#status",
                ElementPatchMode::Replace,
            )
            .push_signals(r#"{"q":"lamp"}"#);
        assert_eq!(builder.len(), 2);

        let response = builder.into_response();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let text = String::from_utf8(body.to_vec()).expect("utf8");

        let patch_at = text.find("datastar-patch-elements").expect("patch event");
        let signals_at = text.find("datastar-patch-signals").expect("signals event");
        assert!(patch_at < signals_at);
        assert!(text.contains("first"));
    }
}
