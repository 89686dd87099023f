use eventsource_stream::Eventsource;
use serde::Deserialize;
use tokio_stream::StreamExt;

use crate::error::LlmError;
use crate::provider::DeltaStream;

enum StreamItem {
    Delta(String),
    Stop,
    Skip,
    Failed(LlmError),
}

/// Convert a Bedrock converse-stream response into a `DeltaStream`.
///
/// The stream ends at the first `messageStop` event or when the body closes.
pub(crate) fn bedrock_sse_to_stream(response: reqwest::Response) -> DeltaStream {
    let event_stream = response.bytes_stream().eventsource();
    let mapped = event_stream
        .map(|event| match event {
            Ok(event) => parse_bedrock_event(&event.data),
            Err(e) => StreamItem::Failed(LlmError::SseParse(e.to_string())),
        })
        .take_while(|item| !matches!(item, StreamItem::Stop))
        .filter_map(|item| match item {
            StreamItem::Delta(text) => Some(Ok(text)),
            StreamItem::Failed(e) => Some(Err(e)),
            StreamItem::Stop | StreamItem::Skip => None,
        });
    Box::pin(mapped)
}

fn parse_bedrock_event(data: &str) -> StreamItem {
    let data = data.trim();
    if data.is_empty() {
        return StreamItem::Skip;
    }
    match serde_json::from_str::<BedrockStreamEvent>(data) {
        Ok(event) => {
            if event.message_stop.is_some() {
                return StreamItem::Stop;
            }
            match event
                .content_block_delta
                .and_then(|d| d.delta)
                .and_then(|d| d.text)
            {
                Some(text) if !text.is_empty() => StreamItem::Delta(text),
                _ => StreamItem::Skip,
            }
        }
        Err(e) => {
            tracing::debug!("skipping malformed Bedrock stream event: {e}");
            StreamItem::Skip
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BedrockStreamEvent {
    #[serde(default)]
    content_block_delta: Option<ContentBlockDelta>,
    #[serde(default)]
    message_stop: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    #[serde(default)]
    delta: Option<DeltaBody>,
}

#[derive(Deserialize)]
struct DeltaBody {
    #[serde(default)]
    text: Option<String>,
}
