//! Progress channel
//!
//! Events flow through a single unbounded channel, so the consumer sees
//! them in emission order no matter how query work is scheduled.

use deepresearch_core::{ProgressEvent, ProgressKind, ResearchOutcome};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// One frame of the research stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    Progress { step: ProgressEvent },
    Result(ResearchOutcome),
    Error { message: String },
}

impl StreamFrame {
    /// Frames after which nothing else is sent
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamFrame::Progress { .. })
    }

    /// Encode as a server-sent events frame: `data: <json>\n\n`
    pub fn to_sse(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "type": "error",
                "message": format!("Failed to encode frame: {}", e),
            })
            .to_string()
        });
        format!("data: {}\n\n", json)
    }
}

/// Sending half of the progress channel handed to every engine component
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<StreamFrame>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<StreamFrame>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that drops every event, for callers that only want the result
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a sink together with its receiving half
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StreamFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn emit(&self, kind: ProgressKind, content: impl Into<String>) {
        let step = ProgressEvent::new(kind, content);
        debug!(kind = %step.kind, content = %step.content, "Progress");

        if let Some(tx) = &self.tx {
            if tx.send(StreamFrame::Progress { step }).is_err() {
                debug!("Progress receiver dropped");
            }
        }
    }

    /// Send the terminal frame; returns false when nobody is listening
    pub fn finish(&self, frame: StreamFrame) -> bool {
        match &self.tx {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// True once the consumer has dropped the receiving half
    pub fn is_cancelled(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_frame_matches_wire_shape() {
        let frame = StreamFrame::Progress {
            step: ProgressEvent::new(ProgressKind::Query, "Created 2 SERP queries\na, b"),
        };
        let value: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["step"]["type"], "query");
        assert_eq!(value["step"]["content"], "Created 2 SERP queries\na, b");
    }

    #[test]
    fn result_frame_is_flat_and_camel_case() {
        let frame = StreamFrame::Result(ResearchOutcome {
            feedback_questions: vec!["q".to_string()],
            learnings: vec!["l".to_string()],
            visited_urls: vec!["https://a.example".to_string()],
            report: "# Research Report".to_string(),
        });
        let value: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["feedbackQuestions"][0], "q");
        assert_eq!(value["visitedUrls"][0], "https://a.example");
        assert!(frame.is_terminal());
    }

    #[test]
    fn sse_encoding() {
        let frame = StreamFrame::Error {
            message: "Research failed".to_string(),
        };
        assert_eq!(
            frame.to_sse(),
            "data: {\"type\":\"error\",\"message\":\"Research failed\"}\n\n"
        );
    }

    #[test]
    fn sink_reports_cancellation_when_receiver_drops() {
        let (sink, rx) = ProgressSink::channel();
        assert!(!sink.is_cancelled());
        drop(rx);
        assert!(sink.is_cancelled());
        assert!(!ProgressSink::disabled().is_cancelled());
    }

    #[tokio::test]
    async fn events_arrive_in_emission_order() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.emit(ProgressKind::Research, "Researching\na");
        sink.emit(ProgressKind::Research, "Researching\nb");
        drop(sink);

        let mut contents = Vec::new();
        while let Some(StreamFrame::Progress { step }) = rx.recv().await {
            contents.push(step.content);
        }
        assert_eq!(contents, vec!["Researching\na", "Researching\nb"]);
    }
}
