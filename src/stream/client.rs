//! Research client: one connection per query.

use std::sync::Arc;

use super::protocol::{decode_frame, FeedbackFrame, QueryFrame, StreamEvent};
use super::transport::{Connector, Transport};
use super::StreamError;

/// Opens streaming sessions against the research service.
#[derive(Clone)]
pub struct ResearchClient {
    connector: Arc<dyn Connector>,
}

impl ResearchClient {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self {
            connector: Arc::new(connector),
        }
    }

    pub fn from_arc(connector: Arc<dyn Connector>) -> Self {
        Self { connector }
    }

    /// Connect and send the query. The query must be non-empty after trimming.
    ///
    /// A failure here is always [`StreamError::ConnectionFailed`] (or
    /// [`StreamError::EmptyQuery`]); nothing has been received yet.
    pub async fn start(&self, query: &str, session_id: &str) -> Result<StreamSession, StreamError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(StreamError::EmptyQuery);
        }

        let mut transport = self.connector.connect().await?;
        let frame = serde_json::to_string(&QueryFrame::new(query, session_id))?;
        if let Err(e) = transport.send(frame).await {
            let _ = transport.close().await;
            return Err(StreamError::ConnectionFailed(e.to_string()));
        }

        tracing::debug!(session_id, "Query sent");
        Ok(StreamSession {
            transport,
            session_id: session_id.to_string(),
            received_any: false,
            finished: false,
        })
    }
}

/// A single in-flight query.
pub struct StreamSession {
    transport: Box<dyn Transport>,
    session_id: String,
    received_any: bool,
    finished: bool,
}

impl StreamSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next decoded event. `None` after a terminal event or error.
    ///
    /// The peer closing the socket before any event is reported as
    /// [`StreamError::ConnectionFailed`]; closing mid-response is
    /// [`StreamError::ConnectionClosed`].
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent, StreamError>> {
        if self.finished {
            return None;
        }

        loop {
            let raw = match self.transport.recv().await {
                Some(Ok(raw)) => raw,
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(if self.received_any {
                        e
                    } else {
                        StreamError::ConnectionFailed(e.to_string())
                    }));
                }
                None => {
                    self.finished = true;
                    return Some(Err(if self.received_any {
                        StreamError::ConnectionClosed
                    } else {
                        StreamError::ConnectionFailed(
                            "closed before any event was received".to_string(),
                        )
                    }));
                }
            };

            match decode_frame(&raw) {
                Ok(Some(event)) => {
                    self.received_any = true;
                    tracing::debug!(kind = event.kind(), "Stream event");
                    if event.is_terminal() {
                        self.finished = true;
                        let _ = self.transport.close().await;
                    }
                    return Some(Ok(event));
                }
                // Heartbeats and unknown kinds don't count as a response.
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "Undecodable frame from research service");
                    self.finished = true;
                    let _ = self.transport.close().await;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Send the user's feedback choice on the same connection.
    pub async fn send_feedback(&mut self, choice: &str) -> Result<(), StreamError> {
        let frame = serde_json::to_string(&FeedbackFrame {
            feedback: choice.to_string(),
        })?;
        self.transport.send(frame).await
    }

    /// Abort the query and close the socket.
    pub async fn cancel(mut self) {
        tracing::info!(session_id = %self.session_id, "Cancelling stream");
        self.finished = true;
        if let Err(e) = self.transport.close().await {
            tracing::debug!(error = %e, "Error closing cancelled stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::transport::testing::ScriptedConnector;

    #[tokio::test]
    async fn test_start_rejects_blank_query() {
        let client = ResearchClient::new(ScriptedConnector::new(&[]));
        let err = match client.start("   \n", "s1").await {
            Ok(_) => panic!("Expected EmptyQuery"),
            Err(e) => e,
        };
        assert!(matches!(err, StreamError::EmptyQuery));
    }

    #[tokio::test]
    async fn test_start_sends_trimmed_query_with_session() {
        let connector = Arc::new(ScriptedConnector::new(&[r#"{"type":"done"}"#]));
        let client = ResearchClient::from_arc(connector.clone());

        let _session = client.start("  pet insurance for lizards ", "sess-9").await.unwrap();

        let sent: serde_json::Value = serde_json::from_str(&connector.sent()[0]).unwrap();
        assert_eq!(sent["query"], "pet insurance for lizards");
        assert_eq!(sent["context"]["session_id"], "sess-9");
    }

    #[tokio::test]
    async fn test_events_in_order_then_none() {
        let client = ResearchClient::new(ScriptedConnector::new(&[
            r#"{"type":"chunk","content":"Hi"}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"chunk","content":" there"}"#,
            r#"{"type":"complete"}"#,
            r#"{"type":"chunk","content":"never read"}"#,
        ]));
        let mut session = client.start("hello", "s").await.unwrap();

        let mut kinds = Vec::new();
        while let Some(event) = session.next_event().await {
            kinds.push(event.unwrap().kind());
        }
        assert_eq!(kinds, vec!["chunk", "chunk", "complete"]);
        assert!(session.is_finished());
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let client = ResearchClient::new(ScriptedConnector::refusing());
        let err = match client.start("hello", "s").await {
            Ok(_) => panic!("Expected ConnectionFailed"),
            Err(e) => e,
        };
        assert!(matches!(err, StreamError::ConnectionFailed(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_close_before_any_event_is_connection_failure() {
        let client = ResearchClient::new(ScriptedConnector::new(&[]));
        let mut session = client.start("hello", "s").await.unwrap();

        let err = session.next_event().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::ConnectionFailed(_)));
        assert!(session.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_heartbeats_alone_are_connection_failure() {
        let client = ResearchClient::new(ScriptedConnector::new(&[
            r#"{"type":"connected"}"#,
            r#"{"type":"ping"}"#,
            r#"{"event":"heartbeat"}"#,
        ]));
        let mut session = client.start("hello", "s").await.unwrap();

        let err = session.next_event().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_close_mid_stream_is_connection_closed() {
        let client = ResearchClient::new(ScriptedConnector::new(&[
            r#"{"type":"chunk","content":"partial"}"#,
        ]));
        let mut session = client.start("hello", "s").await.unwrap();

        assert!(session.next_event().await.unwrap().is_ok());
        let err = session.next_event().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_malformed_frame_ends_stream() {
        let client = ResearchClient::new(ScriptedConnector::new(&[
            "{oops",
            r#"{"type":"chunk","content":"unreachable"}"#,
        ]));
        let mut session = client.start("hello", "s").await.unwrap();

        let err = session.next_event().await.unwrap().unwrap_err();
        assert!(matches!(err, StreamError::Malformed(_)));
        assert!(session.next_event().await.is_none());
    }

    #[tokio::test]
    async fn test_send_feedback_frame() {
        let connector = Arc::new(ScriptedConnector::new(&[
            r#"{"type":"feedback_request","options":["approve","reject"]}"#,
        ]));
        let client = ResearchClient::from_arc(connector.clone());
        let mut session = client.start("hello", "s").await.unwrap();

        let event = session.next_event().await.unwrap().unwrap();
        assert_eq!(event.kind(), "feedback_request");
        session.send_feedback("approve").await.unwrap();

        assert_eq!(connector.sent()[1], r#"{"feedback":"approve"}"#);
    }
}
