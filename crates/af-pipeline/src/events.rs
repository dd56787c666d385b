use af_core::Stage;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Lifecycle notifications emitted around stage boundaries.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageStart {
        request_id: String,
        stage: Stage,
    },
    StageComplete {
        request_id: String,
        stage: Stage,
    },
    StageError {
        request_id: String,
        stage: Stage,
        error: String,
    },
    Complete {
        request_id: String,
    },
    Cancelled {
        request_id: String,
    },
    BatchError {
        request_id: String,
        error: String,
    },
}

/// Typed side channel for pipeline notifications.
///
/// A sink without a sender, or one whose receiver has been dropped, discards
/// events silently; delivery is best-effort and never blocks the pipeline.
#[derive(Clone, Debug, Default)]
pub struct EventSink {
    tx: Option<UnboundedSender<PipelineEvent>>,
}

impl EventSink {
    /// Build a connected sink/receiver pair.
    pub fn channel() -> (Self, UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_delivers_events() {
        let (sink, mut rx) = EventSink::channel();
        sink.emit(PipelineEvent::Complete {
            request_id: "r1".into(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            PipelineEvent::Complete {
                request_id: "r1".into()
            }
        );
    }

    #[test]
    fn test_disabled_sink_drops_events() {
        let sink = EventSink::disabled();
        sink.emit(PipelineEvent::Complete {
            request_id: "r1".into(),
        });
    }
}
