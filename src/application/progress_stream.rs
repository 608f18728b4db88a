use std::collections::VecDeque;

use futures::{stream::BoxStream, StreamExt};

use crate::{
    api::{
        decode::parse_progress,
        sse::{SseDecoder, SseEvent},
        ApiClient, ByteStream, ProgressData,
    },
    domain::JobId,
};

/// What the reader reports for one job's subscription
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(ProgressData),
    /// The server sent `close`
    Closed,
    /// Connection-level failure; the subscription is over
    Failed(String),
}

/// A live subscription that can be torn down from outside.
pub trait StreamHandle {
    fn close(&self);
}

/// Holds at most one live subscription (progress stream or file transfer).
///
/// A new subscription always closes the previous one first, so events from an
/// old job can never interleave with the new one.
pub struct SubscriptionSlot<H: StreamHandle> {
    current: Option<(JobId, H)>,
}

impl<H: StreamHandle> Default for SubscriptionSlot<H> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<H: StreamHandle> SubscriptionSlot<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `handle` for `job_id`, returning the job whose stream was closed.
    pub fn replace(&mut self, job_id: JobId, handle: H) -> Option<JobId> {
        let previous = self.close();
        self.current = Some((job_id, handle));
        previous
    }

    pub fn close(&mut self) -> Option<JobId> {
        let (job_id, handle) = self.current.take()?;
        handle.close();
        log::debug!("Closed subscription for job {}", job_id);
        Some(job_id)
    }
}

impl<H: StreamHandle> Drop for SubscriptionSlot<H> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Subscribes to a job's progress events.
///
/// The stream ends after a terminal snapshot, a `close` event or a transport
/// failure. There is no reconnect.
pub fn progress_events(client: ApiClient, job_id: JobId) -> BoxStream<'static, StreamEvent> {
    futures::stream::unfold(
        ReaderState::Connect { client, job_id },
        |state| async move { next_event(state).await },
    )
    .boxed()
}

enum ReaderState {
    Connect {
        client: ApiClient,
        job_id: JobId,
    },
    Reading {
        job_id: JobId,
        // None once the body is exhausted
        body: Option<ByteStream>,
        decoder: SseDecoder,
        pending: VecDeque<SseEvent>,
    },
    Finished,
}

async fn next_event(mut state: ReaderState) -> Option<(StreamEvent, ReaderState)> {
    loop {
        state = match state {
            ReaderState::Connect { client, job_id } => {
                match client.progress_stream(&job_id).await {
                    Ok(body) => {
                        log::info!("Progress stream opened for job {}", job_id);
                        ReaderState::Reading {
                            job_id,
                            body: Some(body),
                            decoder: SseDecoder::new(),
                            pending: VecDeque::new(),
                        }
                    }
                    Err(e) => {
                        log::error!("Progress stream for job {} failed to open: {}", job_id, e);
                        return Some((StreamEvent::Failed(e.to_string()), ReaderState::Finished));
                    }
                }
            }
            ReaderState::Reading {
                job_id,
                mut body,
                mut decoder,
                mut pending,
            } => {
                if let Some(frame) = pending.pop_front() {
                    if let Some(event) = interpret(&job_id, frame) {
                        let ends_stream = match &event {
                            StreamEvent::Progress(progress) => progress.status.is_terminal(),
                            StreamEvent::Closed | StreamEvent::Failed(_) => true,
                        };
                        let next = if ends_stream {
                            log::debug!("Progress stream for job {} finished", job_id);
                            ReaderState::Finished
                        } else {
                            ReaderState::Reading {
                                job_id,
                                body,
                                decoder,
                                pending,
                            }
                        };
                        return Some((event, next));
                    }
                } else {
                    let Some(stream) = body.as_mut() else {
                        log::error!("Progress stream for job {} ended without a final status", job_id);
                        return Some((
                            StreamEvent::Failed("Progress stream ended unexpectedly".to_string()),
                            ReaderState::Finished,
                        ));
                    };

                    let next = stream.next().await;
                    match next {
                        Some(Ok(chunk)) => pending.extend(decoder.push(&chunk)),
                        Some(Err(e)) => {
                            log::error!("Progress stream for job {} broke: {}", job_id, e);
                            return Some((StreamEvent::Failed(e.to_string()), ReaderState::Finished));
                        }
                        None => {
                            body = None;
                            pending.extend(decoder.finish());
                        }
                    }
                }

                ReaderState::Reading {
                    job_id,
                    body,
                    decoder,
                    pending,
                }
            }
            ReaderState::Finished => return None,
        };
    }
}

fn interpret(job_id: &str, frame: SseEvent) -> Option<StreamEvent> {
    match frame.event.as_str() {
        "progress" => match parse_progress(&frame.data) {
            Ok(progress) => Some(StreamEvent::Progress(progress)),
            Err(e) => {
                log::warn!(
                    "Dropping undecodable progress payload for job {}: {} ({:?})",
                    job_id,
                    e,
                    frame.data
                );
                None
            }
        },
        "close" => Some(StreamEvent::Closed),
        other => {
            log::debug!("Ignoring '{}' event on job {}", other, job_id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiConfig, ProgressStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandle(Arc<AtomicUsize>);

    impl StreamHandle for CountingHandle {
        fn close(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_slot_closes_exactly_one_previous_stream() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut slot = SubscriptionSlot::new();

        assert_eq!(slot.replace("a".to_string(), CountingHandle(first.clone())), None);
        assert_eq!(
            slot.replace("b".to_string(), CountingHandle(second.clone())),
            Some("a".to_string())
        );

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        assert_eq!(slot.close(), Some("b".to_string()));
        assert_eq!(slot.close(), None);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dropping_slot_closes_live_stream() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let mut slot = SubscriptionSlot::new();
            slot.replace("a".to_string(), CountingHandle(count.clone()));
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    async fn collect_events(server: &mut mockito::ServerGuard, status: usize, body: &str) -> Vec<StreamEvent> {
        server
            .mock("GET", "/api/download/progress/job-1")
            .match_header("accept", "text/event-stream")
            .with_status(status)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = ApiClient::new(ApiConfig::new(&server.url()).unwrap()).unwrap();
        progress_events(client, "job-1".to_string()).collect().await
    }

    fn statuses(events: &[StreamEvent]) -> Vec<Option<ProgressStatus>> {
        events
            .iter()
            .map(|event| match event {
                StreamEvent::Progress(progress) => Some(progress.status),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_stream_stops_after_completed_and_skips_garbage() {
        let mut server = mockito::Server::new_async().await;
        let body = "event: progress\r\ndata: {'status': 'downloading', 'percentage': 10.0, 'eta': None}\r\n\r\n\
                    event: progress\r\ndata: {'status': \r\n\r\n\
                    event: progress\r\ndata: {'status': 'completed', 'filename': 'downloads/job-1_a.mp4'}\r\n\r\n\
                    event: close\r\ndata: Stream closed\r\n\r\n";

        let events = collect_events(&mut server, 200, body).await;

        assert_eq!(
            statuses(&events),
            vec![Some(ProgressStatus::Downloading), Some(ProgressStatus::Completed)]
        );
        match &events[1] {
            StreamEvent::Progress(progress) => {
                assert_eq!(progress.filename.as_deref(), Some("downloads/job-1_a.mp4"))
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_close_event_ends_stream() {
        let mut server = mockito::Server::new_async().await;
        let body = "event: progress\ndata: {'status': 'waiting', 'message': 'Waiting for job to start...'}\n\n\
                    event: close\ndata: Stream closed\n\n\
                    event: progress\ndata: {'status': 'downloading'}\n\n";

        let events = collect_events(&mut server, 200, body).await;

        assert_eq!(events.len(), 2);
        assert_eq!(statuses(&events)[0], Some(ProgressStatus::Waiting));
        assert_eq!(events[1], StreamEvent::Closed);
    }

    #[tokio::test]
    async fn test_truncated_body_is_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let body = "event: progress\ndata: {'status': 'downloading'}\n\n";

        let events = collect_events(&mut server, 200, body).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], StreamEvent::Failed(_)));
    }

    #[tokio::test]
    async fn test_error_status_fails_immediately() {
        let mut server = mockito::Server::new_async().await;
        let events = collect_events(&mut server, 500, "").await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Failed(_)));
    }
}
