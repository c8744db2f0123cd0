//! Display Worker
//!
//! Owns the private render-request queue and the thread that drains it.
//! Only the Controller ever submits requests, and the worker hands them to
//! the [`Renderer`](crate::render::Renderer) collaborator strictly one at
//! a time, in arrival order - an e-paper refresh is slow and the panel
//! cannot be driven reentrantly. Requests are never dropped; a render
//! failure is logged and the worker moves on to the next request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::queue::EventQueue;
use crate::render::{RenderRequest, Renderer};

/// Handle to the display worker thread.
pub struct DisplayWorker {
    requests: Arc<EventQueue<RenderRequest>>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl DisplayWorker {
    /// Spawn the worker thread around a renderer.
    ///
    /// `poll_interval` bounds how long a stop request can go unnoticed; it
    /// has no effect on throughput.
    pub fn spawn(mut renderer: Box<dyn Renderer>, poll_interval: Duration) -> Self {
        let requests = Arc::new(EventQueue::<RenderRequest>::new());
        let stop = Arc::new(AtomicBool::new(false));

        let join = {
            let requests = Arc::clone(&requests);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("treadle-display".to_string())
                .spawn(move || {
                    tracing::debug!("display worker started");
                    loop {
                        match requests.pop_timeout(poll_interval) {
                            Some(request) => {
                                tracing::debug!(request = request.name(), "rendering");
                                if let Err(e) = renderer.render(&request) {
                                    tracing::warn!(
                                        request = request.name(),
                                        error = %e,
                                        "render failed, continuing"
                                    );
                                }
                            }
                            // Stop only once the backlog is rendered;
                            // queued requests are never dropped.
                            None => {
                                if stop.load(Ordering::SeqCst) {
                                    break;
                                }
                            }
                        }
                    }
                    tracing::debug!("display worker stopped");
                })
                .expect("Failed to spawn display thread")
        };

        Self {
            requests,
            stop,
            join: Some(join),
        }
    }

    /// Queue one render request. Never blocks.
    pub fn submit(&self, request: RenderRequest) {
        self.requests.push(request);
    }

    /// Number of requests waiting to render.
    pub fn pending(&self) -> usize {
        self.requests.len()
    }

    /// Stop the worker and wait for its thread.
    ///
    /// Requests already queued are rendered before the thread exits - the
    /// caller is the only producer, so the backlog is finite by the time
    /// this is called.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!("display worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::render::RenderError;

    /// Renderer that records every request it receives.
    struct RecordingRenderer {
        log: Arc<Mutex<Vec<RenderRequest>>>,
        fail_first: bool,
        calls: usize,
    }

    impl Renderer for RecordingRenderer {
        fn render(&mut self, request: &RenderRequest) -> Result<(), RenderError> {
            self.calls += 1;
            if self.fail_first && self.calls == 1 {
                return Err(RenderError::Panel("refresh rejected".to_string()));
            }
            self.log.lock().push(request.clone());
            Ok(())
        }
    }

    #[test]
    fn test_requests_render_in_arrival_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut worker = DisplayWorker::spawn(
            Box::new(RecordingRenderer {
                log: Arc::clone(&log),
                fail_first: false,
                calls: 0,
            }),
            Duration::from_millis(10),
        );

        worker.submit(RenderRequest::ShowLoadingPrompt);
        worker.submit(RenderRequest::AdvanceLoadingBar { unit: 0 });
        worker.submit(RenderRequest::ShowResponse {
            text: "done".to_string(),
        });

        // stop() flushes the backlog before joining.
        worker.stop();

        assert_eq!(
            *log.lock(),
            vec![
                RenderRequest::ShowLoadingPrompt,
                RenderRequest::AdvanceLoadingBar { unit: 0 },
                RenderRequest::ShowResponse {
                    text: "done".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_render_failure_does_not_stop_the_worker() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut worker = DisplayWorker::spawn(
            Box::new(RecordingRenderer {
                log: Arc::clone(&log),
                fail_first: true,
                calls: 0,
            }),
            Duration::from_millis(10),
        );

        worker.submit(RenderRequest::ShowLoadingPrompt);
        worker.submit(RenderRequest::AdvanceLoadingBar { unit: 1 });

        worker.stop();

        // The first request fell to the failure; the second still rendered.
        assert_eq!(
            *log.lock(),
            vec![RenderRequest::AdvanceLoadingBar { unit: 1 }]
        );
    }
}
