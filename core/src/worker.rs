//! Model Worker
//!
//! The keyboard-to-reply cycle: capture a line of input, hand the
//! conversation to the language model, journal the exchange, emit the
//! reply as an event, re-arm for the next visitor. The worker owns the
//! conversation outright - nothing else in the device reads or writes it.
//!
//! # Error Doctrine
//!
//! Nothing that happens inside a cycle may kill the worker. A backend
//! failure becomes an error-formatted reply that flows through the exact
//! same path as a real one (the Controller renders it without
//! special-casing), and a journal write failure is logged and forgotten.
//! The device keeps accepting new sessions indefinitely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::backend::LanguageModel;
use crate::capture::{KeySink, KeySource, LineCapture};
use crate::conversation::Conversation;
use crate::events::{Event, EventKind};
use crate::queue::EventQueue;
use crate::transcript::{ExchangeRecord, TranscriptJournal};

/// Handle to the model worker thread.
pub struct ModelWorker {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ModelWorker {
    /// Spawn the worker thread.
    ///
    /// The worker takes exclusive ownership of `conversation` and of the
    /// key source; `echo_every` is the keystroke-coalescing threshold and
    /// `poll_interval` bounds shutdown latency while waiting for input.
    pub fn spawn(
        events: Arc<EventQueue<Event>>,
        keys: Box<dyn KeySource>,
        backend: Arc<dyn LanguageModel>,
        journal: TranscriptJournal,
        conversation: Conversation,
        echo_every: u32,
        poll_interval: Duration,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));

        let join = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("treadle-model".to_string())
                .spawn(move || {
                    run_cycles(
                        &events,
                        keys,
                        backend.as_ref(),
                        &journal,
                        conversation,
                        echo_every,
                        poll_interval,
                        &stop,
                    );
                })
                .expect("Failed to spawn model worker thread")
        };

        Self {
            stop,
            join: Some(join),
        }
    }

    /// Stop the worker and wait for its thread.
    ///
    /// Cooperative: an in-flight model call is waited out rather than
    /// interrupted, so this may take up to one full completion.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                tracing::error!("model worker thread panicked");
            }
        }
    }
}

/// The worker loop. Runs until the stop flag is observed between cycles or
/// while waiting for input.
#[allow(clippy::too_many_arguments)]
fn run_cycles(
    events: &Arc<EventQueue<Event>>,
    mut keys: Box<dyn KeySource>,
    backend: &dyn LanguageModel,
    journal: &TranscriptJournal,
    mut conversation: Conversation,
    echo_every: u32,
    poll_interval: Duration,
    stop: &AtomicBool,
) {
    tracing::debug!(backend = backend.name(), "model worker started");
    let capture = Arc::new(LineCapture::new(Arc::clone(events), echo_every));

    while !stop.load(Ordering::SeqCst) {
        capture.reset();
        let sink: Arc<dyn KeySink> = capture.clone();
        keys.start(sink);

        let Some(text) = capture.wait_finalized(stop, poll_interval) else {
            keys.stop();
            break;
        };
        keys.stop();
        tracing::info!(chars = text.len(), "input finalized");

        conversation.push_user(text.clone());

        let reply = match backend.complete(&conversation) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(backend = backend.name(), error = %e, "completion failed");
                format!("Error: {e}")
            }
        };

        conversation.push_assistant(reply.clone());

        if let Err(e) = journal.append(&ExchangeRecord::new(&text, &reply)) {
            tracing::warn!(
                path = %journal.path().display(),
                error = %e,
                "transcript write failed"
            );
        }

        events.push(Event::new(EventKind::ModelResponse { reply }));
    }

    tracing::debug!("model worker stopped");
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::backend::BackendError;
    use crate::capture::{Key, KeySink};
    use crate::conversation::{ChatMessage, ChatRole};

    /// Key source driven by the test: each queued line is typed (plus
    /// enter) by a delivery thread once capture is started, so lines can be
    /// fed at the pace a real visitor would type them.
    struct ScriptedKeys {
        script: Arc<Mutex<std::collections::VecDeque<String>>>,
        cancel: Arc<AtomicBool>,
        join: Option<JoinHandle<()>>,
    }

    impl ScriptedKeys {
        fn new() -> (Arc<Mutex<std::collections::VecDeque<String>>>, Self) {
            let script = Arc::new(Mutex::new(std::collections::VecDeque::new()));
            (
                Arc::clone(&script),
                Self {
                    script,
                    cancel: Arc::new(AtomicBool::new(false)),
                    join: None,
                },
            )
        }
    }

    impl KeySource for ScriptedKeys {
        fn start(&mut self, sink: Arc<dyn KeySink>) {
            let script = Arc::clone(&self.script);
            let cancel = Arc::new(AtomicBool::new(false));
            self.cancel = Arc::clone(&cancel);
            self.join = Some(std::thread::spawn(move || loop {
                if cancel.load(Ordering::SeqCst) {
                    return;
                }
                let line = script.lock().pop_front();
                if let Some(line) = line {
                    for c in line.chars() {
                        sink.key(if c == ' ' { Key::Space } else { Key::Char(c) });
                    }
                    sink.key(Key::Enter);
                    return;
                }
                std::thread::sleep(Duration::from_millis(5));
            }));
        }

        fn stop(&mut self) {
            self.cancel.store(true, Ordering::SeqCst);
            if let Some(join) = self.join.take() {
                join.join().unwrap();
            }
        }
    }

    /// Backend that records each conversation snapshot it was called with.
    struct MockBackend {
        snapshots: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
        fail: bool,
    }

    impl LanguageModel for MockBackend {
        fn name(&self) -> &str {
            "Mock"
        }

        fn health_check(&self) -> bool {
            true
        }

        fn complete(&self, conversation: &Conversation) -> Result<String, BackendError> {
            self.snapshots.lock().push(conversation.messages().to_vec());
            if self.fail {
                Err(BackendError::Malformed("backend down".to_string()))
            } else {
                Ok(format!("reply {}", self.snapshots.lock().len()))
            }
        }
    }

    fn pop_response(events: &EventQueue<Event>) -> String {
        loop {
            let event = events
                .pop_timeout(Duration::from_secs(2))
                .expect("expected an event");
            match event.kind {
                EventKind::ModelResponse { reply } => return reply,
                _ => continue,
            }
        }
    }

    #[test]
    fn test_cycle_converses_journals_and_emits() {
        let dir = tempdir().unwrap();
        let journal_path = dir.path().join("transcript.jsonl");
        let events = Arc::new(EventQueue::new());
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let (script, keys) = ScriptedKeys::new();

        let mut worker = ModelWorker::spawn(
            Arc::clone(&events),
            Box::new(keys),
            Arc::new(MockBackend {
                snapshots: Arc::clone(&snapshots),
                fail: false,
            }),
            TranscriptJournal::new(&journal_path),
            Conversation::new("persona"),
            3,
            Duration::from_millis(10),
        );

        script.lock().push_back("hi".to_string());
        let reply = pop_response(&events);
        worker.stop();

        assert_eq!(reply, "reply 1");

        // The backend saw the system prompt plus the finalized user line.
        let snapshot = snapshots.lock()[0].clone();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1], ChatMessage::new(ChatRole::User, "hi"));

        // One journaled exchange.
        let raw = std::fs::read_to_string(&journal_path).unwrap();
        let record: ExchangeRecord = serde_json::from_str(raw.lines().next().unwrap()).unwrap();
        assert_eq!(record.prompt, "hi");
        assert_eq!(record.reply, "reply 1");
    }

    #[test]
    fn test_backend_failure_degrades_to_error_reply() {
        let dir = tempdir().unwrap();
        let events = Arc::new(EventQueue::new());
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let (script, keys) = ScriptedKeys::new();

        let mut worker = ModelWorker::spawn(
            Arc::clone(&events),
            Box::new(keys),
            Arc::new(MockBackend {
                snapshots: Arc::clone(&snapshots),
                fail: true,
            }),
            TranscriptJournal::new(dir.path().join("transcript.jsonl")),
            Conversation::new("persona"),
            3,
            Duration::from_millis(10),
        );

        // Two cycles: the worker must survive the first failure and accept
        // a second submission.
        script.lock().push_back("first".to_string());
        let first = pop_response(&events);
        script.lock().push_back("second".to_string());
        let second = pop_response(&events);
        worker.stop();

        assert!(first.starts_with("Error:"), "got: {first}");
        assert!(second.starts_with("Error:"), "got: {second}");

        // The error reply still landed in the conversation: the second
        // snapshot carries the first cycle's assistant entry.
        let second_snapshot = snapshots.lock()[1].clone();
        let roles: Vec<ChatRole> = second_snapshot.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::System,
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User
            ]
        );
        assert!(second_snapshot[2].content.starts_with("Error:"));
    }

    #[test]
    fn test_journal_failure_is_non_fatal() {
        let dir = tempdir().unwrap();
        // A journal path that collides with an existing *file* as parent
        // directory cannot be created.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let events = Arc::new(EventQueue::new());
        let (script, keys) = ScriptedKeys::new();

        let mut worker = ModelWorker::spawn(
            Arc::clone(&events),
            Box::new(keys),
            Arc::new(MockBackend {
                snapshots: Arc::new(Mutex::new(Vec::new())),
                fail: false,
            }),
            TranscriptJournal::new(blocker.join("transcript.jsonl")),
            Conversation::new("persona"),
            3,
            Duration::from_millis(10),
        );

        script.lock().push_back("hi".to_string());
        // The reply still arrives even though the journal write failed.
        assert_eq!(pop_response(&events), "reply 1");
        worker.stop();
    }
}
