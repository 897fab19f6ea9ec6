use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::mesh::Model;
use crate::store::{ImportOptions, load_file};
use crate::{AssetError, AssetId};

/// Handle returned for each load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

/// A finished load, successful or not.
#[derive(Debug)]
pub struct LoadEvent {
    pub ticket: Ticket,
    pub path: PathBuf,
    pub result: Result<(AssetId, Arc<Model>), AssetError>,
}

/// Loads model files on worker threads.
///
/// Results are only observed through [`AssetLoader::poll`] or
/// [`AssetLoader::wait`], so whoever owns the scene decides when a finished
/// model becomes visible. There is no retry, timeout or cancellation.
pub struct AssetLoader {
    sender: Sender<LoadEvent>,
    receiver: Receiver<LoadEvent>,
    next_ticket: u64,
    in_flight: usize,
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLoader {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            next_ticket: 0,
            in_flight: 0,
        }
    }

    /// Start loading `path` in the background.
    pub fn request(&mut self, path: impl AsRef<Path>, options: ImportOptions) -> Ticket {
        let path = path.as_ref().to_path_buf();
        let worker_path = path.clone();
        self.spawn(path, move || load_file(&worker_path, &options))
    }

    /// Run `job` on a worker thread. Exactly one event is sent per ticket, even
    /// when the job panics.
    fn spawn<F>(&mut self, path: PathBuf, job: F) -> Ticket
    where
        F: FnOnce() -> Result<(AssetId, Arc<Model>), AssetError> + Send + 'static,
    {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        self.in_flight += 1;

        let sender = self.sender.clone();
        tracing::debug!(ticket = ticket.0, path = %path.display(), "load requested");

        let worker_path = path.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("asset-load-{}", ticket.0))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(ticket = ticket.0, path = %worker_path.display(), "loader panicked: {message}");
                    Err(AssetError::Panicked(message))
                });
                // The receiver is gone only when the loader was dropped.
                let _ = sender.send(LoadEvent {
                    ticket,
                    path: worker_path,
                    result,
                });
            });
        if let Err(e) = spawned {
            tracing::error!("failed to spawn loader thread: {e}");
            let _ = self.sender.send(LoadEvent {
                ticket,
                path,
                result: Err(AssetError::Io(e)),
            });
        }
        ticket
    }

    /// Drain every load that has finished since the last call, without blocking.
    pub fn poll(&mut self) -> Vec<LoadEvent> {
        let events: Vec<LoadEvent> = self.receiver.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(events.len());
        events
    }

    /// Block until the next load finishes. Returns `None` when nothing is in flight.
    pub fn wait(&mut self) -> Option<LoadEvent> {
        if self.in_flight == 0 {
            return None;
        }
        let event = self.receiver.recv().ok()?;
        self.in_flight -= 1;
        Some(event)
    }

    /// Number of requests that have not been observed yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_successful_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();

        let mut loader = AssetLoader::new();
        let ticket = loader.request(&path, ImportOptions::default());
        assert_eq!(loader.in_flight(), 1);

        let event = loader.wait().unwrap();
        assert_eq!(event.ticket, ticket);
        assert_eq!(event.path, path);
        let (_, model) = event.result.unwrap();
        assert_eq!(model.triangle_count(), 1);
        assert_eq!(loader.in_flight(), 0);
        assert!(loader.wait().is_none());
    }

    #[test]
    fn delivers_failures() {
        let mut loader = AssetLoader::new();
        loader.request("missing/model.glb", ImportOptions::default());
        let event = loader.wait().unwrap();
        assert!(matches!(event.result, Err(AssetError::Io(_))));
    }

    #[test]
    fn tickets_are_distinct_and_all_arrive() {
        let mut loader = AssetLoader::new();
        let a = loader.request("a.obj", ImportOptions::default());
        let b = loader.request("b.obj", ImportOptions::default());
        assert_ne!(a, b);
        let mut seen = vec![loader.wait().unwrap().ticket, loader.wait().unwrap().ticket];
        seen.sort();
        assert_eq!(seen, vec![a, b]);
    }

    #[test]
    fn panicking_job_still_reports_a_failure() {
        let mut loader = AssetLoader::new();
        let ticket = loader.spawn(PathBuf::from("bad.glb"), || panic!("index out of bounds"));
        let event = loader.wait().unwrap();
        assert_eq!(event.ticket, ticket);
        match event.result {
            Err(AssetError::Panicked(message)) => assert!(message.contains("index out of bounds")),
            other => panic!("expected a panic failure, got {other:?}"),
        }
        assert_eq!(loader.in_flight(), 0);
        assert!(loader.wait().is_none());
    }

    #[test]
    fn poll_without_requests_is_empty() {
        let mut loader = AssetLoader::new();
        assert!(loader.poll().is_empty());
    }
}
