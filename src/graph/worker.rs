//! Dedicated search thread with a single-slot request channel

use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::path_graph::PathGraph;
use super::search::SearchStrategy;
use crate::collision::TriangleSupplier;
use crate::core::types::{Result, Vec3};

/// A route to compute on the worker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRequest {
    pub from: Vec3,
    pub to: Vec3,
    pub strategy: SearchStrategy,
    pub tolerance: f32,
}

/// Outcome of one request
#[derive(Debug, Clone)]
pub struct PathResult {
    pub request: PathRequest,
    pub path: Option<Vec<Vec3>>,
    pub elapsed: Duration,
}

/// Owns a [`PathGraph`] on its own thread and serves one request at a time.
///
/// Searches are never concurrent: a new request is refused until the
/// previous result has been collected.
pub struct PathWorker<S> {
    request_tx: Option<SyncSender<PathRequest>>,
    result_rx: Receiver<PathResult>,
    pending: bool,
    handle: Option<JoinHandle<PathGraph<S>>>,
}

impl<S: TriangleSupplier + Send + 'static> PathWorker<S> {
    /// Move `graph` onto a new worker thread
    pub fn spawn(mut graph: PathGraph<S>) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::sync_channel::<PathRequest>(1);
        let (result_tx, result_rx) = mpsc::sync_channel::<PathResult>(1);

        let handle = thread::Builder::new()
            .name("path-worker".into())
            .spawn(move || {
                for request in request_rx {
                    let start = Instant::now();
                    let path = graph.create_path(request.from, request.to, request.strategy, request.tolerance);
                    let result = PathResult {
                        request,
                        path,
                        elapsed: start.elapsed(),
                    };
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
                log::debug!("Path worker stopping");
                graph
            })?;

        Ok(Self {
            request_tx: Some(request_tx),
            result_rx,
            pending: false,
            handle: Some(handle),
        })
    }
}

impl<S> PathWorker<S> {
    /// Queue a request.
    ///
    /// # Arguments
    /// * `request` - Endpoints, strategy and tolerance for one search
    ///
    /// # Returns
    /// `false` if a request is still pending or the worker is gone; the
    /// request is dropped in that case.
    pub fn request(&mut self, request: PathRequest) -> bool {
        if self.pending {
            return false;
        }
        let Some(tx) = &self.request_tx else {
            return false;
        };
        match tx.try_send(request) {
            Ok(()) => {
                self.pending = true;
                true
            }
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("Path worker is gone; dropping request");
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Collect the result if it is ready (non-blocking)
    pub fn poll_result(&mut self) -> Option<PathResult> {
        match self.result_rx.try_recv() {
            Ok(result) => {
                self.pending = false;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.pending = false;
                None
            }
        }
    }

    /// Block until the pending request finishes
    pub fn wait_result(&mut self) -> Option<PathResult> {
        if !self.pending {
            return None;
        }
        let result = self.result_rx.recv().ok();
        self.pending = false;
        result
    }

    /// Stop the worker and take the graph back
    pub fn shutdown(mut self) -> Option<PathGraph<S>> {
        self.stop()
    }

    fn stop(&mut self) -> Option<PathGraph<S>> {
        // Closing the request channel ends the worker loop after the
        // current search; its result fits in the channel buffer.
        self.request_tx = None;
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(graph) => Some(graph),
            Err(_) => {
                log::warn!("Path worker panicked");
                None
            }
        }
    }
}

impl<S> Drop for PathWorker<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
