//! Long-lived worker pool that renders frames band by band.
//!
//! Each call to [`TileScheduler::submit`] gets a fresh task id. Bands of
//! superseded tasks may still come back from the workers; they are dropped
//! on arrival and never clear the `computing` flag.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use fractaldive_core::ReferenceOrbit;

use crate::buffer::RenderBuffer;
use crate::error::RenderError;
use crate::iteration_buffer::IterationBuffer;
use crate::palette::Palette;
use crate::protocol::{FrameSpec, TaskRequest, TaskResponse};
use crate::renderer::{compute_band, glitch_ratio_exceeded};
use crate::tile::partition_rows;

/// One band of work handed to a worker thread.
struct WorkerJob {
    request: TaskRequest,
    orbit: Option<Arc<ReferenceOrbit>>,
}

struct WorkerReply {
    task_id: u64,
    result: crate::Result<TaskResponse>,
}

/// Bookkeeping for a frame whose bands are still coming back.
struct PendingFrame {
    iterations: IterationBuffer,
    remaining: usize,
    perturbed: u64,
    glitched: u64,
    started: Instant,
}

/// A fully assembled and colorized frame.
#[derive(Debug, Clone)]
pub struct CompletedFrame {
    pub task_id: u64,
    pub iterations: IterationBuffer,
    pub pixels: RenderBuffer,
    pub perturbed: u64,
    pub glitched: u64,
    pub elapsed: Duration,
}

impl CompletedFrame {
    /// `true` when enough pixels glitched that the reference should be re-selected.
    pub fn needs_new_reference(&self) -> bool {
        glitch_ratio_exceeded(self.perturbed, self.glitched)
    }
}

struct Worker {
    jobs: Sender<WorkerJob>,
    handle: JoinHandle<()>,
}

/// Fixed-size pool of band workers with a task-id registry.
pub struct TileScheduler {
    workers: Vec<Worker>,
    replies: Receiver<WorkerReply>,
    pending: HashMap<u64, PendingFrame>,
    next_task_id: u64,
    latest: Option<u64>,
    computing: bool,
    palette: Palette,
}

impl TileScheduler {
    /// Spawn `worker_count` named worker threads.
    pub fn new(worker_count: usize) -> crate::Result<Self> {
        if worker_count == 0 {
            return Err(RenderError::InvalidWorkerCount(worker_count));
        }
        let (reply_tx, replies) = mpsc::channel::<WorkerReply>();
        let workers = (0..worker_count)
            .map(|index| spawn_worker(index, reply_tx.clone()))
            .collect();
        debug!(worker_count, "Tile scheduler started");

        Ok(Self {
            workers,
            replies,
            pending: HashMap::new(),
            next_task_id: 1,
            latest: None,
            computing: false,
            palette: Palette::default(),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// `true` while the most recently submitted frame is incomplete.
    pub fn is_computing(&self) -> bool {
        self.computing
    }

    pub fn latest_task(&self) -> Option<u64> {
        self.latest
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Palette applied to frames that complete after this call.
    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    /// Split a frame into one band per worker and dispatch it.
    ///
    /// Returns the task id assigned to the frame. `orbit` is shared
    /// read-only with every band; it is only consulted when the frame's
    /// depth calls for perturbation.
    pub fn submit(&mut self, spec: &FrameSpec, orbit: Option<Arc<ReferenceOrbit>>) -> crate::Result<u64> {
        spec.validate()?;
        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let tiles = partition_rows(spec.height, self.workers.len() as u32, task_id);
        for (tile, worker) in tiles.iter().zip(self.workers.iter()) {
            let job = WorkerJob {
                request: spec.band_request(tile),
                orbit: orbit.clone(),
            };
            worker.jobs.send(job).map_err(|_| RenderError::WorkerDisconnected)?;
        }
        debug!(
            task_id,
            bands = tiles.len(),
            width = spec.width,
            height = spec.height,
            "Dispatched frame"
        );

        self.pending.insert(
            task_id,
            PendingFrame {
                iterations: IterationBuffer::new(spec.width, spec.height, spec.max_iterations),
                remaining: tiles.len(),
                perturbed: 0,
                glitched: 0,
                started: Instant::now(),
            },
        );
        self.latest = Some(task_id);
        self.computing = true;
        Ok(task_id)
    }

    /// Drain any replies that have already arrived.
    ///
    /// Returns the latest frame if this call completed it.
    pub fn poll(&mut self) -> crate::Result<Option<CompletedFrame>> {
        let mut completed = None;
        loop {
            match self.replies.try_recv() {
                Ok(reply) => {
                    if let Some(frame) = self.handle_reply(reply)? {
                        completed = Some(frame);
                    }
                }
                Err(mpsc::TryRecvError::Empty) => return Ok(completed),
                Err(mpsc::TryRecvError::Disconnected) => return Err(RenderError::WorkerDisconnected),
            }
        }
    }

    /// Block until the latest submitted frame is complete.
    ///
    /// Fails with [`RenderError::Idle`] when no frame is in flight, for
    /// instance because [`poll`](Self::poll) already returned it.
    pub fn wait(&mut self) -> crate::Result<CompletedFrame> {
        if !self.computing {
            return Err(RenderError::Idle);
        }
        loop {
            let reply = self.replies.recv().map_err(|_| RenderError::WorkerDisconnected)?;
            if let Some(frame) = self.handle_reply(reply)? {
                return Ok(frame);
            }
        }
    }

    /// Submit a frame and wait for it.
    pub fn render_blocking(
        &mut self,
        spec: &FrameSpec,
        orbit: Option<Arc<ReferenceOrbit>>,
    ) -> crate::Result<CompletedFrame> {
        self.submit(spec, orbit)?;
        self.wait()
    }

    fn handle_reply(&mut self, reply: WorkerReply) -> crate::Result<Option<CompletedFrame>> {
        let task_id = reply.task_id;
        let is_latest = self.latest == Some(task_id);

        let response = match reply.result {
            Ok(response) => response,
            Err(e) => {
                self.pending.remove(&task_id);
                if is_latest {
                    self.computing = false;
                    return Err(e);
                }
                warn!(task_id, error = %e, "Band of superseded frame failed");
                return Ok(None);
            }
        };

        let Some(frame) = self.pending.get_mut(&task_id) else {
            debug!(task_id, "Discarding band for unknown task");
            return Ok(None);
        };
        frame.iterations.merge(&response);
        frame.perturbed += response.perturbed as u64;
        frame.glitched += response.glitched as u64;
        frame.remaining -= 1;
        debug!(
            task_id,
            start_row = response.start_row,
            end_row = response.end_row,
            remaining = frame.remaining,
            "Merged band"
        );
        if frame.remaining > 0 {
            return Ok(None);
        }

        let Some(frame) = self.pending.remove(&task_id) else {
            return Ok(None);
        };
        if !is_latest {
            debug!(task_id, latest = ?self.latest, "Discarding stale frame");
            return Ok(None);
        }

        self.computing = false;
        let elapsed = frame.started.elapsed();
        let pixels = self.palette.colorize(&frame.iterations);
        info!(
            task_id,
            elapsed_ms = elapsed.as_millis(),
            glitched = frame.glitched,
            "Frame complete"
        );
        Ok(Some(CompletedFrame {
            task_id,
            iterations: frame.iterations,
            pixels,
            perturbed: frame.perturbed,
            glitched: frame.glitched,
            elapsed,
        }))
    }
}

impl Drop for TileScheduler {
    fn drop(&mut self) {
        for worker in self.workers.drain(..) {
            drop(worker.jobs);
            if worker.handle.join().is_err() {
                warn!("Band worker panicked");
            }
        }
    }
}

fn spawn_worker(index: usize, replies: Sender<WorkerReply>) -> Worker {
    let (jobs, rx) = mpsc::channel::<WorkerJob>();
    let handle = std::thread::Builder::new()
        .name(format!("band-worker-{index}"))
        .spawn(move || {
            debug!(index, "Band worker started");
            while let Ok(job) = rx.recv() {
                let reply = WorkerReply {
                    task_id: job.request.task_id,
                    result: compute_band(&job.request, job.orbit.as_deref()),
                };
                if replies.send(reply).is_err() {
                    break;
                }
            }
            debug!(index, "Band worker stopped");
        })
        .expect("Failed to spawn band worker thread");
    Worker { jobs, handle }
}
