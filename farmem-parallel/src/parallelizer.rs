//! The dispatcher itself: queues, lifecycle flags, and thread management.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, Scope, ScopedJoinHandle};

use crossbeam_utils::{Backoff, CachePadded};
use farmem_queue::{Full, SyncCircularBuffer};

use crate::{ParallelError, ParallelizerBuilder};

/// Producer and consumer logic run by a [`Parallelizer`].
///
/// `master` runs once on the calling thread and feeds tasks with
/// [`Parallelizer::master_enqueue_task`]. `slave` is called repeatedly on
/// each slave thread until [`Parallelizer::slave_can_exit`] holds; it should
/// pull work with [`Parallelizer::slave_dequeue_task`] and return `true` if it
/// made progress, `false` if it found nothing to do (the slave then backs off
/// before calling again).
pub trait Job<T>: Sync {
    /// Producer logic. Runs on the thread that called
    /// [`execute`](Parallelizer::execute).
    fn master(&self, p: &Parallelizer<T>);

    /// Consumer logic for slave `tid`. Returns whether any work was done.
    fn slave(&self, tid: usize, p: &Parallelizer<T>) -> bool;
}

/// Outcome of one slave thread after a successful [`Parallelizer::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveStatus {
    /// Slave index.
    pub tid: usize,
    /// Number of `slave` calls that reported progress.
    pub productive_rounds: u64,
}

/// One master feeding `N` slaves through per-slave bounded queues.
///
/// See the [crate docs](crate) for the protocol.
pub struct Parallelizer<T> {
    queues: Box<[CachePadded<SyncCircularBuffer<T>>]>,
    master_up: CachePadded<AtomicBool>,
    master_done: CachePadded<AtomicBool>,
    // Slave threads still inside `slave_loop`. Dropped to 0 by panics too.
    live_slaves: CachePadded<AtomicUsize>,
    // Only the master advances this; atomic so `&self` can be shared.
    enqueue_cursor: AtomicUsize,
    queue_depth: usize,
    thread_name: String,
}

impl<T> Parallelizer<T> {
    /// Creates a dispatcher with `num_slaves` slaves, each owning a queue of
    /// `queue_depth` tasks.
    ///
    /// # Panics
    ///
    /// Panics if either argument is 0. Use [`ParallelizerBuilder`] to get a
    /// [`ConfigError`](crate::ConfigError) instead.
    pub fn new(num_slaves: usize, queue_depth: usize) -> Self {
        match Self::builder()
            .num_slaves(num_slaves)
            .queue_depth(queue_depth)
            .build()
        {
            Ok(p) => p,
            Err(e) => panic!("invalid parallelizer config: {e}"),
        }
    }

    /// Returns a builder with default settings.
    pub fn builder() -> ParallelizerBuilder {
        ParallelizerBuilder::default()
    }

    pub(crate) fn with_config(num_slaves: usize, queue_depth: usize, thread_name: String) -> Self {
        let queues = (0..num_slaves)
            .map(|_| CachePadded::new(SyncCircularBuffer::with_capacity(queue_depth)))
            .collect();
        Self {
            queues,
            master_up: CachePadded::new(AtomicBool::new(false)),
            master_done: CachePadded::new(AtomicBool::new(false)),
            live_slaves: CachePadded::new(AtomicUsize::new(num_slaves)),
            enqueue_cursor: AtomicUsize::new(0),
            queue_depth,
            thread_name,
        }
    }

    /// Returns the number of slave threads.
    #[inline]
    pub fn num_slaves(&self) -> usize {
        self.queues.len()
    }

    /// Returns the capacity of each slave's queue.
    #[inline]
    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }

    /// Returns the number of tasks currently queued for slave `tid`.
    ///
    /// # Panics
    ///
    /// Panics if `tid >= num_slaves()`.
    pub fn pending(&self, tid: usize) -> usize {
        self.queues[tid].len()
    }

    /// Hands a task to some slave queue. Master side only.
    ///
    /// Starts at the round-robin cursor and tries each queue in turn. If all
    /// `N` queues are full it backs off and sweeps again, so this blocks
    /// until a slave frees a slot. Returns `false` and drops the task if
    /// every queue is full and no slave is left to drain them.
    pub fn master_enqueue_task(&self, task: T) -> bool {
        let n = self.queues.len();
        let mut idx = self.enqueue_cursor.load(Ordering::Relaxed);
        let mut task = task;
        let backoff = Backoff::new();

        loop {
            for _ in 0..n {
                match self.queues[idx].push_back(task) {
                    Ok(()) => {
                        self.enqueue_cursor.store((idx + 1) % n, Ordering::Relaxed);
                        return true;
                    }
                    Err(Full(rejected)) => {
                        task = rejected;
                        idx = (idx + 1) % n;
                    }
                }
            }
            if self.live_slaves.load(Ordering::Acquire) == 0 {
                tracing::warn!("no slave left to drain full queues, task dropped");
                return false;
            }
            backoff.snooze();
        }
    }

    /// Takes the next task for slave `tid`.
    ///
    /// Pops from the slave's own queue first. If that is empty, scans the
    /// other slaves (starting after `tid`) and steals half of the first
    /// non-empty peer's tasks. Returns `None` only if the own queue and every
    /// peer were empty when looked at.
    ///
    /// # Panics
    ///
    /// Panics if `tid >= num_slaves()`.
    pub fn slave_dequeue_task(&self, tid: usize) -> Option<T> {
        let own = &self.queues[tid];
        if let Some(task) = own.pop_front() {
            return Some(task);
        }

        let n = self.queues.len();
        for offset in 1..n {
            let peer = &self.queues[(tid + offset) % n];
            if own.work_steal(peer) {
                if let Some(task) = own.pop_front() {
                    return Some(task);
                }
            }
        }

        // The master may have refilled us during the scan.
        own.pop_front()
    }

    /// Returns `true` once slave `tid` may stop: the master has finished
    /// producing and no queue holds an undelivered task.
    ///
    /// The own queue is checked first as the cheap common case; peers are
    /// checked too since an idle slave would otherwise leave stealable work
    /// behind.
    pub fn slave_can_exit(&self, tid: usize) -> bool {
        // Acquire pairs with the master's Release store: every task enqueued
        // before `master_done` is visible in the queues below.
        if !self.master_done.load(Ordering::Acquire) {
            return false;
        }
        if !self.queues[tid].is_empty() {
            return false;
        }
        self.queues.iter().all(|q| q.is_empty())
    }

    /// Returns the number of slave threads that have not exited.
    ///
    /// Equals `num_slaves()` outside of [`execute`](Parallelizer::execute)
    /// until the first run finishes.
    #[inline]
    pub fn live_slaves(&self) -> usize {
        self.live_slaves.load(Ordering::Acquire)
    }

    /// Returns `true` once the master's producer logic has returned.
    #[inline]
    pub fn master_done(&self) -> bool {
        self.master_done.load(Ordering::Acquire)
    }
}

impl<T: Send> Parallelizer<T> {
    /// Runs `job` to completion: spawns the slaves, runs the master on the
    /// calling thread, then waits for every slave to drain and exit.
    ///
    /// Returns per-slave statuses in slave order.
    ///
    /// # Errors
    ///
    /// - [`ParallelError::Spawn`] if a slave thread could not be started;
    ///   already-started slaves are released and joined first.
    /// - [`ParallelError::SlavePanicked`] if a slave's callback panicked.
    ///   Once every slave has died, further `master_enqueue_task` calls on
    ///   full queues drop their task instead of blocking.
    ///
    /// # Panics
    ///
    /// A panic in `job.master` is propagated after the slaves have drained
    /// whatever was already queued and exited.
    pub fn execute<J: Job<T>>(&mut self, job: &J) -> Result<Vec<SlaveStatus>, ParallelError> {
        self.master_up.store(false, Ordering::Relaxed);
        self.master_done.store(false, Ordering::Relaxed);
        self.live_slaves.store(self.num_slaves(), Ordering::Relaxed);
        // Tasks stranded by a run whose slaves all panicked.
        for queue in self.queues.iter() {
            queue.clear();
        }

        let this = &*self;
        tracing::debug!(
            slaves = this.num_slaves(),
            queue_depth = this.queue_depth,
            "parallelizer start"
        );

        let statuses = thread::scope(|scope| {
            let handles = this.spawn(scope, job)?;
            this.run_master(job);
            this.join(handles)
        })?;

        tracing::debug!(
            rounds = statuses.iter().map(|s| s.productive_rounds).sum::<u64>(),
            "parallelizer finished"
        );
        Ok(statuses)
    }

    /// Starts one thread per slave. Slaves wait for `master_up` before their
    /// first call into the job.
    fn spawn<'scope, 'env, J: Job<T>>(
        &'env self,
        scope: &'scope Scope<'scope, 'env>,
        job: &'env J,
    ) -> Result<Vec<ScopedJoinHandle<'scope, u64>>, ParallelError> {
        let mut handles = Vec::with_capacity(self.num_slaves());
        for tid in 0..self.num_slaves() {
            let spawned = thread::Builder::new()
                .name(format!("{}-{tid}", self.thread_name))
                .spawn_scoped(scope, move || self.slave_loop(tid, job));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    tracing::warn!(tid, error = %source, "failed to spawn slave");
                    self.live_slaves.fetch_sub(self.num_slaves() - tid, Ordering::AcqRel);
                    // Release the slaves already running; their queues are empty.
                    self.master_up.store(true, Ordering::Release);
                    self.master_done.store(true, Ordering::Release);
                    return Err(ParallelError::Spawn { tid, source });
                }
            }
        }
        Ok(handles)
    }

    fn run_master<J: Job<T>>(&self, job: &J) {
        // Set master_done even if the master panics, otherwise slaves spin
        // forever and the scope never joins.
        struct DoneOnDrop<'a>(&'a AtomicBool);
        impl Drop for DoneOnDrop<'_> {
            fn drop(&mut self) {
                self.0.store(true, Ordering::Release);
            }
        }

        self.master_up.store(true, Ordering::Release);
        let _done = DoneOnDrop(&self.master_done);
        job.master(self);
    }

    fn slave_loop<J: Job<T>>(&self, tid: usize, job: &J) -> u64 {
        struct ExitOnDrop<'a>(&'a AtomicUsize);
        impl Drop for ExitOnDrop<'_> {
            fn drop(&mut self) {
                self.0.fetch_sub(1, Ordering::AcqRel);
            }
        }

        let _exit = ExitOnDrop(&self.live_slaves);
        let backoff = Backoff::new();
        while !self.master_up.load(Ordering::Acquire) {
            backoff.snooze();
        }

        let idle = Backoff::new();
        let mut rounds = 0;
        while !self.slave_can_exit(tid) {
            if job.slave(tid, self) {
                rounds += 1;
                idle.reset();
            } else {
                idle.snooze();
            }
        }
        tracing::trace!(tid, rounds, "slave exit");
        rounds
    }

    fn join(&self, handles: Vec<ScopedJoinHandle<'_, u64>>) -> Result<Vec<SlaveStatus>, ParallelError> {
        let mut statuses = Vec::with_capacity(handles.len());
        let mut first_panic = None;
        for (tid, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(productive_rounds) => statuses.push(SlaveStatus {
                    tid,
                    productive_rounds,
                }),
                Err(_) => {
                    tracing::warn!(tid, "slave panicked");
                    first_panic.get_or_insert(tid);
                }
            }
        }
        match first_panic {
            Some(tid) => Err(ParallelError::SlavePanicked { tid }),
            None => Ok(statuses),
        }
    }
}

impl<T> fmt::Debug for Parallelizer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parallelizer")
            .field("num_slaves", &self.num_slaves())
            .field("queue_depth", &self.queue_depth)
            .field("master_done", &self.master_done())
            .field("live_slaves", &self.live_slaves())
            .finish_non_exhaustive()
    }
}
