//! The sweep job and its driver.

use std::fmt;
use std::ops::{AddAssign, Range};
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use farmem_parallel::{Job, ParallelError, Parallelizer};
use farmem_region::{HEADER_SIZE, ObjectRef, Region};

use crate::CollectorBuilder;

/// Decides which objects survive a collection.
///
/// Called concurrently from every GC thread, once per live object in the
/// swept ranges. Objects already marked free are never offered.
pub trait Liveness: Sync {
    /// Returns `true` to keep the object at `obj` in the region with
    /// index `region`.
    fn is_live(&self, region: u32, obj: &ObjectRef<'_>) -> bool;
}

impl<F> Liveness for F
where
    F: Fn(u32, &ObjectRef<'_>) -> bool + Sync,
{
    #[inline]
    fn is_live(&self, region: u32, obj: &ObjectRef<'_>) -> bool {
        self(region, obj)
    }
}

/// One unit of sweep work: a byte range of one region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepTask {
    /// Position of the region in the slice passed to the collector.
    pub region: usize,
    /// Range to walk, as returned by [`Region::gc_ranges`].
    pub range: Range<u32>,
}

/// Totals of one collection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Sweep tasks executed.
    pub tasks: u64,
    /// Regions skipped because they are invalid or remote.
    pub regions_skipped: u64,
    /// Object headers visited, free ones included.
    pub objects_scanned: u64,
    /// Objects this collection marked free.
    pub objects_freed: u64,
    /// Region bytes (headers and padding included) of the freed objects.
    pub bytes_freed: u64,
    /// Regions whose reference count reached zero and that were reset.
    pub regions_reset: u64,
}

impl AddAssign for SweepStats {
    fn add_assign(&mut self, rhs: Self) {
        self.tasks += rhs.tasks;
        self.regions_skipped += rhs.regions_skipped;
        self.objects_scanned += rhs.objects_scanned;
        self.objects_freed += rhs.objects_freed;
        self.bytes_freed += rhs.bytes_freed;
        self.regions_reset += rhs.regions_reset;
    }
}

/// Counters shared by the sweeping threads. Each slave folds its per-task
/// numbers in once per task.
#[derive(Default)]
struct Totals {
    tasks: CachePadded<AtomicU64>,
    scanned: CachePadded<AtomicU64>,
    freed: CachePadded<AtomicU64>,
    bytes: CachePadded<AtomicU64>,
}

struct SweepJob<'a, L> {
    regions: &'a [Region],
    liveness: &'a L,
    totals: Totals,
    skipped: AtomicU64,
}

impl<L: Liveness> SweepJob<'_, L> {
    fn sweep(&self, task: SweepTask) {
        let region = &self.regions[task.region];
        let index = region.index();
        let (mut scanned, mut freed, mut bytes) = (0u64, 0u64, 0u64);

        for obj in region.objects(task.range.clone()) {
            scanned += 1;
            if obj.is_free() || self.liveness.is_live(index, &obj) {
                continue;
            }
            if region.free_object(obj.offset()) {
                freed += 1;
                bytes += obj.header().span();
            }
        }

        tracing::trace!(region = index, range = ?task.range, scanned, freed, "swept range");
        self.totals.tasks.fetch_add(1, Ordering::Relaxed);
        self.totals.scanned.fetch_add(scanned, Ordering::Relaxed);
        self.totals.freed.fetch_add(freed, Ordering::Relaxed);
        self.totals.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn stats(&self) -> SweepStats {
        SweepStats {
            tasks: self.totals.tasks.load(Ordering::Relaxed),
            regions_skipped: self.skipped.load(Ordering::Relaxed),
            objects_scanned: self.totals.scanned.load(Ordering::Relaxed),
            objects_freed: self.totals.freed.load(Ordering::Relaxed),
            bytes_freed: self.totals.bytes.load(Ordering::Relaxed),
            regions_reset: 0,
        }
    }
}

impl<L: Liveness> Job<SweepTask> for SweepJob<'_, L> {
    fn master(&self, p: &Parallelizer<SweepTask>) {
        for (pos, region) in self.regions.iter().enumerate() {
            if region.is_invalid() || !region.is_local() {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            for range in region.gc_ranges() {
                if !p.master_enqueue_task(SweepTask { region: pos, range }) {
                    return;
                }
            }
        }
    }

    fn slave(&self, tid: usize, p: &Parallelizer<SweepTask>) -> bool {
        match p.slave_dequeue_task(tid) {
            Some(task) => {
                self.sweep(task);
                true
            }
            None => false,
        }
    }
}

/// Sweeps regions in parallel, one task per GC boundary range.
///
/// A collection walks the objects written with
/// [`Region::new_object`], asks a [`Liveness`] oracle about each one, and
/// frees the dead ones (marker flip plus reference drop). Bytes reserved
/// with the bare [`Region::allocate_object`] carry no header; a walk steps
/// over them unread and their references keep the region alive.
///
/// # Example
///
/// ```
/// use farmem_gc::Collector;
/// use farmem_region::{ObjectRef, Region, RegionBuf};
///
/// let mut regions = vec![Region::local(0, false, RegionBuf::new().unwrap())];
/// regions[0].new_object(1, b"a", b"keep").unwrap();
/// regions[0].new_object(1, b"b", b"drop").unwrap();
///
/// let mut gc = Collector::new(2);
/// let stats = gc
///     .collect(&mut regions, &|_: u32, obj: &ObjectRef<'_>| obj.id() == b"a")
///     .unwrap();
/// assert_eq!(stats.objects_freed, 1);
/// assert_eq!(regions[0].ref_cnt(), 1);
/// ```
pub struct Collector {
    parallelizer: Parallelizer<SweepTask>,
}

impl Collector {
    /// Creates a collector with `gc_threads` sweeping threads.
    ///
    /// # Panics
    ///
    /// Panics if `gc_threads` is 0. Use [`CollectorBuilder`] to get a
    /// [`ConfigError`](farmem_parallel::ConfigError) instead.
    pub fn new(gc_threads: usize) -> Self {
        match Self::builder().gc_threads(gc_threads).build() {
            Ok(gc) => gc,
            Err(e) => panic!("invalid collector config: {e}"),
        }
    }

    /// Returns a builder with default settings.
    pub fn builder() -> CollectorBuilder {
        CollectorBuilder::default()
    }

    pub(crate) fn with_parallelizer(parallelizer: Parallelizer<SweepTask>) -> Self {
        Self { parallelizer }
    }

    /// Number of sweeping threads.
    pub fn gc_threads(&self) -> usize {
        self.parallelizer.num_slaves()
    }

    /// Frees every dead object in `regions` without resetting any region.
    ///
    /// Invalid and remote regions are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ParallelError`] if a sweeping thread could not be started
    /// or panicked (for instance inside `liveness`). Objects freed before the
    /// failure stay freed.
    pub fn sweep<L: Liveness>(
        &mut self,
        regions: &[Region],
        liveness: &L,
    ) -> Result<SweepStats, ParallelError> {
        let job = SweepJob {
            regions,
            liveness,
            totals: Totals::default(),
            skipped: AtomicU64::new(0),
        };
        self.parallelizer.execute(&job)?;
        Ok(job.stats())
    }

    /// Sweeps `regions`, then resets every written region left without
    /// references so it can take new allocations.
    ///
    /// # Errors
    ///
    /// See [`sweep`](Self::sweep). No region is reset when the sweep fails.
    pub fn collect<L: Liveness>(
        &mut self,
        regions: &mut [Region],
        liveness: &L,
    ) -> Result<SweepStats, ParallelError> {
        let mut stats = self.sweep(regions, liveness)?;

        for region in regions.iter_mut() {
            if region.is_local() && region.is_gcable() && region.first_free_byte() > HEADER_SIZE {
                tracing::trace!(region = region.index(), "reclaiming region");
                region.reset();
                stats.regions_reset += 1;
            }
        }

        tracing::debug!(
            regions = regions.len(),
            tasks = stats.tasks,
            freed = stats.objects_freed,
            bytes = stats.bytes_freed,
            reset = stats.regions_reset,
            "gc collection finished"
        );
        Ok(stats)
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("gc_threads", &self.gc_threads())
            .field("queue_depth", &self.parallelizer.queue_depth())
            .finish()
    }
}
