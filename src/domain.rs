use crate::reader::RcuReader;
use crate::retired::{DeferQueue, Retired};
use crate::state::{
    DEFAULT_SLOT_SWEEP_INTERVAL, DomainState, INACTIVE_EPOCH, REAP_THRESHOLD, ReaderSlot,
};
use crate::sync::{Arc, AtomicUsize, Mutex, Ordering};
use log::trace;
use std::vec::Vec;

/// How a writer wants a superseded record reclaimed.
///
/// Two named policies instead of a boolean flag, so call sites state
/// their intent.
///
/// 写入者希望如何回收被取代的记录。
/// 用两个具名策略代替布尔标志，让调用点表明意图。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimPolicy {
    /// Block the calling writer until every reading region open at
    /// retirement has closed, then free on the caller's thread.
    ///
    /// 阻塞调用写入者，直到退休时打开的所有读取区域都已关闭，
    /// 然后在调用者线程上释放。
    Synchronous,
    /// Return immediately; the finalize callback runs once the grace
    /// period elapses.
    ///
    /// 立即返回；宽限期结束后终结回调才会执行。
    Deferred,
}

/// Builder for configuring an [`RcuDomain`].
///
/// - `reap_threshold`: pending-reclamation count that triggers an
///   automatic reap cycle (`None` disables the trigger).
/// - `slot_sweep_interval`: how often (in reap cycles) dead reader slots
///   are swept.
///
/// # Example
/// ```
/// use rcu_catalog::RcuDomain;
///
/// let domain = RcuDomain::builder()
///     .reap_threshold(128)
///     .slot_sweep_interval(32)
///     .build();
/// ```
///
/// 用于配置 `RcuDomain` 的构建器。
pub struct RcuDomainBuilder {
    reap_threshold: Option<usize>,
    slot_sweep_interval: usize,
}

impl RcuDomainBuilder {
    /// Create a new builder with default settings.
    /// 创建一个带有默认设置的新构建器。
    #[inline]
    pub fn new() -> Self {
        Self {
            reap_threshold: Some(REAP_THRESHOLD),
            slot_sweep_interval: DEFAULT_SLOT_SWEEP_INTERVAL,
        }
    }

    /// Set the automatic reap threshold. `None` disables automatic
    /// reaping; deferred reclamations then wait for an explicit
    /// [`RcuDomain::reap()`].
    ///
    /// Default: `Some(64)`
    ///
    /// 设置自动回收阈值。`None` 关闭自动回收；
    /// 延迟回收将等待显式的 `reap()`。
    #[inline]
    pub fn reap_threshold(mut self, threshold: impl Into<Option<usize>>) -> Self {
        self.reap_threshold = threshold.into();
        self
    }

    /// Set the dead-slot sweep interval, in reap cycles. `0` disables the
    /// periodic sweep (the sweep on `synchronize()` still runs).
    ///
    /// Default: `16`
    ///
    /// 设置死槽清理间隔（以回收周期计）。`0` 关闭周期性清理
    /// （`synchronize()` 时的清理仍会进行）。
    #[inline]
    pub fn slot_sweep_interval(mut self, interval: usize) -> Self {
        self.slot_sweep_interval = interval;
        self
    }

    /// Build the configured domain.
    /// 构建配置好的域。
    #[inline]
    pub fn build(self) -> RcuDomain {
        RcuDomain {
            shared: Arc::new(DomainState {
                global_epoch: AtomicUsize::new(0),
                min_active_epoch: AtomicUsize::new(0),
                readers: Mutex::new(Vec::new()),
                retired: Mutex::new(DeferQueue::new()),
            }),
            reap_threshold: self.reap_threshold,
            slot_sweep_interval: self.slot_sweep_interval,
        }
    }
}

impl Default for RcuDomainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An RCU grace-period domain.
///
/// The domain tracks every reading region through epoch slots and decides
/// when a retired record is provably unreachable. It offers the two
/// reclamation primitives writers need:
///
/// - [`synchronize()`](RcuDomain::synchronize): block until every region
///   open before the call has closed.
/// - [`defer()`](RcuDomain::defer): file a [`Retired`] whose finalize
///   callback runs after its grace period, during a later reap cycle.
///
/// `RcuDomain` is `Clone` and may be shared freely; any number of writer
/// threads may retire through it concurrently, and any number of readers
/// may register.
///
/// 一个 RCU 宽限期域。
/// 域通过纪元槽跟踪每个读取区域，并判定已退休记录何时确凿不可达。
/// 它提供写入者需要的两个回收原语：
/// `synchronize()`：阻塞直到调用前打开的所有区域关闭；
/// `defer()`：归档一个 `Retired`，其终结回调在宽限期后的
/// 某个回收周期中执行。
/// `RcuDomain` 可克隆、可自由共享；任意多个写入者线程可以并发退休，
/// 任意多个读者可以注册。
#[derive(Clone)]
pub struct RcuDomain {
    shared: Arc<DomainState>,
    reap_threshold: Option<usize>,
    slot_sweep_interval: usize,
}

impl RcuDomain {
    /// Create a domain with default settings.
    /// 用默认设置创建一个域。
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the domain.
    /// 创建用于配置域的构建器。
    #[inline]
    pub fn builder() -> RcuDomainBuilder {
        RcuDomainBuilder::new()
    }

    /// Register a reader. The returned [`RcuReader`] must stay on one
    /// thread; opening regions through it is lock-free.
    ///
    /// 注册一个读者。返回的 `RcuReader` 必须停留在一个线程上；
    /// 通过它打开区域是无锁的。
    #[inline]
    pub fn register_reader(&self) -> RcuReader {
        RcuReader::new(Arc::clone(&self.shared))
    }

    /// Block until every reading region open before this call has closed.
    ///
    /// On return, any record retired before the call is unreachable by
    /// every current and future region, and may be freed by the caller.
    /// Only the caller is suspended; readers and other writers proceed.
    ///
    /// The epoch advance happens inside the defer-queue critical section
    /// so it is ordered against every retirement tag; the gate raise must
    /// precede the slot scan (see [`RcuReader::enter`]).
    ///
    /// 阻塞直到此调用前打开的所有读取区域关闭。
    /// 返回时，调用前退休的任何记录对所有当前和未来的区域都不可达，
    /// 调用者可以释放它。只有调用者被挂起；读者和其他写入者照常推进。
    /// 纪元推进发生在延迟队列临界区内，从而与每个退休标记有序；
    /// 门槛抬升必须先于槽位扫描（见 `RcuReader::enter`）。
    pub fn synchronize(&self) {
        let target = {
            let _retired = self.shared.retired.lock();
            self.shared.global_epoch.fetch_add(1, Ordering::SeqCst) + 1
        };

        self.raise_gate(target);

        let slots: Vec<Arc<ReaderSlot>> = {
            let mut readers = self.shared.readers.lock();
            readers.retain(|slot| Arc::strong_count(slot) > 1);
            readers.iter().cloned().collect()
        };

        for slot in slots {
            loop {
                let epoch = slot.active_epoch.load(Ordering::SeqCst);
                if epoch == INACTIVE_EPOCH || epoch >= target {
                    break;
                }
                crate::sync::yield_now();
            }
        }

        trace!("grace period complete at epoch {target}");
    }

    /// File a retired object; its finalize callback runs after the grace
    /// period, during a later reap cycle. Never blocks on readers.
    ///
    /// Crossing the configured reap threshold triggers a reap cycle
    /// before returning.
    ///
    /// 归档一个已退休对象；其终结回调在宽限期后的某个回收周期中执行。
    /// 从不阻塞在读者上。
    /// 超过配置的回收阈值会在返回前触发一个回收周期。
    pub fn defer(&self, retired: Retired) {
        let mut queue = self.shared.retired.lock();
        // Tag reads are ordered by the queue mutex against every advance.
        let epoch = self.shared.global_epoch.load(Ordering::Relaxed);
        queue.add(retired, epoch);

        if let Some(threshold) = self.reap_threshold {
            if queue.len() > threshold {
                self.reap_locked(&mut queue);
            }
        }
    }

    /// Run one reap cycle: advance the epoch, scan reading regions, and
    /// finalize every deferred retirement whose grace period has elapsed.
    ///
    /// Safe to call at any time, from any thread, with or without pending
    /// retirements.
    ///
    /// 执行一个回收周期：推进纪元、扫描读取区域，
    /// 并终结所有宽限期已结束的延迟退休对象。
    /// 任何时刻、任何线程、无论有无待回收对象都可以安全调用。
    pub fn reap(&self) {
        let mut queue = self.shared.retired.lock();
        self.reap_locked(&mut queue);
    }

    fn reap_locked(&self, queue: &mut DeferQueue) {
        let new_epoch = self.shared.global_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        // Raise the admission gate before scanning: a reader whose slot
        // store this scan misses is guaranteed to observe the gate and
        // re-enter at the new epoch.
        self.raise_gate(new_epoch);

        queue.cycles += 1;
        let should_sweep =
            self.slot_sweep_interval > 0 && queue.cycles % self.slot_sweep_interval == 0;

        let mut min_active = new_epoch;
        let mut dead = 0;

        let mut readers = self.shared.readers.lock();
        for slot in readers.iter() {
            let epoch = slot.active_epoch.load(Ordering::SeqCst);
            if epoch != INACTIVE_EPOCH {
                min_active = min_active.min(epoch);
            } else if should_sweep && Arc::strong_count(slot) == 1 {
                // Only the list holds the slot; its RcuReader is gone.
                dead += 1;
            }
        }
        if should_sweep && dead > 0 {
            readers.retain(|slot| Arc::strong_count(slot) > 1);
        }
        drop(readers);

        let freed = queue.drain_safe(min_active, new_epoch);
        if freed > 0 {
            trace!("reap cycle at epoch {new_epoch}: finalized {freed} retired object(s)");
        }
    }

    /// Raise the pin-admission gate to `target`. The gate only ever moves
    /// up; SeqCst so the store is ordered against reader slot scans.
    ///
    /// 将读者准入门槛抬升到 `target`。门槛只会上移；
    /// SeqCst 使该存储与读者槽位扫描有序。
    fn raise_gate(&self, target: usize) {
        let gate = &self.shared.min_active_epoch;
        let mut current = gate.load(Ordering::SeqCst);
        while current < target {
            match gate.compare_exchange(current, target, Ordering::SeqCst, Ordering::SeqCst) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Retired objects still awaiting their grace period.
    /// 仍在等待宽限期的已退休对象数。
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.shared.retired.lock().len()
    }
}

impl Default for RcuDomain {
    fn default() -> Self {
        Self::new()
    }
}
