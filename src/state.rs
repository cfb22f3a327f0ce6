use crate::retired::DeferQueue;
use crate::sync::{Arc, AtomicUsize, Mutex};
use std::vec::Vec;

/// Default number of pending deferred reclamations that triggers a reap cycle.
/// 触发回收周期的默认待回收对象数量。
pub(crate) const REAP_THRESHOLD: usize = 64;

/// Default interval for sweeping dead reader slots (in reap cycles).
/// 清理死读者槽的默认间隔（以回收周期为单位）。
pub(crate) const DEFAULT_SLOT_SWEEP_INTERVAL: usize = 16;

/// Marks a reader slot whose owner is not inside a reading region.
/// 标记其所有者不在读取区域内的读者槽。
pub(crate) const INACTIVE_EPOCH: usize = usize::MAX;

/// A slot allocated for one reader to announce the epoch of its open
/// reading region.
///
/// Cache-aligned to prevent false sharing between readers.
///
/// 为一个读者分配的槽，用于公告其打开的读取区域所处的纪元。
/// 缓存对齐以防止读者之间的伪共享。
#[derive(Debug)]
#[repr(align(64))]
pub(crate) struct ReaderSlot {
    /// Epoch of the reader's open region, or INACTIVE_EPOCH.
    ///
    /// All stores and loads on this field are SeqCst: one side of the
    /// slot-store/gate-load vs gate-store/slot-scan exchange must always
    /// observe the other.
    ///
    /// 读者打开区域所处的纪元，或 INACTIVE_EPOCH。
    /// 此字段的所有存取均为 SeqCst。
    pub(crate) active_epoch: AtomicUsize,
}

/// Shared state of one RCU domain.
///
/// 一个 RCU 域的共享状态。
#[repr(align(64))]
pub(crate) struct DomainState {
    /// Global monotonic epoch counter. Advanced only while holding the
    /// `retired` mutex, so retirement tags are never stale relative to a
    /// concurrent advance.
    ///
    /// 全局单调纪元计数器。只有在持有 `retired` 互斥锁时才会推进。
    pub(crate) global_epoch: AtomicUsize,

    /// Pin-admission gate: readers may not stay pinned below this epoch.
    /// Monotonic; updated only via `fetch_max`.
    ///
    /// 读者准入门槛：读者不得停留在低于此纪元的位置。
    /// 单调递增；只通过 `fetch_max` 更新。
    pub(crate) min_active_epoch: AtomicUsize,

    /// Every registered reader slot.
    /// 所有已注册的读者槽。
    pub(crate) readers: Mutex<Vec<Arc<ReaderSlot>>>,

    /// Epoch-tagged retired objects awaiting their grace period.
    /// 按纪元标记、等待宽限期的已退休对象。
    pub(crate) retired: Mutex<DeferQueue>,
}
