use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;

/// A retired object: unlinked from every live traversal path, waiting for
/// its grace period, and owning the callback that will free it.
///
/// The finalize callback runs exactly once: either when the grace period
/// has provably elapsed, or when the owning domain itself is dropped.
///
/// 一个已退休的对象：已从所有存活遍历路径上摘除，等待其宽限期，
/// 并拥有将释放它的回调。
/// 终结回调恰好执行一次：要么在宽限期确凿结束时，
/// 要么在所属的域本身被 drop 时。
pub struct Retired {
    /// The raw pointer to the retired data.
    /// 指向已退休数据的原始指针。
    ptr: *mut (),
    /// Finalize callback; frees the data.
    /// 终结回调；释放数据。
    finalize: unsafe fn(*mut ()),
}

// A Retired is handed between writer threads through the defer queue.
// Both constructors require (or make the caller promise) Send data.
unsafe impl Send for Retired {}

/// Default finalizer: reconstruct the `Box<T>` and drop it.
/// 默认终结器：重建 `Box<T>` 并将其 drop。
#[inline(always)]
unsafe fn drop_boxed<T>(ptr: *mut ()) {
    let ptr = ptr as *mut T;
    unsafe {
        drop(Box::from_raw(ptr));
    }
}

impl Retired {
    /// Retire a boxed value with the default drop finalizer.
    /// 用默认的 drop 终结器退休一个装箱的值。
    #[inline]
    pub fn from_box<T: Send + 'static>(value: Box<T>) -> Self {
        Retired {
            ptr: Box::into_raw(value) as *mut (),
            finalize: drop_boxed::<T>,
        }
    }

    /// Retire a raw pointer with an explicit finalize callback.
    ///
    /// # Safety
    /// `ptr` must be uniquely owned by this `Retired` (already unlinked
    /// from every shared path), `finalize(ptr)` must fully free it, and
    /// the pointee must be safe to finalize on another thread.
    ///
    /// 用显式终结回调退休一个原始指针。
    ///
    /// # Safety
    /// `ptr` 必须被此 `Retired` 唯一拥有（已从所有共享路径摘除），
    /// `finalize(ptr)` 必须完全释放它，且指向的数据可以在另一线程上终结。
    #[inline]
    pub unsafe fn from_raw(ptr: *mut (), finalize: unsafe fn(*mut ())) -> Self {
        Retired { ptr, finalize }
    }
}

impl Drop for Retired {
    /// Runs the finalize callback, at most once.
    /// 执行终结回调，至多一次。
    #[inline(always)]
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                (self.finalize)(self.ptr);
            }
            self.ptr = std::ptr::null_mut();
        }
    }
}

/// Epoch-ordered storage for retired objects awaiting reclamation.
///
/// Retirements land in per-epoch bags; a reap cycle finalizes every bag
/// provably older than the oldest open reading region. Emptied bags are
/// pooled and reused to keep the defer path allocation-light.
///
/// 按纪元排序存放等待回收的已退休对象。
/// 退休对象落入按纪元分组的袋子；回收周期终结所有确凿早于最老打开
/// 读取区域的袋子。清空的袋子被放入池中复用，使延迟路径少分配。
pub(crate) struct DeferQueue {
    /// (epoch, bag) pairs in epoch order.
    queue: VecDeque<(usize, Vec<Retired>)>,
    /// Pool of empty bags.
    pool: Vec<Vec<Retired>>,
    /// Total retired objects across all bags.
    count: usize,
    /// Completed reap cycles, drives the dead-slot sweep cadence.
    /// 已完成的回收周期数，驱动死槽清理节奏。
    pub(crate) cycles: usize,
}

impl DeferQueue {
    pub(crate) fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            pool: Vec::new(),
            count: 0,
            cycles: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.count
    }

    /// File a retired object under the given epoch.
    ///
    /// Appends to the newest bag when it carries the same epoch, otherwise
    /// opens a new bag (reusing a pooled one when available).
    ///
    /// 将已退休对象归档到给定纪元之下。
    /// 若最新的袋子属于同一纪元则追加，否则开一个新袋子
    /// （有池中袋子时复用）。
    #[inline]
    pub(crate) fn add(&mut self, retired: Retired, epoch: usize) {
        let append_to_last = match self.queue.back() {
            Some((last_epoch, _)) => *last_epoch == epoch,
            None => false,
        };

        if append_to_last {
            self.queue.back_mut().unwrap().1.push(retired);
        } else {
            let mut bag = self.pool.pop().unwrap_or_else(|| Vec::with_capacity(16));
            bag.push(retired);
            self.queue.push_back((epoch, bag));
        }

        self.count += 1;
    }

    /// Finalize every bag that is safe given the scanned minimum active
    /// epoch and the just-advanced global epoch.
    ///
    /// A reader pinned at `min_active` may still hold records retired in
    /// that same epoch, so only bags strictly older than `min_active` are
    /// drained; when no reader is active at all, everything goes.
    ///
    /// 根据扫描得到的最小活跃纪元和刚推进的全局纪元，
    /// 终结所有安全的袋子。
    /// 钉在 `min_active` 的读者可能仍持有同一纪元退休的记录，
    /// 所以只清空严格早于 `min_active` 的袋子；完全没有活跃读者时全部清空。
    pub(crate) fn drain_safe(&mut self, min_active: usize, current_epoch: usize) -> usize {
        fn recycle(mut bag: Vec<Retired>, pool: &mut Vec<Vec<Retired>>) -> usize {
            let freed = bag.len();
            bag.clear(); // finalizes every Retired inside
            pool.push(bag);
            freed
        }

        let mut freed = 0;

        if min_active == current_epoch {
            for (_, bag) in self.queue.drain(..) {
                freed += recycle(bag, &mut self.pool);
            }
        } else if min_active > 0 {
            let safe_epoch = min_active - 1;
            while let Some((epoch, _)) = self.queue.front() {
                if *epoch > safe_epoch {
                    break;
                }
                if let Some((_, bag)) = self.queue.pop_front() {
                    freed += recycle(bag, &mut self.pool);
                }
            }
        }

        self.count = self.queue.iter().map(|(_, bag)| bag.len()).sum();
        freed
    }
}
