use crate::state::{DomainState, INACTIVE_EPOCH, ReaderSlot};
use crate::sync::{Arc, AtomicUsize, Cell, Ordering};

/// A registered reader of an RCU domain.
///
/// Each reader thread obtains exactly one `RcuReader` via
/// `RcuDomain::register_reader()` and opens reading regions with
/// [`enter()`](RcuReader::enter). It is `!Sync` (due to `Cell`) and must
/// stay on one thread.
///
/// Registration pushes a slot into the domain's reader list once; opening
/// and closing regions afterwards touches only atomics, so the read path
/// never blocks and never contends with writers.
///
/// RCU 域的一个已注册读者。
/// 每个读者线程通过 `RcuDomain::register_reader()` 获取恰好一个
/// `RcuReader`，并用 `enter()` 打开读取区域。
/// 它是 `!Sync` 的（因为 `Cell`），必须停留在一个线程上。
/// 注册只向域的读者列表推入一次槽位；之后打开和关闭区域只触碰原子量，
/// 所以读取路径从不阻塞，也从不与写入者争用。
pub struct RcuReader {
    slot: Arc<ReaderSlot>,
    shared: Arc<DomainState>,
    region_depth: Cell<usize>,
}

impl RcuReader {
    pub(crate) fn new(shared: Arc<DomainState>) -> Self {
        let slot = Arc::new(ReaderSlot {
            active_epoch: AtomicUsize::new(INACTIVE_EPOCH),
        });

        shared.readers.lock().push(Arc::clone(&slot));

        RcuReader {
            slot,
            shared,
            region_depth: Cell::new(0),
        }
    }

    /// Open a reading region and return the guard that bounds it.
    ///
    /// While any guard from this reader is alive, no record retired at or
    /// after the region's epoch will be reclaimed. Reentrant: regions may
    /// be nested, and a guard may be [`Clone`]d; the reader stays active
    /// until the last guard is dropped.
    ///
    /// The slot store and the gate load below must both be SeqCst so that
    /// either a concurrent grace-period scan observes this slot, or this
    /// reader observes the raised gate and retries at a fresh epoch.
    ///
    /// 打开一个读取区域并返回界定它的守卫。
    /// 只要此读者的任何守卫存活，在该区域纪元或之后退休的记录都不会被回收。
    /// 可重入：区域可以嵌套，守卫可以克隆；直到最后一个守卫被 drop，
    /// 读者才变为不活跃。
    /// 下面的槽位存储和门槛读取都必须是 SeqCst：要么并发的宽限期扫描
    /// 观察到此槽位，要么此读者观察到被抬高的门槛并以新纪元重试。
    #[inline]
    pub fn enter(&self) -> ReadGuard<'_> {
        let depth = self.region_depth.get();

        if depth == 0 {
            loop {
                let current_epoch = self.shared.global_epoch.load(Ordering::Acquire);
                self.slot
                    .active_epoch
                    .store(current_epoch, Ordering::SeqCst);

                let gate = self.shared.min_active_epoch.load(Ordering::SeqCst);
                if current_epoch >= gate {
                    break;
                }
                crate::sync::yield_now();
            }
        }

        self.region_depth.set(depth + 1);

        ReadGuard { reader: self }
    }
}

/// A guard bounding one reading region.
///
/// Obtained from [`RcuReader::enter()`]. `!Send` and `!Sync`; its lifetime
/// is bound to the reader it came from. References obtained from the
/// collection while the guard is alive are valid exactly as long as the
/// guard.
///
/// Cloning increments the region depth, so nested scopes can hold their
/// own guard; the region closes when the last one is dropped.
///
/// 界定一个读取区域的守卫。
/// 通过 `RcuReader::enter()` 获得。`!Send` 且 `!Sync`；其生命周期绑定到
/// 它来自的读者。守卫存活期间从集合获得的引用恰好与守卫同寿。
/// 克隆会增加区域深度，嵌套作用域可以持有自己的守卫；
/// 最后一个被 drop 时区域关闭。
#[must_use]
pub struct ReadGuard<'a> {
    reader: &'a RcuReader,
}

impl<'a> Clone for ReadGuard<'a> {
    #[inline]
    fn clone(&self) -> Self {
        let depth = self.reader.region_depth.get();

        assert!(
            depth > 0,
            "BUG: cloning a ReadGuard outside any reading region (depth = 0)"
        );

        self.reader.region_depth.set(depth + 1);

        ReadGuard {
            reader: self.reader,
        }
    }
}

impl<'a> Drop for ReadGuard<'a> {
    #[inline]
    fn drop(&mut self) {
        let depth = self.reader.region_depth.get();

        assert!(
            depth > 0,
            "BUG: dropping a ReadGuard outside any reading region (depth = 0)"
        );

        if depth == 1 {
            self.reader
                .slot
                .active_epoch
                .store(INACTIVE_EPOCH, Ordering::SeqCst);
        }

        self.reader.region_depth.set(depth - 1);
    }
}
