use crate::domain::{RcuDomain, ReclaimPolicy};
use crate::reader::{RcuReader, ReadGuard};
use crate::retired::Retired;
use crate::sync::{AtomicPtr, Mutex, Ordering};
use log::{debug, trace};
use std::alloc::{Layout, alloc};
use std::fmt;
use std::ptr::{self, NonNull};
use thiserror::Error;

/// Upper bound on the stored length of the `name` and `author` fields.
/// 存储的 `name` 和 `author` 字段长度上限。
const FIELD_MAX: usize = 64;

/// Catalog operation errors.
/// 目录操作错误。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A new record could not be allocated. The catalog is untouched.
    /// 无法分配新记录。目录未被改动。
    #[error("failed to allocate a new record")]
    AllocationFailure,
    /// No published record carries this id.
    /// 没有已发布记录携带此 id。
    #[error("no record with id {0}")]
    NotFound(u64),
    /// The record already carries the requested status; nothing was
    /// allocated, spliced, or retired.
    /// 记录已处于请求的状态；没有分配、拼接或退休任何东西。
    #[error("record {0} is already in the requested status")]
    AlreadyInStatus(u64),
}

/// One published entry of the catalog.
///
/// Immutable once published: any status change produces a replacement
/// record spliced in atomically, never an in-place write. The intrusive
/// `next` link is the record's position in traversal order.
///
/// 目录中一条已发布的条目。
/// 发布后不可变：任何状态变更都产生一个原子拼接进来的替换记录，
/// 绝不原地写入。侵入式的 `next` 链接是记录在遍历序中的位置。
pub(crate) struct Record {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) author: String,
    pub(crate) borrowed: bool,
    pub(crate) next: AtomicPtr<Record>,
}

/// Owned snapshot of one record, copied out inside a reading region.
/// 一条记录的所有权快照，在读取区域内拷出。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView {
    pub id: u64,
    pub name: String,
    pub author: String,
    pub borrowed: bool,
}

impl RecordView {
    fn of(record: &Record) -> Self {
        RecordView {
            id: record.id,
            name: record.name.clone(),
            author: record.author.clone(),
            borrowed: record.borrowed,
        }
    }
}

impl fmt::Display for RecordView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={}, name={}, author={}, borrowed={}",
            self.id, self.name, self.author, self.borrowed
        )
    }
}

/// Truncate a payload field to its stored bound.
/// 将负载字段截断到其存储上限。
fn bounded(s: &str) -> String {
    s.chars().take(FIELD_MAX).collect()
}

/// Fallible fixed-size record allocation. A null from the allocator maps
/// to [`Error::AllocationFailure`] instead of aborting.
///
/// 可失败的定长记录分配。
/// 分配器返回空指针时映射为 `Error::AllocationFailure`，而不是中止。
fn try_alloc(record: Record) -> Result<NonNull<Record>, Error> {
    let layout = Layout::new::<Record>();
    // SAFETY: Record is not zero-sized.
    let raw = unsafe { alloc(layout) } as *mut Record;
    match NonNull::new(raw) {
        Some(new) => {
            // SAFETY: freshly allocated with Record's layout, unaliased.
            unsafe { new.as_ptr().write(record) };
            Ok(new)
        }
        None => Err(Error::AllocationFailure),
    }
}

/// Finalize callback for retired records: rebuild the box and drop it.
///
/// # Safety
/// `ptr` must be an unlinked, uniquely owned `*mut Record` obtained from
/// [`try_alloc`].
///
/// 已退休记录的终结回调：重建 Box 并将其 drop。
unsafe fn finalize_record(ptr: *mut ()) {
    // SAFETY: allocated through the global allocator with Record's layout.
    let record = unsafe { Box::from_raw(ptr as *mut Record) };
    trace!("reclaimed record id={}", record.id);
}

/// Builder for configuring a [`Catalog`]'s reclamation behavior.
///
/// # Example
/// ```
/// use rcu_catalog::Catalog;
///
/// let catalog = Catalog::builder()
///     .reap_threshold(128)
///     .slot_sweep_interval(32)
///     .build();
/// ```
///
/// 用于配置 `Catalog` 回收行为的构建器。
pub struct CatalogBuilder {
    domain: crate::domain::RcuDomainBuilder,
}

impl CatalogBuilder {
    /// Pending-reclamation count that triggers an automatic reap cycle;
    /// `None` leaves draining to explicit [`Catalog::reap()`] calls.
    ///
    /// 触发自动回收周期的待回收数量；`None` 时只靠显式 `reap()` 清空。
    #[inline]
    pub fn reap_threshold(mut self, threshold: impl Into<Option<usize>>) -> Self {
        self.domain = self.domain.reap_threshold(threshold);
        self
    }

    /// Dead reader-slot sweep interval, in reap cycles.
    /// 死读者槽清理间隔（以回收周期计）。
    #[inline]
    pub fn slot_sweep_interval(mut self, interval: usize) -> Self {
        self.domain = self.domain.slot_sweep_interval(interval);
        self
    }

    /// Build the configured catalog.
    /// 构建配置好的目录。
    #[inline]
    pub fn build(self) -> Catalog {
        Catalog {
            head: AtomicPtr::new(ptr::null_mut()),
            writers: Mutex::new(()),
            domain: self.domain.build(),
        }
    }
}

/// An RCU-protected catalog of records.
///
/// Readers traverse the catalog without locking or blocking, inside
/// reading regions obtained from a [`CatalogReader`] handle. The writers
/// ([`insert`](Catalog::insert), [`update`](Catalog::update),
/// [`delete`](Catalog::delete)) serialize against each other on a single
/// exclusion lock, publish every structural change as one atomic link
/// store, and hand superseded records to the grace-period domain instead
/// of freeing them.
///
/// A reader that opened its region before a retirement keeps seeing the
/// retired record, fully intact, until its region closes; the record is
/// freed only after the domain proves no such region remains.
///
/// **Typical usage**:
/// ```
/// use rcu_catalog::{Catalog, ReclaimPolicy};
///
/// let catalog = Catalog::new();
/// catalog.insert(0, "A journey of linux kernel", "Tom Hoter").unwrap();
///
/// let reader = catalog.reader();
/// assert_eq!(reader.status_of(0), Ok(true)); // new records start checked out
///
/// catalog.update(0, false, ReclaimPolicy::Synchronous).unwrap();
/// assert_eq!(reader.status_of(0), Ok(false));
/// ```
///
/// 一个受 RCU 保护的记录目录。
/// 读者在从 `CatalogReader` 句柄获得的读取区域内遍历目录，
/// 不加锁、不阻塞。写入者（insert / update / delete）通过单一互斥锁
/// 相互串行化，把每个结构变更作为一次原子链接存储发布，
/// 并把被取代的记录交给宽限期域而不是直接释放。
/// 在退休之前打开区域的读者会继续看到完好无损的已退休记录，
/// 直到其区域关闭；只有当域证明不再存在这样的区域后，记录才被释放。
pub struct Catalog {
    head: AtomicPtr<Record>,
    /// Writer exclusion lock. Readers never touch it.
    /// 写入者互斥锁。读者从不触碰它。
    writers: Mutex<()>,
    domain: RcuDomain,
}

impl Catalog {
    /// Create an empty catalog with default reclamation settings.
    /// 用默认回收设置创建空目录。
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring the catalog.
    /// 创建用于配置目录的构建器。
    #[inline]
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder {
            domain: RcuDomain::builder(),
        }
    }

    /// Register a read-side handle. Registration locks the domain's
    /// reader list once; every lookup through the handle afterwards is
    /// lock-free.
    ///
    /// 注册一个读取端句柄。注册只锁一次域的读者列表；
    /// 之后通过句柄的每次查询都是无锁的。
    #[inline]
    pub fn reader(&self) -> CatalogReader<'_> {
        CatalogReader {
            catalog: self,
            reader: self.domain.register_reader(),
        }
    }

    /// Insert a new record at the tail of the traversal order.
    ///
    /// The record starts checked out (`borrowed == true`). Payload fields
    /// are truncated to 64 characters. Fails with
    /// [`Error::AllocationFailure`] before touching shared linkage if the
    /// record cannot be allocated.
    ///
    /// Appending cannot invalidate any concurrent reader's position, so
    /// no reader synchronization is involved. Keeping `id` unique among
    /// published records is the caller's responsibility.
    ///
    /// 在遍历序尾部插入一条新记录。
    /// 记录初始为借出状态（`borrowed == true`）。负载字段截断到 64 字符。
    /// 若无法分配记录，则在触碰共享链接之前以 `AllocationFailure` 失败。
    /// 追加不会使任何并发读者的位置失效，因此不涉及读者同步。
    /// 保持已发布记录的 `id` 唯一是调用者的责任。
    pub fn insert(&self, id: u64, name: &str, author: &str) -> Result<(), Error> {
        let new = try_alloc(Record {
            id,
            name: bounded(name),
            author: bounded(author),
            borrowed: true,
            next: AtomicPtr::new(ptr::null_mut()),
        })?;

        let _writers = self.writers.lock();
        let mut link = &self.head;
        loop {
            let cur = link.load(Ordering::Acquire);
            if cur.is_null() {
                break;
            }
            link = &unsafe { &*cur }.next;
        }
        link.store(new.as_ptr(), Ordering::Release);
        trace!("record id={id} inserted");
        Ok(())
    }

    /// Replace the status of the record with `id` by copy-on-write.
    ///
    /// The scan runs inside a reading region, off the exclusion lock; the
    /// splice itself takes the lock and publishes the replacement with a
    /// single link store. Readers already holding the old record keep it
    /// until their region ends; the old record then goes to the reclaimer
    /// under the chosen policy.
    ///
    /// Errors: [`Error::NotFound`] when absent,
    /// [`Error::AlreadyInStatus`] when the status would not change
    /// (nothing is allocated, spliced, or retired in either case),
    /// [`Error::AllocationFailure`] when the replacement cannot be
    /// allocated.
    ///
    /// 以写时复制替换 `id` 记录的状态。
    /// 扫描在读取区域内进行，不占用互斥锁；拼接本身持锁，
    /// 并以单次链接存储发布替换记录。已持有旧记录的读者保留它直到
    /// 区域结束；之后旧记录按所选策略交给回收器。
    pub fn update(&self, id: u64, borrowed: bool, policy: ReclaimPolicy) -> Result<(), Error> {
        let reader = self.domain.register_reader();
        let guard = reader.enter();

        let current = self.find(id, &guard).ok_or(Error::NotFound(id))?;
        if current.borrowed == borrowed {
            return Err(Error::AlreadyInStatus(id));
        }
        let was = current.borrowed;

        let new = try_alloc(Record {
            id: current.id,
            name: current.name.clone(),
            author: current.author.clone(),
            borrowed,
            next: AtomicPtr::new(ptr::null_mut()),
        })?;

        let old_ptr;
        {
            let _writers = self.writers.lock();
            // Re-locate under the lock: the splice needs the incoming
            // link, and linkage is stable while the lock is held.
            let mut link = &self.head;
            loop {
                let cur = link.load(Ordering::Acquire);
                if cur.is_null() {
                    // Deleted between the scan and the lock.
                    // SAFETY: never published; we are the sole owner.
                    unsafe { drop(Box::from_raw(new.as_ptr())) };
                    return Err(Error::NotFound(id));
                }
                let node = unsafe { &*cur };
                if node.id == id {
                    let successor = node.next.load(Ordering::Acquire);
                    // SAFETY: `new` is unpublished until the store below.
                    unsafe { new.as_ref() }.next.store(successor, Ordering::Relaxed);
                    link.store(new.as_ptr(), Ordering::Release);
                    old_ptr = cur;
                    break;
                }
                link = &node.next;
            }
        }

        // Close the region before reclaiming: the synchronous policy
        // waits for regions, and ours must not be among them.
        drop(guard);

        debug!("record id={id} update success ({was}->{borrowed})");
        self.retire(old_ptr, policy);
        Ok(())
    }

    /// Unlink the record with `id` and hand it to the reclaimer.
    ///
    /// The scan runs directly under the exclusion lock: only one writer
    /// mutates linkage at a time, and readers are unaffected by a held
    /// lock, so no reading region is needed.
    ///
    /// 摘除 `id` 记录并交给回收器。
    /// 扫描直接在互斥锁下进行：同一时刻只有一个写入者改动链接，
    /// 且持锁不影响读者，因此不需要读取区域。
    pub fn delete(&self, id: u64, policy: ReclaimPolicy) -> Result<(), Error> {
        let old_ptr;
        {
            let _writers = self.writers.lock();
            let mut link = &self.head;
            loop {
                let cur = link.load(Ordering::Acquire);
                if cur.is_null() {
                    return Err(Error::NotFound(id));
                }
                let node = unsafe { &*cur };
                if node.id == id {
                    link.store(node.next.load(Ordering::Acquire), Ordering::Release);
                    old_ptr = cur;
                    break;
                }
                link = &node.next;
            }
        }

        debug!("record id={id} deleted");
        self.retire(old_ptr, policy);
        Ok(())
    }

    /// Run one reap cycle on the catalog's grace-period domain, draining
    /// every deferred reclamation whose grace period has elapsed.
    ///
    /// 在目录的宽限期域上执行一个回收周期，
    /// 清空所有宽限期已结束的延迟回收。
    #[inline]
    pub fn reap(&self) {
        self.domain.reap();
    }

    /// Traversal shared by the read-side operations. The returned
    /// reference lives exactly as long as the guard.
    ///
    /// 读取端操作共享的遍历。返回的引用恰好与守卫同寿。
    pub(crate) fn find<'g>(&self, id: u64, _guard: &'g ReadGuard<'_>) -> Option<&'g Record> {
        let mut cur = self.head.load(Ordering::Acquire);
        while !cur.is_null() {
            // SAFETY: published records are freed only after every region
            // that could observe them has closed; ours is still open.
            let record = unsafe { &*cur };
            if record.id == id {
                return Some(record);
            }
            cur = record.next.load(Ordering::Acquire);
        }
        None
    }

    fn retire(&self, record: *mut Record, policy: ReclaimPolicy) {
        match policy {
            ReclaimPolicy::Synchronous => {
                self.domain.synchronize();
                // SAFETY: unlinked, and every region that predates the
                // retirement has closed.
                unsafe { finalize_record(record as *mut ()) };
            }
            ReclaimPolicy::Deferred => {
                // SAFETY: unlinked, so the Retired is the sole owner.
                let retired = unsafe { Retired::from_raw(record as *mut (), finalize_record) };
                self.domain.defer(retired);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn domain(&self) -> &RcuDomain {
        &self.domain
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Catalog {
    /// Free every still-published record. `&mut self` proves no reader
    /// handle outlives the catalog.
    ///
    /// 释放所有仍然发布的记录。`&mut self` 证明没有读取端句柄
    /// 比目录活得更久。
    fn drop(&mut self) {
        let mut cur = self.head.load(Ordering::Relaxed);
        while !cur.is_null() {
            // SAFETY: exclusive access; records were allocated via try_alloc.
            let record = unsafe { Box::from_raw(cur) };
            cur = record.next.load(Ordering::Relaxed);
        }
    }
}

/// Read-side handle of a [`Catalog`].
///
/// `!Sync`: each reader thread takes its own handle from
/// [`Catalog::reader()`]. Every operation opens a reading region, copies
/// out what it needs, and closes the region before returning, so the
/// returned data stays valid regardless of concurrent mutation and
/// reclamation.
///
/// `Catalog` 的读取端句柄。
/// `!Sync`：每个读者线程从 `Catalog::reader()` 取得自己的句柄。
/// 每个操作都会打开读取区域、拷出所需内容并在返回前关闭区域，
/// 因此无论并发的变更和回收如何，返回的数据都保持有效。
pub struct CatalogReader<'c> {
    catalog: &'c Catalog,
    reader: RcuReader,
}

impl CatalogReader<'_> {
    /// Snapshot the record with `id`, or `None` when absent.
    /// 给出 `id` 记录的快照，不存在时返回 `None`。
    pub fn lookup(&self, id: u64) -> Option<RecordView> {
        let guard = self.reader.enter();
        self.catalog.find(id, &guard).map(RecordView::of)
    }

    /// Read the status field of the record with `id`.
    /// 读取 `id` 记录的状态字段。
    pub fn status_of(&self, id: u64) -> Result<bool, Error> {
        let guard = self.reader.enter();
        self.catalog
            .find(id, &guard)
            .map(|record| record.borrowed)
            .ok_or(Error::NotFound(id))
    }

    /// Snapshot the record with `id` for diagnostic printing.
    /// 给出 `id` 记录的快照用于诊断打印。
    pub fn describe(&self, id: u64) -> Result<RecordView, Error> {
        self.lookup(id).ok_or(Error::NotFound(id))
    }
}
