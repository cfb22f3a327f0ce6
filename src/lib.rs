//! RCU-protected record catalog.
//!
//! Readers traverse the catalog inside lock-free reading regions; writers
//! publish inserts, copy-on-write updates, and deletes under a single
//! exclusion lock; superseded records are reclaimed only after an
//! epoch-based grace-period domain proves no reader can still observe
//! them, either by blocking the retiring writer
//! ([`ReclaimPolicy::Synchronous`]) or through a deferred finalize
//! callback ([`ReclaimPolicy::Deferred`]).
//!
//! 受 RCU 保护的记录目录。
//! 读者在无锁的读取区域内遍历目录；写入者在单一互斥锁下发布插入、
//! 写时复制更新和删除；被取代的记录只有在基于纪元的宽限期域证明
//! 没有读者还能观察到它们之后才被回收：
//! 要么阻塞退休的写入者（`Synchronous`），
//! 要么通过延迟的终结回调（`Deferred`）。

mod catalog;
mod domain;
mod reader;
mod retired;
mod state;
mod sync;

pub use catalog::{Catalog, CatalogBuilder, CatalogReader, Error, RecordView};
pub use domain::{RcuDomain, RcuDomainBuilder, ReclaimPolicy};
pub use reader::{RcuReader, ReadGuard};
pub use retired::Retired;

#[cfg(test)]
mod tests;
