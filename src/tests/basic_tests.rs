/// 基础测试模块
/// 测试域原语和目录核心操作的正确性
use crate::{Catalog, RcuDomain, ReclaimPolicy, Retired};

/// 测试1: 创建域并注册读者
#[test]
fn test_create_domain_and_register_reader() {
    let domain = RcuDomain::new();

    // 验证注册和进入区域都能正常工作
    let reader = domain.register_reader();
    let _guard = reader.enter();
}

/// 测试2: 读取区域的打开/关闭循环
#[test]
fn test_region_enter_exit_cycle() {
    let domain = RcuDomain::new();
    let reader = domain.register_reader();

    // 第一次进入
    {
        let _guard = reader.enter();
        // 区域在这里打开
    }
    // 区域在这里关闭

    // 第二次进入
    {
        let _guard = reader.enter();
    }
}

/// 测试3: 没有活跃读者时 defer + reap 清空队列
#[test]
fn test_defer_then_reap_without_readers() {
    let domain = RcuDomain::builder().reap_threshold(None).build();

    domain.defer(Retired::from_box(Box::new(100i32)));
    domain.defer(Retired::from_box(Box::new(200i32)));
    assert_eq!(domain.pending(), 2);

    domain.reap();

    // 没有活跃读者，队列应该被清空
    assert_eq!(domain.pending(), 0);
}

/// 测试4: 活跃读者保护已退休对象
#[test]
fn test_active_region_protects_retired() {
    let domain = RcuDomain::builder().reap_threshold(None).build();
    let reader = domain.register_reader();

    let _guard = reader.enter();

    domain.defer(Retired::from_box(Box::new(1i32)));
    domain.reap();

    // 读者仍在区域内，对象不能被终结
    assert_eq!(domain.pending(), 1);
}

/// 测试5: 区域关闭后 reap 可以回收
#[test]
fn test_reap_after_region_closes() {
    let domain = RcuDomain::builder().reap_threshold(None).build();
    let reader = domain.register_reader();

    {
        let _guard = reader.enter();
        domain.defer(Retired::from_box(Box::new(1i32)));
        domain.reap();
        assert_eq!(domain.pending(), 1);
    }

    domain.reap();
    assert_eq!(domain.pending(), 0);
}

/// 测试6: synchronize 在没有读者时立即返回
#[test]
fn test_synchronize_without_readers() {
    let domain = RcuDomain::new();
    domain.synchronize();
}

/// 测试7: 插入并查询一条记录
#[test]
fn test_insert_and_lookup() {
    let catalog = Catalog::new();
    let reader = catalog.reader();

    catalog.insert(0, "A journey of linux kernel", "Tom Hoter").unwrap();

    let view = reader.lookup(0).unwrap();
    assert_eq!(view.id, 0);
    assert_eq!(view.name, "A journey of linux kernel");
    assert_eq!(view.author, "Tom Hoter");
    // 新插入的记录默认处于借出状态
    assert!(view.borrowed);
}

/// 测试8: 新记录的默认状态
#[test]
fn test_insert_default_status() {
    let catalog = Catalog::new();
    let reader = catalog.reader();

    catalog.insert(7, "Inside Linux Kernel", "Steve Jobs").unwrap();

    assert_eq!(reader.status_of(7), Ok(true));
}

/// 测试9: 更新后状态可见（无丢失更新）
/// No lost update: insert then update is observed by the next read
#[test]
fn test_update_visible_after_write() {
    let catalog = Catalog::new();
    let reader = catalog.reader();

    catalog.insert(3, "book", "author").unwrap();
    catalog.update(3, false, ReclaimPolicy::Synchronous).unwrap();

    assert_eq!(reader.status_of(3), Ok(false));
}

/// 测试10: 删除后记录不可见
#[test]
fn test_delete_removes_record() {
    let catalog = Catalog::new();
    let reader = catalog.reader();

    catalog.insert(1, "book", "author").unwrap();
    catalog.delete(1, ReclaimPolicy::Synchronous).unwrap();

    assert_eq!(reader.lookup(1), None);
}

/// 测试11: describe 的诊断格式
#[test]
fn test_describe_display_format() {
    let catalog = Catalog::new();
    let reader = catalog.reader();

    catalog.insert(2, "book", "author").unwrap();

    let view = reader.describe(2).unwrap();
    assert_eq!(format!("{view}"), "id=2, name=book, author=author, borrowed=true");
}

/// 测试12: 插入多条记录后全部可查
#[test]
fn test_multiple_records() {
    let catalog = Catalog::new();
    let reader = catalog.reader();

    for id in 0..10u64 {
        catalog.insert(id, "book", "author").unwrap();
    }

    for id in 0..10u64 {
        assert!(reader.lookup(id).is_some());
    }
}

/// 测试13: 多个读取端句柄
#[test]
fn test_multiple_reader_handles() {
    let catalog = Catalog::new();

    catalog.insert(0, "book", "author").unwrap();

    let reader1 = catalog.reader();
    let reader2 = catalog.reader();
    let reader3 = catalog.reader();

    assert!(reader1.lookup(0).is_some());
    assert!(reader2.lookup(0).is_some());
    assert!(reader3.lookup(0).is_some());
}

/// 测试14: 域可以克隆并共享
#[test]
fn test_domain_clone() {
    let domain = RcuDomain::new();
    let domain_clone = domain.clone();

    let reader1 = domain.register_reader();
    let reader2 = domain_clone.register_reader();

    let _guard1 = reader1.enter();
    let _guard2 = reader2.enter();
}
