//! `container_contract` 集成测试：页容器的共享、可变访问与帧解码衔接。
//!
//! # 测试目标（Why）
//! - 容器是页在流水线中流转的唯一载体：装箱时写入的帧头必须能被解码器直接识别；
//! - 共享与独占的切换决定了生产者何时还能写页，任何回归都会造成数据竞争或页泄漏。

use readout_codec_frame::{BLOCK_TYPE_BASE, FrameHeader, decode, write_sub_record_length};
use readout_pages::{BatchConsumer, BatchOutcome, PageContainer, PagePool, PoolConfig, PoolError};

fn pool(page_size: usize, page_count: usize) -> PagePool {
    PagePool::with_heap_block(&PoolConfig::new(page_size, page_count)).expect("构造页池")
}

/// 装箱后页开头是负载长度为单页上限的基础帧头，整页可作为一帧被解码。
#[test]
fn new_container_writes_a_base_header() {
    let pool = pool(256, 2);
    let container = pool.new_container(None).expect("装箱");
    let header = FrameHeader::parse(container.page()).expect("帧头可解析");

    assert_eq!(header.block_type, BLOCK_TYPE_BASE);
    assert_eq!(header.header_size, 32);
    assert_eq!(header.payload_size as usize, pool.max_payload_size());
    assert_eq!(&header, container.header());
    assert_eq!(container.payload().len(), 256 - 32);
    assert_eq!(container.use_count(), 1);

    let report = decode(container.frame(), false);
    assert!(report.is_clean());
    assert_eq!(report.frames, 1);
}

/// 池耗尽时装箱失败。
#[test]
fn new_container_reports_exhaustion() {
    let pool = pool(64, 1);
    let _held = pool.new_container(None).expect("装箱");
    assert!(matches!(pool.new_container(None), Err(PoolError::Exhausted)));
}

/// 共享期间拒绝可变访问；其余克隆释放后恢复。
#[test]
fn mutable_access_requires_sole_holder() {
    let pool = pool(128, 1);
    let mut container = pool.new_container(None).expect("装箱");
    let reader = container.clone();
    assert_eq!(container.holders(), 2);
    assert!(container.payload_mut().is_none());
    assert!(matches!(
        container.write_header(FrameHeader::base(0)),
        Err(PoolError::ContainerShared)
    ));

    drop(reader);
    let payload = container.payload_mut().expect("独占后可写");
    payload[..4].copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(&container.payload()[..4], &[1, 2, 3, 4]);
    assert_eq!(pool.pages_available(), 0);
    drop(container);
    assert_eq!(pool.pages_available(), 1);
}

/// 生产者填充子记录并声明实际负载长度后，消费者解码出同样的结构。
#[test]
fn filled_page_decodes_as_a_frame() {
    let pool = pool(1024, 1);
    let mut container = pool.new_container(None).expect("装箱");
    let payload = container.payload_mut().expect("独占");
    let mut used = 0;
    for words in [2u16, 1, 3] {
        used += write_sub_record_length(&mut payload[used..], words).expect("写入子记录");
    }
    container
        .write_header(FrameHeader::base(used as u32).with_sequence_id(42).with_source(3, 7))
        .expect("改写帧头");

    assert_eq!(container.frame().len(), 32 + used);
    let report = decode(container.frame(), true);
    assert!(report.is_clean(), "违规: {:?}", report.violations);
    assert_eq!(report.sub_records, 3);
    assert_eq!(container.header().sequence_id, 42);

    assert!(matches!(
        container.write_header(FrameHeader::base(2000)),
        Err(PoolError::PayloadTooLarge { requested: 2000, max: 992 })
    ));
}

/// 批量推送容器：失败项不打断批次，容器按需在推送后释放。
#[test]
fn batch_consumer_pushes_every_container() {
    let pool = pool(64, 4);
    let batch: Vec<PageContainer> = (0..4)
        .map(|_| pool.new_container(None).expect("装箱"))
        .collect();

    let mut kept = Vec::new();
    let mut consumer = BatchConsumer::new(|container: &PageContainer| {
        if container.handle().id() == 1 {
            return Err(PoolError::ContainerShared);
        }
        kept.push(container.clone());
        Ok(())
    });
    let outcome = consumer.push_batch(&batch);
    assert_eq!(
        outcome,
        BatchOutcome {
            succeeded: 3,
            failed: 1
        }
    );
    assert_eq!(consumer.totals().batches_failed, 1);
    drop(consumer);

    drop(batch);
    assert_eq!(pool.pages_available(), 1, "只有推送失败的那页回到池中");
    drop(kept);
    assert_eq!(pool.pages_available(), 4);
}
