use criterion::{Criterion, black_box};
use readout_pages::{PagePool, PoolConfig};
use std::{env, time::Duration};

/// 页流转热路径基准：借出 → 归还，以及借出 → 装箱 → 丢弃容器。
///
/// # 设计背景（Why）
/// - 采集线程在每个数据页上都会走一遍这两条路径，任何额外的同步开销都会直接降低吞吐；
/// - 单线程循环即可暴露原子操作与统计锁的固定成本。
fn bench_page_cycle(c: &mut Criterion) {
    let pool = PagePool::with_heap_block(&PoolConfig::new(8192, 64)).expect("构造页池");

    c.bench_function("allocate_release", |b| {
        b.iter(|| {
            let handle = pool.allocate().expect("借出");
            pool.release(black_box(handle)).expect("归还");
        });
    });

    c.bench_function("container_roundtrip", |b| {
        b.iter(|| {
            let container = pool.new_container(None).expect("装箱");
            black_box(container.header().payload_size);
        });
    });
}

fn main() {
    let mut quick_mode = false;
    for arg in env::args().skip(1) {
        if arg == "--quick" {
            quick_mode = true;
        }
    }

    let mut criterion = Criterion::default();
    if quick_mode {
        criterion = criterion
            .sample_size(10)
            .warm_up_time(Duration::from_millis(100))
            .measurement_time(Duration::from_millis(250));
    }

    bench_page_cycle(&mut criterion);
    criterion.final_summary();
}
