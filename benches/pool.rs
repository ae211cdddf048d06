use criterion::{black_box, criterion_group, criterion_main, Criterion};
use esox_resourcepool::{BoxError, Pool, PoolConfig};
use std::thread;

fn pool(max_open: usize) -> Pool<Vec<u8>> {
    Pool::new(
        PoolConfig::new()
            .with_initial_size(max_open)
            .with_max_open(max_open)
            .with_factory(|| Ok::<_, BoxError>(vec![0u8; 1024]))
            .with_closer(|_| Ok::<_, BoxError>(())),
    )
    .unwrap()
}

fn bench_get_put(c: &mut Criterion) {
    let pool = pool(4);
    c.bench_function("get_put_idle", |b| {
        b.iter(|| {
            let buf = pool.get().unwrap();
            black_box(buf.len());
            pool.put(buf).unwrap();
        })
    });

    c.bench_function("try_get_put_idle", |b| {
        b.iter(|| {
            let buf = pool.try_get().unwrap().unwrap();
            pool.put(black_box(buf)).unwrap();
        })
    });
}

fn bench_contended(c: &mut Criterion) {
    c.bench_function("get_put_4_threads_2_slots", |b| {
        let pool = pool(2);
        b.iter(|| {
            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let pool = pool.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let buf = pool.get().unwrap();
                            pool.put(buf).unwrap();
                        }
                    })
                })
                .collect();
            for worker in workers {
                worker.join().unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_get_put, bench_contended);
criterion_main!(benches);
