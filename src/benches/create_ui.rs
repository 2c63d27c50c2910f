use criterion::{criterion_group, Criterion};
use rand::{thread_rng, RngCore};
use std::hint::black_box;
use usig::{enclave::SoftwareEnclave, Usig};

fn benchmark_create_ui(c: &mut Criterion) {
    let mut key_material = [0u8; 32];
    thread_rng().fill_bytes(&mut key_material);
    let usig = Usig::new(SoftwareEnclave::provision(None, &key_material).unwrap());
    for msg_len in [32, 1024, 65536] {
        let mut msg = vec![0u8; msg_len];
        thread_rng().fill_bytes(&mut msg);
        c.bench_function(&format!("{}/msg_len={}", module_path!(), msg_len), |b| {
            b.iter(|| black_box(usig.create_ui(&msg).unwrap()));
        });
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = benchmark_create_ui
}
