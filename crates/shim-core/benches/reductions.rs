use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use shim_core::backend::Stream;
use shim_core::cpu_kernels::CpuRefBackend;
use shim_core::graph::{OpKind, TensorMeta};
use shim_core::types::{DType, Shape};
use smallvec::SmallVec;

fn bench_reductions(c: &mut Criterion) {
    let shapes: &[(usize, usize, &str)] = &[
        (128, 128, "128x128"),
        (256, 256, "256x256"),
        (512, 512, "512x512"),
    ];
    let ops: &[(&str, fn() -> OpKind)] = &[
        ("sum_axis1", || OpKind::Sum { axis: Some(1) }),
        ("mean_axis1", || OpKind::Mean { axis: Some(1) }),
        ("median_axis1", || OpKind::Median { axis: Some(1) }),
    ];

    let mut group = c.benchmark_group("cpu_reductions_f32");

    for &(m, n, name) in shapes {
        let numel = m * n;
        let x_data: Vec<f32> = (0..numel).map(|i| ((i * 31) % 1000) as f32 * 0.001).collect();

        for &(op_name, op) in ops {
            group.bench_function(BenchmarkId::new(op_name, name), |bench| {
                bench.iter_batched(
                    || {
                        let stream = Stream::new(Box::new(CpuRefBackend));
                        let x = stream.add_constant(
                            x_data.clone(),
                            TensorMeta::new(Shape::new(vec![m as i64, n as i64]), DType::F32),
                        );
                        (stream, x)
                    },
                    |(stream, x)| {
                        let y = stream.add_op(
                            op(),
                            SmallVec::from_slice(&[x]),
                            TensorMeta::new(Shape::new(vec![m as i64]), DType::F32),
                        );
                        stream.eval(y).expect("reduction eval");
                    },
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_reductions);
criterion_main!(benches);
