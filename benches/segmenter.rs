use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use scriv::audio::segmenter::{SegmenterConfig, segment};

const SAMPLE_RATE: u32 = 16_000;

/// Synthetic speech: modulated tone with a 4s pause every 10s.
fn speech_signal(total_secs: usize) -> Vec<f32> {
    let count = total_secs * SAMPLE_RATE as usize;
    (0..count)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let phase = t % 10.0;
            if phase >= 8.0 {
                (t * 2.0 * std::f32::consts::PI * 100.0).sin() * 0.004
            } else {
                let syllable = 0.6 + 0.4 * (t * 2.0 * std::f32::consts::PI * 3.0).sin();
                (t * 2.0 * std::f32::consts::PI * 220.0).sin() * 0.5 * syllable
            }
        })
        .collect()
}

fn bench_segment(c: &mut Criterion) {
    let config = SegmenterConfig::default();
    let mut group = c.benchmark_group("segment");
    group.sample_size(20);

    for &secs in &[120usize, 600] {
        let samples = speech_signal(secs);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}s", secs)),
            &samples,
            |b, samples| b.iter(|| segment(black_box(samples), SAMPLE_RATE, &config)),
        );
    }
    group.finish();
}

fn bench_forced_only(c: &mut Criterion) {
    // Adaptive analysis disabled: measures the plain scan and cut walk.
    let config = SegmenterConfig {
        silence_threshold: Some(0.01),
        adaptive_threshold: false,
        ..SegmenterConfig::default()
    };
    let samples = speech_signal(600);

    c.bench_function("segment/600s-fixed-threshold", |b| {
        b.iter(|| segment(black_box(&samples), SAMPLE_RATE, &config))
    });
}

criterion_group!(benches, bench_segment, bench_forced_only);
criterion_main!(benches);
