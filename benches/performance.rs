// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for the metronome
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Scheduler tick cost under both policies
//! - Click rendering throughput
//! - Tempo change handling

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use metronome::audio::{render_click, ClickSettings, ClickSynth};
use metronome::{Beat, BeatScheduler, ManualClock, SchedulerConfig, SchedulingPolicy};

fn scheduler(clock: &ManualClock, policy: SchedulingPolicy) -> BeatScheduler<ManualClock> {
    BeatScheduler::with_config(
        clock.clone(),
        SchedulerConfig {
            start_bpm: 200,
            policy: Some(policy),
            ..Default::default()
        },
    )
}

/// Benchmark one simulated second of ticks (the hot path of the runtime loop)
fn bench_scheduler_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_ticks");

    let cases = [
        ("wall_clock_1ms", SchedulingPolicy::WallClock, 1u64),
        (
            "lookahead_25ms",
            SchedulingPolicy::Lookahead {
                window: Duration::from_millis(100),
            },
            25u64,
        ),
    ];

    for (name, policy, step) in cases {
        group.bench_function(name, |b| {
            b.iter_batched(
                || {
                    let clock = ManualClock::with_precision(match policy {
                        SchedulingPolicy::WallClock => metronome::ClockPrecision::BestEffort,
                        SchedulingPolicy::Lookahead { .. } => {
                            metronome::ClockPrecision::SampleAccurate
                        }
                    });
                    let mut scheduler = scheduler(&clock, policy);
                    scheduler.play();
                    (clock, scheduler)
                },
                |(clock, mut scheduler)| {
                    let mut beats = 0u64;
                    let mut t = 0;
                    while t < 1000 {
                        clock.set_millis(t);
                        beats += scheduler
                            .on_tick(&mut |_: Beat| {})
                            .unwrap_or_default() as u64;
                        t += step;
                    }
                    black_box(beats)
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

/// Benchmark an idle tick: playing, nothing due
fn bench_idle_tick(c: &mut Criterion) {
    let clock = ManualClock::best_effort();
    let mut scheduler = scheduler(&clock, SchedulingPolicy::WallClock);
    scheduler.play();
    scheduler.on_tick(&mut |_: Beat| {}).unwrap_or_default();

    let mut t = 0u64;
    c.bench_function("idle_tick", |b| {
        b.iter(|| {
            t += 1;
            clock.set(Duration::from_nanos(t));
            black_box(scheduler.on_tick(&mut |_: Beat| {}).unwrap_or_default())
        })
    });
}

/// Benchmark tempo changes through the range check
fn bench_tempo_changes(c: &mut Criterion) {
    let clock = ManualClock::best_effort();
    let mut scheduler = scheduler(&clock, SchedulingPolicy::WallClock);

    c.bench_function("set_bpm_sweep", |b| {
        b.iter(|| {
            for bpm in 30..=210 {
                scheduler.set_bpm(black_box(bpm));
            }
            black_box(scheduler.bpm())
        })
    });
}

/// Benchmark click mixing at common buffer sizes
fn bench_click_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("click_render");
    let settings = ClickSettings::default();

    for size in [64usize, 256, 1024].iter() {
        group.bench_with_input(BenchmarkId::new("stereo", size), size, |b, &size| {
            let mut synth = ClickSynth::new(44_100, &settings, 4);
            let mut buffer = vec![0.0f32; size * 2];
            b.iter(|| {
                for track in 0..4 {
                    synth.trigger_now(track);
                }
                buffer.fill(0.0);
                synth.render(&mut buffer, 2);
                black_box(buffer[0])
            })
        });
    }

    group.bench_function("render_waveform", |b| {
        b.iter(|| black_box(render_click(&settings, 44_100).len()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_scheduler_ticks,
    bench_idle_tick,
    bench_tempo_changes,
    bench_click_render,
);

criterion_main!(benches);
