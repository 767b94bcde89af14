use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use tinyg_core::planner::{MotionPlanner, MoveLimits, MoveRequest};
use tinyg_core::cm::types::PathControl;
use tinyg_common::position::Position;

fn limits() -> MoveLimits {
    MoveLimits {
        cruise_cap: 1000.0,
        amax: 50_000.0,
        jmax: 5_000_000.0,
        junction_deviation: 0.05,
    }
}

fn move_at(i: usize, length: f64) -> MoveRequest {
    let direction = if i % 2 == 0 {
        [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]
    } else {
        [0.0, 1.0, 0.0, 0.0, 0.0, 0.0]
    };
    MoveRequest {
        target: Position::new([length, length, 0.0, 0.0, 0.0, 0.0]),
        direction,
        length,
        steps: [0; 6],
        requested_feed: Some(600.0),
        path_control: PathControl::Continuous,
        limits: limits(),
        line_number: i as u32,
    }
}

fn bench_enqueue_replan(c: &mut Criterion) {
    let mut group = c.benchmark_group("planner_enqueue_replan");
    for depth in [4usize, 16, 48] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut planner = MotionPlanner::new(depth + 1, 0.1);
                for i in 0..depth {
                    planner.enqueue(move_at(i, 10.0)).unwrap();
                }
                criterion::black_box(planner.len());
            });
        });
    }
    group.finish();
}

fn bench_activate_and_drain(c: &mut Criterion) {
    c.bench_function("planner_activate_and_drain_16", |b| {
        b.iter(|| {
            let mut planner = MotionPlanner::new(17, 0.1);
            for i in 0..16 {
                planner.enqueue(move_at(i, 10.0)).unwrap();
            }
            while let Some(_block) = planner.activate_next() {
                planner.complete_head();
            }
            criterion::black_box(planner.is_empty());
        });
    });
}

criterion_group!(benches, bench_enqueue_replan, bench_activate_and_drain);
criterion_main!(benches);
