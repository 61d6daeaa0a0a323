//! # State Pool Concurrency Tests
//!
//! Split-screen views submitted from different threads must never end up
//! sharing a frame state within one frame.
//!
//! Run with: cargo test -p aeon_upscale --test pool_concurrency

use std::collections::HashSet;
use std::sync::Barrier;
use std::thread;

use aeon_upscale::{FrameInputs, StatePool, Texture2D, Upscaler, UpscalerConfig, ViewInfo, ViewportGeometry};
use glam::{UVec2, Vec3};

const ROUNDS: u64 = 200;

#[test]
fn verify_concurrent_acquire_never_aliases() {
    for round in 0..ROUNDS {
        let pool = StatePool::new();
        let frame = round + 1;

        // One entry stamped this frame by a third view, one from last frame
        let (stamped, _, _) = pool.acquire(99, frame);
        let (stale, _, _) = pool.acquire(98, frame - 1);
        pool.release(stamped);
        pool.release(stale);

        let barrier = Barrier::new(2);
        let (a, b) = thread::scope(|s| {
            let first = s.spawn(|| {
                barrier.wait();
                pool.acquire(1, frame).0
            });
            let second = s.spawn(|| {
                barrier.wait();
                pool.acquire(2, frame).0
            });
            (first.join().unwrap(), second.join().unwrap())
        });

        assert_ne!(a, b, "round {round}: both views got the same state");
        assert_ne!(a, stamped, "round {round}: view 1 took a state used this frame");
        assert_ne!(b, stamped, "round {round}: view 2 took a state used this frame");
        assert_eq!(pool.stats().pooled, 1);
    }
}

#[test]
fn verify_many_views_get_distinct_states() {
    const VIEWS: u64 = 8;
    let pool = StatePool::new();

    // Warm the pool with states from the previous frame
    let warm: Vec<_> = (0..VIEWS).map(|v| pool.acquire(100 + v, 0).0).collect();
    for handle in warm {
        pool.release(handle);
    }

    let barrier = Barrier::new(VIEWS as usize);
    let handles: Vec<_> = thread::scope(|s| {
        let workers: Vec<_> = (0..VIEWS)
            .map(|view| {
                let pool = &pool;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    pool.acquire(view, 1).0
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let unique: HashSet<_> = handles.iter().copied().collect();
    assert_eq!(unique.len(), VIEWS as usize);
    assert_eq!(pool.stats().allocated, VIEWS);
    assert_eq!(pool.stats().reused, VIEWS);
}

#[test]
fn verify_split_screen_views_process_in_parallel() {
    let config = UpscalerConfig::default();
    let output = UVec2::new(24, 16);
    let geometry = ViewportGeometry::from_output(output, config.quality, config.history_size);
    let color = Texture2D::new(geometry.input.extent, Vec3::splat(0.4));
    let depth = Texture2D::new(geometry.depth.extent, 0.5);

    let upscaler = Upscaler::new();
    for frame in 0..4 {
        let barrier = Barrier::new(2);
        let (left, right) = thread::scope(|s| {
            let run = |view: u64| {
                let upscaler = &upscaler;
                let barrier = &barrier;
                let color = &color;
                let depth = &depth;
                let config = &config;
                move || {
                    barrier.wait();
                    let inputs = FrameInputs::new(color, depth, output);
                    upscaler.process(&ViewInfo::new(view, frame), &inputs, config).unwrap()
                }
            };
            let left = s.spawn(run(0));
            let right = s.spawn(run(1));
            (left.join().unwrap(), right.join().unwrap())
        });

        assert_ne!(left.state, right.state);
        assert_eq!(left.reset, frame == 0);
        assert_eq!(right.reset, frame == 0);
    }
    assert_eq!(upscaler.pool_stats().live, 2);
}
