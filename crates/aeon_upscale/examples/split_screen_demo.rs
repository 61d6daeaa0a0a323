//! # Split-Screen Demo
//!
//! Two views share one upscaler. A camera cut on the second view sends its
//! state back through the pool while the first keeps accumulating.
//!
//! ```text
//! frame 0   view 0: allocate    view 1: allocate
//! frame 1   view 0: continue    view 1: continue
//! frame 2   view 0: continue    view 1: released
//! frame 3   view 0: continue    view 2: reuse view 1's state
//! ```

use aeon_upscale::{
    FrameInputs, QualityMode, Texture2D, Upscaler, UpscalerConfig, ViewId, ViewInfo, ViewportGeometry,
};
use glam::{UVec2, Vec2, Vec3};

const JITTER_LEN: u32 = 4;

const JITTER: [Vec2; JITTER_LEN as usize] = [
    Vec2::new(0.25, -0.125),
    Vec2::new(-0.25, 0.375),
    Vec2::new(0.125, 0.125),
    Vec2::new(-0.375, -0.375),
];

fn main() {
    println!("═══════════════════════════════════════════════════════════════");
    println!("   AEON UPSCALE - Split-Screen Demo");
    println!("═══════════════════════════════════════════════════════════════");

    let config = UpscalerConfig {
        quality: QualityMode::Balanced,
        sharpening: true,
        ..UpscalerConfig::default()
    };
    let output = UVec2::new(320, 180);
    let geometry = ViewportGeometry::from_output(output, config.quality, config.history_size);
    println!(
        "input {}x{} -> history {}x{} -> output {}x{}",
        geometry.input.width(),
        geometry.input.height(),
        geometry.history.width(),
        geometry.history.height(),
        geometry.output.width(),
        geometry.output.height(),
    );

    let checker = Texture2D::from_fn(geometry.input.extent, |p| {
        if (p.x / 4 + p.y / 4) % 2 == 0 {
            Vec3::new(0.9, 0.8, 0.6)
        } else {
            Vec3::new(0.05, 0.1, 0.2)
        }
    });
    let depth = Texture2D::new(geometry.depth.extent, 0.5);
    let upscaler = Upscaler::new();

    for (frame, jitter) in (0..4u64).zip(JITTER) {
        let views: &[u64] = match frame {
            0 | 1 => &[0, 1],
            2 => {
                upscaler.release_view(ViewId(1));
                &[0]
            }
            _ => &[0, 2],
        };

        for &view in views {
            let mut inputs = FrameInputs::new(&checker, &depth, output);
            inputs.jitter = jitter;
            inputs.jitter_sequence_length = JITTER_LEN;

            match upscaler.process(&ViewInfo::new(view, frame), &inputs, &config) {
                Ok(out) => println!(
                    "frame {frame} view {view}: {:?} state #{} reset={} new samples {:.0}% locks {}",
                    out.stats.decision,
                    out.state.index(),
                    out.reset,
                    out.stats.new_sample_ratio() * 100.0,
                    out.stats.lock_seeds,
                ),
                Err(e) => println!("frame {frame} view {view}: rejected: {e}"),
            }
        }
        upscaler.end_of_frame();
    }

    let stats = upscaler.pool_stats();
    println!();
    println!(
        "pool: live {} pooled {} allocated {} reused {} deferred {}",
        stats.live, stats.pooled, stats.allocated, stats.reused, stats.deferred
    );
    println!("freed on shutdown: {}", upscaler.shutdown());
}
