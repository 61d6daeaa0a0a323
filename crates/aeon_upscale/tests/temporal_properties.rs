//! # Temporal Upscaler Property Tests
//!
//! End-to-end checks of the upscaler's observable guarantees:
//!
//! 1. **Encoding**: stored colour round-trips within its bit depth
//! 2. **Stability**: a static scene settles within a fixed frame budget
//! 3. **Disocclusion**: newly revealed foreground is not trusted, invalid
//!    depth is never clipped
//! 4. **Locks**: thin ridges with valid depth seed locks, their flanks do not
//! 5. **Geometry**: 960x540 Quality upscales to 1440x810
//! 6. **Exposure**: pre-exposure cancels out of the final colour
//!
//! Run with: cargo test -p aeon_upscale --test temporal_properties

use aeon_upscale::color;
use aeon_upscale::stages::activate::{self, ActivateInputs, ActivateUniforms, LOCK_SEED};
use aeon_upscale::{
    CameraParams, FrameInputs, QualityMode, Texture2D, Upscaler, UpscalerConfig, ViewId, ViewInfo,
    ViewportGeometry,
};
use glam::{UVec2, Vec2, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn max_abs_diff(a: &Texture2D<Vec3>, b: &Texture2D<Vec3>) -> f32 {
    a.texels()
        .iter()
        .zip(b.texels())
        .map(|(x, y)| (*x - *y).abs().max_element())
        .fold(0.0, f32::max)
}

// ============================================================================
// 1. ENCODING ROUND TRIP
// ============================================================================

#[test]
fn verify_packed_11_11_10_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for _ in 0..10_000 {
        let v = Vec3::new(rng.gen(), rng.gen(), rng.gen());
        let back = color::unpack_11_11_10(color::pack_11_11_10(v));
        let err = (back - v).abs();
        assert!(err.x <= 1.0 / 2047.0, "Y error {} for {v}", err.x);
        assert!(err.y <= 1.0 / 2047.0, "Co error {} for {v}", err.y);
        assert!(err.z <= 1.0 / 1023.0, "Cg error {} for {v}", err.z);
    }
}

#[test]
fn verify_half_round_trip() {
    let mut rng = StdRng::seed_from_u64(0xf16);

    for _ in 0..10_000 {
        let v = Vec3::new(rng.gen(), rng.gen(), rng.gen());
        let back = color::unpack_half(color::pack_half(v));
        assert!((back - v).abs().max_element() <= 1.0 / 2048.0, "{v} -> {back}");
    }
}

#[test]
fn verify_working_space_round_trip() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..1_000 {
        let rgb = Vec3::new(rng.gen_range(0.0..8.0), rng.gen_range(0.0..8.0), rng.gen_range(0.0..8.0));
        let exposure = rng.gen_range(0.25..4.0);
        let back = color::from_working(color::to_working(rgb, exposure), exposure);
        assert!((back - rgb).abs().max_element() < 1e-3 * rgb.max_element().max(1.0));
    }
}

// ============================================================================
// 2. STATIC SCENE CONVERGES
// ============================================================================

/// Largest frame-to-frame history change after `frames` static frames.
fn settle(config: &UpscalerConfig, frames: u64) -> f32 {
    let output = UVec2::new(48, 32);
    let geometry = ViewportGeometry::from_output(output, config.quality, config.history_size);
    let color = Texture2D::from_fn(geometry.input.extent, |p| {
        Vec3::new(0.2 + p.x as f32 * 0.02, 0.4, 0.2 + p.y as f32 * 0.03)
    });
    let depth = Texture2D::new(geometry.depth.extent, 0.25);
    let inputs = FrameInputs::new(&color, &depth, output);

    let upscaler = Upscaler::new();
    let mut previous = upscaler.process(&ViewInfo::new(0, 0), &inputs, config).unwrap().color;
    let mut diff = f32::MAX;
    for frame in 1..frames {
        let current = upscaler.process(&ViewInfo::new(0, frame), &inputs, config).unwrap();
        assert!(!current.reset);
        assert!(current.color.texels().iter().all(|c| c.is_finite()));
        diff = max_abs_diff(&previous, &current.color);
        previous = current.color;
    }
    diff
}

// The reset frame stores full temporal reactivity. It decays by squaring
// over roughly ten frames, after which each pixel approaches its steady
// reconstruction geometrically at rate weight / (1 + weight).
const WARM_UP_FRAMES: u64 = 40;
const SETTLED_EPSILON: f32 = 1e-3;

#[test]
fn verify_static_scene_converges() {
    let config = UpscalerConfig {
        half_precision: false,
        ..UpscalerConfig::default()
    };
    let early = settle(&config, 8);
    let settled = settle(&config, WARM_UP_FRAMES);
    assert!(settled < SETTLED_EPSILON, "history still moving by {settled}");
    assert!(settled < early, "{settled} >= {early}");
}

#[test]
fn verify_half_precision_history_settles() {
    let config = UpscalerConfig::default();
    assert!(config.half_precision);
    let settled = settle(&config, 96);
    assert!(settled < SETTLED_EPSILON, "history still moving by {settled}");
}

// ============================================================================
// 3. DISOCCLUSION
// ============================================================================

#[test]
fn verify_foreground_occluder_is_clipped() {
    let config = UpscalerConfig::default();
    let geometry = ViewportGeometry::from_input(UVec2::new(16, 16), QualityMode::Quality, 1.0);
    let camera = CameraParams::default();

    // Reversed-Z: 0.001 is far background, 0.1 is a near occluder
    let previous_depth = Texture2D::new(geometry.depth.extent, 0.001);
    let motion_depth_luma = Texture2D::from_fn(geometry.input.extent, |p| {
        let depth = if (6..10).contains(&p.x) && (6..10).contains(&p.y) {
            0.1
        } else {
            0.001
        };
        Vec4::new(0.0, 0.0, depth, 0.5)
    });

    let uniforms = ActivateUniforms::new(&geometry, &camera, Vec2::ZERO, &config);
    let out = activate::run(
        &ActivateInputs {
            motion_depth_luma: &motion_depth_luma,
            previous_depth: &previous_depth,
        },
        &uniforms,
    );

    for edge in [UVec2::new(6, 6), UVec2::new(9, 7), UVec2::new(7, 9)] {
        let confidence = 1.0 - out.reactive.load(edge);
        assert!(confidence < 0.5, "confidence {confidence} at {edge}");
    }
    let background = 1.0 - out.reactive.load(UVec2::new(1, 1));
    assert!(background > 0.99, "background confidence {background}");
}

#[test]
fn verify_invalid_depth_means_no_clip() {
    let config = UpscalerConfig::default();
    let geometry = ViewportGeometry::from_input(UVec2::new(16, 16), QualityMode::Quality, 1.0);
    let previous_depth = Texture2D::new(geometry.depth.extent, 0.001);
    let mut motion_depth_luma = Texture2D::new(geometry.input.extent, Vec4::new(0.0, 0.0, 0.1, 0.5));
    motion_depth_luma.store(glam::IVec2::new(6, 6), Vec4::new(0.0, 0.0, f32::NAN, 0.5));

    let uniforms = ActivateUniforms::new(&geometry, &CameraParams::default(), Vec2::ZERO, &config);
    let out = activate::run(
        &ActivateInputs {
            motion_depth_luma: &motion_depth_luma,
            previous_depth: &previous_depth,
        },
        &uniforms,
    );

    assert_eq!(out.reactive.load(UVec2::new(6, 6)), 0.0);
    assert!(out.reactive.texels().iter().all(|r| r.is_finite()));
}

#[test]
fn verify_invalid_scene_depth_does_not_spread() {
    let config = UpscalerConfig::default();
    let output = UVec2::new(24, 18);
    let geometry = ViewportGeometry::from_output(output, config.quality, config.history_size);
    let color = Texture2D::from_fn(geometry.input.extent, |p| {
        Vec3::new(0.1 + (p.x % 4) as f32 * 0.2, 0.3, 0.8 - (p.y % 3) as f32 * 0.25)
    });
    let clean_depth = Texture2D::new(geometry.depth.extent, 0.5);
    let mut broken_depth = clean_depth.clone();
    broken_depth.store(glam::IVec2::new(6, 6), f32::NAN);
    let jitters = [
        Vec2::new(0.25, -0.25),
        Vec2::new(-0.25, 0.25),
        Vec2::new(0.125, 0.375),
        Vec2::new(-0.375, -0.125),
    ];

    let run = |depth: &Texture2D<f32>| {
        let upscaler = Upscaler::new();
        let mut last = None;
        for (frame, jitter) in (0u64..).zip(jitters) {
            let mut inputs = FrameInputs::new(&color, depth, output);
            inputs.jitter = jitter;
            last = Some(upscaler.process(&ViewInfo::new(0, frame), &inputs, &config).unwrap().color);
        }
        last.unwrap()
    };

    let clean = run(&clean_depth);
    let broken = run(&broken_depth);
    assert!(broken.texels().iter().all(|c| c.is_finite() && c.max_element() <= 2.0));
    assert!(max_abs_diff(&clean, &broken) < 1e-6);
}

// ============================================================================
// 4. LOCK SEEDING
// ============================================================================

#[test]
fn verify_thin_line_seeds_locks() {
    let config = UpscalerConfig::default();
    let input = UVec2::new(16, 12);
    let geometry = ViewportGeometry::from_input(input, QualityMode::Quality, 1.0);
    let line_x = 5;

    let motion_depth_luma = Texture2D::from_fn(input, |p| {
        let luma = if p.x == line_x { 0.9 } else { 0.2 };
        Vec4::new(0.0, 0.0, 0.5, luma)
    });
    let previous_depth = Texture2D::new(input, 0.5);
    let uniforms = ActivateUniforms::new(&geometry, &CameraParams::default(), Vec2::ZERO, &config);
    let out = activate::run(
        &ActivateInputs {
            motion_depth_luma: &motion_depth_luma,
            previous_depth: &previous_depth,
        },
        &uniforms,
    );

    assert_eq!(out.lock_seeds, input.y);

    let threshold = config.tunables.similarity_threshold;
    for y in 0..input.y as i32 {
        assert!(activate::is_thin_feature(&motion_depth_luma, glam::IVec2::new(5, y), threshold));
        assert!(!activate::is_thin_feature(&motion_depth_luma, glam::IVec2::new(4, y), threshold));
        assert!(!activate::is_thin_feature(&motion_depth_luma, glam::IVec2::new(6, y), threshold));
    }

    let to_history = |x: i32, y: i32| {
        activate::history_position(
            glam::IVec2::new(x, y),
            Vec2::ZERO,
            geometry.input.size(),
            geometry.history.size(),
        )
        .as_uvec2()
    };
    assert_eq!(out.new_locks.load(to_history(5, 4)), LOCK_SEED);
    assert_eq!(out.new_locks.load(to_history(4, 4)), 0.0);
    assert_eq!(out.new_locks.load(to_history(6, 4)), 0.0);
}

#[test]
fn verify_thin_line_without_depth_is_not_locked() {
    let config = UpscalerConfig::default();
    let input = UVec2::new(16, 12);
    let geometry = ViewportGeometry::from_input(input, QualityMode::Quality, 1.0);

    let motion_depth_luma = Texture2D::from_fn(input, |p| {
        let luma = if p.x == 5 { 0.9 } else { 0.2 };
        Vec4::new(0.0, 0.0, 0.0, luma)
    });
    let previous_depth = Texture2D::new(input, 0.0);
    let uniforms = ActivateUniforms::new(&geometry, &CameraParams::default(), Vec2::ZERO, &config);
    let out = activate::run(
        &ActivateInputs {
            motion_depth_luma: &motion_depth_luma,
            previous_depth: &previous_depth,
        },
        &uniforms,
    );

    assert_eq!(out.lock_seeds, 0);
    assert!(out.new_locks.texels().iter().all(|&l| l == 0.0));
}

// ============================================================================
// 5. END-TO-END GEOMETRY AND FIRST FRAME
// ============================================================================

#[test]
fn verify_quality_mode_first_frame() {
    let geometry = ViewportGeometry::from_input(UVec2::new(960, 540), QualityMode::Quality, 1.0);
    assert_eq!(geometry.output.extent, UVec2::new(1440, 810));
    assert_eq!(geometry.history.extent, UVec2::new(1440, 810));

    let config = UpscalerConfig::default();
    let flat = Vec3::new(0.3, 0.5, 0.7);
    let color = Texture2D::new(geometry.input.extent, flat);
    let depth = Texture2D::new(geometry.depth.extent, 0.5);
    let mut inputs = FrameInputs::new(&color, &depth, geometry.output.extent);
    inputs.jitter = Vec2::new(0.25, -0.25);

    let upscaler = Upscaler::new();
    let out = upscaler.process(&ViewInfo::new(7, 0), &inputs, &config).unwrap();
    assert!(out.reset);
    assert_eq!(out.extent(), UVec2::new(1440, 810));
    assert_eq!(out.stats.new_samples, 1440 * 810);

    let history = upscaler.view_state(ViewId(7)).unwrap().take_history().unwrap();
    for texel in history.color.texels() {
        assert_eq!(texel.w, 1.0);
        assert!((texel.truncate() - flat).abs().max_element() < 1e-2, "{texel}");
    }
}

// ============================================================================
// 6. EXPOSURE INVARIANCE
// ============================================================================

#[test]
fn verify_exposure_cancels_out() {
    let config = UpscalerConfig {
        sharpening: true,
        ..UpscalerConfig::default()
    };
    let output = UVec2::new(30, 18);
    let geometry = ViewportGeometry::from_output(output, config.quality, config.history_size);
    let radiance = Texture2D::from_fn(geometry.input.extent, |p| {
        Vec3::new(0.1 + (p.x % 5) as f32 * 0.3, 0.5, 0.1 + (p.y % 3) as f32 * 0.6)
    });
    let depth = Texture2D::new(geometry.depth.extent, 0.5);
    let jitters = [Vec2::new(0.25, -0.25), Vec2::new(-0.25, 0.25), Vec2::new(0.125, 0.375)];

    let run = |exposure: f32| {
        let exposed = radiance.map(|c| *c * exposure);
        let upscaler = Upscaler::new();
        let mut last = None;
        for (frame, jitter) in jitters.iter().enumerate() {
            let mut inputs = FrameInputs::new(&exposed, &depth, output);
            inputs.pre_exposure = exposure;
            inputs.jitter = *jitter;
            let out = upscaler.process(&ViewInfo::new(0, frame as u64), &inputs, &config).unwrap();
            last = Some(out.color.map(|c| *c / exposure));
        }
        last.unwrap()
    };

    let unit = run(1.0);
    let doubled = run(2.0);
    for (a, b) in unit.texels().iter().zip(doubled.texels()) {
        assert!((*a - *b).abs().max_element() <= 1e-4 * a.max_element().max(1.0), "{a} vs {b}");
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

#[test]
fn verify_toml_config_drives_pipeline() {
    let config = UpscalerConfig::from_toml_str(
        r#"
        quality = "performance"
        sample_count = "nine"
        sharpening = true
        sharpness = 5.0
        history_size = 2.0
        color_encoding = "packed11_11_10"
        "#,
    )
    .unwrap();
    assert_eq!(config.sharpness, 2.0);

    let output = UVec2::new(20, 10);
    let geometry = ViewportGeometry::from_output(output, config.quality, config.history_size);
    assert_eq!(geometry.input.extent, UVec2::new(10, 5));
    assert_eq!(geometry.history.extent, UVec2::new(40, 20));

    let color = Texture2D::new(geometry.input.extent, Vec3::splat(0.5));
    let depth = Texture2D::new(geometry.depth.extent, 0.5);
    let out = Upscaler::new()
        .process(&ViewInfo::new(0, 0), &FrameInputs::new(&color, &depth, output), &config)
        .unwrap();
    assert_eq!(out.extent(), output);
    assert!(out.color.texels().iter().all(|c| (*c - Vec3::splat(0.5)).abs().max_element() < 1e-2));
}
