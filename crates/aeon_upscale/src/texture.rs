//! # CPU Textures
//!
//! Row-major 2D images with the addressing modes the stages rely on:
//! clamped loads, point sampling and bilinear sampling with clamp-to-edge.
//! [`dispatch`] runs a per-pixel kernel over an extent, standing in for a
//! compute dispatch on the host's frame graph.

// Pixel math moves between integer extents and float coordinates
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use std::ops::{Add, Mul};

use glam::{IVec2, UVec2, Vec2};

/// A 2D image of `T` texels.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture2D<T> {
    extent: UVec2,
    texels: Vec<T>,
}

impl<T: Copy> Texture2D<T> {
    /// Creates a texture filled with `value`.
    #[must_use]
    pub fn new(extent: UVec2, value: T) -> Self {
        Self {
            extent,
            texels: vec![value; extent.x as usize * extent.y as usize],
        }
    }

    /// Creates a texture by evaluating `f` at every pixel.
    #[must_use]
    pub fn from_fn(extent: UVec2, mut f: impl FnMut(UVec2) -> T) -> Self {
        let mut texels = Vec::with_capacity(extent.x as usize * extent.y as usize);
        for y in 0..extent.y {
            for x in 0..extent.x {
                texels.push(f(UVec2::new(x, y)));
            }
        }
        Self { extent, texels }
    }

    /// Wraps existing row-major texels. Returns `None` on a size mismatch.
    #[must_use]
    pub fn from_vec(extent: UVec2, texels: Vec<T>) -> Option<Self> {
        (texels.len() == extent.x as usize * extent.y as usize).then_some(Self { extent, texels })
    }

    /// Width and height.
    #[inline]
    #[must_use]
    pub const fn extent(&self) -> UVec2 {
        self.extent
    }

    /// Row-major texels.
    #[must_use]
    pub fn texels(&self) -> &[T] {
        &self.texels
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.extent.x as usize + x as usize
    }

    /// Returns true if `pos` addresses a texel.
    #[inline]
    #[must_use]
    pub fn contains(&self, pos: IVec2) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.extent.x && (pos.y as u32) < self.extent.y
    }

    /// Loads a texel. `pos` must be inside the texture.
    #[inline]
    #[must_use]
    pub fn load(&self, pos: UVec2) -> T {
        self.texels[self.offset(pos.x, pos.y)]
    }

    /// Loads a texel, clamping `pos` to the edge.
    #[inline]
    #[must_use]
    pub fn load_clamped(&self, pos: IVec2) -> T {
        let max = self.extent.as_ivec2() - IVec2::ONE;
        let p = pos.clamp(IVec2::ZERO, max.max(IVec2::ZERO));
        self.texels[self.offset(p.x as u32, p.y as u32)]
    }

    /// Writes a texel. Out-of-range writes are dropped.
    #[inline]
    pub fn store(&mut self, pos: IVec2, value: T) {
        if self.contains(pos) {
            let offset = self.offset(pos.x as u32, pos.y as u32);
            self.texels[offset] = value;
        }
    }

    /// Overwrites every texel.
    pub fn fill(&mut self, value: T) {
        self.texels.fill(value);
    }

    /// Nearest-texel sample at normalized `uv`, clamp-to-edge.
    #[inline]
    #[must_use]
    pub fn sample_point(&self, uv: Vec2) -> T {
        self.load_clamped((uv * self.extent.as_vec2()).floor().as_ivec2())
    }

    /// Maps every texel through `f`.
    #[must_use]
    pub fn map<U: Copy>(&self, f: impl FnMut(&T) -> U) -> Texture2D<U> {
        Texture2D {
            extent: self.extent,
            texels: self.texels.iter().map(f).collect(),
        }
    }
}

impl<T> Texture2D<T>
where
    T: Copy + Add<Output = T> + Mul<f32, Output = T>,
{
    /// Bilinear sample at normalized `uv`, clamp-to-edge.
    #[must_use]
    pub fn sample_bilinear(&self, uv: Vec2) -> T {
        let taps = BilinearTaps::new(uv, self.extent.as_vec2());
        let mut acc = self.load_clamped(taps.origin) * taps.weights[0];
        for (offset, weight) in BilinearTaps::OFFSETS.iter().zip(taps.weights).skip(1) {
            acc = acc + self.load_clamped(taps.origin + *offset) * weight;
        }
        acc
    }
}

/// The four texels and weights of a bilinear footprint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BilinearTaps {
    /// Top-left texel.
    pub origin: IVec2,
    /// Weights in [`BilinearTaps::OFFSETS`] order.
    pub weights: [f32; 4],
}

impl BilinearTaps {
    /// Tap offsets relative to `origin`.
    pub const OFFSETS: [IVec2; 4] = [
        IVec2::new(0, 0),
        IVec2::new(1, 0),
        IVec2::new(0, 1),
        IVec2::new(1, 1),
    ];

    /// Footprint of `uv` on a texture of `size` texels.
    #[must_use]
    pub fn new(uv: Vec2, size: Vec2) -> Self {
        let pos = uv * size - Vec2::splat(0.5);
        let base = pos.floor();
        let f = pos - base;
        Self {
            origin: base.as_ivec2(),
            weights: [
                (1.0 - f.x) * (1.0 - f.y),
                f.x * (1.0 - f.y),
                (1.0 - f.x) * f.y,
                f.x * f.y,
            ],
        }
    }
}

/// Runs `kernel` once per pixel of `extent` and collects the results.
pub fn dispatch<T: Copy>(extent: UVec2, kernel: impl FnMut(UVec2) -> T) -> Texture2D<T> {
    Texture2D::from_fn(extent, kernel)
}
