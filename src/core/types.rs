//! Core math and color types shared across the UI core and the backends.
//!
//! Two families of types exist on purpose: `Vec2`/`ColorF` are what the UI
//! core computes with, `Float2`/`Float4` are what crosses the host boundary
//! (draw data, clip rectangles, input coordinates). They are bit-identical,
//! and the conversion pairs below make that adaptation explicit and testable
//! instead of relying on pointer reinterpretation.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 2D vector used internally by the UI core.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Host-facing 2-component float, e.g. cursor coordinates and display size.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Float2 {
    pub x: f32,
    pub y: f32,
}

impl Float2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Host-facing 4-component float, e.g. clip rectangles (x1, y1, x2, y2).
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Float4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Float4 {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

/// Linear RGBA color used internally by the UI core.
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct ColorF {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorF {
    pub const WHITE: ColorF = ColorF { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Pack into the 0xAABBGGRR layout the draw vertex carries.
    pub fn packed(&self) -> u32 {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
        q(self.r) | (q(self.g) << 8) | (q(self.b) << 16) | (q(self.a) << 24)
    }
}

/// Axis-aligned rectangle (min/max corners).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: Vec2::new(pos.x + size.x, pos.y + size.y),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }
}

// Boundary conversions. Both sides are Pod with identical field layout, so
// these compile down to moves; the tests below pin the layout so a drift in
// either family fails loudly instead of corrupting draw data.

pub fn to_vec2(v: Float2) -> Vec2 {
    bytemuck::cast(v)
}

pub fn to_float2(v: Vec2) -> Float2 {
    bytemuck::cast(v)
}

pub fn to_colorf(v: Float4) -> ColorF {
    bytemuck::cast(v)
}

pub fn to_float4(v: ColorF) -> Float4 {
    bytemuck::cast(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_layout_parity() {
        assert_eq!(size_of::<Vec2>(), size_of::<Float2>());
        assert_eq!(align_of::<Vec2>(), align_of::<Float2>());
        assert_eq!(size_of::<ColorF>(), size_of::<Float4>());
        assert_eq!(align_of::<ColorF>(), align_of::<Float4>());
    }

    #[test]
    fn test_conversion_roundtrip() {
        let v = Float2::new(3.5, -7.25);
        assert_eq!(to_float2(to_vec2(v)), v);

        let c = ColorF::new(0.1, 0.2, 0.3, 0.4);
        let f = to_float4(c);
        assert_eq!(f, Float4::new(0.1, 0.2, 0.3, 0.4));
        assert_eq!(to_colorf(f), c);
    }

    #[test]
    fn test_color_packing() {
        assert_eq!(ColorF::WHITE.packed(), 0xFFFF_FFFF);
        assert_eq!(ColorF::new(1.0, 0.0, 0.0, 1.0).packed(), 0xFF00_00FF);
        assert_eq!(ColorF::new(0.0, 0.0, 0.0, 0.0).packed(), 0);
    }

    #[test]
    fn test_rect_contains() {
        let r = Rect::from_pos_size(Vec2::new(10.0, 10.0), Vec2::new(20.0, 5.0));
        assert!(r.contains(Vec2::new(10.0, 10.0)));
        assert!(r.contains(Vec2::new(29.0, 14.0)));
        assert!(!r.contains(Vec2::new(30.0, 12.0)));
        assert!(!r.contains(Vec2::new(5.0, 12.0)));
    }
}
