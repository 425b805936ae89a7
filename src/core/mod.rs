//! Core types and infrastructure

mod types;

pub use types::{to_colorf, to_float2, to_float4, to_vec2, ColorF, Float2, Float4, Rect, Vec2};
