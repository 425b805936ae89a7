//! Shared shader source and transpilation helpers
//!
//! Both backends render from the same WGSL source: the Vulkan path lowers it
//! to SPIR-V, the D3D12 path to HLSL for the runtime compiler. Keeping one
//! source means the vertex contract (stride 20, pos/uv at rg32f, color at
//! rgba8) is stated exactly once.

/// Vertex + fragment program for the UI geometry. One uniform projection,
/// the font/texture atlas and its sampler.
pub const UI_SHADER_WGSL: &str = r#"
struct Transform {
    projection: mat4x4<f32>,
};

@group(0) @binding(0) var<uniform> transform: Transform;
@group(0) @binding(1) var atlas: texture_2d<f32>;
@group(0) @binding(2) var atlas_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
};

@vertex
fn vs_main(
    @location(0) pos: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
) -> VertexOutput {
    var out: VertexOutput;
    out.position = transform.projection * vec4<f32>(pos, 0.0, 1.0);
    out.uv = uv;
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color * textureSample(atlas, atlas_sampler, in.uv);
}
"#;

/// CPU mirror of the shader's `Transform` uniform block.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Transform {
    pub projection: [[f32; 4]; 4],
}

/// Orthographic projection mapping the draw data's display rectangle onto
/// clip space, y down.
pub fn ortho_projection(draw_data: &crate::draw::DrawData) -> Transform {
    let l = draw_data.display_pos.x;
    let r = l + draw_data.display_size.x;
    let t = draw_data.display_pos.y;
    let b = t + draw_data.display_size.y;
    Transform {
        projection: [
            [2.0 / (r - l), 0.0, 0.0, 0.0],
            [0.0, 2.0 / (b - t), 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [-(r + l) / (r - l), -(t + b) / (b - t), 0.0, 1.0],
        ],
    }
}

fn parse_and_validate(
    wgsl: &str,
) -> Result<(naga::Module, naga::valid::ModuleInfo), String> {
    let module = naga::front::wgsl::parse_str(wgsl)
        .map_err(|e| format!("WGSL Parse Error: {:?}", e))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    let info = validator
        .validate(&module)
        .map_err(|e| format!("WGSL Validation Error: {:?}", e))?;

    Ok((module, info))
}

/// Compile WGSL source code to SPIR-V.
#[cfg(feature = "vulkan")]
pub fn compile_wgsl_to_spirv(wgsl: &str) -> Result<Vec<u32>, String> {
    let (module, info) = parse_and_validate(wgsl)?;

    let spirv = naga::back::spv::write_vec(
        &module,
        &info,
        &naga::back::spv::Options {
            lang_version: (1, 3),
            flags: naga::back::spv::WriterFlags::empty(),
            ..naga::back::spv::Options::default()
        },
        None,
    )
    .map_err(|e| format!("SPIR-V Export Error: {:?}", e))?;

    Ok(spirv)
}

/// Transpile WGSL source code to HLSL for the D3D runtime compiler. Entry
/// points keep their WGSL names (`vs_main` / `fs_main`); vertex inputs come
/// out as LOC0..2 semantics in location order.
#[cfg(all(feature = "dx12", windows))]
pub fn compile_wgsl_to_hlsl(wgsl: &str) -> Result<String, String> {
    let (module, info) = parse_and_validate(wgsl)?;

    let options = naga::back::hlsl::Options {
        shader_model: naga::back::hlsl::ShaderModel::V5_1,
        ..naga::back::hlsl::Options::default()
    };
    let mut hlsl = String::new();
    let mut writer = naga::back::hlsl::Writer::new(&mut hlsl, &options);
    writer
        .write(&module, &info, None)
        .map_err(|e| format!("HLSL Export Error: {:?}", e))?;

    Ok(hlsl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_shader_validates() {
        parse_and_validate(UI_SHADER_WGSL).unwrap();
    }

    #[cfg(feature = "vulkan")]
    #[test]
    fn test_ui_shader_compiles_to_spirv() {
        let spirv = compile_wgsl_to_spirv(UI_SHADER_WGSL).unwrap();
        assert_eq!(spirv[0], 0x0723_0203); // SPIR-V magic
    }

    #[cfg(all(feature = "dx12", windows))]
    #[test]
    fn test_ui_shader_transpiles_to_hlsl() {
        let hlsl = compile_wgsl_to_hlsl(UI_SHADER_WGSL).unwrap();
        assert!(hlsl.contains("vs_main"));
        assert!(hlsl.contains("fs_main"));
    }
}
