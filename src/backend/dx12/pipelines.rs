//! D3D12 pipeline and shader management
//!
//! The shared WGSL source is lowered to HLSL and compiled at runtime with
//! the D3D compiler. Register assignment follows the WGSL bindings (b0
//! uniform, t1 texture, s2 sampler), which the root signature mirrors.

use std::ffi::{c_void, CString};
use std::result::Result as StdResult;

use windows::core::*;
use windows::Win32::Graphics::Direct3D::Fxc::*;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;

/// Compile HLSL to bytecode.
pub unsafe fn compile_shader(
    source: &str,
    entry_point: &str,
    target: &str,
) -> StdResult<ID3DBlob, String> {
    let mut blob: Option<ID3DBlob> = None;
    let mut error_blob: Option<ID3DBlob> = None;

    let s_source = source.as_bytes();
    let entry_point_c =
        CString::new(entry_point).map_err(|e| format!("bad entry point: {:?}", e))?;
    let target_c = CString::new(target).map_err(|e| format!("bad target: {:?}", e))?;
    let s_entry = PCSTR(entry_point_c.as_ptr() as *const u8);
    let s_target = PCSTR(target_c.as_ptr() as *const u8);

    let hr = D3DCompile(
        s_source.as_ptr() as *const c_void,
        s_source.len(),
        None,
        None,
        None,
        s_entry,
        s_target,
        D3DCOMPILE_ENABLE_STRICTNESS,
        0,
        &mut blob,
        Some(&mut error_blob),
    );

    if hr.is_err() {
        if let Some(err) = error_blob {
            let msg = std::slice::from_raw_parts(
                err.GetBufferPointer() as *const u8,
                err.GetBufferSize(),
            );
            return Err(String::from_utf8_lossy(msg).into_owned());
        }
        return Err(format!("Shader compilation failed with HRESULT: {:?}", hr));
    }

    blob.ok_or_else(|| "Shader compilation failed: no output blob".to_string())
}

/// Root signature for UI draws: root CBV at b0, the font SRV table at t1,
/// a static linear-wrap sampler at s2.
pub unsafe fn create_root_signature(device: &ID3D12Device) -> StdResult<ID3D12RootSignature, String> {
    let srv_range = D3D12_DESCRIPTOR_RANGE {
        RangeType: D3D12_DESCRIPTOR_RANGE_TYPE_SRV,
        NumDescriptors: 1,
        BaseShaderRegister: 1,
        RegisterSpace: 0,
        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
    };

    let root_parameters = [
        D3D12_ROOT_PARAMETER {
            ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
            Anonymous: D3D12_ROOT_PARAMETER_0 {
                Descriptor: D3D12_ROOT_DESCRIPTOR {
                    ShaderRegister: 0,
                    RegisterSpace: 0,
                },
            },
            ShaderVisibility: D3D12_SHADER_VISIBILITY_VERTEX,
        },
        D3D12_ROOT_PARAMETER {
            ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
            Anonymous: D3D12_ROOT_PARAMETER_0 {
                DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                    NumDescriptorRanges: 1,
                    pDescriptorRanges: &srv_range,
                },
            },
            ShaderVisibility: D3D12_SHADER_VISIBILITY_PIXEL,
        },
    ];

    let static_sampler = D3D12_STATIC_SAMPLER_DESC {
        Filter: D3D12_FILTER_MIN_MAG_MIP_LINEAR,
        AddressU: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressV: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        AddressW: D3D12_TEXTURE_ADDRESS_MODE_WRAP,
        ComparisonFunc: D3D12_COMPARISON_FUNC_ALWAYS,
        ShaderRegister: 2,
        RegisterSpace: 0,
        ShaderVisibility: D3D12_SHADER_VISIBILITY_PIXEL,
        ..Default::default()
    };

    let root_sig_desc = D3D12_ROOT_SIGNATURE_DESC {
        NumParameters: root_parameters.len() as u32,
        pParameters: root_parameters.as_ptr(),
        NumStaticSamplers: 1,
        pStaticSamplers: &static_sampler,
        Flags: D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT,
    };

    let mut signature_blob: Option<ID3DBlob> = None;
    let mut error_blob: Option<ID3DBlob> = None;

    D3D12SerializeRootSignature(
        &root_sig_desc,
        D3D_ROOT_SIGNATURE_VERSION_1,
        &mut signature_blob,
        Some(&mut error_blob),
    )
    .map_err(|e| format!("SerializeRootSignature failed: {:?}", e))?;

    let signature_blob =
        signature_blob.ok_or_else(|| "SerializeRootSignature returned no blob".to_string())?;

    let root_signature: ID3D12RootSignature = device
        .CreateRootSignature(
            0,
            std::slice::from_raw_parts(
                signature_blob.GetBufferPointer() as *const u8,
                signature_blob.GetBufferSize(),
            ),
        )
        .map_err(|e| format!("CreateRootSignature failed: {:?}", e))?;

    Ok(root_signature)
}
