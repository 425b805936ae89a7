//! D3D12 backend - renders UI geometry into host-owned frames
//!
//! The host owns device, queue, swapchain and the per-frame command list.
//! Back buffers arrive as raw `ID3D12Resource*`; an RTV for a swapchain slot
//! is written into this backend's fixed heap slot on first use and rewritten
//! in place when the resource occupying the slot changes. The back buffer is
//! transitioned PRESENT -> RENDER_TARGET for the UI pass and back again, so
//! the host can present immediately after.

use std::mem::ManuallyDrop;

use windows::core::{Interface, PCSTR};
use windows::Win32::Foundation::RECT;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use crate::backend::shaders;
use crate::backend::{BackBufferHandle, CommandRecorder, RenderApi, RenderBackend, TargetCache};
use crate::draw::{DrawData, DrawVertex};

pub mod pipelines;
pub mod resources;

/// Device objects the host hands over at context creation.
pub struct Dx12DeviceDesc {
    pub device: ID3D12Device,
    pub back_buffer_format: DXGI_FORMAT,
}

/// Per-back-buffer render target. The descriptor lives in the backend's RTV
/// heap at the slot's fixed offset; replacing it is a plain rewrite, no GPU
/// resource to release.
pub struct Dx12Target {
    rtv: D3D12_CPU_DESCRIPTOR_HANDLE,
}

/// Upload-heap buffers for one swapchain slot. Safe to rewrite once the
/// swapchain has cycled back to the slot.
#[derive(Default)]
struct GeometrySlot {
    vertex_buffer: Option<ID3D12Resource>,
    vertex_capacity: u64,
    index_buffer: Option<ID3D12Resource>,
    index_capacity: u64,
    uniform_buffer: Option<ID3D12Resource>,
}

const INITIAL_VERTEX_CAPACITY: u64 = 64 * 1024;
const INITIAL_INDEX_CAPACITY: u64 = 16 * 1024;
const UNIFORM_SIZE: u64 = 256; // CBV alignment

pub struct Dx12Backend {
    device: ID3D12Device,
    back_buffer_format: DXGI_FORMAT,

    rtv_heap: ID3D12DescriptorHeap,
    rtv_descriptor_size: u32,
    srv_heap: ID3D12DescriptorHeap,

    root_signature: ID3D12RootSignature,
    pipeline_state: ID3D12PipelineState,

    font_texture: ID3D12Resource,
    font_staging: ID3D12Resource,
    font_extent: (u32, u32),
    font_uploaded: bool,

    geometry: [GeometrySlot; crate::backend::BACK_BUFFER_COUNT],
    targets: TargetCache<Dx12Target>,
}

impl Dx12Backend {
    /// Create the backend against the host's device.
    ///
    /// # Safety
    /// `font_pixels` is `font_width * font_height` RGBA32 texels uploaded on
    /// the first `render`.
    pub unsafe fn new(
        desc: Dx12DeviceDesc,
        font_pixels: &[u8],
        font_width: u32,
        font_height: u32,
    ) -> Result<Self, String> {
        let Dx12DeviceDesc {
            device,
            back_buffer_format,
        } = desc;

        let rtv_heap: ID3D12DescriptorHeap = device
            .CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: crate::backend::BACK_BUFFER_COUNT as u32,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_RTV,
                ..Default::default()
            })
            .map_err(|e| format!("RTV heap creation failed: {:?}", e))?;
        let rtv_descriptor_size =
            device.GetDescriptorHandleIncrementSize(D3D12_DESCRIPTOR_HEAP_TYPE_RTV);

        let srv_heap: ID3D12DescriptorHeap = device
            .CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                NumDescriptors: 1,
                Type: D3D12_DESCRIPTOR_HEAP_TYPE_CBV_SRV_UAV,
                Flags: D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE,
                ..Default::default()
            })
            .map_err(|e| format!("SRV heap creation failed: {:?}", e))?;

        let root_signature = pipelines::create_root_signature(&device)?;
        let pipeline_state =
            create_ui_pipeline(&device, &root_signature, back_buffer_format)?;

        // Font texture starts in COPY_DEST; the upload is recorded into the
        // host's command list on the first render.
        let font_texture = resources::create_texture(
            &device,
            font_width,
            font_height,
            DXGI_FORMAT_R8G8B8A8_UNORM,
            D3D12_RESOURCE_STATE_COPY_DEST,
        )
        .map_err(|e| format!("Font texture creation failed: {:?}", e))?;

        let row_pitch = (font_width * 4 + 255) & !255;
        let font_staging = resources::create_buffer(
            &device,
            (row_pitch * font_height) as u64,
            D3D12_HEAP_TYPE_UPLOAD,
            D3D12_RESOURCE_STATE_GENERIC_READ,
        )
        .map_err(|e| format!("Font staging creation failed: {:?}", e))?;
        {
            let mut ptr: *mut std::ffi::c_void = std::ptr::null_mut();
            font_staging
                .Map(0, None, Some(&mut ptr))
                .map_err(|e| format!("Font staging map failed: {:?}", e))?;
            let dest = ptr.cast::<u8>();
            for y in 0..font_height {
                std::ptr::copy_nonoverlapping(
                    font_pixels.as_ptr().add((y * font_width * 4) as usize),
                    dest.add((y * row_pitch) as usize),
                    (font_width * 4) as usize,
                );
            }
            font_staging.Unmap(0, None);
        }

        let mut srv_desc = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            ViewDimension: D3D12_SRV_DIMENSION_TEXTURE2D,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            ..Default::default()
        };
        srv_desc.Anonymous.Texture2D.MipLevels = 1;
        device.CreateShaderResourceView(
            &font_texture,
            Some(&srv_desc),
            srv_heap.GetCPUDescriptorHandleForHeapStart(),
        );

        log::info!(
            "D3D12 UI backend ready (format {:?}, font {}x{})",
            back_buffer_format,
            font_width,
            font_height
        );

        Ok(Self {
            device,
            back_buffer_format,
            rtv_heap,
            rtv_descriptor_size,
            srv_heap,
            root_signature,
            pipeline_state,
            font_texture,
            font_staging,
            font_extent: (font_width, font_height),
            font_uploaded: false,
            geometry: Default::default(),
            targets: TargetCache::new(),
        })
    }

    unsafe fn record_font_upload(&mut self, list: &ID3D12GraphicsCommandList) {
        let (width, height) = self.font_extent;
        let row_pitch = (width * 4 + 255) & !255;

        let src_loc = D3D12_TEXTURE_COPY_LOCATION {
            pResource: ManuallyDrop::new(Some(self.font_staging.clone())),
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                    Offset: 0,
                    Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                        Format: DXGI_FORMAT_R8G8B8A8_UNORM,
                        Width: width,
                        Height: height,
                        Depth: 1,
                        RowPitch: row_pitch,
                    },
                },
            },
        };
        let dst_loc = D3D12_TEXTURE_COPY_LOCATION {
            pResource: ManuallyDrop::new(Some(self.font_texture.clone())),
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                SubresourceIndex: 0,
            },
        };
        list.CopyTextureRegion(&dst_loc, 0, 0, 0, &src_loc, None);
        let _ = ManuallyDrop::into_inner(src_loc.pResource);
        let _ = ManuallyDrop::into_inner(dst_loc.pResource);

        transition(
            list,
            &self.font_texture,
            D3D12_RESOURCE_STATE_COPY_DEST,
            D3D12_RESOURCE_STATE_PIXEL_SHADER_RESOURCE,
        );

        self.font_uploaded = true;
    }

    unsafe fn upload_geometry(&mut self, index: u32, draw_data: &DrawData) -> Result<(), String> {
        let mut vertex_bytes = Vec::new();
        let mut index_bytes = Vec::new();
        for list in &draw_data.lists {
            vertex_bytes.extend_from_slice(bytemuck::cast_slice(&list.vertices[..]));
            index_bytes.extend_from_slice(bytemuck::cast_slice(&list.indices[..]));
        }

        let slot = &mut self.geometry[index as usize];
        if slot.uniform_buffer.is_none() {
            slot.uniform_buffer = Some(
                resources::create_buffer(
                    &self.device,
                    UNIFORM_SIZE,
                    D3D12_HEAP_TYPE_UPLOAD,
                    D3D12_RESOURCE_STATE_GENERIC_READ,
                )
                .map_err(|e| format!("Uniform buffer creation failed: {:?}", e))?,
            );
        }
        if let Some(uniform) = &slot.uniform_buffer {
            let transform = shaders::ortho_projection(draw_data);
            resources::write_buffer(uniform, 0, bytemuck::bytes_of(&transform))
                .map_err(|e| format!("Uniform upload failed: {:?}", e))?;
        }
        if vertex_bytes.is_empty() {
            return Ok(());
        }

        if vertex_bytes.len() as u64 > slot.vertex_capacity {
            let capacity = (vertex_bytes.len() as u64)
                .next_power_of_two()
                .max(INITIAL_VERTEX_CAPACITY);
            slot.vertex_buffer = Some(
                resources::create_buffer(
                    &self.device,
                    capacity,
                    D3D12_HEAP_TYPE_UPLOAD,
                    D3D12_RESOURCE_STATE_GENERIC_READ,
                )
                .map_err(|e| format!("Vertex buffer creation failed: {:?}", e))?,
            );
            slot.vertex_capacity = capacity;
        }
        if index_bytes.len() as u64 > slot.index_capacity {
            let capacity = (index_bytes.len() as u64)
                .next_power_of_two()
                .max(INITIAL_INDEX_CAPACITY);
            slot.index_buffer = Some(
                resources::create_buffer(
                    &self.device,
                    capacity,
                    D3D12_HEAP_TYPE_UPLOAD,
                    D3D12_RESOURCE_STATE_GENERIC_READ,
                )
                .map_err(|e| format!("Index buffer creation failed: {:?}", e))?,
            );
            slot.index_capacity = capacity;
        }

        if let Some(buffer) = &slot.vertex_buffer {
            resources::write_buffer(buffer, 0, &vertex_bytes)
                .map_err(|e| format!("Vertex upload failed: {:?}", e))?;
        }
        if let Some(buffer) = &slot.index_buffer {
            resources::write_buffer(buffer, 0, &index_bytes)
                .map_err(|e| format!("Index upload failed: {:?}", e))?;
        }
        Ok(())
    }
}

impl RenderBackend for Dx12Backend {
    fn api(&self) -> RenderApi {
        RenderApi::D3D12
    }

    fn name(&self) -> &str {
        "D3D12"
    }

    fn api_payload(&self) -> u64 {
        0
    }

    fn render(
        &mut self,
        recorder: CommandRecorder,
        back_buffer: BackBufferHandle,
        index: u32,
        draw_data: &DrawData,
    ) -> Result<(), String> {
        let fb_width = (draw_data.display_size.x * draw_data.framebuffer_scale.x) as u32;
        let fb_height = (draw_data.display_size.y * draw_data.framebuffer_scale.y) as u32;
        if fb_width == 0 || fb_height == 0 {
            return Ok(());
        }

        let raw_list = recorder.0 as *mut std::ffi::c_void;
        let raw_buffer = back_buffer.0 as *mut std::ffi::c_void;

        unsafe {
            let list = ID3D12GraphicsCommandList::from_raw_borrowed(&raw_list)
                .ok_or_else(|| "null command list".to_string())?;
            let resource = ID3D12Resource::from_raw_borrowed(&raw_buffer)
                .ok_or_else(|| "null back buffer".to_string())?;

            if !self.font_uploaded {
                self.record_font_upload(list);
            }
            self.upload_geometry(index, draw_data)?;

            let device = &self.device;
            let heap_start = self.rtv_heap.GetCPUDescriptorHandleForHeapStart();
            let descriptor_size = self.rtv_descriptor_size;
            let target = self
                .targets
                .resolve(index, back_buffer, |_, displaced| {
                    if displaced.is_some() {
                        log::info!("back buffer {} changed, rewriting render target view", index);
                    }
                    let rtv = D3D12_CPU_DESCRIPTOR_HANDLE {
                        ptr: heap_start.ptr + index as usize * descriptor_size as usize,
                    };
                    device.CreateRenderTargetView(resource, None, rtv);
                    Ok::<_, String>(Dx12Target { rtv })
                })?;
            let rtv = target.rtv;

            transition(
                list,
                resource,
                D3D12_RESOURCE_STATE_PRESENT,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
            );

            list.OMSetRenderTargets(1, Some(&rtv), false, None);

            let slot = &self.geometry[index as usize];
            if draw_data.vertex_count > 0 {
                list.SetGraphicsRootSignature(&self.root_signature);
                list.SetPipelineState(&self.pipeline_state);

                if let Some(uniform) = &slot.uniform_buffer {
                    list.SetGraphicsRootConstantBufferView(0, uniform.GetGPUVirtualAddress());
                }
                let heaps = [Some(self.srv_heap.clone())];
                list.SetDescriptorHeaps(&heaps);
                list.SetGraphicsRootDescriptorTable(
                    1,
                    self.srv_heap.GetGPUDescriptorHandleForHeapStart(),
                );

                let viewport = D3D12_VIEWPORT {
                    TopLeftX: 0.0,
                    TopLeftY: 0.0,
                    Width: fb_width as f32,
                    Height: fb_height as f32,
                    MinDepth: 0.0,
                    MaxDepth: 1.0,
                };
                list.RSSetViewports(&[viewport]);
                list.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY_TRIANGLELIST);

                if let (Some(vertex), Some(idx)) = (&slot.vertex_buffer, &slot.index_buffer) {
                    let vb_view = D3D12_VERTEX_BUFFER_VIEW {
                        BufferLocation: vertex.GetGPUVirtualAddress(),
                        SizeInBytes: (draw_data.vertex_count as usize
                            * std::mem::size_of::<DrawVertex>())
                            as u32,
                        StrideInBytes: std::mem::size_of::<DrawVertex>() as u32,
                    };
                    let ib_view = D3D12_INDEX_BUFFER_VIEW {
                        BufferLocation: idx.GetGPUVirtualAddress(),
                        SizeInBytes: draw_data.index_count * 4,
                        Format: DXGI_FORMAT_R32_UINT,
                    };
                    list.IASetVertexBuffers(0, Some(&[vb_view]));
                    list.IASetIndexBuffer(Some(&ib_view));
                }
            }

            let clip_off = draw_data.display_pos;
            let clip_scale = draw_data.framebuffer_scale;
            let mut global_vtx = 0i32;
            let mut global_idx = 0u32;
            for draw_list in &draw_data.lists {
                let mut first_index = global_idx;
                for command in &draw_list.commands {
                    if let Some(callback) = &command.callback {
                        callback(draw_data, command);
                        continue;
                    }

                    let x1 = ((command.clip_rect.x - clip_off.x) * clip_scale.x).max(0.0);
                    let y1 = ((command.clip_rect.y - clip_off.y) * clip_scale.y).max(0.0);
                    let x2 =
                        ((command.clip_rect.z - clip_off.x) * clip_scale.x).min(fb_width as f32);
                    let y2 =
                        ((command.clip_rect.w - clip_off.y) * clip_scale.y).min(fb_height as f32);
                    if x2 <= x1 || y2 <= y1 {
                        first_index += command.element_count;
                        continue;
                    }

                    let scissor = RECT {
                        left: x1 as i32,
                        top: y1 as i32,
                        right: x2 as i32,
                        bottom: y2 as i32,
                    };
                    list.RSSetScissorRects(&[scissor]);
                    list.DrawIndexedInstanced(command.element_count, 1, first_index, global_vtx, 0);
                    first_index += command.element_count;
                }
                global_idx += draw_list.indices.len() as u32;
                global_vtx += draw_list.vertices.len() as i32;
            }

            transition(
                list,
                resource,
                D3D12_RESOURCE_STATE_RENDER_TARGET,
                D3D12_RESOURCE_STATE_PRESENT,
            );
        }
        Ok(())
    }

    fn invalidate_device_objects(&mut self) {
        // RTV descriptors are rewritten in place on next use; dropping the
        // cached entries is enough.
        let stale: Vec<Dx12Target> = self.targets.drain().collect();
        log::info!("invalidating {} cached render target views", stale.len());
    }
}

/// Record a full-subresource transition barrier, releasing the reference the
/// barrier struct takes on the resource.
unsafe fn transition(
    list: &ID3D12GraphicsCommandList,
    resource: &ID3D12Resource,
    before: D3D12_RESOURCE_STATES,
    after: D3D12_RESOURCE_STATES,
) {
    let barrier = D3D12_RESOURCE_BARRIER {
        Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
        Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
        Anonymous: D3D12_RESOURCE_BARRIER_0 {
            Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                pResource: ManuallyDrop::new(Some(resource.clone())),
                Subresource: D3D12_RESOURCE_BARRIER_ALL_SUBRESOURCES,
                StateBefore: before,
                StateAfter: after,
            }),
        },
    };
    list.ResourceBarrier(std::slice::from_ref(&barrier));
    let transition = ManuallyDrop::into_inner(barrier.Anonymous.Transition);
    let _ = ManuallyDrop::into_inner(transition.pResource);
}

unsafe fn create_ui_pipeline(
    device: &ID3D12Device,
    root_signature: &ID3D12RootSignature,
    back_buffer_format: DXGI_FORMAT,
) -> Result<ID3D12PipelineState, String> {
    let hlsl = shaders::compile_wgsl_to_hlsl(shaders::UI_SHADER_WGSL)?;
    let vs = pipelines::compile_shader(&hlsl, "vs_main", "vs_5_1")?;
    let ps = pipelines::compile_shader(&hlsl, "fs_main", "ps_5_1")?;

    // Semantics as the WGSL-to-HLSL transpiler emits them for @location(n).
    let input_element_descs = [
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: PCSTR(b"LOC\0".as_ptr()),
            SemanticIndex: 0,
            Format: DXGI_FORMAT_R32G32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: 0,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: PCSTR(b"LOC\0".as_ptr()),
            SemanticIndex: 1,
            Format: DXGI_FORMAT_R32G32_FLOAT,
            InputSlot: 0,
            AlignedByteOffset: 8,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
        D3D12_INPUT_ELEMENT_DESC {
            SemanticName: PCSTR(b"LOC\0".as_ptr()),
            SemanticIndex: 2,
            Format: DXGI_FORMAT_R8G8B8A8_UNORM,
            InputSlot: 0,
            AlignedByteOffset: 16,
            InputSlotClass: D3D12_INPUT_CLASSIFICATION_PER_VERTEX_DATA,
            InstanceDataStepRate: 0,
        },
    ];

    let mut rtv_formats = [DXGI_FORMAT::default(); 8];
    rtv_formats[0] = back_buffer_format;

    let pso_desc = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
        pRootSignature: ManuallyDrop::new(Some(root_signature.clone())),
        VS: D3D12_SHADER_BYTECODE {
            pShaderBytecode: vs.GetBufferPointer(),
            BytecodeLength: vs.GetBufferSize(),
        },
        PS: D3D12_SHADER_BYTECODE {
            pShaderBytecode: ps.GetBufferPointer(),
            BytecodeLength: ps.GetBufferSize(),
        },
        RasterizerState: D3D12_RASTERIZER_DESC {
            FillMode: D3D12_FILL_MODE_SOLID,
            CullMode: D3D12_CULL_MODE_NONE,
            ..Default::default()
        },
        BlendState: D3D12_BLEND_DESC {
            RenderTarget: [
                D3D12_RENDER_TARGET_BLEND_DESC {
                    BlendEnable: true.into(),
                    SrcBlend: D3D12_BLEND_SRC_ALPHA,
                    DestBlend: D3D12_BLEND_INV_SRC_ALPHA,
                    BlendOp: D3D12_BLEND_OP_ADD,
                    SrcBlendAlpha: D3D12_BLEND_ONE,
                    DestBlendAlpha: D3D12_BLEND_INV_SRC_ALPHA,
                    BlendOpAlpha: D3D12_BLEND_OP_ADD,
                    RenderTargetWriteMask: 0x0F,
                    ..Default::default()
                },
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
                Default::default(),
            ],
            ..Default::default()
        },
        DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
            DepthEnable: false.into(),
            StencilEnable: false.into(),
            ..Default::default()
        },
        InputLayout: D3D12_INPUT_LAYOUT_DESC {
            pInputElementDescs: input_element_descs.as_ptr(),
            NumElements: input_element_descs.len() as u32,
        },
        PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE_TRIANGLE,
        NumRenderTargets: 1,
        RTVFormats: rtv_formats,
        SampleMask: u32::MAX,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        ..Default::default()
    };

    let pso = device
        .CreateGraphicsPipelineState(&pso_desc)
        .map_err(|e| format!("Graphics pipeline creation failed: {:?}", e));
    let _ = ManuallyDrop::into_inner(pso_desc.pRootSignature);
    pso
}
