//! Vulkan backend - renders UI geometry via ash into host-owned frames
//!
//! The host owns instance, device, swapchain and the per-frame command
//! buffer. This backend owns only what drawing needs: render pass, pipeline,
//! font texture, per-slot geometry buffers and the cached per-back-buffer
//! framebuffers. Back buffers arrive as raw `VkImage` handles; image view
//! and framebuffer for a swapchain slot are created on first use and
//! recreated when the handle in that slot changes.

use ash::vk;
use ash::vk::Handle;

use super::resources;
use crate::backend::shaders;
use crate::backend::{BackBufferHandle, CommandRecorder, RenderApi, RenderBackend, TargetCache};
use crate::draw::DrawData;

/// Device objects the host hands over at context creation. The host keeps
/// ownership; everything here must outlive the backend.
pub struct VulkanDeviceDesc {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub back_buffer_format: vk::Format,
}

/// Per-back-buffer render target: view over the host's swapchain image plus
/// the framebuffer binding it to the UI render pass.
pub struct VulkanTarget {
    pub image_view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
}

impl VulkanTarget {
    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_framebuffer(self.framebuffer, None);
        device.destroy_image_view(self.image_view, None);
    }
}

/// Host-visible geometry buffers for one swapchain slot. Safe to rewrite
/// once the swapchain has cycled back to the slot.
#[derive(Default)]
struct GeometrySlot {
    vertex_buffer: vk::Buffer,
    vertex_memory: vk::DeviceMemory,
    vertex_capacity: vk::DeviceSize,
    index_buffer: vk::Buffer,
    index_memory: vk::DeviceMemory,
    index_capacity: vk::DeviceSize,
}

impl GeometrySlot {
    unsafe fn destroy(&mut self, device: &ash::Device) {
        if self.vertex_buffer != vk::Buffer::null() {
            device.destroy_buffer(self.vertex_buffer, None);
            device.free_memory(self.vertex_memory, None);
        }
        if self.index_buffer != vk::Buffer::null() {
            device.destroy_buffer(self.index_buffer, None);
            device.free_memory(self.index_memory, None);
        }
        *self = Self::default();
    }
}

const INITIAL_VERTEX_CAPACITY: vk::DeviceSize = 64 * 1024;
const INITIAL_INDEX_CAPACITY: vk::DeviceSize = 16 * 1024;

pub struct VulkanBackend {
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    render_pass: vk::RenderPass,
    back_buffer_format: vk::Format,

    descriptor_set_layout: vk::DescriptorSetLayout,
    descriptor_pool: vk::DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    pipeline_layout: vk::PipelineLayout,
    pipeline: vk::Pipeline,
    sampler: vk::Sampler,

    uniform_buffer: vk::Buffer,
    uniform_memory: vk::DeviceMemory,

    font_texture: vk::Image,
    font_texture_memory: vk::DeviceMemory,
    font_texture_view: vk::ImageView,
    font_staging: vk::Buffer,
    font_staging_memory: vk::DeviceMemory,
    font_extent: vk::Extent2D,
    font_uploaded: bool,

    geometry: [GeometrySlot; crate::backend::BACK_BUFFER_COUNT],
    targets: TargetCache<VulkanTarget>,
}

use shaders::Transform;

impl VulkanBackend {
    /// Create the backend against host-owned device objects.
    ///
    /// # Safety
    /// `desc` handles must be valid; `font_pixels` is `font_width *
    /// font_height` RGBA32 texels uploaded on the first `render`.
    pub unsafe fn new(
        desc: VulkanDeviceDesc,
        font_pixels: &[u8],
        font_width: u32,
        font_height: u32,
    ) -> Result<Self, String> {
        let VulkanDeviceDesc {
            instance,
            physical_device,
            device,
            back_buffer_format,
        } = desc;

        // Render pass over the host's back buffer. The UI draws over an
        // already-rendered frame, so the attachment is not cleared; final
        // layout hands the image to present.
        let attachment = vk::AttachmentDescription::default()
            .format(back_buffer_format)
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::STORE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

        let attachment_ref = vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

        let subpass = vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&attachment_ref));

        let dependency = vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(std::slice::from_ref(&attachment))
            .subpasses(std::slice::from_ref(&subpass))
            .dependencies(std::slice::from_ref(&dependency));

        let render_pass = device
            .create_render_pass(&render_pass_info, None)
            .map_err(|e| format!("Failed to create render pass: {:?}", e))?;

        // Descriptor set layout mirroring the shader bindings.
        let bindings = [
            vk::DescriptorSetLayoutBinding::default()
                .binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::VERTEX),
            vk::DescriptorSetLayoutBinding::default()
                .binding(1)
                .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT),
            vk::DescriptorSetLayoutBinding::default()
                .binding(2)
                .descriptor_type(vk::DescriptorType::SAMPLER)
                .descriptor_count(1)
                .stage_flags(vk::ShaderStageFlags::FRAGMENT),
        ];

        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&bindings);
        let descriptor_set_layout = device
            .create_descriptor_set_layout(&layout_info, None)
            .map_err(|e| format!("Failed to create descriptor set layout: {:?}", e))?;

        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(std::slice::from_ref(&descriptor_set_layout));
        let pipeline_layout = device
            .create_pipeline_layout(&pipeline_layout_info, None)
            .map_err(|e| format!("Failed to create pipeline layout: {:?}", e))?;

        let pipeline = create_ui_pipeline(&device, render_pass, pipeline_layout)?;

        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::SAMPLED_IMAGE)
                .descriptor_count(1),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::SAMPLER)
                .descriptor_count(1),
        ];
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let descriptor_pool = device
            .create_descriptor_pool(&pool_info, None)
            .map_err(|e| format!("Failed to create descriptor pool: {:?}", e))?;

        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(descriptor_pool)
            .set_layouts(std::slice::from_ref(&descriptor_set_layout));
        let descriptor_set = device
            .allocate_descriptor_sets(&alloc_info)
            .map_err(|e| format!("Failed to allocate descriptor set: {:?}", e))?[0];

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT);
        let sampler = device
            .create_sampler(&sampler_info, None)
            .map_err(|e| format!("Failed to create sampler: {:?}", e))?;

        let (uniform_buffer, uniform_memory) = resources::create_buffer(
            &device,
            &instance,
            physical_device,
            std::mem::size_of::<Transform>() as vk::DeviceSize,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;

        let (font_texture, font_texture_memory, font_texture_view) = resources::create_texture(
            &device,
            &instance,
            physical_device,
            font_width,
            font_height,
            vk::Format::R8G8B8A8_UNORM,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
        )?;

        let (font_staging, font_staging_memory) = resources::create_buffer(
            &device,
            &instance,
            physical_device,
            font_pixels.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        resources::upload_to_memory(&device, font_staging_memory, font_pixels)?;

        let buffer_info = vk::DescriptorBufferInfo::default()
            .buffer(uniform_buffer)
            .range(std::mem::size_of::<Transform>() as vk::DeviceSize);
        let image_info = vk::DescriptorImageInfo::default()
            .image_view(font_texture_view)
            .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        let sampler_info = vk::DescriptorImageInfo::default().sampler(sampler);
        let writes = [
            vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(&buffer_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(1)
                .descriptor_type(vk::DescriptorType::SAMPLED_IMAGE)
                .image_info(std::slice::from_ref(&image_info)),
            vk::WriteDescriptorSet::default()
                .dst_set(descriptor_set)
                .dst_binding(2)
                .descriptor_type(vk::DescriptorType::SAMPLER)
                .image_info(std::slice::from_ref(&sampler_info)),
        ];
        device.update_descriptor_sets(&writes, &[]);

        log::info!(
            "Vulkan UI backend ready (format {:?}, font {}x{})",
            back_buffer_format,
            font_width,
            font_height
        );

        Ok(Self {
            instance,
            physical_device,
            device,
            render_pass,
            back_buffer_format,
            descriptor_set_layout,
            descriptor_pool,
            descriptor_set,
            pipeline_layout,
            pipeline,
            sampler,
            uniform_buffer,
            uniform_memory,
            font_texture,
            font_texture_memory,
            font_texture_view,
            font_staging,
            font_staging_memory,
            font_extent: vk::Extent2D {
                width: font_width,
                height: font_height,
            },
            font_uploaded: false,
            geometry: Default::default(),
            targets: TargetCache::new(),
        })
    }

    /// Record the one-time font upload into the host's command buffer. The
    /// staging buffer stays alive until the backend is dropped, so the copy
    /// may execute any time before then.
    unsafe fn record_font_upload(&mut self, cmd: vk::CommandBuffer) {
        let subresource = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        let to_transfer = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::empty())
            .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .old_layout(vk::ImageLayout::UNDEFINED)
            .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.font_texture)
            .subresource_range(subresource);
        self.device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::PipelineStageFlags::TRANSFER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            std::slice::from_ref(&to_transfer),
        );

        let region = vk::BufferImageCopy::default()
            .image_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .layer_count(1),
            )
            .image_extent(vk::Extent3D {
                width: self.font_extent.width,
                height: self.font_extent.height,
                depth: 1,
            });
        self.device.cmd_copy_buffer_to_image(
            cmd,
            self.font_staging,
            self.font_texture,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            std::slice::from_ref(&region),
        );

        let to_sampled = vk::ImageMemoryBarrier::default()
            .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
            .dst_access_mask(vk::AccessFlags::SHADER_READ)
            .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(self.font_texture)
            .subresource_range(subresource);
        self.device.cmd_pipeline_barrier(
            cmd,
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            std::slice::from_ref(&to_sampled),
        );

        self.font_uploaded = true;
    }

    /// Fill the slot's buffers with the frame's concatenated geometry,
    /// growing them when the frame outgrew the slot.
    unsafe fn upload_geometry(&mut self, index: u32, draw_data: &DrawData) -> Result<(), String> {
        let mut vertex_bytes = Vec::new();
        let mut index_bytes = Vec::new();
        for list in &draw_data.lists {
            vertex_bytes.extend_from_slice(bytemuck::cast_slice(&list.vertices[..]));
            index_bytes.extend_from_slice(bytemuck::cast_slice(&list.indices[..]));
        }
        if vertex_bytes.is_empty() {
            return Ok(());
        }

        let slot = &mut self.geometry[index as usize];
        if (vertex_bytes.len() as vk::DeviceSize) > slot.vertex_capacity {
            if slot.vertex_buffer != vk::Buffer::null() {
                self.device.destroy_buffer(slot.vertex_buffer, None);
                self.device.free_memory(slot.vertex_memory, None);
            }
            let capacity = (vertex_bytes.len() as vk::DeviceSize)
                .next_power_of_two()
                .max(INITIAL_VERTEX_CAPACITY);
            let (buffer, memory) = resources::create_buffer(
                &self.device,
                &self.instance,
                self.physical_device,
                capacity,
                vk::BufferUsageFlags::VERTEX_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            slot.vertex_buffer = buffer;
            slot.vertex_memory = memory;
            slot.vertex_capacity = capacity;
        }
        if (index_bytes.len() as vk::DeviceSize) > slot.index_capacity {
            if slot.index_buffer != vk::Buffer::null() {
                self.device.destroy_buffer(slot.index_buffer, None);
                self.device.free_memory(slot.index_memory, None);
            }
            let capacity = (index_bytes.len() as vk::DeviceSize)
                .next_power_of_two()
                .max(INITIAL_INDEX_CAPACITY);
            let (buffer, memory) = resources::create_buffer(
                &self.device,
                &self.instance,
                self.physical_device,
                capacity,
                vk::BufferUsageFlags::INDEX_BUFFER,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            slot.index_buffer = buffer;
            slot.index_memory = memory;
            slot.index_capacity = capacity;
        }

        resources::upload_to_memory(&self.device, slot.vertex_memory, &vertex_bytes)?;
        resources::upload_to_memory(&self.device, slot.index_memory, &index_bytes)?;
        Ok(())
    }

    unsafe fn update_projection(&self, draw_data: &DrawData) -> Result<(), String> {
        let transform = shaders::ortho_projection(draw_data);
        resources::upload_to_memory(
            &self.device,
            self.uniform_memory,
            bytemuck::bytes_of(&transform),
        )
    }
}

impl RenderBackend for VulkanBackend {
    fn api(&self) -> RenderApi {
        RenderApi::Vulkan
    }

    fn name(&self) -> &str {
        "Vulkan"
    }

    fn api_payload(&self) -> u64 {
        self.render_pass.as_raw()
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

        let cmd = vk::CommandBuffer::from_raw(recorder.0);
        let image = vk::Image::from_raw(back_buffer.0);

        unsafe {
            if !self.font_uploaded {
                self.record_font_upload(cmd);
            }
            self.upload_geometry(index, draw_data)?;
            self.update_projection(draw_data)?;

            let device = &self.device;
            let render_pass = self.render_pass;
            let format = self.back_buffer_format;
            let target = self.targets.resolve(index, back_buffer, |_, displaced| {
                if let Some(old) = displaced {
                    log::info!("back buffer {} changed, recreating render target", index);
                    old.destroy(device);
                }
                let view_info = vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });
                let image_view = device
                    .create_image_view(&view_info, None)
                    .map_err(|e| format!("Failed to create back-buffer view: {:?}", e))?;
                let fb_info = vk::FramebufferCreateInfo::default()
                    .render_pass(render_pass)
                    .attachments(std::slice::from_ref(&image_view))
                    .width(fb_width)
                    .height(fb_height)
                    .layers(1);
                let framebuffer = device.create_framebuffer(&fb_info, None).map_err(|e| {
                    device.destroy_image_view(image_view, None);
                    format!("Failed to create framebuffer: {:?}", e)
                })?;
                Ok::<VulkanTarget, String>(VulkanTarget {
                    image_view,
                    framebuffer,
                })
            })?;
            let framebuffer = target.framebuffer;

            let begin_info = vk::RenderPassBeginInfo::default()
                .render_pass(render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: vk::Extent2D {
                        width: fb_width,
                        height: fb_height,
                    },
                });
            self.device
                .cmd_begin_render_pass(cmd, &begin_info, vk::SubpassContents::INLINE);

            let slot = &self.geometry[index as usize];
            if draw_data.vertex_count > 0 {
                self.device
                    .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
                self.device.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    self.pipeline_layout,
                    0,
                    std::slice::from_ref(&self.descriptor_set),
                    &[],
                );
                self.device
                    .cmd_bind_vertex_buffers(cmd, 0, &[slot.vertex_buffer], &[0]);
                self.device
                    .cmd_bind_index_buffer(cmd, slot.index_buffer, 0, vk::IndexType::UINT32);
                let viewport = vk::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: fb_width as f32,
                    height: fb_height as f32,
                    min_depth: 0.0,
                    max_depth: 1.0,
                };
                self.device
                    .cmd_set_viewport(cmd, 0, std::slice::from_ref(&viewport));
            }

            let clip_off = draw_data.display_pos;
            let clip_scale = draw_data.framebuffer_scale;
            let mut global_vtx = 0i32;
            let mut global_idx = 0u32;
            for list in &draw_data.lists {
                let mut first_index = global_idx;
                for command in &list.commands {
                    if let Some(callback) = &command.callback {
                        callback(draw_data, command);
                        continue;
                    }

                    let x1 = ((command.clip_rect.x - clip_off.x) * clip_scale.x).max(0.0);
                    let y1 = ((command.clip_rect.y - clip_off.y) * clip_scale.y).max(0.0);
                    let x2 = ((command.clip_rect.z - clip_off.x) * clip_scale.x)
                        .min(fb_width as f32);
                    let y2 = ((command.clip_rect.w - clip_off.y) * clip_scale.y)
                        .min(fb_height as f32);
                    if x2 <= x1 || y2 <= y1 {
                        first_index += command.element_count;
                        continue;
                    }

                    let scissor = vk::Rect2D {
                        offset: vk::Offset2D {
                            x: x1 as i32,
                            y: y1 as i32,
                        },
                        extent: vk::Extent2D {
                            width: (x2 - x1) as u32,
                            height: (y2 - y1) as u32,
                        },
                    };
                    self.device
                        .cmd_set_scissor(cmd, 0, std::slice::from_ref(&scissor));
                    self.device.cmd_draw_indexed(
                        cmd,
                        command.element_count,
                        1,
                        first_index,
                        global_vtx,
                        0,
                    );
                    first_index += command.element_count;
                }
                global_idx += list.indices.len() as u32;
                global_vtx += list.vertices.len() as i32;
            }

            self.device.cmd_end_render_pass(cmd);
        }
        Ok(())
    }

    fn invalidate_device_objects(&mut self) {
        let stale: Vec<VulkanTarget> = self.targets.drain().collect();
        log::info!("invalidating {} cached render targets", stale.len());
        for target in stale {
            unsafe { target.destroy(&self.device) };
        }
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            self.invalidate_device_objects();
            for slot in &mut self.geometry {
                slot.destroy(&self.device);
            }
            self.device.destroy_buffer(self.font_staging, None);
            self.device.free_memory(self.font_staging_memory, None);
            self.device.destroy_image_view(self.font_texture_view, None);
            self.device.destroy_image(self.font_texture, None);
            self.device.free_memory(self.font_texture_memory, None);
            self.device.destroy_buffer(self.uniform_buffer, None);
            self.device.free_memory(self.uniform_memory, None);
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_pipeline(self.pipeline, None);
            self.device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            self.device
                .destroy_descriptor_pool(self.descriptor_pool, None);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_set_layout, None);
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

unsafe fn create_ui_pipeline(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    layout: vk::PipelineLayout,
) -> Result<vk::Pipeline, String> {
    let spirv = shaders::compile_wgsl_to_spirv(shaders::UI_SHADER_WGSL)?;
    let module = device
        .create_shader_module(&vk::ShaderModuleCreateInfo::default().code(&spirv), None)
        .map_err(|e| format!("Shader module creation failed: {:?}", e))?;

    let entry_vs = std::ffi::CStr::from_bytes_with_nul(b"vs_main\0")
        .map_err(|e| format!("{:?}", e))?;
    let entry_fs = std::ffi::CStr::from_bytes_with_nul(b"fs_main\0")
        .map_err(|e| format!("{:?}", e))?;

    let stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(module)
            .name(entry_vs),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(module)
            .name(entry_fs),
    ];

    let vertex_binding = [vk::VertexInputBindingDescription::default()
        .binding(0)
        .stride(std::mem::size_of::<crate::draw::DrawVertex>() as u32)
        .input_rate(vk::VertexInputRate::VERTEX)];
    let vertex_attrs = [
        vk::VertexInputAttributeDescription::default()
            .location(0)
            .binding(0)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(0),
        vk::VertexInputAttributeDescription::default()
            .location(1)
            .binding(0)
            .format(vk::Format::R32G32_SFLOAT)
            .offset(8),
        vk::VertexInputAttributeDescription::default()
            .location(2)
            .binding(0)
            .format(vk::Format::R8G8B8A8_UNORM)
            .offset(16),
    ];

    let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
        .vertex_binding_descriptions(&vertex_binding)
        .vertex_attribute_descriptions(&vertex_attrs);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST);
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewport_count(1)
        .scissor_count(1);
    let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::NONE)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE);
    let multisample = vk::PipelineMultisampleStateCreateInfo::default()
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);
    let color_blend_attachment = [vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .alpha_blend_op(vk::BlendOp::ADD)];
    let color_blend =
        vk::PipelineColorBlendStateCreateInfo::default().attachments(&color_blend_attachment);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_info =
        vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisample)
        .color_blend_state(&color_blend)
        .dynamic_state(&dynamic_info)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipeline = device
        .create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        .map_err(|e| format!("Graphics pipeline creation failed: {:?}", e))?[0];

    device.destroy_shader_module(module, None);

    Ok(pipeline)
}
