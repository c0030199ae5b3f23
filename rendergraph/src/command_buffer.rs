//! `CommandBuffer` trait (spec.md §6 "CommandBuffer trait").
//!
//! Recording primitives the executor hands to user pass callbacks
//! (spec.md §1: "Command-buffer recording primitives ... external; the
//! core calls them inside user-supplied callbacks"). Parameter structs
//! follow the naming the teacher's own command stream uses
//! (`render/src/cmd.rs`'s `DrawParams`/`DrawIndexedParams`).

use crate::arena::NodeId;
use crate::domain::Domain;
use ash::vk;

#[derive(Copy, Clone, Debug)]
pub struct DrawParams {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct DrawIndexedParams {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub first_instance: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct DispatchParams {
    pub group_count_x: u32,
    pub group_count_y: u32,
    pub group_count_z: u32,
}

/// Recording primitives available inside one `CALL`'s scope. Every method
/// mirrors a `vkCmd*` entry point one-to-one; none of them are
/// implemented by this crate — only declared, so the executor (§4.9) can
/// invoke user callbacks against a concrete backend without this crate
/// knowing what that backend is.
pub trait CommandBuffer {
    fn set_viewport(&mut self, first: u32, viewports: &[vk::Viewport]);
    fn set_scissor(&mut self, first: u32, scissors: &[vk::Rect2D]);

    fn bind_graphics_pipeline(&mut self, pipeline: vk::Pipeline);
    fn bind_compute_pipeline(&mut self, pipeline: vk::Pipeline);

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: vk::Buffer, offset: u64);
    fn bind_index_buffer(&mut self, buffer: vk::Buffer, offset: u64, index_type: vk::IndexType);

    fn bind_buffer(&mut self, set: u32, binding: u32, buffer: vk::Buffer, offset: u64, range: u64);
    fn bind_image(&mut self, set: u32, binding: u32, view: vk::ImageView, layout: vk::ImageLayout);
    fn bind_sampler(&mut self, set: u32, binding: u32, sampler: vk::Sampler);
    fn bind_persistent(&mut self, set: u32, descriptor_set: vk::DescriptorSet);

    fn push_constants(&mut self, stage_flags: vk::ShaderStageFlags, offset: u32, data: &[u8]);

    fn draw(&mut self, params: DrawParams);
    fn draw_indexed(&mut self, params: DrawIndexedParams);
    fn dispatch(&mut self, params: DispatchParams);
    /// Dispatches enough groups to cover `width x height` pixels at one
    /// invocation per pixel, rounding the local workgroup size up.
    fn dispatch_invocations_per_pixel(&mut self, width: u32, height: u32, local_size_x: u32, local_size_y: u32);

    fn copy_buffer(&mut self, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]);
    fn copy_buffer_to_image(&mut self, src: vk::Buffer, dst: vk::Image, regions: &[vk::BufferImageCopy]);
    fn copy_image_to_buffer(&mut self, src: vk::Image, dst: vk::Buffer, regions: &[vk::BufferImageCopy]);

    fn clear_image(&mut self, image: vk::Image, color: vk::ClearColorValue);
    fn blit_image(&mut self, src: vk::Image, dst: vk::Image, regions: &[vk::ImageBlit], filter: vk::Filter);
    fn resolve_image(&mut self, src: vk::Image, dst: vk::Image, regions: &[vk::ImageResolve]);

    fn fill_buffer(&mut self, buffer: vk::Buffer, offset: u64, size: u64, data: u32);
    fn update_buffer(&mut self, buffer: vk::Buffer, offset: u64, data: &[u8]);

    fn set_rasterization(&mut self, state: vk::PipelineRasterizationStateCreateInfo);
    fn set_color_blend(&mut self, attachment: u32, state: vk::PipelineColorBlendAttachmentState);
    fn broadcast_color_blend(&mut self, state: vk::PipelineColorBlendAttachmentState);
    fn set_depth_stencil(&mut self, state: vk::PipelineDepthStencilStateCreateInfo);
    fn set_dynamic_state(&mut self, states: &[vk::DynamicState]);
    fn set_attachmentless_framebuffer(&mut self, extent: vk::Extent2D, samples: vk::SampleCountFlags);

    /// Resolves the concrete `vk::ImageView`/layout bound to a `Ref`
    /// resolved earlier by the link/scheduler passes, for callbacks that
    /// need the handle directly (e.g. to build a descriptor write by
    /// hand) rather than through `bind_image`.
    fn get_resource_image_attachment(&self, node: NodeId) -> Option<(vk::ImageView, vk::ImageLayout)>;

    /// The domain this command buffer was scheduled on, so a callback
    /// shared between a graphics and a compute variant of a pass can
    /// branch on it.
    fn get_scheduled_domain(&self) -> Domain;
}
