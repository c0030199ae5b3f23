//! `Allocator` trait.
//!
//! The core never owns a device allocation itself; it only calls out to
//! this trait, the way the teacher's `CommandBuffer`/`Image`/`Buffer` types
//! are generic over a `RendererBackend`/`Backend` associated-type bundle
//! (`render/src/cmd.rs`'s `R: RendererBackend`, `api/src/lib.rs`'s
//! `Backend` trait). Resource pools, sub-allocators and the descriptor-pool
//! cache are the implementer's concern, not this crate's.

use crate::error::Result;
use ash::vk;

#[derive(Copy, Clone, Debug)]
pub struct BufferCreateInfo {
    pub size: u64,
    pub usage: vk::BufferUsageFlags,
    pub memory_usage: MemoryUsage,
}

#[derive(Copy, Clone, Debug)]
pub struct ImageCreateInfo {
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: vk::SampleCountFlags,
    pub usage: vk::ImageUsageFlags,
}

#[derive(Copy, Clone, Debug)]
pub struct ImageViewCreateInfo {
    pub image: vk::Image,
    pub format: vk::Format,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct FramebufferCreateInfo {
    pub render_pass: vk::RenderPass,
    pub attachments: [Option<vk::ImageView>; 8],
    pub attachment_count: u32,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct RenderPassCreateInfo {
    pub attachment_count: u32,
    pub samples: vk::SampleCountFlags,
}

#[derive(Copy, Clone, Debug)]
pub struct CommandBufferCreateInfo {
    pub domain: crate::domain::Domain,
}

#[derive(Copy, Clone, Debug)]
pub struct DescriptorSetCreateInfo {
    pub binding_count: u32,
}

#[derive(Copy, Clone, Debug)]
pub enum MemoryUsage {
    GpuOnly,
    CpuToGpu,
    GpuToCpu,
}

/// A `u64` value on a device timeline semaphore; `wait_sync_points` blocks
/// until every listed point has been reached.
#[derive(Copy, Clone, Debug)]
pub struct SyncPoint {
    pub semaphore: vk::Semaphore,
    pub value: u64,
}

/// Resource pools, sub-allocators, the frame/super-frame recycler and the
/// descriptor-pool cache — an external collaborator this crate never
/// implements. The executor is the only consumer inside this crate.
pub trait Allocator {
    fn allocate_buffers(&self, create_infos: &[BufferCreateInfo]) -> Result<Vec<vk::Buffer>>;
    fn deallocate_buffers(&self, buffers: &[vk::Buffer]);

    fn allocate_images(&self, create_infos: &[ImageCreateInfo]) -> Result<Vec<vk::Image>>;
    fn deallocate_images(&self, images: &[vk::Image]);

    fn allocate_image_views(&self, create_infos: &[ImageViewCreateInfo]) -> Result<Vec<vk::ImageView>>;
    fn deallocate_image_views(&self, views: &[vk::ImageView]);

    fn allocate_framebuffers(&self, create_infos: &[FramebufferCreateInfo]) -> Result<Vec<vk::Framebuffer>>;
    fn deallocate_framebuffers(&self, framebuffers: &[vk::Framebuffer]);

    fn allocate_render_passes(&self, create_infos: &[RenderPassCreateInfo]) -> Result<Vec<vk::RenderPass>>;
    fn deallocate_render_passes(&self, render_passes: &[vk::RenderPass]);

    fn allocate_command_buffers(
        &self,
        create_infos: &[CommandBufferCreateInfo],
    ) -> Result<Vec<vk::CommandBuffer>>;
    fn deallocate_command_buffers(&self, command_buffers: &[vk::CommandBuffer]);

    fn allocate_descriptor_sets(
        &self,
        create_infos: &[DescriptorSetCreateInfo],
    ) -> Result<Vec<vk::DescriptorSet>>;
    fn allocate_persistent_descriptor_sets(
        &self,
        create_infos: &[DescriptorSetCreateInfo],
    ) -> Result<Vec<vk::DescriptorSet>>;
    fn deallocate_descriptor_sets(&self, sets: &[vk::DescriptorSet]);

    fn allocate_timestamp_queries(&self, count: u32) -> Result<Vec<vk::QueryPool>>;
    fn deallocate_timestamp_queries(&self, pools: &[vk::QueryPool]);

    fn allocate_semaphores(&self, count: u32) -> Result<Vec<vk::Semaphore>>;
    fn deallocate_semaphores(&self, semaphores: &[vk::Semaphore]);

    fn allocate_fences(&self, count: u32) -> Result<Vec<vk::Fence>>;
    fn deallocate_fences(&self, fences: &[vk::Fence]);

    fn allocate_virtual_address_spaces(&self, count: u32) -> Result<Vec<u64>>;
    fn allocate_virtual_allocations(&self, sizes: &[u64]) -> Result<Vec<u64>>;
    fn deallocate_virtual_allocations(&self, handles: &[u64]);

    /// Blocks the calling thread until every listed sync point has been
    /// reached on the device. Used by the executor to recycle transient
    /// resources once a frame's signals fire (spec.md §4.9).
    fn wait_sync_points(&self, points: &[SyncPoint]) -> Result<()>;
}
