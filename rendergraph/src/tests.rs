//! End-to-end scenarios (spec.md §8) against a mocked backend.
//!
//! There is no real device behind these tests (spec.md §1 Non-goal: "it
//! does not perform GPU-side computation itself"), so pass callbacks below
//! don't record real `vkCmd*` calls through `MockCommandBuffer` at all —
//! they close directly over `Rc<RefCell<Vec<u32>>>` cells standing in for
//! device memory, the same way a pass callback would mutate a real
//! resource through a bound handle, and the test asserts on those cells
//! after `submit`. `MockCommandBuffer`/`MockAllocator` exist only so the
//! executor (`executor.rs`) has a concrete `CommandBuffer`/`Allocator` to
//! hand callbacks; their methods are otherwise unexercised here.

use crate::allocator::*;
use crate::arena::ConstValue;
use crate::attachment::{BufferResource, ImageAttachment};
use crate::command_buffer::{CommandBuffer, DispatchParams, DrawIndexedParams, DrawParams};
use crate::domain::Domain;
use crate::error::{Error, GraphError, InvalidState};
use crate::executor::CommandBufferSource;
use crate::options::CompileOptions;
use crate::pass::{self, ArgSpec, ResultSpec};
use crate::types::{Access, PassCallback, ScalarKind};
use crate::value::Context;
use ash::vk;
use std::cell::RefCell;
use std::rc::Rc;

mod mock {
    use super::*;

    pub struct MockCommandBuffer {
        pub domain: Domain,
    }

    impl CommandBuffer for MockCommandBuffer {
        fn set_viewport(&mut self, _first: u32, _viewports: &[vk::Viewport]) {}
        fn set_scissor(&mut self, _first: u32, _scissors: &[vk::Rect2D]) {}

        fn bind_graphics_pipeline(&mut self, _pipeline: vk::Pipeline) {}
        fn bind_compute_pipeline(&mut self, _pipeline: vk::Pipeline) {}

        fn bind_vertex_buffer(&mut self, _binding: u32, _buffer: vk::Buffer, _offset: u64) {}
        fn bind_index_buffer(&mut self, _buffer: vk::Buffer, _offset: u64, _index_type: vk::IndexType) {}

        fn bind_buffer(&mut self, _set: u32, _binding: u32, _buffer: vk::Buffer, _offset: u64, _range: u64) {}
        fn bind_image(&mut self, _set: u32, _binding: u32, _view: vk::ImageView, _layout: vk::ImageLayout) {}
        fn bind_sampler(&mut self, _set: u32, _binding: u32, _sampler: vk::Sampler) {}
        fn bind_persistent(&mut self, _set: u32, _descriptor_set: vk::DescriptorSet) {}

        fn push_constants(&mut self, _stage_flags: vk::ShaderStageFlags, _offset: u32, _data: &[u8]) {}

        fn draw(&mut self, _params: DrawParams) {}
        fn draw_indexed(&mut self, _params: DrawIndexedParams) {}
        fn dispatch(&mut self, _params: DispatchParams) {}
        fn dispatch_invocations_per_pixel(&mut self, _width: u32, _height: u32, _local_size_x: u32, _local_size_y: u32) {}

        fn copy_buffer(&mut self, _src: vk::Buffer, _dst: vk::Buffer, _regions: &[vk::BufferCopy]) {}
        fn copy_buffer_to_image(&mut self, _src: vk::Buffer, _dst: vk::Image, _regions: &[vk::BufferImageCopy]) {}
        fn copy_image_to_buffer(&mut self, _src: vk::Image, _dst: vk::Buffer, _regions: &[vk::BufferImageCopy]) {}

        fn clear_image(&mut self, _image: vk::Image, _color: vk::ClearColorValue) {}
        fn blit_image(&mut self, _src: vk::Image, _dst: vk::Image, _regions: &[vk::ImageBlit], _filter: vk::Filter) {}
        fn resolve_image(&mut self, _src: vk::Image, _dst: vk::Image, _regions: &[vk::ImageResolve]) {}

        fn fill_buffer(&mut self, _buffer: vk::Buffer, _offset: u64, _size: u64, _data: u32) {}
        fn update_buffer(&mut self, _buffer: vk::Buffer, _offset: u64, _data: &[u8]) {}

        fn set_rasterization(&mut self, _state: vk::PipelineRasterizationStateCreateInfo) {}
        fn set_color_blend(&mut self, _attachment: u32, _state: vk::PipelineColorBlendAttachmentState) {}
        fn broadcast_color_blend(&mut self, _state: vk::PipelineColorBlendAttachmentState) {}
        fn set_depth_stencil(&mut self, _state: vk::PipelineDepthStencilStateCreateInfo) {}
        fn set_dynamic_state(&mut self, _states: &[vk::DynamicState]) {}
        fn set_attachmentless_framebuffer(&mut self, _extent: vk::Extent2D, _samples: vk::SampleCountFlags) {}

        fn get_resource_image_attachment(&self, _node: crate::arena::NodeId) -> Option<(vk::ImageView, vk::ImageLayout)> {
            None
        }

        fn get_scheduled_domain(&self) -> Domain {
            self.domain
        }
    }

    /// Hands out a fresh `MockCommandBuffer` tagged with the requested
    /// domain; records nothing, since every scenario below observes its
    /// effects through the closures captured in each pass's callback
    /// instead.
    pub struct MockCommandBufferSource;

    impl CommandBufferSource for MockCommandBufferSource {
        fn command_buffer_for(&mut self, domain: Domain) -> crate::error::Result<Box<dyn CommandBuffer>> {
            Ok(Box::new(MockCommandBuffer { domain }))
        }
    }

    /// Every `allocate_*` call just hands back `len()` null handles; no
    /// scenario here inspects them, only the `Ref`/`Binding` plumbing that
    /// would, in a real backend, resolve to these.
    pub struct MockAllocator;

    impl Allocator for MockAllocator {
        fn allocate_buffers(&self, create_infos: &[BufferCreateInfo]) -> crate::error::Result<Vec<vk::Buffer>> {
            Ok(vec![vk::Buffer::null(); create_infos.len()])
        }
        fn deallocate_buffers(&self, _buffers: &[vk::Buffer]) {}

        fn allocate_images(&self, create_infos: &[ImageCreateInfo]) -> crate::error::Result<Vec<vk::Image>> {
            Ok(vec![vk::Image::null(); create_infos.len()])
        }
        fn deallocate_images(&self, _images: &[vk::Image]) {}

        fn allocate_image_views(&self, create_infos: &[ImageViewCreateInfo]) -> crate::error::Result<Vec<vk::ImageView>> {
            Ok(vec![vk::ImageView::null(); create_infos.len()])
        }
        fn deallocate_image_views(&self, _views: &[vk::ImageView]) {}

        fn allocate_framebuffers(&self, create_infos: &[FramebufferCreateInfo]) -> crate::error::Result<Vec<vk::Framebuffer>> {
            Ok(vec![vk::Framebuffer::null(); create_infos.len()])
        }
        fn deallocate_framebuffers(&self, _framebuffers: &[vk::Framebuffer]) {}

        fn allocate_render_passes(&self, create_infos: &[RenderPassCreateInfo]) -> crate::error::Result<Vec<vk::RenderPass>> {
            Ok(vec![vk::RenderPass::null(); create_infos.len()])
        }
        fn deallocate_render_passes(&self, _render_passes: &[vk::RenderPass]) {}

        fn allocate_command_buffers(&self, create_infos: &[CommandBufferCreateInfo]) -> crate::error::Result<Vec<vk::CommandBuffer>> {
            Ok(vec![vk::CommandBuffer::null(); create_infos.len()])
        }
        fn deallocate_command_buffers(&self, _command_buffers: &[vk::CommandBuffer]) {}

        fn allocate_descriptor_sets(&self, create_infos: &[DescriptorSetCreateInfo]) -> crate::error::Result<Vec<vk::DescriptorSet>> {
            Ok(vec![vk::DescriptorSet::null(); create_infos.len()])
        }
        fn allocate_persistent_descriptor_sets(
            &self,
            create_infos: &[DescriptorSetCreateInfo],
        ) -> crate::error::Result<Vec<vk::DescriptorSet>> {
            Ok(vec![vk::DescriptorSet::null(); create_infos.len()])
        }
        fn deallocate_descriptor_sets(&self, _sets: &[vk::DescriptorSet]) {}

        fn allocate_timestamp_queries(&self, count: u32) -> crate::error::Result<Vec<vk::QueryPool>> {
            Ok(vec![vk::QueryPool::null(); count as usize])
        }
        fn deallocate_timestamp_queries(&self, _pools: &[vk::QueryPool]) {}

        fn allocate_semaphores(&self, count: u32) -> crate::error::Result<Vec<vk::Semaphore>> {
            Ok(vec![vk::Semaphore::null(); count as usize])
        }
        fn deallocate_semaphores(&self, _semaphores: &[vk::Semaphore]) {}

        fn allocate_fences(&self, count: u32) -> crate::error::Result<Vec<vk::Fence>> {
            Ok(vec![vk::Fence::null(); count as usize])
        }
        fn deallocate_fences(&self, _fences: &[vk::Fence]) {}

        fn allocate_virtual_address_spaces(&self, count: u32) -> crate::error::Result<Vec<u64>> {
            Ok(vec![0u64; count as usize])
        }
        fn allocate_virtual_allocations(&self, sizes: &[u64]) -> crate::error::Result<Vec<u64>> {
            Ok(vec![0u64; sizes.len()])
        }
        fn deallocate_virtual_allocations(&self, _handles: &[u64]) {}

        fn wait_sync_points(&self, _points: &[SyncPoint]) -> crate::error::Result<()> {
            Ok(())
        }
    }
}

use mock::{MockAllocator, MockCommandBufferSource};

/// spec.md §8 scenario 1 "Triangle clear": clear a declared image to a
/// known color, then download it, and check every texel came back.
#[test]
fn triangle_clear() {
    let ctx = Context::new();
    let img = ctx.declare_image();
    let image_ty = ctx.module().borrow().image_attachment_ty;

    let extent = {
        let mut m = ctx.module().borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        m.new_constant(u32_ty, ConstValue::Extent3D { width: 2, height: 2, depth: 1 })
    };
    img.set_size(extent);

    let memory = Rc::new(RefCell::new(vec![0u32; 4]));
    let mem_for_clear = memory.clone();
    let clear_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        for v in mem_for_clear.borrow_mut().iter_mut() {
            *v = 5;
        }
        Ok(())
    });
    let cleared = {
        let mut m = ctx.module().borrow_mut();
        let clear_pass = pass::make_pass(
            &mut m,
            "clear",
            Domain::Graphics,
            &[ArgSpec { ty: image_ty, access: Access::COLOR_WRITE }],
            &[ResultSpec { ty: image_ty, access: Access::COLOR_WRITE, aliases: Some(0) }],
            clear_cb,
        )
        .unwrap();
        clear_pass.call(&mut m, &[img.ref_()]).unwrap()[0]
    };

    let output = Rc::new(RefCell::new(vec![0u32; 4]));
    let output_for_download = output.clone();
    let mem_for_download = memory.clone();
    let download_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        *output_for_download.borrow_mut() = mem_for_download.borrow().clone();
        Ok(())
    });
    {
        let mut m = ctx.module().borrow_mut();
        let download_pass = pass::make_pass(
            &mut m,
            "download",
            Domain::Transfer,
            &[ArgSpec { ty: image_ty, access: Access::TRANSFER_READ }],
            &[],
            download_cb,
        )
        .unwrap();
        download_pass.call(&mut m, &[cleared]).unwrap();
    }

    let allocator = mock::MockAllocator;
    let mut commands = MockCommandBufferSource;
    img.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap();

    assert_eq!(*output.borrow(), vec![5, 5, 5, 5]);
}

/// spec.md §8 scenario 2 "Fill-then-read": a transient buffer written by
/// one pass and read back by a second, chained through the write's
/// aliased result.
#[test]
fn fill_then_read() {
    let ctx = Context::new();
    let buf = ctx.declare_buffer();
    let buffer_ty = ctx.module().borrow().buffer_resource_ty;

    let size = {
        let mut m = ctx.module().borrow_mut();
        let u64_ty = m.types.make_scalar(ScalarKind::Unsigned, 64);
        m.new_constant(u64_ty, ConstValue::U64(16))
    };
    buf.set_size(size);

    let memory = Rc::new(RefCell::new(vec![0u32; 4]));
    let mem_for_fill = memory.clone();
    let fill_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        for (i, v) in mem_for_fill.borrow_mut().iter_mut().enumerate() {
            *v = i as u32 + 1;
        }
        Ok(())
    });
    let filled = {
        let mut m = ctx.module().borrow_mut();
        let fill_pass = pass::make_pass(
            &mut m,
            "fill",
            Domain::Transfer,
            &[ArgSpec { ty: buffer_ty, access: Access::TRANSFER_WRITE }],
            &[ResultSpec { ty: buffer_ty, access: Access::TRANSFER_WRITE, aliases: Some(0) }],
            fill_cb,
        )
        .unwrap();
        fill_pass.call(&mut m, &[buf.ref_()]).unwrap()[0]
    };

    let output = Rc::new(RefCell::new(vec![0u32; 4]));
    let output_for_read = output.clone();
    let mem_for_read = memory.clone();
    let read_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        *output_for_read.borrow_mut() = mem_for_read.borrow().clone();
        Ok(())
    });
    {
        let mut m = ctx.module().borrow_mut();
        let read_pass = pass::make_pass(
            &mut m,
            "read",
            Domain::Transfer,
            &[ArgSpec { ty: buffer_ty, access: Access::TRANSFER_READ }],
            &[],
            read_cb,
        )
        .unwrap();
        read_pass.call(&mut m, &[filled]).unwrap();
    }

    let allocator = MockAllocator;
    let mut commands = MockCommandBufferSource;
    buf.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap();

    assert_eq!(*output.borrow(), vec![1, 2, 3, 4]);
}

/// spec.md §8 scenario 3 "Dual-queue copy": a buffer written on the
/// transfer domain and read on the graphics domain, forcing the scheduler
/// to splice a cross-domain handoff between the two `CALL`s.
#[test]
fn dual_queue_copy() {
    let ctx = Context::new();
    let buf = ctx.declare_buffer();
    let buffer_ty = ctx.module().borrow().buffer_resource_ty;

    let size = {
        let mut m = ctx.module().borrow_mut();
        let u64_ty = m.types.make_scalar(ScalarKind::Unsigned, 64);
        m.new_constant(u64_ty, ConstValue::U64(16))
    };
    buf.set_size(size);

    let memory = Rc::new(RefCell::new(vec![0u32; 4]));
    let mem_for_fill = memory.clone();
    let fill_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        for v in mem_for_fill.borrow_mut().iter_mut() {
            *v = 7;
        }
        Ok(())
    });
    let filled = {
        let mut m = ctx.module().borrow_mut();
        let fill_pass = pass::make_pass(
            &mut m,
            "fill",
            Domain::Transfer,
            &[ArgSpec { ty: buffer_ty, access: Access::TRANSFER_WRITE }],
            &[ResultSpec { ty: buffer_ty, access: Access::TRANSFER_WRITE, aliases: Some(0) }],
            fill_cb,
        )
        .unwrap();
        fill_pass.call(&mut m, &[buf.ref_()]).unwrap()[0]
    };

    let output = Rc::new(RefCell::new(vec![0u32; 4]));
    let output_for_copy = output.clone();
    let mem_for_copy = memory.clone();
    let domain_seen: Rc<RefCell<Option<Domain>>> = Rc::new(RefCell::new(None));
    let domain_seen_cb = domain_seen.clone();
    let copy_cb: PassCallback = Rc::new(move |cmd, _bindings| {
        *domain_seen_cb.borrow_mut() = Some(cmd.get_scheduled_domain());
        *output_for_copy.borrow_mut() = mem_for_copy.borrow().clone();
        Ok(())
    });
    {
        let mut m = ctx.module().borrow_mut();
        // Declared Graphics even though the access itself is transfer-shaped:
        // a graphics queue can run transfer operations too (`Domain::can_execute`),
        // so no demotion kicks in and the producer/consumer domains genuinely
        // differ, which is what makes this scenario exercise `insert_splices`.
        let copy_pass = pass::make_pass(
            &mut m,
            "copy_on_graphics",
            Domain::Graphics,
            &[ArgSpec { ty: buffer_ty, access: Access::TRANSFER_READ }],
            &[],
            copy_cb,
        )
        .unwrap();
        copy_pass.call(&mut m, &[filled]).unwrap();
    }

    let allocator = MockAllocator;
    let mut commands = MockCommandBufferSource;
    buf.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap();

    assert_eq!(*output.borrow(), vec![7, 7, 7, 7]);
    assert_eq!(*domain_seen.borrow(), Some(Domain::Graphics));
}

/// spec.md §8 scenario 4 "Mip-down blit + download level 1": clear mip 0,
/// blit it down into mip 1, then download mip 1 and check it picked up
/// the blit's result.
#[test]
fn mip_down_blit_and_download() {
    let ctx = Context::new();
    let img = ctx.declare_image();
    let image_ty = ctx.module().borrow().image_attachment_ty;

    let extent = {
        let mut m = ctx.module().borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        m.new_constant(u32_ty, ConstValue::Extent3D { width: 4, height: 4, depth: 1 })
    };
    img.set_size(extent);
    img.set_mip_count(2);

    let mip0 = img.mip(0);
    let mip1 = img.mip(1);

    let mip0_memory = Rc::new(RefCell::new(vec![0u32; 4]));
    let mip0_for_clear = mip0_memory.clone();
    let clear_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        for v in mip0_for_clear.borrow_mut().iter_mut() {
            *v = 9;
        }
        Ok(())
    });
    let mip0_written = {
        let mut m = ctx.module().borrow_mut();
        let clear_pass = pass::make_pass(
            &mut m,
            "clear_mip0",
            Domain::Graphics,
            &[ArgSpec { ty: image_ty, access: Access::COLOR_WRITE }],
            &[ResultSpec { ty: image_ty, access: Access::COLOR_WRITE, aliases: Some(0) }],
            clear_cb,
        )
        .unwrap();
        clear_pass.call(&mut m, &[mip0.ref_()]).unwrap()[0]
    };

    let mip1_memory = Rc::new(RefCell::new(vec![0u32; 1]));
    let mip0_for_blit = mip0_memory.clone();
    let mip1_for_blit = mip1_memory.clone();
    let blit_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        let avg = mip0_for_blit.borrow().iter().sum::<u32>() / mip0_for_blit.borrow().len() as u32;
        mip1_for_blit.borrow_mut()[0] = avg;
        Ok(())
    });
    let mip1_written = {
        let mut m = ctx.module().borrow_mut();
        let blit_pass = pass::make_pass(
            &mut m,
            "blit_down",
            Domain::Graphics,
            &[
                ArgSpec { ty: image_ty, access: Access::TRANSFER_READ },
                ArgSpec { ty: image_ty, access: Access::TRANSFER_WRITE },
            ],
            &[ResultSpec { ty: image_ty, access: Access::TRANSFER_WRITE, aliases: Some(1) }],
            blit_cb,
        )
        .unwrap();
        blit_pass.call(&mut m, &[mip0_written, mip1.ref_()]).unwrap()[0]
    };

    let output = Rc::new(RefCell::new(vec![0u32; 1]));
    let output_for_download = output.clone();
    let mip1_for_download = mip1_memory.clone();
    let download_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        *output_for_download.borrow_mut() = mip1_for_download.borrow().clone();
        Ok(())
    });
    {
        let mut m = ctx.module().borrow_mut();
        let download_pass = pass::make_pass(
            &mut m,
            "download_mip1",
            Domain::Transfer,
            &[ArgSpec { ty: image_ty, access: Access::TRANSFER_READ }],
            &[],
            download_cb,
        )
        .unwrap();
        download_pass.call(&mut m, &[mip1_written]).unwrap();
    }

    let allocator = MockAllocator;
    let mut commands = MockCommandBufferSource;
    img.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap();

    assert_eq!(*output.borrow(), vec![9]);
}

/// spec.md §8 scenario 5 "Lift-compute doubler": a compute dispatch built
/// through `lift_compute` that doubles a buffer in place, downloaded
/// afterward through the dispatch's aliased result.
#[test]
fn lift_compute_doubler() {
    let ctx = Context::new();
    let buf = ctx.declare_buffer();
    let buffer_ty = ctx.module().borrow().buffer_resource_ty;

    let size = {
        let mut m = ctx.module().borrow_mut();
        let u64_ty = m.types.make_scalar(ScalarKind::Unsigned, 64);
        m.new_constant(u64_ty, ConstValue::U64(16))
    };
    buf.set_size(size);

    let memory = Rc::new(RefCell::new(vec![1u32, 2, 3, 4]));
    let mem_for_dispatch = memory.clone();
    let dispatch_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        for v in mem_for_dispatch.borrow_mut().iter_mut() {
            *v *= 2;
        }
        Ok(())
    });
    let doubled = {
        let mut m = ctx.module().borrow_mut();
        let x_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        let x = m.new_constant(x_ty, ConstValue::U64(4));
        let y = m.new_constant(x_ty, ConstValue::U64(1));
        let z = m.new_constant(x_ty, ConstValue::U64(1));
        let dispatch_pass = pass::lift_compute(
            &mut m,
            "double",
            &[ArgSpec { ty: buffer_ty, access: Access::COMPUTE_RW }],
            dispatch_cb,
        )
        .unwrap();
        dispatch_pass.call(&mut m, &[x, y, z, buf.ref_()]).unwrap()[0]
    };

    let output = Rc::new(RefCell::new(vec![0u32; 4]));
    let output_for_download = output.clone();
    let mem_for_download = memory.clone();
    let download_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        *output_for_download.borrow_mut() = mem_for_download.borrow().clone();
        Ok(())
    });
    {
        let mut m = ctx.module().borrow_mut();
        let download_pass = pass::make_pass(
            &mut m,
            "download",
            Domain::Transfer,
            &[ArgSpec { ty: buffer_ty, access: Access::TRANSFER_READ }],
            &[],
            download_cb,
        )
        .unwrap();
        download_pass.call(&mut m, &[doubled]).unwrap();
    }

    let allocator = MockAllocator;
    let mut commands = MockCommandBufferSource;
    buf.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap();

    assert_eq!(*output.borrow(), vec![2, 4, 6, 8]);
}

/// spec.md §8 scenario 6 "Framebuffer inference": two co-attached images
/// in one renderpass `CALL`, only one with an explicit extent — Reify
/// Inference must propagate it onto the other (spec.md §4.5).
#[test]
fn framebuffer_inference() {
    let ctx = Context::new();
    let color = ctx.declare_image();
    let resolve = ctx.declare_image();
    let image_ty = ctx.module().borrow().image_attachment_ty;

    let extent = {
        let mut m = ctx.module().borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        m.new_constant(u32_ty, ConstValue::Extent3D { width: 8, height: 4, depth: 1 })
    };
    color.set_size(extent);
    // `resolve` is left with every field unresolved; the renderpass CALL
    // below binds both as renderpass-access attachments, which is the
    // condition `passes::reify::propagate_attachment_fields` unifies on.

    let noop_cb: PassCallback = Rc::new(|_cmd, _bindings| Ok(()));
    {
        let mut m = ctx.module().borrow_mut();
        let renderpass = pass::make_pass(
            &mut m,
            "renderpass",
            Domain::Graphics,
            &[
                ArgSpec { ty: image_ty, access: Access::COLOR_WRITE },
                ArgSpec { ty: image_ty, access: Access::COLOR_RESOLVE_WRITE },
            ],
            &[],
            noop_cb,
        )
        .unwrap();
        renderpass.call(&mut m, &[color.ref_(), resolve.ref_()]).unwrap();
    }

    let allocator = MockAllocator;
    let mut commands = MockCommandBufferSource;
    color.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap();

    let m = ctx.module().borrow();
    let resolve_width = m.node(resolve.ref_().node).args[crate::attachment::FIELD_WIDTH];
    let resolve_height = m.node(resolve.ref_().node).args[crate::attachment::FIELD_HEIGHT];
    assert!(matches!(m.node(resolve_width.node).kind, crate::arena::NodeKind::Constant(ConstValue::U64(8))));
    assert!(matches!(m.node(resolve_height.node).kind, crate::arena::NodeKind::Constant(ConstValue::U64(4))));
}

/// spec.md §4.3 "First use after discard_* may be any write access" — a
/// `discard_buffer` whose very first use is a read must fail linking with
/// `UseBeforeInit` rather than silently reading undefined content.
#[test]
fn discard_then_read_is_use_before_init() {
    let ctx = Context::new();
    let buf = ctx.discard_buffer(0xdead_beef);
    let buffer_ty = ctx.module().borrow().buffer_resource_ty;

    let size = {
        let mut m = ctx.module().borrow_mut();
        let u64_ty = m.types.make_scalar(ScalarKind::Unsigned, 64);
        m.new_constant(u64_ty, ConstValue::U64(16))
    };
    let _ = size;

    let read_cb: PassCallback = Rc::new(|_cmd, _bindings| Ok(()));
    {
        let mut m = ctx.module().borrow_mut();
        let read_pass = pass::make_pass(
            &mut m,
            "read",
            Domain::Transfer,
            &[ArgSpec { ty: buffer_ty, access: Access::TRANSFER_READ }],
            &[],
            read_cb,
        )
        .unwrap();
        read_pass.call(&mut m, &[buf.ref_()]).unwrap();
    }

    let allocator = MockAllocator;
    let mut commands = MockCommandBufferSource;
    let err = buf.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap_err();
    assert_eq!(err, Error::Graph(GraphError::UseBeforeInit));
}

/// spec.md §4.10 "submit() ... Calling it twice on the same `Value` is an
/// error" (surfaced here as `InvalidState::DoubleSubmit`).
#[test]
fn double_submit_is_rejected() {
    let ctx = Context::new();
    let buf = ctx.declare_buffer();
    let buffer_ty = ctx.module().borrow().buffer_resource_ty;

    let size = {
        let mut m = ctx.module().borrow_mut();
        let u64_ty = m.types.make_scalar(ScalarKind::Unsigned, 64);
        m.new_constant(u64_ty, ConstValue::U64(4))
    };
    buf.set_size(size);

    let noop_cb: PassCallback = Rc::new(|_cmd, _bindings| Ok(()));
    {
        let mut m = ctx.module().borrow_mut();
        let touch_pass = pass::make_pass(
            &mut m,
            "touch",
            Domain::Transfer,
            &[ArgSpec { ty: buffer_ty, access: Access::TRANSFER_WRITE }],
            &[],
            noop_cb,
        )
        .unwrap();
        touch_pass.call(&mut m, &[buf.ref_()]).unwrap();
    }

    let allocator = MockAllocator;
    let mut commands = MockCommandBufferSource;
    buf.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap();
    let err = buf.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap_err();
    assert_eq!(err, Error::InvalidState(InvalidState::DoubleSubmit));
}

/// spec.md §8 testable property 6: "For disjoint mip slices written in
/// parallel, the reconvergence read observes the last write on every
/// mip." Writes land on `layer(0)` and `layer(1)` of one image via
/// disjoint slices; a later whole-resource read must see both, which
/// requires the scheduler to order both writers before the read even
/// though neither write's `Ref` is itself an argument of the read
/// (spec.md §4.7 "Reconvergence").
#[test]
fn reconvergence_observes_every_disjoint_write() {
    let ctx = Context::new();
    let img = ctx.declare_image();
    let image_ty = ctx.module().borrow().image_attachment_ty;

    let extent = {
        let mut m = ctx.module().borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        m.new_constant(u32_ty, ConstValue::Extent3D { width: 1, height: 1, depth: 1 })
    };
    img.set_size(extent);
    img.set_layer_count(2);

    let layer0 = img.layer(0);
    let layer1 = img.layer(1);

    let memory = Rc::new(RefCell::new(vec![0u32; 2]));
    let mem_for_write0 = memory.clone();
    let write0_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        mem_for_write0.borrow_mut()[0] = 11;
        Ok(())
    });
    let mem_for_write1 = memory.clone();
    let write1_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        mem_for_write1.borrow_mut()[1] = 22;
        Ok(())
    });
    {
        let mut m = ctx.module().borrow_mut();
        let write0 = pass::make_pass(
            &mut m,
            "write_layer0",
            Domain::Transfer,
            &[ArgSpec { ty: image_ty, access: Access::TRANSFER_WRITE }],
            &[ResultSpec { ty: image_ty, access: Access::TRANSFER_WRITE, aliases: Some(0) }],
            write0_cb,
        )
        .unwrap();
        write0.call(&mut m, &[layer0.ref_()]).unwrap();

        let write1 = pass::make_pass(
            &mut m,
            "write_layer1",
            Domain::Transfer,
            &[ArgSpec { ty: image_ty, access: Access::TRANSFER_WRITE }],
            &[ResultSpec { ty: image_ty, access: Access::TRANSFER_WRITE, aliases: Some(0) }],
            write1_cb,
        )
        .unwrap();
        write1.call(&mut m, &[layer1.ref_()]).unwrap();
    }

    let output = Rc::new(RefCell::new(vec![0u32; 2]));
    let output_for_read = output.clone();
    let mem_for_read = memory.clone();
    let read_cb: PassCallback = Rc::new(move |_cmd, _bindings| {
        *output_for_read.borrow_mut() = mem_for_read.borrow().clone();
        Ok(())
    });
    {
        let mut m = ctx.module().borrow_mut();
        let read_pass = pass::make_pass(
            &mut m,
            "read_whole",
            Domain::Transfer,
            &[ArgSpec { ty: image_ty, access: Access::TRANSFER_READ }],
            &[],
            read_cb,
        )
        .unwrap();
        read_pass.call(&mut m, &[img.ref_()]).unwrap();
    }

    let allocator = MockAllocator;
    let mut commands = MockCommandBufferSource;
    img.submit(&allocator, &mut commands, &CompileOptions::default()).unwrap();

    assert_eq!(*output.borrow(), vec![11, 22]);
}

/// spec.md §8 testable property 4: "Composite round-trip: for any
/// composite value constructed with members (m0...mn), SLICE(FIELD,i)
/// recovers mi byte-for-byte." Exercises `#[derive(Composite)]`
/// (`rendergraph-macros`) end to end: derive the adaptor, construct a
/// value of the derived type through `Context::declare_composite`, then
/// slice each field back out and constant-evaluate it.
#[test]
fn composite_field_round_trip() {
    use crate::Composite;

    #[derive(Composite)]
    #[allow(dead_code)]
    struct Pair {
        a: u32,
        b: u32,
    }

    let ctx = Context::new();
    let (a_ref, b_ref) = {
        let mut m = ctx.module().borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        (
            m.new_constant(u32_ty, ConstValue::U64(11)),
            m.new_constant(u32_ty, ConstValue::U64(22)),
        )
    };

    let pair = ctx.declare_composite::<Pair>(0, &[a_ref, b_ref]).unwrap();

    let field_a = pair.field(0).unwrap();
    let field_b = pair.field(1).unwrap();

    let m = ctx.module().borrow();
    assert_eq!(
        crate::passes::constant::eval(&m, field_a.ref_().node).unwrap(),
        ConstValue::U64(11)
    );
    assert_eq!(
        crate::passes::constant::eval(&m, field_b.ref_().node).unwrap(),
        ConstValue::U64(22)
    );
}
