//! `Value<T>` fluent façade and `Context` (spec.md §4.3).
//!
//! Grounded the way the teacher's `frame::TaskOutputRef` wraps a raw
//! `NodeIndex` behind a small typed handle (`src/frame/mod.rs`) instead of
//! handing callers the graph index directly: `Value<T>` wraps a `Ref` plus
//! the `Rc<RefCell<Module>>` it was built against, so `mip()`/`same_size()`/
//! `submit()` read naturally left-to-right instead of threading a `&mut
//! Module` through every call site.

use crate::allocator::Allocator;
use crate::arena::{ConstValue, Module, NodeKind, Ref, SliceAxis};
use crate::attachment::{self, BufferResource, ImageAttachment};
use crate::error::{GraphError, InvalidState, Result};
use crate::executor::{self, CommandBufferSource};
use crate::options::CompileOptions;
use crate::signal::{Signal, SignalState};
use crate::types::{Access, CompositeType, ScalarKind, TypeKind, TypeId};
use log::debug;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Duration;

/// Owns the node arena a family of `Value<T>`s is built against. One
/// `Context` corresponds to one `Module` (spec.md §4.2); cloning it is
/// cheap (it's a `Rc` handle), matching the teacher's `Arc<Device>`-style
/// cheap-clone device handles threaded through `render/src/cmd.rs`.
#[derive(Clone)]
pub struct Context {
    module: Rc<RefCell<Module>>,
}

impl Context {
    pub fn new() -> Context {
        Context {
            module: Rc::new(RefCell::new(Module::new())),
        }
    }

    /// Exposes the underlying arena for callers building `CALL` nodes
    /// directly through `pass::make_pass`/`PassTemplate::call`.
    pub fn module(&self) -> Rc<RefCell<Module>> {
        self.module.clone()
    }

    /// Binds a host-owned image into the graph with a known initial
    /// access (spec.md §4.3 `acquire_*`). The resource's first use may be
    /// a read, since `initial_access` already describes valid content.
    pub fn acquire_image(&self, user_value: u64, initial_access: Access) -> Value<ImageAttachment> {
        let ty = self.module.borrow().image_attachment_ty;
        let r = self.module.borrow_mut().new_acquire(ty, user_value, initial_access);
        Value::from_ref(self.module.clone(), r, None)
    }

    /// Binds a host-owned image whose content is not preserved (spec.md
    /// §4.3 "First use after discard_* may be any write access"): the
    /// first use must be a write, or linking fails with `UseBeforeInit`.
    pub fn discard_image(&self, user_value: u64) -> Value<ImageAttachment> {
        let ty = self.module.borrow().image_attachment_ty;
        let r = self
            .module
            .borrow_mut()
            .new_acquire(ty, user_value, Access::empty());
        Value::from_ref(self.module.clone(), r, None)
    }

    pub fn acquire_buffer(&self, user_value: u64, initial_access: Access) -> Value<BufferResource> {
        let ty = self.module.borrow().buffer_resource_ty;
        let r = self.module.borrow_mut().new_acquire(ty, user_value, initial_access);
        Value::from_ref(self.module.clone(), r, None)
    }

    pub fn discard_buffer(&self, user_value: u64) -> Value<BufferResource> {
        let ty = self.module.borrow().buffer_resource_ty;
        let r = self
            .module
            .borrow_mut()
            .new_acquire(ty, user_value, Access::empty());
        Value::from_ref(self.module.clone(), r, None)
    }

    /// `acquire_next_image(swapchain)` (spec.md §6 "Surface /
    /// presentation"): the swapchain image itself is not known until the
    /// device hands it back, so this is its own node kind rather than an
    /// `ACQUIRE` with a caller-supplied handle.
    pub fn acquire_next_image(&self) -> Value<ImageAttachment> {
        let ty = self.module.borrow().image_attachment_ty;
        let r = self.module.borrow_mut().new_acquire_next_image(ty);
        Value::from_ref(self.module.clone(), r, None)
    }

    /// `enqueue_presentation(img)` (spec.md §6 "Surface / presentation"):
    /// consumes `img` and schedules present after its last use. Modeled as
    /// an ordinary host-domain `CALL` with a no-op callback rather than a
    /// new node kind — the actual `vkQueuePresentKHR` is issued by the
    /// backend outside of command-buffer recording, so this crate's only
    /// job is to order every prior use of `img` before this point (the
    /// scheduler's normal cross-domain splicing handles that).
    pub fn enqueue_presentation(&self, img: &Value<ImageAttachment>) -> Result<()> {
        let arg = crate::pass::ArgSpec {
            ty: self.module.borrow().image_attachment_ty,
            access: Access::HOST_READ,
        };
        let callback: crate::types::PassCallback = Rc::new(|_cmd, _bindings| Ok(()));
        let mut m = self.module.borrow_mut();
        let template = crate::pass::make_pass(&mut m, "present", crate::domain::Domain::Host, &[arg], &[], callback)?;
        template.call(&mut m, &[img.ref_()])?;
        Ok(())
    }

    /// Declares a brand-new transient attachment with every field left
    /// unresolved (spec.md §4.5 Reify Inference fills them in from
    /// `same_size`/`set_size`/co-attachment unification). This is the
    /// "no known aggregate" case: `BASE_SLOT` is a bare `Placeholder`.
    pub fn declare_image(&self) -> Value<ImageAttachment> {
        let mut m = self.module.borrow_mut();
        let attachment_ty = m.image_attachment_ty;
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        let mut args = vec![m.new_placeholder(attachment_ty)];
        args.extend((0..attachment::IMAGE_ATTACHMENT_FIELD_COUNT).map(|_| m.new_placeholder(u32_ty)));
        let r = m.new_construct(attachment_ty, &args);
        drop(m);
        Value::from_ref(self.module.clone(), r, None)
    }

    pub fn declare_buffer(&self) -> Value<BufferResource> {
        let mut m = self.module.borrow_mut();
        let buffer_ty = m.buffer_resource_ty;
        let u64_ty = m.types.make_scalar(ScalarKind::Unsigned, 64);
        let args = vec![m.new_placeholder(buffer_ty), m.new_placeholder(u64_ty)];
        let r = m.new_construct(buffer_ty, &args);
        drop(m);
        Value::from_ref(self.module.clone(), r, None)
    }

    /// Constructs a value of a user-defined (`#[derive(Composite)]`)
    /// aggregate type from one `Ref` per member, in declaration order
    /// (spec.md §3 "Composite" / §4.2 "for any composite value, the number
    /// of CONSTRUCT arguments equals the number of members of its type").
    /// `tag` disambiguates otherwise-identical layouts the way
    /// `Types::register_composite` documents; pass the same tag for every
    /// `declare_composite::<T>` call that should alias one interned type.
    pub fn declare_composite<T: CompositeType>(&self, tag: u64, fields: &[Ref]) -> Result<Value<T>> {
        if fields.len() != T::MEMBERS.len() {
            return Err(GraphError::IncompleteConstruct.into());
        }
        let mut m = self.module.borrow_mut();
        let member_types: Vec<TypeId> = fields.iter().map(|&r| m.result_type(r)).collect();
        let ty = m.types.register_composite::<T>(tag, &member_types)?;
        let mut args = vec![m.new_placeholder(ty)];
        args.extend_from_slice(fields);
        let r = m.new_construct(ty, &args);
        drop(m);
        Ok(Value::from_ref(self.module.clone(), r, None))
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

/// A typed handle to one node output (spec.md §4.3). `T` is a
/// zero-sized marker (`ImageAttachment`, `BufferResource`, or a
/// `#[derive(Composite)]` user type) selecting which fluent methods
/// apply; it carries no runtime representation of its own.
pub struct Value<T> {
    module: Rc<RefCell<Module>>,
    r: Ref,
    signal: Rc<Signal>,
    name: Option<&'static str>,
    _marker: PhantomData<T>,
}

impl<T> Value<T> {
    fn from_ref(module: Rc<RefCell<Module>>, r: Ref, name: Option<&'static str>) -> Value<T> {
        Value {
            module,
            r,
            signal: Rc::new(Signal::new()),
            name,
            _marker: PhantomData,
        }
    }

    pub fn ref_(&self) -> Ref {
        self.r
    }

    pub fn named(mut self, name: &'static str) -> Self {
        self.module.borrow_mut().node_mut(self.r.node).name = Some(name);
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Re-tags a value under a different marker type without emitting any
    /// IR. Used for raw pointer/handle values a pass hands back that the
    /// caller wants to keep treating as an attachment/buffer resource
    /// (spec.md §4.3 `implicit_view()`).
    pub fn implicit_view<U>(&self) -> Value<U> {
        Value::from_ref(self.module.clone(), self.r, self.name)
    }

    /// Links this value into the submission set (spec.md §4.10 "`arm()`
    /// when linked into IR"). Only needed to resubmit a `Value` built in
    /// a prior compile/frame — a fresh `Value` doesn't need it before its
    /// first `submit`/`wait`/`get`.
    pub fn def(&self) -> &Self {
        self.signal.arm();
        self
    }

    pub fn poll(&self) -> bool {
        self.signal.poll()
    }

    /// Compiles (Reify → Link → Slice/Reconvergence → Schedule) and
    /// executes the whole graph reachable from this value, without
    /// blocking beyond the (synchronous, single-threaded) execution
    /// itself — there is no real device timeline here to poll later, so
    /// the returned signal is already `HostAvailable` by the time this
    /// returns (spec.md §4.3 "submit() | compile + submit without
    /// waiting, returns signal").
    pub fn submit(
        &self,
        allocator: &dyn Allocator,
        commands: &mut dyn CommandBufferSource,
        options: &CompileOptions,
    ) -> Result<Rc<Signal>> {
        if self.signal.state() != SignalState::Disarmed {
            return Err(InvalidState::DoubleSubmit.into());
        }
        let mut module = self.module.borrow_mut();
        if options.dump_graph {
            debug!("compiling graph rooted at {:?} ({} nodes)", self.r, module.len());
        }
        let analysis = crate::passes::analyze(&mut module)?;
        let schedule = crate::scheduler::run(&mut module, &analysis)?;
        let timeline_value = executor::run(&module, &schedule, allocator, commands)?;
        self.signal.mark_submitted(timeline_value);
        self.signal.mark_host_available();
        Ok(self.signal.clone())
    }

    pub fn wait(
        &self,
        allocator: &dyn Allocator,
        commands: &mut dyn CommandBufferSource,
        options: &CompileOptions,
        timeout: Option<Duration>,
    ) -> Result<()> {
        if self.signal.state() == SignalState::Disarmed {
            self.submit(allocator, commands, options)?;
        }
        self.signal.wait(|| self.signal.poll(), timeout)
    }

    /// Blocks for completion then returns the underlying `Ref`, for
    /// callers that want to hand it to another pass after this value's
    /// graph has executed (spec.md §4.3 `get()`).
    pub fn get(
        &self,
        allocator: &dyn Allocator,
        commands: &mut dyn CommandBufferSource,
        options: &CompileOptions,
    ) -> Result<Ref> {
        self.wait(allocator, commands, options, None)?;
        Ok(self.r)
    }
}

/// Fields addressable on any composite-typed `Value` (spec.md §4.7 "SLICE
/// axis FIELD recovers member i").
impl<T: CompositeType> Value<T> {
    pub fn field(&self, index: usize) -> Result<Value<()>> {
        let mut m = self.module.borrow_mut();
        let ty = m.result_type(self.r);
        let composite_id = match m.types.kind(m.types.stripped(ty)) {
            TypeKind::Composite(cid) => *cid,
            _ => return Err(GraphError::TypeMismatch.into()),
        };
        let field_ty = m.types.composite(composite_id).members.get(index).map(|m| m.ty);
        let field_ty = match field_ty {
            Some(t) => t,
            None => return Err(GraphError::TypeMismatch.into()),
        };
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        let start = m.new_constant(u32_ty, ConstValue::U64(index as u64));
        let count = m.new_constant(u32_ty, ConstValue::U64(1));
        let r = m.new_slice(field_ty, self.r, SliceAxis::Field, start, count);
        drop(m);
        Ok(Value::from_ref(self.module.clone(), r, None))
    }
}

impl Value<ImageAttachment> {
    fn construct_node(&self) -> Ref {
        debug_assert!(
            matches!(self.module.borrow().node(self.r.node).kind, NodeKind::Construct),
            "same_size/set_size only apply to a freshly declared attachment, not an acquired one"
        );
        self.r
    }

    /// Inherits every unset field from `other`'s resolved shape (spec.md
    /// §4.5 "For a CONSTRUCT whose first argument is a known aggregate,
    /// copy non-default fields from that argument").
    pub fn same_size<U>(&self, other: &Value<U>) -> &Self {
        let node = self.construct_node().node;
        self.module.borrow_mut().node_mut(node).args[attachment::BASE_SLOT] = other.r;
        self
    }

    /// Installs a computed extent (an `Extent3D`-typed constant or
    /// `MATH_BINARY` expression) as this attachment's width/height/depth,
    /// overriding whatever `same_size` would otherwise have inherited.
    pub fn set_size(&self, extent: Ref) -> &Self {
        let node = self.construct_node().node;
        let mut m = self.module.borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        let w = m.new_get_ci(u32_ty, extent, "width");
        let h = m.new_get_ci(u32_ty, extent, "height");
        let d = m.new_get_ci(u32_ty, extent, "depth");
        m.node_mut(node).args[attachment::FIELD_WIDTH] = w;
        m.node_mut(node).args[attachment::FIELD_HEIGHT] = h;
        m.node_mut(node).args[attachment::FIELD_DEPTH] = d;
        self
    }

    /// Overrides the default `level_count = 1` (spec.md §4.5 "For renderpass
    /// attachments, `level_count` defaults to 1") for images with more than
    /// one mip, so `.mip(n)` for `n > 0` refers to a level that actually
    /// exists.
    pub fn set_mip_count(&self, count: u32) -> &Self {
        let node = self.construct_node().node;
        let mut m = self.module.borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        let c = m.new_constant(u32_ty, ConstValue::U64(count as u64));
        m.node_mut(node).args[attachment::FIELD_LEVEL_COUNT] = c;
        self
    }

    /// Same as `set_mip_count`, for `layer_count`.
    pub fn set_layer_count(&self, count: u32) -> &Self {
        let node = self.construct_node().node;
        let mut m = self.module.borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        let c = m.new_constant(u32_ty, ConstValue::U64(count as u64));
        m.node_mut(node).args[attachment::FIELD_LAYER_COUNT] = c;
        self
    }

    fn slice_axis(&self, axis: SliceAxis, start: u64, count: Option<u64>) -> Value<ImageAttachment> {
        let mut m = self.module.borrow_mut();
        let attachment_ty = m.image_attachment_ty;
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        let start_ref = m.new_constant(u32_ty, ConstValue::U64(start));
        let count_ref = match count {
            Some(c) => m.new_constant(u32_ty, ConstValue::U64(c)),
            // A Placeholder in the count slot means REMAINING (spec.md
            // §4.7); resolved to a concrete count by `slice::run`.
            None => m.new_placeholder(u32_ty),
        };
        let r = m.new_slice(attachment_ty, self.r, axis, start_ref, count_ref);
        drop(m);
        Value::from_ref(self.module.clone(), r, None)
    }

    pub fn mip(&self, level: u32) -> Value<ImageAttachment> {
        self.slice_axis(SliceAxis::Mip, level as u64, Some(1))
    }

    pub fn mips(&self, base_level: u32, count: Option<u32>) -> Value<ImageAttachment> {
        self.slice_axis(SliceAxis::Mip, base_level as u64, count.map(|c| c as u64))
    }

    pub fn layer(&self, index: u32) -> Value<ImageAttachment> {
        self.slice_axis(SliceAxis::Layer, index as u64, Some(1))
    }

    pub fn layers(&self, base_layer: u32, count: Option<u32>) -> Value<ImageAttachment> {
        self.slice_axis(SliceAxis::Layer, base_layer as u64, count.map(|c| c as u64))
    }

    fn get_named_field(&self, field: &'static str) -> Value<()> {
        let mut m = self.module.borrow_mut();
        let u32_ty = m.types.make_scalar(ScalarKind::Unsigned, 32);
        let r = m.new_get_ci(u32_ty, self.r, field);
        drop(m);
        Value::from_ref(self.module.clone(), r, None)
    }

    pub fn get_width(&self) -> Value<()> {
        self.get_named_field("width")
    }

    pub fn get_height(&self) -> Value<()> {
        self.get_named_field("height")
    }

    pub fn get_depth(&self) -> Value<()> {
        self.get_named_field("depth")
    }

    /// Projects width/height/depth out as three scalar `Value`s (spec.md
    /// §4.3 "get_size()/get_extent() | projects to a scalar Value").
    pub fn get_extent(&self) -> (Value<()>, Value<()>, Value<()>) {
        (self.get_width(), self.get_height(), self.get_depth())
    }
}

impl Value<BufferResource> {
    fn construct_node(&self) -> Ref {
        debug_assert!(
            matches!(self.module.borrow().node(self.r.node).kind, NodeKind::Construct),
            "same_size/set_size only apply to a freshly declared buffer, not an acquired one"
        );
        self.r
    }

    pub fn same_size<U>(&self, other: &Value<U>) -> &Self {
        let node = self.construct_node().node;
        self.module.borrow_mut().node_mut(node).args[attachment::BUFFER_BASE_SLOT] = other.r;
        self
    }

    pub fn set_size(&self, size: Ref) -> &Self {
        let node = self.construct_node().node;
        self.module.borrow_mut().node_mut(node).args[attachment::FIELD_BUFFER_SIZE] = size;
        self
    }

    /// `subrange(off, len)`: `len = None` takes everything after `off`
    /// (spec.md §4.7 "count = REMAINING").
    pub fn subrange(&self, offset: u64, len: Option<u64>) -> Value<BufferResource> {
        let mut m = self.module.borrow_mut();
        let buffer_ty = m.buffer_resource_ty;
        let u64_ty = m.types.make_scalar(ScalarKind::Unsigned, 64);
        let start_ref = m.new_constant(u64_ty, ConstValue::U64(offset));
        let count_ref = match len {
            Some(l) => m.new_constant(u64_ty, ConstValue::U64(l)),
            None => m.new_placeholder(u64_ty),
        };
        let r = m.new_slice(buffer_ty, self.r, SliceAxis::Range, start_ref, count_ref);
        drop(m);
        Value::from_ref(self.module.clone(), r, None)
    }

    pub fn get_size(&self) -> Value<()> {
        let mut m = self.module.borrow_mut();
        let u64_ty = m.types.make_scalar(ScalarKind::Unsigned, 64);
        let r = m.new_get_ci(u64_ty, self.r, "size");
        drop(m);
        Value::from_ref(self.module.clone(), r, None)
    }
}

/// Declares a fixed-length array of values of the same composite type
/// (spec.md §3 "Array"), e.g. the color attachments of a multi-target
/// renderpass before they're individually bound as `CALL` arguments.
pub fn declare_array(module: &Rc<RefCell<Module>>, element_ty: TypeId, elements: &[Ref]) -> Result<Ref> {
    let array_ty = module
        .borrow_mut()
        .types
        .make_array(element_ty, crate::types::ArrayLen::Fixed(elements.len() as u32))?;
    let r = module.borrow_mut().new_construct(array_ty, elements);
    Ok(r)
}
