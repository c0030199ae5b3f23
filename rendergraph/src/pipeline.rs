//! Pipeline front-end handles.
//!
//! Shader/pipeline compilation is an external collaborator: this module
//! only declares the opaque handle and reflection shapes the core consumes
//! from it, grounded in the teacher's own `ShaderStageFlags`
//! bitflags (`api/src/pipeline/mod.rs`) and descriptor-binding reflection
//! (`api-gl/src/pipeline/mod.rs`'s `Arguments`/`ResourceBinding` handling).

use ash::vk;
use bitflags::bitflags;
use std::collections::BTreeMap;

bitflags! {
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const GEOMETRY = 1 << 1;
        const FRAGMENT = 1 << 2;
        const TESS_CONTROL = 1 << 3;
        const TESS_EVAL = 1 << 4;
        const COMPUTE = 1 << 5;
        const ALL_GRAPHICS = Self::VERTEX.bits | Self::GEOMETRY.bits | Self::FRAGMENT.bits
            | Self::TESS_CONTROL.bits | Self::TESS_EVAL.bits;
    }
}

/// An already-compiled pipeline handle. Front-end-opaque: this crate never
/// inspects its contents, only threads it through
/// `make_pass`/`lift_compute` to the backend's `bind_graphics_pipeline`/
/// `bind_compute_pipeline`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PipelineBaseInfo {
    pub handle: vk::Pipeline,
    pub stages: ShaderStageFlags,
}

/// What kind of descriptor a binding slot expects, reflected from SPIR-V by
/// the (external) front end.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DescriptorKind {
    UniformBuffer,
    StorageBuffer,
    SampledImage,
    StorageImage,
    Sampler,
    CombinedImageSampler,
}

#[derive(Copy, Clone, Debug)]
pub struct PushConstantRange {
    pub stages: ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct SpecializationConstant {
    pub constant_id: u32,
    pub default_value: u32,
}

/// SPIR-V reflection of one compiled program: binding set/number to kind,
/// push-constant ranges, specialization constants. Descriptor reflection
/// is consumed here, not recomputed — this crate has no SPIR-V parser of
/// its own.
#[derive(Clone, Debug, Default)]
pub struct Program {
    /// `(set, binding) -> kind`, matching `lift_compute`'s rule that
    /// descriptor binding numbers follow the order of non-count arguments —
    /// this map is what a backend consults to place each bound resource at
    /// the right `(set, binding)`.
    pub bindings: BTreeMap<(u32, u32), DescriptorKind>,
    pub push_constants: Vec<PushConstantRange>,
    pub specialization_constants: Vec<SpecializationConstant>,
}

impl Program {
    pub fn new() -> Program {
        Program::default()
    }

    pub fn binding_kind(&self, set: u32, binding: u32) -> Option<DescriptorKind> {
        self.bindings.get(&(set, binding)).copied()
    }
}

/// Opaque pipeline-cache blob: loaded before first pipeline creation, saved
/// on shutdown. This crate never interprets the bytes, only carries them
/// between the caller and whatever `vkCreatePipelineCache`-equivalent the
/// backend runs.
#[derive(Clone, Debug, Default)]
pub struct PipelineCache {
    bytes: Vec<u8>,
}

impl PipelineCache {
    pub fn from_bytes(bytes: Vec<u8>) -> PipelineCache {
        PipelineCache { bytes }
    }

    pub fn empty() -> PipelineCache {
        PipelineCache::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }
}
