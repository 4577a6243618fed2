//! 访问类型与同步参数表
//!
//! 每种访问类型对应一组 (pipeline stage, access mask, image layout)。
//! 表按枚举序号稠密排列，编译期断言保证每个枚举值都有且只有一个表项。

use ash::vk;

/// 资源在 GPU 上的一种使用方式
///
/// 读在前、写在后；`Nothing` 表示资源刚分配、内容未定义。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RgAccessType {
    Nothing,

    CommandBufferReadNvx,
    IndirectBuffer,
    IndexBuffer,
    VertexBuffer,
    VertexShaderReadUniformBuffer,
    VertexShaderReadSampledImageOrUniformTexelBuffer,
    VertexShaderReadOther,
    TessellationControlShaderReadUniformBuffer,
    TessellationControlShaderReadSampledImageOrUniformTexelBuffer,
    TessellationControlShaderReadOther,
    TessellationEvaluationShaderReadUniformBuffer,
    TessellationEvaluationShaderReadSampledImageOrUniformTexelBuffer,
    TessellationEvaluationShaderReadOther,
    GeometryShaderReadUniformBuffer,
    GeometryShaderReadSampledImageOrUniformTexelBuffer,
    GeometryShaderReadOther,
    FragmentShaderReadUniformBuffer,
    FragmentShaderReadSampledImageOrUniformTexelBuffer,
    FragmentShaderReadColorInputAttachment,
    FragmentShaderReadDepthStencilInputAttachment,
    FragmentShaderReadOther,
    ColorAttachmentRead,
    DepthStencilAttachmentRead,
    ComputeShaderReadUniformBuffer,
    ComputeShaderReadSampledImageOrUniformTexelBuffer,
    ComputeShaderReadOther,
    RayTracingShaderReadUniformBuffer,
    RayTracingShaderReadSampledImageOrUniformTexelBuffer,
    RayTracingShaderReadAccelerationStructure,
    RayTracingShaderReadOther,
    AccelerationStructureBuildRead,
    AnyShaderReadUniformBuffer,
    AnyShaderReadUniformBufferOrVertexBuffer,
    AnyShaderReadSampledImageOrUniformTexelBuffer,
    AnyShaderReadOther,
    TransferRead,
    HostRead,
    Present,

    CommandBufferWriteNvx,
    VertexShaderWrite,
    TessellationControlShaderWrite,
    TessellationEvaluationShaderWrite,
    GeometryShaderWrite,
    FragmentShaderWrite,
    ColorAttachmentWrite,
    DepthStencilAttachmentWrite,
    DepthAttachmentWriteStencilReadOnly,
    StencilAttachmentWriteDepthReadOnly,
    ComputeShaderWrite,
    RayTracingShaderWrite,
    AccelerationStructureBuildWrite,
    AnyShaderWrite,
    TransferWrite,
    HostWrite,
    ColorAttachmentReadWrite,
    General,
}

/// 一种访问类型对应的同步参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RgAccessInfo {
    pub access_type: RgAccessType,
    pub stage_mask: vk::PipelineStageFlags2,
    pub access_mask: vk::AccessFlags2,
    pub image_layout: vk::ImageLayout,
    pub is_write: bool,
}

const fn stages(a: vk::PipelineStageFlags2, b: vk::PipelineStageFlags2) -> vk::PipelineStageFlags2 {
    vk::PipelineStageFlags2::from_raw(a.as_raw() | b.as_raw())
}

const fn accesses(a: vk::AccessFlags2, b: vk::AccessFlags2) -> vk::AccessFlags2 {
    vk::AccessFlags2::from_raw(a.as_raw() | b.as_raw())
}

const fn read(
    access_type: RgAccessType,
    stage_mask: vk::PipelineStageFlags2,
    access_mask: vk::AccessFlags2,
    image_layout: vk::ImageLayout,
) -> RgAccessInfo {
    RgAccessInfo {
        access_type,
        stage_mask,
        access_mask,
        image_layout,
        is_write: false,
    }
}

const fn write(
    access_type: RgAccessType,
    stage_mask: vk::PipelineStageFlags2,
    access_mask: vk::AccessFlags2,
    image_layout: vk::ImageLayout,
) -> RgAccessInfo {
    RgAccessInfo {
        access_type,
        stage_mask,
        access_mask,
        image_layout,
        is_write: true,
    }
}

type S = vk::PipelineStageFlags2;
type A = vk::AccessFlags2;
type L = vk::ImageLayout;
use RgAccessType as T;

const EARLY_LATE_FRAGMENT_TESTS: S = stages(S::EARLY_FRAGMENT_TESTS, S::LATE_FRAGMENT_TESTS);
const DEPTH_STENCIL_READ_WRITE: A =
    accesses(A::DEPTH_STENCIL_ATTACHMENT_READ, A::DEPTH_STENCIL_ATTACHMENT_WRITE);

#[rustfmt::skip]
const ACCESS_INFO_TABLE: [RgAccessInfo; RgAccessType::COUNT] = [
    read(T::Nothing, S::NONE, A::NONE, L::UNDEFINED),

    read(T::CommandBufferReadNvx, S::COMMAND_PREPROCESS_NV, A::COMMAND_PREPROCESS_READ_NV, L::UNDEFINED),
    read(T::IndirectBuffer, S::DRAW_INDIRECT, A::INDIRECT_COMMAND_READ, L::UNDEFINED),
    read(T::IndexBuffer, S::VERTEX_INPUT, A::INDEX_READ, L::UNDEFINED),
    read(T::VertexBuffer, S::VERTEX_INPUT, A::VERTEX_ATTRIBUTE_READ, L::UNDEFINED),
    read(T::VertexShaderReadUniformBuffer, S::VERTEX_SHADER, A::UNIFORM_READ, L::UNDEFINED),
    read(T::VertexShaderReadSampledImageOrUniformTexelBuffer, S::VERTEX_SHADER, A::SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::VertexShaderReadOther, S::VERTEX_SHADER, A::SHADER_READ, L::GENERAL),
    read(T::TessellationControlShaderReadUniformBuffer, S::TESSELLATION_CONTROL_SHADER, A::UNIFORM_READ, L::UNDEFINED),
    read(T::TessellationControlShaderReadSampledImageOrUniformTexelBuffer, S::TESSELLATION_CONTROL_SHADER, A::SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::TessellationControlShaderReadOther, S::TESSELLATION_CONTROL_SHADER, A::SHADER_READ, L::GENERAL),
    read(T::TessellationEvaluationShaderReadUniformBuffer, S::TESSELLATION_EVALUATION_SHADER, A::UNIFORM_READ, L::UNDEFINED),
    read(T::TessellationEvaluationShaderReadSampledImageOrUniformTexelBuffer, S::TESSELLATION_EVALUATION_SHADER, A::SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::TessellationEvaluationShaderReadOther, S::TESSELLATION_EVALUATION_SHADER, A::SHADER_READ, L::GENERAL),
    read(T::GeometryShaderReadUniformBuffer, S::GEOMETRY_SHADER, A::UNIFORM_READ, L::UNDEFINED),
    read(T::GeometryShaderReadSampledImageOrUniformTexelBuffer, S::GEOMETRY_SHADER, A::SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::GeometryShaderReadOther, S::GEOMETRY_SHADER, A::SHADER_READ, L::GENERAL),
    read(T::FragmentShaderReadUniformBuffer, S::FRAGMENT_SHADER, A::UNIFORM_READ, L::UNDEFINED),
    read(T::FragmentShaderReadSampledImageOrUniformTexelBuffer, S::FRAGMENT_SHADER, A::SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::FragmentShaderReadColorInputAttachment, S::FRAGMENT_SHADER, A::INPUT_ATTACHMENT_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::FragmentShaderReadDepthStencilInputAttachment, S::FRAGMENT_SHADER, A::INPUT_ATTACHMENT_READ, L::DEPTH_STENCIL_READ_ONLY_OPTIMAL),
    read(T::FragmentShaderReadOther, S::FRAGMENT_SHADER, A::SHADER_READ, L::GENERAL),
    read(T::ColorAttachmentRead, S::COLOR_ATTACHMENT_OUTPUT, A::COLOR_ATTACHMENT_READ, L::COLOR_ATTACHMENT_OPTIMAL),
    read(T::DepthStencilAttachmentRead, EARLY_LATE_FRAGMENT_TESTS, A::DEPTH_STENCIL_ATTACHMENT_READ, L::DEPTH_STENCIL_READ_ONLY_OPTIMAL),
    read(T::ComputeShaderReadUniformBuffer, S::COMPUTE_SHADER, A::UNIFORM_READ, L::UNDEFINED),
    read(T::ComputeShaderReadSampledImageOrUniformTexelBuffer, S::COMPUTE_SHADER, A::SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::ComputeShaderReadOther, S::COMPUTE_SHADER, A::SHADER_READ, L::GENERAL),
    read(T::RayTracingShaderReadUniformBuffer, S::RAY_TRACING_SHADER_KHR, A::UNIFORM_READ, L::UNDEFINED),
    read(T::RayTracingShaderReadSampledImageOrUniformTexelBuffer, S::RAY_TRACING_SHADER_KHR, A::SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::RayTracingShaderReadAccelerationStructure, S::RAY_TRACING_SHADER_KHR, A::ACCELERATION_STRUCTURE_READ_KHR, L::UNDEFINED),
    read(T::RayTracingShaderReadOther, S::RAY_TRACING_SHADER_KHR, A::SHADER_READ, L::GENERAL),
    read(T::AccelerationStructureBuildRead, S::ACCELERATION_STRUCTURE_BUILD_KHR, A::ACCELERATION_STRUCTURE_READ_KHR, L::UNDEFINED),
    read(T::AnyShaderReadUniformBuffer, S::ALL_COMMANDS, A::UNIFORM_READ, L::UNDEFINED),
    read(T::AnyShaderReadUniformBufferOrVertexBuffer, S::ALL_COMMANDS, accesses(A::UNIFORM_READ, A::VERTEX_ATTRIBUTE_READ), L::UNDEFINED),
    read(T::AnyShaderReadSampledImageOrUniformTexelBuffer, S::ALL_COMMANDS, A::SHADER_READ, L::SHADER_READ_ONLY_OPTIMAL),
    read(T::AnyShaderReadOther, S::ALL_COMMANDS, A::SHADER_READ, L::GENERAL),
    read(T::TransferRead, S::TRANSFER, A::TRANSFER_READ, L::TRANSFER_SRC_OPTIMAL),
    read(T::HostRead, S::HOST, A::HOST_READ, L::GENERAL),
    read(T::Present, S::NONE, A::NONE, L::PRESENT_SRC_KHR),

    write(T::CommandBufferWriteNvx, S::COMMAND_PREPROCESS_NV, A::COMMAND_PREPROCESS_WRITE_NV, L::UNDEFINED),
    write(T::VertexShaderWrite, S::VERTEX_SHADER, A::SHADER_WRITE, L::GENERAL),
    write(T::TessellationControlShaderWrite, S::TESSELLATION_CONTROL_SHADER, A::SHADER_WRITE, L::GENERAL),
    write(T::TessellationEvaluationShaderWrite, S::TESSELLATION_EVALUATION_SHADER, A::SHADER_WRITE, L::GENERAL),
    write(T::GeometryShaderWrite, S::GEOMETRY_SHADER, A::SHADER_WRITE, L::GENERAL),
    write(T::FragmentShaderWrite, S::FRAGMENT_SHADER, A::SHADER_WRITE, L::GENERAL),
    write(T::ColorAttachmentWrite, S::COLOR_ATTACHMENT_OUTPUT, A::COLOR_ATTACHMENT_WRITE, L::COLOR_ATTACHMENT_OPTIMAL),
    write(T::DepthStencilAttachmentWrite, EARLY_LATE_FRAGMENT_TESTS, A::DEPTH_STENCIL_ATTACHMENT_WRITE, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
    write(T::DepthAttachmentWriteStencilReadOnly, EARLY_LATE_FRAGMENT_TESTS, DEPTH_STENCIL_READ_WRITE, L::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL),
    write(T::StencilAttachmentWriteDepthReadOnly, EARLY_LATE_FRAGMENT_TESTS, DEPTH_STENCIL_READ_WRITE, L::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL),
    write(T::ComputeShaderWrite, S::COMPUTE_SHADER, A::SHADER_WRITE, L::GENERAL),
    write(T::RayTracingShaderWrite, S::RAY_TRACING_SHADER_KHR, A::SHADER_WRITE, L::GENERAL),
    write(T::AccelerationStructureBuildWrite, S::ACCELERATION_STRUCTURE_BUILD_KHR, A::ACCELERATION_STRUCTURE_WRITE_KHR, L::UNDEFINED),
    write(T::AnyShaderWrite, S::ALL_COMMANDS, A::SHADER_WRITE, L::GENERAL),
    write(T::TransferWrite, S::TRANSFER, A::TRANSFER_WRITE, L::TRANSFER_DST_OPTIMAL),
    write(T::HostWrite, S::HOST, A::HOST_WRITE, L::GENERAL),
    write(T::ColorAttachmentReadWrite, S::COLOR_ATTACHMENT_OUTPUT, accesses(A::COLOR_ATTACHMENT_READ, A::COLOR_ATTACHMENT_WRITE), L::COLOR_ATTACHMENT_OPTIMAL),
    write(T::General, S::ALL_COMMANDS, accesses(A::MEMORY_READ, A::MEMORY_WRITE), L::GENERAL),
];

// 表项顺序必须与枚举序号一致
const _: () = {
    let mut i = 0;
    while i < ACCESS_INFO_TABLE.len() {
        assert!(ACCESS_INFO_TABLE[i].access_type as usize == i);
        i += 1;
    }
};

static ACCESS_INFOS: [RgAccessInfo; RgAccessType::COUNT] = ACCESS_INFO_TABLE;

impl RgAccessType {
    pub const COUNT: usize = RgAccessType::General as usize + 1;

    /// 按序号排列的全部访问类型
    pub fn all() -> impl Iterator<Item = RgAccessType> {
        ACCESS_INFOS.iter().map(|info| info.access_type)
    }

    #[inline]
    pub fn info(self) -> &'static RgAccessInfo {
        &ACCESS_INFOS[self as usize]
    }

    #[inline]
    pub fn is_write(self) -> bool {
        self.info().is_write
    }

    #[inline]
    pub fn is_read(self) -> bool {
        self != RgAccessType::Nothing && !self.is_write()
    }

    /// 只能通过 raster 声明的 attachment 访问
    pub fn is_raster(self) -> bool {
        matches!(
            self,
            RgAccessType::ColorAttachmentRead
                | RgAccessType::ColorAttachmentWrite
                | RgAccessType::ColorAttachmentReadWrite
                | RgAccessType::DepthStencilAttachmentRead
                | RgAccessType::DepthStencilAttachmentWrite
                | RgAccessType::DepthAttachmentWriteStencilReadOnly
                | RgAccessType::StencilAttachmentWriteDepthReadOnly
        )
    }

    /// 以该方式访问 image 所需的 usage
    pub fn image_usage(self) -> vk::ImageUsageFlags {
        let info = self.info();
        let access = info.access_mask;
        let mut usage = vk::ImageUsageFlags::empty();

        if access.intersects(A::SHADER_READ) {
            usage |= if info.image_layout == L::SHADER_READ_ONLY_OPTIMAL {
                vk::ImageUsageFlags::SAMPLED
            } else {
                vk::ImageUsageFlags::STORAGE
            };
        }
        if access.intersects(A::SHADER_WRITE) {
            usage |= vk::ImageUsageFlags::STORAGE;
        }
        if access.intersects(A::INPUT_ATTACHMENT_READ) {
            usage |= vk::ImageUsageFlags::INPUT_ATTACHMENT;
        }
        if access.intersects(accesses(A::COLOR_ATTACHMENT_READ, A::COLOR_ATTACHMENT_WRITE)) {
            usage |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
        }
        if access.intersects(DEPTH_STENCIL_READ_WRITE) {
            usage |= vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT;
        }
        if access.intersects(A::TRANSFER_READ) {
            usage |= vk::ImageUsageFlags::TRANSFER_SRC;
        }
        if access.intersects(A::TRANSFER_WRITE) {
            usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        usage
    }

    /// 以该方式访问 buffer 所需的 usage
    pub fn buffer_usage(self) -> vk::BufferUsageFlags {
        let info = self.info();
        let access = info.access_mask;
        let mut usage = vk::BufferUsageFlags::empty();

        if access.intersects(A::INDIRECT_COMMAND_READ) {
            usage |= vk::BufferUsageFlags::INDIRECT_BUFFER;
        }
        if access.intersects(A::INDEX_READ) {
            usage |= vk::BufferUsageFlags::INDEX_BUFFER;
        }
        if access.intersects(A::VERTEX_ATTRIBUTE_READ) {
            usage |= vk::BufferUsageFlags::VERTEX_BUFFER;
        }
        if access.intersects(A::UNIFORM_READ) {
            usage |= vk::BufferUsageFlags::UNIFORM_BUFFER;
        }
        if access.intersects(A::SHADER_READ) {
            usage |= if info.image_layout == L::SHADER_READ_ONLY_OPTIMAL {
                vk::BufferUsageFlags::UNIFORM_TEXEL_BUFFER
            } else {
                vk::BufferUsageFlags::STORAGE_BUFFER
            };
        }
        if access.intersects(A::SHADER_WRITE) {
            usage |= vk::BufferUsageFlags::STORAGE_BUFFER;
        }
        if access.intersects(A::TRANSFER_READ) {
            usage |= vk::BufferUsageFlags::TRANSFER_SRC;
        }
        if access.intersects(A::TRANSFER_WRITE) {
            usage |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        usage
    }
}
