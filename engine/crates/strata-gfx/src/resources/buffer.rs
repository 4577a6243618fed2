use ash::vk;

/// Buffer 所在的内存位置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GfxMemoryLocation {
    /// 只有 GPU 访问
    GpuOnly,
    /// CPU 写入，GPU 读取（upload）
    CpuToGpu,
    /// GPU 写入，CPU 读取（readback）
    GpuToCpu,
}
impl GfxMemoryLocation {
    pub fn to_allocator_location(self) -> gpu_allocator::MemoryLocation {
        match self {
            GfxMemoryLocation::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
            GfxMemoryLocation::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
            GfxMemoryLocation::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
        }
    }
}

/// Buffer 的形状描述
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GfxBufferDesc {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub memory_location: GfxMemoryLocation,
    pub alignment: Option<vk::DeviceSize>,
}
// new & init
impl GfxBufferDesc {
    pub fn new(size: vk::DeviceSize, usage: vk::BufferUsageFlags, memory_location: GfxMemoryLocation) -> Self {
        Self {
            size,
            usage,
            memory_location,
            alignment: None,
        }
    }

    pub fn new_gpu_only(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self::new(size, usage, GfxMemoryLocation::GpuOnly)
    }

    pub fn new_cpu_to_gpu(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self::new(size, usage, GfxMemoryLocation::CpuToGpu)
    }

    pub fn new_gpu_to_cpu(size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> Self {
        Self::new(size, usage, GfxMemoryLocation::GpuToCpu)
    }
}
// builder
impl GfxBufferDesc {
    #[inline]
    #[must_use]
    pub fn usage(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    #[inline]
    #[must_use]
    pub fn alignment(mut self, alignment: vk::DeviceSize) -> Self {
        self.alignment = Some(alignment);
        self
    }
}

/// 设备上的一个 buffer
#[derive(Debug)]
pub struct GfxBuffer {
    handle: vk::Buffer,
    desc: GfxBufferDesc,
    name: String,
}
// new & init
impl GfxBuffer {
    /// 由后端调用，包装已经创建好的 vk::Buffer
    pub fn new(handle: vk::Buffer, desc: GfxBufferDesc, name: impl Into<String>) -> Self {
        Self {
            handle,
            desc,
            name: name.into(),
        }
    }
}
// getters
impl GfxBuffer {
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    #[inline]
    pub fn desc(&self) -> &GfxBufferDesc {
        &self.desc
    }

    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.desc.size
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}
