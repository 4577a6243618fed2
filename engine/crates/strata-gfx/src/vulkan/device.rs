use std::collections::HashMap;
use std::ffi::CString;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator, AllocatorCreateDesc};

use crate::commands::barrier::GfxImageBarrier;
use crate::commands::command_encoder::GfxCommandEncoder;
use crate::device::GfxDevice;
use crate::error::{GfxError, GfxResult};
use crate::resources::buffer::{GfxBuffer, GfxBufferDesc};
use crate::resources::image::{GfxImage, GfxImageDesc};
use crate::sampler::GfxSamplerDesc;
use crate::vulkan::command_encoder::VulkanCommandEncoder;

/// 基于 ash + gpu-allocator 的设备
///
/// 不拥有 `ash::Instance` 与 `ash::Device`，调用者在 [`VulkanGfxDevice::destroy`] 之后销毁它们。
pub struct VulkanGfxDevice {
    device: ash::Device,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    allocator: Option<Allocator>,

    queue: vk::Queue,
    setup_command_pool: vk::CommandPool,
    setup_fence: vk::Fence,

    image_allocations: HashMap<vk::Image, Allocation>,
    buffer_allocations: HashMap<vk::Buffer, Allocation>,
    samplers: HashMap<GfxSamplerDesc, vk::Sampler>,

    destroyed: bool,
}
// new & init
impl VulkanGfxDevice {
    /// # Params
    /// * `queue_family_index` - setup 命令提交到该 family 的第 0 个 queue
    /// * `debug_utils` - 存在时为资源设置 debug name，并启用 debug label
    pub fn new(
        instance: &ash::Instance,
        device: ash::Device,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        debug_utils: Option<ash::ext::debug_utils::Device>,
    ) -> GfxResult<Self> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;

        let queue = unsafe { device.get_device_queue(queue_family_index, 0) };
        let setup_command_pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .queue_family_index(queue_family_index)
                    .flags(vk::CommandPoolCreateFlags::TRANSIENT),
                None,
            )?
        };
        let setup_fence = unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None)? };

        Ok(Self {
            device,
            debug_utils,
            allocator: Some(allocator),
            queue,
            setup_command_pool,
            setup_fence,
            image_allocations: HashMap::new(),
            buffer_allocations: HashMap::new(),
            samplers: HashMap::new(),
            destroyed: false,
        })
    }
}
// getters
impl VulkanGfxDevice {
    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }

    /// 为调用者持有的 command buffer 创建 encoder，用于录制一帧的 RenderGraph
    #[inline]
    pub fn encoder(&self, command_buffer: vk::CommandBuffer) -> VulkanCommandEncoder<'_> {
        VulkanCommandEncoder::new(&self.device, self.debug_utils.as_ref(), command_buffer)
    }
}
// destroy
impl VulkanGfxDevice {
    /// 释放所有仍存活的分配；调用前需要 device idle
    pub fn destroy(mut self) {
        self.destroy_mut();
    }

    fn destroy_mut(&mut self) {
        if self.destroyed {
            return;
        }

        if !self.image_allocations.is_empty() || !self.buffer_allocations.is_empty() {
            log::warn!(
                "VulkanGfxDevice destroyed with {} images and {} buffers still alive",
                self.image_allocations.len(),
                self.buffer_allocations.len()
            );
        }

        unsafe {
            for (image, allocation) in std::mem::take(&mut self.image_allocations) {
                self.device.destroy_image(image, None);
                self.free_allocation(allocation);
            }
            for (buffer, allocation) in std::mem::take(&mut self.buffer_allocations) {
                self.device.destroy_buffer(buffer, None);
                self.free_allocation(allocation);
            }
            for (_, sampler) in self.samplers.drain() {
                self.device.destroy_sampler(sampler, None);
            }
            self.device.destroy_fence(self.setup_fence, None);
            self.device.destroy_command_pool(self.setup_command_pool, None);
        }

        if let Some(allocator) = &self.allocator {
            allocator.report_memory_leaks(log::Level::Warn);
        }
        // allocator 必须在 device 销毁前 drop
        self.allocator = None;
        self.destroyed = true;
    }
}
impl Drop for VulkanGfxDevice {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            assert!(self.destroyed, "VulkanGfxDevice dropped without destroy()");
        }
    }
}
// tools
impl VulkanGfxDevice {
    fn allocator_mut(&mut self) -> GfxResult<&mut Allocator> {
        self.allocator.as_mut().ok_or_else(|| GfxError::ResourceCreation {
            name: "<allocator>".to_string(),
            reason: "device already destroyed".to_string(),
        })
    }

    fn free_allocation(&mut self, allocation: Allocation) {
        if let Some(allocator) = &mut self.allocator {
            if let Err(err) = allocator.free(allocation) {
                log::error!("failed to free allocation: {}", err);
            }
        }
    }

    fn set_debug_name<H: vk::Handle>(&self, handle: H, name: &str) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let name = CString::new(name).unwrap_or_default();
        let name_info = vk::DebugUtilsObjectNameInfoEXT::default().object_handle(handle).object_name(&name);
        unsafe {
            let _ = debug_utils.set_debug_utils_object_name(&name_info);
        }
    }

    fn create_raw_buffer(&mut self, desc: &GfxBufferDesc, name: &str) -> GfxResult<(vk::Buffer, Allocation)> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(desc.size)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&buffer_info, None)? };

        let mut requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        if let Some(alignment) = desc.alignment {
            requirements.alignment = requirements.alignment.max(alignment);
        }

        let allocation = match self.allocator_mut().and_then(|allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: desc.memory_location.to_allocator_location(),
                    linear: true,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(GfxError::from)
        }) {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(err);
            }
        };

        if let Err(err) = unsafe { self.device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset()) } {
            unsafe { self.device.destroy_buffer(buffer, None) };
            self.free_allocation(allocation);
            return Err(err.into());
        }

        self.set_debug_name(buffer, name);
        Ok((buffer, allocation))
    }

    fn destroy_raw_buffer(&mut self, buffer: vk::Buffer, allocation: Allocation) {
        unsafe { self.device.destroy_buffer(buffer, None) };
        self.free_allocation(allocation);
    }

    /// 创建一个写入了 `data` 的 staging buffer
    fn create_staging_buffer(&mut self, data: &[u8], name: &str) -> GfxResult<(vk::Buffer, Allocation)> {
        let desc = GfxBufferDesc::new_cpu_to_gpu(data.len() as vk::DeviceSize, vk::BufferUsageFlags::TRANSFER_SRC);
        let (buffer, mut allocation) = self.create_raw_buffer(&desc, &format!("{name}-staging"))?;
        match allocation.mapped_slice_mut() {
            Some(mapped) => mapped[..data.len()].copy_from_slice(data),
            None => {
                self.destroy_raw_buffer(buffer, allocation);
                return Err(GfxError::ResourceCreation {
                    name: name.to_string(),
                    reason: "staging buffer is not host visible".to_string(),
                });
            }
        }
        Ok((buffer, allocation))
    }
}
impl GfxDevice for VulkanGfxDevice {
    fn create_image(&mut self, desc: &GfxImageDesc, name: &str, initial_data: Option<&[u8]>) -> GfxResult<GfxImage> {
        let mut create_info = desc.to_vk_create_info();
        if initial_data.is_some() {
            create_info.usage |= vk::ImageUsageFlags::TRANSFER_DST;
        }
        let image = unsafe { self.device.create_image(&create_info, None)? };
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };

        let allocation = match self.allocator_mut().and_then(|allocator| {
            allocator
                .allocate(&AllocationCreateDesc {
                    name,
                    requirements,
                    location: gpu_allocator::MemoryLocation::GpuOnly,
                    linear: desc.tiling == vk::ImageTiling::LINEAR,
                    allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                })
                .map_err(GfxError::from)
        }) {
            Ok(allocation) => allocation,
            Err(err) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(err);
            }
        };

        if let Err(err) = unsafe { self.device.bind_image_memory(image, allocation.memory(), allocation.offset()) } {
            unsafe { self.device.destroy_image(image, None) };
            self.free_allocation(allocation);
            return Err(err.into());
        }
        self.set_debug_name(image, name);
        self.image_allocations.insert(image, allocation);

        let gfx_image = GfxImage::new(image, *desc, name);
        if let Some(data) = initial_data {
            if let Err(err) = self.upload_image_data(&gfx_image, data) {
                self.destroy_image(gfx_image);
                return Err(err);
            }
        }
        Ok(gfx_image)
    }

    fn create_buffer(
        &mut self,
        desc: &GfxBufferDesc,
        name: &str,
        initial_data: Option<&[u8]>,
    ) -> GfxResult<GfxBuffer> {
        if let Some(data) = initial_data {
            if data.len() as u64 > desc.size {
                return Err(GfxError::InitialDataSize {
                    name: name.to_string(),
                    expected: desc.size,
                    actual: data.len() as u64,
                });
            }
        }

        let mut desc_with_transfer = *desc;
        if initial_data.is_some() {
            desc_with_transfer.usage |= vk::BufferUsageFlags::TRANSFER_DST;
        }
        let (buffer, allocation) = self.create_raw_buffer(&desc_with_transfer, name)?;
        self.buffer_allocations.insert(buffer, allocation);
        let gfx_buffer = GfxBuffer::new(buffer, *desc, name);

        if let Some(data) = initial_data {
            if let Err(err) = self.upload_buffer_data(&gfx_buffer, data) {
                self.destroy_buffer(gfx_buffer);
                return Err(err);
            }
        }
        Ok(gfx_buffer)
    }

    fn destroy_image(&mut self, image: GfxImage) {
        log::debug!("Destroying GfxImage: {}", image.name());
        unsafe { self.device.destroy_image(image.handle(), None) };
        if let Some(allocation) = self.image_allocations.remove(&image.handle()) {
            self.free_allocation(allocation);
        }
    }

    fn destroy_buffer(&mut self, buffer: GfxBuffer) {
        log::debug!("Destroying GfxBuffer: {}", buffer.name());
        unsafe { self.device.destroy_buffer(buffer.handle(), None) };
        if let Some(allocation) = self.buffer_allocations.remove(&buffer.handle()) {
            self.free_allocation(allocation);
        }
    }

    fn get_sampler(&mut self, desc: &GfxSamplerDesc) -> GfxResult<vk::Sampler> {
        if let Some(sampler) = self.samplers.get(desc) {
            return Ok(*sampler);
        }
        let sampler = unsafe { self.device.create_sampler(&desc.to_vk_create_info(), None)? };
        self.samplers.insert(*desc, sampler);
        Ok(sampler)
    }

    fn with_setup_command_buffer(&mut self, f: &mut dyn FnMut(&mut dyn GfxCommandEncoder)) -> GfxResult<()> {
        let _span = strata_crate_tools::profile_span!("VulkanGfxDevice::with_setup_command_buffer");

        let command_buffer = unsafe {
            self.device.allocate_command_buffers(
                &vk::CommandBufferAllocateInfo::default()
                    .command_pool(self.setup_command_pool)
                    .level(vk::CommandBufferLevel::PRIMARY)
                    .command_buffer_count(1),
            )?[0]
        };
        let device = self.device.clone();
        let pool = self.setup_command_pool;
        scopeguard::defer! {
            unsafe { device.free_command_buffers(pool, &[command_buffer]) };
        }

        unsafe {
            self.device.begin_command_buffer(
                command_buffer,
                &vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;
        }
        {
            let mut encoder = VulkanCommandEncoder::new(&self.device, self.debug_utils.as_ref(), command_buffer);
            f(&mut encoder);
        }
        unsafe {
            self.device.end_command_buffer(command_buffer)?;

            let command_buffers = [command_buffer];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            self.device.queue_submit(self.queue, &[submit_info], self.setup_fence)?;
            self.device.wait_for_fences(&[self.setup_fence], true, u64::MAX)?;
            self.device.reset_fences(&[self.setup_fence])?;
        }
        Ok(())
    }

    fn allocation_report(&self) -> Option<String> {
        let report = self.allocator.as_ref()?.generate_report();
        Some(format!(
            "{} allocations in {} blocks, {} bytes allocated, {} bytes reserved",
            report.allocations.len(),
            report.blocks.len(),
            report.total_allocated_bytes,
            report.total_reserved_bytes
        ))
    }
}
// upload
impl VulkanGfxDevice {
    fn upload_buffer_data(&mut self, buffer: &GfxBuffer, data: &[u8]) -> GfxResult<()> {
        let (staging, staging_allocation) = self.create_staging_buffer(data, buffer.name())?;
        let dst = buffer.handle();
        let size = data.len() as vk::DeviceSize;

        let device = self.device.clone();
        let result = self.with_setup_command_buffer(&mut |cmd: &mut dyn GfxCommandEncoder| unsafe {
            device.cmd_copy_buffer(cmd.raw(), staging, dst, &[vk::BufferCopy::default().size(size)]);
        });
        self.destroy_raw_buffer(staging, staging_allocation);
        result
    }

    /// 写入 mip 0 的全部 layer，结束时 image 处于 `TRANSFER_DST_OPTIMAL`
    fn upload_image_data(&mut self, image: &GfxImage, data: &[u8]) -> GfxResult<()> {
        let (staging, staging_allocation) = self.create_staging_buffer(data, image.name())?;
        let dst = image.handle();
        let desc = *image.desc();

        let device = self.device.clone();
        let result = self.with_setup_command_buffer(&mut |cmd: &mut dyn GfxCommandEncoder| {
            cmd.image_memory_barrier(
                vk::DependencyFlags::empty(),
                &[GfxImageBarrier::new()
                    .image(dst)
                    .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .src_mask(vk::PipelineStageFlags2::NONE, vk::AccessFlags2::NONE)
                    .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                    .image_aspect_flag(desc.aspect_mask())],
            );
            let region = vk::BufferImageCopy::default()
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: desc.aspect_mask(),
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: desc.layer_count(),
                })
                .image_extent(desc.extent_3d());
            unsafe {
                device.cmd_copy_buffer_to_image(
                    cmd.raw(),
                    staging,
                    dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
            }
        });
        self.destroy_raw_buffer(staging, staging_allocation);
        result
    }
}
