//! Vulkan 后端
//!
//! 调用者负责创建 instance/device 并在 [`device::VulkanGfxDevice::destroy`] 之后销毁它们。

pub mod command_encoder;
pub mod device;
