pub mod device;
pub mod memory;
pub mod vulkan_device;

pub use device::GfxDevice;
pub use memory::GfxMemoryProperties;
pub use vulkan_device::GfxVulkanDevice;
