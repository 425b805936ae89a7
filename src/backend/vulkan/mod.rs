pub mod backend;
pub mod resources;

pub use backend::{VulkanBackend, VulkanDeviceDesc};
