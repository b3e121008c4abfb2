// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation with validation layers
// - Physical device selection (prefer discrete GPU)
// - Logical device + queue creation
// - Descriptor pool and memory allocator setup

use anyhow::{Context, Result};
use ash::{vk, Entry};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use std::ffi::{c_char, CStr, CString};
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use super::descriptor;

/// Validation message ids that are noise in debug builds
const MUTED_MESSAGE_IDS: [i32; 2] = [
    648835635, // UNASSIGNED-khronos-Validation-debug-build-warning-message
    767975156, // UNASSIGNED-BestPractices-vkCreateInstance-specialuse-extension
];

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    pub entry: Entry,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub graphics_queue_family: u32,

    /// Shared with the UI renderer; must go before the device
    allocator: ManuallyDrop<Arc<Mutex<Allocator>>>,
    /// General-purpose pool for application descriptor sets. The UI renderer
    /// allocates its font set from a pool of its own, so nothing here draws
    /// from this one yet.
    pub descriptor_pool: vk::DescriptorPool,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanDevice {
    /// Create Vulkan device
    ///
    /// # Arguments
    /// * `app_name` - Application name for debugging
    /// * `surface_extensions` - Instance extensions the window system needs
    /// * `enable_validation` - Enable Vulkan validation layers (debug only)
    pub fn new(
        app_name: &str,
        surface_extensions: &[*const c_char],
        enable_validation: bool,
    ) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan device: {}", app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Step 2: Create instance
        let instance =
            Self::create_instance(&entry, app_name, surface_extensions, enable_validation)?;

        // Step 3: Setup debug messenger if validation enabled
        let debug_utils = if enable_validation {
            Some(Self::setup_debug_messenger(&entry, &instance)?)
        } else {
            None
        };

        // Step 4: Pick physical device (GPU)
        let (physical_device, properties) = Self::pick_physical_device(&instance)?;
        let graphics_queue_family = Self::find_graphics_queue_family(&instance, physical_device)?;

        log::info!(
            "Selected device: <{}>",
            unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        // Step 5: Create logical device
        let (device, graphics_queue) =
            Self::create_logical_device(&instance, physical_device, graphics_queue_family)?;

        // Step 6: Descriptor pool for UI textures and buffers
        let descriptor_pool = descriptor::create_descriptor_pool(&device)?;

        // Step 7: Create memory allocator
        let allocator = Self::create_allocator(&instance, physical_device, &device)?;

        Ok(Arc::new(Self {
            device,
            physical_device,
            instance,
            entry,
            graphics_queue,
            graphics_queue_family,
            allocator: ManuallyDrop::new(Arc::new(Mutex::new(allocator))),
            descriptor_pool,
            debug_utils,
        }))
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        surface_extensions: &[*const c_char],
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name)?;
        let engine_name = CString::new("No Engine")?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(1)
            .engine_name(&engine_name)
            .engine_version(1)
            .api_version(vk::API_VERSION_1_0);

        let mut extensions = surface_extensions.to_vec();
        if enable_validation {
            extensions.push(ash::extensions::ext::DebugUtils::name().as_ptr());
        }

        // Validation layers
        let layer_names = if enable_validation {
            vec![c"VK_LAYER_KHRONOS_validation".as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::extensions::ext::DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::extensions::ext::DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to create debug messenger")?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(
        instance: &ash::Instance,
    ) -> Result<(vk::PhysicalDevice, vk::PhysicalDeviceProperties)> {
        let devices = unsafe { instance.enumerate_physical_devices() }?;

        let properties: Vec<_> = devices
            .iter()
            .map(|&device| unsafe { instance.get_physical_device_properties(device) })
            .collect();
        let device_types: Vec<_> = properties.iter().map(|p| p.device_type).collect();

        let index = preferred_device_index(&device_types)
            .ok_or_else(|| anyhow::anyhow!("No Vulkan-capable GPU found"))?;

        Ok((devices[index], properties[index]))
    }

    fn find_graphics_queue_family(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
    ) -> Result<u32> {
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        graphics_queue_family(&queue_families)
            .ok_or_else(|| anyhow::anyhow!("Selected GPU has no graphics queue"))
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        graphics_queue_family: u32,
    ) -> Result<(ash::Device, vk::Queue)> {
        let queue_priorities = [1.0];
        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(graphics_queue_family)
            .queue_priorities(&queue_priorities)
            .build();

        let extensions = [ash::extensions::khr::Swapchain::name().as_ptr()];

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }
            .context("Failed to create logical device")?;

        let graphics_queue = unsafe { device.get_device_queue(graphics_queue_family, 0) };

        Ok((device, graphics_queue))
    }

    fn create_allocator(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: &ash::Device,
    ) -> Result<Allocator> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })
        .context("Failed to create GPU allocator")?;

        Ok(allocator)
    }

    pub fn allocator(&self) -> Arc<Mutex<Allocator>> {
        Arc::clone(&self.allocator)
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

/// First discrete GPU, otherwise whatever was enumerated first.
pub fn preferred_device_index(device_types: &[vk::PhysicalDeviceType]) -> Option<usize> {
    if device_types.is_empty() {
        return None;
    }

    Some(
        device_types
            .iter()
            .position(|&ty| ty == vk::PhysicalDeviceType::DISCRETE_GPU)
            .unwrap_or(0),
    )
}

pub fn graphics_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|props| props.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .map(|i| i as u32)
}

unsafe fn lossy(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let data = &*p_callback_data;

    if cfg!(debug_assertions) && MUTED_MESSAGE_IDS.contains(&data.message_id_number) {
        return vk::FALSE;
    }

    let level = match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::Level::Error,
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::Level::Warn,
        _ => log::Level::Debug,
    };

    log::log!(
        level,
        "[Vulkan] {:?} <{}> ({}): {}",
        message_type,
        lossy(data.p_message_id_name),
        data.message_id_number,
        lossy(data.p_message)
    );

    if data.queue_label_count > 0 {
        let labels =
            std::slice::from_raw_parts(data.p_queue_labels, data.queue_label_count as usize);
        for label in labels {
            log::log!(level, "[Vulkan]   queue label <{}>", lossy(label.p_label_name));
        }
    }

    if data.cmd_buf_label_count > 0 {
        let labels =
            std::slice::from_raw_parts(data.p_cmd_buf_labels, data.cmd_buf_label_count as usize);
        for label in labels {
            log::log!(level, "[Vulkan]   command buffer label <{}>", lossy(label.p_label_name));
        }
    }

    if data.object_count > 0 {
        let objects = std::slice::from_raw_parts(data.p_objects, data.object_count as usize);
        for (i, object) in objects.iter().enumerate() {
            log::log!(
                level,
                "[Vulkan]   object {}: {:?} {:#x} <{}>",
                i,
                object.object_type,
                object.object_handle,
                lossy(object.p_object_name)
            );
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_discrete_gpu() {
        let types = [
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vk::PhysicalDeviceType::CPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vk::PhysicalDeviceType::DISCRETE_GPU,
        ];
        assert_eq!(preferred_device_index(&types), Some(2));
    }

    #[test]
    fn falls_back_to_first_device() {
        let types = [vk::PhysicalDeviceType::VIRTUAL_GPU, vk::PhysicalDeviceType::INTEGRATED_GPU];
        assert_eq!(preferred_device_index(&types), Some(0));
    }

    #[test]
    fn no_devices() {
        assert_eq!(preferred_device_index(&[]), None);
    }

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn first_graphics_family_wins() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::GRAPHICS),
        ];
        assert_eq!(graphics_queue_family(&families), Some(1));
    }

    #[test]
    fn compute_only_device_has_no_graphics_family() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert_eq!(graphics_queue_family(&families), None);
    }
}
