// Surface creation and surface property selection
//
// The selection helpers are pure so they can be checked without a GPU.

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::c_char;
use winit::window::Window;

/// Formats we can render the UI into, most preferred first
pub const REQUESTED_FORMATS: [vk::Format; 4] = [
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8_UNORM,
    vk::Format::R8G8B8_UNORM,
];

pub const REQUESTED_COLOR_SPACE: vk::ColorSpaceKHR = vk::ColorSpaceKHR::SRGB_NONLINEAR;

/// Instance extensions needed to present to windows on this display
pub fn required_extensions(window: &Window) -> Result<&'static [*const c_char]> {
    ash_window::enumerate_required_extensions(window.raw_display_handle())
        .context("Failed to enumerate surface extensions")
}

pub fn create_surface(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &Window,
) -> Result<vk::SurfaceKHR> {
    unsafe {
        ash_window::create_surface(
            entry,
            instance,
            window.raw_display_handle(),
            window.raw_window_handle(),
            None,
        )
        .context("Failed to create Vulkan surface")
    }
}

pub fn select_surface_format(
    available: &[vk::SurfaceFormatKHR],
    requested: &[vk::Format],
    color_space: vk::ColorSpaceKHR,
) -> Option<vk::SurfaceFormatKHR> {
    let first = *available.first()?;

    // A lone UNDEFINED entry means the surface takes whatever we ask for
    if available.len() == 1 && first.format == vk::Format::UNDEFINED {
        return Some(match requested.first() {
            Some(&format) => vk::SurfaceFormatKHR { format, color_space },
            None => first,
        });
    }

    let chosen = requested.iter().find_map(|&format| {
        available
            .iter()
            .find(|f| f.format == format && f.color_space == color_space)
            .copied()
    });

    Some(chosen.unwrap_or(first))
}

pub fn select_present_mode(
    available: &[vk::PresentModeKHR],
    requested: &[vk::PresentModeKHR],
) -> vk::PresentModeKHR {
    requested
        .iter()
        .copied()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO) // FIFO is always supported
}

pub fn min_image_count_for(present_mode: vk::PresentModeKHR) -> u32 {
    match present_mode {
        vk::PresentModeKHR::MAILBOX => 3,
        vk::PresentModeKHR::FIFO | vk::PresentModeKHR::FIFO_RELAXED => 2,
        vk::PresentModeKHR::IMMEDIATE => 1,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn undefined_surface_takes_first_request() {
        let available = [format(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        let chosen =
            select_surface_format(&available, &REQUESTED_FORMATS, REQUESTED_COLOR_SPACE).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn request_order_beats_surface_order() {
        let available = [
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen =
            select_surface_format(&available, &REQUESTED_FORMATS, REQUESTED_COLOR_SPACE).unwrap();
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn color_space_must_match() {
        let available = [
            format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::HDR10_ST2084_EXT),
        ];
        let chosen =
            select_surface_format(&available, &REQUESTED_FORMATS, REQUESTED_COLOR_SPACE).unwrap();
        assert_eq!(chosen, available[0]);
    }

    #[test]
    fn no_formats_at_all() {
        assert!(select_surface_format(&[], &REQUESTED_FORMATS, REQUESTED_COLOR_SPACE).is_none());
    }

    #[test]
    fn first_supported_present_mode() {
        let available = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        let requested = [
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
        ];
        assert_eq!(
            select_present_mode(&available, &requested),
            vk::PresentModeKHR::IMMEDIATE
        );
    }

    #[test]
    fn unsupported_present_mode_falls_back_to_fifo() {
        let available = [vk::PresentModeKHR::FIFO];
        assert_eq!(
            select_present_mode(&available, &[vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn image_count_per_present_mode() {
        assert_eq!(min_image_count_for(vk::PresentModeKHR::MAILBOX), 3);
        assert_eq!(min_image_count_for(vk::PresentModeKHR::FIFO), 2);
        assert_eq!(min_image_count_for(vk::PresentModeKHR::FIFO_RELAXED), 2);
        assert_eq!(min_image_count_for(vk::PresentModeKHR::IMMEDIATE), 1);
    }
}
