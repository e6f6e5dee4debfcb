//! wgpu Context
//!
//! The [`WgpuContext`] holds the core GPU handles: adapter, device and queue.
//! It does not own a surface: the render graph draws into any texture view
//! the caller provides, a swapchain image or an offscreen target alike.
//! [`WgpuContext::configure_surface`] prepares a window surface for the
//! applications that present.

use crate::errors::{Result, UmbraError};
use crate::renderer::settings::RendererSettings;

/// Features the render graph uses when the adapter offers them.
const OPTIONAL_FEATURES: [wgpu::Features; 3] = [
    wgpu::Features::INDIRECT_FIRST_INSTANCE,
    wgpu::Features::POLYGON_MODE_LINE,
    wgpu::Features::POLYGON_MODE_POINT,
];

/// Core wgpu context holding GPU handles.
pub struct WgpuContext {
    /// The adapter the device was created from
    pub adapter: wgpu::Adapter,
    /// The wgpu device for GPU operations
    pub device: wgpu::Device,
    /// The command queue for submitting work
    pub queue: wgpu::Queue,
    /// Features enabled on the device
    pub features: wgpu::Features,
    /// Clear color for the frame
    pub clear_color: wgpu::Color,
    /// Present mode selection of configured surfaces
    pub vsync: bool,
}

impl WgpuContext {
    /// Requests an adapter and a device.
    ///
    /// `compatible_surface` steers adapter selection towards one able to
    /// present to it; pass `None` for headless rendering.
    pub async fn new(
        instance: &wgpu::Instance,
        settings: &RendererSettings,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: settings.power_preference,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| UmbraError::AdapterRequestFailed(e.to_string()))?;

        let info = adapter.get_info();
        log::info!("Using adapter '{}' ({:?}, {:?})", info.name, info.backend, info.device_type);

        let supported = adapter.features();
        let features = OPTIONAL_FEATURES
            .into_iter()
            .filter(|&feature| supported.contains(feature))
            .fold(settings.required_features, |acc, feature| acc | feature);
        if !features.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE) {
            log::warn!("INDIRECT_FIRST_INSTANCE unsupported, pass caches are drawn one command at a time");
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Umbra Device"),
                required_features: features,
                required_limits: settings.required_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        Ok(Self {
            adapter,
            device,
            queue,
            features,
            clear_color: settings.clear_color,
            vsync: settings.vsync,
        })
    }

    /// Configures `surface` for presentation at the given size.
    pub fn configure_surface(
        &self,
        surface: &wgpu::Surface<'_>,
        width: u32,
        height: u32,
    ) -> Result<wgpu::SurfaceConfiguration> {
        let mut config = surface
            .get_default_config(&self.adapter, width.max(1), height.max(1))
            .ok_or(UmbraError::SurfaceNotSupported)?;

        config.present_mode = if self.vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        surface.configure(&self.device, &config);
        Ok(config)
    }

    /// Whether pass caches can be submitted with multi draw indirect.
    ///
    /// Each indirect command selects its instance data through its first
    /// instance, which needs `INDIRECT_FIRST_INSTANCE`.
    #[inline]
    #[must_use]
    pub fn supports_multi_draw(&self) -> bool {
        self.features.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE)
    }
}
