//! 渲染器
//!
//! - [`core`]: wgpu 设备上下文
//! - [`settings`]: 设备创建参数与每帧控制项
//! - [`resource_manager`]: Storage 到 GPU 资源的同步
//! - [`pipeline`]: 渲染管线缓存与顶点布局
//! - [`graph`]: 渲染图与各个 Pass

pub mod core;
pub mod dynamic_buffer;
pub mod gpu_texture;
pub mod graph;
pub mod pipeline;
pub mod resource_manager;
pub mod settings;

pub use self::core::WgpuContext;
pub use graph::RenderGraph;
pub use settings::{GraphControls, PolygonModeSetting, RendererSettings, ShadowControls};
