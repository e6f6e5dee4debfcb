//! WGPU 核心上下文封装
//!
//! 提供：
//! - WgpuContext: 持有 adapter, device, queue，并可配置窗口 Surface

pub mod context;

pub use context::WgpuContext;
