//! 渲染管线模块
//!
//! 管理管线状态：
//! - PipelineCache: 管线缓存，按程序与固定功能状态去重
//! - pipeline_key: 可哈希的 wgpu 状态镜像
//! - vertex: 顶点布局

pub mod cache;
pub mod pipeline_key;
pub mod vertex;

pub use cache::{GeometryPipelineDesc, PipelineCache, RenderPipelineId};
pub use pipeline_key::{GeometryLayout, GeometryPipelineKey};
