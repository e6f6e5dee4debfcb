//! 渲染图
//!
//! 提供：
//! - RenderGraph: 固定顺序的渲染节点执行器，拥有每帧复用的 GPU 资源
//! - FrameData: 每帧从 Scene 提取的 CPU 数据
//! - PassCache: 按 DrawKey 排序合批后的间接绘制命令
//! - TrackedRenderPass: 带状态追踪的渲染通道
//! - RenderNode: 渲染节点 Trait
//! - 阴影视锥拟合、裁剪与调试绘制工具

pub mod clipping;
pub mod context;
pub mod debug_draw;
pub mod frame;
#[allow(clippy::module_inception)]
pub mod graph;
pub mod node;
pub mod pass;
pub mod pass_cache;
pub mod passes;
pub mod render_state;
pub mod shadow_utils;
pub mod targets;
pub mod ubos;

pub use context::{ExecuteContext, GraphShared, PrepareContext};
pub use debug_draw::{DebugDrawList, DebugVertex};
pub use frame::FrameData;
pub use graph::RenderGraph;
pub use node::RenderNode;
pub use pass::TrackedRenderPass;
pub use pass_cache::{DrawCall, DrawElementsIndirectCommand, DrawInstance, DrawKey, PassCache, prepare_pass};
pub use render_state::PassState;
