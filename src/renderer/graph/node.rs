//! 渲染节点 Trait
//!
//! 渲染图中的每个 Pass 都是一个节点，按固定顺序执行：
//! 深度预通道 → 阴影 → 前向不透明 → 透明累积 → 透明合成 → 天空盒 → 调试线 → 诊断纹理

use super::context::{ExecuteContext, PrepareContext};

/// 渲染节点 Trait
///
/// - `prepare` 接收 `PrepareContext`（可变），生成 PassCache、上传数据、解析管线
/// - `run` 接收 `ExecuteContext`（只读）+ `CommandEncoder`，只录制命令
///
/// 每个节点在 `run` 中声明完整的固定功能状态，不依赖上一个节点留下的状态。
pub trait RenderNode {
    /// 节点名称，用作 GPU 调试组标签
    fn name(&self) -> &str;

    /// 准备阶段
    fn prepare(&mut self, _ctx: &mut PrepareContext) {}

    /// 执行阶段：录制 GPU 渲染命令
    fn run(&self, ctx: &ExecuteContext, encoder: &mut wgpu::CommandEncoder);
}
