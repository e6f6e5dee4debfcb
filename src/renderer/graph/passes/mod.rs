//! 渲染 Pass 实现
//!
//! 渲染图的固定节点，按执行顺序：
//!
//! - [`DepthPrepass`]: 相机深度
//! - [`ShadowPass`]: 方向光阴影贴图（单张或级联）
//! - [`ForwardPass`]: 前向不透明着色
//! - [`TransparentPass`] / [`ResolvePass`]: 加权混合 OIT
//! - [`SkyboxPass`]: 环境立方体贴图
//! - [`DebugDrawPass`]: 调试线
//! - [`ShowTexturePass`]: 诊断纹理

pub mod debug_draw;
pub mod depth;
pub mod forward;
pub mod shadow;
pub mod show_texture;
pub mod skybox;
pub mod transparent;

pub use debug_draw::DebugDrawPass;
pub use depth::DepthPrepass;
pub use forward::ForwardPass;
pub use shadow::{ShadowFrame, ShadowMap, ShadowPass, compute_shadow_frame, shadow_map_extent};
pub use show_texture::ShowTexturePass;
pub use skybox::SkyboxPass;
pub use transparent::{ResolvePass, TransparentPass};
