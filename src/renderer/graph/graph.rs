//! 渲染图执行器
//!
//! `RenderGraph` 拥有全部 GPU 状态与固定顺序的渲染节点，每帧：
//!
//! 1. 提取 `FrameData`（零件列表、包围盒、灯光、相机）
//! 2. 同步 Storage 到 GPU（几何、材质、纹理、着色器模块）
//! 3. 刷新阴影贴图与光照绑定组，上传变换与骨骼调色板
//! 4. 拟合光源视锥（`fill_shadow_map`），写入阴影索引与 UBO
//! 5. 所有节点 `prepare`
//! 6. 单个 CommandEncoder 按顺序录制所有节点（每个节点一个 Debug Group），提交一次
//!
//! 节点顺序：深度预通道 → 阴影 → 前向不透明 → 透明累积 → 透明合成 →
//! 天空盒 → 调试线 → 诊断纹理

use std::time::Instant;

use super::context::{ExecuteContext, GraphShared, PrepareContext};
use super::debug_draw::DebugDrawList;
use super::frame::FrameData;
use super::node::RenderNode;
use super::passes::{
    DebugDrawPass, DepthPrepass, ForwardPass, ResolvePass, ShadowPass, ShowTexturePass, SkyboxPass, TransparentPass,
};
use super::targets::FrameTargets;
use super::ubos::CAMERA_VIEW_SLOT;
use crate::renderer::core::WgpuContext;
use crate::renderer::pipeline::PipelineCache;
use crate::renderer::resource_manager::ResourceManager;
use crate::renderer::settings::{GraphControls, ShadowControls};
use crate::resources::storage::Storage;
use crate::scene::camera::Camera;
use crate::scene::scene::Scene;

/// 渲染图
///
/// 持有设备与队列的克隆（wgpu 资源句柄可廉价克隆），
/// 以及每帧复用的所有 GPU 资源。
pub struct RenderGraph {
    /// 每帧读取的图控制项
    pub controls: GraphControls,
    /// 阴影控制项，切换级联或 PCF 会重建阴影贴图
    pub shadow_controls: ShadowControls,
    /// 本帧调试线，帧末清空
    pub debug_draw: DebugDrawList,

    device: wgpu::Device,
    queue: wgpu::Queue,
    features: wgpu::Features,
    multi_draw: bool,
    clear_color: wgpu::Color,
    output_format: wgpu::TextureFormat,

    resources: ResourceManager,
    shared: GraphShared,
    pipelines: PipelineCache,
    targets: FrameTargets,

    depth: DepthPrepass,
    shadow: ShadowPass,
    forward: ForwardPass,
    transparent: TransparentPass,
    resolve: ResolvePass,
    skybox: SkyboxPass,
    debug_lines: DebugDrawPass,
    show_texture: ShowTexturePass,

    frame_index: u32,
    start: Instant,
}

impl RenderGraph {
    /// 创建渲染图，并立即同步 `storage` 中已有的资源。
    pub fn new(
        context: &WgpuContext,
        storage: &Storage,
        size: (u32, u32),
        output_format: wgpu::TextureFormat,
    ) -> Self {
        let device = context.device.clone();
        let queue = context.queue.clone();
        let shadow_controls = ShadowControls::default();

        let mut resources = ResourceManager::new(&device, &queue);
        resources.sync(&device, &queue, storage);
        let shared = GraphShared::new(&device, &resources, &shadow_controls);
        let targets = FrameTargets::new(&device, size);

        log::info!(
            "Render graph created: {}x{}, output {output_format:?}, multi draw indirect {}",
            targets.size.0,
            targets.size.1,
            context.supports_multi_draw()
        );

        Self {
            controls: GraphControls::default(),
            shadow_controls,
            debug_draw: DebugDrawList::new(),
            features: context.features,
            multi_draw: context.supports_multi_draw(),
            clear_color: context.clear_color,
            output_format,
            depth: DepthPrepass::new(&device),
            shadow: ShadowPass::new(&device),
            forward: ForwardPass::new(&device),
            transparent: TransparentPass::new(&device),
            resolve: ResolvePass::new(&device),
            skybox: SkyboxPass::new(&device),
            debug_lines: DebugDrawPass::new(&device),
            show_texture: ShowTexturePass::new(&device),
            resources,
            shared,
            pipelines: PipelineCache::new(),
            targets,
            frame_index: 0,
            start: Instant::now(),
            device,
            queue,
        }
    }

    /// 重新分配与尺寸相关的渲染目标
    pub fn resize(&mut self, size: (u32, u32)) {
        if size == self.targets.size {
            return;
        }
        self.targets.resize(&self.device, size);
        log::info!("Render targets resized to {}x{}", self.targets.size.0, self.targets.size.1);
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.targets.size
    }

    #[must_use]
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    #[must_use]
    pub fn output_format(&self) -> wgpu::TextureFormat {
        self.output_format
    }

    /// 当前缓存的渲染管线数量
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.render_pipeline_count()
    }

    /// 重新读取并校验所有程序，替换通过校验的着色器模块，
    /// 并丢弃它们的管线。任一程序失败时返回 `false`。
    pub fn recompile_shaders(&mut self, storage: &mut Storage) -> bool {
        let success = storage.recompile_programs();
        let report = self.resources.sync(&self.device, &self.queue, storage);
        let cleared: usize = report.recompiled.iter().map(|&program| self.pipelines.clear_program(program)).sum();
        log::info!(
            "Shader recompilation: {} programs swapped, {cleared} pipelines dropped",
            report.recompiled.len()
        );
        success
    }

    /// 渲染一帧到 `target`
    ///
    /// `target` 必须与 [`output_format`](Self::output_format) 一致，
    /// 尺寸与 [`size`](Self::size) 一致。
    pub fn render_frame(&mut self, scene: &Scene, camera: &Camera, storage: &Storage, target: &wgpu::TextureView) {
        let time = self.start.elapsed().as_secs_f32();
        let mut frame = FrameData::extract(scene, camera, storage, self.targets.size, self.frame_index, time);

        // 1. Storage → GPU
        let report = self.resources.sync(&self.device, &self.queue, storage);
        for &program in &report.recompiled {
            self.pipelines.clear_program(program);
        }
        self.shared
            .refresh_lighting(&self.device, &self.shadow_controls, &self.resources, report.environment_changed);
        self.shared
            .upload_objects(&self.device, &self.queue, &frame.part_list, &self.resources);

        // 2. 阴影视锥与 UBO
        let shadows = self.shadow.fill_shadow_map(
            &self.shared,
            &self.queue,
            &scene.lights,
            &frame.scene_bounds,
            camera,
            &self.shadow_controls,
            Some(&mut self.debug_draw),
        );
        frame.lights.set_shadow_map_indices(&shadows.shadow_map_indices);

        let ubos = &self.shared.ubos;
        ubos.load_frame(&self.queue, &frame.frame);
        ubos.load_view(&self.queue, CAMERA_VIEW_SLOT, &frame.camera_view);
        ubos.load_lights(&self.queue, &frame.lights);

        // 3. Prepare
        {
            let mut ctx = PrepareContext {
                device: &self.device,
                queue: &self.queue,
                storage,
                frame: &frame,
                shared: &self.shared,
                resources: &self.resources,
                pipelines: &mut self.pipelines,
                targets: &self.targets,
                controls: &self.controls,
                shadow_controls: &self.shadow_controls,
                debug_lines: &self.debug_draw,
                features: self.features,
                output_format: self.output_format,
                shadow_layers: shadows.layer_count(),
            };
            let nodes: [&mut dyn RenderNode; 8] = [
                &mut self.depth,
                &mut self.shadow,
                &mut self.forward,
                &mut self.transparent,
                &mut self.resolve,
                &mut self.skybox,
                &mut self.debug_lines,
                &mut self.show_texture,
            ];
            for node in nodes {
                node.prepare(&mut ctx);
            }
        }

        // 4. Execute
        let ctx = ExecuteContext {
            shared: &self.shared,
            resources: &self.resources,
            pipelines: &self.pipelines,
            targets: &self.targets,
            output: target,
            clear_color: self.clear_color,
            multi_draw: self.multi_draw,
        };
        let nodes: [&dyn RenderNode; 8] = [
            &self.depth,
            &self.shadow,
            &self.forward,
            &self.transparent,
            &self.resolve,
            &self.skybox,
            &self.debug_lines,
            &self.show_texture,
        ];

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Graph Encoder"),
        });
        for node in nodes {
            encoder.push_debug_group(node.name());
            node.run(&ctx, &mut encoder);
            encoder.pop_debug_group();
        }
        self.queue.submit(std::iter::once(encoder.finish()));

        self.debug_draw.clear();
        self.frame_index = self.frame_index.wrapping_add(1);
    }
}
