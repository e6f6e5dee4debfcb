//! Render Graph Context System
//!
//! Provides the state shared by the passes of the render graph, and two
//! phase-separated contexts handing it out:
//!
//! - [`GraphShared`]: bind group layouts, uniform buffers, the object and
//!   lighting bind groups and the shadow map. Owned by the graph, passed to
//!   the passes read-only.
//!
//! - [`PrepareContext`]: Mutable context for the **prepare** phase. Passes
//!   build their pass caches, upload them and resolve their pipelines here.
//!
//! - [`ExecuteContext`]: Immutable context for the **execute** phase. Passes
//!   record GPU commands here.
//!
//! # Bind Group Layout
//!
//! | Group | Content                                           | Used by            |
//! |-------|---------------------------------------------------|--------------------|
//! | 0     | Viewing block (dynamic offset selects the view)   | Every pass         |
//! | 1     | Transforms, palettes, materials, frame block      | Geometry passes    |
//! | 2     | Lights, light matrices, cascades, shadow map, env | Shading passes     |
//! | 3     | Material context texture                          | Shading passes     |
//!
//! Depth-only pipelines are built against groups 0 and 1 only.

use std::num::NonZeroU64;

use glam::Mat4;

use crate::renderer::dynamic_buffer::DynamicBuffer;
use crate::renderer::graph::debug_draw::DebugDrawList;
use crate::renderer::graph::frame::FrameData;
use crate::renderer::graph::passes::shadow::ShadowMap;
use crate::renderer::graph::render_state::PassState;
use crate::renderer::graph::targets::FrameTargets;
use crate::renderer::graph::ubos::{FrameBlock, GraphUbos, LightViewProjection, ShadowCascadeBlock, ViewingBlock};
use crate::renderer::pipeline::{GeometryLayout, GeometryPipelineDesc, GeometryPipelineKey, PipelineCache, RenderPipelineId};
use crate::renderer::resource_manager::{ResourceManager, TrackedBindGroup};
use crate::renderer::settings::{GraphControls, ShadowControls};
use crate::resources::material::MaterialParams;
use crate::resources::storage::{ProgramId, Storage};
use crate::scene::light::LightsData;
use crate::scene::part_list::PartList;

// ─── Layouts ──────────────────────────────────────────────────────────────────

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages, size: usize, dynamic: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

fn storage_entry(binding: u32, element_size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(element_size as u64),
        },
        count: None,
    }
}

/// Bind group and pipeline layouts shared by the passes.
pub struct GraphLayouts {
    pub view: wgpu::BindGroupLayout,
    pub objects: wgpu::BindGroupLayout,
    pub lighting: wgpu::BindGroupLayout,
    pub material: wgpu::BindGroupLayout,
    pub depth_pipeline: wgpu::PipelineLayout,
    pub shading_pipeline: wgpu::PipelineLayout,
}

impl GraphLayouts {
    pub fn new(device: &wgpu::Device, material: &wgpu::BindGroupLayout) -> Self {
        let view = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("View Layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                std::mem::size_of::<ViewingBlock>(),
                true,
            )],
        });

        let objects = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Objects Layout"),
            entries: &[
                storage_entry(0, std::mem::size_of::<Mat4>()),
                storage_entry(1, std::mem::size_of::<Mat4>()),
                storage_entry(2, std::mem::size_of::<MaterialParams>()),
                uniform_entry(
                    3,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    std::mem::size_of::<FrameBlock>(),
                    false,
                ),
            ],
        });

        let fragment = wgpu::ShaderStages::FRAGMENT;
        let lighting = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lighting Layout"),
            entries: &[
                uniform_entry(0, fragment, std::mem::size_of::<LightsData>(), false),
                uniform_entry(1, fragment, std::mem::size_of::<LightViewProjection>(), false),
                uniform_entry(2, fragment, std::mem::size_of::<ShadowCascadeBlock>(), false),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: fragment,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2Array,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: fragment,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: fragment,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: fragment,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let depth_pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Depth Pipeline Layout"),
            bind_group_layouts: &[Some(&view), Some(&objects)],
            immediate_size: 0,
        });
        let shading_pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shading Pipeline Layout"),
            bind_group_layouts: &[Some(&view), Some(&objects), Some(&lighting), Some(material)],
            immediate_size: 0,
        });

        Self {
            view,
            objects,
            lighting,
            material: material.clone(),
            depth_pipeline,
            shading_pipeline,
        }
    }

    #[must_use]
    pub fn pipeline_layout(&self, layout: GeometryLayout) -> &wgpu::PipelineLayout {
        match layout {
            GeometryLayout::Depth => &self.depth_pipeline,
            GeometryLayout::Shading => &self.shading_pipeline,
        }
    }
}

// ─── Shared State ─────────────────────────────────────────────────────────────

/// Frame-scoped GPU state read by every pass.
pub struct GraphShared {
    pub ubos: GraphUbos,
    pub layouts: GraphLayouts,
    pub shadow_map: ShadowMap,

    pub view_bind_group: TrackedBindGroup,
    pub objects_bind_group: TrackedBindGroup,
    pub lighting_bind_group: TrackedBindGroup,

    transforms: DynamicBuffer,
    palettes: DynamicBuffer,
    /// Buffer ids the objects bind group was built from.
    objects_sources: [u64; 3],
}

impl GraphShared {
    pub fn new(device: &wgpu::Device, resources: &ResourceManager, shadow_controls: &ShadowControls) -> Self {
        let ubos = GraphUbos::new(device);
        let layouts = GraphLayouts::new(device, resources.material_layout());
        let shadow_map = ShadowMap::new(device, shadow_controls);

        let mat4 = std::mem::size_of::<Mat4>() as u64;
        let storage = wgpu::BufferUsages::STORAGE;
        let transforms = DynamicBuffer::new(device, "Instance Transforms", storage, mat4 * 256);
        let palettes = DynamicBuffer::new(device, "Rigging Palettes", storage, mat4 * 256);

        let view_bind_group = TrackedBindGroup::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("View BindGroup"),
            layout: &layouts.view,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubos.view_binding(),
            }],
        }));

        let objects_bind_group = Self::create_objects_bind_group(device, &layouts, &ubos, &transforms, &palettes, resources);
        let lighting_bind_group = Self::create_lighting_bind_group(device, &layouts, &ubos, &shadow_map, resources);

        Self {
            objects_sources: [transforms.id(), palettes.id(), resources.material_buffer().id()],
            ubos,
            layouts,
            shadow_map,
            view_bind_group,
            objects_bind_group,
            lighting_bind_group,
            transforms,
            palettes,
        }
    }

    fn create_objects_bind_group(
        device: &wgpu::Device,
        layouts: &GraphLayouts,
        ubos: &GraphUbos,
        transforms: &DynamicBuffer,
        palettes: &DynamicBuffer,
        resources: &ResourceManager,
    ) -> TrackedBindGroup {
        TrackedBindGroup::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Objects BindGroup"),
            layout: &layouts.objects,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: transforms.buffer().as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: palettes.buffer().as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: resources.material_buffer().buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry { binding: 3, resource: ubos.frame.as_entire_binding() },
            ],
        }))
    }

    fn create_lighting_bind_group(
        device: &wgpu::Device,
        layouts: &GraphLayouts,
        ubos: &GraphUbos,
        shadow_map: &ShadowMap,
        resources: &ResourceManager,
    ) -> TrackedBindGroup {
        TrackedBindGroup::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lighting BindGroup"),
            layout: &layouts.lighting,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: ubos.lights.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: ubos.light_view_projection.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: ubos.shadow_cascade.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(shadow_map.array_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(shadow_map.sampler()),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(resources.environment_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(resources.linear_sampler()),
                },
            ],
        }))
    }

    /// Uploads the frame's transforms and palettes, rebuilding the objects
    /// bind group when one of its buffers was reallocated.
    pub fn upload_objects(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        part_list: &PartList,
        resources: &ResourceManager,
    ) {
        // Storage bindings cannot be empty: keep one identity matrix.
        let identity = [Mat4::IDENTITY];
        let transforms: &[Mat4] =
            if part_list.instance_transforms.is_empty() { &identity } else { &part_list.instance_transforms };
        let palettes: &[Mat4] =
            if part_list.rigging_palettes.is_empty() { &identity } else { &part_list.rigging_palettes };

        self.transforms.write(device, queue, bytemuck::cast_slice(transforms));
        self.palettes.write(device, queue, bytemuck::cast_slice(palettes));

        let sources = [self.transforms.id(), self.palettes.id(), resources.material_buffer().id()];
        if sources != self.objects_sources {
            log::debug!("Recreating objects BindGroup (buffer resized)");
            self.objects_bind_group = Self::create_objects_bind_group(
                device,
                &self.layouts,
                &self.ubos,
                &self.transforms,
                &self.palettes,
                resources,
            );
            self.objects_sources = sources;
        }
    }

    /// Re-creates the shadow map if the controls changed its format, then
    /// rebuilds the lighting bind group when the shadow map or the
    /// environment changed.
    pub fn refresh_lighting(
        &mut self,
        device: &wgpu::Device,
        shadow_controls: &ShadowControls,
        resources: &ResourceManager,
        environment_changed: bool,
    ) {
        let shadow_map_changed = self.shadow_map.review_controls(device, shadow_controls);
        if shadow_map_changed || environment_changed {
            self.lighting_bind_group =
                Self::create_lighting_bind_group(device, &self.layouts, &self.ubos, &self.shadow_map, resources);
        }
    }
}

// ─── Phase Contexts ───────────────────────────────────────────────────────────

/// Mutable context of the prepare phase.
pub struct PrepareContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub storage: &'a Storage,
    pub frame: &'a FrameData,
    pub shared: &'a GraphShared,
    pub resources: &'a ResourceManager,
    pub pipelines: &'a mut PipelineCache,
    pub targets: &'a FrameTargets,
    pub controls: &'a GraphControls,
    pub shadow_controls: &'a ShadowControls,
    pub debug_lines: &'a DebugDrawList,
    pub features: wgpu::Features,
    pub output_format: wgpu::TextureFormat,
    /// Shadow map layers rendered this frame, 0 without shadow casters.
    pub shadow_layers: usize,
}

impl PrepareContext<'_> {
    /// Pipeline drawing `program` with the given fixed-function state.
    ///
    /// Returns `None` when the program has no shader module yet.
    pub fn geometry_pipeline(
        &mut self,
        program: ProgramId,
        topology: wgpu::PrimitiveTopology,
        layout: GeometryLayout,
        state: &PassState,
        color_formats: &[wgpu::TextureFormat],
        use_cascades: Option<bool>,
    ) -> Option<RenderPipelineId> {
        let module = self.resources.shader_module(program)?;
        let source = self.storage.program(program);
        let key = GeometryPipelineKey::new(
            program,
            source.generation(),
            layout,
            topology,
            state,
            color_formats,
            use_cascades,
        );
        let desc = GeometryPipelineDesc {
            label: source.label(),
            module,
            layout: self.shared.layouts.pipeline_layout(layout),
            constants: source.constants(),
        };
        Some(self.pipelines.get_or_create_geometry(self.device, &key, &desc))
    }
}

/// Read-only context of the execute phase.
pub struct ExecuteContext<'a> {
    pub shared: &'a GraphShared,
    pub resources: &'a ResourceManager,
    pub pipelines: &'a PipelineCache,
    pub targets: &'a FrameTargets,
    /// Color target of the frame.
    pub output: &'a wgpu::TextureView,
    pub clear_color: wgpu::Color,
    /// Pass caches are submitted with multi draw indirect.
    pub multi_draw: bool,
}
