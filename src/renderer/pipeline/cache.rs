//! Pipeline Cache
//!
//! Owner of the render pipelines drawing pass caches. Pipelines are stored
//! in a contiguous `Vec` and addressed through lightweight
//! [`RenderPipelineId`] handles, deduplicated by [`GeometryPipelineKey`].
//!
//! A key embeds the program generation, so a recompiled program naturally
//! misses the cache. [`PipelineCache::clear_program`] releases the stale
//! pipelines of a program once its new code is accepted.
//!
//! Builtin passes (resolve, skybox, debug lines, diagnostic quads) use a
//! fixed pipeline each and keep it themselves.

use rustc_hash::FxHashMap;

use crate::renderer::pipeline::pipeline_key::GeometryPipelineKey;
use crate::renderer::pipeline::vertex::geometry_buffers;
use crate::resources::storage::ProgramId;

/// Handle to a cached `wgpu::RenderPipeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPipelineId(pub(crate) u32);

impl RenderPipelineId {
    /// Raw index into the pipeline storage array.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Inputs of a pipeline creation, borrowed from the program and the graph.
pub struct GeometryPipelineDesc<'a> {
    pub label: &'a str,
    pub module: &'a wgpu::ShaderModule,
    pub layout: &'a wgpu::PipelineLayout,
    /// Program constants, `USE_CASCADES` excluded.
    pub constants: &'a [(String, f64)],
}

/// Central pipeline storage and deduplication cache.
#[derive(Default)]
pub struct PipelineCache {
    // ---- Storage (indexed by Id, released slots are None) ----
    render_pipelines: Vec<Option<wgpu::RenderPipeline>>,
    free_slots: Vec<u32>,

    // ---- Canonical lookup ----
    geometry_lookup: FxHashMap<GeometryPipelineKey, RenderPipelineId>,
}

impl PipelineCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve a render pipeline by handle, `None` once released.
    #[inline]
    #[must_use]
    pub fn get_render_pipeline(&self, id: RenderPipelineId) -> Option<&wgpu::RenderPipeline> {
        self.render_pipelines.get(id.index()).and_then(Option::as_ref)
    }

    /// Look up or create the pipeline drawing `key`.
    pub fn get_or_create_geometry(
        &mut self,
        device: &wgpu::Device,
        key: &GeometryPipelineKey,
        desc: &GeometryPipelineDesc<'_>,
    ) -> RenderPipelineId {
        if let Some(&id) = self.geometry_lookup.get(key) {
            return id;
        }

        log::debug!(
            "Compiling pipeline '{}' (generation {}, {:?}, {:?}, cascades {:?})",
            desc.label,
            key.generation,
            key.layout,
            key.polygon_mode,
            key.use_cascades
        );

        let mut constants: Vec<(&str, f64)> =
            desc.constants.iter().map(|(name, value)| (name.as_str(), *value)).collect();
        if let Some(use_cascades) = key.use_cascades {
            constants.push(("USE_CASCADES", if use_cascades { 1.0 } else { 0.0 }));
        }
        let compilation_options = wgpu::PipelineCompilationOptions {
            constants: &constants,
            zero_initialize_workgroup_memory: true,
        };

        let color_targets: Vec<Option<wgpu::ColorTargetState>> =
            key.color_targets.iter().map(|&target| Some(target.into())).collect();
        let vertex_buffers = geometry_buffers();

        // Depth-only pipelines rasterize without a fragment stage.
        let fragment = (!color_targets.is_empty()).then(|| wgpu::FragmentState {
            module: desc.module,
            entry_point: Some("fs_main"),
            targets: &color_targets,
            compilation_options: compilation_options.clone(),
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(desc.layout),
            vertex: wgpu::VertexState {
                module: desc.module,
                entry_point: Some("vs_main"),
                buffers: &vertex_buffers,
                compilation_options: compilation_options.clone(),
            },
            fragment,
            primitive: key.primitive(),
            depth_stencil: key.depth_stencil.map(Into::into),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let id = self.push_render_pipeline(pipeline);
        self.geometry_lookup.insert(key.clone(), id);
        id
    }

    // ── Cache Invalidation ───────────────────────────────────────────────────

    /// Releases every pipeline built from `program`, whatever its generation.
    ///
    /// Returns the number of pipelines released.
    pub fn clear_program(&mut self, program: ProgramId) -> usize {
        let mut released = Vec::new();
        self.geometry_lookup.retain(|key, id| {
            if key.program == program {
                released.push(*id);
                false
            } else {
                true
            }
        });
        for id in &released {
            self.render_pipelines[id.index()] = None;
            self.free_slots.push(id.0);
        }
        released.len()
    }

    /// Clears all cached pipelines.
    pub fn clear(&mut self) {
        self.render_pipelines.clear();
        self.free_slots.clear();
        self.geometry_lookup.clear();
    }

    /// Number of live render pipelines.
    #[must_use]
    pub fn render_pipeline_count(&self) -> usize {
        self.geometry_lookup.len()
    }

    fn push_render_pipeline(&mut self, pipeline: wgpu::RenderPipeline) -> RenderPipelineId {
        if let Some(slot) = self.free_slots.pop() {
            self.render_pipelines[slot as usize] = Some(pipeline);
            return RenderPipelineId(slot);
        }
        let id = RenderPipelineId(self.render_pipelines.len() as u32);
        self.render_pipelines.push(Some(pipeline));
        id
    }
}
