//! Headless Frame
//!
//! Builds a small scene (ground plane, opaque cubes, a glass cube, a
//! shadow-casting sun and a point light), then renders it offscreen with
//! cascaded and single shadow maps, with and without the debug overlays.
//!
//! ```text
//! RUST_LOG=info cargo run -p headless_frame
//! ```

use glam::{Mat4, Quat, Vec3, Vec4};
use umbra::renderer::PolygonModeSetting;
use umbra::resources::{MaterialId, TextureSemantic, VertexStreamId, box_stream, plane_stream};
use umbra::scene::MeshPart;
use umbra::{
    Camera, DirectionalLight, ForwardTechnique, Material, MaterialParams, Node, PointLight, RenderGraph,
    RendererSettings, Scene, Storage, TextureData, WgpuContext,
};

const SIZE: (u32, u32) = (1280, 720);
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn build_scene(storage: &mut Storage) -> anyhow::Result<Scene> {
    let effects = storage.install_default_effects()?;

    let cube = storage.add_vertex_stream(box_stream("cube", 1.0, 1.0, 1.0));
    let ground = storage.add_vertex_stream(plane_stream("ground", 40.0));

    let checker: Vec<u8> = (0..8 * 8)
        .flat_map(|i| if (i / 8 + i % 8) % 2 == 0 { [200, 200, 200, 255] } else { [90, 90, 90, 255] })
        .collect();
    let checker = storage.add_texture(TextureData::rgba8("checker", 8, 8, checker));
    let sky = storage.add_texture(TextureData::cube_faces(
        "sky",
        [
            [150, 180, 220, 255],
            [150, 180, 220, 255],
            [110, 150, 230, 255],
            [60, 60, 70, 255],
            [150, 180, 220, 255],
            [150, 180, 220, 255],
        ],
    ));
    storage.set_semantic_texture(TextureSemantic::Environment, sky);

    let floor = storage.add_material(
        Material::new("floor", effects.opaque, MaterialParams::default().with_metallic_roughness(0.0, 0.9))
            .with_texture(checker),
    );
    let metal = storage.add_material(Material::new(
        "metal",
        effects.opaque,
        MaterialParams::with_color(Vec4::new(0.9, 0.6, 0.3, 1.0)).with_metallic_roughness(1.0, 0.3),
    ));
    let glass = storage.add_material(Material::new(
        "glass",
        effects.transparent,
        MaterialParams::with_color(Vec4::new(0.3, 0.6, 1.0, 0.4)),
    ));

    let part = |stream: VertexStreamId, material: MaterialId| MeshPart {
        vertex_stream: stream,
        region: storage.vertex_stream(stream).full_region(),
        material,
    };

    let mut scene = Scene::new();
    scene.show_skybox = true;
    scene.add_node(Node::new("ground").with_part(part(ground, floor)));

    let pillars = scene.add_node(Node::new("pillars"));
    for i in 0..8 {
        let angle = i as f32 * std::f32::consts::TAU / 8.0;
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::new(1.0, 3.0, 1.0),
            Quat::from_rotation_y(angle),
            Vec3::new(angle.cos() * 8.0, 1.5, angle.sin() * 8.0),
        );
        let pillar = Node::new(format!("pillar {i}")).with_transform(transform).with_part(part(cube, metal));
        scene.add_to_parent(pillar, pillars);
    }
    scene.add_node(
        Node::new("glass")
            .with_transform(Mat4::from_scale_rotation_translation(Vec3::splat(2.0), Quat::IDENTITY, Vec3::Y))
            .with_part(part(cube, glass)),
    );

    scene.lights.ambient = Vec3::splat(0.05);
    scene.lights.directional.push(
        DirectionalLight::new(Vec3::new(-0.6, -1.0, -0.4), Vec3::new(1.0, 0.95, 0.85)).with_shadows(),
    );
    scene.lights.point.push(PointLight::new(Vec3::new(0.0, 4.0, 0.0), 12.0, Vec3::new(0.3, 0.4, 1.0)));

    Ok(scene)
}

fn offscreen_target(device: &wgpu::Device, size: (u32, u32)) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Output"),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OUTPUT_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let instance = wgpu::Instance::default();
    let context = pollster::block_on(WgpuContext::new(&instance, &RendererSettings::default(), None))?;

    let mut storage = Storage::new();
    let scene = build_scene(&mut storage)?;
    let camera = Camera::new_perspective(50.0, SIZE.0 as f32 / SIZE.1 as f32, 0.1, 200.0)
        .looking_at(Vec3::new(14.0, 9.0, 18.0), Vec3::ZERO, Vec3::Y);

    let output = offscreen_target(&context.device, SIZE);
    let output_view = output.create_view(&wgpu::TextureViewDescriptor::default());

    let mut graph = RenderGraph::new(&context, &storage, SIZE, OUTPUT_FORMAT);

    // 1. Cascaded shadows, PBR.
    graph.render_frame(&scene, &camera, &storage, &output_view);

    // 2. Debug views: cascade tint, frusta and diagnostic quadrants.
    graph.shadow_controls.tint_view_by_cascade = true;
    graph.shadow_controls.debug_draw_frusta = true;
    graph.shadow_controls.debug_draw_which_cascade = Some(usize::MAX);
    graph.controls.show_depth = true;
    graph.controls.show_transparency_targets = true;
    graph.render_frame(&scene, &camera, &storage, &output_view);

    // 3. Single shadow map without PCF, Phong in wireframe.
    graph.shadow_controls = umbra::ShadowControls {
        use_cascades: false,
        use_hardware_pcf: false,
        ..umbra::ShadowControls::default()
    };
    graph.controls.forward_technique = ForwardTechnique::Phong;
    graph.controls.polygon_mode = PolygonModeSetting::Line;
    graph.render_frame(&scene, &camera, &storage, &output_view);

    // 4. Shader reload keeps the inline programs and drops nothing.
    if !graph.recompile_shaders(&mut storage) {
        log::error!("Shader recompilation failed");
    }
    graph.render_frame(&scene, &camera, &storage, &output_view);

    // 5. Half-size output: every size-dependent target is reallocated.
    let half = (SIZE.0 / 2, SIZE.1 / 2);
    let small_view = offscreen_target(&context.device, half).create_view(&wgpu::TextureViewDescriptor::default());
    graph.resize(half);
    graph.render_frame(&scene, &camera, &storage, &small_view);

    log::info!(
        "Rendered {} frames at {}x{}, {} pipelines cached",
        graph.frame_index(),
        SIZE.0,
        SIZE.1,
        graph.pipeline_count()
    );
    Ok(())
}
