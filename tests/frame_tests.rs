//! Frame Extraction Tests
//!
//! Tests for:
//! - One opaque cube producing a single draw
//! - Two cubes sharing material and stream batched in one call
//! - Scene bounds and light packing of the extracted frame

use glam::{Mat4, Vec3};

use umbra::renderer::graph::{FrameData, prepare_pass};
use umbra::resources::{
    ForwardTechnique, IndexData, IndexRegion, Material, MaterialParams, PassKind, Storage, Vertex, VertexStreamDesc,
    box_stream,
};
use umbra::scene::light::NO_ENTRY_INDEX;
use umbra::scene::{Camera, DirectionalLight, MeshPart, Node, PointLight, Scene};

const OPAQUE: PassKind = PassKind::Forward(ForwardTechnique::Pbr);

fn camera() -> Camera {
    Camera::new_perspective(45.0, 1.0, 0.1, 100.0).looking_at(Vec3::new(0.0, 2.0, 8.0), Vec3::ZERO, Vec3::Y)
}

/// Storage with one cube stream and one opaque material.
fn cube_storage() -> (Storage, MeshPart) {
    let mut storage = Storage::new();
    let effects = storage.install_default_effects().expect("default effects compile");
    let stream = storage.add_vertex_stream(box_stream("cube", 1.0, 1.0, 1.0));
    let material = storage.add_material(Material::new("grey", effects.opaque, MaterialParams::default()));
    let part = MeshPart {
        vertex_stream: stream,
        region: storage.vertex_stream(stream).full_region(),
        material,
    };
    (storage, part)
}

fn extract(scene: &Scene, storage: &Storage) -> FrameData {
    FrameData::extract(scene, &camera(), storage, (640, 480), 0, 0.0)
}

// ============================================================================
// Pass caches
// ============================================================================

#[test]
fn single_cube_is_one_draw() {
    let (storage, part) = cube_storage();
    let mut scene = Scene::new();
    scene.add_node(Node::new("cube").with_part(part));

    let frame = extract(&scene, &storage);
    let cache = prepare_pass(OPAQUE, &frame.part_list, &storage);

    assert_eq!(cache.calls.len(), 1);
    assert_eq!(cache.draw_commands.len(), 1);
    assert_eq!(cache.draw_commands[0].count, 36);
    assert_eq!(cache.draw_commands[0].count, storage.vertex_stream(part.vertex_stream).index_count);
}

#[test]
fn two_cubes_share_one_call() {
    let (storage, part) = cube_storage();
    let mut scene = Scene::new();
    scene.add_node(Node::new("left").with_transform(Mat4::from_translation(Vec3::NEG_X * 2.0)).with_part(part));
    scene.add_node(Node::new("right").with_transform(Mat4::from_translation(Vec3::X * 2.0)).with_part(part));

    let frame = extract(&scene, &storage);
    let cache = prepare_pass(OPAQUE, &frame.part_list, &storage);

    assert_eq!(cache.calls.len(), 1);
    assert_eq!(cache.calls[0].draw_count, 2);
    assert_eq!(cache.draw_commands.len(), 2);
    assert_eq!(cache.draw_instances.len(), 2);
    assert_ne!(cache.draw_instances[0].transform_idx, cache.draw_instances[1].transform_idx);
    assert_eq!(cache.draw_commands[0].base_instance, 0);
    assert_eq!(cache.draw_commands[1].base_instance, 1);

    // The depth pre-pass batches them the same way.
    let depth = prepare_pass(PassKind::DepthOpaque, &frame.part_list, &storage);
    assert_eq!(depth.calls.len(), 1);
    assert_eq!(depth.draw_commands.len(), 2);
}

// ============================================================================
// Frame data
// ============================================================================

#[test]
fn scene_bounds_cover_every_part() {
    let (storage, part) = cube_storage();
    let mut scene = Scene::new();
    scene.add_node(Node::new("left").with_transform(Mat4::from_translation(Vec3::NEG_X * 2.0)).with_part(part));
    scene.add_node(Node::new("right").with_transform(Mat4::from_translation(Vec3::X * 2.0)).with_part(part));

    let bounds = extract(&scene, &storage).scene_bounds;
    assert!((bounds.min - Vec3::new(-2.5, -0.5, -0.5)).length() < 1e-5);
    assert!((bounds.max - Vec3::new(2.5, 0.5, 0.5)).length() < 1e-5);
}

#[test]
fn scene_bounds_use_each_part_region() {
    let (mut storage, cube) = cube_storage();
    let normal = [0.0, 0.0, 1.0];
    let stream = storage.add_vertex_stream(VertexStreamDesc {
        label: "near and far triangles".into(),
        topology: wgpu::PrimitiveTopology::TriangleList,
        vertices: vec![
            Vertex::new([0.0, 0.0, 0.0], normal, [0.0; 2]),
            Vertex::new([1.0, 0.0, 0.0], normal, [0.0; 2]),
            Vertex::new([0.0, 1.0, 0.0], normal, [0.0; 2]),
            Vertex::new([50.0, 0.0, 0.0], normal, [0.0; 2]),
            Vertex::new([51.0, 0.0, 0.0], normal, [0.0; 2]),
            Vertex::new([50.0, 1.0, 0.0], normal, [0.0; 2]),
        ],
        indices: IndexData::U16(vec![0, 1, 2, 3, 4, 5]),
    });

    let mut scene = Scene::new();
    scene.add_node(Node::new("near").with_part(MeshPart {
        vertex_stream: stream,
        region: IndexRegion { first: 0, count: 3, base_vertex: 0 },
        material: cube.material,
    }));

    let bounds = extract(&scene, &storage).scene_bounds;
    assert!((bounds.min - Vec3::ZERO).length() < 1e-5);
    assert!((bounds.max - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
}

#[test]
fn empty_scene_has_empty_bounds_and_no_draws() {
    let (storage, _) = cube_storage();
    let frame = extract(&Scene::new(), &storage);

    assert!(frame.scene_bounds.is_empty());
    assert!(frame.part_list.is_empty());
    assert!(prepare_pass(OPAQUE, &frame.part_list, &storage).is_empty());
}

#[test]
fn lights_are_packed_without_shadow_maps() {
    let (storage, part) = cube_storage();
    let mut scene = Scene::new();
    scene.add_node(Node::new("cube").with_part(part));
    scene.lights.directional.push(DirectionalLight::new(Vec3::NEG_Y, Vec3::ONE).with_shadows());
    scene.lights.point.push(PointLight::new(Vec3::new(0.0, 3.0, 0.0), 10.0, Vec3::ONE));

    let frame = extract(&scene, &storage);
    assert_eq!(frame.lights.directional_count, 1);
    assert_eq!(frame.lights.point_count, 1);
    // Filled in by the shadow pass.
    assert_eq!(frame.lights.directional[0].shadow_map_index, NO_ENTRY_INDEX);
    assert_eq!(frame.frame.viewport, [640.0, 480.0]);
}
