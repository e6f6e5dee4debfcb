//! Pass Cache Tests
//!
//! Tests for:
//! - Draw count, command and instance totals agreeing
//! - Base instances indexing the instance array in order
//! - Batching of adjacent equal sort keys only
//! - Pass participation through the effect techniques
//! - Instance capacity contract

use glam::{Mat4, Vec3, Vec4};

use umbra::renderer::graph::pass_cache::{DrawKey, MAX_DRAW_INSTANCES, PassCache, prepare_pass};
use umbra::resources::{
    ForwardTechnique, IndexRegion, Material, MaterialId, MaterialParams, PassKind, Storage, TextureData,
    VertexStreamId, box_stream, plane_stream,
};
use umbra::scene::{MeshPart, Node, PartList, Scene};

const FORWARD: PassKind = PassKind::Forward(ForwardTechnique::Pbr);

struct Fixture {
    storage: Storage,
    parts: Vec<MeshPart>,
}

/// Box and plane streams, and materials: plain opaque, textured opaque,
/// transparent.
fn fixture() -> Fixture {
    let mut storage = Storage::new();
    let effects = storage.install_default_effects().expect("default effects compile");

    let cube = storage.add_vertex_stream(box_stream("cube", 1.0, 1.0, 1.0));
    let plane = storage.add_vertex_stream(plane_stream("plane", 10.0));

    let texture = storage.add_texture(TextureData::rgba8("checker", 1, 1, vec![255, 255, 255, 255]));
    let plain = storage.add_material(Material::new("plain", effects.opaque, MaterialParams::default()));
    let textured = storage.add_material(
        Material::new("textured", effects.opaque, MaterialParams::default()).with_texture(texture),
    );
    let glass = storage.add_material(Material::new(
        "glass",
        effects.transparent,
        MaterialParams::with_color(Vec4::new(0.2, 0.4, 1.0, 0.5)),
    ));

    let part = |stream: VertexStreamId, material: MaterialId| MeshPart {
        vertex_stream: stream,
        region: storage.vertex_stream(stream).full_region(),
        material,
    };
    let parts = vec![
        part(cube, plain),
        part(plane, plain),
        part(cube, textured),
        part(cube, glass),
    ];

    Fixture { storage, parts }
}

fn scene_of(parts: &[MeshPart]) -> PartList {
    let mut scene = Scene::new();
    for (i, part) in parts.iter().enumerate() {
        scene.add_node(
            Node::new(format!("node {i}"))
                .with_transform(Mat4::from_translation(Vec3::X * i as f32))
                .with_part(*part),
        );
    }
    scene.populate_part_list()
}

fn assert_invariants(cache: &PassCache) {
    let covered: u32 = cache.calls.iter().map(|call| call.draw_count).sum();
    assert_eq!(covered as usize, cache.draw_commands.len());
    assert_eq!(cache.draw_commands.len(), cache.draw_instances.len());

    for (i, command) in cache.draw_commands.iter().enumerate() {
        assert_eq!(command.base_instance as usize, i);
        assert_eq!(command.instance_count, 1);
    }
}

fn call_keys(cache: &PassCache) -> Vec<DrawKey> {
    cache
        .calls
        .iter()
        .map(|call| DrawKey::new(call.program, call.material_context, call.vertex_stream))
        .collect()
}

// ============================================================================
// Invariants
// ============================================================================

#[test]
fn totals_agree_for_every_pass() {
    let fixture = fixture();
    let list = scene_of(&fixture.parts);

    for pass in [PassKind::DepthOpaque, PassKind::CascadedDepthOpaque, FORWARD, PassKind::Transparent] {
        let cache = prepare_pass(pass, &list, &fixture.storage);
        assert_invariants(&cache);
    }
}

#[test]
fn equal_keys_are_batched_and_calls_are_sorted() {
    let fixture = fixture();
    let [cube_plain, plane_plain, cube_textured, _] = fixture.parts[..] else {
        unreachable!()
    };
    // Interleaved on purpose: sorting must make equal keys adjacent.
    let list = scene_of(&[cube_plain, plane_plain, cube_textured, cube_plain, plane_plain, cube_plain]);

    let cache = prepare_pass(FORWARD, &list, &fixture.storage);
    assert_invariants(&cache);
    assert_eq!(cache.calls.len(), 3);
    assert_eq!(cache.draw_commands.len(), 6);

    let keys = call_keys(&cache);
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]), "keys {keys:?} not strictly increasing");

    let plain_context = fixture.storage.material_context(cube_plain.material);
    let cube_calls: u32 = cache
        .calls
        .iter()
        .filter(|call| call.vertex_stream == cube_plain.vertex_stream && call.material_context == plain_context)
        .map(|call| call.draw_count)
        .sum();
    assert_eq!(cube_calls, 3);
}

#[test]
fn parts_with_equal_keys_keep_their_order() {
    let fixture = fixture();
    let cube_plain = fixture.parts[0];
    let list = scene_of(&[cube_plain, cube_plain, cube_plain]);

    let cache = prepare_pass(PassKind::DepthOpaque, &list, &fixture.storage);
    assert_eq!(cache.calls.len(), 1);
    let transforms: Vec<u32> = cache.draw_instances.iter().map(|instance| instance.transform_idx).collect();
    assert_eq!(transforms, vec![0, 1, 2]);
}

// ============================================================================
// Pass participation
// ============================================================================

#[test]
fn parts_without_a_technique_are_skipped() {
    let fixture = fixture();
    let list = scene_of(&fixture.parts);

    let forward = prepare_pass(FORWARD, &list, &fixture.storage);
    assert_eq!(forward.draw_commands.len(), 3);

    let transparent = prepare_pass(PassKind::Transparent, &list, &fixture.storage);
    assert_eq!(transparent.draw_commands.len(), 1);
    assert_eq!(transparent.draw_instances[0].material_idx, fixture.parts[3].material.0);
}

#[test]
fn empty_part_list_gives_empty_cache() {
    let fixture = fixture();
    let cache = prepare_pass(FORWARD, &PartList::new(), &fixture.storage);
    assert!(cache.is_empty());
    assert!(cache.draw_commands.is_empty());
    assert!(cache.draw_instances.is_empty());
}

#[test]
fn commands_address_the_shared_index_buffer() {
    let fixture = fixture();
    let plane_plain = fixture.parts[1];
    let list = scene_of(&[plane_plain]);

    let cache = prepare_pass(FORWARD, &list, &fixture.storage);
    let stream = fixture.storage.vertex_stream(plane_plain.vertex_stream);
    let command = cache.draw_commands[0];

    // The plane follows the 36 u16 indices of the cube.
    assert_eq!(command.first_index, 36);
    assert_eq!(command.base_vertex, 24);
    assert_eq!(command.count, stream.index_count);
}

#[test]
fn sub_regions_offset_inside_their_stream() {
    let fixture = fixture();
    let mut half_cube = fixture.parts[0];
    half_cube.region = IndexRegion { first: 18, count: 18, base_vertex: 0 };
    let list = scene_of(&[half_cube]);

    let cache = prepare_pass(FORWARD, &list, &fixture.storage);
    assert_eq!(cache.draw_commands[0].first_index, 18);
    assert_eq!(cache.draw_commands[0].count, 18);
}

// ============================================================================
// Capacity
// ============================================================================

#[test]
#[should_panic(expected = "draw instances capacity")]
fn exceeding_instance_capacity_panics() {
    let fixture = fixture();
    let parts = vec![fixture.parts[0]; MAX_DRAW_INSTANCES + 1];
    let list = scene_of(&parts);
    let _ = prepare_pass(FORWARD, &list, &fixture.storage);
}
