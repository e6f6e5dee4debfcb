//! 帧数据提取
//!
//! FrameData 是每帧从 Scene 提取的 CPU 数据：零件列表、场景包围盒、
//! 世界空间灯光、相机视图与帧常量。每帧重建，渲染期间只读。

use crate::renderer::graph::ubos::{FrameBlock, ViewingBlock};
use crate::resources::bounds::BoundingBox;
use crate::resources::storage::Storage;
use crate::scene::camera::Camera;
use crate::scene::light::LightsData;
use crate::scene::part_list::PartList;
use crate::scene::scene::Scene;

/// CPU side of one frame.
#[derive(Debug, Clone)]
pub struct FrameData {
    pub part_list: PartList,
    /// World bounds of every visible part.
    pub scene_bounds: BoundingBox,
    /// Lights in world space; shadow map indices are filled by the shadow pass.
    pub lights: LightsData,
    pub camera_view: ViewingBlock,
    pub frame: FrameBlock,
    pub draw_skybox: bool,
}

impl FrameData {
    pub fn extract(
        scene: &Scene,
        camera: &Camera,
        storage: &Storage,
        viewport: (u32, u32),
        frame_index: u32,
        time: f32,
    ) -> Self {
        let part_list = scene.populate_part_list();
        let scene_bounds = scene.bounds(&part_list, storage);

        Self {
            scene_bounds,
            part_list,
            lights: scene.lights_in_camera(camera, false),
            camera_view: ViewingBlock::from_camera(camera),
            frame: FrameBlock {
                time,
                frame_index,
                viewport: [viewport.0 as f32, viewport.1 as f32],
            },
            draw_skybox: scene.show_skybox,
        }
    }
}
