pub mod camera;
pub mod light;
pub mod part_list;
pub mod scene;

pub use camera::{Camera, Projection};
pub use light::{DirectionalLight, Lights, LightsData, PointLight};
pub use part_list::{Part, PartList};
pub use scene::{MeshPart, Node, NodeHandle, Scene};
