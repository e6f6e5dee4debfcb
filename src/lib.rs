#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod resources;
pub mod scene;
pub mod renderer;
pub mod errors;

pub use resources::{
    BoundingBox, Effect, ForwardTechnique, Material, MaterialParams, PassKind, Program, Storage, TextureData,
    TextureSemantic, Vertex, VertexStreamDesc,
};
pub use scene::{Camera, DirectionalLight, Lights, Node, PointLight, Scene};
pub use renderer::{GraphControls, RenderGraph, RendererSettings, ShadowControls, WgpuContext};
pub use errors::{Result, UmbraError};
