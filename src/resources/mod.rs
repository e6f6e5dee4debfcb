pub mod bounds;
pub mod effect;
pub mod material;
pub mod mesh;
pub mod program;
pub mod storage;

pub use bounds::{BoundingBox, Rectangle};
pub use effect::{Effect, ForwardTechnique, PassKind};
pub use material::{Material, MaterialParams};
pub use mesh::{IndexData, IndexRegion, Vertex, VertexStream, VertexStreamDesc, box_stream, plane_stream};
pub use program::{Program, ProgramSource};
pub use storage::{
    DefaultEffects, EffectId, MaterialContextId, MaterialId, ProgramId, Storage, TextureData,
    TextureId, TextureSemantic, VertexStreamId,
};
