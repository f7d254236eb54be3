//! Live scene graph owned by the simulation side.
//!
//! - [`World`] / [`Actor`] / [`ActorId`] - actor storage and hierarchy
//! - [`Component`] - the closed set of renderable components
//! - [`Transform`] - local TRS transform
//! - [`Camera`] - perspective camera
//!
//! The renderer never holds references into a [`World`]. Once per frame it
//! walks the world and copies what it needs into a frame snapshot.

mod camera;
mod component;
mod transform;
mod world;

pub use camera::Camera;
pub use component::{
    CloudLayer, Component, DirectionalLight, IrradianceVolume, Landscape, PointLight, RectLight,
    ReflectionProbe, SkyAtmosphere, StaticMesh,
};
pub use transform::Transform;
pub use world::{Actor, ActorId, World};
