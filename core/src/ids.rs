//! Typed identifiers for assets owned by the GPU side.
//!
//! The scene graph only stores ids. Whether the mesh or material behind an
//! id is resident on the GPU is decided by the renderer's asset registry at
//! proxy-build time.

use std::fmt;

macro_rules! asset_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub u64);

        impl $name {
            /// Create an id from its raw value.
            #[inline]
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Raw value of the id.
            #[inline]
            pub const fn raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

asset_id!(
    /// Identifier of a mesh (vertex and index buffers).
    MeshId,
    "mesh"
);

asset_id!(
    /// Identifier of a material instance.
    MaterialId,
    "material"
);

asset_id!(
    /// Identifier of a texture asset (e.g. a baked cubemap).
    TextureId,
    "texture"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(MeshId::new(7).to_string(), "mesh#7");
        assert_eq!(MaterialId::new(3).to_string(), "material#3");
    }

    #[test]
    fn test_ordering() {
        assert!(MeshId::new(1) < MeshId::new(2));
        assert_eq!(TextureId::default().raw(), 0);
    }
}
