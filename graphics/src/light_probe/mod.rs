//! Light-probe atlas management.
//!
//! Reflection probes and irradiance volumes store their baked data in two
//! shared atlases. Each probe needs a run of contiguous tiles: a reflection
//! probe takes one tile per cube face, an irradiance volume one tile per
//! sample. [`LightProbeSystem`] lives on the producer side, persists across
//! frames and hands out tiles while a scene proxy is being built.
//!
//! When an atlas is too fragmented to fit a probe, the probe keeps
//! [`TileId::INVALID`] for this frame and a warning is logged. Passes skip
//! probes without a valid tile.

mod tile_allocator;

use std::collections::HashMap;

pub use tile_allocator::{TileAllocator, TileId};

use crate::proxy::SceneProxy;

/// Atlas dimensions for light-probe data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightProbeConfig {
    /// Reflection atlas width and height in pixels.
    pub reflection_atlas_size: u32,
    /// Size of one reflection tile (one cube face).
    pub reflection_tile_size: u32,
    /// Tiles used per reflection probe.
    pub tiles_per_reflection_probe: u32,
    /// Irradiance atlas width and height in pixels.
    pub irradiance_atlas_size: u32,
    /// Size of one irradiance tile (one sample).
    pub irradiance_tile_size: u32,
}

impl Default for LightProbeConfig {
    fn default() -> Self {
        Self {
            reflection_atlas_size: 2048,
            reflection_tile_size: 128,
            tiles_per_reflection_probe: 6,
            irradiance_atlas_size: 512,
            irradiance_tile_size: 8,
        }
    }
}

impl LightProbeConfig {
    /// Tiles along one edge of the reflection atlas.
    pub fn reflection_tiles_per_row(&self) -> u32 {
        (self.reflection_atlas_size / self.reflection_tile_size.max(1)).max(1)
    }

    /// Tiles along one edge of the irradiance atlas.
    pub fn irradiance_tiles_per_row(&self) -> u32 {
        (self.irradiance_atlas_size / self.irradiance_tile_size.max(1)).max(1)
    }

    /// Total reflection tiles.
    pub fn reflection_tile_count(&self) -> u32 {
        self.reflection_tiles_per_row().pow(2)
    }

    /// Total irradiance tiles.
    pub fn irradiance_tile_count(&self) -> u32 {
        self.irradiance_tiles_per_row().pow(2)
    }
}

/// Light-probe summary stored in a scene proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightProbeState {
    /// Reflection probes with a valid atlas tile this frame.
    pub reflection_probes: u32,
    /// Irradiance volumes with valid atlas tiles this frame.
    pub irradiance_volumes: u32,
    /// Probes that could not be placed in an atlas.
    pub rejected: u32,
    /// Reflection tiles in use.
    pub reflection_tiles_used: u32,
    /// Irradiance tiles in use.
    pub irradiance_tiles_used: u32,
    /// Reflection atlas tiles per row, for tile-to-UV mapping.
    pub reflection_tiles_per_row: u32,
    /// Irradiance atlas tiles per row.
    pub irradiance_tiles_per_row: u32,
}

impl LightProbeState {
    /// Whether any probe data is available to the indirect lighting pass.
    pub fn has_probes(&self) -> bool {
        self.reflection_probes > 0 || self.irradiance_volumes > 0
    }
}

/// Owner of a probe allocation: the actor and the component index on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeKey {
    /// Packed actor id.
    pub owner: u64,
    /// Component index within the actor.
    pub component: u32,
}

#[derive(Debug, Clone, Copy)]
struct ProbeAllocation {
    first: TileId,
    count: u32,
    seen_frame: u64,
}

#[derive(Debug)]
struct Atlas {
    name: &'static str,
    tiles: TileAllocator,
    allocations: HashMap<ProbeKey, ProbeAllocation>,
}

impl Atlas {
    fn new(name: &'static str, tile_count: u32) -> Self {
        Self {
            name,
            tiles: TileAllocator::new(tile_count),
            allocations: HashMap::new(),
        }
    }

    /// Tiles for `key`, reusing the existing run if its length still matches.
    fn acquire(&mut self, key: ProbeKey, count: u32, frame: u64) -> TileId {
        if let Some(existing) = self.allocations.get_mut(&key) {
            if existing.count == count {
                existing.seen_frame = frame;
                return existing.first;
            }
            let stale = *existing;
            self.allocations.remove(&key);
            self.release(stale);
        }

        let first = self.tiles.allocate(count);
        if !first.is_valid() {
            log::warn!(
                "LightProbeSystem: {} atlas cannot fit {count} tiles for actor {:#x}/{} \
                 ({} free, largest run {})",
                self.name,
                key.owner,
                key.component,
                self.tiles.free_tiles(),
                self.tiles.largest_free_run()
            );
            return TileId::INVALID;
        }
        self.allocations.insert(
            key,
            ProbeAllocation {
                first,
                count,
                seen_frame: frame,
            },
        );
        first
    }

    fn release(&mut self, allocation: ProbeAllocation) {
        let first = allocation.first.index();
        if !self.tiles.free(first, first + allocation.count - 1) {
            log::error!(
                "LightProbeSystem: {} atlas lost track of tiles {first}+{}",
                self.name,
                allocation.count
            );
        }
    }

    fn collect_stale(&mut self, frame: u64) -> usize {
        let stale: Vec<(ProbeKey, ProbeAllocation)> = self
            .allocations
            .iter()
            .filter(|(_, a)| a.seen_frame != frame)
            .map(|(k, a)| (*k, *a))
            .collect();
        for (key, allocation) in &stale {
            self.allocations.remove(key);
            self.release(*allocation);
        }
        stale.len()
    }
}

/// Producer-side owner of the light-probe atlases.
#[derive(Debug)]
pub struct LightProbeSystem {
    config: LightProbeConfig,
    reflection: Atlas,
    irradiance: Atlas,
}

impl LightProbeSystem {
    /// Create empty atlases.
    pub fn new(config: LightProbeConfig) -> Self {
        Self {
            reflection: Atlas::new("reflection", config.reflection_tile_count()),
            irradiance: Atlas::new("irradiance", config.irradiance_tile_count()),
            config,
        }
    }

    /// Atlas configuration.
    pub fn config(&self) -> &LightProbeConfig {
        &self.config
    }

    /// Reflection atlas allocator.
    pub fn reflection_tiles(&self) -> &TileAllocator {
        &self.reflection.tiles
    }

    /// Irradiance atlas allocator.
    pub fn irradiance_tiles(&self) -> &TileAllocator {
        &self.irradiance.tiles
    }

    /// Assign atlas tiles to every probe in `proxy` and fill its [`LightProbeState`].
    ///
    /// Probes keep their tiles across frames while they stay in the scene.
    /// Allocations of probes missing from this proxy are released.
    pub fn resolve(&mut self, proxy: &mut SceneProxy) {
        let frame = proxy.frame_number();
        let mut state = LightProbeState {
            reflection_tiles_per_row: self.config.reflection_tiles_per_row(),
            irradiance_tiles_per_row: self.config.irradiance_tiles_per_row(),
            ..LightProbeState::default()
        };

        let (reflection_probes, irradiance_volumes, arena) = proxy.probe_lists_mut();

        for handle in reflection_probes.handles() {
            let probe = arena.get_mut(*handle);
            let key = ProbeKey {
                owner: probe.owner,
                component: probe.component,
            };
            let count = self.config.tiles_per_reflection_probe;
            probe.atlas_tile = self.reflection.acquire(key, count, frame);
            probe.tile_count = count;
            if probe.atlas_tile.is_valid() {
                state.reflection_probes += 1;
            } else {
                state.rejected += 1;
            }
        }

        for handle in irradiance_volumes.handles() {
            let volume = arena.get_mut(*handle);
            let key = ProbeKey {
                owner: volume.owner,
                component: volume.component,
            };
            let count = volume
                .resolution
                .x
                .checked_mul(volume.resolution.y)
                .and_then(|count| count.checked_mul(volume.resolution.z));
            let Some(count) = count else {
                log::warn!(
                    "LightProbeSystem: irradiance volume {} on actor {:#x} has too many samples",
                    volume.resolution,
                    volume.owner
                );
                volume.first_tile = TileId::INVALID;
                volume.tile_count = 0;
                state.rejected += 1;
                continue;
            };
            volume.first_tile = self.irradiance.acquire(key, count, frame);
            volume.tile_count = count;
            if volume.first_tile.is_valid() {
                state.irradiance_volumes += 1;
            } else {
                state.rejected += 1;
            }
        }

        let released = self.reflection.collect_stale(frame) + self.irradiance.collect_stale(frame);
        if released > 0 {
            log::debug!("LightProbeSystem: released {released} stale probe allocations");
        }

        state.reflection_tiles_used = self.reflection.tiles.used_tiles();
        state.irradiance_tiles_used = self.irradiance.tiles.used_tiles();
        proxy.set_light_probe_state(state);
    }
}

impl Default for LightProbeSystem {
    fn default() -> Self {
        Self::new(LightProbeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec3;
    use lumen_core::scene::Camera;

    use super::*;
    use crate::proxy::{IrradianceVolumeProxy, ProxyRequest, ReflectionProbeProxy, RenderProxyArena};
    use crate::types::Extent2d;

    /// 4x4 reflection tiles (two probes of 6), 4x4 irradiance tiles.
    fn small_config() -> LightProbeConfig {
        LightProbeConfig {
            reflection_atlas_size: 64,
            reflection_tile_size: 16,
            tiles_per_reflection_probe: 6,
            irradiance_atlas_size: 32,
            irradiance_tile_size: 8,
        }
    }

    fn proxy(frame: u64) -> SceneProxy {
        SceneProxy::new(
            ProxyRequest::new(frame, Camera::default(), Extent2d::new(320, 180)),
            RenderProxyArena::new(64 * 1024),
        )
    }

    fn reflection(owner: u64) -> ReflectionProbeProxy {
        ReflectionProbeProxy {
            owner,
            intensity: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_config_tile_counts() {
        let config = LightProbeConfig::default();
        assert_eq!(config.reflection_tiles_per_row(), 16);
        assert_eq!(config.reflection_tile_count(), 256);
        assert_eq!(config.irradiance_tile_count(), 64 * 64);
    }

    #[test]
    fn test_probes_keep_tiles_across_frames() {
        let mut system = LightProbeSystem::new(small_config());

        let mut first = proxy(1);
        first.push_reflection_probe(reflection(7));
        system.resolve(&mut first);
        let tile = first.reflection_probes().next().unwrap().atlas_tile;
        assert_eq!(tile, TileId(0));

        let mut second = proxy(2);
        second.push_reflection_probe(reflection(9));
        second.push_reflection_probe(reflection(7));
        system.resolve(&mut second);
        let tiles: Vec<TileId> = second.reflection_probes().map(|p| p.atlas_tile).collect();
        assert_eq!(tiles, vec![TileId(6), TileId(0)]);
        assert_eq!(second.light_probes().reflection_probes, 2);
        assert_eq!(second.light_probes().reflection_tiles_used, 12);
    }

    #[test]
    fn test_contention_marks_probe_invalid() {
        let mut system = LightProbeSystem::new(small_config());
        let mut p = proxy(1);
        for owner in 1..=3 {
            p.push_reflection_probe(reflection(owner));
        }
        system.resolve(&mut p);

        let tiles: Vec<TileId> = p.reflection_probes().map(|p| p.atlas_tile).collect();
        assert!(tiles[0].is_valid());
        assert!(tiles[1].is_valid());
        assert_eq!(tiles[2], TileId::INVALID);
        assert_eq!(p.light_probes().reflection_probes, 2);
        assert_eq!(p.light_probes().rejected, 1);
    }

    #[test]
    fn test_missing_probes_are_released() {
        let mut system = LightProbeSystem::new(small_config());
        let mut p = proxy(1);
        p.push_reflection_probe(reflection(1));
        p.push_irradiance_volume(IrradianceVolumeProxy {
            owner: 2,
            resolution: UVec3::new(2, 2, 2),
            ..Default::default()
        });
        system.resolve(&mut p);
        assert_eq!(system.reflection_tiles().used_tiles(), 6);
        assert_eq!(system.irradiance_tiles().used_tiles(), 8);

        let mut empty = proxy(2);
        system.resolve(&mut empty);
        assert_eq!(system.reflection_tiles().used_tiles(), 0);
        assert_eq!(system.irradiance_tiles().used_tiles(), 0);
        assert!(!empty.light_probes().has_probes());
    }

    #[test]
    fn test_resized_volume_is_reallocated() {
        let mut system = LightProbeSystem::new(small_config());
        let mut p = proxy(1);
        p.push_irradiance_volume(IrradianceVolumeProxy {
            owner: 4,
            resolution: UVec3::new(2, 1, 1),
            ..Default::default()
        });
        system.resolve(&mut p);

        let mut q = proxy(2);
        q.push_irradiance_volume(IrradianceVolumeProxy {
            owner: 4,
            resolution: UVec3::new(3, 1, 1),
            ..Default::default()
        });
        system.resolve(&mut q);
        let volume = q.irradiance_volumes().next().unwrap();
        assert_eq!(volume.first_tile, TileId(0));
        assert_eq!(volume.tile_count, 3);
        assert_eq!(system.irradiance_tiles().used_tiles(), 3);
    }
}
