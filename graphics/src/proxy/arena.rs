//! Per-frame bump allocator for proxy structs.
//!
//! A [`RenderProxyArena`] owns every proxy struct of one scene proxy. Storage
//! is handed out by advancing an offset against a fixed byte budget and is
//! never freed individually: [`reset`](RenderProxyArena::reset) drops
//! everything at once. Proxy types are `Copy`, so resetting runs no
//! destructors.
//!
//! Allocations are returned as [`ProxyHandle`]s rather than references.
//! Each handle carries the arena generation it was allocated in, and the
//! generation advances on every reset, so a handle that outlives its frame
//! is caught on first use instead of reading another frame's data.
//!
//! ```
//! use lumen_graphics::proxy::{PointLightProxy, RenderProxyArena};
//!
//! let mut arena = RenderProxyArena::new(64 * 1024);
//! let light = arena.allocate::<PointLightProxy>();
//! arena.get_mut(light).radius = 4.0;
//! assert_eq!(arena.get(light).radius, 4.0);
//!
//! arena.reset();
//! assert_eq!(arena.used_bytes(), 0);
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::mem;

use lumen_core::pool::{Poolable, RecyclePool};

use crate::error::fatal;

use super::types::{
    CameraProxy, DirectionalLightProxy, IrradianceVolumeProxy, LandscapeProxy, PointLightProxy,
    RectLightProxy, ReflectionProbeProxy, SkyProxy, StaticMeshProxy,
};

/// Default arena budget: 4 MB.
pub const DEFAULT_ARENA_BYTES: usize = 4 * 1024 * 1024;

/// Typed reference to a value in a [`RenderProxyArena`].
pub struct ProxyHandle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ProxyHandle<T> {
    /// Index within the type's pool.
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Arena generation the handle was allocated in.
    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl<T> Clone for ProxyHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ProxyHandle<T> {}

impl<T> PartialEq for ProxyHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for ProxyHandle<T> {}

impl<T> Hash for ProxyHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for ProxyHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        write!(f, "{short}[{}@g{}]", self.index, self.generation)
    }
}

/// A type that can be stored in a [`RenderProxyArena`].
///
/// Implemented for every proxy struct by `arena_pools!`. The bounds make
/// resetting free of destructors and let a filled arena cross to the
/// render thread.
pub trait ArenaProxy: Copy + Default + Send + Sync + 'static {
    #[doc(hidden)]
    fn pool(pools: &ArenaPools) -> &Vec<Self>;
    #[doc(hidden)]
    fn pool_mut(pools: &mut ArenaPools) -> &mut Vec<Self>;
}

macro_rules! arena_pools {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// Backing storage, one vector per proxy type.
        #[doc(hidden)]
        #[derive(Debug, Default)]
        pub struct ArenaPools {
            $($field: Vec<$ty>,)*
        }

        impl ArenaPools {
            fn clear(&mut self) {
                $(self.$field.clear();)*
            }

            fn len(&self) -> usize {
                0 $(+ self.$field.len())*
            }
        }

        $(
            impl ArenaProxy for $ty {
                #[inline]
                fn pool(pools: &ArenaPools) -> &Vec<Self> {
                    &pools.$field
                }
                #[inline]
                fn pool_mut(pools: &mut ArenaPools) -> &mut Vec<Self> {
                    &mut pools.$field
                }
            }
        )*
    };
}

arena_pools! {
    cameras: CameraProxy,
    directional_lights: DirectionalLightProxy,
    point_lights: PointLightProxy,
    rect_lights: RectLightProxy,
    static_meshes: StaticMeshProxy,
    landscapes: LandscapeProxy,
    reflection_probes: ReflectionProbeProxy,
    irradiance_volumes: IrradianceVolumeProxy,
    skies: SkyProxy,
}

/// Linear allocator owning one frame's proxy structs.
pub struct RenderProxyArena {
    capacity: usize,
    offset: usize,
    peak: usize,
    generation: u32,
    pools: ArenaPools,
}

impl RenderProxyArena {
    /// Arena with a budget of `capacity_bytes`.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            capacity: capacity_bytes,
            offset: 0,
            peak: 0,
            generation: 0,
            pools: ArenaPools::default(),
        }
    }

    /// Allocate a default-initialized `T`.
    ///
    /// # Panics
    ///
    /// Panics if the arena budget is exhausted.
    #[inline]
    pub fn allocate<T: ArenaProxy>(&mut self) -> ProxyHandle<T> {
        self.allocate_with(T::default())
    }

    /// Allocate `value`.
    ///
    /// # Panics
    ///
    /// Panics if the arena budget is exhausted.
    pub fn allocate_with<T: ArenaProxy>(&mut self, value: T) -> ProxyHandle<T> {
        let align = mem::align_of::<T>();
        let start = self.offset.next_multiple_of(align);
        let end = start + mem::size_of::<T>();
        if end > self.capacity {
            fatal(
                "RenderProxyArena",
                format_args!(
                    "exhausted allocating {} ({} of {} bytes used)",
                    std::any::type_name::<T>(),
                    self.offset,
                    self.capacity
                ),
            );
        }
        self.offset = end;
        self.peak = self.peak.max(end);

        let pool = T::pool_mut(&mut self.pools);
        let index = pool.len() as u32;
        pool.push(value);
        ProxyHandle {
            index,
            generation: self.generation,
            _marker: PhantomData,
        }
    }

    /// Read a value.
    ///
    /// # Panics
    ///
    /// Panics if the handle was allocated before the last reset.
    #[inline]
    pub fn get<T: ArenaProxy>(&self, handle: ProxyHandle<T>) -> &T {
        self.check(handle);
        &T::pool(&self.pools)[handle.index as usize]
    }

    /// Mutate a value.
    ///
    /// # Panics
    ///
    /// Panics if the handle was allocated before the last reset.
    #[inline]
    pub fn get_mut<T: ArenaProxy>(&mut self, handle: ProxyHandle<T>) -> &mut T {
        self.check(handle);
        &mut T::pool_mut(&mut self.pools)[handle.index as usize]
    }

    fn check<T>(&self, handle: ProxyHandle<T>) {
        if handle.generation != self.generation {
            fatal(
                "RenderProxyArena",
                format_args!(
                    "stale handle {handle:?} used in generation {}",
                    self.generation
                ),
            );
        }
    }

    /// Release everything and invalidate outstanding handles.
    pub fn reset(&mut self) {
        self.pools.clear();
        self.offset = 0;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Bytes allocated since the last reset.
    pub fn used_bytes(&self) -> usize {
        self.offset
    }

    /// Highest `used_bytes` observed over the arena's lifetime.
    pub fn peak_bytes(&self) -> usize {
        self.peak
    }

    /// Byte budget.
    pub fn capacity_bytes(&self) -> usize {
        self.capacity
    }

    /// Current generation.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of live allocations.
    pub fn allocation_count(&self) -> usize {
        self.pools.len()
    }
}

impl Default for RenderProxyArena {
    fn default() -> Self {
        Self::new(DEFAULT_ARENA_BYTES)
    }
}

impl fmt::Debug for RenderProxyArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderProxyArena")
            .field("used", &self.offset)
            .field("peak", &self.peak)
            .field("capacity", &self.capacity)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Poolable for RenderProxyArena {
    fn new_empty() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        RenderProxyArena::reset(self);
    }
}

static_assertions::assert_impl_all!(RenderProxyArena: Send, Sync);

/// Recycles arenas returned by the render thread.
///
/// Steady-state frames reuse the pools' `Vec` capacity instead of
/// reallocating it.
#[derive(Debug)]
pub struct ArenaPool {
    capacity_bytes: usize,
    pool: RecyclePool<RenderProxyArena>,
    created: usize,
}

impl ArenaPool {
    /// Pool of arenas with `capacity_bytes` each, keeping at most `max_retained` idle.
    pub fn new(capacity_bytes: usize, max_retained: usize) -> Self {
        Self {
            capacity_bytes,
            pool: RecyclePool::new(max_retained),
            created: 0,
        }
    }

    /// A reset arena, recycled when possible.
    pub fn acquire(&mut self) -> RenderProxyArena {
        match self.pool.try_acquire() {
            Some(arena) => arena,
            None => {
                self.created += 1;
                RenderProxyArena::new(self.capacity_bytes)
            }
        }
    }

    /// Return an arena. It is reset before reuse.
    pub fn release(&mut self, arena: RenderProxyArena) {
        self.pool.release(arena);
    }

    /// Idle arenas.
    pub fn available(&self) -> usize {
        self.pool.available()
    }

    /// Arenas created because none was idle.
    pub fn created_count(&self) -> usize {
        self.created
    }
}
