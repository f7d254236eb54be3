//! The live scene graph.

use glam::Mat4;
use slotmap::{Key, SlotMap, new_key_type};

use super::{Component, Transform};

new_key_type! {
    /// Stable handle to an actor in a [`World`].
    pub struct ActorId;
}

impl ActorId {
    /// Packed 64-bit form of the id, stable for the actor's lifetime.
    pub fn to_bits(self) -> u64 {
        self.data().as_ffi()
    }
}

/// A node of the scene graph: a transform plus a list of components.
#[derive(Debug, Clone)]
pub struct Actor {
    name: String,
    transform: Transform,
    world_matrix: Mat4,
    parent: Option<ActorId>,
    components: Vec<Component>,
    destroyed: bool,
}

impl Actor {
    /// Actor name, for logs and tooling.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Mutable local transform. The world matrix is refreshed by
    /// [`World::update_world_transforms`].
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// World matrix as of the last [`World::update_world_transforms`].
    pub fn world_matrix(&self) -> Mat4 {
        self.world_matrix
    }

    /// Parent actor, if any.
    pub fn parent(&self) -> Option<ActorId> {
        self.parent
    }

    /// Attached components.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Mutable access to attached components.
    pub fn components_mut(&mut self) -> &mut Vec<Component> {
        &mut self.components
    }

    /// Attach a component.
    pub fn add_component(&mut self, component: impl Into<Component>) -> &mut Self {
        self.components.push(component.into());
        self
    }

    /// Whether the actor was despawned but not yet purged.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

/// Owner of all actors.
///
/// Iteration follows spawn order, so two walks over an unchanged world visit
/// actors and components in the same sequence.
#[derive(Debug, Default)]
pub struct World {
    actors: SlotMap<ActorId, Actor>,
    order: Vec<ActorId>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a root actor.
    pub fn spawn(&mut self, name: impl Into<String>, transform: Transform) -> ActorId {
        self.insert(name.into(), transform, None)
    }

    /// Spawn an actor parented to `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not name a live actor.
    pub fn spawn_child(
        &mut self,
        parent: ActorId,
        name: impl Into<String>,
        transform: Transform,
    ) -> ActorId {
        assert!(
            self.actor(parent).is_some(),
            "spawn_child: parent {parent:?} is not a live actor"
        );
        self.insert(name.into(), transform, Some(parent))
    }

    fn insert(&mut self, name: String, transform: Transform, parent: Option<ActorId>) -> ActorId {
        let id = self.actors.insert(Actor {
            name,
            world_matrix: transform.compute_matrix(),
            transform,
            parent,
            components: Vec::new(),
            destroyed: false,
        });
        self.order.push(id);
        id
    }

    /// Mark an actor and all of its descendants destroyed.
    ///
    /// Destroyed actors are invisible to iteration and lookups but keep
    /// their slots until [`purge_destroyed`](Self::purge_destroyed).
    pub fn despawn(&mut self, id: ActorId) {
        let Some(actor) = self.actors.get_mut(id) else {
            return;
        };
        if actor.destroyed {
            return;
        }
        actor.destroyed = true;

        let children: Vec<ActorId> = self
            .order
            .iter()
            .copied()
            .filter(|child| self.actors.get(*child).is_some_and(|a| a.parent == Some(id)))
            .collect();
        for child in children {
            self.despawn(child);
        }
    }

    /// Free the slots of destroyed actors.
    pub fn purge_destroyed(&mut self) -> usize {
        let before = self.actors.len();
        self.actors.retain(|_, actor| !actor.destroyed);
        let actors = &self.actors;
        self.order.retain(|id| actors.contains_key(*id));
        before - self.actors.len()
    }

    /// Look up a live actor.
    pub fn actor(&self, id: ActorId) -> Option<&Actor> {
        self.actors.get(id).filter(|actor| !actor.destroyed)
    }

    /// Look up a live actor mutably.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut Actor> {
        self.actors.get_mut(id).filter(|actor| !actor.destroyed)
    }

    /// Iterate live actors in spawn order.
    pub fn iter_actors(&self) -> impl Iterator<Item = (ActorId, &Actor)> {
        self.order.iter().filter_map(|id| {
            self.actors
                .get(*id)
                .filter(|actor| !actor.destroyed)
                .map(|actor| (*id, actor))
        })
    }

    /// Number of live actors.
    pub fn len(&self) -> usize {
        self.iter_actors().count()
    }

    /// Whether the world has no live actors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Recompute world matrices of all live actors from their parent chains.
    ///
    /// Parents are always spawned before their children, so one pass in
    /// spawn order sees every parent's fresh matrix before its children.
    pub fn update_world_transforms(&mut self) {
        for index in 0..self.order.len() {
            let id = self.order[index];
            let Some(actor) = self.actors.get(id) else {
                continue;
            };
            if actor.destroyed {
                continue;
            }

            let local = actor.transform.compute_matrix();
            let parent_world = actor
                .parent
                .and_then(|parent| self.actors.get(parent))
                .filter(|parent| !parent.destroyed)
                .map(|parent| parent.world_matrix);
            let world = match parent_world {
                Some(parent) => parent * local,
                None => local,
            };

            if let Some(actor) = self.actors.get_mut(id) {
                actor.world_matrix = world;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{PointLight, StaticMesh};
    use crate::ids::{MaterialId, MeshId};
    use glam::Vec3;

    #[test]
    fn test_spawn_and_iterate_in_order() {
        let mut world = World::new();
        let a = world.spawn("a", Transform::IDENTITY);
        let b = world.spawn("b", Transform::IDENTITY);
        let ids: Vec<ActorId> = world.iter_actors().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![a, b]);
        assert_eq!(world.len(), 2);
    }

    #[test]
    fn test_components() {
        let mut world = World::new();
        let id = world.spawn("lamp", Transform::IDENTITY);
        world
            .actor_mut(id)
            .unwrap()
            .add_component(PointLight::default())
            .add_component(StaticMesh::new(MeshId::new(1), MaterialId::new(2)));
        let actor = world.actor(id).unwrap();
        assert_eq!(actor.components().len(), 2);
        assert_eq!(actor.components()[0].kind_name(), "PointLight");
    }

    #[test]
    fn test_world_transform_follows_parent() {
        let mut world = World::new();
        let parent = world.spawn("parent", Transform::from_xyz(10.0, 0.0, 0.0));
        let child = world.spawn_child(parent, "child", Transform::from_xyz(0.0, 1.0, 0.0));

        world.update_world_transforms();
        let position = world
            .actor(child)
            .unwrap()
            .world_matrix()
            .transform_point3(Vec3::ZERO);
        assert_eq!(position, Vec3::new(10.0, 1.0, 0.0));

        world.actor_mut(parent).unwrap().transform_mut().translation = Vec3::ZERO;
        world.update_world_transforms();
        let position = world
            .actor(child)
            .unwrap()
            .world_matrix()
            .transform_point3(Vec3::ZERO);
        assert_eq!(position, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_despawn_is_recursive() {
        let mut world = World::new();
        let parent = world.spawn("parent", Transform::IDENTITY);
        let child = world.spawn_child(parent, "child", Transform::IDENTITY);
        let other = world.spawn("other", Transform::IDENTITY);

        world.despawn(parent);
        assert!(world.actor(parent).is_none());
        assert!(world.actor(child).is_none());
        assert!(world.actor(other).is_some());
        assert_eq!(world.len(), 1);

        assert_eq!(world.purge_destroyed(), 2);
        assert_eq!(world.iter_actors().count(), 1);
    }

    #[test]
    #[should_panic(expected = "not a live actor")]
    fn test_spawn_child_of_destroyed_parent_panics() {
        let mut world = World::new();
        let parent = world.spawn("parent", Transform::IDENTITY);
        world.despawn(parent);
        world.spawn_child(parent, "child", Transform::IDENTITY);
    }

    #[test]
    fn test_actor_id_bits_are_distinct() {
        let mut world = World::new();
        let a = world.spawn("a", Transform::IDENTITY);
        let b = world.spawn("b", Transform::IDENTITY);
        assert_ne!(a.to_bits(), b.to_bits());
    }
}
