//! Physics bridge
//!
//! Wraps a rapier2d world and mirrors a subset of sprite state into it.
//! Each tick the simulation advances in four 1/240 s sub-steps (smaller
//! steps keep fast or overlapping bodies from tunneling), after which the
//! frame loop reads body positions, rotations and velocities back into the
//! bound sprites.
//!
//! Four static segment colliders at the screen edges always exist, so
//! bodies are contained by default. Each wall carries its own interaction
//! group; a binding's collision filter drops the groups its stop flags
//! disable, which lets individual sprites fall out of the screen while
//! everything else still bounces.

use rapier2d::prelude::*;

use crate::screen::Screen;

/// User-facing speeds are multiplied by this before they reach the engine.
pub const SPEED_MULTIPLIER: f32 = 10.0;
/// Simulation sub-steps per tick. More steps, more accuracy, more time.
pub const SIMULATION_SUBSTEPS: u32 = 4;
/// Nominal tick rate the sub-step length is derived from.
pub const TICK_RATE: f32 = 60.0;

const WALL_RESTITUTION: f32 = 0.99;
const WALL_FRICTION: f32 = 0.4;

const TOP_WALL: Group = Group::GROUP_1;
const BOTTOM_WALL: Group = Group::GROUP_2;
const SIDE_WALLS: Group = Group::GROUP_3;
const SPRITES: Group = Group::GROUP_4;

/// Options for attaching a sprite to the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsOptions {
    /// Whether the body moves at all. Immovable bodies are static.
    pub can_move: bool,
    /// Whether collisions may spin the body.
    pub can_turn: bool,
    /// Initial horizontal speed, in user units.
    pub x_speed: f32,
    /// Initial vertical speed, in user units.
    pub y_speed: f32,
    pub obeys_gravity: bool,
    /// Collide with the bottom screen edge.
    pub bottom_stop: bool,
    /// Collide with the left and right screen edges.
    pub sides_stop: bool,
    /// Collide with the top screen edge.
    pub top_stop: bool,
    /// Restitution; clamped to [0, 0.99] so collisions never add energy.
    pub bounciness: f32,
    pub mass: f32,
    pub friction: f32,
}

impl Default for PhysicsOptions {
    fn default() -> Self {
        Self {
            can_move: true,
            can_turn: true,
            x_speed: 0.0,
            y_speed: 0.0,
            obeys_gravity: true,
            bottom_stop: true,
            sides_stop: true,
            top_stop: true,
            bounciness: 1.0,
            mass: 10.0,
            friction: 0.1,
        }
    }
}

/// Collider geometry selected from the sprite's shape kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderGeometry {
    /// Circles simulate as balls of their logical radius.
    Ball { radius: f32 },
    /// Every other kind simulates as a box of its display rectangle.
    Cuboid { width: f32, height: f32 },
}

/// The simulation world: rapier's set bundle plus the screen walls.
pub struct PhysicsWorld {
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
}

impl PhysicsWorld {
    /// A world with default gravity (straight down, -1000) and the four
    /// screen-edge walls.
    pub fn new(screen: Screen) -> Self {
        let mut world = Self {
            gravity: vector![0.0, -1000.0],
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        };
        world.add_walls(screen);
        world
    }

    fn add_walls(&mut self, screen: Screen) {
        let (l, r) = (screen.left(), screen.right());
        let (t, b) = (screen.top(), screen.bottom());
        let walls = [
            (point![l, t], point![r, t], TOP_WALL),
            (point![l, b], point![r, b], BOTTOM_WALL),
            (point![l, b], point![l, t], SIDE_WALLS),
            (point![r, b], point![r, t], SIDE_WALLS),
        ];
        for (a, b, group) in walls {
            self.colliders.insert(
                ColliderBuilder::segment(a, b)
                    .restitution(WALL_RESTITUTION)
                    .friction(WALL_FRICTION)
                    .collision_groups(InteractionGroups::new(group, Group::ALL))
                    .build(),
            );
        }
    }

    /// Set world gravity as (vertical, horizontal), matching the
    /// user-facing convention where "gravity of -1000" means straight down.
    pub fn set_gravity(&mut self, vertical: f32, horizontal: f32) {
        self.gravity = vector![horizontal, vertical];
    }

    /// Current gravity as (vertical, horizontal).
    pub fn gravity(&self) -> (f32, f32) {
        (self.gravity.y, self.gravity.x)
    }

    /// Advance one tick: [`SIMULATION_SUBSTEPS`] equal sub-steps.
    pub fn step_frame(&mut self) {
        let dt = 1.0 / (TICK_RATE * SIMULATION_SUBSTEPS as f32);
        for _ in 0..SIMULATION_SUBSTEPS {
            self.step_once(dt);
        }
    }

    pub(crate) fn step_once(&mut self, dt: f32) {
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );
    }
}

/// What a sync step read out of a body. Non-finite components are `None`
/// and must not be written back (they occur transiently while a body is
/// being recreated).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyReadout {
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub angle_degrees: Option<f32>,
}

/// A sprite's link to its rigid body and collider.
pub struct PhysicsBinding {
    body: RigidBodyHandle,
    collider: ColliderHandle,
    can_move: bool,
    can_turn: bool,
    /// Engine-unit speeds (user speed x [`SPEED_MULTIPLIER`])
    x_speed: f32,
    y_speed: f32,
    obeys_gravity: bool,
    bottom_stop: bool,
    sides_stop: bool,
    top_stop: bool,
    bounciness: f32,
    mass: f32,
    friction: f32,
}

impl PhysicsBinding {
    pub fn new(
        world: &mut PhysicsWorld,
        options: PhysicsOptions,
        geometry: ColliderGeometry,
        x: f32,
        y: f32,
        angle_degrees: f32,
    ) -> Self {
        // An immovable body can't turn, drift or fall either
        let can_move = options.can_move;
        let can_turn = options.can_turn && can_move;
        let x_speed = if can_move {
            options.x_speed * SPEED_MULTIPLIER
        } else {
            0.0
        };
        let y_speed = if can_move {
            options.y_speed * SPEED_MULTIPLIER
        } else {
            0.0
        };
        let obeys_gravity = options.obeys_gravity && can_move;

        let mut binding = Self {
            body: RigidBodyHandle::invalid(),
            collider: ColliderHandle::invalid(),
            can_move,
            can_turn,
            x_speed,
            y_speed,
            obeys_gravity,
            bottom_stop: options.bottom_stop,
            sides_stop: options.sides_stop,
            top_stop: options.top_stop,
            bounciness: options.bounciness,
            mass: options.mass,
            friction: options.friction,
        };
        binding.build_body(world, geometry, x, y, angle_degrees);
        binding
    }

    fn build_body(
        &mut self,
        world: &mut PhysicsWorld,
        geometry: ColliderGeometry,
        x: f32,
        y: f32,
        angle_degrees: f32,
    ) {
        let mut builder = if self.can_move {
            RigidBodyBuilder::dynamic()
        } else {
            RigidBodyBuilder::fixed()
        }
        .translation(vector![x, y])
        .rotation(angle_degrees.to_radians())
        .gravity_scale(if self.obeys_gravity { 1.0 } else { 0.0 });
        if !self.can_turn {
            // The engine's equivalent of infinite rotational inertia:
            // torque has no effect.
            builder = builder.lock_rotations();
        }
        if self.can_move {
            builder = builder.linvel(vector![self.x_speed, self.y_speed]);
        }
        self.body = world.bodies.insert(builder.build());

        let shape = match geometry {
            ColliderGeometry::Ball { radius } => ColliderBuilder::ball(radius.max(0.1)),
            ColliderGeometry::Cuboid { width, height } => {
                ColliderBuilder::cuboid((width / 2.0).max(0.1), (height / 2.0).max(0.1))
            }
        };
        let collider = shape
            .mass(self.mass)
            .restitution(self.bounciness.clamp(0.0, 0.99))
            .friction(self.friction)
            .collision_groups(InteractionGroups::new(SPRITES, self.collision_filter()))
            .build();
        self.collider = world
            .colliders
            .insert_with_parent(collider, self.body, &mut world.bodies);
    }

    fn collision_filter(&self) -> Group {
        let mut filter = Group::ALL;
        if !self.top_stop {
            filter &= !TOP_WALL;
        }
        if !self.bottom_stop {
            filter &= !BOTTOM_WALL;
        }
        if !self.sides_stop {
            filter &= !SIDE_WALLS;
        }
        filter
    }

    /// Remove the body and collider from the world. The binding is dead
    /// afterwards and must be dropped.
    pub fn remove_from(&mut self, world: &mut PhysicsWorld) {
        world.bodies.remove(
            self.body,
            &mut world.islands,
            &mut world.colliders,
            &mut world.impulse_joints,
            &mut world.multibody_joints,
            true,
        );
    }

    /// Movability and rotatability are immutable on a live body, so
    /// toggling either destroys and recreates body and collider.
    fn rebuild(
        &mut self,
        world: &mut PhysicsWorld,
        geometry: ColliderGeometry,
        x: f32,
        y: f32,
        angle_degrees: f32,
    ) {
        self.remove_from(world);
        self.build_body(world, geometry, x, y, angle_degrees);
    }

    pub fn can_move(&self) -> bool {
        self.can_move
    }

    pub fn set_can_move(
        &mut self,
        world: &mut PhysicsWorld,
        geometry: ColliderGeometry,
        x: f32,
        y: f32,
        angle_degrees: f32,
        can_move: bool,
    ) {
        if self.can_move == can_move {
            return;
        }
        self.can_move = can_move;
        if !can_move {
            self.x_speed = 0.0;
            self.y_speed = 0.0;
        }
        self.rebuild(world, geometry, x, y, angle_degrees);
    }

    pub fn can_turn(&self) -> bool {
        self.can_turn
    }

    pub fn set_can_turn(
        &mut self,
        world: &mut PhysicsWorld,
        geometry: ColliderGeometry,
        x: f32,
        y: f32,
        angle_degrees: f32,
        can_turn: bool,
    ) {
        let can_turn = can_turn && self.can_move;
        if self.can_turn == can_turn {
            return;
        }
        self.can_turn = can_turn;
        self.rebuild(world, geometry, x, y, angle_degrees);
    }

    pub fn x_speed(&self) -> f32 {
        self.x_speed / SPEED_MULTIPLIER
    }

    pub fn set_x_speed(&mut self, world: &mut PhysicsWorld, speed: f32) {
        self.x_speed = speed * SPEED_MULTIPLIER;
        if let Some(body) = world.bodies.get_mut(self.body) {
            let vy = body.linvel().y;
            body.set_linvel(vector![self.x_speed, vy], true);
        }
    }

    pub fn y_speed(&self) -> f32 {
        self.y_speed / SPEED_MULTIPLIER
    }

    pub fn set_y_speed(&mut self, world: &mut PhysicsWorld, speed: f32) {
        self.y_speed = speed * SPEED_MULTIPLIER;
        if let Some(body) = world.bodies.get_mut(self.body) {
            let vx = body.linvel().x;
            body.set_linvel(vector![vx, self.y_speed], true);
        }
    }

    pub fn bounciness(&self) -> f32 {
        self.bounciness
    }

    pub fn set_bounciness(&mut self, world: &mut PhysicsWorld, bounciness: f32) {
        self.bounciness = bounciness;
        if let Some(collider) = world.colliders.get_mut(self.collider) {
            collider.set_restitution(bounciness.clamp(0.0, 0.99));
        }
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn set_mass(&mut self, world: &mut PhysicsWorld, mass: f32) {
        self.mass = mass;
        if let Some(collider) = world.colliders.get_mut(self.collider) {
            collider.set_mass(mass);
        }
    }

    pub fn obeys_gravity(&self) -> bool {
        self.obeys_gravity
    }

    pub fn set_obeys_gravity(&mut self, world: &mut PhysicsWorld, obeys: bool) {
        self.obeys_gravity = obeys && self.can_move;
        if let Some(body) = world.bodies.get_mut(self.body) {
            body.set_gravity_scale(if self.obeys_gravity { 1.0 } else { 0.0 }, true);
        }
    }

    /// Sprite position changed from user code: push it into the body.
    pub fn push_position(&self, world: &mut PhysicsWorld, x: f32, y: f32) {
        if let Some(body) = world.bodies.get_mut(self.body) {
            body.set_translation(vector![x, y], true);
        }
    }

    /// Sprite angle changed from user code: push it into the body.
    pub fn push_angle(&self, world: &mut PhysicsWorld, angle_degrees: f32) {
        if let Some(body) = world.bodies.get_mut(self.body) {
            body.set_rotation(Rotation::new(angle_degrees.to_radians()), true);
        }
    }

    /// Live circle radius change: swap the collider shape in place.
    pub fn set_ball_radius(&self, world: &mut PhysicsWorld, radius: f32) {
        if let Some(collider) = world.colliders.get_mut(self.collider) {
            collider.set_shape(SharedShape::ball(radius.max(0.1)));
        }
    }

    /// Read simulation results back after stepping. Updates the stored
    /// speeds and returns the pose for the sprite to adopt. `None` when
    /// the body is immovable (nothing to sync).
    pub fn sync_from_body(&mut self, world: &PhysicsWorld) -> Option<BodyReadout> {
        if !self.can_move {
            return None;
        }
        let body = world.bodies.get(self.body)?;
        let pos = body.translation();
        let angle = body.rotation().angle().to_degrees();
        let vel = body.linvel();
        if vel.x.is_finite() {
            self.x_speed = vel.x;
        }
        if vel.y.is_finite() {
            self.y_speed = vel.y;
        }
        Some(BodyReadout {
            x: pos.x.is_finite().then_some(pos.x),
            y: pos.y.is_finite().then_some(pos.y),
            angle_degrees: angle.is_finite().then_some(angle),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world_without_gravity() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(Screen::default());
        world.set_gravity(0.0, 0.0);
        world
    }

    fn ball_at(
        world: &mut PhysicsWorld,
        x: f32,
        y: f32,
        y_speed: f32,
        radius: f32,
    ) -> PhysicsBinding {
        PhysicsBinding::new(
            world,
            PhysicsOptions {
                y_speed,
                bounciness: 0.5,
                ..Default::default()
            },
            ColliderGeometry::Ball { radius },
            x,
            y,
            0.0,
        )
    }

    #[test]
    fn test_gravity_convention_round_trips() {
        let mut world = PhysicsWorld::new(Screen::default());
        assert_eq!(world.gravity(), (-1000.0, 0.0));
        world.set_gravity(-500.0, 25.0);
        assert_eq!(world.gravity(), (-500.0, 25.0));
    }

    #[test]
    fn test_gravity_pulls_a_body_down() {
        let mut world = PhysicsWorld::new(Screen::default());
        let mut binding = ball_at(&mut world, 0.0, 0.0, 0.0, 10.0);
        for _ in 0..10 {
            world.step_frame();
        }
        let readout = binding.sync_from_body(&world).unwrap();
        assert!(readout.y.unwrap() < -1.0);
        // downward velocity was read back into the binding
        assert!(binding.y_speed() < 0.0);
    }

    #[test]
    fn test_substepping_contains_a_fast_body_where_single_steps_tunnel() {
        // A body falling fast enough to cross its own diameter in a single
        // 1/60 s step escapes through the zero-thickness floor; the same
        // body stepped at 1/240 s stays inside.
        let speed = -300.0; // engine units: -3000 px/s, 50 px per 1/60 step
        let radius = 15.0;
        // Start offset so the coarse 50 px strides straddle the floor
        // instead of landing exactly on it.
        let start_y = -25.0;
        let floor = Screen::default().bottom();

        let mut substepped = world_without_gravity();
        let mut fast = ball_at(&mut substepped, 0.0, start_y, speed, radius);
        let mut min_y = 0.0f32;
        for _ in 0..120 {
            substepped.step_frame();
            let readout = fast.sync_from_body(&substepped).unwrap();
            min_y = min_y.min(readout.y.unwrap());
        }
        assert!(
            min_y >= floor - radius - 1.0,
            "substepped body escaped: min y {min_y}"
        );

        let mut coarse = world_without_gravity();
        let mut fast = ball_at(&mut coarse, 0.0, start_y, speed, radius);
        let mut escaped = false;
        for _ in 0..120 {
            coarse.step_once(1.0 / 60.0);
            let readout = fast.sync_from_body(&coarse).unwrap();
            if readout.y.unwrap() < floor - radius - 1.0 {
                escaped = true;
                break;
            }
        }
        assert!(escaped, "coarse stepping unexpectedly contained the body");
    }

    #[test]
    fn test_disabled_bottom_stop_lets_a_body_fall_through() {
        let mut world = PhysicsWorld::new(Screen::default());
        let mut binding = PhysicsBinding::new(
            &mut world,
            PhysicsOptions {
                bottom_stop: false,
                ..Default::default()
            },
            ColliderGeometry::Ball { radius: 10.0 },
            0.0,
            -250.0,
            0.0,
        );
        for _ in 0..240 {
            world.step_frame();
        }
        let readout = binding.sync_from_body(&world).unwrap();
        assert!(readout.y.unwrap() < Screen::default().bottom() - 10.0);
    }

    #[test]
    fn test_immovable_binding_has_no_speed_and_no_sync() {
        let mut world = world_without_gravity();
        let mut binding = PhysicsBinding::new(
            &mut world,
            PhysicsOptions {
                can_move: false,
                x_speed: 5.0,
                y_speed: 5.0,
                ..Default::default()
            },
            ColliderGeometry::Cuboid {
                width: 20.0,
                height: 20.0,
            },
            0.0,
            0.0,
            0.0,
        );
        assert_eq!(binding.x_speed(), 0.0);
        assert!(!binding.can_turn() || !binding.can_move());
        world.step_frame();
        assert!(binding.sync_from_body(&world).is_none());
    }

    #[test]
    fn test_toggling_movability_rebuilds_the_body() {
        let mut world = world_without_gravity();
        let mut binding = ball_at(&mut world, 10.0, 20.0, 0.0, 5.0);
        let old_body = binding.body;
        binding.set_can_move(
            &mut world,
            ColliderGeometry::Ball { radius: 5.0 },
            10.0,
            20.0,
            0.0,
            false,
        );
        assert_ne!(binding.body, old_body);
        assert!(world.bodies.get(old_body).is_none());
        assert!(world.bodies.get(binding.body).is_some());
    }

    #[test]
    fn test_speed_setters_reach_the_body() {
        let mut world = world_without_gravity();
        let mut binding = ball_at(&mut world, 0.0, 0.0, 0.0, 5.0);
        binding.set_x_speed(&mut world, 3.0);
        assert_eq!(binding.x_speed(), 3.0);
        let body = world.bodies.get(binding.body).unwrap();
        assert_eq!(body.linvel().x, 3.0 * SPEED_MULTIPLIER);
    }
}
