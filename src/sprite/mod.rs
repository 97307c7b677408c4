//! Sprites
//!
//! A [`Sprite`] is a cheap clonable handle to one visual entity: position
//! and transform, a shape kind, an optional physics binding, per-sprite
//! click callbacks, and the cached surfaces the renderer blits. Everything
//! lives on one thread behind `Rc<RefCell<..>>`.
//!
//! All writes go through mutator methods. A mutator clamps and validates,
//! marks the right surface dirty, and pushes position/rotation into a
//! bound physics body - the side effects live here, not in the frame loop.
//! Surface recomputation itself is deferred: mutators only set flags, the
//! frame loop refreshes at a fixed point in the tick so a suspended
//! callback can never observe a half-updated sprite.

pub mod fonts;
pub mod shape;
pub mod surface;

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use crate::callbacks::Registration;
use crate::color::NamedColor;
use crate::error::{advisory, GameError};
use crate::physics::{ColliderGeometry, PhysicsBinding, PhysicsOptions, PhysicsWorld};
use fonts::FontStore;
use shape::{line_endpoint, line_length_angle, Shape};
use surface::{SurfaceCache, ViewTransform};

/// Clamp a percentage attribute into [0, 100], advising when the caller's
/// value was out of range.
fn clamp_percent(value: f32, attribute: &str) -> f32 {
    if value.is_nan() {
        advisory(&format!(
            "The {attribute} setting is being set to something that isn't a \
             number. It should be between 0 and 100, so we're using 0 for now."
        ));
        return 0.0;
    }
    if !(0.0..=100.0).contains(&value) {
        advisory(&format!(
            "The {attribute} setting is being set to {value} and it should be \
             between 0 and 100. You might want to look in your code where \
             you're setting {attribute} and make sure it's between 0 and 100."
        ));
        return value.clamp(0.0, 100.0);
    }
    value
}

pub(crate) struct SpriteData {
    pub shape: Shape,
    pub x: f32,
    pub y: f32,
    /// Degrees, counterclockwise. For lines this field is unused; their
    /// angle is derived from the endpoints.
    pub angle: f32,
    /// Scale percentage [0, 100]
    pub size: f32,
    /// Opacity percentage [0, 100]
    pub transparency: f32,
    pub hidden: bool,
    /// Set when the pointer clicked this sprite this tick; cleared at the
    /// start of the next tick.
    pub clicked: bool,
    /// Marked by `remove()`; the store prunes dead sprites each tick.
    pub removed: bool,
    pub physics: Option<PhysicsBinding>,
    pub click_callbacks: Vec<Rc<RefCell<Registration>>>,
    pub surface: SurfaceCache,
}

/// Handle to a live sprite. Clone it freely into callbacks.
#[derive(Clone)]
pub struct Sprite {
    data: Rc<RefCell<SpriteData>>,
    physics: Rc<RefCell<PhysicsWorld>>,
    fonts: Rc<RefCell<FontStore>>,
    store: Rc<RefCell<Vec<Sprite>>>,
}

impl Sprite {
    /// Construct a sprite, compute its first primary surface, and append
    /// it to the entity store. Fatal if the shape can't rasterize (missing
    /// image file, for instance).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn spawn(
        shape: Shape,
        x: f32,
        y: f32,
        angle: f32,
        size: f32,
        transparency: f32,
        physics: Rc<RefCell<PhysicsWorld>>,
        fonts: Rc<RefCell<FontStore>>,
        store: Rc<RefCell<Vec<Sprite>>>,
    ) -> Result<Sprite, GameError> {
        let primary = shape.rasterize(&mut fonts.borrow_mut(), (x, y))?;
        let data = SpriteData {
            shape,
            x,
            y,
            angle,
            size: clamp_percent(size, "size"),
            transparency: clamp_percent(transparency, "transparency"),
            hidden: false,
            clicked: false,
            removed: false,
            physics: None,
            click_callbacks: Vec::new(),
            surface: SurfaceCache::new(primary),
        };
        let sprite = Sprite {
            data: Rc::new(RefCell::new(data)),
            physics,
            fonts,
            store,
        };
        sprite.store.borrow_mut().push(sprite.clone());
        Ok(sprite)
    }

    pub(crate) fn raw(&self) -> RefMut<'_, SpriteData> {
        self.data.borrow_mut()
    }

    // ---- position & transform ----------------------------------------

    pub fn x(&self) -> f32 {
        self.data.borrow().x
    }

    pub fn set_x(&self, x: f32) {
        let mut data = self.data.borrow_mut();
        data.x = x;
        let (x, y) = (data.x, data.y);
        if let Some(binding) = &data.physics {
            binding.push_position(&mut self.physics.borrow_mut(), x, y);
        }
    }

    pub fn y(&self) -> f32 {
        self.data.borrow().y
    }

    pub fn set_y(&self, y: f32) {
        let mut data = self.data.borrow_mut();
        data.y = y;
        let (x, y) = (data.x, data.y);
        if let Some(binding) = &data.physics {
            binding.push_position(&mut self.physics.borrow_mut(), x, y);
        }
    }

    pub fn go_to(&self, x: f32, y: f32) {
        self.set_x(x);
        self.set_y(y);
    }

    /// Rotation in degrees. For lines, the direction from start point to
    /// endpoint.
    pub fn angle(&self) -> f32 {
        let data = self.data.borrow();
        match &data.shape {
            Shape::Line(line) => line_length_angle(data.x, data.y, line.x1, line.y1).1,
            _ => data.angle,
        }
    }

    pub fn set_angle(&self, angle: f32) {
        let mut data = self.data.borrow_mut();
        let (x, y) = (data.x, data.y);
        if let Shape::Line(line) = &mut data.shape {
            // A line's angle swings its endpoint around the start point
            let (length, _) = line_length_angle(x, y, line.x1, line.y1);
            let (x1, y1) = line_endpoint(x, y, length, angle);
            line.x1 = x1;
            line.y1 = y1;
            data.surface.mark_primary_dirty();
            return;
        }
        data.angle = angle;
        data.surface.mark_secondary_dirty();
        if let Some(binding) = &data.physics {
            binding.push_angle(&mut self.physics.borrow_mut(), angle);
        }
    }

    /// Scale percentage in [0, 100]; out-of-range writes clamp and advise.
    pub fn size(&self) -> f32 {
        self.data.borrow().size
    }

    pub fn set_size(&self, size: f32) {
        let mut data = self.data.borrow_mut();
        data.size = clamp_percent(size, "size");
        data.surface.mark_secondary_dirty();
    }

    /// Opacity percentage in [0, 100]; out-of-range writes clamp and
    /// advise.
    pub fn transparency(&self) -> f32 {
        self.data.borrow().transparency
    }

    pub fn set_transparency(&self, transparency: f32) {
        let mut data = self.data.borrow_mut();
        data.transparency = clamp_percent(transparency, "transparency");
        data.surface.mark_secondary_dirty();
    }

    // ---- movement helpers --------------------------------------------

    /// Step along the current heading.
    pub fn move_forward(&self, steps: f32) {
        let radians = self.angle().to_radians();
        self.set_x(self.x() + steps * radians.cos());
        self.set_y(self.y() + steps * radians.sin());
    }

    pub fn turn(&self, degrees: f32) {
        self.set_angle(self.angle() + degrees);
    }

    pub fn point_towards(&self, x: f32, y: f32) {
        self.set_angle((y - self.y()).atan2(x - self.x()).to_degrees());
    }

    pub fn distance_to(&self, x: f32, y: f32) -> f32 {
        (self.x() - x).hypot(self.y() - y)
    }

    // ---- visibility & clicks -----------------------------------------

    pub fn hide(&self) {
        self.data.borrow_mut().hidden = true;
    }

    pub fn show(&self) {
        self.data.borrow_mut().hidden = false;
    }

    pub fn is_hidden(&self) -> bool {
        self.data.borrow().hidden
    }

    pub fn is_shown(&self) -> bool {
        !self.is_hidden()
    }

    /// Was this sprite clicked this tick?
    pub fn is_clicked(&self) -> bool {
        self.data.borrow().clicked
    }

    /// Run `callback` whenever this sprite is clicked.
    pub fn when_clicked<F, Fut>(&self, callback: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: std::future::Future<Output = ()> + 'static,
    {
        self.data
            .borrow_mut()
            .click_callbacks
            .push(Rc::new(RefCell::new(Registration::new(callback))));
    }

    /// [`Sprite::when_clicked`] for callbacks that never suspend.
    pub fn when_clicked_sync<F>(&self, callback: F)
    where
        F: FnMut() + 'static,
    {
        self.data
            .borrow_mut()
            .click_callbacks
            .push(Rc::new(RefCell::new(Registration::new_sync(callback))));
    }

    // ---- display geometry --------------------------------------------

    /// Display width. Boxes report their logical width; other kinds the
    /// current secondary-surface width.
    pub fn width(&self) -> f32 {
        let data = self.data.borrow();
        match &data.shape {
            Shape::Box(b) => b.width,
            _ => data.surface.secondary().width as f32,
        }
    }

    /// Display height. Boxes report their logical height.
    pub fn height(&self) -> f32 {
        let data = self.data.borrow();
        match &data.shape {
            Shape::Box(b) => b.height,
            _ => data.surface.secondary().height as f32,
        }
    }

    pub fn left(&self) -> f32 {
        self.x() - self.width() / 2.0
    }

    pub fn set_left(&self, x: f32) {
        self.set_x(x + self.width() / 2.0);
    }

    pub fn right(&self) -> f32 {
        self.x() + self.width() / 2.0
    }

    pub fn set_right(&self, x: f32) {
        self.set_x(x - self.width() / 2.0);
    }

    pub fn top(&self) -> f32 {
        self.y() + self.height() / 2.0
    }

    pub fn set_top(&self, y: f32) {
        self.set_y(y - self.height() / 2.0);
    }

    pub fn bottom(&self) -> f32 {
        self.y() - self.height() / 2.0
    }

    pub fn set_bottom(&self, y: f32) {
        self.set_y(y + self.height() / 2.0);
    }

    /// Does the display rectangle contain this world-space point?
    pub(crate) fn contains_point(&self, px: f32, py: f32) -> bool {
        let data = self.data.borrow();
        let half_w = data.surface.secondary().width as f32 / 2.0;
        let half_h = data.surface.secondary().height as f32 / 2.0;
        (px - data.x).abs() <= half_w && (py - data.y).abs() <= half_h
    }

    // ---- lifecycle ---------------------------------------------------

    /// Remove the sprite from the scene, detaching any physics binding.
    /// The handle stays valid but the sprite no longer simulates, renders
    /// or receives clicks.
    pub fn remove(&self) {
        let mut data = self.data.borrow_mut();
        if let Some(mut binding) = data.physics.take() {
            binding.remove_from(&mut self.physics.borrow_mut());
        }
        data.removed = true;
        drop(data);
        self.store
            .borrow_mut()
            .retain(|s| !Rc::ptr_eq(&s.data, &self.data));
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.data.borrow().removed
    }

    /// A new sprite with the same shape and transform. Physics bindings
    /// and click callbacks are not copied.
    pub fn duplicate(&self) -> Result<Sprite, GameError> {
        let data = self.data.borrow();
        Sprite::spawn(
            data.shape.clone(),
            data.x,
            data.y,
            data.angle,
            data.size,
            data.transparency,
            self.physics.clone(),
            self.fonts.clone(),
            self.store.clone(),
        )
    }

    // ---- physics -----------------------------------------------------

    /// Attach a physics binding. Does nothing if one is already attached.
    pub fn start_physics(&self, options: PhysicsOptions) {
        let geometry = self.collider_geometry();
        let mut data = self.data.borrow_mut();
        if data.physics.is_some() {
            return;
        }
        let (x, y, angle) = (data.x, data.y, data.angle);
        data.physics = Some(PhysicsBinding::new(
            &mut self.physics.borrow_mut(),
            options,
            geometry,
            x,
            y,
            angle,
        ));
    }

    /// Detach the physics binding, if any.
    pub fn stop_physics(&self) {
        let mut data = self.data.borrow_mut();
        if let Some(mut binding) = data.physics.take() {
            binding.remove_from(&mut self.physics.borrow_mut());
        }
    }

    pub fn has_physics(&self) -> bool {
        self.data.borrow().physics.is_some()
    }

    fn collider_geometry(&self) -> ColliderGeometry {
        let data = self.data.borrow();
        match &data.shape {
            Shape::Circle(c) => ColliderGeometry::Ball { radius: c.radius },
            Shape::Box(b) => ColliderGeometry::Cuboid {
                width: b.width,
                height: b.height,
            },
            _ => ColliderGeometry::Cuboid {
                width: (data.surface.secondary().width as f32).max(1.0),
                height: (data.surface.secondary().height as f32).max(1.0),
            },
        }
    }

    fn advise_no_physics(&self, what: &str) {
        advisory(&format!(
            "You're trying to set {what} on a sprite that doesn't have \
             physics turned on. Call start_physics on the sprite first."
        ));
    }

    /// Horizontal speed in user units; 0 without a binding.
    pub fn x_speed(&self) -> f32 {
        self.data
            .borrow()
            .physics
            .as_ref()
            .map_or(0.0, |b| b.x_speed())
    }

    pub fn set_x_speed(&self, speed: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.physics {
            Some(binding) => binding.set_x_speed(&mut self.physics.borrow_mut(), speed),
            None => self.advise_no_physics("x_speed"),
        }
    }

    /// Vertical speed in user units; 0 without a binding.
    pub fn y_speed(&self) -> f32 {
        self.data
            .borrow()
            .physics
            .as_ref()
            .map_or(0.0, |b| b.y_speed())
    }

    pub fn set_y_speed(&self, speed: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.physics {
            Some(binding) => binding.set_y_speed(&mut self.physics.borrow_mut(), speed),
            None => self.advise_no_physics("y_speed"),
        }
    }

    pub fn bounciness(&self) -> f32 {
        self.data
            .borrow()
            .physics
            .as_ref()
            .map_or(0.0, |b| b.bounciness())
    }

    pub fn set_bounciness(&self, bounciness: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.physics {
            Some(binding) => binding.set_bounciness(&mut self.physics.borrow_mut(), bounciness),
            None => self.advise_no_physics("bounciness"),
        }
    }

    pub fn mass(&self) -> f32 {
        self.data
            .borrow()
            .physics
            .as_ref()
            .map_or(0.0, |b| b.mass())
    }

    pub fn set_mass(&self, mass: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.physics {
            Some(binding) => binding.set_mass(&mut self.physics.borrow_mut(), mass),
            None => self.advise_no_physics("mass"),
        }
    }

    pub fn can_move(&self) -> bool {
        self.data
            .borrow()
            .physics
            .as_ref()
            .is_some_and(|b| b.can_move())
    }

    pub fn set_can_move(&self, can_move: bool) {
        let geometry = self.collider_geometry();
        let mut data = self.data.borrow_mut();
        let (x, y, angle) = (data.x, data.y, data.angle);
        match &mut data.physics {
            Some(binding) => binding.set_can_move(
                &mut self.physics.borrow_mut(),
                geometry,
                x,
                y,
                angle,
                can_move,
            ),
            None => self.advise_no_physics("can_move"),
        }
    }

    pub fn can_turn(&self) -> bool {
        self.data
            .borrow()
            .physics
            .as_ref()
            .is_some_and(|b| b.can_turn())
    }

    pub fn set_can_turn(&self, can_turn: bool) {
        let geometry = self.collider_geometry();
        let mut data = self.data.borrow_mut();
        let (x, y, angle) = (data.x, data.y, data.angle);
        match &mut data.physics {
            Some(binding) => binding.set_can_turn(
                &mut self.physics.borrow_mut(),
                geometry,
                x,
                y,
                angle,
                can_turn,
            ),
            None => self.advise_no_physics("can_turn"),
        }
    }

    pub fn obeys_gravity(&self) -> bool {
        self.data
            .borrow()
            .physics
            .as_ref()
            .is_some_and(|b| b.obeys_gravity())
    }

    pub fn set_obeys_gravity(&self, obeys: bool) {
        let mut data = self.data.borrow_mut();
        match &mut data.physics {
            Some(binding) => binding.set_obeys_gravity(&mut self.physics.borrow_mut(), obeys),
            None => self.advise_no_physics("obeys_gravity"),
        }
    }

    /// Pull simulation results into the sprite after a physics step.
    pub(crate) fn sync_physics(&self) {
        let mut data = self.data.borrow_mut();
        let d = &mut *data;
        let Some(binding) = &mut d.physics else {
            return;
        };
        let Some(readout) = binding.sync_from_body(&self.physics.borrow()) else {
            return;
        };
        if let Some(x) = readout.x {
            d.x = x;
        }
        if let Some(y) = readout.y {
            d.y = y;
        }
        // Lines keep endpoint-derived angles; rotating them from the
        // simulation would fight that definition.
        if !d.shape.is_line() {
            if let Some(angle) = readout.angle_degrees {
                if angle != d.angle {
                    d.angle = angle;
                    d.surface.mark_secondary_dirty();
                }
            }
        }
    }

    /// Recompute dirty surfaces. Runs at a fixed point in the tick, never
    /// from a mutator.
    pub(crate) fn refresh_surface(&self) {
        let mut data = self.data.borrow_mut();
        let d = &mut *data;
        if !d.surface.needs_refresh() {
            return;
        }
        let view = ViewTransform {
            size: d.size,
            angle: d.angle,
            transparency: d.transparency,
        };
        let shape = &d.shape;
        let origin = (d.x, d.y);
        let fonts = &self.fonts;
        d.surface
            .refresh(view, shape.is_line(), || {
                match shape.rasterize(&mut fonts.borrow_mut(), origin) {
                    Ok(surface) => Some(surface),
                    Err(e) => {
                        advisory(&format!(
                            "A sprite couldn't redraw itself and is keeping its \
                             old look. The problem was:{e}"
                        ));
                        None
                    }
                }
            });
    }

    // ---- kind-specific properties ------------------------------------

    fn advise_wrong_kind(&self, property: &str) {
        let kind = self.data.borrow().shape.kind_name();
        advisory(&format!(
            "You're trying to use {property} on a {kind} sprite, but {kind} \
             sprites don't have {property}. Nothing happened."
        ));
    }

    /// Fill color name, for kinds that have one.
    pub fn color(&self) -> Option<String> {
        let data = self.data.borrow();
        match &data.shape {
            Shape::Box(b) => Some(b.color.name().to_string()),
            Shape::Circle(c) => Some(c.color.name().to_string()),
            Shape::Line(l) => Some(l.color.name().to_string()),
            Shape::Text(t) => Some(t.color.name().to_string()),
            Shape::Image(_) => None,
        }
    }

    /// Set the fill color by name. Fatal on an unknown name, advisory on
    /// an image sprite.
    pub fn set_color(&self, name: &str) -> Result<(), GameError> {
        let color = NamedColor::resolve(name)?;
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Box(b) => b.color = color,
            Shape::Circle(c) => c.color = color,
            Shape::Line(l) => l.color = color,
            Shape::Text(t) => t.color = color,
            Shape::Image(_) => {
                drop(data);
                self.advise_wrong_kind("color");
                return Ok(());
            }
        }
        data.surface.mark_primary_dirty();
        Ok(())
    }

    pub fn border_color(&self) -> Option<String> {
        let data = self.data.borrow();
        match &data.shape {
            Shape::Box(b) => Some(b.border_color.name().to_string()),
            Shape::Circle(c) => Some(c.border_color.name().to_string()),
            _ => None,
        }
    }

    pub fn set_border_color(&self, name: &str) -> Result<(), GameError> {
        let color = NamedColor::resolve(name)?;
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Box(b) => b.border_color = color,
            Shape::Circle(c) => c.border_color = color,
            _ => {
                drop(data);
                self.advise_wrong_kind("border_color");
                return Ok(());
            }
        }
        data.surface.mark_primary_dirty();
        Ok(())
    }

    pub fn border_width(&self) -> Option<f32> {
        let data = self.data.borrow();
        match &data.shape {
            Shape::Box(b) => Some(b.border_width),
            Shape::Circle(c) => Some(c.border_width),
            _ => None,
        }
    }

    pub fn set_border_width(&self, width: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Box(b) => b.border_width = width,
            Shape::Circle(c) => c.border_width = width,
            _ => {
                drop(data);
                self.advise_wrong_kind("border_width");
                return;
            }
        }
        data.surface.mark_primary_dirty();
    }

    /// Box width. Advisory on other kinds (their width is derived).
    pub fn set_width(&self, width: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Box(b) => {
                b.width = width;
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("width");
            }
        }
    }

    /// Box height. Advisory on other kinds.
    pub fn set_height(&self, height: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Box(b) => {
                b.height = height;
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("height");
            }
        }
    }

    pub fn radius(&self) -> Option<f32> {
        match &self.data.borrow().shape {
            Shape::Circle(c) => Some(c.radius),
            _ => None,
        }
    }

    pub fn set_radius(&self, radius: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Circle(c) => {
                c.radius = radius;
                data.surface.mark_primary_dirty();
                if let Some(binding) = &data.physics {
                    binding.set_ball_radius(&mut self.physics.borrow_mut(), radius);
                }
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("radius");
            }
        }
    }

    pub fn words(&self) -> Option<String> {
        match &self.data.borrow().shape {
            Shape::Text(t) => Some(t.words.clone()),
            _ => None,
        }
    }

    pub fn set_words(&self, words: &str) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Text(t) => {
                t.words = words.to_string();
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("words");
            }
        }
    }

    pub fn set_font(&self, font: Option<&str>) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Text(t) => {
                t.font = font.map(|f| f.to_string());
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("font");
            }
        }
    }

    pub fn set_font_size(&self, font_size: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Text(t) => {
                t.font_size = font_size;
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("font_size");
            }
        }
    }

    /// Image file path. Fatal if the new file doesn't exist, advisory on
    /// non-image sprites.
    pub fn set_image(&self, path: &str) -> Result<(), GameError> {
        if !std::path::Path::new(path).exists() {
            return Err(GameError::ImageNotFound(path.to_string()));
        }
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Image(i) => {
                i.path = Some(path.to_string());
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("image");
            }
        }
        Ok(())
    }

    pub fn thickness(&self) -> Option<f32> {
        match &self.data.borrow().shape {
            Shape::Line(l) => Some(l.thickness),
            _ => None,
        }
    }

    pub fn set_thickness(&self, thickness: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Line(l) => {
                l.thickness = thickness;
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("thickness");
            }
        }
    }

    pub fn x1(&self) -> Option<f32> {
        match &self.data.borrow().shape {
            Shape::Line(l) => Some(l.x1),
            _ => None,
        }
    }

    pub fn set_x1(&self, x1: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Line(l) => {
                l.x1 = x1;
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("x1");
            }
        }
    }

    pub fn y1(&self) -> Option<f32> {
        match &self.data.borrow().shape {
            Shape::Line(l) => Some(l.y1),
            _ => None,
        }
    }

    pub fn set_y1(&self, y1: f32) {
        let mut data = self.data.borrow_mut();
        match &mut data.shape {
            Shape::Line(l) => {
                l.y1 = y1;
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("y1");
            }
        }
    }

    /// Line length, derived from the endpoints.
    pub fn length(&self) -> Option<f32> {
        let data = self.data.borrow();
        match &data.shape {
            Shape::Line(l) => Some(line_length_angle(data.x, data.y, l.x1, l.y1).0),
            _ => None,
        }
    }

    pub fn set_length(&self, length: f32) {
        let mut data = self.data.borrow_mut();
        let (x, y) = (data.x, data.y);
        match &mut data.shape {
            Shape::Line(l) => {
                let angle = line_length_angle(x, y, l.x1, l.y1).1;
                let (x1, y1) = line_endpoint(x, y, length, angle);
                l.x1 = x1;
                l.y1 = y1;
                data.surface.mark_primary_dirty();
            }
            _ => {
                drop(data);
                self.advise_wrong_kind("length");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::NamedColor;
    use crate::error::advisory_count;
    use crate::screen::Screen;
    use shape::{BoxShape, CircleShape, LineShape};

    struct Fixture {
        physics: Rc<RefCell<PhysicsWorld>>,
        fonts: Rc<RefCell<FontStore>>,
        store: Rc<RefCell<Vec<Sprite>>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                physics: Rc::new(RefCell::new(PhysicsWorld::new(Screen::default()))),
                fonts: Rc::new(RefCell::new(FontStore::new())),
                store: Rc::new(RefCell::new(Vec::new())),
            }
        }

        fn circle(&self, radius: f32) -> Sprite {
            let shape = Shape::Circle(CircleShape {
                radius,
                color: NamedColor::resolve("black").unwrap(),
                border_color: NamedColor::resolve("light blue").unwrap(),
                border_width: 0.0,
            });
            self.spawn(shape)
        }

        fn spawn(&self, shape: Shape) -> Sprite {
            Sprite::spawn(
                shape,
                0.0,
                0.0,
                0.0,
                100.0,
                100.0,
                self.physics.clone(),
                self.fonts.clone(),
                self.store.clone(),
            )
            .unwrap()
        }
    }

    #[test]
    fn test_position_round_trip_without_physics() {
        let fx = Fixture::new();
        let sprite = fx.circle(10.0);
        sprite.set_x(12.5);
        sprite.set_y(-40.25);
        assert_eq!(sprite.x(), 12.5);
        assert_eq!(sprite.y(), -40.25);
    }

    #[test]
    fn test_out_of_range_percentages_clamp_with_advisory() {
        let fx = Fixture::new();
        let sprite = fx.circle(10.0);

        let before = advisory_count();
        sprite.set_transparency(150.0);
        assert_eq!(sprite.transparency(), 100.0);
        assert!(advisory_count() > before);

        let before = advisory_count();
        sprite.set_size(-20.0);
        assert_eq!(sprite.size(), 0.0);
        assert!(advisory_count() > before);

        // in-range writes stay silent
        let before = advisory_count();
        sprite.set_transparency(50.0);
        assert_eq!(sprite.transparency(), 50.0);
        assert_eq!(advisory_count(), before);
    }

    #[test]
    fn test_gravity_moves_a_bound_sprite_down() {
        let fx = Fixture::new();
        let sprite = fx.circle(15.0);
        sprite.start_physics(PhysicsOptions::default());
        for _ in 0..5 {
            fx.physics.borrow_mut().step_frame();
            sprite.sync_physics();
        }
        assert!(sprite.y() < 0.0);
        assert!(sprite.y_speed() < 0.0);
    }

    #[test]
    fn test_position_writes_push_into_the_body() {
        let fx = Fixture::new();
        let sprite = fx.circle(15.0);
        sprite.start_physics(PhysicsOptions {
            obeys_gravity: false,
            ..Default::default()
        });
        sprite.go_to(50.0, 60.0);
        fx.physics.borrow_mut().step_frame();
        sprite.sync_physics();
        assert!((sprite.x() - 50.0).abs() < 1.0);
        assert!((sprite.y() - 60.0).abs() < 1.0);
    }

    #[test]
    fn test_remove_detaches_physics_and_leaves_the_store() {
        let fx = Fixture::new();
        let sprite = fx.circle(10.0);
        sprite.start_physics(PhysicsOptions::default());
        assert_eq!(fx.store.borrow().len(), 1);
        sprite.remove();
        assert!(!sprite.has_physics());
        assert!(sprite.is_removed());
        assert!(fx.store.borrow().is_empty());
    }

    #[test]
    fn test_duplicate_copies_attributes_but_not_physics() {
        let fx = Fixture::new();
        let sprite = fx.circle(10.0);
        sprite.go_to(5.0, 6.0);
        sprite.set_size(80.0);
        sprite.start_physics(PhysicsOptions::default());

        let copy = sprite.duplicate().unwrap();
        assert_eq!(copy.x(), 5.0);
        assert_eq!(copy.size(), 80.0);
        assert_eq!(copy.radius(), Some(10.0));
        assert!(!copy.has_physics());
        assert_eq!(fx.store.borrow().len(), 2);
    }

    #[test]
    fn test_box_reports_logical_extents() {
        let fx = Fixture::new();
        let sprite = fx.spawn(Shape::Box(BoxShape {
            width: 100.0,
            height: 40.0,
            color: NamedColor::resolve("black").unwrap(),
            border_color: NamedColor::resolve("light blue").unwrap(),
            border_width: 0.0,
        }));
        assert_eq!(sprite.width(), 100.0);
        assert_eq!(sprite.height(), 40.0);
        assert_eq!(sprite.top(), 20.0);
        sprite.set_left(0.0);
        assert_eq!(sprite.x(), 50.0);
    }

    #[test]
    fn test_line_angle_setter_moves_the_endpoint() {
        let fx = Fixture::new();
        let sprite = fx.spawn(Shape::Line(LineShape {
            x1: 100.0,
            y1: 0.0,
            thickness: 1.0,
            color: NamedColor::resolve("black").unwrap(),
        }));
        assert_eq!(sprite.angle(), 0.0);
        sprite.set_angle(90.0);
        let x1 = sprite.x1().unwrap();
        let y1 = sprite.y1().unwrap();
        assert!(x1.abs() < 1e-3);
        assert!((y1 - 100.0).abs() < 1e-3);
        // and the derived angle agrees
        assert!((sprite.angle() - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_wrong_kind_property_is_an_advisory_not_a_panic() {
        let fx = Fixture::new();
        let sprite = fx.circle(10.0);
        let before = advisory_count();
        sprite.set_words("hello");
        assert!(advisory_count() > before);
        assert_eq!(sprite.words(), None);
    }

    #[test]
    fn test_color_setter_validates_eagerly() {
        let fx = Fixture::new();
        let sprite = fx.circle(10.0);
        assert!(sprite.set_color("tomato").is_ok());
        assert_eq!(sprite.color(), Some("tomato".to_string()));
        assert!(sprite.set_color("not a color").is_err());
        // failed write leaves the old color in place
        assert_eq!(sprite.color(), Some("tomato".to_string()));
    }

    #[test]
    fn test_hit_test_uses_the_display_rectangle() {
        let fx = Fixture::new();
        let sprite = fx.circle(10.0);
        sprite.refresh_surface();
        assert!(sprite.contains_point(0.0, 0.0));
        assert!(sprite.contains_point(9.0, 9.0));
        assert!(!sprite.contains_point(30.0, 0.0));
    }

    #[test]
    fn test_speed_setter_without_physics_advises() {
        let fx = Fixture::new();
        let sprite = fx.circle(10.0);
        let before = advisory_count();
        sprite.set_x_speed(5.0);
        assert!(advisory_count() > before);
        assert_eq!(sprite.x_speed(), 0.0);
    }
}
