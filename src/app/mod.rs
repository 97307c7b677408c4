//! Application state and the user-facing API
//!
//! One [`App`] owns everything that used to be scattered globals in
//! beginner game libraries: the entity store, the callback registries, the
//! physics world, the font cache, mouse/keyboard snapshots and the
//! background color. The handle is cheap to clone into callbacks; all
//! state sits behind `Rc<RefCell<..>>` on the single logical thread.
//!
//! Construction methods take per-kind option structs with `Default` impls,
//! so callers spell out only what they care about:
//!
//! ```no_run
//! # use romp::{App, BoxOptions};
//! # let app = App::new();
//! let paddle = app.new_box(BoxOptions {
//!     color: "sea green".to_string(),
//!     width: 120.0,
//!     height: 20.0,
//!     y: -250.0,
//!     ..Default::default()
//! }).unwrap();
//! ```

pub(crate) mod runtime;

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use macroquad::prelude::Conf;

use crate::callbacks::{KeyRegistration, Registration};
use crate::color::NamedColor;
use crate::error::GameError;
use crate::physics::PhysicsWorld;
use crate::schedule::Timer;
use crate::screen::Screen;
use crate::sprite::fonts::FontStore;
use crate::sprite::shape::{
    line_endpoint, BoxShape, CircleShape, ImageShape, LineShape, Shape, TextShape,
};
use crate::sprite::Sprite;

/// Options for [`App::new_image_sprite`].
#[derive(Debug, Clone)]
pub struct ImageOptions {
    /// Path to the image file; `None` renders a small transparent
    /// placeholder.
    pub image: Option<String>,
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub angle: f32,
    pub transparency: f32,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            image: None,
            x: 0.0,
            y: 0.0,
            size: 100.0,
            angle: 0.0,
            transparency: 100.0,
        }
    }
}

/// Options for [`App::new_box`].
#[derive(Debug, Clone)]
pub struct BoxOptions {
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub border_color: String,
    pub border_width: f32,
    pub angle: f32,
    pub transparency: f32,
    pub size: f32,
}

impl Default for BoxOptions {
    fn default() -> Self {
        Self {
            color: "black".to_string(),
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 200.0,
            border_color: "light blue".to_string(),
            border_width: 0.0,
            angle: 0.0,
            transparency: 100.0,
            size: 100.0,
        }
    }
}

/// Options for [`App::new_circle`].
#[derive(Debug, Clone)]
pub struct CircleOptions {
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub border_color: String,
    pub border_width: f32,
    pub angle: f32,
    pub transparency: f32,
    pub size: f32,
}

impl Default for CircleOptions {
    fn default() -> Self {
        Self {
            color: "black".to_string(),
            x: 0.0,
            y: 0.0,
            radius: 100.0,
            border_color: "light blue".to_string(),
            border_width: 0.0,
            angle: 0.0,
            transparency: 100.0,
            size: 100.0,
        }
    }
}

/// Options for [`App::new_line`].
///
/// The endpoint can be given directly (`x1`/`y1`) or as `length`/`angle`
/// from the start point; whichever pair is present wins, and a plain
/// horizontal 100-pixel line is the fallback.
#[derive(Debug, Clone)]
pub struct LineOptions {
    pub color: String,
    pub x: f32,
    pub y: f32,
    pub length: Option<f32>,
    pub angle: Option<f32>,
    pub thickness: f32,
    pub x1: Option<f32>,
    pub y1: Option<f32>,
    pub transparency: f32,
    pub size: f32,
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            color: "black".to_string(),
            x: 0.0,
            y: 0.0,
            length: None,
            angle: None,
            thickness: 1.0,
            x1: None,
            y1: None,
            transparency: 100.0,
            size: 100.0,
        }
    }
}

/// Options for [`App::new_text`].
#[derive(Debug, Clone)]
pub struct TextOptions {
    pub words: String,
    pub x: f32,
    pub y: f32,
    /// Path to a TTF/OTF file; `None` uses the built-in font.
    pub font: Option<String>,
    pub font_size: f32,
    pub color: String,
    pub angle: f32,
    pub transparency: f32,
    pub size: f32,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            words: "hi :)".to_string(),
            x: 0.0,
            y: 0.0,
            font: None,
            font_size: 50.0,
            color: "black".to_string(),
            angle: 0.0,
            transparency: 100.0,
            size: 100.0,
        }
    }
}

/// Pointer state published once per tick for user queries.
pub(crate) struct MouseState {
    pub x: f32,
    pub y: f32,
    pub held: bool,
}

/// The per-trigger-class callback lists, in registration order.
#[derive(Default)]
pub(crate) struct Registry {
    pub startup: Vec<Rc<RefCell<Registration>>>,
    pub keypress: Vec<Rc<RefCell<KeyRegistration>>>,
    pub keyrelease: Vec<Rc<RefCell<KeyRegistration>>>,
    pub click: Vec<Rc<RefCell<Registration>>>,
    pub click_release: Vec<Rc<RefCell<Registration>>>,
    pub forever: Vec<Rc<RefCell<Registration>>>,
}

pub(crate) struct AppCore {
    pub screen: Screen,
    pub background: RefCell<(u8, u8, u8)>,
    pub physics: Rc<RefCell<PhysicsWorld>>,
    pub sprites: Rc<RefCell<Vec<Sprite>>>,
    pub fonts: Rc<RefCell<FontStore>>,
    pub registry: RefCell<Registry>,
    pub mouse: RefCell<MouseState>,
    pub keys_down: RefCell<Vec<String>>,
    /// Scheduler clock, shared so [`App::timer`] deadlines compare against
    /// tick time.
    pub clock: Rc<Cell<f64>>,
}

/// Handle to the whole application. Clone it freely into callbacks.
#[derive(Clone)]
pub struct App {
    pub(crate) core: Rc<AppCore>,
}

impl App {
    pub fn new() -> Self {
        let screen = Screen::default();
        Self {
            core: Rc::new(AppCore {
                screen,
                background: RefCell::new((255, 255, 255)),
                physics: Rc::new(RefCell::new(PhysicsWorld::new(screen))),
                sprites: Rc::new(RefCell::new(Vec::new())),
                fonts: Rc::new(RefCell::new(FontStore::new())),
                registry: RefCell::new(Registry::default()),
                mouse: RefCell::new(MouseState {
                    x: 0.0,
                    y: 0.0,
                    held: false,
                }),
                keys_down: RefCell::new(Vec::new()),
                clock: Rc::new(Cell::new(0.0)),
            }),
        }
    }

    pub fn screen(&self) -> Screen {
        self.core.screen
    }

    /// Set the background by color name; unknown names fail here, at the
    /// call site in user code.
    pub fn set_background_color(&self, name: &str) -> Result<(), GameError> {
        *self.core.background.borrow_mut() = crate::color::color_name_to_rgb(name)?;
        Ok(())
    }

    pub fn set_background_rgb(&self, r: u8, g: u8, b: u8) {
        *self.core.background.borrow_mut() = (r, g, b);
    }

    /// World gravity as (vertical, horizontal). Default (-1000, 0).
    pub fn gravity(&self) -> (f32, f32) {
        self.core.physics.borrow().gravity()
    }

    pub fn set_gravity(&self, vertical: f32, horizontal: f32) {
        self.core.physics.borrow_mut().set_gravity(vertical, horizontal);
    }

    // ---- input queries -----------------------------------------------

    /// Pointer position in centered coordinates.
    pub fn mouse_position(&self) -> (f32, f32) {
        let mouse = self.core.mouse.borrow();
        (mouse.x, mouse.y)
    }

    /// Is a mouse button currently held?
    pub fn mouse_is_clicked(&self) -> bool {
        self.core.mouse.borrow().held
    }

    pub fn mouse_distance_to(&self, x: f32, y: f32) -> f32 {
        let (mx, my) = self.mouse_position();
        (mx - x).hypot(my - y)
    }

    /// Is any of the named keys currently held?
    pub fn key_is_pressed(&self, keys: &[&str]) -> bool {
        let down = self.core.keys_down.borrow();
        keys.iter().any(|k| down.iter().any(|d| d == k))
    }

    /// A timer future: `app.timer(1.0).await` suspends the callback for a
    /// second of tick time.
    pub fn timer(&self, seconds: f64) -> Timer {
        Timer::new(self.core.clock.clone(), self.core.clock.get() + seconds)
    }

    // ---- sprite constructors -----------------------------------------

    fn spawn(
        &self,
        shape: Shape,
        x: f32,
        y: f32,
        angle: f32,
        size: f32,
        transparency: f32,
    ) -> Result<Sprite, GameError> {
        Sprite::spawn(
            shape,
            x,
            y,
            angle,
            size,
            transparency,
            self.core.physics.clone(),
            self.core.fonts.clone(),
            self.core.sprites.clone(),
        )
    }

    pub fn new_image_sprite(&self, options: ImageOptions) -> Result<Sprite, GameError> {
        self.spawn(
            Shape::Image(ImageShape {
                path: options.image,
            }),
            options.x,
            options.y,
            options.angle,
            options.size,
            options.transparency,
        )
    }

    pub fn new_box(&self, options: BoxOptions) -> Result<Sprite, GameError> {
        self.spawn(
            Shape::Box(BoxShape {
                width: options.width,
                height: options.height,
                color: NamedColor::resolve(&options.color)?,
                border_color: NamedColor::resolve(&options.border_color)?,
                border_width: options.border_width,
            }),
            options.x,
            options.y,
            options.angle,
            options.size,
            options.transparency,
        )
    }

    pub fn new_circle(&self, options: CircleOptions) -> Result<Sprite, GameError> {
        self.spawn(
            Shape::Circle(CircleShape {
                radius: options.radius,
                color: NamedColor::resolve(&options.color)?,
                border_color: NamedColor::resolve(&options.border_color)?,
                border_width: options.border_width,
            }),
            options.x,
            options.y,
            options.angle,
            options.size,
            options.transparency,
        )
    }

    pub fn new_line(&self, options: LineOptions) -> Result<Sprite, GameError> {
        let (x1, y1) = match (options.length, options.angle, options.x1, options.y1) {
            (Some(length), Some(angle), _, _) => {
                line_endpoint(options.x, options.y, length, angle)
            }
            (_, _, Some(x1), Some(y1)) => (x1, y1),
            (length, angle, _, _) => line_endpoint(
                options.x,
                options.y,
                length.unwrap_or(100.0),
                angle.unwrap_or(0.0),
            ),
        };
        self.spawn(
            Shape::Line(LineShape {
                x1,
                y1,
                thickness: options.thickness,
                color: NamedColor::resolve(&options.color)?,
            }),
            options.x,
            options.y,
            0.0,
            options.size,
            options.transparency,
        )
    }

    pub fn new_text(&self, options: TextOptions) -> Result<Sprite, GameError> {
        self.spawn(
            Shape::Text(TextShape {
                words: options.words,
                font: options.font,
                font_size: options.font_size,
                color: NamedColor::resolve(&options.color)?,
            }),
            options.x,
            options.y,
            options.angle,
            options.size,
            options.transparency,
        )
    }

    // ---- callback registration ---------------------------------------

    /// Run `callback` once, before the first tick.
    pub fn when_program_starts<F, Fut>(&self, callback: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .startup
            .push(Rc::new(RefCell::new(Registration::new(callback))));
    }

    /// [`App::when_program_starts`] for callbacks that never suspend.
    pub fn when_program_starts_sync<F>(&self, callback: F)
    where
        F: FnMut() + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .startup
            .push(Rc::new(RefCell::new(Registration::new_sync(callback))));
    }

    /// Run `callback` every tick. While one invocation is still alive
    /// (suspended at a timer, say), further ticks skip it - the trigger is
    /// dropped, never queued.
    pub fn repeat_forever<F, Fut>(&self, callback: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .forever
            .push(Rc::new(RefCell::new(Registration::new(callback))));
    }

    /// [`App::repeat_forever`] for callbacks that never suspend.
    pub fn repeat_forever_sync<F>(&self, callback: F)
    where
        F: FnMut() + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .forever
            .push(Rc::new(RefCell::new(Registration::new_sync(callback))));
    }

    /// Run `callback(key)` when any key goes down.
    pub fn when_any_key_pressed<F, Fut>(&self, callback: F)
    where
        F: FnMut(String) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .keypress
            .push(Rc::new(RefCell::new(KeyRegistration::new(None, callback))));
    }

    /// Run `callback(key)` when one of `keys` goes down.
    pub fn when_key_pressed<F, Fut>(&self, keys: &[&str], callback: F)
    where
        F: FnMut(String) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        self.core
            .registry
            .borrow_mut()
            .keypress
            .push(Rc::new(RefCell::new(KeyRegistration::new(
                Some(keys),
                callback,
            ))));
    }

    /// [`App::when_key_pressed`] for callbacks that never suspend.
    pub fn when_key_pressed_sync<F>(&self, keys: &[&str], callback: F)
    where
        F: FnMut(String) + 'static,
    {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        self.core
            .registry
            .borrow_mut()
            .keypress
            .push(Rc::new(RefCell::new(KeyRegistration::new_sync(
                Some(keys),
                callback,
            ))));
    }

    /// [`App::when_any_key_pressed`] for callbacks that never suspend.
    pub fn when_any_key_pressed_sync<F>(&self, callback: F)
    where
        F: FnMut(String) + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .keypress
            .push(Rc::new(RefCell::new(KeyRegistration::new_sync(
                None, callback,
            ))));
    }

    /// Run `callback(key)` when any key comes up.
    pub fn when_any_key_released<F, Fut>(&self, callback: F)
    where
        F: FnMut(String) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .keyrelease
            .push(Rc::new(RefCell::new(KeyRegistration::new(None, callback))));
    }

    /// [`App::when_any_key_released`] for callbacks that never suspend.
    pub fn when_any_key_released_sync<F>(&self, callback: F)
    where
        F: FnMut(String) + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .keyrelease
            .push(Rc::new(RefCell::new(KeyRegistration::new_sync(
                None, callback,
            ))));
    }

    /// Run `callback(key)` when one of `keys` comes up.
    pub fn when_key_released<F, Fut>(&self, keys: &[&str], callback: F)
    where
        F: FnMut(String) -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        self.core
            .registry
            .borrow_mut()
            .keyrelease
            .push(Rc::new(RefCell::new(KeyRegistration::new(
                Some(keys),
                callback,
            ))));
    }

    /// [`App::when_key_released`] for callbacks that never suspend.
    pub fn when_key_released_sync<F>(&self, keys: &[&str], callback: F)
    where
        F: FnMut(String) + 'static,
    {
        let keys = keys.iter().map(|k| k.to_string()).collect();
        self.core
            .registry
            .borrow_mut()
            .keyrelease
            .push(Rc::new(RefCell::new(KeyRegistration::new_sync(
                Some(keys),
                callback,
            ))));
    }

    /// Run `callback` on every mouse click.
    pub fn when_mouse_clicked<F, Fut>(&self, callback: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .click
            .push(Rc::new(RefCell::new(Registration::new(callback))));
    }

    /// Run `callback` on every mouse release.
    pub fn when_click_released<F, Fut>(&self, callback: F)
    where
        F: FnMut() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .click_release
            .push(Rc::new(RefCell::new(Registration::new(callback))));
    }

    /// [`App::when_mouse_clicked`] for callbacks that never suspend.
    pub fn when_mouse_clicked_sync<F>(&self, callback: F)
    where
        F: FnMut() + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .click
            .push(Rc::new(RefCell::new(Registration::new_sync(callback))));
    }

    /// [`App::when_click_released`] for callbacks that never suspend.
    pub fn when_click_released_sync<F>(&self, callback: F)
    where
        F: FnMut() + 'static,
    {
        self.core
            .registry
            .borrow_mut()
            .click_release
            .push(Rc::new(RefCell::new(Registration::new_sync(callback))));
    }

    /// Open the window and run the frame loop until the user quits with
    /// the window's close button or Ctrl/Cmd+Q. Blocks until then.
    pub fn start(self) {
        macroquad::Window::from_config(window_conf(), async move {
            runtime::Runtime::new(self).run().await;
        });
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

fn window_conf() -> Conf {
    Conf {
        window_title: format!("romp v{}", crate::VERSION),
        window_width: crate::screen::SCREEN_WIDTH as i32,
        window_height: crate::screen::SCREEN_HEIGHT as i32,
        window_resizable: false,
        high_dpi: true,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_color_resolves_at_the_call_site() {
        let app = App::new();
        assert!(app.set_background_color("navy").is_ok());
        assert_eq!(*app.core.background.borrow(), (0, 0, 128));
        assert!(app.set_background_color("gbluereen").is_err());
        // failed set leaves the old background
        assert_eq!(*app.core.background.borrow(), (0, 0, 128));
    }

    #[test]
    fn test_default_gravity_matches_the_convention() {
        let app = App::new();
        assert_eq!(app.gravity(), (-1000.0, 0.0));
        app.set_gravity(-500.0, 10.0);
        assert_eq!(app.gravity(), (-500.0, 10.0));
    }

    #[test]
    fn test_constructors_append_to_the_store() {
        let app = App::new();
        app.new_circle(CircleOptions::default()).unwrap();
        app.new_box(BoxOptions::default()).unwrap();
        app.new_text(TextOptions::default()).unwrap();
        assert_eq!(app.core.sprites.borrow().len(), 3);
    }

    #[test]
    fn test_unknown_color_fails_construction() {
        let app = App::new();
        let result = app.new_circle(CircleOptions {
            color: "not a color".to_string(),
            ..Default::default()
        });
        assert!(result.is_err());
        assert!(app.core.sprites.borrow().is_empty());
    }

    #[test]
    fn test_line_endpoint_resolution() {
        let app = App::new();
        // length/angle wins when both pairs are given
        let line = app
            .new_line(LineOptions {
                length: Some(100.0),
                angle: Some(0.0),
                x1: Some(-5.0),
                y1: Some(-5.0),
                ..Default::default()
            })
            .unwrap();
        assert!((line.x1().unwrap() - 100.0).abs() < 1e-3);

        // explicit endpoint
        let line = app
            .new_line(LineOptions {
                x1: Some(30.0),
                y1: Some(40.0),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(line.length(), Some(50.0));

        // fallback: horizontal, 100 long
        let line = app.new_line(LineOptions::default()).unwrap();
        assert!((line.x1().unwrap() - 100.0).abs() < 1e-3);
        assert!(line.y1().unwrap().abs() < 1e-3);
    }
}
