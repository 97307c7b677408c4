//! Frame orchestrator
//!
//! One [`Runtime::tick`] is the whole per-frame cycle:
//!
//! 1. clear last tick's transient clicked flags and publish input state
//! 2. run the dispatch rule: key presses, key releases, clicks, click
//!    releases, every-tick callbacks (each behind the not-running guard),
//!    then the physics sub-steps, then per-sprite click hit tests
//! 3. poll every live task once, in spawn order
//! 4. prune removed sprites, sync physics results back, refresh dirty
//!    surfaces
//!
//! Rendering and the 60 Hz frame limiter live in [`Runtime::run`], outside
//! `tick`, so the entire scheduling path runs headless under test.

use macroquad::prelude::{
    clear_background, draw_line, draw_texture, get_time, next_frame, prevent_quit, Color, WHITE,
};

use crate::app::App;
use crate::input::{InputFrame, InputSampler};
use crate::schedule::Scheduler;
use crate::sprite::shape::Shape;
use crate::sprite::Sprite;

const TARGET_FRAME_TIME: f64 = 1.0 / 60.0;

pub(crate) struct Runtime {
    app: App,
    scheduler: Scheduler,
    sampler: InputSampler,
}

impl Runtime {
    pub fn new(app: App) -> Self {
        let scheduler = Scheduler::with_clock(app.core.clock.clone());
        Self {
            app,
            scheduler,
            sampler: InputSampler::new(),
        }
    }

    /// Snapshot the entity store so callbacks may add or remove sprites
    /// while we iterate.
    fn sprites(&self) -> Vec<Sprite> {
        self.app.core.sprites.borrow().clone()
    }

    /// Spawn the start-of-program callbacks. Runs once, before the first
    /// tick.
    pub fn spawn_startup(&mut self) {
        let startup = self.app.core.registry.borrow().startup.clone();
        for registration in startup {
            if let Some((task, running)) = registration.borrow_mut().trigger() {
                self.scheduler.spawn_guarded(task, running);
            }
        }
    }

    /// Advance one tick. Returns `false` when the loop must terminate
    /// (quit is the sole termination path).
    pub fn tick(&mut self, frame: InputFrame, now: f64) -> bool {
        self.scheduler.advance_clock(now);
        if frame.quit {
            return false;
        }

        // Clicked marks persist for exactly one tick
        for sprite in self.sprites() {
            sprite.raw().clicked = false;
        }

        {
            let core = &self.app.core;
            let mut mouse = core.mouse.borrow_mut();
            mouse.x = frame.pointer.0;
            mouse.y = frame.pointer.1;
            mouse.held = frame.click_held;
            *core.keys_down.borrow_mut() = frame.keys_down.clone();
        }

        self.dispatch(&frame);
        self.scheduler.run_once();

        self.app.core.sprites.borrow_mut().retain(|s| !s.is_removed());
        for sprite in self.sprites() {
            if sprite.is_removed() || sprite.is_hidden() {
                continue;
            }
            sprite.sync_physics();
            sprite.refresh_surface();
        }
        true
    }

    /// The fixed-order dispatch rule. Registration lists are snapshotted
    /// before iteration so callbacks registered mid-dispatch take effect
    /// next tick instead of invalidating the walk.
    fn dispatch(&mut self, frame: &InputFrame) {
        let registry = &self.app.core.registry;

        // 1. key presses
        let keypress = registry.borrow().keypress.clone();
        for key in &frame.keys_pressed {
            for registration in &keypress {
                let mut registration = registration.borrow_mut();
                if !registration.matches(key) {
                    continue;
                }
                if let Some((task, running)) = registration.trigger(key) {
                    self.scheduler.spawn_guarded(task, running);
                }
            }
        }

        // 2. key releases
        let keyrelease = registry.borrow().keyrelease.clone();
        for key in &frame.keys_released {
            for registration in &keyrelease {
                let mut registration = registration.borrow_mut();
                if !registration.matches(key) {
                    continue;
                }
                if let Some((task, running)) = registration.trigger(key) {
                    self.scheduler.spawn_guarded(task, running);
                }
            }
        }

        // 3. clicks
        if frame.click_edge {
            let click = registry.borrow().click.clone();
            for registration in click {
                if let Some((task, running)) = registration.borrow_mut().trigger() {
                    self.scheduler.spawn_guarded(task, running);
                }
            }
        }

        // 4. click releases
        if frame.click_release_edge {
            let click_release = registry.borrow().click_release.clone();
            for registration in click_release {
                if let Some((task, running)) = registration.borrow_mut().trigger() {
                    self.scheduler.spawn_guarded(task, running);
                }
            }
        }

        // 5. every-tick callbacks
        let forever = registry.borrow().forever.clone();
        for registration in forever {
            if let Some((task, running)) = registration.borrow_mut().trigger() {
                self.scheduler.spawn_guarded(task, running);
            }
        }

        // 6. physics sub-steps
        self.app.core.physics.borrow_mut().step_frame();

        // 7. per-sprite clicks: visible non-line sprites under the pointer,
        // only on the tick the click edge happened
        if frame.click_edge {
            let (px, py) = frame.pointer;
            for sprite in self.sprites() {
                if sprite.is_removed() || sprite.is_hidden() {
                    continue;
                }
                if sprite.raw().shape.is_line() {
                    continue;
                }
                if !sprite.contains_point(px, py) {
                    continue;
                }
                sprite.raw().clicked = true;
                let callbacks = sprite.raw().click_callbacks.clone();
                for registration in callbacks {
                    if let Some((task, running)) = registration.borrow_mut().trigger() {
                        self.scheduler.spawn_guarded(task, running);
                    }
                }
            }
        }
    }

    fn render(&self) {
        let core = &self.app.core;
        let screen = core.screen;
        let (r, g, b) = *core.background.borrow();
        clear_background(Color::from_rgba(r, g, b, 255));

        for sprite in self.sprites() {
            let mut data = sprite.raw();
            if data.hidden {
                continue;
            }
            if let Shape::Line(line) = &data.shape {
                // Lines draw from their live logical endpoints, not from
                // the cached surface
                let (x0, y0) = screen.to_pixels(data.x, data.y);
                let (x1, y1) = screen.to_pixels(line.x1, line.y1);
                let (cr, cg, cb) = line.color.rgb();
                let alpha = (data.transparency / 100.0 * 255.0).round() as u8;
                draw_line(
                    x0,
                    y0,
                    x1,
                    y1,
                    line.thickness.max(1.0),
                    Color::from_rgba(cr, cg, cb, alpha),
                );
                continue;
            }

            let width = data.surface.secondary().width as f32;
            let height = data.surface.secondary().height as f32;
            let (px, py) = screen.to_pixels(data.x, data.y);
            let texture = data.surface.texture();
            draw_texture(texture, px - width / 2.0, py - height / 2.0, WHITE);
        }
    }

    /// The blocking frame loop: sample, tick, render, throttle to 60 Hz.
    pub async fn run(mut self) {
        prevent_quit();
        self.spawn_startup();
        let screen = self.app.core.screen;

        loop {
            let frame_start = get_time();
            let frame = self.sampler.sample(&screen);
            if !self.tick(frame, frame_start) {
                break;
            }
            self.render();

            // Throttle to the tick rate: sleep for the bulk, then
            // spin-wait for precision
            let remaining = TARGET_FRAME_TIME - (get_time() - frame_start);
            if remaining > 0.0 {
                #[cfg(not(target_arch = "wasm32"))]
                {
                    let spin_margin = 0.002; // 2ms
                    while get_time() - frame_start + spin_margin < TARGET_FRAME_TIME {
                        std::thread::sleep(std::time::Duration::from_millis(1));
                    }
                    while get_time() - frame_start < TARGET_FRAME_TIME {
                        std::hint::spin_loop();
                    }
                }
                #[cfg(target_arch = "wasm32")]
                {
                    // Browser handles frame pacing
                    while get_time() - frame_start < TARGET_FRAME_TIME {}
                }
            }

            next_frame().await;
        }
    }
}
