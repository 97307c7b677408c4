//! romp: a beginner-friendly 2D game and animation toolkit.
//!
//! Declare sprites, register callbacks, call [`App::start`] - the library
//! runs the frame loop: input sampling, physics stepping, cooperative
//! callback dispatch, surface recomputation, and rendering at 60 ticks per
//! second.
//!
//! ```no_run
//! use romp::{App, CircleOptions, PhysicsOptions};
//!
//! let app = App::new();
//! let ball = app
//!     .new_circle(CircleOptions {
//!         color: "red".to_string(),
//!         radius: 30.0,
//!         ..Default::default()
//!     })
//!     .unwrap();
//! ball.start_physics(PhysicsOptions::default());
//!
//! app.repeat_forever_sync({
//!     let ball = ball.clone();
//!     move || {
//!         if ball.y() < -200.0 {
//!             ball.set_y_speed(15.0);
//!         }
//!     }
//! });
//!
//! app.start();
//! ```
//!
//! Callbacks run on one logical thread as cooperatively scheduled tasks.
//! They may suspend at `app.timer(..)` or `romp::animate()`; anything that
//! blocks without suspending stalls the whole loop, rendering included.

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod app;
mod callbacks;
mod color;
mod error;
mod input;
mod keys;
mod physics;
mod schedule;
mod screen;
mod sprite;

pub use app::{
    App, BoxOptions, CircleOptions, ImageOptions, LineOptions, TextOptions,
};
pub use color::{color_name_to_rgb, NamedColor};
pub use error::GameError;
pub use physics::PhysicsOptions;
pub use schedule::{animate, NextTick, Timer};
pub use screen::{Screen, SCREEN_HEIGHT, SCREEN_WIDTH};
pub use sprite::Sprite;

use rand::Rng;

/// A random number between `lowest` and `highest`, inclusive, rounded to
/// two decimal places so beginners see tidy values.
pub fn random_number(lowest: f32, highest: f32) -> f32 {
    let (lo, hi) = if lowest <= highest {
        (lowest, highest)
    } else {
        (highest, lowest)
    };
    if lo == hi {
        return lo;
    }
    let n: f32 = rand::thread_rng().gen_range(lo..=hi);
    (n * 100.0).round() / 100.0
}

/// A random RGB color.
pub fn random_color() -> (u8, u8, u8) {
    let mut rng = rand::thread_rng();
    (rng.gen(), rng.gen(), rng.gen())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_number_in_range() {
        for _ in 0..100 {
            let n = random_number(5.0, 10.0);
            assert!((5.0..=10.0).contains(&n));
        }
    }

    #[test]
    fn test_random_number_swapped_bounds() {
        let n = random_number(10.0, 5.0);
        assert!((5.0..=10.0).contains(&n));
    }

    #[test]
    fn test_random_number_degenerate_range() {
        assert_eq!(random_number(3.0, 3.0), 3.0);
    }
}
