//! User-facing errors and advisories
//!
//! Two severities. A `GameError` is fatal to the operation that raised it
//! (a sprite constructor with a missing image file, an unknown color name).
//! An advisory is a warning printed to stderr while the value is clamped or
//! substituted and the program keeps going.
//!
//! Messages are deliberately long and tell the user how to fix the problem.
//! The audience is someone writing their first programs.

use std::cell::Cell;

/// A fatal error surfaced to user code.
#[derive(Debug, Clone, PartialEq)]
pub enum GameError {
    /// An image file could not be found or decoded.
    ImageNotFound(String),
    /// A color name was not recognized.
    UnknownColor(String),
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameError::ImageNotFound(path) => write!(
                f,
                "\n\nOops!\n\n\
                 We couldn't find the image file you provided named \"{path}\".\n\
                 If the file is in a folder, make sure you add the folder name, too,\n\
                 like \"images/{path}\". Check the spelling of the file name as well."
            ),
            GameError::UnknownColor(name) => write!(
                f,
                "\n\nOops!\n\n\
                 We didn't recognize the color name \"{name}\".\n\
                 Try a common color name like \"red\", \"light blue\" or \"dark green\",\n\
                 and check for typos."
            ),
        }
    }
}

impl std::error::Error for GameError {}

thread_local! {
    static ADVISORY_COUNT: Cell<u64> = const { Cell::new(0) };
}

/// Print a non-fatal warning to stderr.
///
/// The value in question is still applied (clamped or substituted); this
/// just tells the user their code probably doesn't do what they meant.
pub fn advisory(message: &str) {
    ADVISORY_COUNT.with(|c| c.set(c.get() + 1));
    eprintln!("\nHmm... {message}\n");
}

/// Number of advisories emitted on this thread so far.
pub fn advisory_count() -> u64 {
    ADVISORY_COUNT.with(|c| c.get())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_is_counted() {
        let before = advisory_count();
        advisory("test advisory");
        assert_eq!(advisory_count(), before + 1);
    }

    #[test]
    fn test_error_messages_name_the_input() {
        let msg = GameError::ImageNotFound("cat.png".to_string()).to_string();
        assert!(msg.contains("cat.png"));
        let msg = GameError::UnknownColor("gbluereen".to_string()).to_string();
        assert!(msg.contains("gbluereen"));
    }
}
