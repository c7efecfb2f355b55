//! Content-address derivation for tasks.
//!
//! A task's identity is a SHA-256 digest over its identity-bearing fields:
//! the file it lives in, its tag, and its title. Line numbers and snippets
//! are deliberately excluded so the address survives code being moved within
//! a file or blank lines being inserted above it. Editing the title or tag
//! therefore produces a new identity, never a mutation of the old one.

use std::path::Path;

use sha2::{Digest, Sha256};

/// Compute the content-address for a task.
///
/// The digest covers `(file, tag, title)` with each field length-prefixed,
/// so adjacent fields cannot bleed into each other ("ab" + "c" and "a" +
/// "bc" hash differently). Pure function: no I/O, no clock, no randomness.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use todosync::hash::task_hash;
///
/// let a = task_hash(Path::new("src/lib.rs"), "general", "fix this");
/// let b = task_hash(Path::new("src/lib.rs"), "general", "fix this");
/// assert_eq!(a, b);
/// ```
#[must_use]
pub fn task_hash(file: &Path, tag: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    for field in [file.to_string_lossy().as_ref(), tag, title] {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
