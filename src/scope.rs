//! Lookup of values already parsed (or being composed) by enclosing structs.

use crate::field::FieldPath;
use crate::value::{Fields, Value};

/// Chain of struct field maps, innermost first.
///
/// Each struct being parsed or composed lends its map to the members below
/// it, so a size or condition can name a sibling read earlier in the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scope<'a> {
    frame: Option<&'a Fields>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    /// Scope with nothing in it.
    pub fn root() -> Self {
        Self::default()
    }

    /// Scope that sees `frame` first, then everything `self` sees.
    pub fn child(&'a self, frame: &'a Fields) -> Scope<'a> {
        Scope {
            frame: Some(frame),
            parent: Some(self),
        }
    }

    pub fn lookup(&self, path: &FieldPath) -> Option<&'a Value> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(value) = current.frame.and_then(|frame| path.get(frame)) {
                return Some(value);
            }
            scope = current.parent;
        }
        None
    }
}
