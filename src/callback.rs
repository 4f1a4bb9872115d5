//! Escape hatch for layouts the other nodes cannot describe.

use std::fmt;
use std::sync::Arc;

use crate::errors::{Error, Result};
use crate::stream::BitStream;
use crate::value::Value;

pub type ReadFn = Arc<dyn Fn(&mut BitStream<'_>) -> Result<Value> + Send + Sync>;
pub type WriteFn = Arc<dyn Fn(&mut BitStream<'_>, &Value) -> Result<()> + Send + Sync>;

/// User functions that work on the stream directly.
#[derive(Clone)]
pub struct CallbackNode {
    pub read: ReadFn,
    /// Without one, composing this node fails.
    pub write: Option<WriteFn>,
}

impl CallbackNode {
    pub fn new<F>(read: F) -> Self
    where
        F: Fn(&mut BitStream<'_>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
            write: None,
        }
    }

    pub fn with_write<F>(mut self, write: F) -> Self
    where
        F: Fn(&mut BitStream<'_>, &Value) -> Result<()> + Send + Sync + 'static,
    {
        self.write = Some(Arc::new(write));
        self
    }

    pub(crate) fn parse_in(&self, stream: &mut BitStream<'_>) -> Result<Value> {
        (self.read)(stream)
    }

    pub(crate) fn compose_in(&self, stream: &mut BitStream<'_>, value: &Value) -> Result<()> {
        match &self.write {
            Some(write) => write(stream, value),
            None => Err(Error::unsupported("callback has no write function")),
        }
    }
}

impl fmt::Debug for CallbackNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackNode")
            .field("writable", &self.write.is_some())
            .finish()
    }
}
