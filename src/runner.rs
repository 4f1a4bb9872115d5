//! Runner: drives one parse or compose pass of a format tree over a stream.

use tracing::{debug, warn};

use crate::errors::{Error, Result};
use crate::node::FormatNode;
use crate::source::MemoryStream;
use crate::stream::BitStream;
use crate::value::Value;

/// What to do when a parse pass stops before the end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrailingData {
    /// Fail with [`Error::TrailingData`].
    Error,
    /// Log a warning and return the parsed value.
    #[default]
    Warn,
    Ignore,
}

/// Settings for a [`FormatRunner`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunnerConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub trailing: TrailingData,
}

impl RunnerConfig {
    /// Treats unconsumed input as an error.
    pub fn strict() -> Self {
        Self {
            trailing: TrailingData::Error,
        }
    }

    pub fn set_trailing(&mut self, trailing: TrailingData) -> &mut Self {
        self.trailing = trailing;
        self
    }
}

/// A format tree plus the policy used to run it. Use [`FormatRunner::parse`]
/// to read a value and [`FormatRunner::compose`] to write one.
#[derive(Debug, Clone)]
pub struct FormatRunner {
    root: FormatNode,
    config: RunnerConfig,
}

impl FormatRunner {
    pub fn new(root: FormatNode) -> Self {
        Self::with_config(root, RunnerConfig::default())
    }

    pub fn with_config(root: FormatNode, config: RunnerConfig) -> Self {
        Self { root, config }
    }

    pub fn root(&self) -> &FormatNode {
        &self.root
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Parses one value from `stream`, then checks that the stream is
    /// exhausted according to the trailing data policy.
    pub fn parse(&self, stream: &mut BitStream<'_>) -> Result<Value> {
        debug!(root = self.root.kind_name(), "parse pass");
        let value = self.root.parse(stream)?;

        if !stream.at_end()? {
            let position = stream.position()?;
            match self.config.trailing {
                TrailingData::Error => return Err(Error::TrailingData { position }),
                TrailingData::Warn => warn!(position, "unconsumed data after parse"),
                TrailingData::Ignore => {}
            }
        }

        debug!("parse pass done");
        Ok(value)
    }

    /// Writes `value` to `stream`. A trailing partial byte is flushed padded
    /// with zero bits.
    pub fn compose(&self, stream: &mut BitStream<'_>, value: &Value) -> Result<()> {
        if !stream.is_writable() {
            return Err(Error::state("cannot compose onto a read-only stream"));
        }

        debug!(root = self.root.kind_name(), "compose pass");
        self.root.compose(stream, value)?;
        stream.align()?;
        debug!("compose pass done");
        Ok(())
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Value> {
        let mut stream = BitStream::new(MemoryStream::from_bytes(bytes.to_vec()));
        self.parse(&mut stream)
    }

    pub fn compose_to_vec(&self, value: &Value) -> Result<Vec<u8>> {
        let mut sink = MemoryStream::new();
        self.compose(&mut BitStream::new(&mut sink), value)?;
        Ok(sink.into_bytes())
    }

    /// Clears delta totals so the runner can start on an unrelated stream.
    pub fn reset(&self) {
        self.root.reset_deltas();
    }
}
