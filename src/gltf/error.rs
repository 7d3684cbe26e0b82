use std::collections::HashMap;

use thiserror::Error;

/// Scene-model contract violations and codec failures. Any of these aborts
/// the conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("node id {0} does not exist")]
    MissingNode(i64),
    #[error("surface id {0} does not exist")]
    MissingSurface(i64),
    #[error("material '{0}' is not part of the model")]
    MissingMaterial(String),
    #[error("joint node '{node}' cannot carry a {what}")]
    JointAttachment { node: String, what: &'static str },
    #[error("cannot lay out a {dim}x{dim} matrix of {component_size}-byte components")]
    InvalidMatrixLayout { component_size: usize, dim: usize },
    #[error("compression failed: {0}")]
    Compression(String),
}

/// Classes of recoverable problems, each squelched independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    MissingTexture,
    TextureMerge,
    TextureEncode,
    EmptyAnimation,
    MissingCameraNode,
    ResourceWrite,
    FileNameClash,
}

pub const MAX_WARNINGS_PER_KIND: usize = 10;

/// Per-conversion warning squelch: each kind logs at most
/// `MAX_WARNINGS_PER_KIND` times, then once more to say it went quiet.
#[derive(Debug, Default)]
pub struct WarningCounter {
    counts: HashMap<WarningKind, usize>,
}

impl WarningCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log `message` unless `kind` is already squelched. Returns whether it
    /// was logged.
    pub fn warn(&mut self, kind: WarningKind, message: impl AsRef<str>) -> bool {
        let count = self.counts.entry(kind).or_insert(0);
        *count += 1;
        if *count <= MAX_WARNINGS_PER_KIND {
            log::warn!("{}", message.as_ref());
            true
        } else {
            if *count == MAX_WARNINGS_PER_KIND + 1 {
                log::warn!("Further {:?} warnings suppressed", kind);
            }
            false
        }
    }

    pub fn count(&self, kind: WarningKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squelches_after_limit() {
        let mut warnings = WarningCounter::new();
        let logged = (0..25)
            .filter(|i| warnings.warn(WarningKind::MissingTexture, format!("missing {i}")))
            .count();
        assert_eq!(logged, MAX_WARNINGS_PER_KIND);
        assert_eq!(warnings.count(WarningKind::MissingTexture), 25);
        // other kinds are independent
        assert!(warnings.warn(WarningKind::TextureMerge, "merge"));
    }

    #[test]
    fn error_messages_name_the_culprit() {
        let err = ConvertError::JointAttachment { node: "hip".into(), what: "mesh" };
        assert_eq!(err.to_string(), "joint node 'hip' cannot carry a mesh");
    }
}
