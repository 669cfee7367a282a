//! [`ParentResolver`] – picks the single reference frame every object pose is
//! reported against.
//!
//! The tracking source does not label frames by role, so the parent is taken
//! from the first object frame seen: either its direct parent as reported by
//! the source, or a fixed name when the deployment pins one.  The answer is
//! cached until [`ParentResolver::reset`] is called; mixed-parent object sets
//! are not supported.

use collenv_types::CollisionEnvError;
use tracing::{debug, warn};

use crate::naming::NameClassifier;
use crate::source::TransformSource;

/// Parent of `frame`: the fixed override when one is configured, otherwise
/// whatever the source reports as its direct parent.
pub fn parent_of(
    fixed_parent: Option<&str>,
    frame: &str,
    source: &dyn TransformSource,
) -> Option<String> {
    match fixed_parent {
        Some(fixed) => Some(fixed.to_string()),
        None => source.direct_parent(frame),
    }
}

/// Resolves and caches the common parent frame of all object frames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentResolver {
    fixed_parent: Option<String>,
    resolved: Option<String>,
}

impl ParentResolver {
    /// `fixed_parent` short-circuits the direct-parent query when set.
    pub fn new(fixed_parent: Option<String>) -> Self {
        Self {
            fixed_parent,
            resolved: None,
        }
    }

    /// The cached parent frame, if resolution has succeeded.
    pub fn parent(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    pub fn fixed_parent(&self) -> Option<&str> {
        self.fixed_parent.as_deref()
    }

    /// Forget the cached parent so the next [`resolve`][Self::resolve] runs
    /// again.
    pub fn reset(&mut self) {
        self.resolved = None;
    }

    /// Resolve the parent frame from `candidates`, scanned in order.
    ///
    /// Returns the cached value without touching `source` once resolved.
    ///
    /// # Errors
    ///
    /// [`CollisionEnvError::ParentNotFound`] when no candidate is an object
    /// frame, or when the source does not know the first object frame's
    /// parent.  Both are retryable: object frames may simply not have been
    /// published yet.
    pub fn resolve(
        &mut self,
        candidates: &[String],
        classifier: &NameClassifier,
        source: &dyn TransformSource,
    ) -> Result<&str, CollisionEnvError> {
        if self.resolved.is_none() {
            let first_object = candidates
                .iter()
                .find(|frame| classifier.is_object_frame(frame))
                .ok_or(CollisionEnvError::ParentNotFound)?;

            let Some(parent) = parent_of(self.fixed_parent.as_deref(), first_object, source)
            else {
                warn!(frame = %first_object, "source reports no parent for object frame");
                return Err(CollisionEnvError::ParentNotFound);
            };
            debug!(frame = %first_object, parent = %parent, "resolved object parent frame");
            self.resolved = Some(parent);
        }

        self.resolved
            .as_deref()
            .ok_or(CollisionEnvError::ParentNotFound)
    }
}
