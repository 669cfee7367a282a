//! The transform-source capability.
//!
//! The collision environment never talks to a tracking system directly.  It
//! only needs three queries, captured by [`TransformSource`]; any transport
//! (a TF listener, a network client, the in-memory
//! [`TfBuffer`][crate::transform::TfBuffer]) can sit behind it.

use std::time::Duration;

use collenv_types::{CollisionEnvError, RigidTransform};

/// Everything the collision environment asks of a tracking source.
pub trait TransformSource: Send + Sync {
    /// Every frame name currently known to the source, in the source's order.
    fn frame_names(&self) -> Vec<String>;

    /// The frame `frame` is directly attached to, if the source knows it.
    fn direct_parent(&self, frame: &str) -> Option<String>;

    /// Pose of `source_frame` expressed in `target_frame`, waiting at most
    /// `timeout` for it to become available.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionEnvError::TransformTimeout`] when no transform
    /// could be produced within `timeout`.
    fn await_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<RigidTransform, CollisionEnvError>;
}

impl<T: TransformSource + ?Sized> TransformSource for std::sync::Arc<T> {
    fn frame_names(&self) -> Vec<String> {
        (**self).frame_names()
    }

    fn direct_parent(&self, frame: &str) -> Option<String> {
        (**self).direct_parent(frame)
    }

    fn await_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<RigidTransform, CollisionEnvError> {
        (**self).await_transform(target_frame, source_frame, timeout)
    }
}
