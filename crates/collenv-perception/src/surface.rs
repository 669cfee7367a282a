//! Support-surface synthesis.
//!
//! A tabletop is not tracked as an object; instead a single anchor frame
//! marks its top surface.  [`SupportSurfaceBuilder`] turns that anchor into a
//! thin box that sits flush beneath and centred on it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use collenv_types::{CollisionEnvError, CollisionObject, RigidTransform, Vec3};
use tracing::{debug, warn};

use crate::parent::parent_of;
use crate::source::TransformSource;

/// Box extents (x, y, z) of the synthesized support surface, in metres.
pub const SURFACE_DIMENSIONS: [f64; 3] = [0.75, 0.75, 0.02];

/// A synthesized support surface, ready to be published.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportSurface {
    /// Anchor frame name; doubles as the collision object id.
    pub id: String,
    pub parent_frame: String,
    pub dimensions: [f64; 3],
    /// Box centre pose in `parent_frame`.
    pub pose: RigidTransform,
    pub sampled_at: DateTime<Utc>,
}

impl SupportSurface {
    pub fn to_collision_object(&self) -> CollisionObject {
        CollisionObject::boxed(
            self.id.clone(),
            self.parent_frame.clone(),
            self.dimensions,
            self.pose,
        )
    }
}

/// Builds the [`SupportSurface`] from its anchor frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportSurfaceBuilder {
    anchor_frame: String,
    fixed_parent: Option<String>,
    timeout: Duration,
}

impl SupportSurfaceBuilder {
    pub fn new(anchor_frame: impl Into<String>, fixed_parent: Option<String>, timeout: Duration) -> Self {
        Self {
            anchor_frame: anchor_frame.into(),
            fixed_parent,
            timeout,
        }
    }

    pub fn anchor_frame(&self) -> &str {
        &self.anchor_frame
    }

    /// Sample the anchor and synthesize the surface box.
    ///
    /// The box pose is the anchor pose moved down by the box depth along the
    /// anchor's own z axis.
    ///
    /// # Errors
    ///
    /// - [`CollisionEnvError::FrameNotFound`] – no fixed parent is configured
    ///   and the source does not know the anchor's parent.
    /// - [`CollisionEnvError::TransformTimeout`] – the anchor pose did not
    ///   arrive in time.
    pub fn build(&self, source: &dyn TransformSource) -> Result<SupportSurface, CollisionEnvError> {
        let parent = parent_of(self.fixed_parent.as_deref(), &self.anchor_frame, source)
            .ok_or_else(|| CollisionEnvError::FrameNotFound(self.anchor_frame.clone()))?;
        debug!(anchor = %self.anchor_frame, parent = %parent, "surface anchor parent");

        let anchor_pose = source
            .await_transform(&parent, &self.anchor_frame, self.timeout)
            .inspect_err(|e| warn!(anchor = %self.anchor_frame, error = %e, "failed to sample surface anchor"))?;

        let depth = SURFACE_DIMENSIONS[2];
        Ok(SupportSurface {
            id: self.anchor_frame.clone(),
            parent_frame: parent,
            dimensions: SURFACE_DIMENSIONS,
            pose: anchor_pose.translated_local(Vec3::new(0.0, 0.0, -depth)),
            sampled_at: Utc::now(),
        })
    }
}
