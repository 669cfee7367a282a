//! [`CollisionEnvironment`] – owns the published collision set.
//!
//! Every [`update`][CollisionEnvironment::update]:
//!
//! 1. clears the published set;
//! 2. re-samples the support surface, or re-uses the cached one;
//! 3. optionally refreshes the tracked object frames;
//! 4. appends one mesh descriptor per tracked object, in tracker order.
//!
//! The set is always rebuilt from scratch, so it never mixes two polling
//! generations.  A stateful consumer should take
//! [`generate_removal_set`][CollisionEnvironment::generate_removal_set]
//! *before* calling `update`, apply the removals, then apply the new
//! [`current_set`][CollisionEnvironment::current_set].
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use collenv_perception::TfBuffer;
//! use collenv_runtime::{CollisionEnvConfig, CollisionEnvironment};
//! use collenv_types::{RigidTransform, Vec3};
//!
//! let tf = Arc::new(TfBuffer::new());
//! tf.set_transform("world", "tableTF",
//!     RigidTransform::from_translation(Vec3::new(0.0, 0.0, 0.7)));
//! tf.set_transform("world", "scene::cup::1",
//!     RigidTransform::from_translation(Vec3::new(0.1, 0.0, 0.75)));
//!
//! let config = CollisionEnvConfig { transform_timeout_ms: 0, ..Default::default() };
//! let mut env = CollisionEnvironment::with_source(config, tf).unwrap();
//!
//! let stale = env.generate_removal_set();
//! let outcome = env.update(true, true).unwrap();
//! assert!(stale.is_empty());
//! assert!(outcome.surface_available && outcome.has_objects);
//! assert_eq!(env.current_set().len(), 2);
//! ```

use std::sync::Arc;

use collenv_perception::{
    ObjectFrameTracker, ParentResolver, SupportSurface, SupportSurfaceBuilder, TrackedObject,
    TransformSource,
};
use collenv_types::{CollisionEnvError, CollisionObject};
use tracing::{debug, error, info, warn};

use crate::config::CollisionEnvConfig;

/// Build the mesh resource locator for `object_name`.
///
/// Consumers load meshes from this exact string, so the format is fixed:
/// `file://<dir>/<name>.<ext>`.
pub fn mesh_resource_locator(mesh_source_dir: &str, object_name: &str, extension: &str) -> String {
    format!("file://{mesh_source_dir}/{object_name}.{extension}")
}

/// What one [`CollisionEnvironment::update`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateOutcome {
    /// A support surface is part of the published set.
    pub surface_available: bool,
    /// Object descriptors were considered for this cycle.  `false` when a
    /// refresh found nothing (or failed softly).
    pub has_objects: bool,
    /// Size of the published set after the update.
    pub published: usize,
}

/// Owner of the published collision set.
pub struct CollisionEnvironment {
    config: CollisionEnvConfig,
    source: Option<Arc<dyn TransformSource>>,
    tracker: ObjectFrameTracker,
    surface_builder: SupportSurfaceBuilder,
    /// Last successfully built surface; cleared when a rebuild fails.
    surface: Option<SupportSurface>,
    published: Vec<CollisionObject>,
    has_objects: bool,
}

impl CollisionEnvironment {
    /// Build an environment with no transform source attached yet.
    ///
    /// Updates fail with [`CollisionEnvError::NotInitialized`] until
    /// [`attach_source`][Self::attach_source] is called.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionEnvError::Config`] when `config` does not validate.
    pub fn new(config: CollisionEnvConfig) -> Result<Self, CollisionEnvError> {
        config.validate()?;
        let fixed_parent = config.fixed_parent().map(str::to_string);
        let tracker = ObjectFrameTracker::new(
            config.classifier()?,
            ParentResolver::new(fixed_parent.clone()),
            config.transform_timeout(),
        )
        .with_verbose(config.debug);
        let surface_builder = SupportSurfaceBuilder::new(
            config.surface_anchor_frame_name.clone(),
            fixed_parent,
            config.transform_timeout(),
        );

        Ok(Self {
            config,
            source: None,
            tracker,
            surface_builder,
            surface: None,
            published: Vec::new(),
            has_objects: false,
        })
    }

    /// Build an environment and attach `source` right away.
    pub fn with_source<S>(config: CollisionEnvConfig, source: Arc<S>) -> Result<Self, CollisionEnvError>
    where
        S: TransformSource + 'static,
    {
        let mut env = Self::new(config)?;
        env.attach_source(source);
        Ok(env)
    }

    /// Attach (or replace) the transform source.
    ///
    /// All cached state is dropped: the parent frame is resolved afresh and
    /// an initial refresh primes the tracker.  Soft failures of that refresh
    /// are only logged.
    pub fn attach_source(&mut self, source: Arc<dyn TransformSource>) {
        self.tracker.reset_parent();
        self.surface = None;
        self.published.clear();
        self.has_objects = false;

        match self.tracker.refresh(&*source) {
            Ok(objects) => info!(objects = objects.len(), "transform source attached"),
            Err(e) => info!(reason = %e, "transform source attached; no objects yet"),
        }
        self.source = Some(source);
    }

    pub fn is_initialized(&self) -> bool {
        self.source.is_some()
    }

    pub fn config(&self) -> &CollisionEnvConfig {
        &self.config
    }

    /// Rebuild the published set.
    ///
    /// - `refresh_frames` – re-sample object frames first; otherwise the poses
    ///   from the last refresh are re-published.
    /// - `renew_surface` – re-sample the support surface; otherwise the cached
    ///   one (if any) is re-published.
    ///
    /// Missing frames, an unresolved parent, per-frame timeouts and an
    /// unavailable surface anchor are soft: they shrink the published set
    /// and are reported through [`UpdateOutcome`].
    ///
    /// # Errors
    ///
    /// Returns [`CollisionEnvError::NotInitialized`] when no source is
    /// attached.  The published set is left untouched in that case.
    pub fn update(
        &mut self,
        refresh_frames: bool,
        renew_surface: bool,
    ) -> Result<UpdateOutcome, CollisionEnvError> {
        let Some(source) = self.source.clone() else {
            error!("collision environment has no transform source to read from");
            return Err(CollisionEnvError::NotInitialized);
        };

        self.published.clear();

        // ── Support surface ──────────────────────────────────────────────────
        if renew_surface {
            self.surface = match self.surface_builder.build(&*source) {
                Ok(surface) => Some(surface),
                Err(e) => {
                    warn!(anchor = %self.surface_builder.anchor_frame(), error = %e, "support surface unavailable");
                    None
                }
            };
        }
        let surface_available = self.surface.is_some();
        if let Some(surface) = &self.surface {
            self.published.push(surface.to_collision_object());
        }

        // ── Object frames ────────────────────────────────────────────────────
        if refresh_frames {
            let previously_had_objects = self.has_objects;
            self.has_objects = match self.tracker.refresh(&*source) {
                Ok(objects) => !objects.is_empty(),
                Err(e) => {
                    debug!(error = %e, "object refresh failed softly");
                    false
                }
            };
            if !self.has_objects {
                if previously_had_objects {
                    info!("object set became empty");
                } else {
                    warn!("no object frames available");
                }
                return Ok(self.outcome(surface_available));
            }
        } else {
            self.has_objects = true;
        }

        // ── Object descriptors ───────────────────────────────────────────────
        let Some(parent) = self.tracker.parent_frame() else {
            debug!(objects = self.tracker.objects().len(), "no parent frame; object descriptors skipped");
            return Ok(self.outcome(surface_available));
        };
        for object in self.tracker.objects() {
            self.published.push(CollisionObject::mesh(
                object.frame.clone(),
                parent,
                mesh_resource_locator(
                    &self.config.mesh_source_directory,
                    &object.name,
                    &self.config.mesh_file_extension,
                ),
                object.pose,
            ));
        }

        let outcome = self.outcome(surface_available);
        if self.config.debug {
            info!(published = outcome.published, surface = surface_available, "collision objects published");
        } else {
            debug!(published = outcome.published, surface = surface_available, "collision objects published");
        }
        Ok(outcome)
    }

    /// [`update`][Self::update] with the surface renewal policy taken from
    /// `renewSurfaceEachCycle`.
    pub fn tick(&mut self, refresh_frames: bool) -> Result<UpdateOutcome, CollisionEnvError> {
        self.update(refresh_frames, self.config.renew_surface_each_cycle)
    }

    fn outcome(&self, surface_available: bool) -> UpdateOutcome {
        UpdateOutcome {
            surface_available,
            has_objects: self.has_objects,
            published: self.published.len(),
        }
    }

    /// The published set, in publication order.
    pub fn current_set(&self) -> &[CollisionObject] {
        &self.published
    }

    /// One REMOVE descriptor per published descriptor, in the same order.
    pub fn generate_removal_set(&self) -> Vec<CollisionObject> {
        self.published.iter().map(CollisionObject::to_removal).collect()
    }

    /// Frames that produced an object on the last refresh.
    pub fn known_frame_names(&self) -> &[String] {
        self.tracker.known_frame_names()
    }

    pub fn tracked_objects(&self) -> &[TrackedObject] {
        self.tracker.objects()
    }

    pub fn parent_frame(&self) -> Option<&str> {
        self.tracker.parent_frame()
    }

    /// The cached support surface, if the last build succeeded.
    pub fn surface(&self) -> Option<&SupportSurface> {
        self.surface.as_ref()
    }

    pub fn has_objects(&self) -> bool {
        self.has_objects
    }

    /// Force the parent frame to be resolved again on the next refresh.
    ///
    /// Tracked poses are dropped with it; the published set is left as is
    /// until the next [`update`][Self::update].
    pub fn reset_parent(&mut self) {
        self.tracker.reset_parent();
        self.has_objects = false;
    }
}
