//! [`ObjectFrameTracker`] – re-derives the tracked object set every cycle.
//!
//! Each [`refresh`][ObjectFrameTracker::refresh]:
//!
//! 1. lists every frame the source knows about;
//! 2. resolves the common parent frame if that has not happened yet;
//! 3. samples the pose of every object frame in the parent frame, waiting at
//!    most the configured timeout per frame and skipping frames that miss it;
//! 4. replaces the previous object set and frame cache wholesale.
//!
//! Nothing carries over between cycles: a frame that disappears from the
//! source, or times out, is simply absent from the next set.
//!
//! # Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use std::time::Duration;
//! use collenv_perception::naming::NameClassifier;
//! use collenv_perception::parent::ParentResolver;
//! use collenv_perception::tracker::ObjectFrameTracker;
//! use collenv_perception::transform::TfBuffer;
//! use collenv_types::RigidTransform;
//!
//! let tf = TfBuffer::new();
//! tf.set_transform("base_link::sensor", "base_link::sensor::obj1", RigidTransform::identity());
//!
//! let mut tracker = ObjectFrameTracker::new(
//!     NameClassifier::new("::", NonZeroUsize::new(2).unwrap()),
//!     ParentResolver::new(None),
//!     Duration::from_millis(50),
//! );
//! let objects = tracker.refresh(&tf).unwrap();
//! assert_eq!(objects.len(), 1);
//! assert_eq!(objects[0].name, "sensor");
//! assert_eq!(objects[0].frame, "base_link::sensor::obj1");
//! ```

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use collenv_types::{CollisionEnvError, RigidTransform};
use tracing::{debug, info, warn};

use crate::naming::NameClassifier;
use crate::parent::ParentResolver;
use crate::source::TransformSource;

/// One object frame sampled during a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedObject {
    /// Object name extracted from the frame name.
    pub name: String,
    /// Full frame name as published by the source.
    pub frame: String,
    /// Pose of `frame` in the resolved parent frame.
    pub pose: RigidTransform,
    /// When the pose was sampled.
    pub sampled_at: DateTime<Utc>,
}

/// Tracks object frames across polling cycles.
#[derive(Debug, Clone)]
pub struct ObjectFrameTracker {
    classifier: NameClassifier,
    resolver: ParentResolver,
    /// Per-frame wait bound for transform queries.
    timeout: Duration,
    /// Log per-cycle details at `info` instead of `debug`.
    verbose: bool,
    known_frames: Vec<String>,
    objects: Vec<TrackedObject>,
}

impl ObjectFrameTracker {
    pub fn new(classifier: NameClassifier, resolver: ParentResolver, timeout: Duration) -> Self {
        Self {
            classifier,
            resolver,
            timeout,
            verbose: false,
            known_frames: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Promote per-cycle diagnostics to `info` level.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn classifier(&self) -> &NameClassifier {
        &self.classifier
    }

    /// The resolved parent frame, if any.
    pub fn parent_frame(&self) -> Option<&str> {
        self.resolver.parent()
    }

    /// Force the parent frame to be resolved again on the next refresh.
    ///
    /// The tracked set is emptied too: its poses are expressed in the parent
    /// being forgotten.
    pub fn reset_parent(&mut self) {
        self.resolver.reset();
        self.clear();
    }

    /// Drop the tracked objects and the frame cache, keeping the parent.
    pub fn clear(&mut self) {
        self.objects.clear();
        self.known_frames.clear();
    }

    /// Objects produced by the last successful refresh.
    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    /// Frames that produced an object during the last refresh.
    pub fn known_frame_names(&self) -> &[String] {
        &self.known_frames
    }

    /// Re-sample every object frame and replace the tracked set.
    ///
    /// # Errors
    ///
    /// - [`CollisionEnvError::NoFrames`] – the source lists nothing yet; the
    ///   previous state is kept untouched.
    /// - [`CollisionEnvError::ParentNotFound`] – no parent could be resolved;
    ///   the tracked set and frame cache are emptied.
    ///
    /// Both are soft failures.  Per-frame timeouts are not errors: the frame
    /// is left out of this cycle's set.
    pub fn refresh(
        &mut self,
        source: &dyn TransformSource,
    ) -> Result<&[TrackedObject], CollisionEnvError> {
        let frames = source.frame_names();
        if frames.is_empty() {
            warn!("no frames available yet");
            return Err(CollisionEnvError::NoFrames);
        }
        for (index, frame) in frames.iter().enumerate() {
            if self.verbose {
                info!(index, frame = %frame, "frame listed");
            } else {
                debug!(index, frame = %frame, "frame listed");
            }
        }

        let parent = match self.resolver.resolve(&frames, &self.classifier, source) {
            Ok(parent) => parent.to_string(),
            Err(e) => {
                warn!(error = %e, frames = frames.len(), "failed to find any object frame");
                self.objects.clear();
                self.known_frames.clear();
                return Err(e);
            }
        };

        let mut seen: HashSet<&str> = HashSet::new();
        let mut objects = Vec::new();
        let mut known_frames = Vec::new();
        for frame in &frames {
            let Some(name) = self.classifier.object_name(frame) else {
                continue;
            };
            if !seen.insert(frame.as_str()) {
                continue;
            }
            match source.await_transform(&parent, frame, self.timeout) {
                Ok(pose) => {
                    known_frames.push(frame.clone());
                    objects.push(TrackedObject {
                        name: name.to_string(),
                        frame: frame.clone(),
                        pose,
                        sampled_at: Utc::now(),
                    });
                }
                Err(e) => {
                    debug!(frame = %frame, error = %e, "object frame skipped this cycle");
                }
            }
        }

        self.objects = objects;
        self.known_frames = known_frames;

        if self.verbose {
            for object in &self.objects {
                info!(name = %object.name, frame = %object.frame, "tracked object");
            }
            info!(parent = %parent, objects = self.objects.len(), "object frames refreshed");
        } else {
            debug!(parent = %parent, objects = self.objects.len(), "object frames refreshed");
        }

        Ok(&self.objects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TfBuffer;
    use collenv_types::Vec3;
    use std::num::NonZeroUsize;
    use std::sync::Mutex;

    fn tracker(fixed_parent: Option<&str>) -> ObjectFrameTracker {
        ObjectFrameTracker::new(
            NameClassifier::new("::", NonZeroUsize::new(2).unwrap()),
            ParentResolver::new(fixed_parent.map(str::to_string)),
            Duration::ZERO,
        )
    }

    fn at(x: f64, y: f64, z: f64) -> RigidTransform {
        RigidTransform::from_translation(Vec3::new(x, y, z))
    }

    /// Source whose listing is scripted independently of its transforms, so
    /// duplicates and unreachable frames can be exercised.
    struct ScriptedSource {
        frames: Mutex<Vec<String>>,
        buffer: TfBuffer,
    }

    impl TransformSource for ScriptedSource {
        fn frame_names(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }

        fn direct_parent(&self, frame: &str) -> Option<String> {
            self.buffer.direct_parent(frame)
        }

        fn await_transform(
            &self,
            target_frame: &str,
            source_frame: &str,
            timeout: Duration,
        ) -> Result<RigidTransform, CollisionEnvError> {
            self.buffer.await_transform(target_frame, source_frame, timeout)
        }
    }

    #[test]
    fn sensor_scenario() {
        let source = ScriptedSource {
            frames: Mutex::new(vec![
                "base_link::sensor::obj1".to_string(),
                "base_link::sensor".to_string(),
            ]),
            buffer: TfBuffer::new(),
        };
        source
            .buffer
            .set_transform("base_link", "base_link::sensor::obj1", at(0.3, 0.0, 0.1));

        let mut t = tracker(None);
        let objects = t.refresh(&source).unwrap().to_vec();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "sensor");
        assert_eq!(objects[0].frame, "base_link::sensor::obj1");
        assert!((objects[0].pose.translation.x - 0.3).abs() < 1e-9);
        assert_eq!(t.parent_frame(), Some("base_link"));
        assert_eq!(t.known_frame_names(), ["base_link::sensor::obj1"]);
    }

    #[test]
    fn empty_listing_keeps_previous_state() {
        let tf = TfBuffer::new();
        tf.set_transform("camera", "ns::cup::1", at(1.0, 0.0, 0.0));
        let mut t = tracker(None);
        t.refresh(&tf).unwrap();

        tf.clear();
        let err = t.refresh(&tf).unwrap_err();
        assert_eq!(err, CollisionEnvError::NoFrames);
        assert_eq!(t.objects().len(), 1);
        assert_eq!(t.known_frame_names(), ["ns::cup::1"]);
    }

    #[test]
    fn no_object_frames_leaves_set_empty() {
        let tf = TfBuffer::new();
        tf.set_transform("world", "base_link", at(0.0, 0.0, 0.0));
        let mut t = tracker(None);
        let err = t.refresh(&tf).unwrap_err();
        assert_eq!(err, CollisionEnvError::ParentNotFound);
        assert!(t.objects().is_empty());
        assert!(t.known_frame_names().is_empty());
        assert!(t.parent_frame().is_none());
    }

    #[test]
    fn vanished_frame_is_not_carried_over() {
        let tf = TfBuffer::new();
        tf.set_transform("camera", "ns::cup::1", at(1.0, 0.0, 0.0));
        tf.set_transform("camera", "ns::bowl::1", at(2.0, 0.0, 0.0));
        let mut t = tracker(None);
        assert_eq!(t.refresh(&tf).unwrap().len(), 2);

        tf.remove_frame("ns::cup::1");
        let objects = t.refresh(&tf).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].name, "bowl");
        assert_eq!(t.known_frame_names(), ["ns::bowl::1"]);
    }

    #[test]
    fn unreachable_frame_is_skipped() {
        let tf = TfBuffer::new();
        tf.set_transform("camera", "ns::cup::1", at(1.0, 0.0, 0.0));
        // A second tree that never connects to "camera".
        tf.set_transform("elsewhere", "ns::ghost::1", at(0.0, 0.0, 0.0));

        let mut t = tracker(None);
        let objects = t.refresh(&tf).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].frame, "ns::cup::1");
        assert_eq!(t.known_frame_names(), ["ns::cup::1"]);
    }

    #[test]
    fn duplicate_listing_yields_one_object() {
        let source = ScriptedSource {
            frames: Mutex::new(vec!["ns::cup::1".to_string(), "ns::cup::1".to_string()]),
            buffer: TfBuffer::new(),
        };
        source.buffer.set_transform("camera", "ns::cup::1", at(0.0, 0.0, 0.0));

        let mut t = tracker(None);
        assert_eq!(t.refresh(&source).unwrap().len(), 1);
    }

    #[test]
    fn poses_are_expressed_in_fixed_parent() {
        let tf = TfBuffer::new();
        tf.set_transform("base_link", "camera", at(0.0, 0.0, 1.0));
        tf.set_transform("camera", "ns::cup::1", at(0.5, 0.0, 0.0));

        let mut t = tracker(Some("base_link"));
        let p = t.refresh(&tf).unwrap()[0].pose.translation;
        assert!((p.x - 0.5).abs() < 1e-9);
        assert!((p.z - 1.0).abs() < 1e-9);
        assert_eq!(t.parent_frame(), Some("base_link"));
    }

    #[test]
    fn parent_survives_frame_loss() {
        let tf = TfBuffer::new();
        tf.set_transform("camera", "ns::cup::1", at(0.0, 0.0, 0.0));
        let mut t = tracker(None);
        t.refresh(&tf).unwrap();

        // Only infrastructure left: the cached parent keeps the tracker in the
        // resolved state with zero objects.
        tf.remove_frame("ns::cup::1");
        tf.set_transform("world", "camera", at(0.0, 0.0, 0.0));
        let objects = t.refresh(&tf).unwrap();
        assert!(objects.is_empty());
        assert_eq!(t.parent_frame(), Some("camera"));
    }

    #[test]
    fn reset_parent_forgets_tracked_objects() {
        let tf = TfBuffer::new();
        tf.set_transform("camera", "ns::cup::1", at(0.0, 0.0, 0.0));
        let mut t = tracker(None);
        t.refresh(&tf).unwrap();
        assert_eq!(t.objects().len(), 1);

        t.reset_parent();
        assert!(t.parent_frame().is_none());
        assert!(t.objects().is_empty());
        assert!(t.known_frame_names().is_empty());
    }

    #[test]
    fn clear_keeps_resolved_parent() {
        let tf = TfBuffer::new();
        tf.set_transform("camera", "ns::cup::1", at(0.0, 0.0, 0.0));
        let mut t = tracker(None);
        t.refresh(&tf).unwrap();

        t.clear();
        assert!(t.objects().is_empty());
        assert!(t.known_frame_names().is_empty());
        assert_eq!(t.parent_frame(), Some("camera"));
    }
}
