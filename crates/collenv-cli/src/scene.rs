//! Scene files – a static stand-in for a live frame tracker.
//!
//! A scene lists frames as parent/child edges:
//!
//! ```toml
//! [[frames]]
//! name = "scene::cup::1"
//! parent = "world"
//! translation = [0.1, 0.0, 0.75]
//! rotation = [1.0, 0.0, 0.0, 0.0]   # w, x, y, z
//! ```
//!
//! The CLI re-reads the file every cycle, so editing it while the loop runs
//! moves, adds and removes objects.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use collenv_perception::TfBuffer;
use collenv_types::{Quaternion, RigidTransform, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub frames: Vec<SceneFrame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFrame {
    pub name: String,
    pub parent: String,
    #[serde(default)]
    pub translation: [f64; 3],
    /// Quaternion as `[w, x, y, z]`; normalised on apply.
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
}

fn identity_rotation() -> [f64; 4] {
    [1.0, 0.0, 0.0, 0.0]
}

impl SceneFrame {
    pub fn transform(&self) -> RigidTransform {
        let [x, y, z] = self.translation;
        let [qw, qx, qy, qz] = self.rotation;
        RigidTransform::new(
            Vec3::new(x, y, z),
            Quaternion::new(qw, qx, qy, qz).normalized(),
        )
    }
}

impl Scene {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let scene: Scene =
            toml::from_str(raw).map_err(|e| format!("Failed to parse scene: {}", e))?;
        for frame in &scene.frames {
            if frame.name.is_empty() || frame.parent.is_empty() {
                return Err("Scene frames need a non-empty name and parent".to_string());
            }
            if frame.name == frame.parent {
                return Err(format!("Frame {} cannot be its own parent", frame.name));
            }
        }
        Ok(scene)
    }

    /// Publish every frame into `tf`, refreshing its stamp.
    pub fn apply(&self, tf: &TfBuffer) {
        for frame in &self.frames {
            tf.set_transform(&frame.parent, &frame.name, frame.transform());
        }
    }

    /// Drop frames that `previous` published but this scene no longer lists.
    /// Returns how many were removed.
    pub fn retract_missing(&self, previous: &Scene, tf: &TfBuffer) -> usize {
        let current: HashSet<&str> = self.frames.iter().map(|f| f.name.as_str()).collect();
        previous
            .frames
            .iter()
            .filter(|f| !current.contains(f.name.as_str()))
            .filter(|f| tf.remove_frame(&f.name))
            .count()
    }
}

/// Load a scene from `path`.  A missing file is an empty scene.
pub fn load(path: &Path) -> Result<Scene, String> {
    if !path.exists() {
        return Ok(Scene::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read scene at {}: {}", path.display(), e))?;
    Scene::parse(&raw)
}
