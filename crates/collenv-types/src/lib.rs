use std::ops::{Add, Mul, Neg};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ────────────────────────────────────────────────────────────────────────────
// Geometry primitives
// ────────────────────────────────────────────────────────────────────────────

/// Position or offset in metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn dot(self, rhs: Self) -> f64 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn cross(self, rhs: Self) -> Self {
        Self::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, k: f64) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }
}

/// Orientation as a quaternion, scalar part first.
///
/// Poses coming off the wire are not always unit length; run them through
/// [`Quaternion::normalized`] before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    fn vector(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Unit-length copy.  A zero quaternion carries no orientation and maps
    /// to the identity.
    pub fn normalized(self) -> Self {
        let norm = (self.w * self.w + self.vector().dot(self.vector())).sqrt();
        if norm < f64::EPSILON {
            return Self::identity();
        }
        Self::new(self.w / norm, self.x / norm, self.y / norm, self.z / norm)
    }

    /// Inverse rotation, for unit quaternions.
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Apply the rotation to `v`.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        // v' = v + 2w(u × v) + 2u × (u × v), u the vector part.
        let u = self.vector();
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }
}

/// `a * b` rotates by `b` first, then by `a`.
impl Mul for Quaternion {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let (u, v) = (self.vector(), rhs.vector());
        let w = self.w * rhs.w - u.dot(v);
        let xyz = v * self.w + u * rhs.w + u.cross(v);
        Self::new(w, xyz.x, xyz.y, xyz.z)
    }
}

/// A rigid-body transform: the pose of a child frame expressed in its
/// parent frame.
///
/// To convert a point expressed in the child frame into the parent frame,
/// rotate it by `rotation` then add `translation`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl RigidTransform {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// A pure translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quaternion::identity())
    }

    /// Compose two transforms: if `self` = T_A_B and `other` = T_B_C, the
    /// result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation + self.rotation.rotate(other.translation);
        let rotated = self.rotation * other.rotation;
        Self::new(translated, rotated)
    }

    /// Invert the transform: T_A_B becomes T_B_A.
    pub fn inverse(self) -> Self {
        let rotation = self.rotation.conjugate();
        let translation = -rotation.rotate(self.translation);
        Self::new(translation, rotation)
    }

    /// Shift the pose by `offset` expressed in the pose's own (local) axes,
    /// leaving the orientation untouched.
    pub fn translated_local(self, offset: Vec3) -> Self {
        Self::new(
            self.translation + self.rotation.rotate(offset),
            self.rotation,
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Collision object descriptors
// ────────────────────────────────────────────────────────────────────────────

/// What a consuming world model should do with a [`CollisionObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Add,
    Remove,
}

/// The shape attached to an ADD descriptor, with its pose in the
/// descriptor's parent frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    /// A mesh loaded out-of-band from `resource` (e.g. `file://data/mesh/cup.stl`).
    Mesh {
        resource: String,
        pose: RigidTransform,
    },
    /// An axis-aligned box of the given `dimensions` (x, y, z extents).
    Box {
        dimensions: [f64; 3],
        pose: RigidTransform,
    },
}

/// One entry of the published collision set.
///
/// `id` is the identity a stateful consumer keys on; `frame_id` is the frame
/// the geometry pose is expressed in.  REMOVE descriptors carry no geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionObject {
    pub id: String,
    pub frame_id: String,
    pub operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
}

impl CollisionObject {
    /// An ADD descriptor backed by a mesh resource.
    pub fn mesh(
        id: impl Into<String>,
        frame_id: impl Into<String>,
        resource: impl Into<String>,
        pose: RigidTransform,
    ) -> Self {
        Self {
            id: id.into(),
            frame_id: frame_id.into(),
            operation: Operation::Add,
            geometry: Some(Geometry::Mesh {
                resource: resource.into(),
                pose,
            }),
        }
    }

    /// An ADD descriptor backed by a box primitive.
    pub fn boxed(
        id: impl Into<String>,
        frame_id: impl Into<String>,
        dimensions: [f64; 3],
        pose: RigidTransform,
    ) -> Self {
        Self {
            id: id.into(),
            frame_id: frame_id.into(),
            operation: Operation::Add,
            geometry: Some(Geometry::Box { dimensions, pose }),
        }
    }

    /// A REMOVE descriptor carrying only identity and frame.
    pub fn remove(id: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frame_id: frame_id.into(),
            operation: Operation::Remove,
            geometry: None,
        }
    }

    /// The REMOVE descriptor that retracts this object.
    pub fn to_removal(&self) -> Self {
        Self::remove(self.id.clone(), self.frame_id.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Error type shared by the perception and runtime crates.
///
/// Everything except [`CollisionEnvError::NotInitialized`] and
/// [`CollisionEnvError::Config`] is a soft failure: the caller logs it and
/// tries again on the next polling cycle.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CollisionEnvError {
    #[error("collision environment not initialized: no transform source attached")]
    NotInitialized,

    #[error("no frames available yet")]
    NoFrames,

    #[error("no object frame found to resolve the parent frame from")]
    ParentNotFound,

    #[error("frame '{0}' is not known to the transform source")]
    FrameNotFound(String),

    #[error("timed out after {timeout_ms} ms waiting for transform {source_frame} -> {target_frame}")]
    TransformTimeout {
        target_frame: String,
        source_frame: String,
        timeout_ms: u64,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CollisionEnvError {
    /// `true` for conditions that may clear up on a later polling cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NoFrames
                | Self::ParentNotFound
                | Self::FrameNotFound(_)
                | Self::TransformTimeout { .. }
        )
    }
}
