//! `collenv-perception` – turns a stream of named frames into tracked objects.
//!
//! # Modules
//!
//! - [`naming`] – [`NameClassifier`][naming::NameClassifier]: tokenizes frame
//!   names and decides which ones denote tracked objects.
//! - [`source`] – [`TransformSource`][source::TransformSource]: the three
//!   queries the collision environment needs from a tracking system.
//! - [`transform`] – [`TfBuffer`][transform::TfBuffer]: in-memory,
//!   thread-safe frame tree implementing [`TransformSource`][source::TransformSource].
//! - [`parent`] – [`ParentResolver`][parent::ParentResolver]: resolves and
//!   caches the single frame all object poses are expressed in.
//! - [`tracker`] – [`ObjectFrameTracker`][tracker::ObjectFrameTracker]:
//!   re-samples every object frame each cycle and replaces the tracked set
//!   wholesale.
//! - [`surface`] – [`SupportSurfaceBuilder`][surface::SupportSurfaceBuilder]:
//!   synthesizes the tabletop box under its anchor frame.

pub mod naming;
pub mod parent;
pub mod source;
pub mod surface;
pub mod tracker;
pub mod transform;

pub use naming::{NameClassifier, split_frame_name};
pub use parent::ParentResolver;
pub use source::TransformSource;
pub use surface::{SURFACE_DIMENSIONS, SupportSurface, SupportSurfaceBuilder};
pub use tracker::{ObjectFrameTracker, TrackedObject};
pub use transform::TfBuffer;
