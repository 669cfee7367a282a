//! In-memory transform buffer.
//!
//! [`TfBuffer`] keeps a tree of named reference frames: every child frame has
//! exactly one parent and the [`RigidTransform`] giving its pose in that
//! parent.  Given any two frame names the buffer composes the chain between
//! them via BFS, walking parent→child edges forwards and child→parent edges
//! inverted.
//!
//! The buffer is internally synchronized so a feeder thread can keep
//! publishing transforms while a consumer polls it through the
//! [`TransformSource`] trait.  An optional cache window makes frames that
//! stopped being published disappear, the way a TF listener forgets old data.
//!
//! # Example
//!
//! ```rust
//! use collenv_perception::transform::TfBuffer;
//! use collenv_types::{RigidTransform, Vec3};
//!
//! let tf = TfBuffer::new();
//!
//! // robot_base is 1 m forward of world origin, same orientation.
//! tf.set_transform("world", "robot_base",
//!     RigidTransform::from_translation(Vec3::new(1.0, 0.0, 0.0)));
//!
//! // camera is 0.5 m forward of robot_base, same orientation.
//! tf.set_transform("robot_base", "camera",
//!     RigidTransform::from_translation(Vec3::new(0.5, 0.0, 0.0)));
//!
//! let t = tf.lookup("world", "camera").unwrap();
//! assert!((t.translation.x - 1.5).abs() < 1e-9);
//!
//! // And the other way round.
//! let t = tf.lookup("camera", "world").unwrap();
//! assert!((t.translation.x + 1.5).abs() < 1e-9);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use collenv_types::{CollisionEnvError, RigidTransform};

use crate::source::TransformSource;

/// How often [`TfBuffer::await_transform`] re-checks for a missing transform.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ────────────────────────────────────────────────────────────────────────────
// Internal state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Edge {
    parent: String,
    transform: RigidTransform,
    stamp: Instant,
}

#[derive(Debug, Default)]
struct BufferState {
    /// `edges[child] = Edge { parent, .. }`
    edges: HashMap<String, Edge>,
    /// Frame names in first-seen order, so listings are stable.
    order: Vec<String>,
}

impl BufferState {
    fn remember(&mut self, frame: &str) {
        if !self.order.iter().any(|f| f == frame) {
            self.order.push(frame.to_string());
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfBuffer
// ────────────────────────────────────────────────────────────────────────────

/// A tree of named reference frames and the [`RigidTransform`]s that relate
/// them.
#[derive(Debug)]
pub struct TfBuffer {
    state: RwLock<BufferState>,
    /// Edges older than this are ignored.  `None` keeps edges forever.
    cache_duration: Option<Duration>,
    poll_interval: Duration,
}

impl Default for TfBuffer {
    fn default() -> Self {
        Self {
            state: RwLock::new(BufferState::default()),
            cache_duration: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl TfBuffer {
    /// Create an empty buffer that never forgets a frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer that ignores edges not re-published within
    /// `cache_duration`.
    pub fn with_cache_duration(cache_duration: Duration) -> Self {
        Self {
            cache_duration: Some(cache_duration),
            ..Self::default()
        }
    }

    /// Register or refresh the pose of `child_frame` in `parent_frame`.
    ///
    /// A child has a single parent: publishing it under a new parent
    /// re-parents it.
    pub fn set_transform(&self, parent_frame: &str, child_frame: &str, transform: RigidTransform) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.remember(parent_frame);
        state.remember(child_frame);
        state.edges.insert(
            child_frame.to_string(),
            Edge {
                parent: parent_frame.to_string(),
                transform,
                stamp: Instant::now(),
            },
        );
    }

    /// Detach `child_frame` from its parent.  Returns `true` if it had one.
    pub fn remove_frame(&self, child_frame: &str) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let removed = state.edges.remove(child_frame).is_some();
        let still_used: HashSet<String> = state
            .edges
            .iter()
            .flat_map(|(child, edge)| [child.clone(), edge.parent.clone()])
            .collect();
        state.order.retain(|f| still_used.contains(f));
        removed
    }

    /// Forget every frame.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.edges.clear();
        state.order.clear();
    }

    fn is_fresh(&self, edge: &Edge) -> bool {
        self.cache_duration
            .is_none_or(|window| edge.stamp.elapsed() <= window)
    }

    /// Compute the pose of `source_frame` expressed in `target_frame`.
    ///
    /// Returns `None` if either frame is unknown or no chain of fresh edges
    /// connects them.
    pub fn lookup(&self, target_frame: &str, source_frame: &str) -> Option<RigidTransform> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);

        // Undirected adjacency over fresh edges; walking child→parent uses the
        // inverted transform.
        let mut adjacency: HashMap<&str, Vec<(&str, RigidTransform)>> = HashMap::new();
        for frame in &state.order {
            let Some(edge) = state.edges.get(frame) else {
                continue;
            };
            if !self.is_fresh(edge) {
                continue;
            }
            adjacency
                .entry(edge.parent.as_str())
                .or_default()
                .push((frame.as_str(), edge.transform));
            adjacency
                .entry(frame.as_str())
                .or_default()
                .push((edge.parent.as_str(), edge.transform.inverse()));
        }

        if !adjacency.contains_key(target_frame) {
            return None;
        }
        if source_frame == target_frame {
            return Some(RigidTransform::identity());
        }

        // Each queue item carries T_target_current.
        let mut queue: VecDeque<(&str, RigidTransform)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();
        queue.push_back((target_frame, RigidTransform::identity()));
        visited.insert(target_frame);

        while let Some((current, accumulated)) = queue.pop_front() {
            let Some(neighbours) = adjacency.get(current) else {
                continue;
            };
            for (next, edge_tf) in neighbours {
                if !visited.insert(*next) {
                    continue;
                }
                let composed = accumulated.compose(*edge_tf);
                if *next == source_frame {
                    return Some(composed);
                }
                queue.push_back((*next, composed));
            }
        }

        None
    }
}

impl TransformSource for TfBuffer {
    fn frame_names(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let live: HashSet<&str> = state
            .edges
            .iter()
            .filter(|(_, edge)| self.is_fresh(edge))
            .flat_map(|(child, edge)| [child.as_str(), edge.parent.as_str()])
            .collect();
        state
            .order
            .iter()
            .filter(|f| live.contains(f.as_str()))
            .cloned()
            .collect()
    }

    fn direct_parent(&self, frame: &str) -> Option<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .edges
            .get(frame)
            .filter(|edge| self.is_fresh(edge))
            .map(|edge| edge.parent.clone())
    }

    fn await_transform(
        &self,
        target_frame: &str,
        source_frame: &str,
        timeout: Duration,
    ) -> Result<RigidTransform, CollisionEnvError> {
        // A timeout too large for `Instant` means "wait indefinitely".
        let deadline = Instant::now().checked_add(timeout);
        loop {
            if let Some(transform) = self.lookup(target_frame, source_frame) {
                return Ok(transform);
            }
            let now = Instant::now();
            let nap = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(CollisionEnvError::TransformTimeout {
                        target_frame: target_frame.to_string(),
                        source_frame: source_frame.to_string(),
                        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    });
                }
                Some(deadline) => self.poll_interval.min(deadline - now),
                None => self.poll_interval,
            };
            std::thread::sleep(nap);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
