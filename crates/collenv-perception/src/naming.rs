//! Frame-name classification.
//!
//! Tracked objects are published by the tracking source under namespaced
//! frame names such as `"world::cup::3"`.  Splitting the name on the
//! configured delimiter and counting tokens is the only signal available to
//! tell object frames apart from infrastructure frames (`"base_link"`,
//! `"camera::optical"`, …).
//!
//! # Example
//!
//! ```rust
//! use std::num::NonZeroUsize;
//! use collenv_perception::naming::{split_frame_name, NameClassifier};
//!
//! assert_eq!(
//!     split_frame_name("random::char::_test_", "::"),
//!     vec!["random", "char", "_test_"],
//! );
//!
//! let classifier = NameClassifier::new("::", NonZeroUsize::new(2).unwrap());
//! assert_eq!(classifier.object_name("ns::objname::leaf"), Some("objname"));
//! assert_eq!(classifier.object_name("ns::leaf"), None);
//! ```

use std::num::NonZeroUsize;

/// Split `frame_name` on every non-overlapping occurrence of `delimiter`.
///
/// N occurrences yield N + 1 tokens; leading, trailing and consecutive
/// delimiters yield empty tokens.  When the delimiter does not occur at all
/// (or is empty) the result is empty rather than a single token, meaning
/// "not classifiable".
pub fn split_frame_name<'a>(frame_name: &'a str, delimiter: &str) -> Vec<&'a str> {
    if delimiter.is_empty() || !frame_name.contains(delimiter) {
        return Vec::new();
    }
    frame_name.split(delimiter).collect()
}

/// Decides which frame names denote tracked objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameClassifier {
    delimiter: String,
    /// 1-based index of the token holding the object name.  A frame is an
    /// object frame iff it splits into strictly more tokens than this.
    object_name_index: NonZeroUsize,
}

impl NameClassifier {
    pub fn new(delimiter: impl Into<String>, object_name_index: NonZeroUsize) -> Self {
        Self {
            delimiter: delimiter.into(),
            object_name_index,
        }
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn object_name_index(&self) -> NonZeroUsize {
        self.object_name_index
    }

    /// Tokenize `frame_name` with this classifier's delimiter.
    pub fn tokens<'a>(&self, frame_name: &'a str) -> Vec<&'a str> {
        split_frame_name(frame_name, &self.delimiter)
    }

    /// Extract the object name from `frame_name`, or `None` when the frame is
    /// not an object frame.
    pub fn object_name<'a>(&self, frame_name: &'a str) -> Option<&'a str> {
        let tokens = self.tokens(frame_name);
        let k = self.object_name_index.get();
        if tokens.len() > k {
            Some(tokens[k - 1])
        } else {
            None
        }
    }

    pub fn is_object_frame(&self, frame_name: &str) -> bool {
        self.object_name(frame_name).is_some()
    }
}
