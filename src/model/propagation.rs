use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Which slices a create or spatial update writes to, relative to the
/// current slice.
///
/// `All` covers the whole stack for creation and for propagated updates
/// alike.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropagationRange {
    #[default]
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "forward")]
    Forward,
    #[serde(rename = "10")]
    Next10,
    #[serde(rename = "20")]
    Next20,
    #[serde(rename = "all")]
    All,
}

impl PropagationRange {
    pub const ALL: [PropagationRange; 5] = [
        PropagationRange::Current,
        PropagationRange::Forward,
        PropagationRange::Next10,
        PropagationRange::Next20,
        PropagationRange::All,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Current => "This slice",
            Self::Forward => "Forward",
            Self::Next10 => "Next 10",
            Self::Next20 => "Next 20",
            Self::All => "All",
        }
    }

    /// Slice indices covered when the current slice is `current` in a stack
    /// of `len` slices. `current` is clamped into the stack first.
    pub fn indices(self, current: usize, len: usize) -> Range<usize> {
        if len == 0 {
            return 0..0;
        }
        let c = current.min(len - 1);
        match self {
            Self::Current => c..c + 1,
            Self::Forward => c..len,
            Self::Next10 => c..len.min(c + 10),
            Self::Next20 => c..len.min(c + 20),
            Self::All => 0..len,
        }
    }
}

impl fmt::Display for PropagationRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How far a spatial update reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateScope {
    /// Only the current slice, whatever the range selector says.
    CurrentOnly,
    Propagate(PropagationRange),
}

impl UpdateScope {
    pub fn indices(self, current: usize, len: usize) -> Range<usize> {
        match self {
            Self::CurrentOnly => PropagationRange::Current.indices(current, len),
            Self::Propagate(range) => range.indices(current, len),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeleteScope {
    Current,
    Forward,
    All,
}

impl DeleteScope {
    pub fn label(self) -> &'static str {
        match self {
            Self::Current => "Delete here",
            Self::Forward => "Delete forward",
            Self::All => "Delete everywhere",
        }
    }
}
