//! Known-or-unknown column name sets.
//!
//! Every expression carries two of these: the input columns it reads (root
//! names) and the columns it produces (output names). Wildcards and dtype
//! selectors cannot know either until they meet a live schema, so both sets
//! are [`Names::Unknown`] for them, and stay unknown for anything built on
//! top of them.

use serde::{Deserialize, Serialize};

/// An ordered set of column names, or the marker that it cannot be known
/// before evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Names {
    /// The names are known, in order, without duplicates.
    Known(Vec<String>),
    /// The names depend on the schema the expression is evaluated against.
    Unknown,
}

impl Names {
    /// Known names, deduplicated with first-occurrence order kept.
    pub fn known<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !out.contains(&name) {
                out.push(name);
            }
        }
        Self::Known(out)
    }

    /// An empty known set.
    pub fn empty() -> Self {
        Self::Known(Vec::new())
    }

    /// Whether the names are unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// The names, if known.
    pub fn as_known(&self) -> Option<&[String]> {
        match self {
            Self::Known(names) => Some(names),
            Self::Unknown => None,
        }
    }

    /// Union with `other`. Unknown on either side makes the result unknown.
    pub fn union(&self, other: &Names) -> Names {
        match (self, other) {
            (Self::Known(left), Self::Known(right)) => {
                Self::known(left.iter().chain(right.iter()).cloned())
            }
            _ => Self::Unknown,
        }
    }

    /// Union of many sets, unknown as soon as one of them is.
    pub fn union_all<'a>(sets: impl IntoIterator<Item = &'a Names>) -> Names {
        let mut acc = Self::empty();
        for names in sets {
            acc = acc.union(names);
            if acc.is_unknown() {
                break;
            }
        }
        acc
    }

    /// Keep only the first name; used by horizontal reductions whose single
    /// output is named after their first input.
    pub fn first(&self) -> Names {
        match self {
            Self::Known(names) => Self::Known(names.iter().take(1).cloned().collect()),
            Self::Unknown => Self::Unknown,
        }
    }

    /// Apply `f` to every known name.
    pub fn map(&self, f: impl Fn(&str) -> String) -> Names {
        match self {
            Self::Known(names) => Self::Known(names.iter().map(|n| f(n)).collect()),
            Self::Unknown => Self::Unknown,
        }
    }

    /// Number of known names.
    pub fn len(&self) -> Option<usize> {
        self.as_known().map(<[String]>::len)
    }
}

impl<S: Into<String>> FromIterator<S> for Names {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::known(iter)
    }
}
