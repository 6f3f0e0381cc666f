//! The two-track value holder every wire field is made of.
//!
//! Each serializable datum in a message carries both the value the engine
//! would naturally derive (`computed`) and an optional author-supplied pin
//! (`explicit`). Resolution always prefers the pin, so a test author can
//! force exactly one wire-level deviation while every other field in the
//! same message continues to be derived validly.

use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Overridable<T> {
    computed: Option<T>,
    explicit: Option<T>,
}

impl<T> Default for Overridable<T> {
    fn default() -> Self {
        Self::unset()
    }
}

impl<T> Overridable<T> {
    pub const fn unset() -> Self {
        Self {
            computed: None,
            explicit: None,
        }
    }

    pub fn computed(value: T) -> Self {
        Self {
            computed: Some(value),
            explicit: None,
        }
    }

    pub fn explicit(value: T) -> Self {
        Self {
            computed: None,
            explicit: Some(value),
        }
    }

    /// Resolved view: the explicit pin if present, else the computed value.
    pub fn get(&self) -> Option<&T> {
        self.explicit.as_ref().or(self.computed.as_ref())
    }

    /// Resolved view for the preparator/serializer stages, where an
    /// unresolved field is a hard error carrying the field name.
    pub fn require(&self, field: &str) -> Result<&T, Error> {
        self.get()
            .ok_or_else(|| Error::UnresolvedField(field.to_string()))
    }

    /// Stores the naturally derived value. An existing explicit pin keeps
    /// winning resolution; the computed slot is updated regardless so that
    /// `clear_explicit` reverts to the most recent derivation.
    pub fn set_computed(&mut self, value: T) {
        self.computed = Some(value);
    }

    /// Pins the field. The pinned value survives all downstream computation.
    pub fn set_explicit(&mut self, value: T) {
        self.explicit = Some(value);
    }

    /// Reverts resolution to the computed track.
    pub fn clear_explicit(&mut self) {
        self.explicit = None;
    }

    pub fn is_pinned(&self) -> bool {
        self.explicit.is_some()
    }

    pub fn is_resolved(&self) -> bool {
        self.explicit.is_some() || self.computed.is_some()
    }
}

impl<T> From<T> for Overridable<T> {
    fn from(value: T) -> Self {
        Self::computed(value)
    }
}
