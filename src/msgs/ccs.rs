use serde::{Deserialize, Serialize};

use crate::field::Overridable;

/// The change-cipher-spec body is a single byte with the fixed value 1.
/// It is still an overridable field: sending a different value is a valid
/// probe.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangeCipherSpec {
    pub value: Overridable<u8>,
}
