use serde::{Deserialize, Serialize};

use crate::field::Overridable;
use crate::msgs::enums::{AlertDescription, AlertLevel};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertMessage {
    pub level: Overridable<AlertLevel>,
    pub description: Overridable<AlertDescription>,
}

impl AlertMessage {
    pub fn new(level: AlertLevel, description: AlertDescription) -> Self {
        Self {
            level: Overridable::computed(level),
            description: Overridable::computed(description),
        }
    }
}
