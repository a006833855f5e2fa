use serde::{Deserialize, Serialize};

/// Plan length meaning "never expires".
pub const UNLIMITED_DAYS: i64 = -1;

/// A purchasable subscription plan, loaded from configuration. The display
/// name lives in the plan table key, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub days: i64,
    pub amount: f64,
    #[serde(default = "default_description")]
    pub description: String,
}

fn default_description() -> String {
    "No description".to_string()
}

impl Plan {
    pub fn unlimited(&self) -> bool {
        self.days == UNLIMITED_DAYS
    }
}
