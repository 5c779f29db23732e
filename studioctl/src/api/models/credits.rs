use serde::{Deserialize, Serialize};

/// Body of `GET /api/credits/balance`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditBalance {
    pub balance: i64,
    #[serde(default)]
    pub total_spent: i64,
    #[serde(default)]
    pub total_refunded: i64,
}

impl CreditBalance {
    /// Whether a job with the given cost can be paid for
    pub fn covers(&self, cost: u64) -> bool {
        u64::try_from(self.balance).is_ok_and(|balance| balance >= cost)
    }
}
