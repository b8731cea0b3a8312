use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// Where approved quests pay out their points.
pub trait PointsLedger: Send + Sync {
    fn award(&self, user: &str, points: u32) -> Result<(), StoreError>;

    fn balance(&self, user: &str) -> Result<u64, StoreError>;
}

/// A ledger kept in memory.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    balances: Mutex<HashMap<String, u64>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PointsLedger for MemoryLedger {
    fn award(&self, user: &str, points: u32) -> Result<(), StoreError> {
        let mut balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
        *balances.entry(user.to_string()).or_default() += u64::from(points);
        Ok(())
    }

    fn balance(&self, user: &str) -> Result<u64, StoreError> {
        let balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
        Ok(balances.get(user).copied().unwrap_or(0))
    }
}
