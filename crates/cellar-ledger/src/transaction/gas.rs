use crate::transaction::GasUsed;
use crate::types::Coin;

/// Number of gas units added to every dry-run estimate
pub const GAS_SAFE_OVERHEAD: u64 = 1_000;

/// Largest budget a transaction may declare
pub const MAX_GAS_BUDGET: u64 = 50_000_000_000;

/// Gas consumed by a dry run, expressed in MIST
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GasEstimate {
    pub computation_cost: u64,
    pub storage_cost: u64,
    pub storage_rebate: u64,
}

impl From<&GasUsed> for GasEstimate {
    fn from(value: &GasUsed) -> Self {
        Self {
            computation_cost: value.computation_cost,
            storage_cost: value.storage_cost,
            storage_rebate: value.storage_rebate,
        }
    }
}

impl GasEstimate {
    /// Budget covering this estimate at the given `gas_price`. A large rebate never pulls the
    /// budget below the computation cost plus overhead.
    pub fn budget(&self, gas_price: u64) -> u64 {
        let computation = self.computation_cost.saturating_add(GAS_SAFE_OVERHEAD.saturating_mul(gas_price));
        let net = computation.saturating_add(self.storage_cost).saturating_sub(self.storage_rebate);

        net.max(computation)
    }
}

/// Select gas coins, largest first, until their balance covers `budget`. Returns `None`
/// when the coins cannot cover it.
pub(crate) fn select_gas_coins(mut coins: Vec<Coin>, budget: u64) -> Option<Vec<Coin>> {
    coins.sort_by(|a, b| b.balance.cmp(&a.balance));

    let mut selected = vec![];
    let mut total = 0u64;
    for coin in coins {
        if total >= budget {
            break;
        }

        total = total.saturating_add(coin.balance);
        selected.push(coin);
    }

    (total >= budget && !selected.is_empty()).then_some(selected)
}
