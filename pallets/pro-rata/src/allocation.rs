//! Allocation engine
//!
//! Pure arithmetic over ledger totals: splits the base goal between boosted and
//! non-boosted deposits once the sale is overfunded, and converts base amounts
//! into boost-token amounts. Nothing here touches storage, so every function can
//! be re-evaluated at any time against the current totals.
//!
//! Integer division truncates. Truncation dust stays with the sale account and
//! is swept together with excess tokens.

use crate::types::{AccountItem, AllocationMode, AllocationSource, Balance, Settlement};
use frame::deps::sp_core::U256;
use polkadot_sdk::sp_runtime::{FixedPointNumber, FixedU128};

/// Base-token totals the engine works on
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PoolTotals {
  pub total: Balance,
  pub non_boost: Balance,
  pub boost: Balance,
}

impl PoolTotals {
  pub fn overfund(&self, goal: Balance) -> Balance {
    self.total.saturating_sub(goal)
  }
}

/// Engine result for one account, in base-token units
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Allocation {
  pub base_allocation: Balance,
  /// Returned in base token (non-boosted accounts only)
  pub base_refund: Balance,
  /// Not returned in base token; compensated in boost token (boosted accounts only)
  pub boost_shortfall: Balance,
}

/// Decides how much of the goal the boosted pool receives once overfunded.
///
/// The remainder of the goal goes to the non-boosted pool, and each pool is
/// split pro-rata to deposits.
pub trait AllocationStrategy {
  fn boost_capacity(&self, goal: Balance, totals: &PoolTotals) -> Balance;
}

/// Boosted deposits are served first, up to the whole goal
pub struct GoalPriority;

impl AllocationStrategy for GoalPriority {
  fn boost_capacity(&self, goal: Balance, totals: &PoolTotals) -> Balance {
    totals.boost.min(goal)
  }
}

/// Boosted deposits count `boost_factor` times when the goal is shared.
///
/// capacity = min(B, goal * f*B / (f*B + N))
pub struct LinearBoost {
  pub boost_factor: FixedU128,
}

impl AllocationStrategy for LinearBoost {
  fn boost_capacity(&self, goal: Balance, totals: &PoolTotals) -> Balance {
    let weighted_boost = U256::from(totals.boost)
      .saturating_mul(U256::from(self.boost_factor.into_inner()))
      / U256::from(FixedU128::DIV);
    let denominator = weighted_boost.saturating_add(U256::from(totals.non_boost));
    if denominator.is_zero() {
      return 0;
    }
    let share = U256::from(goal).saturating_mul(weighted_boost) / denominator;
    // share <= goal, so it always fits
    to_balance(share).unwrap_or(goal).min(totals.boost)
  }
}

impl AllocationStrategy for AllocationMode {
  fn boost_capacity(&self, goal: Balance, totals: &PoolTotals) -> Balance {
    match self {
      AllocationMode::GoalPriority => GoalPriority.boost_capacity(goal, totals),
      AllocationMode::Linear { boost_factor } => LinearBoost {
        boost_factor: *boost_factor,
      }
      .boost_capacity(goal, totals),
    }
  }
}

/// Allocation of a single account holding `deposit` in the boosted or non-boosted pool.
pub fn allocate<S: AllocationStrategy + ?Sized>(
  strategy: &S,
  goal: Balance,
  totals: &PoolTotals,
  deposit: Balance,
  boosted: bool,
) -> Allocation {
  if totals.overfund(goal) == 0 {
    return Allocation {
      base_allocation: deposit,
      base_refund: 0,
      boost_shortfall: 0,
    };
  }

  let boost_capacity = strategy.boost_capacity(goal, totals).min(goal);
  if boosted {
    let base_allocation = mul_div(boost_capacity, deposit, totals.boost)
      .unwrap_or(0)
      .min(deposit);
    Allocation {
      base_allocation,
      base_refund: 0,
      boost_shortfall: deposit - base_allocation,
    }
  } else {
    let capacity = goal - boost_capacity;
    let base_allocation = mul_div(capacity, deposit, totals.non_boost)
      .unwrap_or(0)
      .min(deposit);
    Allocation {
      base_allocation,
      base_refund: deposit - base_allocation,
      boost_shortfall: 0,
    }
  }
}

/// Everything needed to settle any account against a frozen view of the ledger
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SettlementContext {
  pub mode: AllocationMode,
  pub goal: Balance,
  pub totals: PoolTotals,
  /// Closed below goal: every computed account is refunded in full
  pub failed: bool,
  pub base_decimals: u8,
  pub boost_decimals: u8,
}

impl SettlementContext {
  /// Manual overrides win; otherwise the engine result with the boosted
  /// shortfall converted at the account's average rate. `None` on overflow.
  pub fn settle(&self, item: &AccountItem) -> Option<Settlement> {
    if let AllocationSource::Manual(manual) = item.allocation {
      return Some(manual.into());
    }
    if self.failed {
      return Some(Settlement {
        base_allocation: 0,
        base_refund: item.base_deposited,
        boost_refund: 0,
      });
    }
    let allocation = allocate(
      &self.mode,
      self.goal,
      &self.totals,
      item.base_deposited,
      item.boosted,
    );
    let boost_refund = if allocation.boost_shortfall == 0 {
      0
    } else {
      base_to_boost(
        allocation.boost_shortfall,
        item.boost_average_rate,
        self.base_decimals,
        self.boost_decimals,
      )?
    };
    Some(Settlement {
      base_allocation: allocation.base_allocation,
      base_refund: allocation.base_refund,
      boost_refund,
    })
  }

  /// Base tokens a boosted account leaves with the sale in exchange for its boost refund
  pub fn base_swapped(&self, item: &AccountItem) -> Option<Balance> {
    if !item.boosted {
      return Some(0);
    }
    let settlement = self.settle(item)?;
    Some(
      item
        .base_deposited
        .saturating_sub(settlement.base_allocation)
        .saturating_sub(settlement.base_refund),
    )
  }
}

/// `a * b / c` without intermediate overflow. `None` when `c` is zero or the
/// result does not fit a balance.
pub fn mul_div(a: Balance, b: Balance, c: Balance) -> Option<Balance> {
  if c == 0 {
    return None;
  }
  to_balance(U256::from(a).saturating_mul(U256::from(b)) / U256::from(c))
}

/// Converts a base-token amount into boost-token units at `rate`, normalizing
/// between the two tokens' decimals.
pub fn base_to_boost(
  base_amount: Balance,
  rate: FixedU128,
  base_decimals: u8,
  boost_decimals: u8,
) -> Option<Balance> {
  let mut numerator = U256::from(base_amount).checked_mul(U256::from(rate.into_inner()))?;
  let mut denominator = U256::from(FixedU128::DIV);
  if boost_decimals >= base_decimals {
    let scale = 10u128.checked_pow((boost_decimals - base_decimals) as u32)?;
    numerator = numerator.checked_mul(U256::from(scale))?;
  } else {
    let scale = 10u128.checked_pow((base_decimals - boost_decimals) as u32)?;
    denominator = denominator.checked_mul(U256::from(scale))?;
  }
  to_balance(numerator / denominator)
}

/// Running average of exchange rates weighted by the base amount each rate applied to.
pub fn weighted_average_rate(
  average: FixedU128,
  weight: Balance,
  rate: FixedU128,
  amount: Balance,
) -> FixedU128 {
  let total_weight = U256::from(weight).saturating_add(U256::from(amount));
  if total_weight.is_zero() {
    return rate;
  }
  let sum = U256::from(average.into_inner())
    .saturating_mul(U256::from(weight))
    .saturating_add(U256::from(rate.into_inner()).saturating_mul(U256::from(amount)));
  to_balance(sum / total_weight)
    .map(FixedU128::from_inner)
    .unwrap_or(rate)
}

fn to_balance(value: U256) -> Option<Balance> {
  if value > U256::from(u128::MAX) {
    return None;
  }
  Some(value.as_u128())
}
