//! Storage and call types of the pro-rata sale.

use frame::prelude::*;
use polkadot_sdk::sp_runtime::FixedU128;

/// Balance type shared with the assets backend
pub type Balance = u128;

/// Asset identifier of the base and boost tokens
pub type AssetId = u32;

/// Unix time in seconds
pub type Moment = u64;

/// How the goal is split between boosted and non-boosted deposits once overfunded
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum AllocationMode {
  /// Boosted deposits are filled first, the rest of the goal goes to non-boosted ones
  #[default]
  GoalPriority,
  /// Boosted deposits weigh `boost_factor` times a non-boosted deposit
  Linear { boost_factor: FixedU128 },
}

/// Sale parameters, written once by `initialize`
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct SaleConfig<AccountId> {
  /// Key whose signatures authorize deposits
  pub deposit_verifier: AccountId,
  /// Destination of goal, swapped and excess withdrawals
  pub cold_wallet: AccountId,
  pub base_asset: AssetId,
  /// `None` disables boosted deposits
  pub boost_asset: Option<AssetId>,
  pub base_goal: Balance,
  /// Ceiling on the total base deposited
  pub balance_limit: Balance,
  pub start_date: Moment,
  pub close_date: Moment,
  /// Refunds are paid outside the pallet; batch refund is disabled
  pub external_refund: bool,
  pub allocation: AllocationMode,
}

impl<AccountId> SaleConfig<AccountId> {
  pub fn boost_enabled(&self) -> bool {
    self.boost_asset.is_some()
  }

  pub fn is_linear(&self) -> bool {
    matches!(self.allocation, AllocationMode::Linear { .. })
  }
}

/// Admin-supplied settlement numbers overriding the engine
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct ManualAllocation {
  pub base_allocation: Balance,
  pub base_refund: Balance,
  pub boost_refund: Balance,
}

/// Where an account's settlement numbers come from
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum AllocationSource {
  /// Evaluated by the allocation engine against current totals
  #[default]
  Computed,
  Manual(ManualAllocation),
}

impl AllocationSource {
  pub fn is_manual(&self) -> bool {
    matches!(self, AllocationSource::Manual(_))
  }
}

/// Per-depositor record, created on first deposit and never removed
#[derive(
  Clone, Debug, Default, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct AccountItem {
  /// Position in the enumeration index
  pub index: u32,
  /// Expected nonce of the next deposit authorization
  pub nonce: u32,
  /// Sticky: once boosted, always boosted
  pub boosted: bool,
  pub base_deposited: Balance,
  /// Boost-token equivalent credited at each boosted deposit's rate
  pub boost_deposit: Balance,
  /// Base-amount weighted average of every rate credited to this account
  pub boost_average_rate: FixedU128,
  pub base_refunded: Balance,
  pub boost_refunded: Balance,
  pub allocation: AllocationSource,
}

/// Settlement numbers of one account
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct Settlement {
  pub base_allocation: Balance,
  pub base_refund: Balance,
  pub boost_refund: Balance,
}

impl From<ManualAllocation> for Settlement {
  fn from(manual: ManualAllocation) -> Self {
    Settlement {
      base_allocation: manual.base_allocation,
      base_refund: manual.base_refund,
      boost_refund: manual.boost_refund,
    }
  }
}

/// Global counters and settlement cursors
#[derive(
  Clone, Debug, Default, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct SaleLedger {
  pub total_base_deposited: Balance,
  pub total_base_non_boost_deposited: Balance,
  pub total_base_boost_deposited: Balance,
  pub total_boost_deposited: Balance,
  pub total_base_refunded: Balance,
  pub total_boost_refunded: Balance,
  /// Goal and swapped amounts paid to the cold wallet
  pub total_base_withdrew: Balance,
  pub total_base_swapped_amount: Balance,
  /// Refunds the batch could not land, held until claimed
  pub pending_base_refund: Balance,
  pub pending_boost_refund: Balance,
  pub processed_refund_index: u32,
  pub processed_base_swapped_index: u32,
  pub withdrew_base_goal: bool,
  pub withdrew_base_swapped_amount: bool,
}

/// A consumed deposit authorization
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct TransactionItem<AccountId> {
  pub account: AccountId,
  pub amount: Balance,
}

/// Audit record appended on every manual account update
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct UpdateLogEntry<AccountId> {
  pub admin: AccountId,
  pub timestamp: Moment,
  pub updated_count: u32,
}

/// Input of `update_account_item(s)`
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct AccountItemUpdate {
  /// `false` hands the account back to the allocation engine
  pub manual: bool,
  pub base_allocation: Balance,
  pub base_refund: Balance,
  pub boost_refund: Balance,
}

impl AccountItemUpdate {
  pub fn into_source(self) -> AllocationSource {
    if self.manual {
      AllocationSource::Manual(ManualAllocation {
        base_allocation: self.base_allocation,
        base_refund: self.base_refund,
        boost_refund: self.boost_refund,
      })
    } else {
      AllocationSource::Computed
    }
  }
}

/// Deposit authorization fields covered by the verifier's signature
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct DepositParams<TransactionId> {
  pub base_amount: Balance,
  pub boost: bool,
  pub boost_exchange_rate: FixedU128,
  pub nonce: u32,
  pub transaction_id: TransactionId,
  pub timestamp_limit: Moment,
}

/// Read model returned by `fetch_account_info`
#[derive(Clone, Debug, Default, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct AccountInfo {
  pub base_deposited: Balance,
  pub boosted: bool,
  pub boost_deposit: Balance,
  pub boost_average_rate: FixedU128,
  pub nonce: u32,
  pub manual: bool,
  pub base_allocation: Balance,
  pub base_refund: Balance,
  pub base_refunded: Balance,
  pub boost_refund: Balance,
  pub boost_refunded: Balance,
}

impl AccountInfo {
  pub fn new(item: &AccountItem, settlement: Settlement) -> Self {
    AccountInfo {
      base_deposited: item.base_deposited,
      boosted: item.boosted,
      boost_deposit: item.boost_deposit,
      boost_average_rate: item.boost_average_rate,
      nonce: item.nonce,
      manual: item.allocation.is_manual(),
      base_allocation: settlement.base_allocation,
      base_refund: settlement.base_refund,
      base_refunded: item.base_refunded,
      boost_refund: settlement.boost_refund,
      boost_refunded: item.boost_refunded,
    }
  }
}

/// Lifecycle position of the sale, derived from the clock and the ledger
#[derive(Clone, Copy, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub enum SalePhase {
  NotStarted,
  Open,
  /// Closed, settlement not started
  Closed,
  Refunding,
  Refunded,
  GoalWithdrawn,
  SwappedWithdrawn,
}
