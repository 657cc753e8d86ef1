//! Pro-Rata Sale Pallet
//!
//! Time-boxed token sale where depositors commit a base asset against a fixed
//! goal. Deposits are authorized off-chain: a verifier key signs every deposit
//! (amount, boost flag, exchange rate, nonce, transaction id and expiry) and the
//! pallet checks the signature, the per-account nonce and the transaction id
//! before pulling funds.
//!
//! Once the sale closes overfunded, each account receives a pro-rata share of the
//! goal. Non-boosted accounts get the rest back in base token; boosted accounts
//! are compensated in boost token at the average rate of their deposits. The
//! sale account then pays out through permissionless cursor-driven batches, and
//! the owner sweeps the goal, the swapped base and any excess to the cold wallet.
//!
//! Allocations are never stored for computed accounts: they are re-derived from
//! the running totals whenever asked. An admin may pin an account to manual
//! numbers, which take precedence until reverted.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod allocation;
pub mod types;
pub use types::*;

#[cfg(test)]
pub mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub mod weights;
pub use weights::WeightInfo;

pub const LOG_TARGET: &str = "runtime::pro-rata";

/// Domain prefix of every message signed by the deposit verifier
pub const DEPOSIT_CONTEXT: &[u8] = b"pro-rata:deposit";

/// Helper for benchmarking
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId, Signature> {
  /// Base and boost assets with metadata, created if missing
  fn setup_assets() -> (AssetId, AssetId);
  fn fund(asset: AssetId, who: &AccountId, amount: Balance);
  fn set_time(now: Moment);
  fn verifier() -> AccountId;
  fn sign(message: &[u8]) -> Signature;
}

#[frame::pallet]
pub mod pallet {
  use super::*;
  use crate::allocation::{self, PoolTotals, SettlementContext};
  use crate::types::{AssetId, Balance, Moment};
  use alloc::vec::Vec;
  use frame::deps::{
    frame_support::{
      PalletId,
      traits::{
        UnixTime,
        fungibles::{Inspect, Mutate, metadata::Inspect as MetadataInspect},
        tokens::{Fortitude, Preservation, Provenance},
      },
    },
    sp_runtime::{
      FixedU128,
      traits::{AccountIdConversion, IdentifyAccount, One, TrailingZeroInput, Verify, Zero},
    },
  };
  use frame::prelude::*;

  #[pallet::config]
  pub trait Config: frame_system::Config<RuntimeEvent: From<Event<Self>>> {
    /// Holds the base and boost assets
    type Assets: Inspect<Self::AccountId, AssetId = AssetId, Balance = Balance>
      + Mutate<Self::AccountId, AssetId = AssetId, Balance = Balance>
      + MetadataInspect<Self::AccountId>;

    /// Wall clock the sale window and authorization expiry are checked against
    type UnixTime: UnixTime;

    /// Signature produced by the deposit verifier
    type OffchainSignature: Verify<Signer = Self::OffchainPublic> + Parameter;

    type OffchainPublic: IdentifyAccount<AccountId = Self::AccountId>;

    /// Origin allowed to initialize the sale
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    /// Derives the account holding deposited funds
    #[pallet::constant]
    type PalletId: Get<PalletId>;

    /// Upper bound on distinct depositors, bounds every batch
    #[pallet::constant]
    type MaxAccounts: Get<u32>;

    #[pallet::constant]
    type MaxTransactionIdLen: Get<u32>;

    /// Weight information
    type WeightInfo: WeightInfo;

    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::BenchmarkHelper<Self::AccountId, Self::OffchainSignature>;
  }

  #[pallet::pallet]
  pub struct Pallet<T>(_);

  pub type TransactionIdOf<T> = BoundedVec<u8, <T as Config>::MaxTransactionIdLen>;
  pub type DepositParamsOf<T> = DepositParams<TransactionIdOf<T>>;
  pub type SaleConfigOf<T> = SaleConfig<<T as frame_system::Config>::AccountId>;

  /// Sale parameters, absent until initialized
  #[pallet::storage]
  #[pallet::getter(fn sale)]
  pub type Sale<T: Config> = StorageValue<_, SaleConfigOf<T>, OptionQuery>;

  #[pallet::storage]
  #[pallet::getter(fn owner)]
  pub type Owner<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

  /// Totals and settlement cursors
  #[pallet::storage]
  #[pallet::getter(fn ledger)]
  pub type Ledger<T> = StorageValue<_, SaleLedger, ValueQuery>;

  #[pallet::storage]
  pub type Accounts<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, AccountItem, OptionQuery>;

  /// Deposit order of accounts, walked by the settlement batches
  #[pallet::storage]
  pub type AccountIndex<T: Config> = StorageMap<_, Twox64Concat, u32, T::AccountId, OptionQuery>;

  #[pallet::storage]
  #[pallet::getter(fn account_count)]
  pub type AccountCount<T> = StorageValue<_, u32, ValueQuery>;

  /// Consumed deposit authorizations
  #[pallet::storage]
  pub type TransactionItems<T: Config> =
    StorageMap<_, Blake2_128Concat, TransactionIdOf<T>, TransactionItem<T::AccountId>, OptionQuery>;

  #[pallet::storage]
  pub type UpdateLogs<T: Config> =
    StorageMap<_, Twox64Concat, u32, UpdateLogEntry<T::AccountId>, OptionQuery>;

  #[pallet::storage]
  pub type UpdateLogCount<T> = StorageValue<_, u32, ValueQuery>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    SaleInitialized {
      owner: T::AccountId,
      base_asset: AssetId,
      boost_asset: Option<AssetId>,
      base_goal: Balance,
      start_date: Moment,
      close_date: Moment,
    },
    Deposited {
      account: T::AccountId,
      boost: bool,
      base_amount: Balance,
      /// Boost-token equivalent credited by this deposit
      boost_deposit: Balance,
    },
    Refunded {
      account: T::AccountId,
      base_amount: Balance,
      boost_amount: Balance,
    },
    /// Refund the account cannot receive yet, left for `claim_refund`
    RefundDeferred {
      account: T::AccountId,
      base_amount: Balance,
      boost_amount: Balance,
    },
    BaseSwappedAmountCalculated {
      processed: u32,
      batch_amount: Balance,
      total_amount: Balance,
    },
    BaseGoalWithdrawn {
      to: T::AccountId,
      amount: Balance,
    },
    BaseSwappedAmountWithdrawn {
      to: T::AccountId,
      amount: Balance,
    },
    ExcessTokensWithdrawn {
      to: T::AccountId,
      base_amount: Balance,
      boost_amount: Balance,
    },
    ForceWithdrawn {
      asset: AssetId,
      to: T::AccountId,
      amount: Balance,
    },
    BaseGoalChanged {
      old_goal: Balance,
      new_goal: Balance,
    },
    BalanceLimitChanged {
      old_limit: Balance,
      new_limit: Balance,
    },
    AccountItemUpdated {
      account: T::AccountId,
      manual: bool,
      base_allocation: Balance,
      base_refund: Balance,
      boost_refund: Balance,
    },
    OwnershipTransferred {
      previous_owner: T::AccountId,
      new_owner: T::AccountId,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    NotInitialized,
    AlreadyInitialized,
    NewOwnerNotZeroAddress,
    DepositVerifierNotZeroAddress,
    ColdWalletNotZeroAddress,
    BaseTokenNotExist,
    BoostTokenNotExist,
    BoostTokenSameAsBase,
    GoalNotZero,
    StartDateMustBeGreaterThanCurrentTime,
    CloseDateMustBeGreaterThanCurrentTime,
    CloseDateMustBeGreaterThanStartDate,
    LinearBoostFactorMustBeMoreOne,
    /// Sale window not open yet, or settlement attempted before close
    TooEarly,
    TooLate,
    /// Deposit authorization expired
    TimeoutBlocker,
    AmountNotZero,
    BoostExchangeRateNotZero,
    BoostDisabled,
    /// A boosted account may only make boosted deposits
    UserHasBoostedDeposit,
    InvalidNonce,
    UsedTransactionId,
    InvalidSignature,
    UserMustHaveFunds,
    BalanceLimitExceeded,
    TooManyAccounts,
    ContractForExternalRefund,
    ContractHasNoEnoughBaseTokensForRefund,
    ContractHasNoEnoughBoostTokensForRefund,
    AllUsersProcessedRefund,
    AllUsersProcessedBaseSwapped,
    NotAllUsersProcessedBaseSwapped,
    BatchSizeZero,
    UnreachedGoal,
    AlreadyWithdrewBaseGoal,
    AlreadyWithdrewBaseSwappedAmount,
    NotWithdrawBaseGoal,
    NotRefunded,
    NothingToClaim,
    /// Manual allocation plus refund larger than the account's deposit
    ManualAllocationExceedsDeposit,
    OwnableUnauthorizedAccount,
    NonExistAccountItem,
    ArrayLengthsNotEqual,
    ArithmeticOverflow,
  }

  #[pallet::hooks]
  impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
    fn integrity_test() {
      assert!(T::MaxAccounts::get() > 0, "MaxAccounts must be positive");
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Configure the sale and set its owner. Allowed once.
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::initialize())]
    pub fn initialize(
      origin: OriginFor<T>,
      owner: T::AccountId,
      config: SaleConfigOf<T>,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;
      ensure!(!Sale::<T>::exists(), Error::<T>::AlreadyInitialized);
      Self::validate_sale(&owner, &config)?;

      Owner::<T>::put(&owner);
      Sale::<T>::put(&config);

      log::info!(
        target: LOG_TARGET,
        "sale initialized: goal {} window {}..{}",
        config.base_goal,
        config.start_date,
        config.close_date
      );
      Self::deposit_event(Event::SaleInitialized {
        owner,
        base_asset: config.base_asset,
        boost_asset: config.boost_asset,
        base_goal: config.base_goal,
        start_date: config.start_date,
        close_date: config.close_date,
      });
      Ok(())
    }

    /// Deposit base tokens under a verifier-signed authorization.
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::deposit())]
    pub fn deposit(
      origin: OriginFor<T>,
      params: DepositParamsOf<T>,
      signature: T::OffchainSignature,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      let sale = Self::sale_config()?;

      let now = Self::now();
      ensure!(now >= sale.start_date, Error::<T>::TooEarly);
      ensure!(now < sale.close_date, Error::<T>::TooLate);
      ensure!(now <= params.timestamp_limit, Error::<T>::TimeoutBlocker);
      ensure!(!params.base_amount.is_zero(), Error::<T>::AmountNotZero);
      if params.boost {
        ensure!(
          !params.boost_exchange_rate.is_zero(),
          Error::<T>::BoostExchangeRateNotZero
        );
        ensure!(sale.boost_enabled(), Error::<T>::BoostDisabled);
      }

      let existing = Accounts::<T>::get(&who);
      let is_new = existing.is_none();
      let mut item = existing.unwrap_or_default();
      ensure!(!item.boosted || params.boost, Error::<T>::UserHasBoostedDeposit);
      ensure!(params.nonce == item.nonce, Error::<T>::InvalidNonce);
      ensure!(
        !TransactionItems::<T>::contains_key(&params.transaction_id),
        Error::<T>::UsedTransactionId
      );

      let message = Self::deposit_message(&who, &params);
      ensure!(
        signature.verify(&message[..], &sale.deposit_verifier),
        Error::<T>::InvalidSignature
      );

      let spendable = T::Assets::reducible_balance(
        sale.base_asset,
        &who,
        Preservation::Expendable,
        Fortitude::Polite,
      );
      ensure!(spendable >= params.base_amount, Error::<T>::UserMustHaveFunds);

      let mut ledger = Ledger::<T>::get();
      let total = ledger
        .total_base_deposited
        .checked_add(params.base_amount)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      ensure!(total <= sale.balance_limit, Error::<T>::BalanceLimitExceeded);

      if is_new {
        let index = AccountCount::<T>::get();
        ensure!(index < T::MaxAccounts::get(), Error::<T>::TooManyAccounts);
        item.index = index;
        AccountIndex::<T>::insert(index, &who);
        AccountCount::<T>::put(index.saturating_add(1));
      }

      let boost_deposit = if params.boost {
        Self::credit_boost(&sale, &mut ledger, &mut item, &params)?
      } else {
        ledger.total_base_non_boost_deposited = ledger
          .total_base_non_boost_deposited
          .checked_add(params.base_amount)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        0
      };

      item.base_deposited = item
        .base_deposited
        .checked_add(params.base_amount)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      item.nonce = item.nonce.saturating_add(1);
      ledger.total_base_deposited = total;

      TransactionItems::<T>::insert(
        &params.transaction_id,
        TransactionItem {
          account: who.clone(),
          amount: params.base_amount,
        },
      );
      Accounts::<T>::insert(&who, &item);
      Ledger::<T>::put(&ledger);

      T::Assets::transfer(
        sale.base_asset,
        &who,
        &Self::account_id(),
        params.base_amount,
        Preservation::Expendable,
      )?;

      Self::deposit_event(Event::Deposited {
        account: who,
        boost: params.boost,
        base_amount: params.base_amount,
        boost_deposit,
      });
      Ok(())
    }

    /// Pay out the next `batch_size` accounts' outstanding refunds.
    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::refund(*batch_size))]
    pub fn refund(origin: OriginFor<T>, batch_size: u32) -> DispatchResultWithPostInfo {
      ensure_signed(origin)?;
      ensure!(batch_size > 0, Error::<T>::BatchSizeZero);
      let processed = Self::do_refund(batch_size)?;
      Ok(Some(T::WeightInfo::refund(processed)).into())
    }

    /// Pay out every remaining account's refund.
    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::refund(T::MaxAccounts::get()))]
    pub fn refund_all(origin: OriginFor<T>) -> DispatchResultWithPostInfo {
      ensure_signed(origin)?;
      let processed = Self::do_refund(T::MaxAccounts::get())?;
      Ok(Some(T::WeightInfo::refund(processed)).into())
    }

    /// Accumulate the base swapped by the next `batch_size` boosted accounts.
    #[pallet::call_index(4)]
    #[pallet::weight(T::WeightInfo::calculate_base_swapped_amount(*batch_size))]
    pub fn calculate_base_swapped_amount(
      origin: OriginFor<T>,
      batch_size: u32,
    ) -> DispatchResultWithPostInfo {
      ensure_signed(origin)?;
      ensure!(batch_size > 0, Error::<T>::BatchSizeZero);
      let processed = Self::do_calculate_base_swapped(batch_size)?;
      Ok(Some(T::WeightInfo::calculate_base_swapped_amount(processed)).into())
    }

    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::calculate_base_swapped_amount(T::MaxAccounts::get()))]
    pub fn calculate_base_swapped_amount_all(origin: OriginFor<T>) -> DispatchResultWithPostInfo {
      ensure_signed(origin)?;
      let processed = Self::do_calculate_base_swapped(T::MaxAccounts::get())?;
      Ok(Some(T::WeightInfo::calculate_base_swapped_amount(processed)).into())
    }

    /// Send the base goal to the cold wallet.
    ///
    /// Allocation truncation can leave the sale account a few units short of the
    /// goal; the held amount is sent in that case. Deferred refunds stay behind.
    #[pallet::call_index(6)]
    #[pallet::weight(T::WeightInfo::withdraw_base_goal())]
    pub fn withdraw_base_goal(origin: OriginFor<T>) -> DispatchResult {
      Self::ensure_owner(origin)?;
      let sale = Self::sale_config()?;
      ensure!(Self::now() >= sale.close_date, Error::<T>::TooEarly);

      let mut ledger = Ledger::<T>::get();
      ensure!(
        ledger.total_base_deposited >= sale.base_goal,
        Error::<T>::UnreachedGoal
      );
      ensure!(!ledger.withdrew_base_goal, Error::<T>::AlreadyWithdrewBaseGoal);
      if !sale.external_refund {
        ensure!(Self::refunds_complete(&ledger), Error::<T>::NotRefunded);
      }

      let (available, preservation) =
        Self::payable(sale.base_asset, ledger.pending_base_refund);
      let amount = sale.base_goal.min(available);
      ledger.withdrew_base_goal = true;
      ledger.total_base_withdrew = ledger.total_base_withdrew.saturating_add(amount);
      Ledger::<T>::put(&ledger);

      if !amount.is_zero() {
        T::Assets::transfer(
          sale.base_asset,
          &Self::account_id(),
          &sale.cold_wallet,
          amount,
          preservation,
        )?;
      }

      Self::deposit_event(Event::BaseGoalWithdrawn {
        to: sale.cold_wallet,
        amount,
      });
      Ok(())
    }

    /// Send the base swapped by boosted accounts to the cold wallet.
    ///
    /// Pays at most what the sale account still holds; truncation dust of the
    /// goal withdrawal is taken out of this amount.
    #[pallet::call_index(7)]
    #[pallet::weight(T::WeightInfo::withdraw_base_swapped_amount())]
    pub fn withdraw_base_swapped_amount(origin: OriginFor<T>) -> DispatchResult {
      Self::ensure_owner(origin)?;
      let sale = Self::sale_config()?;

      let mut ledger = Ledger::<T>::get();
      ensure!(
        Self::base_swapped_complete(&ledger),
        Error::<T>::NotAllUsersProcessedBaseSwapped
      );
      ensure!(ledger.withdrew_base_goal, Error::<T>::NotWithdrawBaseGoal);
      ensure!(
        !ledger.withdrew_base_swapped_amount,
        Error::<T>::AlreadyWithdrewBaseSwappedAmount
      );

      let (available, preservation) =
        Self::payable(sale.base_asset, ledger.pending_base_refund);
      let amount = ledger.total_base_swapped_amount.min(available);
      ledger.withdrew_base_swapped_amount = true;
      ledger.total_base_withdrew = ledger.total_base_withdrew.saturating_add(amount);
      Ledger::<T>::put(&ledger);

      if !amount.is_zero() {
        T::Assets::transfer(
          sale.base_asset,
          &Self::account_id(),
          &sale.cold_wallet,
          amount,
          preservation,
        )?;
      }

      Self::deposit_event(Event::BaseSwappedAmountWithdrawn {
        to: sale.cold_wallet,
        amount,
      });
      Ok(())
    }

    /// Sweep everything the sale no longer owes to the cold wallet.
    #[pallet::call_index(8)]
    #[pallet::weight(T::WeightInfo::withdraw_excess_tokens())]
    pub fn withdraw_excess_tokens(origin: OriginFor<T>) -> DispatchResult {
      Self::ensure_owner(origin)?;
      let sale = Self::sale_config()?;
      let ledger = Ledger::<T>::get();
      ensure!(ledger.withdrew_base_goal, Error::<T>::NotWithdrawBaseGoal);
      if !sale.external_refund {
        ensure!(Self::refunds_complete(&ledger), Error::<T>::NotRefunded);
      }
      if !ledger.total_base_boost_deposited.is_zero() {
        ensure!(
          Self::base_swapped_complete(&ledger),
          Error::<T>::NotAllUsersProcessedBaseSwapped
        );
      }

      let pallet_account = Self::account_id();
      let unwithdrawn_swapped = if ledger.withdrew_base_swapped_amount {
        0
      } else {
        ledger.total_base_swapped_amount
      };
      let (base_amount, base_preservation) = Self::payable(
        sale.base_asset,
        unwithdrawn_swapped.saturating_add(ledger.pending_base_refund),
      );
      let (boost_amount, boost_preservation) = sale
        .boost_asset
        .map(|asset| Self::payable(asset, ledger.pending_boost_refund))
        .unwrap_or((0, Preservation::Expendable));

      if !base_amount.is_zero() {
        T::Assets::transfer(
          sale.base_asset,
          &pallet_account,
          &sale.cold_wallet,
          base_amount,
          base_preservation,
        )?;
      }
      if let Some(boost_asset) = sale.boost_asset.filter(|_| !boost_amount.is_zero()) {
        T::Assets::transfer(
          boost_asset,
          &pallet_account,
          &sale.cold_wallet,
          boost_amount,
          boost_preservation,
        )?;
      }

      Self::deposit_event(Event::ExcessTokensWithdrawn {
        to: sale.cold_wallet,
        base_amount,
        boost_amount,
      });
      Ok(())
    }

    /// Move any asset held by the sale account. Owner escape hatch, no ledger checks.
    #[pallet::call_index(9)]
    #[pallet::weight(T::WeightInfo::force_withdraw())]
    pub fn force_withdraw(
      origin: OriginFor<T>,
      asset: AssetId,
      to: T::AccountId,
      amount: Balance,
    ) -> DispatchResult {
      Self::ensure_owner(origin)?;
      T::Assets::transfer(
        asset,
        &Self::account_id(),
        &to,
        amount,
        Preservation::Expendable,
      )?;
      log::warn!(target: LOG_TARGET, "force withdrawal of {} units of asset {}", amount, asset);
      Self::deposit_event(Event::ForceWithdrawn { asset, to, amount });
      Ok(())
    }

    #[pallet::call_index(10)]
    #[pallet::weight(T::WeightInfo::change_base_goal())]
    pub fn change_base_goal(origin: OriginFor<T>, new_goal: Balance) -> DispatchResult {
      Self::ensure_owner(origin)?;
      let mut sale = Self::sale_config()?;
      ensure!(!new_goal.is_zero(), Error::<T>::GoalNotZero);
      ensure!(Self::now() < sale.close_date, Error::<T>::TooLate);

      let old_goal = core::mem::replace(&mut sale.base_goal, new_goal);
      Sale::<T>::put(&sale);
      Self::deposit_event(Event::BaseGoalChanged { old_goal, new_goal });
      Ok(())
    }

    #[pallet::call_index(11)]
    #[pallet::weight(T::WeightInfo::change_balance_limit())]
    pub fn change_balance_limit(origin: OriginFor<T>, new_limit: Balance) -> DispatchResult {
      Self::ensure_owner(origin)?;
      let mut sale = Self::sale_config()?;
      let old_limit = core::mem::replace(&mut sale.balance_limit, new_limit);
      Sale::<T>::put(&sale);
      Self::deposit_event(Event::BalanceLimitChanged {
        old_limit,
        new_limit,
      });
      Ok(())
    }

    /// Pin one account to manual settlement numbers, or hand it back to the engine.
    #[pallet::call_index(12)]
    #[pallet::weight(T::WeightInfo::update_account_items(1))]
    pub fn update_account_item(
      origin: OriginFor<T>,
      account: T::AccountId,
      update: AccountItemUpdate,
    ) -> DispatchResult {
      let admin = Self::ensure_owner(origin)?;
      Self::do_update_account_items(admin, alloc::vec![(account, update)])
    }

    #[pallet::call_index(13)]
    #[pallet::weight(T::WeightInfo::update_account_items(accounts.len() as u32))]
    pub fn update_account_items(
      origin: OriginFor<T>,
      accounts: BoundedVec<T::AccountId, T::MaxAccounts>,
      updates: BoundedVec<AccountItemUpdate, T::MaxAccounts>,
    ) -> DispatchResult {
      let admin = Self::ensure_owner(origin)?;
      ensure!(
        accounts.len() == updates.len(),
        Error::<T>::ArrayLengthsNotEqual
      );
      Self::do_update_account_items(admin, accounts.into_iter().zip(updates).collect())
    }

    #[pallet::call_index(14)]
    #[pallet::weight(T::WeightInfo::transfer_ownership())]
    pub fn transfer_ownership(origin: OriginFor<T>, new_owner: T::AccountId) -> DispatchResult {
      let previous_owner = Self::ensure_owner(origin)?;
      ensure!(
        !Self::is_zero_account(&new_owner),
        Error::<T>::NewOwnerNotZeroAddress
      );
      Owner::<T>::put(&new_owner);
      Self::deposit_event(Event::OwnershipTransferred {
        previous_owner,
        new_owner,
      });
      Ok(())
    }

    /// Collect a refund the batch left behind because the account could not
    /// receive it at the time.
    #[pallet::call_index(15)]
    #[pallet::weight(T::WeightInfo::claim_refund())]
    pub fn claim_refund(origin: OriginFor<T>) -> DispatchResult {
      let who = ensure_signed(origin)?;
      let sale = Self::sale_config()?;
      ensure!(!sale.external_refund, Error::<T>::ContractForExternalRefund);
      let mut item = Accounts::<T>::get(&who).ok_or(Error::<T>::NonExistAccountItem)?;
      let mut ledger = Ledger::<T>::get();
      ensure!(
        item.index < ledger.processed_refund_index,
        Error::<T>::NotRefunded
      );

      let settlement = Self::settlement_context(&sale, &ledger)
        .settle(&item)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      let base_due = settlement.base_refund.saturating_sub(item.base_refunded);
      let boost_due = settlement.boost_refund.saturating_sub(item.boost_refunded);
      ensure!(
        !base_due.is_zero() || !boost_due.is_zero(),
        Error::<T>::NothingToClaim
      );

      let pallet_account = Self::account_id();
      if !base_due.is_zero() {
        ensure!(
          T::Assets::balance(sale.base_asset, &pallet_account) >= base_due,
          Error::<T>::ContractHasNoEnoughBaseTokensForRefund
        );
        T::Assets::can_deposit(sale.base_asset, &who, base_due, Provenance::Extant)
          .into_result()?;
      }
      let boost_asset = match sale.boost_asset {
        Some(asset) if !boost_due.is_zero() => {
          ensure!(
            T::Assets::balance(asset, &pallet_account) >= boost_due,
            Error::<T>::ContractHasNoEnoughBoostTokensForRefund
          );
          T::Assets::can_deposit(asset, &who, boost_due, Provenance::Extant).into_result()?;
          Some(asset)
        },
        None if !boost_due.is_zero() => {
          return Err(Error::<T>::ContractHasNoEnoughBoostTokensForRefund.into());
        },
        _ => None,
      };

      item.base_refunded = item.base_refunded.saturating_add(base_due);
      item.boost_refunded = item.boost_refunded.saturating_add(boost_due);
      ledger.total_base_refunded = ledger.total_base_refunded.saturating_add(base_due);
      ledger.total_boost_refunded = ledger.total_boost_refunded.saturating_add(boost_due);
      ledger.pending_base_refund = ledger.pending_base_refund.saturating_sub(base_due);
      ledger.pending_boost_refund = ledger.pending_boost_refund.saturating_sub(boost_due);
      Accounts::<T>::insert(&who, &item);
      Ledger::<T>::put(&ledger);

      if !base_due.is_zero() {
        T::Assets::transfer(
          sale.base_asset,
          &pallet_account,
          &who,
          base_due,
          Preservation::Expendable,
        )?;
      }
      if let Some(asset) = boost_asset {
        T::Assets::transfer(asset, &pallet_account, &who, boost_due, Preservation::Expendable)?;
      }

      Self::deposit_event(Event::Refunded {
        account: who,
        base_amount: base_due,
        boost_amount: boost_due,
      });
      Ok(())
    }
  }

  impl<T: Config> Pallet<T> {
    /// Account holding deposits until they are refunded or withdrawn
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    pub fn now() -> Moment {
      T::UnixTime::now().as_secs()
    }

    /// All-zero account, rejected wherever an owner or a payout target is set
    pub fn is_zero_account(who: &T::AccountId) -> bool {
      T::AccountId::decode(&mut TrailingZeroInput::zeroes())
        .map(|zero| zero == *who)
        .unwrap_or(false)
    }

    /// Bytes the deposit verifier signs for `who`
    pub fn deposit_message(who: &T::AccountId, params: &DepositParamsOf<T>) -> Vec<u8> {
      let mut message = DEPOSIT_CONTEXT.to_vec();
      (who, params).encode_to(&mut message);
      message
    }

    pub fn is_deposit_ready() -> bool {
      Sale::<T>::get()
        .map(|sale| {
          let now = Self::now();
          now >= sale.start_date && now < sale.close_date
        })
        .unwrap_or(false)
    }

    pub fn is_reached_base_goal() -> bool {
      Sale::<T>::get()
        .map(|sale| Ledger::<T>::get().total_base_deposited >= sale.base_goal)
        .unwrap_or(false)
    }

    /// Room left under the balance limit
    pub fn calculate_remain_deposit() -> Balance {
      Sale::<T>::get()
        .map(|sale| {
          sale
            .balance_limit
            .saturating_sub(Ledger::<T>::get().total_base_deposited)
        })
        .unwrap_or_default()
    }

    pub fn calculate_overfund_amount() -> Balance {
      Sale::<T>::get()
        .map(|sale| {
          Ledger::<T>::get()
            .total_base_deposited
            .saturating_sub(sale.base_goal)
        })
        .unwrap_or_default()
    }

    pub fn get_account_deposit_nonce(who: &T::AccountId) -> u32 {
      Accounts::<T>::get(who).map(|item| item.nonce).unwrap_or_default()
    }

    pub fn fetch_transaction_item(
      transaction_id: &TransactionIdOf<T>,
    ) -> Option<TransactionItem<T::AccountId>> {
      TransactionItems::<T>::get(transaction_id)
    }

    pub fn get_processed_refund_index() -> u32 {
      Ledger::<T>::get().processed_refund_index
    }

    pub fn get_processed_base_swapped_index() -> u32 {
      Ledger::<T>::get().processed_base_swapped_index
    }

    /// Settlement numbers of `who` against the current totals
    pub fn settlement_of(who: &T::AccountId) -> Result<Settlement, DispatchError> {
      let sale = Self::sale_config()?;
      let item = Accounts::<T>::get(who).ok_or(Error::<T>::NonExistAccountItem)?;
      let context = Self::settlement_context(&sale, &Ledger::<T>::get());
      context
        .settle(&item)
        .ok_or_else(|| Error::<T>::ArithmeticOverflow.into())
    }

    pub fn calculate_account_base_allocation(who: &T::AccountId) -> Balance {
      Self::settlement_of(who)
        .map(|settlement| settlement.base_allocation)
        .unwrap_or_default()
    }

    pub fn calculate_account_base_refund(who: &T::AccountId) -> Balance {
      Self::settlement_of(who)
        .map(|settlement| settlement.base_refund)
        .unwrap_or_default()
    }

    pub fn calculate_account_boost_refund(who: &T::AccountId) -> Balance {
      Self::settlement_of(who)
        .map(|settlement| settlement.boost_refund)
        .unwrap_or_default()
    }

    pub fn fetch_account_info(who: &T::AccountId) -> Option<AccountInfo> {
      let item = Accounts::<T>::get(who)?;
      let settlement = Self::settlement_of(who).ok()?;
      Some(AccountInfo::new(&item, settlement))
    }

    /// Accounts in deposit order
    pub fn fetch_accounts() -> Vec<(T::AccountId, AccountItem)> {
      (0..AccountCount::<T>::get())
        .filter_map(|index| AccountIndex::<T>::get(index))
        .filter_map(|who| Accounts::<T>::get(&who).map(|item| (who, item)))
        .collect()
    }

    pub fn get_account_item_update_logs() -> Vec<UpdateLogEntry<T::AccountId>> {
      (0..UpdateLogCount::<T>::get())
        .filter_map(|index| UpdateLogs::<T>::get(index))
        .collect()
    }

    /// Base held beyond what the ledger accounts for
    pub fn calculate_accident_amount() -> Balance {
      let Some(sale) = Sale::<T>::get() else {
        return 0;
      };
      let ledger = Ledger::<T>::get();
      let expected = ledger
        .total_base_deposited
        .saturating_sub(ledger.total_base_refunded)
        .saturating_sub(ledger.total_base_withdrew);
      T::Assets::balance(sale.base_asset, &Self::account_id()).saturating_sub(expected)
    }

    /// Boost still owed to boosted accounts
    pub fn calculate_required_boost_amount() -> Balance {
      let Some(sale) = Sale::<T>::get() else {
        return 0;
      };
      let context = Self::settlement_context(&sale, &Ledger::<T>::get());
      Self::fetch_accounts()
        .iter()
        .filter_map(|(_, item)| {
          context
            .settle(item)
            .map(|settlement| settlement.boost_refund.saturating_sub(item.boost_refunded))
        })
        .fold(0, |acc: Balance, due| acc.saturating_add(due))
    }

    pub fn calculate_excess_boost_amount() -> Balance {
      let Some(boost_asset) = Sale::<T>::get().and_then(|sale| sale.boost_asset) else {
        return 0;
      };
      T::Assets::balance(boost_asset, &Self::account_id())
        .saturating_sub(Self::calculate_required_boost_amount())
    }

    pub fn sale_phase() -> Option<SalePhase> {
      let sale = Sale::<T>::get()?;
      let now = Self::now();
      if now < sale.start_date {
        return Some(SalePhase::NotStarted);
      }
      if now < sale.close_date {
        return Some(SalePhase::Open);
      }
      let ledger = Ledger::<T>::get();
      let phase = if ledger.withdrew_base_swapped_amount {
        SalePhase::SwappedWithdrawn
      } else if ledger.withdrew_base_goal {
        SalePhase::GoalWithdrawn
      } else if sale.external_refund || Self::refunds_complete(&ledger) {
        SalePhase::Refunded
      } else if ledger.processed_refund_index > 0 {
        SalePhase::Refunding
      } else {
        SalePhase::Closed
      };
      Some(phase)
    }

    fn sale_config() -> Result<SaleConfigOf<T>, DispatchError> {
      Sale::<T>::get().ok_or_else(|| Error::<T>::NotInitialized.into())
    }

    fn ensure_owner(origin: OriginFor<T>) -> Result<T::AccountId, DispatchError> {
      let who = ensure_signed(origin)?;
      let owner = Owner::<T>::get().ok_or(Error::<T>::NotInitialized)?;
      ensure!(who == owner, Error::<T>::OwnableUnauthorizedAccount);
      Ok(who)
    }

    fn validate_sale(owner: &T::AccountId, config: &SaleConfigOf<T>) -> DispatchResult {
      ensure!(
        !Self::is_zero_account(owner),
        Error::<T>::NewOwnerNotZeroAddress
      );
      ensure!(
        !Self::is_zero_account(&config.deposit_verifier),
        Error::<T>::DepositVerifierNotZeroAddress
      );
      ensure!(
        !Self::is_zero_account(&config.cold_wallet),
        Error::<T>::ColdWalletNotZeroAddress
      );
      ensure!(
        T::Assets::asset_exists(config.base_asset),
        Error::<T>::BaseTokenNotExist
      );
      if let Some(boost_asset) = config.boost_asset {
        ensure!(
          boost_asset != config.base_asset,
          Error::<T>::BoostTokenSameAsBase
        );
        ensure!(
          T::Assets::asset_exists(boost_asset),
          Error::<T>::BoostTokenNotExist
        );
      }
      ensure!(!config.base_goal.is_zero(), Error::<T>::GoalNotZero);

      let now = Self::now();
      ensure!(
        config.start_date > now,
        Error::<T>::StartDateMustBeGreaterThanCurrentTime
      );
      ensure!(
        config.close_date > now,
        Error::<T>::CloseDateMustBeGreaterThanCurrentTime
      );
      ensure!(
        config.close_date > config.start_date,
        Error::<T>::CloseDateMustBeGreaterThanStartDate
      );
      if let AllocationMode::Linear { boost_factor } = config.allocation {
        ensure!(
          boost_factor >= FixedU128::one(),
          Error::<T>::LinearBoostFactorMustBeMoreOne
        );
      }
      Ok(())
    }

    /// Books a boosted deposit and returns the boost-token amount credited.
    ///
    /// An account's first boosted deposit carries its earlier non-boosted
    /// deposits into the boosted pool at the same rate.
    fn credit_boost(
      sale: &SaleConfigOf<T>,
      ledger: &mut SaleLedger,
      item: &mut AccountItem,
      params: &DepositParamsOf<T>,
    ) -> Result<Balance, DispatchError> {
      let (prior_weight, converted) = if item.boosted {
        (item.base_deposited, params.base_amount)
      } else {
        ledger.total_base_non_boost_deposited = ledger
          .total_base_non_boost_deposited
          .saturating_sub(item.base_deposited);
        let carried = item
          .base_deposited
          .checked_add(params.base_amount)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        (0, carried)
      };

      let (base_decimals, boost_decimals) = Self::decimals(sale);
      let credited = allocation::base_to_boost(
        converted,
        params.boost_exchange_rate,
        base_decimals,
        boost_decimals,
      )
      .ok_or(Error::<T>::ArithmeticOverflow)?;

      item.boost_average_rate = allocation::weighted_average_rate(
        item.boost_average_rate,
        prior_weight,
        params.boost_exchange_rate,
        converted,
      );
      item.boost_deposit = item
        .boost_deposit
        .checked_add(credited)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      item.boosted = true;

      ledger.total_base_boost_deposited = ledger
        .total_base_boost_deposited
        .checked_add(converted)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      ledger.total_boost_deposited = ledger
        .total_boost_deposited
        .checked_add(credited)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      Ok(credited)
    }

    fn decimals(sale: &SaleConfigOf<T>) -> (u8, u8) {
      let base = <T::Assets as MetadataInspect<T::AccountId>>::decimals(sale.base_asset);
      let boost = sale
        .boost_asset
        .map(<T::Assets as MetadataInspect<T::AccountId>>::decimals)
        .unwrap_or(base);
      (base, boost)
    }

    fn settlement_context(sale: &SaleConfigOf<T>, ledger: &SaleLedger) -> SettlementContext {
      let (base_decimals, boost_decimals) = Self::decimals(sale);
      SettlementContext {
        mode: sale.allocation,
        goal: sale.base_goal,
        totals: PoolTotals {
          total: ledger.total_base_deposited,
          non_boost: ledger.total_base_non_boost_deposited,
          boost: ledger.total_base_boost_deposited,
        },
        failed: Self::now() >= sale.close_date && ledger.total_base_deposited < sale.base_goal,
        base_decimals,
        boost_decimals,
      }
    }

    fn refunds_complete(ledger: &SaleLedger) -> bool {
      ledger.processed_refund_index >= AccountCount::<T>::get()
    }

    fn base_swapped_complete(ledger: &SaleLedger) -> bool {
      ledger.processed_base_swapped_index >= AccountCount::<T>::get()
    }

    /// Next batch `[cursor, cursor + batch_size)` clamped to the account count
    fn next_batch(cursor: u32, batch_size: u32) -> Vec<(T::AccountId, AccountItem)> {
      let end = cursor
        .saturating_add(batch_size)
        .min(AccountCount::<T>::get());
      (cursor..end)
        .filter_map(|index| AccountIndex::<T>::get(index))
        .filter_map(|who| Accounts::<T>::get(&who).map(|item| (who, item)))
        .collect()
    }

    fn can_receive(asset: AssetId, who: &T::AccountId, amount: Balance) -> bool {
      amount.is_zero()
        || T::Assets::can_deposit(asset, who, amount, Provenance::Extant)
          .into_result()
          .is_ok()
    }

    /// What the sale account can pay out of `asset` while keeping `reserved` behind.
    ///
    /// A non-zero reserve also keeps the account at or above the asset's minimum
    /// balance, so the reserve is never reaped as dust.
    fn payable(asset: AssetId, reserved: Balance) -> (Balance, Preservation) {
      let held = T::Assets::balance(asset, &Self::account_id());
      if reserved.is_zero() {
        return (held, Preservation::Expendable);
      }
      let keep = reserved.max(T::Assets::minimum_balance(asset));
      (held.saturating_sub(keep), Preservation::Preserve)
    }

    pub(crate) fn do_refund(batch_size: u32) -> Result<u32, DispatchError> {
      let sale = Self::sale_config()?;
      ensure!(Self::now() >= sale.close_date, Error::<T>::TooEarly);
      ensure!(!sale.external_refund, Error::<T>::ContractForExternalRefund);

      let mut ledger = Ledger::<T>::get();
      ensure!(
        !Self::refunds_complete(&ledger),
        Error::<T>::AllUsersProcessedRefund
      );

      let context = Self::settlement_context(&sale, &ledger);
      let batch = Self::next_batch(ledger.processed_refund_index, batch_size);
      let processed = batch.len() as u32;

      let mut payouts = Vec::with_capacity(batch.len());
      let (mut base_total, mut boost_total): (Balance, Balance) = (0, 0);
      let (mut base_deferred, mut boost_deferred): (Balance, Balance) = (0, 0);
      for (who, mut item) in batch {
        let settlement = context
          .settle(&item)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        let base_due = settlement.base_refund.saturating_sub(item.base_refunded);
        let boost_due = settlement.boost_refund.saturating_sub(item.boost_refunded);

        // Payouts the account cannot hold yet (below the asset minimum) wait for a claim
        let defer_base = !Self::can_receive(sale.base_asset, &who, base_due);
        let defer_boost = sale
          .boost_asset
          .is_some_and(|asset| !Self::can_receive(asset, &who, boost_due));
        let (base_paid, base_left) = if defer_base { (0, base_due) } else { (base_due, 0) };
        let (boost_paid, boost_left) = if defer_boost { (0, boost_due) } else { (boost_due, 0) };

        item.base_refunded = item.base_refunded.saturating_add(base_paid);
        item.boost_refunded = item.boost_refunded.saturating_add(boost_paid);
        base_total = base_total
          .checked_add(base_paid)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        boost_total = boost_total
          .checked_add(boost_paid)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        base_deferred = base_deferred.saturating_add(base_left);
        boost_deferred = boost_deferred.saturating_add(boost_left);
        payouts.push((who, item, (base_paid, boost_paid), (base_left, boost_left)));
      }

      let pallet_account = Self::account_id();
      ensure!(
        T::Assets::balance(sale.base_asset, &pallet_account) >= base_total,
        Error::<T>::ContractHasNoEnoughBaseTokensForRefund
      );
      let boost_asset = match sale.boost_asset {
        Some(asset) if !boost_total.is_zero() => {
          ensure!(
            T::Assets::balance(asset, &pallet_account) >= boost_total,
            Error::<T>::ContractHasNoEnoughBoostTokensForRefund
          );
          Some(asset)
        },
        None if !boost_total.is_zero() => {
          return Err(Error::<T>::ContractHasNoEnoughBoostTokensForRefund.into());
        },
        _ => None,
      };

      ledger.total_base_refunded = ledger.total_base_refunded.saturating_add(base_total);
      ledger.total_boost_refunded = ledger.total_boost_refunded.saturating_add(boost_total);
      ledger.pending_base_refund = ledger.pending_base_refund.saturating_add(base_deferred);
      ledger.pending_boost_refund = ledger.pending_boost_refund.saturating_add(boost_deferred);
      ledger.processed_refund_index = ledger.processed_refund_index.saturating_add(processed);
      Ledger::<T>::put(&ledger);
      for (who, item, _, _) in &payouts {
        Accounts::<T>::insert(who, item);
      }

      for (who, _, (base_paid, boost_paid), (base_left, boost_left)) in payouts {
        if !base_paid.is_zero() {
          T::Assets::transfer(
            sale.base_asset,
            &pallet_account,
            &who,
            base_paid,
            Preservation::Expendable,
          )?;
        }
        if let Some(asset) = boost_asset.filter(|_| !boost_paid.is_zero()) {
          T::Assets::transfer(asset, &pallet_account, &who, boost_paid, Preservation::Expendable)?;
        }
        if !base_left.is_zero() || !boost_left.is_zero() {
          log::warn!(
            target: LOG_TARGET,
            "refund of {:?} deferred: base {} boost {}",
            who,
            base_left,
            boost_left
          );
          Self::deposit_event(Event::RefundDeferred {
            account: who.clone(),
            base_amount: base_left,
            boost_amount: boost_left,
          });
        }
        Self::deposit_event(Event::Refunded {
          account: who,
          base_amount: base_paid,
          boost_amount: boost_paid,
        });
      }

      log::debug!(
        target: LOG_TARGET,
        "refunded {} accounts, cursor at {}: base {} boost {}",
        processed,
        ledger.processed_refund_index,
        base_total,
        boost_total
      );
      Ok(processed)
    }

    pub(crate) fn do_calculate_base_swapped(batch_size: u32) -> Result<u32, DispatchError> {
      let sale = Self::sale_config()?;
      ensure!(Self::now() >= sale.close_date, Error::<T>::TooEarly);

      let mut ledger = Ledger::<T>::get();
      ensure!(
        !Self::base_swapped_complete(&ledger),
        Error::<T>::AllUsersProcessedBaseSwapped
      );

      let context = Self::settlement_context(&sale, &ledger);
      let batch = Self::next_batch(ledger.processed_base_swapped_index, batch_size);
      let processed = batch.len() as u32;
      let mut batch_amount: Balance = 0;
      for (_, item) in &batch {
        let swapped = context
          .base_swapped(item)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
        batch_amount = batch_amount
          .checked_add(swapped)
          .ok_or(Error::<T>::ArithmeticOverflow)?;
      }

      ledger.total_base_swapped_amount = ledger
        .total_base_swapped_amount
        .checked_add(batch_amount)
        .ok_or(Error::<T>::ArithmeticOverflow)?;
      ledger.processed_base_swapped_index = ledger
        .processed_base_swapped_index
        .saturating_add(processed);
      Ledger::<T>::put(&ledger);

      log::debug!(
        target: LOG_TARGET,
        "base swapped batch of {}: {} (total {})",
        processed,
        batch_amount,
        ledger.total_base_swapped_amount
      );
      Self::deposit_event(Event::BaseSwappedAmountCalculated {
        processed,
        batch_amount,
        total_amount: ledger.total_base_swapped_amount,
      });
      Ok(processed)
    }

    fn do_update_account_items(
      admin: T::AccountId,
      updates: Vec<(T::AccountId, AccountItemUpdate)>,
    ) -> DispatchResult {
      let sale = Self::sale_config()?;
      let updated_count = updates.len() as u32;
      let items = updates
        .into_iter()
        .map(|(account, update)| -> Result<_, DispatchError> {
          let item = Accounts::<T>::get(&account).ok_or(Error::<T>::NonExistAccountItem)?;
          if update.manual {
            ensure!(
              update.boost_refund.is_zero() || sale.boost_enabled(),
              Error::<T>::BoostDisabled
            );
            let settled = update
              .base_allocation
              .checked_add(update.base_refund)
              .ok_or(Error::<T>::ArithmeticOverflow)?;
            ensure!(
              settled <= item.base_deposited,
              Error::<T>::ManualAllocationExceedsDeposit
            );
          }
          Ok((account, item, update))
        })
        .collect::<Result<Vec<_>, _>>()?;

      for (account, mut item, update) in items {
        item.allocation = update.into_source();
        Accounts::<T>::insert(&account, item);
        Self::deposit_event(Event::AccountItemUpdated {
          account,
          manual: update.manual,
          base_allocation: update.base_allocation,
          base_refund: update.base_refund,
          boost_refund: update.boost_refund,
        });
      }

      let log_index = UpdateLogCount::<T>::get();
      UpdateLogs::<T>::insert(
        log_index,
        UpdateLogEntry {
          admin,
          timestamp: Self::now(),
          updated_count,
        },
      );
      UpdateLogCount::<T>::put(log_index.saturating_add(1));
      Ok(())
    }
  }

  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    #[serde(skip)]
    pub _marker: core::marker::PhantomData<T>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
    }
  }
}
