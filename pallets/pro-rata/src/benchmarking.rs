extern crate alloc;

use crate::*;
use alloc::vec::Vec;
use codec::Encode;
use frame::deps::frame_benchmarking::{account, v2::*};
use frame::deps::frame_support::traits::{EnsureOrigin, Get};
use frame::deps::frame_system::RawOrigin;
use frame::deps::sp_runtime::FixedU128;
use frame::prelude::BoundedVec;
use polkadot_sdk::sp_io::hashing::blake2_256;

const SEED: u32 = 0;
const START: Moment = 2_000;
const CLOSE: Moment = 3_000;
const AMOUNT: Balance = 1_000_000_000_000;

fn sale_config<T: Config>() -> SaleConfigOf<T> {
  let (base_asset, boost_asset) = T::BenchmarkHelper::setup_assets();
  SaleConfig {
    deposit_verifier: T::BenchmarkHelper::verifier(),
    cold_wallet: account("cold", 0, SEED),
    base_asset,
    boost_asset: Some(boost_asset),
    base_goal: AMOUNT / 2,
    balance_limit: Balance::MAX,
    start_date: START,
    close_date: CLOSE,
    external_refund: false,
    allocation: AllocationMode::GoalPriority,
  }
}

fn initialized<T: Config>() -> (T::AccountId, SaleConfigOf<T>) {
  T::BenchmarkHelper::set_time(START - 1_000);
  let config = sale_config::<T>();
  let owner: T::AccountId = account("owner", 0, SEED);
  let origin = T::AdminOrigin::try_successful_origin().expect("admin origin available");
  Pallet::<T>::initialize(origin, owner.clone(), config.clone()).expect("sale initializes");
  (owner, config)
}

fn deposit_params<T: Config>(who: &T::AccountId, base_amount: Balance, boost: bool) -> DepositParamsOf<T> {
  let nonce = Pallet::<T>::get_account_deposit_nonce(who);
  let mut id = blake2_256(&(who, nonce).encode()).to_vec();
  id.truncate(T::MaxTransactionIdLen::get() as usize);
  DepositParams {
    base_amount,
    boost,
    boost_exchange_rate: FixedU128::from_u32(2),
    nonce,
    transaction_id: TransactionIdOf::<T>::try_from(id).expect("truncated to bound"),
    timestamp_limit: Moment::MAX,
  }
}

fn deposit_from<T: Config>(who: &T::AccountId, base_amount: Balance, boost: bool) {
  let params = deposit_params::<T>(who, base_amount, boost);
  let signature = T::BenchmarkHelper::sign(&Pallet::<T>::deposit_message(who, &params));
  Pallet::<T>::deposit(RawOrigin::Signed(who.clone()).into(), params, signature)
    .expect("deposit succeeds");
}

/// `n` funded depositors, every odd one boosted
fn depositors<T: Config>(config: &SaleConfigOf<T>, n: u32) -> Vec<T::AccountId> {
  T::BenchmarkHelper::set_time(START);
  (0..n)
    .map(|i| {
      let who: T::AccountId = account("depositor", i, SEED);
      T::BenchmarkHelper::fund(config.base_asset, &who, AMOUNT * 2);
      deposit_from::<T>(&who, AMOUNT, i % 2 == 1);
      who
    })
    .collect()
}

fn close<T: Config>() {
  T::BenchmarkHelper::set_time(CLOSE);
}

fn fund_boost_refunds<T: Config>(config: &SaleConfigOf<T>) {
  let required = Pallet::<T>::calculate_required_boost_amount();
  if let Some(boost_asset) = config.boost_asset {
    T::BenchmarkHelper::fund(
      boost_asset,
      &Pallet::<T>::account_id(),
      required.saturating_add(AMOUNT),
    );
  }
}

/// Closed sale with refunds paid and the swapped amount computed
fn settled<T: Config>(n: u32) -> (T::AccountId, SaleConfigOf<T>) {
  let (owner, config) = initialized::<T>();
  depositors::<T>(&config, n);
  close::<T>();
  fund_boost_refunds::<T>(&config);
  Pallet::<T>::do_refund(n).expect("refund batch");
  Pallet::<T>::do_calculate_base_swapped(n).expect("swapped batch");
  (owner, config)
}

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn initialize() {
    T::BenchmarkHelper::set_time(START - 1_000);
    let config = sale_config::<T>();
    let owner: T::AccountId = account("owner", 0, SEED);
    let origin = T::AdminOrigin::try_successful_origin().expect("admin origin available");

    #[extrinsic_call]
    _(origin as T::RuntimeOrigin, owner.clone(), config);

    assert_eq!(Owner::<T>::get(), Some(owner));
  }

  #[benchmark]
  fn deposit() {
    let (_, config) = initialized::<T>();
    let caller: T::AccountId = whitelisted_caller();
    T::BenchmarkHelper::set_time(START);
    T::BenchmarkHelper::fund(config.base_asset, &caller, AMOUNT * 2);
    // first boosted deposit on top of a plain one moves the account between pools
    deposit_from::<T>(&caller, AMOUNT / 2, false);
    let params = deposit_params::<T>(&caller, AMOUNT / 2, true);
    let signature = T::BenchmarkHelper::sign(&Pallet::<T>::deposit_message(&caller, &params));

    #[extrinsic_call]
    _(RawOrigin::Signed(caller.clone()), params, signature);

    assert!(Accounts::<T>::get(&caller).is_some_and(|item| item.boosted));
  }

  #[benchmark]
  fn refund(n: Linear<1, { T::MaxAccounts::get() }>) {
    let (_, config) = initialized::<T>();
    depositors::<T>(&config, n);
    close::<T>();
    fund_boost_refunds::<T>(&config);
    let caller: T::AccountId = whitelisted_caller();

    #[extrinsic_call]
    _(RawOrigin::Signed(caller), n);

    assert_eq!(Pallet::<T>::get_processed_refund_index(), n);
  }

  #[benchmark]
  fn calculate_base_swapped_amount(n: Linear<1, { T::MaxAccounts::get() }>) {
    let (_, config) = initialized::<T>();
    depositors::<T>(&config, n);
    close::<T>();
    let caller: T::AccountId = whitelisted_caller();

    #[extrinsic_call]
    _(RawOrigin::Signed(caller), n);

    assert_eq!(Pallet::<T>::get_processed_base_swapped_index(), n);
  }

  #[benchmark]
  fn withdraw_base_goal() {
    let (owner, _) = settled::<T>(2);

    #[extrinsic_call]
    _(RawOrigin::Signed(owner));

    assert!(Ledger::<T>::get().withdrew_base_goal);
  }

  #[benchmark]
  fn withdraw_base_swapped_amount() {
    let (owner, _) = settled::<T>(2);
    Pallet::<T>::withdraw_base_goal(RawOrigin::Signed(owner.clone()).into())
      .expect("goal withdrawn");

    #[extrinsic_call]
    _(RawOrigin::Signed(owner));

    assert!(Ledger::<T>::get().withdrew_base_swapped_amount);
  }

  #[benchmark]
  fn withdraw_excess_tokens() {
    let (owner, config) = settled::<T>(2);
    Pallet::<T>::withdraw_base_goal(RawOrigin::Signed(owner.clone()).into())
      .expect("goal withdrawn");
    T::BenchmarkHelper::fund(config.base_asset, &Pallet::<T>::account_id(), AMOUNT);

    #[extrinsic_call]
    _(RawOrigin::Signed(owner));

    assert_eq!(Pallet::<T>::calculate_accident_amount(), 0);
  }

  #[benchmark]
  fn force_withdraw() {
    let (owner, config) = initialized::<T>();
    T::BenchmarkHelper::fund(config.base_asset, &Pallet::<T>::account_id(), AMOUNT);
    let to: T::AccountId = account("recipient", 0, SEED);

    #[extrinsic_call]
    _(RawOrigin::Signed(owner), config.base_asset, to, AMOUNT);
  }

  #[benchmark]
  fn change_base_goal() {
    let (owner, _) = initialized::<T>();

    #[extrinsic_call]
    _(RawOrigin::Signed(owner), AMOUNT);

    assert_eq!(Sale::<T>::get().map(|sale| sale.base_goal), Some(AMOUNT));
  }

  #[benchmark]
  fn change_balance_limit() {
    let (owner, _) = initialized::<T>();

    #[extrinsic_call]
    _(RawOrigin::Signed(owner), AMOUNT);

    assert_eq!(Pallet::<T>::calculate_remain_deposit(), AMOUNT);
  }

  #[benchmark]
  fn update_account_items(n: Linear<1, { T::MaxAccounts::get() }>) {
    let (owner, config) = initialized::<T>();
    let accounts: BoundedVec<_, T::MaxAccounts> = depositors::<T>(&config, n)
      .try_into()
      .expect("at most MaxAccounts depositors");
    let update = AccountItemUpdate {
      manual: true,
      base_allocation: AMOUNT / 2,
      base_refund: AMOUNT / 2,
      boost_refund: 0,
    };
    let updates: BoundedVec<_, T::MaxAccounts> = alloc::vec![update; n as usize]
      .try_into()
      .expect("one update per account");

    #[extrinsic_call]
    _(RawOrigin::Signed(owner), accounts, updates);

    assert_eq!(Pallet::<T>::get_account_item_update_logs().len(), 1);
  }

  #[benchmark]
  fn transfer_ownership() {
    let (owner, _) = initialized::<T>();
    let new_owner: T::AccountId = account("new-owner", 0, SEED);

    #[extrinsic_call]
    _(RawOrigin::Signed(owner), new_owner.clone());

    assert_eq!(Owner::<T>::get(), Some(new_owner));
  }

  #[benchmark]
  fn claim_refund() {
    let (_, config) = settled::<T>(2);
    // the plain depositor's base refund goes back to being owed
    let who: T::AccountId = account("depositor", 0, SEED);
    let refund = Pallet::<T>::calculate_account_base_refund(&who);
    Accounts::<T>::mutate(&who, |item| {
      if let Some(item) = item {
        item.base_refunded = 0;
      }
    });
    Ledger::<T>::mutate(|ledger| {
      ledger.total_base_refunded = ledger.total_base_refunded.saturating_sub(refund);
      ledger.pending_base_refund = ledger.pending_base_refund.saturating_add(refund);
    });
    T::BenchmarkHelper::fund(config.base_asset, &Pallet::<T>::account_id(), refund);

    #[extrinsic_call]
    _(RawOrigin::Signed(who));

    assert_eq!(Ledger::<T>::get().pending_base_refund, 0);
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
