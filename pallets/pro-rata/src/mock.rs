extern crate alloc;

use crate as pallet_pro_rata;
use crate::{AllocationMode, DepositParams, DepositParamsOf, SaleConfig, TransactionIdOf};
use core::cell::Cell;
use polkadot_sdk::frame_support::{
  PalletId, construct_runtime, derive_impl,
  traits::{ConstU32, ConstU128, Get, UnixTime, fungibles::Inspect},
};
use polkadot_sdk::frame_system::{self, EnsureRoot};
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchResult, FixedU128,
  testing::{H256, TestSignature, UintAuthorityId},
  traits::{BlakeTwo256, IdentityLookup},
};

type Block = frame_system::mocking::MockBlock<Test>;

pub const OWNER: u64 = 1;
pub const VERIFIER: u64 = 100;
pub const COLD_WALLET: u64 = 200;
pub const ALICE: u64 = 10;
pub const BOB: u64 = 11;
pub const CHARLIE: u64 = 12;
pub const DAVE: u64 = 13;
/// Funded depositors: ALICE..=LAST_DEPOSITOR
pub const LAST_DEPOSITOR: u64 = 16;

pub const BASE: u32 = 1;
pub const BOOST: u32 = 2;
/// Assets whose minimum balance exceeds small refunds
pub const FRAGILE_BASE: u32 = 4;
pub const FRAGILE_BOOST: u32 = 5;
pub const FRAGILE_MIN_BALANCE: u128 = 10;
pub const INITIAL_BALANCE: u128 = 1_000;

pub const GENESIS_TIME: u64 = 500;
pub const START_DATE: u64 = 1_000;
pub const CLOSE_DATE: u64 = 2_000;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    ProRata: pallet_pro_rata,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = u64;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<u128>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = u128;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = u128;
  type AssetId = u32;
  type AssetIdParameter = u32;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  type ApprovalDeposit = ConstU128<1>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type ReserveData = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = AssetBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct AssetBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl polkadot_sdk::pallet_assets::BenchmarkHelper<u32, ()> for AssetBenchmarkHelper {
  fn create_asset_id_parameter(id: u32) -> u32 {
    id
  }
  fn create_reserve_id_parameter(_id: u32) -> () {
    ()
  }
}

thread_local! {
  static NOW: Cell<u64> = const { Cell::new(GENESIS_TIME) };
  static NEXT_TRANSACTION: Cell<u32> = const { Cell::new(0) };
}

/// Wall clock driven by the tests
pub struct MockTime;
impl UnixTime for MockTime {
  fn now() -> core::time::Duration {
    core::time::Duration::from_secs(NOW.with(|now| now.get()))
  }
}

pub fn set_now(secs: u64) {
  NOW.with(|now| now.set(secs));
}

pub struct ProRataPalletId;
impl Get<PalletId> for ProRataPalletId {
  fn get() -> PalletId {
    PalletId(*b"py/prrta")
  }
}

impl pallet_pro_rata::Config for Test {
  type Assets = Assets;
  type UnixTime = MockTime;
  type OffchainSignature = TestSignature;
  type OffchainPublic = UintAuthorityId;
  type AdminOrigin = EnsureRoot<u64>;
  type PalletId = ProRataPalletId;
  type MaxAccounts = ConstU32<5>;
  type MaxTransactionIdLen = ConstU32<32>;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = ProRataBenchmarkHelper;
}

#[cfg(feature = "runtime-benchmarks")]
pub struct ProRataBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl pallet_pro_rata::BenchmarkHelper<u64, TestSignature> for ProRataBenchmarkHelper {
  fn setup_assets() -> (u32, u32) {
    (BASE, BOOST)
  }
  fn fund(asset: u32, who: &u64, amount: u128) {
    use polkadot_sdk::frame_support::traits::fungibles::Mutate;
    let _ = <Assets as Mutate<u64>>::mint_into(asset, who, amount);
  }
  fn set_time(now: u64) {
    set_now(now);
  }
  fn verifier() -> u64 {
    VERIFIER
  }
  fn sign(message: &[u8]) -> TestSignature {
    TestSignature(VERIFIER, message.to_vec())
  }
}

/// Goal 100, boost enabled, no effective balance limit
pub fn sale_config() -> SaleConfig<u64> {
  SaleConfig {
    deposit_verifier: VERIFIER,
    cold_wallet: COLD_WALLET,
    base_asset: BASE,
    boost_asset: Some(BOOST),
    base_goal: 100,
    balance_limit: 1_000_000,
    start_date: START_DATE,
    close_date: CLOSE_DATE,
    external_refund: false,
    allocation: AllocationMode::GoalPriority,
  }
}

pub fn initialize(config: SaleConfig<u64>) -> DispatchResult {
  ProRata::initialize(RuntimeOrigin::root(), OWNER, config)
}

/// Initializes `config` and moves the clock into the deposit window
pub fn open_sale(config: SaleConfig<u64>) {
  initialize(config).unwrap();
  set_now(START_DATE);
}

pub fn close_sale() {
  set_now(CLOSE_DATE);
}

pub fn transaction_id(raw: &[u8]) -> TransactionIdOf<Test> {
  TransactionIdOf::<Test>::try_from(raw.to_vec()).unwrap()
}

fn next_transaction_id() -> TransactionIdOf<Test> {
  let n = NEXT_TRANSACTION.with(|next| {
    let n = next.get();
    next.set(n + 1);
    n
  });
  transaction_id(alloc::format!("tx-{n}").as_bytes())
}

/// Authorization for `who` with the current nonce and a fresh transaction id
pub fn deposit_params(who: u64, base_amount: u128, boost: bool, rate: u32) -> DepositParamsOf<Test> {
  DepositParams {
    base_amount,
    boost,
    boost_exchange_rate: FixedU128::from_u32(rate),
    nonce: ProRata::get_account_deposit_nonce(&who),
    transaction_id: next_transaction_id(),
    timestamp_limit: CLOSE_DATE,
  }
}

pub fn sign(who: u64, params: &DepositParamsOf<Test>) -> TestSignature {
  TestSignature(VERIFIER, ProRata::deposit_message(&who, params))
}

pub fn submit(who: u64, params: DepositParamsOf<Test>) -> DispatchResult {
  let signature = sign(who, &params);
  ProRata::deposit(RuntimeOrigin::signed(who), params, signature)
}

pub fn deposit(who: u64, base_amount: u128) -> DispatchResult {
  submit(who, deposit_params(who, base_amount, false, 0))
}

pub fn deposit_boosted(who: u64, base_amount: u128, rate: u32) -> DispatchResult {
  submit(who, deposit_params(who, base_amount, true, rate))
}

pub fn balance_of(asset: u32, who: u64) -> u128 {
  <Assets as Inspect<u64>>::balance(asset, &who)
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  set_now(GENESIS_TIME);

  let mut t = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();

  polkadot_sdk::pallet_assets::GenesisConfig::<Test> {
    assets: alloc::vec![
      (BASE, OWNER, true, 1),
      (BOOST, OWNER, true, 1),
      (3, OWNER, true, 1),
      (FRAGILE_BASE, OWNER, true, FRAGILE_MIN_BALANCE),
      (FRAGILE_BOOST, OWNER, true, FRAGILE_MIN_BALANCE),
    ],
    metadata: alloc::vec![
      (BASE, b"Base".to_vec(), b"BASE".to_vec(), 18),
      (BOOST, b"Boost".to_vec(), b"BST".to_vec(), 18),
      (FRAGILE_BASE, b"Fragile Base".to_vec(), b"FBASE".to_vec(), 18),
      (FRAGILE_BOOST, b"Fragile Boost".to_vec(), b"FBST".to_vec(), 18),
    ],
    accounts: (ALICE..=LAST_DEPOSITOR)
      .map(|who| (BASE, who, INITIAL_BALANCE))
      .chain([(FRAGILE_BASE, ALICE, 100), (FRAGILE_BASE, BOB, 150)])
      .collect(),
    reserves: alloc::vec![],
    next_asset_id: None,
  }
  .assimilate_storage(&mut t)
  .unwrap();

  pallet_pro_rata::GenesisConfig::<Test>::default()
    .assimilate_storage(&mut t)
    .unwrap();

  let mut ext: polkadot_sdk::sp_io::TestExternalities = t.into();
  ext.execute_with(|| System::set_block_number(1));
  ext
}
