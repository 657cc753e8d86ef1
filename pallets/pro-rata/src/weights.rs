#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use polkadot_sdk::frame_support::{traits::Get, weights::{Weight, constants::RocksDbWeight}};
use core::marker::PhantomData;

pub trait WeightInfo {
	fn initialize() -> Weight;
	fn deposit() -> Weight;
	fn refund(n: u32) -> Weight;
	fn calculate_base_swapped_amount(n: u32) -> Weight;
	fn withdraw_base_goal() -> Weight;
	fn withdraw_base_swapped_amount() -> Weight;
	fn withdraw_excess_tokens() -> Weight;
	fn force_withdraw() -> Weight;
	fn change_base_goal() -> Weight;
	fn change_balance_limit() -> Weight;
	fn update_account_items(n: u32) -> Weight;
	fn transfer_ownership() -> Weight;
	fn claim_refund() -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config> WeightInfo for SubstrateWeight<T> {
	fn initialize() -> Weight {
		Weight::from_parts(25_000_000, 3500)
			.saturating_add(T::DbWeight::get().reads(4))
			.saturating_add(T::DbWeight::get().writes(2))
	}
	fn deposit() -> Weight {
		Weight::from_parts(90_000_000, 6200)
			.saturating_add(T::DbWeight::get().reads(8))
			.saturating_add(T::DbWeight::get().writes(7))
	}
	fn refund(n: u32) -> Weight {
		Weight::from_parts(30_000_000, 3500)
			.saturating_add(Weight::from_parts(55_000_000, 6200).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(6))
			.saturating_add(T::DbWeight::get().reads((4_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(1))
			.saturating_add(T::DbWeight::get().writes((3_u64).saturating_mul(n.into())))
	}
	fn calculate_base_swapped_amount(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 3500)
			.saturating_add(Weight::from_parts(12_000_000, 2600).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(4))
			.saturating_add(T::DbWeight::get().reads((2_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn withdraw_base_goal() -> Weight {
		Weight::from_parts(45_000_000, 6200)
			.saturating_add(T::DbWeight::get().reads(5))
			.saturating_add(T::DbWeight::get().writes(3))
	}
	fn withdraw_base_swapped_amount() -> Weight {
		Weight::from_parts(45_000_000, 6200)
			.saturating_add(T::DbWeight::get().reads(5))
			.saturating_add(T::DbWeight::get().writes(3))
	}
	fn withdraw_excess_tokens() -> Weight {
		Weight::from_parts(80_000_000, 6200)
			.saturating_add(T::DbWeight::get().reads(8))
			.saturating_add(T::DbWeight::get().writes(4))
	}
	fn force_withdraw() -> Weight {
		Weight::from_parts(40_000_000, 6200)
			.saturating_add(T::DbWeight::get().reads(3))
			.saturating_add(T::DbWeight::get().writes(2))
	}
	fn change_base_goal() -> Weight {
		Weight::from_parts(15_000_000, 2000)
			.saturating_add(T::DbWeight::get().reads(2))
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn change_balance_limit() -> Weight {
		Weight::from_parts(15_000_000, 2000)
			.saturating_add(T::DbWeight::get().reads(2))
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn update_account_items(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 2000)
			.saturating_add(Weight::from_parts(10_000_000, 2600).saturating_mul(n.into()))
			.saturating_add(T::DbWeight::get().reads(2))
			.saturating_add(T::DbWeight::get().reads((1_u64).saturating_mul(n.into())))
			.saturating_add(T::DbWeight::get().writes(2))
			.saturating_add(T::DbWeight::get().writes((1_u64).saturating_mul(n.into())))
	}
	fn transfer_ownership() -> Weight {
		Weight::from_parts(15_000_000, 2000)
			.saturating_add(T::DbWeight::get().reads(1))
			.saturating_add(T::DbWeight::get().writes(1))
	}
	fn claim_refund() -> Weight {
		Weight::from_parts(60_000_000, 6200)
			.saturating_add(T::DbWeight::get().reads(7))
			.saturating_add(T::DbWeight::get().writes(5))
	}
}

impl WeightInfo for () {
	fn initialize() -> Weight {
		Weight::from_parts(25_000_000, 3500)
	}
	fn deposit() -> Weight {
		Weight::from_parts(90_000_000, 6200)
	}
	fn refund(n: u32) -> Weight {
		Weight::from_parts(30_000_000, 3500)
			.saturating_add(Weight::from_parts(55_000_000, 6200).saturating_mul(n.into()))
	}
	fn calculate_base_swapped_amount(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 3500)
			.saturating_add(Weight::from_parts(12_000_000, 2600).saturating_mul(n.into()))
	}
	fn withdraw_base_goal() -> Weight {
		Weight::from_parts(45_000_000, 6200)
	}
	fn withdraw_base_swapped_amount() -> Weight {
		Weight::from_parts(45_000_000, 6200)
	}
	fn withdraw_excess_tokens() -> Weight {
		Weight::from_parts(80_000_000, 6200)
	}
	fn force_withdraw() -> Weight {
		Weight::from_parts(40_000_000, 6200)
	}
	fn change_base_goal() -> Weight {
		Weight::from_parts(15_000_000, 2000)
	}
	fn change_balance_limit() -> Weight {
		Weight::from_parts(15_000_000, 2000)
	}
	fn update_account_items(n: u32) -> Weight {
		Weight::from_parts(20_000_000, 2000)
			.saturating_add(Weight::from_parts(10_000_000, 2600).saturating_mul(n.into()))
	}
	fn transfer_ownership() -> Weight {
		Weight::from_parts(15_000_000, 2000)
	}
	fn claim_refund() -> Weight {
		Weight::from_parts(60_000_000, 6200)
	}
}
