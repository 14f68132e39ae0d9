// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Dense HyperLogLog array representation.
//!
//! # Coupons
//!
//! A coupon is a 32-bit value encoding both a slot number (26 bits) and a
//! value (6 bits). The slot identifies which counter to update, and the
//! value is the number of leading zeros in the hash plus one. Coupons are
//! produced by the hashing collaborator (see [`coupon`]); this module only
//! decodes them.
//!
//! # Storage widths
//!
//! The array stores one value per slot at 4, 6, or 8 bits per slot
//! ([`HllType`]). The 4-bit width keeps values relative to a running
//! minimum and spills slots that exceed the 4-bit range into an auxiliary
//! hash map ([`aux_map::AuxHashMap`]).

use std::hash::Hash;

mod array;
mod array4;
mod array6;
mod array8;
pub mod aux_map;
mod estimator;
mod harmonic_numbers;
mod iterator;
mod relative_error;
mod serialization;

pub use array::HllArray;
pub use iterator::HllPairIterator;

/// Target HLL storage width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HllType {
    Hll4 = 0,
    Hll6 = 1,
    Hll8 = 2,
}

/// Minimum supported log2 of the slot count.
pub const MIN_LG_K: u8 = 4;
/// Maximum supported log2 of the slot count.
pub const MAX_LG_K: u8 = 21;

pub(crate) const KEY_BITS_26: u32 = 26;
pub(crate) const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

/// Auxiliary map resize at 3/4 = 75% load factor
pub(crate) const RESIZE_NUMER: u32 = 3;
pub(crate) const RESIZE_DENOM: u32 = 4;

/// Extract slot number (low 26 bits) from coupon
#[inline]
pub(crate) fn coupon_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// Extract value (upper 6 bits) from coupon
#[inline]
pub(crate) fn coupon_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// Pack slot number and value into a coupon
///
/// Format: [value (6 bits) << 26] | [slot (26 bits)]
#[inline]
pub fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

/// Validate the number of standard deviations requested for a bound.
///
/// Panics on anything outside {1, 2, 3}; this is a caller contract breach,
/// not a recoverable condition.
#[inline]
pub(crate) fn check_num_std_dev(num_std_dev: u8) {
    assert!(
        (1..=3).contains(&num_std_dev),
        "num_std_dev must be 1, 2, or 3; got {num_std_dev}"
    );
}

/// Produce a coupon for an arbitrary hashable input.
///
/// This is the reference coupon producer used by tests and simple callers;
/// production pipelines typically hash upstream and feed coupons directly.
pub fn coupon<H: Hash>(v: H) -> u32 {
    const DEFAULT_SEED: u32 = 9001;

    let mut hasher = mur3::Hasher128::with_seed(DEFAULT_SEED);
    v.hash(&mut hasher);
    let (lo, hi) = hasher.finish128();

    let addr26 = lo as u32 & KEY_MASK_26;
    let lz = hi.leading_zeros();
    let capped = lz.min(62);
    let value = capped + 1;

    value << KEY_BITS_26 | addr26
}
