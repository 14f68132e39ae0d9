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

//! Read-only iteration over (slot, value) pairs.

use crate::hll::HllArray;

/// Iterator over every slot of an [`HllArray`] in ascending slot order,
/// yielding resolved values (4-bit sentinels are looked up in the aux map).
///
/// Borrows the array immutably, so iteration never mutates sketch state and
/// a fresh iterator can be requested at any time.
pub struct HllPairIterator<'a> {
    array: &'a HllArray,
    slot: u32,
    k: u32,
}

impl<'a> HllPairIterator<'a> {
    pub(crate) fn new(array: &'a HllArray) -> Self {
        Self {
            array,
            slot: 0,
            k: 1u32 << array.lg_config_k(),
        }
    }
}

impl Iterator for HllPairIterator<'_> {
    type Item = (u32, u8);

    fn next(&mut self) -> Option<(u32, u8)> {
        if self.slot >= self.k {
            return None;
        }
        let slot = self.slot;
        self.slot += 1;
        Some((slot, self.array.get_slot(slot)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.k - self.slot) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for HllPairIterator<'_> {}
