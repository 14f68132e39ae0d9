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

//! Dense HyperLogLog array core for distinct-count sketching.
//!
//! This crate implements the dense (array) representation of the HLL sketch:
//! a fixed number of counter slots K = 2^lg_config_k, each holding the
//! maximum leading-zero count observed for the hashed inputs that mapped to
//! it, plus the incremental HIP estimator state maintained alongside.
//!
//! Three storage widths are supported, trading memory for update cost:
//!
//! - [`HllType::Hll4`]: 4 bits per slot, with an auxiliary overflow map
//! - [`HllType::Hll6`]: 6 bits per slot, packed across byte boundaries
//! - [`HllType::Hll8`]: 8 bits per slot (one byte each)
//!
//! All three widths produce the same estimates for the same input stream.
//! Arrays serialize to the DataSketches HLL binary format in either compact
//! or updatable form and round-trip exactly.
//!
//! The sparse list/set pre-aggregation modes, unions, and the high-level
//! sketch facade are external collaborators; this crate consumes their
//! coupons (packed `(slot, value)` integers) and nothing else.

pub mod error;

pub(crate) mod codec;

pub mod hll;

pub use hll::{HllArray, HllType};
