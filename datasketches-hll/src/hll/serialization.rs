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

//! Binary serialization format for dense HLL arrays.
//!
//! The format is the DataSketches HLL layout, compatible with the Java and
//! C++ implementations.
//!
//! ## Preamble (10 preamble ints = 40 bytes, little endian)
//!
//! | Byte  | Field | Description |
//! |-------|-------|-------------|
//! | 0     | preamble_ints | Number of 4-byte ints in the preamble (10) |
//! | 1     | ser_ver | Serialization version (1) |
//! | 2     | family_id | Family ID (7 for HLL) |
//! | 3     | lg_k | Log2 of the slot count |
//! | 4     | lg_arr | Log2 of the aux table (updatable HLL4 only, else 0) |
//! | 5     | flags | Bit flags (see below) |
//! | 6     | cur_min | Current minimum slot value |
//! | 7     | mode | Bits 0-1: cur mode (2 = HLL); bits 2-3: target type |
//! | 8-15  | hip_accum | f64 |
//! | 16-23 | kxq0 | f64 |
//! | 24-31 | kxq1 | f64 |
//! | 32-35 | num_at_cur_min | u32 |
//! | 36-39 | aux_count | u32 |
//!
//! ## Body
//!
//! The full packed slot buffer always follows the preamble; compact form
//! never trims it for dense arrays. For the 4-bit type an aux section
//! follows the slot bytes: `aux_count` packed (slot, value) pairs in
//! compact form, or the full `4 << lg_arr`-byte table in updatable form
//! (zeros when no slot has overflowed).
//!
//! ## Flags (byte 5)
//!
//! | Bit | Name | Description |
//! |-----|------|-------------|
//! | 2   | EMPTY | No coupon has ever been applied |
//! | 3   | COMPACT | Image is in compact form |
//! | 4   | OUT_OF_ORDER | HIP accumulator is not valid |

use std::io::Read;

use crate::codec::{SketchBytes, SketchSlice};
use crate::error::{Error, ErrorKind};
use crate::hll::array::{Slots, hll_arr_bytes};
use crate::hll::array4::{AUX_TOKEN, Hll4Slots};
use crate::hll::array6::Hll6Slots;
use crate::hll::array8::Hll8Slots;
use crate::hll::aux_map::{AuxHashMap, LG_AUX_ARR_INTS};
use crate::hll::coupon_value;
use crate::hll::{HllArray, HllType, MAX_LG_K, MIN_LG_K};

pub const HLL_FAMILY_ID: u8 = 7;
pub const SER_VER: u8 = 1;
pub const HLL_PREINTS: u8 = 10;

pub const EMPTY_FLAG_MASK: u8 = 4;
pub const COMPACT_FLAG_MASK: u8 = 8;
pub const OUT_OF_ORDER_FLAG_MASK: u8 = 16;

const CUR_MODE_HLL: u8 = 2;

/// Offset of the slot byte array: end of the 40-byte preamble.
pub const HLL_BYTE_ARR_START: usize = 40;

/// Preamble fields needed to size and rebuild the body.
struct Preamble {
    lg_config_k: u8,
    lg_arr: u8,
    cur_min: u8,
    tgt_hll_type: HllType,
    compact: bool,
    ooo: bool,
    hip_accum: f64,
    kxq0: f64,
    kxq1: f64,
    num_at_cur_min: u32,
    aux_count: u32,
}

impl HllArray {
    /// Serialized size in compact form.
    pub fn get_compact_serialization_bytes(&self) -> usize {
        let aux_bytes = self
            .get_aux_hash_map()
            .map_or(0, |aux| 4 * aux.aux_count() as usize);
        HLL_BYTE_ARR_START + self.hll_byte_arr_bytes() + aux_bytes
    }

    /// Serialized size in updatable form. 4-bit arrays always reserve a
    /// full-capacity aux region so the image can be mutated after reload.
    pub fn get_updatable_serialization_bytes(&self) -> usize {
        let aux_bytes = match self.tgt_hll_type() {
            HllType::Hll4 => 4usize << self.aux_lg_arr_ints(),
            _ => 0,
        };
        HLL_BYTE_ARR_START + self.hll_byte_arr_bytes() + aux_bytes
    }

    fn aux_lg_arr_ints(&self) -> u8 {
        self.get_aux_hash_map()
            .map_or(LG_AUX_ARR_INTS[self.lg_config_k as usize], |aux| {
                aux.lg_aux_arr_ints()
            })
    }

    /// Serialize to the binary layout, in compact or updatable form.
    pub fn serialize(&self, compact: bool) -> Vec<u8> {
        let total = if compact {
            self.get_compact_serialization_bytes()
        } else {
            self.get_updatable_serialization_bytes()
        };
        let mut out = SketchBytes::with_capacity(total);

        out.write_u8(HLL_PREINTS);
        out.write_u8(SER_VER);
        out.write_u8(HLL_FAMILY_ID);
        out.write_u8(self.lg_config_k);

        let is_hll4 = self.tgt_hll_type() == HllType::Hll4;
        let lg_arr = if is_hll4 && !compact {
            self.aux_lg_arr_ints()
        } else {
            0
        };
        out.write_u8(lg_arr);

        let mut flags = 0u8;
        if self.is_empty() {
            flags |= EMPTY_FLAG_MASK;
        }
        if compact {
            flags |= COMPACT_FLAG_MASK;
        }
        if self.is_out_of_order_flag() {
            flags |= OUT_OF_ORDER_FLAG_MASK;
        }
        out.write_u8(flags);

        out.write_u8(self.cur_min);
        out.write_u8(CUR_MODE_HLL | ((self.tgt_hll_type() as u8) << 2));

        out.write_f64_le(self.hip_accum);
        out.write_f64_le(self.kxq0);
        out.write_f64_le(self.kxq1);
        out.write_u32_le(self.num_at_cur_min);
        out.write_u32_le(
            self.get_aux_hash_map()
                .map_or(0, |aux| aux.aux_count()),
        );

        match &self.slots {
            Slots::Hll4(s) => {
                out.write(s.bytes());
                match s.aux() {
                    Some(aux) if compact => {
                        for (slot, value) in aux.iter() {
                            out.write_u32_le(crate::hll::pack_coupon(slot, value));
                        }
                    }
                    Some(aux) => {
                        for &pair in aux.aux_arr() {
                            out.write_u32_le(pair);
                        }
                    }
                    None if !compact => {
                        // Reserve the default-capacity region.
                        for _ in 0..(1usize << lg_arr) {
                            out.write_u32_le(0);
                        }
                    }
                    None => {}
                }
            }
            Slots::Hll6(s) => out.write(s.bytes()),
            Slots::Hll8(s) => out.write(s.bytes()),
        }

        debug_assert_eq!(out.len(), total);
        out.into_bytes()
    }

    /// Reconstruct an array from a serialized image.
    ///
    /// The declared family and version must be recognized and the buffer
    /// length must match the size implied by the preamble exactly.
    pub fn deserialize(bytes: &[u8]) -> Result<HllArray, Error> {
        if bytes.len() < HLL_BYTE_ARR_START {
            return Err(Error::new(
                ErrorKind::MalformedDeserializeData,
                "image shorter than the HLL preamble",
            )
            .with_context("expected", HLL_BYTE_ARR_START)
            .with_context("actual", bytes.len()));
        }

        let mut input = SketchSlice::new(bytes);
        let preamble = parse_preamble(&mut input)?;

        let expected = body_bytes(&preamble);
        if input.remaining() != expected {
            return Err(Error::new(
                ErrorKind::MalformedDeserializeData,
                "image length inconsistent with preamble",
            )
            .with_context("expected", HLL_BYTE_ARR_START + expected)
            .with_context("actual", bytes.len()));
        }

        array_from_image(&preamble, &mut input)
    }

    /// Reconstruct an array from a stream carrying a serialized image.
    pub fn deserialize_stream<R: Read>(reader: &mut R) -> Result<HllArray, Error> {
        let mut pre = [0u8; HLL_BYTE_ARR_START];
        reader.read_exact(&mut pre).map_err(|e| {
            Error::new(
                ErrorKind::MalformedDeserializeData,
                "failed to read the HLL preamble",
            )
            .set_source(e)
        })?;

        let mut input = SketchSlice::new(&pre);
        let preamble = parse_preamble(&mut input)?;

        let mut body = vec![0u8; body_bytes(&preamble)];
        reader.read_exact(&mut body).map_err(|e| {
            Error::new(
                ErrorKind::MalformedDeserializeData,
                "failed to read the HLL body",
            )
            .set_source(e)
        })?;

        let mut input = SketchSlice::new(&body);
        array_from_image(&preamble, &mut input)
    }
}

fn truncated(e: std::io::Error) -> Error {
    Error::new(ErrorKind::MalformedDeserializeData, "image truncated").set_source(e)
}

/// Validate and decode the 40-byte preamble.
fn parse_preamble(input: &mut SketchSlice) -> Result<Preamble, Error> {
    let preamble_ints = input.read_u8().map_err(truncated)?;
    let ser_ver = input.read_u8().map_err(truncated)?;
    let family_id = input.read_u8().map_err(truncated)?;
    let lg_config_k = input.read_u8().map_err(truncated)?;
    let lg_arr = input.read_u8().map_err(truncated)?;
    let flags = input.read_u8().map_err(truncated)?;
    let cur_min = input.read_u8().map_err(truncated)?;
    let mode_byte = input.read_u8().map_err(truncated)?;

    if family_id != HLL_FAMILY_ID {
        return Err(Error::new(
            ErrorKind::UnsupportedFormatVersion,
            "unrecognized sketch family",
        )
        .with_context("expected", HLL_FAMILY_ID)
        .with_context("actual", family_id));
    }
    if ser_ver != SER_VER {
        return Err(Error::new(
            ErrorKind::UnsupportedFormatVersion,
            "unsupported serialization version",
        )
        .with_context("expected", SER_VER)
        .with_context("actual", ser_ver));
    }
    if preamble_ints != HLL_PREINTS {
        return Err(Error::new(
            ErrorKind::MalformedDeserializeData,
            "wrong preamble size for a dense HLL image",
        )
        .with_context("expected", HLL_PREINTS)
        .with_context("actual", preamble_ints));
    }
    if !(MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
        return Err(Error::new(
            ErrorKind::MalformedDeserializeData,
            "lg_config_k out of range",
        )
        .with_context("lg_config_k", lg_config_k));
    }
    if mode_byte & 3 != CUR_MODE_HLL {
        // List/set images belong to the sparse collaborator.
        return Err(Error::new(
            ErrorKind::MalformedDeserializeData,
            "not a dense HLL image",
        )
        .with_context("mode_byte", mode_byte));
    }
    let tgt_hll_type = match (mode_byte >> 2) & 3 {
        0 => HllType::Hll4,
        1 => HllType::Hll6,
        2 => HllType::Hll8,
        _ => {
            return Err(Error::new(
                ErrorKind::MalformedDeserializeData,
                "unknown target HLL type",
            )
            .with_context("mode_byte", mode_byte));
        }
    };
    if cur_min != 0 && tgt_hll_type != HllType::Hll4 {
        return Err(Error::new(
            ErrorKind::MalformedDeserializeData,
            "nonzero cur_min is only valid for the 4-bit type",
        )
        .with_context("cur_min", cur_min));
    }

    let hip_accum = input.read_f64_le().map_err(truncated)?;
    let kxq0 = input.read_f64_le().map_err(truncated)?;
    let kxq1 = input.read_f64_le().map_err(truncated)?;
    let num_at_cur_min = input.read_u32_le().map_err(truncated)?;
    let aux_count = input.read_u32_le().map_err(truncated)?;

    if num_at_cur_min > 1u32 << lg_config_k {
        return Err(Error::new(
            ErrorKind::MalformedDeserializeData,
            "num_at_cur_min exceeds the slot count",
        )
        .with_context("num_at_cur_min", num_at_cur_min));
    }
    if aux_count != 0 && tgt_hll_type != HllType::Hll4 {
        return Err(Error::new(
            ErrorKind::MalformedDeserializeData,
            "aux entries are only valid for the 4-bit type",
        )
        .with_context("aux_count", aux_count));
    }

    // Writers may leave lg_arr at 0; fall back to the default table size.
    let lg_arr = if lg_arr == 0 {
        LG_AUX_ARR_INTS[lg_config_k as usize]
    } else {
        lg_arr
    };

    Ok(Preamble {
        lg_config_k,
        lg_arr,
        cur_min,
        tgt_hll_type,
        compact: flags & COMPACT_FLAG_MASK != 0,
        ooo: flags & OUT_OF_ORDER_FLAG_MASK != 0,
        hip_accum,
        kxq0,
        kxq1,
        num_at_cur_min,
        aux_count,
    })
}

/// Bytes following the preamble, as implied by the preamble fields.
fn body_bytes(p: &Preamble) -> usize {
    let aux_bytes = match p.tgt_hll_type {
        HllType::Hll4 if p.compact => 4 * p.aux_count as usize,
        HllType::Hll4 => 4usize << p.lg_arr,
        _ => 0,
    };
    hll_arr_bytes(p.tgt_hll_type, p.lg_config_k) + aux_bytes
}

/// Rebuild the array from the slot bytes and aux section.
fn array_from_image(p: &Preamble, input: &mut SketchSlice) -> Result<HllArray, Error> {
    let slots = match p.tgt_hll_type {
        HllType::Hll4 => {
            let mut s = Hll4Slots::new(p.lg_config_k);
            input.read_exact(s.bytes_mut()).map_err(truncated)?;
            s.set_aux(read_aux(p, input)?);
            Slots::Hll4(s)
        }
        HllType::Hll6 => {
            let mut s = Hll6Slots::new(p.lg_config_k);
            input.read_exact(s.bytes_mut()).map_err(truncated)?;
            Slots::Hll6(s)
        }
        HllType::Hll8 => {
            let mut s = Hll8Slots::new(p.lg_config_k);
            input.read_exact(s.bytes_mut()).map_err(truncated)?;
            Slots::Hll8(s)
        }
    };

    Ok(HllArray {
        lg_config_k: p.lg_config_k,
        cur_min: p.cur_min,
        num_at_cur_min: p.num_at_cur_min,
        hip_accum: p.hip_accum,
        kxq0: p.kxq0,
        kxq1: p.kxq1,
        ooo_flag: p.ooo,
        slots,
    })
}

/// Read the aux section of a 4-bit image.
fn read_aux(p: &Preamble, input: &mut SketchSlice) -> Result<Option<AuxHashMap>, Error> {
    if p.compact {
        if p.aux_count == 0 {
            return Ok(None);
        }
        let config_k_mask = (1u32 << p.lg_config_k) - 1;
        let mut aux = AuxHashMap::new(p.lg_config_k);
        for _ in 0..p.aux_count {
            let pair = input.read_u32_le().map_err(truncated)?;
            let slot = pair & config_k_mask;
            let value = coupon_value(pair);
            // True overflow values always exceed the 4-bit range; anything
            // smaller (a zeroed pair included) cannot come from a writer.
            if value < AUX_TOKEN {
                return Err(Error::new(
                    ErrorKind::MalformedDeserializeData,
                    "aux pair value below the 4-bit overflow range",
                )
                .with_context("slot", slot)
                .with_context("value", value));
            }
            if aux.get(slot).is_some() {
                return Err(Error::new(
                    ErrorKind::MalformedDeserializeData,
                    "duplicate aux entry",
                )
                .with_context("slot", slot));
            }
            aux.must_add(slot, value);
        }
        return Ok(Some(aux));
    }

    // Updatable image: the full table, preserved cell-for-cell.
    let mut aux_arr = vec![0u32; 1usize << p.lg_arr];
    for cell in aux_arr.iter_mut() {
        *cell = input.read_u32_le().map_err(truncated)?;
    }
    let populated = aux_arr.iter().filter(|&&pair| pair != 0).count();
    if populated != p.aux_count as usize {
        return Err(Error::new(
            ErrorKind::MalformedDeserializeData,
            "aux table population disagrees with aux_count",
        )
        .with_context("expected", p.aux_count)
        .with_context("actual", populated));
    }
    if p.aux_count == 0 {
        return Ok(None);
    }
    Ok(Some(AuxHashMap::from_raw(
        p.lg_config_k,
        p.lg_arr,
        p.aux_count,
        aux_arr.into_boxed_slice(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hll::pack_coupon;

    #[test]
    fn test_preamble_field_offsets() {
        let mut arr = HllArray::new(10, HllType::Hll6);
        arr.coupon_update(pack_coupon(3, 9));
        let bytes = arr.serialize(false);

        assert_eq!(bytes[0], HLL_PREINTS);
        assert_eq!(bytes[1], SER_VER);
        assert_eq!(bytes[2], HLL_FAMILY_ID);
        assert_eq!(bytes[3], 10);
        assert_eq!(bytes[4], 0); // lg_arr unused outside updatable HLL4
        assert_eq!(bytes[5] & EMPTY_FLAG_MASK, 0);
        assert_eq!(bytes[6], 0); // cur_min
        assert_eq!(bytes[7], CUR_MODE_HLL | (1 << 2)); // HLL mode, 6-bit type
    }

    #[test]
    fn test_compact_flag_and_sizes() {
        let arr = HllArray::new(10, HllType::Hll6);

        let compact = arr.serialize(true);
        assert_ne!(compact[5] & COMPACT_FLAG_MASK, 0);
        assert_eq!(compact.len(), arr.get_compact_serialization_bytes());

        let updatable = arr.serialize(false);
        assert_eq!(updatable[5] & COMPACT_FLAG_MASK, 0);
        assert_eq!(updatable.len(), arr.get_updatable_serialization_bytes());

        // No aux section for the 6-bit type: both forms are the same size.
        assert_eq!(compact.len(), updatable.len());
    }

    #[test]
    fn test_updatable_hll4_reserves_aux_region() {
        let arr = HllArray::new(10, HllType::Hll4);
        let updatable = arr.serialize(false);
        let lg_arr_default = LG_AUX_ARR_INTS[10] as usize;
        assert_eq!(updatable[4], lg_arr_default as u8);
        assert_eq!(
            updatable.len(),
            HLL_BYTE_ARR_START + arr.hll_byte_arr_bytes() + (4 << lg_arr_default)
        );

        // Compact form drops the empty region entirely.
        let compact = arr.serialize(true);
        assert_eq!(
            compact.len(),
            HLL_BYTE_ARR_START + arr.hll_byte_arr_bytes()
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_family_and_version() {
        let arr = HllArray::new(10, HllType::Hll8);

        let mut bad_family = arr.serialize(true);
        bad_family[2] = 3;
        let err = HllArray::deserialize(&bad_family).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormatVersion);

        let mut bad_ver = arr.serialize(true);
        bad_ver[1] = 9;
        let err = HllArray::deserialize(&bad_ver).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormatVersion);
    }

    #[test]
    fn test_deserialize_rejects_bad_lengths() {
        let arr = HllArray::new(10, HllType::Hll8);
        let bytes = arr.serialize(true);

        let err = HllArray::deserialize(&bytes[..HLL_BYTE_ARR_START - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);

        let err = HllArray::deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);

        let mut padded = bytes.clone();
        padded.push(0);
        let err = HllArray::deserialize(&padded).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }

    #[test]
    fn test_deserialize_rejects_sparse_modes() {
        let mut bytes = HllArray::new(10, HllType::Hll8).serialize(true);
        bytes[7] = 0; // list mode
        let err = HllArray::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }
}
