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

//! Frequent longs sketch implementation.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::error::Error;
use crate::reverse_purge_hash_map::ReversePurgeLongHashMap;
use crate::serialization::*;

const LG_MIN_MAP_SIZE: u8 = 3;
const SAMPLE_SIZE: usize = 256;
const EPSILON_FACTOR: f64 = 4.0;
const LOAD_FACTOR_NUMERATOR: usize = 3;
const LOAD_FACTOR_DENOMINATOR: usize = 4;

/// Error guarantees for frequent item queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    /// Include items whose upper bound meets the threshold. No truly
    /// frequent item is omitted, but infrequent items may be reported.
    NoFalseNegatives,
    /// Include items whose lower bound meets the threshold. Every reported
    /// item is truly frequent, but some frequent items may be omitted.
    NoFalsePositives,
}

/// Result row for frequent item queries.
///
/// Each row carries the item, its estimated frequency, and the upper and
/// lower bounds between which the true frequency is guaranteed to lie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    item: i64,
    estimate: i64,
    upper_bound: i64,
    lower_bound: i64,
}

impl Row {
    /// Returns the item.
    pub fn item(&self) -> i64 {
        self.item
    }

    /// Returns the estimated frequency.
    pub fn estimate(&self) -> i64 {
        self.estimate
    }

    /// Returns the guaranteed upper bound for the frequency.
    pub fn upper_bound(&self) -> i64 {
        self.upper_bound
    }

    /// Returns the guaranteed lower bound for the frequency.
    ///
    /// This value is never negative.
    pub fn lower_bound(&self) -> i64 {
        self.lower_bound
    }
}

/// Frequent items sketch for streams of weighted i64 keys.
///
/// The sketch tracks approximate item frequencies in bounded memory and
/// returns estimates with guaranteed upper and lower bounds. See the
/// [crate-level documentation](crate) for an overview and the error
/// guarantees.
///
/// Counters and the stream length are i64 accumulators; the caller must keep
/// the total stream weight representable, overflow is not detected.
#[derive(Debug, Clone)]
pub struct FrequentLongsSketch {
    lg_max_map_size: u8,
    cur_map_cap: usize,
    offset: i64,
    stream_length: i64,
    sample_size: usize,
    hash_map: ReversePurgeLongHashMap,
    rng: StdRng,
}

impl FrequentLongsSketch {
    /// Creates a new sketch with the given maximum map size.
    ///
    /// `max_map_size` bounds the physical size of the internal hash map and
    /// must be a power of two no smaller than 8. The maximum number of
    /// tracked counters is `0.75 * max_map_size`; the map starts small and
    /// grows up to that bound as needed. Both the accuracy and the memory
    /// ceiling of the sketch are functions of `max_map_size`.
    ///
    /// Returns an [`InvalidArgument`](crate::error::ErrorKind::InvalidArgument)
    /// error for a size that is not a power of two or is below the minimum.
    pub fn new(max_map_size: usize) -> Result<Self, Error> {
        Self::with_rng(max_map_size, StdRng::from_os_rng())
    }

    /// Creates a new sketch whose purge sampling is seeded with `seed`.
    ///
    /// Two sketches built with the same seed and fed the same stream go
    /// through identical purges, which makes estimates reproducible.
    pub fn with_seed(max_map_size: usize, seed: u64) -> Result<Self, Error> {
        Self::with_rng(max_map_size, StdRng::seed_from_u64(seed))
    }

    /// Returns true if the sketch is empty.
    pub fn is_empty(&self) -> bool {
        self.hash_map.num_active() == 0
    }

    /// Returns the number of active items being tracked.
    pub fn num_active_items(&self) -> usize {
        self.hash_map.num_active()
    }

    /// Returns the total weight of the stream seen so far.
    ///
    /// This is the sum of all counts passed to [`FrequentLongsSketch::update`]
    /// and [`FrequentLongsSketch::update_with_count`], independent of any
    /// purging.
    pub fn stream_length(&self) -> i64 {
        self.stream_length
    }

    /// Returns the estimated frequency of an item.
    ///
    /// If the item is tracked this is its counter plus the global error
    /// offset; otherwise it is zero.
    pub fn estimate(&self, item: i64) -> i64 {
        let count = self.hash_map.get(item);
        if count > 0 { count + self.offset } else { 0 }
    }

    /// Returns the guaranteed upper bound frequency of an item.
    ///
    /// The true frequency is never larger than this value. Note that for an
    /// untracked item the upper bound is the global error offset rather than
    /// zero: the sketch cannot rule out that the item was purged.
    pub fn upper_bound(&self, item: i64) -> i64 {
        self.hash_map.get(item) + self.offset
    }

    /// Returns the guaranteed lower bound frequency of an item.
    ///
    /// The true frequency is never smaller than this value, and it is never
    /// negative. For an untracked item the lower bound is zero.
    pub fn lower_bound(&self, item: i64) -> i64 {
        self.hash_map.get(item)
    }

    /// Returns an upper bound on the error of
    /// [`FrequentLongsSketch::estimate`] for any item.
    ///
    /// This equals the maximum distance between the upper and lower bounds
    /// of any item, and it never decreases.
    pub fn maximum_error(&self) -> i64 {
        self.offset
    }

    /// Returns epsilon for this sketch.
    pub fn epsilon(&self) -> f64 {
        Self::epsilon_for_lg(self.lg_max_map_size)
    }

    /// Returns epsilon for a sketch configured with `lg_max_map_size`.
    ///
    /// The worst-case error of any estimate is `epsilon` times the total
    /// stream weight.
    pub fn epsilon_for_lg(lg_max_map_size: u8) -> f64 {
        EPSILON_FACTOR / (1u64 << lg_max_map_size) as f64
    }

    /// Returns the a priori error estimate for a planned configuration and
    /// an anticipated total stream weight.
    pub fn apriori_error(lg_max_map_size: u8, estimated_stream_length: i64) -> f64 {
        Self::epsilon_for_lg(lg_max_map_size) * estimated_stream_length as f64
    }

    /// Returns the maximum number of counters the sketch is configured to
    /// support, `0.75 * max_map_size`.
    pub fn maximum_map_capacity(&self) -> usize {
        (1usize << self.lg_max_map_size) * LOAD_FACTOR_NUMERATOR / LOAD_FACTOR_DENOMINATOR
    }

    /// Returns the number of counters the current map supports before the
    /// next resize or purge.
    pub fn current_map_capacity(&self) -> usize {
        self.cur_map_cap
    }

    /// Returns the configured log2 maximum map size.
    pub fn lg_max_map_size(&self) -> u8 {
        self.lg_max_map_size
    }

    /// Returns the log2 of the current map size.
    pub fn lg_cur_map_size(&self) -> u8 {
        self.hash_map.lg_length()
    }

    /// Updates the sketch with an item and a count of one.
    pub fn update(&mut self, item: i64) -> Result<(), Error> {
        self.update_with_count(item, 1)
    }

    /// Updates the sketch with an item and a count.
    ///
    /// A count of zero is a no-op. A negative count is rejected with an
    /// [`InvalidArgument`](crate::error::ErrorKind::InvalidArgument) error
    /// and leaves the sketch unchanged.
    ///
    /// # Panics
    ///
    /// Panics if a purge fails to bring the number of active items back
    /// under the maximum map capacity. This cannot happen unless the median
    /// selection logic is broken.
    pub fn update_with_count(&mut self, item: i64, count: i64) -> Result<(), Error> {
        if count == 0 {
            return Ok(());
        }
        if count < 0 {
            return Err(
                Error::invalid_argument("count may not be negative").with_context("count", count)
            );
        }
        self.update_positive(item, count);
        Ok(())
    }

    /// Merges another sketch into this one.
    ///
    /// The other sketch may be configured with a different map size. The
    /// merged sketch respects the larger error tolerance of the two inputs:
    /// every active entry of `other` is replayed through this sketch's own
    /// grow and purge policy, then the error offsets are added.
    pub fn merge(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        let merged_stream_length = self.stream_length + other.stream_length;
        for (item, count) in other.hash_map.iter() {
            self.update_positive(item, count);
        }
        self.offset += other.offset;
        // Replay re-added other's counters to the stream length; overwrite
        // with the sum captured before mutation.
        self.stream_length = merged_stream_length;
    }

    /// Resets the sketch to an empty state, keeping its configuration.
    pub fn reset(&mut self) {
        self.hash_map = ReversePurgeLongHashMap::new(1 << LG_MIN_MAP_SIZE);
        self.cur_map_cap = self.hash_map.capacity();
        self.offset = 0;
        self.stream_length = 0;
    }

    /// Returns frequent items using the sketch maximum error as threshold.
    ///
    /// Equivalent to
    /// `frequent_items_with_threshold(error_type, self.maximum_error())`.
    pub fn frequent_items(&self, error_type: ErrorType) -> Vec<Row> {
        self.frequent_items_with_threshold(error_type, self.offset)
    }

    /// Returns frequent items using a custom threshold.
    ///
    /// If `threshold` is below [`FrequentLongsSketch::maximum_error`], the
    /// maximum error is used instead.
    ///
    /// For [`ErrorType::NoFalseNegatives`], an item is included when its
    /// upper bound is at least the threshold; for
    /// [`ErrorType::NoFalsePositives`], when its lower bound is. Rows are
    /// sorted by descending estimate.
    pub fn frequent_items_with_threshold(
        &self,
        error_type: ErrorType,
        threshold: i64,
    ) -> Vec<Row> {
        let threshold = threshold.max(self.offset);
        let mut rows = Vec::new();
        for (item, count) in self.hash_map.iter() {
            let lower_bound = count;
            let upper_bound = count + self.offset;
            let include = match error_type {
                ErrorType::NoFalseNegatives => upper_bound >= threshold,
                ErrorType::NoFalsePositives => lower_bound >= threshold,
            };
            if include {
                rows.push(Row {
                    item,
                    estimate: upper_bound,
                    upper_bound,
                    lower_bound,
                });
            }
        }
        rows.sort_by(|a, b| b.estimate.cmp(&a.estimate));
        rows
    }

    /// Returns the number of bytes [`FrequentLongsSketch::serialize`] will
    /// produce for the current state.
    pub fn storage_bytes(&self) -> usize {
        if self.stream_length == 0 {
            return 8;
        }
        PREAMBLE_LONGS_NONEMPTY as usize * 8 + self.num_active_items() * 16
    }

    /// Serializes this sketch into a byte vector.
    ///
    /// A sketch that has never been updated serializes to a short 8-byte
    /// form. A purge can leave a sketch with no active items but a positive
    /// stream length and offset; such a sketch uses the full form so that
    /// deserialization reproduces its state exactly.
    pub fn serialize(&self) -> Vec<u8> {
        if self.stream_length == 0 {
            let mut out = vec![0u8; 8];
            out[PREAMBLE_LONGS_BYTE] = PREAMBLE_LONGS_EMPTY;
            out[SER_VER_BYTE] = SER_VER;
            out[FAMILY_BYTE] = FAMILY_ID;
            out[LG_MAX_MAP_SIZE_BYTE] = self.lg_max_map_size;
            out[LG_CUR_MAP_SIZE_BYTE] = self.hash_map.lg_length();
            out[FLAGS_BYTE] = EMPTY_FLAG_MASK;
            return out;
        }
        let active_items = self.num_active_items();
        let mut out = vec![0u8; self.storage_bytes()];
        out[PREAMBLE_LONGS_BYTE] = PREAMBLE_LONGS_NONEMPTY;
        out[SER_VER_BYTE] = SER_VER;
        out[FAMILY_BYTE] = FAMILY_ID;
        out[LG_MAX_MAP_SIZE_BYTE] = self.lg_max_map_size;
        out[LG_CUR_MAP_SIZE_BYTE] = self.hash_map.lg_length();
        out[FLAGS_BYTE] = 0;
        write_u32_le(&mut out, ACTIVE_ITEMS_INT, active_items as u32);
        write_i64_le(&mut out, STREAM_LENGTH_LONG, self.stream_length);
        write_i64_le(&mut out, OFFSET_LONG, self.offset);

        let mut pos = PREAMBLE_LONGS_NONEMPTY as usize * 8;
        for value in self.hash_map.active_values() {
            write_i64_le(&mut out, pos, value);
            pos += 8;
        }
        for key in self.hash_map.active_keys() {
            write_i64_le(&mut out, pos, key);
            pos += 8;
        }
        out
    }

    /// Deserializes a sketch from bytes produced by
    /// [`FrequentLongsSketch::serialize`].
    ///
    /// All structural validation happens here; corrupt input is rejected
    /// with an [`InvalidData`](crate::error::ErrorKind::InvalidData) error.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < 8 {
            return Err(Error::insufficient_data("preamble"));
        }
        let pre_longs = bytes[PREAMBLE_LONGS_BYTE] & 0x3f;
        let ser_ver = bytes[SER_VER_BYTE];
        let family = bytes[FAMILY_BYTE];
        let lg_max = bytes[LG_MAX_MAP_SIZE_BYTE];
        let lg_cur = bytes[LG_CUR_MAP_SIZE_BYTE];
        let flags = bytes[FLAGS_BYTE];
        let is_empty = (flags & EMPTY_FLAG_MASK) != 0;
        if ser_ver != SER_VER {
            return Err(Error::unsupported_serial_version(SER_VER, ser_ver));
        }
        if family != FAMILY_ID {
            return Err(Error::invalid_family(FAMILY_ID, family));
        }
        Self::check_lg_sizes(lg_max, lg_cur)?;
        if is_empty {
            if pre_longs != PREAMBLE_LONGS_EMPTY {
                return Err(Error::invalid_preamble_longs(
                    PREAMBLE_LONGS_EMPTY,
                    pre_longs,
                ));
            }
            return Ok(Self::with_lg_map_sizes(
                lg_max,
                lg_cur,
                StdRng::from_os_rng(),
            ));
        }
        if pre_longs != PREAMBLE_LONGS_NONEMPTY {
            return Err(Error::invalid_preamble_longs(
                PREAMBLE_LONGS_NONEMPTY,
                pre_longs,
            ));
        }
        let pre_bytes = PREAMBLE_LONGS_NONEMPTY as usize * 8;
        if bytes.len() < pre_bytes {
            return Err(Error::insufficient_data("full preamble"));
        }
        let active_items = read_u32_le(bytes, ACTIVE_ITEMS_INT) as usize;
        let stream_length = read_i64_le(bytes, STREAM_LENGTH_LONG);
        let offset = read_i64_le(bytes, OFFSET_LONG);
        if stream_length == 0 {
            return Err(Error::deserial("empty flag not set but zero stream length"));
        }
        Self::check_accumulators(stream_length, offset)?;
        let pairs_bytes = active_items
            .checked_mul(16)
            .ok_or_else(|| Error::deserial("active items size overflow"))?;
        if bytes.len() < pre_bytes + pairs_bytes {
            return Err(Error::insufficient_data("counter pairs"));
        }
        let keys_pos = pre_bytes + active_items * 8;
        let mut sketch = Self::with_lg_map_sizes(lg_max, lg_cur, StdRng::from_os_rng());
        for i in 0..active_items {
            let value = read_i64_le(bytes, pre_bytes + i * 8);
            let key = read_i64_le(bytes, keys_pos + i * 8);
            sketch
                .update_with_count(key, value)
                .map_err(|_| Error::deserial("negative count in serialized sketch"))?;
        }
        // Replay accumulated counter weights into the stream length; restore
        // the recorded accumulators instead.
        sketch.stream_length = stream_length;
        sketch.offset = offset;
        Ok(sketch)
    }

    /// Returns a human-oriented string form of this sketch.
    ///
    /// The form is a comma-joined token list: serialization version, family,
    /// lg max map size, flags, stream length, offset, the number of active
    /// items, the current map length, and one (key, count) token pair per
    /// active item.
    pub fn serialize_to_string(&self) -> String {
        let flags = if self.stream_length == 0 {
            EMPTY_FLAG_MASK
        } else {
            0
        };
        let mut out = format!(
            "{},{},{},{},{},{},{},{}",
            SER_VER,
            FAMILY_ID,
            self.lg_max_map_size,
            flags,
            self.stream_length,
            self.offset,
            self.num_active_items(),
            self.hash_map.len(),
        );
        for (key, value) in self.hash_map.iter() {
            out.push_str(&format!(",{key},{value}"));
        }
        out
    }

    /// Reconstructs a sketch from the string form produced by
    /// [`FrequentLongsSketch::serialize_to_string`].
    pub fn deserialize_from_string(s: &str) -> Result<Self, Error> {
        let tokens: Vec<&str> = s.split(',').collect();
        if tokens.len() < STR_PREAMBLE_TOKENS + 2 {
            return Err(Error::deserial("string form too short")
                .with_context("tokens", tokens.len()));
        }
        let ser_ver: u8 = parse_token(tokens[0], "ser_ver")?;
        let family: u8 = parse_token(tokens[1], "family")?;
        let lg_max: u8 = parse_token(tokens[2], "lg_max_map_size")?;
        let flags: u8 = parse_token(tokens[3], "flags")?;
        let stream_length: i64 = parse_token(tokens[4], "stream_length")?;
        let offset: i64 = parse_token(tokens[5], "offset")?;
        let num_active: usize = parse_token(tokens[6], "num_active")?;
        let map_length: usize = parse_token(tokens[7], "map_length")?;
        if ser_ver != SER_VER {
            return Err(Error::unsupported_serial_version(SER_VER, ser_ver));
        }
        if family != FAMILY_ID {
            return Err(Error::invalid_family(FAMILY_ID, family));
        }
        let is_empty = (flags & EMPTY_FLAG_MASK) != 0;
        if is_empty != (stream_length == 0) {
            return Err(Error::deserial(
                "empty flag inconsistent with stream length",
            ));
        }
        if !map_length.is_power_of_two() || map_length < (1 << LG_MIN_MAP_SIZE) {
            return Err(
                Error::deserial("map length must be a power of 2").with_context("map_length", map_length)
            );
        }
        let lg_cur = map_length.trailing_zeros() as u8;
        Self::check_lg_sizes(lg_max, lg_cur)?;
        Self::check_accumulators(stream_length, offset)?;
        if tokens.len() != STR_PREAMBLE_TOKENS + 2 + 2 * num_active {
            return Err(Error::deserial("token count mismatch")
                .with_context("tokens", tokens.len())
                .with_context("num_active", num_active));
        }
        let mut sketch = Self::with_lg_map_sizes(lg_max, lg_cur, StdRng::from_os_rng());
        let mut pos = STR_PREAMBLE_TOKENS + 2;
        for _ in 0..num_active {
            let key: i64 = parse_token(tokens[pos], "key")?;
            let value: i64 = parse_token(tokens[pos + 1], "count")?;
            sketch
                .update_with_count(key, value)
                .map_err(|_| Error::deserial("negative count in serialized sketch"))?;
            pos += 2;
        }
        sketch.stream_length = stream_length;
        sketch.offset = offset;
        Ok(sketch)
    }

    fn update_positive(&mut self, item: i64, count: i64) {
        self.stream_length += count;
        self.hash_map.adjust_or_put_value(item, count);
        if self.hash_map.num_active() > self.cur_map_cap {
            if self.hash_map.lg_length() < self.lg_max_map_size {
                self.hash_map.resize(self.hash_map.len() * 2);
                self.cur_map_cap = self.hash_map.capacity();
            } else {
                let median = self.hash_map.purge(self.sample_size, &mut self.rng);
                self.offset += median;
                if self.hash_map.num_active() > self.maximum_map_capacity() {
                    panic!("purge did not reduce the number of active items");
                }
            }
        }
    }

    fn with_rng(max_map_size: usize, rng: StdRng) -> Result<Self, Error> {
        if !max_map_size.is_power_of_two() {
            return Err(Error::invalid_argument("max_map_size must be a power of 2")
                .with_context("max_map_size", max_map_size));
        }
        if max_map_size < (1 << LG_MIN_MAP_SIZE) {
            return Err(Error::invalid_argument("max_map_size below the minimum map size")
                .with_context("max_map_size", max_map_size)
                .with_context("minimum", 1 << LG_MIN_MAP_SIZE));
        }
        let lg_max_map_size = max_map_size.trailing_zeros() as u8;
        Ok(Self::with_lg_map_sizes(
            lg_max_map_size,
            LG_MIN_MAP_SIZE,
            rng,
        ))
    }

    fn with_lg_map_sizes(lg_max_map_size: u8, lg_cur_map_size: u8, rng: StdRng) -> Self {
        let lg_max = lg_max_map_size.max(LG_MIN_MAP_SIZE);
        let lg_cur = lg_cur_map_size.max(LG_MIN_MAP_SIZE);
        let hash_map = ReversePurgeLongHashMap::new(1usize << lg_cur);
        let cur_map_cap = hash_map.capacity();
        let max_map_cap = (1usize << lg_max) * LOAD_FACTOR_NUMERATOR / LOAD_FACTOR_DENOMINATOR;
        Self {
            lg_max_map_size: lg_max,
            cur_map_cap,
            offset: 0,
            stream_length: 0,
            sample_size: SAMPLE_SIZE.min(max_map_cap),
            hash_map,
            rng,
        }
    }

    fn check_lg_sizes(lg_max: u8, lg_cur: u8) -> Result<(), Error> {
        if lg_max < LG_MIN_MAP_SIZE || lg_max > 63 {
            return Err(
                Error::deserial("lg_max_map_size out of range").with_context("lg_max", lg_max)
            );
        }
        if lg_cur > lg_max {
            return Err(Error::deserial("lg_cur_map_size exceeds lg_max_map_size")
                .with_context("lg_cur", lg_cur)
                .with_context("lg_max", lg_max));
        }
        Ok(())
    }

    fn check_accumulators(stream_length: i64, offset: i64) -> Result<(), Error> {
        if stream_length < 0 {
            return Err(Error::deserial("negative stream length")
                .with_context("stream_length", stream_length));
        }
        if offset < 0 {
            return Err(Error::deserial("negative offset").with_context("offset", offset));
        }
        Ok(())
    }
}

fn parse_token<T: std::str::FromStr>(token: &str, field: &'static str) -> Result<T, Error> {
    token
        .parse()
        .map_err(|_| Error::deserial(format!("unparsable {field} token")).with_context(field, token))
}
