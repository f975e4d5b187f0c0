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

//! Reverse purge hash map for long keys.
//!
//! This linear-probing hash map stores (i64 key, i64 count) pairs in flat
//! parallel arrays and supports a reverse purge operation: subtract an
//! approximate median from every counter and drop the entries that fall to
//! zero or below, scanning probe clusters from the back to the front so that
//! backward-shift deletion never revisits a slot.

use rand::Rng;

use crate::sample::ReservoirSample;

const LOAD_FACTOR_NUMERATOR: usize = 3;
const LOAD_FACTOR_DENOMINATOR: usize = 4;
const DRIFT_LIMIT: usize = 1024;

/// Linear-probing hash map of positive counters keyed by i64 items.
///
/// A slot is occupied when its state is non-zero; the state records the
/// probe distance from the key's home slot plus one.
#[derive(Debug, Clone)]
pub(crate) struct ReversePurgeLongHashMap {
    lg_length: u8,
    load_threshold: usize,
    keys: Vec<i64>,
    values: Vec<i64>,
    states: Vec<u16>,
    num_active: usize,
}

impl ReversePurgeLongHashMap {
    /// Creates a new map with arrays of length `map_size` (must be a power
    /// of two). The load threshold is 0.75 of `map_size`.
    pub fn new(map_size: usize) -> Self {
        assert!(map_size.is_power_of_two(), "map_size must be power of 2");
        Self {
            lg_length: map_size.trailing_zeros() as u8,
            load_threshold: map_size * LOAD_FACTOR_NUMERATOR / LOAD_FACTOR_DENOMINATOR,
            keys: vec![0; map_size],
            values: vec![0; map_size],
            states: vec![0; map_size],
            num_active: 0,
        }
    }

    /// Returns the count for `key`, or zero if the key is not present.
    pub fn get(&self, key: i64) -> i64 {
        let mask = self.keys.len() - 1;
        let mut probe = (hash(key) as usize) & mask;
        while self.states[probe] != 0 {
            if self.keys[probe] == key {
                return self.values[probe];
            }
            probe = (probe + 1) & mask;
        }
        0
    }

    /// Adds `adjust_amount` to the count for `key`, inserting if absent.
    pub fn adjust_or_put_value(&mut self, key: i64, adjust_amount: i64) {
        let mask = self.keys.len() - 1;
        let mut probe = (hash(key) as usize) & mask;
        let mut drift: usize = 1;
        while self.states[probe] != 0 && self.keys[probe] != key {
            probe = (probe + 1) & mask;
            drift += 1;
            debug_assert!(drift < DRIFT_LIMIT, "drift limit exceeded");
        }
        if self.states[probe] == 0 {
            self.keys[probe] = key;
            self.values[probe] = adjust_amount;
            self.states[probe] = drift as u16;
            self.num_active += 1;
        } else {
            self.values[probe] += adjust_amount;
        }
    }

    /// Purges the map by sampling an approximate median count, subtracting it
    /// from every counter, and removing the non-positive entries.
    ///
    /// Returns the subtracted median.
    pub fn purge<R: Rng>(&mut self, sample_size: usize, rng: &mut R) -> i64 {
        let limit = sample_size.min(self.num_active);
        let mut sample = ReservoirSample::new(limit);
        for i in 0..self.values.len() {
            if self.states[i] != 0 {
                sample.offer(self.values[i], rng);
            }
        }
        let median = sample.select_median();
        self.adjust_all_values_by(-median);
        self.keep_only_positive_counts();
        median
    }

    /// Resizes the hash table to `new_size` (a larger power of two) and
    /// reinserts every active entry. Counts are unchanged.
    pub fn resize(&mut self, new_size: usize) {
        assert!(new_size.is_power_of_two(), "new_size must be power of 2");
        let old_keys = std::mem::replace(&mut self.keys, vec![0; new_size]);
        let old_values = std::mem::replace(&mut self.values, vec![0; new_size]);
        let old_states = std::mem::replace(&mut self.states, vec![0; new_size]);
        self.lg_length = new_size.trailing_zeros() as u8;
        self.load_threshold = new_size * LOAD_FACTOR_NUMERATOR / LOAD_FACTOR_DENOMINATOR;
        self.num_active = 0;
        for i in 0..old_keys.len() {
            if old_states[i] != 0 {
                self.adjust_or_put_value(old_keys[i], old_values[i]);
            }
        }
    }

    /// Returns the length of the underlying arrays.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns the log2 of the underlying array length.
    pub fn lg_length(&self) -> u8 {
        self.lg_length
    }

    /// Returns the maximum number of active entries before the owner must
    /// resize or purge.
    pub fn capacity(&self) -> usize {
        self.load_threshold
    }

    /// Returns the number of active entries in the map.
    pub fn num_active(&self) -> usize {
        self.num_active
    }

    /// Returns the active keys in slot order.
    pub fn active_keys(&self) -> Vec<i64> {
        let mut keys = Vec::with_capacity(self.num_active);
        for i in 0..self.keys.len() {
            if self.states[i] != 0 {
                keys.push(self.keys[i]);
            }
        }
        keys
    }

    /// Returns the active counts in slot order.
    pub fn active_values(&self) -> Vec<i64> {
        let mut values = Vec::with_capacity(self.num_active);
        for i in 0..self.values.len() {
            if self.states[i] != 0 {
                values.push(self.values[i]);
            }
        }
        values
    }

    /// Returns an iterator over active (key, count) pairs.
    pub fn iter(&self) -> ActiveEntryIter<'_> {
        ActiveEntryIter::new(self)
    }

    /// Subtracting the purge median drives some counters to zero or below;
    /// clusters are scanned back to front so each deletion's backward shift
    /// only touches slots that were already visited.
    fn keep_only_positive_counts(&mut self) {
        let len = self.keys.len();
        // The load threshold keeps at least one slot empty.
        let mut first_probe = len - 1;
        while self.states[first_probe] != 0 {
            first_probe -= 1;
        }
        for probe in (0..first_probe).rev() {
            if self.states[probe] != 0 && self.values[probe] <= 0 {
                self.hash_delete(probe);
                self.num_active -= 1;
            }
        }
        for probe in (first_probe..len).rev() {
            if self.states[probe] != 0 && self.values[probe] <= 0 {
                self.hash_delete(probe);
                self.num_active -= 1;
            }
        }
    }

    fn adjust_all_values_by(&mut self, adjust_amount: i64) {
        for value in self.values.iter_mut() {
            *value += adjust_amount;
        }
    }

    fn hash_delete(&mut self, mut delete_probe: usize) {
        self.states[delete_probe] = 0;
        self.values[delete_probe] = 0;
        let mask = self.keys.len() - 1;
        let mut drift: usize = 1;
        let mut probe = (delete_probe + drift) & mask;
        while self.states[probe] != 0 {
            if self.states[probe] as usize > drift {
                self.keys[delete_probe] = self.keys[probe];
                self.values[delete_probe] = self.values[probe];
                self.states[delete_probe] = self.states[probe] - drift as u16;
                self.states[probe] = 0;
                self.values[probe] = 0;
                drift = 0;
                delete_probe = probe;
            }
            probe = (probe + 1) & mask;
            drift += 1;
            debug_assert!(drift < DRIFT_LIMIT, "drift limit exceeded");
        }
    }
}

/// Iterator over active entries using a golden-ratio stride.
pub(crate) struct ActiveEntryIter<'a> {
    map: &'a ReversePurgeLongHashMap,
    index: usize,
    count: usize,
    stride: usize,
    mask: usize,
}

impl<'a> ActiveEntryIter<'a> {
    fn new(map: &'a ReversePurgeLongHashMap) -> Self {
        let size = map.keys.len();
        let stride = ((size as f64 * 0.6180339887498949) as usize) | 1;
        Self {
            map,
            index: 0usize.wrapping_sub(stride),
            count: 0,
            stride,
            mask: size - 1,
        }
    }
}

impl Iterator for ActiveEntryIter<'_> {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.count >= self.map.num_active {
            return None;
        }
        loop {
            self.index = self.index.wrapping_add(self.stride) & self.mask;
            if self.map.states[self.index] != 0 {
                self.count += 1;
                return Some((self.map.keys[self.index], self.map.values[self.index]));
            }
        }
    }
}

#[inline]
fn hash(key: i64) -> u64 {
    // 64-bit finalizer mix of MurmurHash3.
    let mut k = key as u64;
    k ^= k >> 33;
    k = k.wrapping_mul(0xff51_afd7_ed55_8ccd);
    k ^= k >> 33;
    k = k.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    k ^= k >> 33;
    k
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn test_get_missing_key_returns_zero() {
        let map = ReversePurgeLongHashMap::new(8);
        assert_eq!(map.get(17), 0);
        assert_eq!(map.num_active(), 0);
    }

    #[test]
    fn test_adjust_inserts_then_accumulates() {
        let mut map = ReversePurgeLongHashMap::new(8);
        map.adjust_or_put_value(5, 3);
        map.adjust_or_put_value(5, 4);
        map.adjust_or_put_value(-5, 1);
        assert_eq!(map.get(5), 7);
        assert_eq!(map.get(-5), 1);
        assert_eq!(map.num_active(), 2);
    }

    #[test]
    fn test_fill_to_capacity_and_read_back() {
        let mut map = ReversePurgeLongHashMap::new(8);
        for key in 0..6 {
            map.adjust_or_put_value(key, key + 1);
        }
        assert_eq!(map.num_active(), 6);
        for key in 0..6 {
            assert_eq!(map.get(key), key + 1);
        }
    }

    #[test]
    fn test_purge_removes_light_entries() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut map = ReversePurgeLongHashMap::new(8);
        map.adjust_or_put_value(1, 100);
        for key in 2..=6 {
            map.adjust_or_put_value(key, 1);
        }
        let median = map.purge(256, &mut rng);
        assert_eq!(median, 1);
        assert_eq!(map.num_active(), 1);
        assert_eq!(map.get(1), 99);
        assert_eq!(map.get(2), 0);
    }

    #[test]
    fn test_insert_after_purge_reuses_slots() {
        let mut rng = StdRng::seed_from_u64(12);
        let mut map = ReversePurgeLongHashMap::new(8);
        for key in 0..6 {
            map.adjust_or_put_value(key, 1);
        }
        map.purge(256, &mut rng);
        assert_eq!(map.num_active(), 0);
        for key in 10..16 {
            map.adjust_or_put_value(key, 2);
        }
        assert_eq!(map.num_active(), 6);
        for key in 10..16 {
            assert_eq!(map.get(key), 2);
        }
    }

    #[test]
    fn test_resize_preserves_entries() {
        let mut map = ReversePurgeLongHashMap::new(8);
        for key in 0..6 {
            map.adjust_or_put_value(key * 1000, key + 1);
        }
        map.resize(32);
        assert_eq!(map.len(), 32);
        assert_eq!(map.lg_length(), 5);
        assert_eq!(map.capacity(), 24);
        assert_eq!(map.num_active(), 6);
        for key in 0..6 {
            assert_eq!(map.get(key * 1000), key + 1);
        }
    }

    #[test]
    fn test_iterator_visits_each_active_entry_once() {
        let mut map = ReversePurgeLongHashMap::new(16);
        let mut expected = HashMap::new();
        for key in 0..10 {
            map.adjust_or_put_value(key * 7, key + 1);
            expected.insert(key * 7, key + 1);
        }
        let mut seen = HashMap::new();
        for (key, value) in map.iter() {
            assert!(seen.insert(key, value).is_none(), "duplicate key {key}");
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_active_keys_and_values_align() {
        let mut map = ReversePurgeLongHashMap::new(16);
        for key in 0..10 {
            map.adjust_or_put_value(key, 10 - key);
        }
        let keys = map.active_keys();
        let values = map.active_values();
        assert_eq!(keys.len(), 10);
        assert_eq!(values.len(), 10);
        for (key, value) in keys.iter().zip(values.iter()) {
            assert_eq!(*value, 10 - *key);
        }
    }
}
