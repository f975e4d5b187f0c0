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

//! Bounded uniform sampling of counter values.
//!
//! A purge needs a robust split value without sorting the whole table. The
//! reservoir keeps a uniform sample of the counters it is offered, and the
//! median of that sample approximates the median of the full population with
//! high probability. Uniformity makes the choice independent of slot order,
//! so sorted or reverse-sorted input streams cannot bias repeated purges.

use rand::Rng;

/// Fixed-capacity uniform sample of counter values (Algorithm R).
#[derive(Debug)]
pub(crate) struct ReservoirSample {
    capacity: usize,
    values: Vec<i64>,
    seen: u64,
}

impl ReservoirSample {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: Vec::with_capacity(capacity),
            seen: 0,
        }
    }

    /// Offers one counter value to the sample.
    ///
    /// After `n` offers each of them is retained with probability
    /// `capacity / n`.
    pub fn offer<R: Rng>(&mut self, value: i64, rng: &mut R) {
        self.seen += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
            return;
        }
        let slot = rng.random_range(0..self.seen);
        if (slot as usize) < self.capacity {
            self.values[slot as usize] = value;
        }
    }

    /// Consumes the sample and returns its median, or zero if nothing was
    /// offered.
    pub fn select_median(mut self) -> i64 {
        if self.values.is_empty() {
            return 0;
        }
        let mid = self.values.len() / 2;
        let (_, median, _) = self.values.select_nth_unstable(mid);
        *median
    }
}
