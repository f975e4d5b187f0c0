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

//! A frequent items (heavy hitters) sketch over streams of weighted 64-bit
//! keys.
//!
//! # Overview
//!
//! This sketch tracks approximate frequencies of `i64` items with optional
//! associated counts (`i64` item, `i64` count) that are members of a multiset
//! of such items. The true frequency of an item is the sum of its associated
//! counts. The sketch makes a single pass over the stream and its memory
//! never depends on the number of distinct items seen.
//!
//! This implementation provides the following capabilities:
//! * Estimate the frequency of an item.
//! * Return upper and lower bounds for any item, such that the true
//!   frequency is always between the bounds.
//! * Return a global maximum error that holds for all items in the stream.
//! * Return the frequent items that qualify either
//!   [`ErrorType::NoFalsePositives`] or [`ErrorType::NoFalseNegatives`].
//! * Merge itself with another sketch of this crate, possibly one built with
//!   a different maximum map size.
//! * Serialize to bytes or to a string, and deserialize from either.
//!
//! # Space usage
//!
//! The sketch is configured with a `max_map_size` that bounds the physical
//! length of the internal hash map of (item, count) pairs and must be a
//! power of two. The map starts small and grows as needed up to
//! `max_map_size`; the load factor is fixed at 75%, so the number of tracked
//! counters never exceeds `0.75 * max_map_size`. Once the map is full at its
//! maximum size, further growth is replaced by a purge: every counter is
//! decremented by an approximate median of the counters and the non-positive
//! ones are discarded.
//!
//! # Accuracy
//!
//! If fewer than `0.75 * max_map_size` distinct items are inserted, the
//! returned frequencies are exact. Beyond that, for any specific item it is
//! guaranteed that the true frequency lies between the Upper Bound (UB) and
//! the Lower Bound (LB) computed for that item, and `(UB - LB) <= W *
//! epsilon`, where `W` is the total stream weight and `epsilon = 4/M` for a
//! maximum map size `M`. This is the worst case over arbitrary inputs; for
//! typical streams `(UB - LB)` is much smaller.
//!
//! The purge decrement is the median of a bounded uniform sample of the
//! counters rather than of the full population. There is an astronomically
//! small probability that the sampled median falls far enough from the true
//! median for the worst-case bound above not to apply to a given run.
//! Sampling uses a generator owned by the sketch;
//! [`FrequentLongsSketch::with_seed`] makes it deterministic for
//! reproducible runs.
//!
//! # Background
//!
//! This code implements a variant of what is commonly known as the
//! "Misra-Gries algorithm". Variants of it were discovered and rediscovered
//! and redesigned several times over the years:
//! * "Finding repeated elements", Misra, Gries, 1982
//! * "Frequency estimation of Internet packet streams with limited space",
//!   Demaine, Lopez-Ortiz, Munro, 2002
//! * "A simple algorithm for finding frequent elements in streams and bags",
//!   Karp, Shenker, Papadimitriou, 2003
//! * "Efficient Computation of Frequent and Top-k Elements in Data Streams",
//!   Metwally, Agrawal, Abbadi, 2006
//!
//! # Examples
//!
//! ```
//! # use freqsketch::ErrorType;
//! # use freqsketch::FrequentLongsSketch;
//! let mut sketch = FrequentLongsSketch::new(64).unwrap();
//! sketch.update_with_count(1, 3).unwrap();
//! sketch.update(2).unwrap();
//! let rows = sketch.frequent_items(ErrorType::NoFalseNegatives);
//! assert!(rows.iter().any(|row| row.item() == 1));
//! ```
//!
//! # Serialization
//!
//! ```
//! # use freqsketch::FrequentLongsSketch;
//! let mut sketch = FrequentLongsSketch::new(64).unwrap();
//! sketch.update_with_count(42, 2).unwrap();
//!
//! let bytes = sketch.serialize();
//! let decoded = FrequentLongsSketch::deserialize(&bytes).unwrap();
//! assert_eq!(decoded.estimate(42), 2);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod error;

mod reverse_purge_hash_map;
mod sample;
mod serialization;
mod sketch;

pub use self::sketch::ErrorType;
pub use self::sketch::FrequentLongsSketch;
pub use self::sketch::Row;
