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

use std::collections::HashMap;

use freqsketch::ErrorType;
use freqsketch::FrequentLongsSketch;

#[test]
fn test_merge_exact_mode() {
    let mut sketch1 = FrequentLongsSketch::new(8).unwrap();
    sketch1.update(1).unwrap();
    sketch1.update(2).unwrap();
    sketch1.update(2).unwrap();

    let mut sketch2 = FrequentLongsSketch::new(8).unwrap();
    sketch2.update(2).unwrap();
    sketch2.update(3).unwrap();

    sketch1.merge(&sketch2);

    assert!(!sketch1.is_empty());
    assert_eq!(sketch1.stream_length(), 5);
    assert_eq!(sketch1.num_active_items(), 3);
    assert_eq!(sketch1.estimate(1), 1);
    assert_eq!(sketch1.estimate(2), 3);
    assert_eq!(sketch1.estimate(3), 1);
    assert_eq!(sketch1.maximum_error(), 0);
}

#[test]
fn test_merge_empty_is_noop() {
    let mut sketch = FrequentLongsSketch::new(8).unwrap();
    sketch.update_with_count(1, 10).unwrap();
    for item in 2..=7 {
        sketch.update(item).unwrap();
    }
    let offset_before = sketch.maximum_error();
    let stream_before = sketch.stream_length();
    let active_before = sketch.num_active_items();
    let estimate_before = sketch.estimate(1);
    let upper_before = sketch.upper_bound(1);
    let lower_before = sketch.lower_bound(1);

    let empty = FrequentLongsSketch::new(8).unwrap();
    sketch.merge(&empty);

    assert_eq!(sketch.maximum_error(), offset_before);
    assert_eq!(sketch.stream_length(), stream_before);
    assert_eq!(sketch.num_active_items(), active_before);
    assert_eq!(sketch.estimate(1), estimate_before);
    assert_eq!(sketch.upper_bound(1), upper_before);
    assert_eq!(sketch.lower_bound(1), lower_before);
}

#[test]
fn test_merge_into_empty() {
    let mut target = FrequentLongsSketch::new(8).unwrap();

    let mut source = FrequentLongsSketch::new(8).unwrap();
    source.update_with_count(3, 7).unwrap();
    source.update_with_count(4, 2).unwrap();

    target.merge(&source);

    assert_eq!(target.stream_length(), 9);
    assert_eq!(target.num_active_items(), 2);
    assert_eq!(target.estimate(3), 7);
    assert_eq!(target.estimate(4), 2);
}

#[test]
fn test_merge_estimation_mode() {
    let mut sketch1 = FrequentLongsSketch::new(16).unwrap();
    sketch1.update_with_count(1, 9).unwrap();
    for item in 2..=14 {
        sketch1.update(item).unwrap();
    }
    assert!(sketch1.maximum_error() > 0);

    let mut sketch2 = FrequentLongsSketch::new(16).unwrap();
    for item in 8..=20 {
        sketch2.update(item).unwrap();
    }
    sketch2.update_with_count(21, 11).unwrap();
    assert!(sketch2.maximum_error() > 0);

    sketch1.merge(&sketch2);

    assert!(!sketch1.is_empty());
    assert_eq!(sketch1.stream_length(), 46);

    let rows = sketch1.frequent_items_with_threshold(ErrorType::NoFalsePositives, 2);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].item(), 21);
    assert!(rows[0].estimate() >= 11);
    assert_eq!(rows[1].item(), 1);
    assert!(rows[1].estimate() >= 9);
}

#[test]
fn test_merge_offsets_accumulate() {
    let mut sketch1 = FrequentLongsSketch::new(8).unwrap();
    for item in 1..=20 {
        sketch1.update(item).unwrap();
    }
    let offset1 = sketch1.maximum_error();
    assert!(offset1 > 0);

    let mut sketch2 = FrequentLongsSketch::new(8).unwrap();
    for item in 30..=49 {
        sketch2.update(item).unwrap();
    }
    let offset2 = sketch2.maximum_error();
    assert!(offset2 > 0);

    sketch1.merge(&sketch2);

    assert!(sketch1.maximum_error() >= offset1 + offset2);
}

#[test]
fn test_merge_across_capacities_conserves_stream_length() {
    let mut small = FrequentLongsSketch::with_seed(8, 7).unwrap();
    let mut exact: HashMap<i64, i64> = HashMap::new();
    for i in 0..300i64 {
        let item = i % 40;
        let weight = i % 5 + 1;
        small.update_with_count(item, weight).unwrap();
        *exact.entry(item).or_insert(0) += weight;
    }

    let mut large = FrequentLongsSketch::with_seed(64, 8).unwrap();
    for i in 0..500i64 {
        let item = i % 90 + 20;
        let weight = i % 3 + 1;
        large.update_with_count(item, weight).unwrap();
        *exact.entry(item).or_insert(0) += weight;
    }

    let small_stream = small.stream_length();
    let large_stream = large.stream_length();

    let mut merged = large.clone();
    merged.merge(&small);

    assert_eq!(merged.stream_length(), small_stream + large_stream);
    assert!(merged.maximum_error() >= large.maximum_error() + small.maximum_error());

    // The merged bounds must still sandwich the exact combined frequencies.
    for (&item, &truth) in &exact {
        assert!(merged.lower_bound(item) <= truth);
        assert!(merged.upper_bound(item) >= truth);
    }
}

#[test]
fn test_merge_both_empty() {
    let mut sketch1 = FrequentLongsSketch::new(8).unwrap();
    let sketch2 = FrequentLongsSketch::new(64).unwrap();
    sketch1.merge(&sketch2);

    assert!(sketch1.is_empty());
    assert_eq!(sketch1.stream_length(), 0);
    assert_eq!(sketch1.maximum_error(), 0);
}
