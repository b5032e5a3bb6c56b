use stowage_io::ByteSlice;

use crate::block_packed::{BlockPackedReaderIterator, BlockPackedWriter};
use crate::direct_monotonic::{DirectMonotonicMeta, DirectMonotonicReader, DirectMonotonicWriter};
use crate::format::{COMPACT, DEFAULT, FAST, FASTEST, FormatAndBits};
use crate::growable_writer::GrowableWriter;
use crate::ints::{PackedMutable, PackedReader};
use crate::monotonic_block_packed::{MonotonicBlockPackedReader, MonotonicBlockPackedWriter};

#[test]
fn test_growable_writer_never_loses_values() {
    fastrand::seed(1001);
    for ratio in [COMPACT, DEFAULT, FASTEST] {
        let size = 500;
        let mut writer = GrowableWriter::new(1, size, ratio);
        let mut expected = vec![0u64; size];
        let mut max_set = 0u64;
        for round in 0..300 {
            let bits = fastrand::u32(1..=64);
            let value = fastrand::u64(..) & stowage_bits::max_value(bits);
            if round % 5 == 0 {
                let start = fastrand::usize(..size);
                let len = fastrand::usize(1..=(size - start).min(40));
                let values: Vec<u64> = (0..len).map(|i| value >> (i % 8)).collect();
                let mut i = 0;
                while i < len {
                    i += writer.bulk_set(start + i, &values[i..]);
                }
                expected[start..start + len].copy_from_slice(&values);
                max_set |= value;
            } else {
                let index = fastrand::usize(..size);
                writer.set(index, value);
                expected[index] = value;
                max_set = max_set.max(value);
            }
            assert!(writer.bits_per_value() >= stowage_bits::unsigned_bits_required(max_set));
        }
        for (i, &v) in expected.iter().enumerate() {
            assert_eq!(writer.get(i), v, "ratio {ratio} index {i}");
        }
    }
}

#[test]
fn test_block_packed_skip_matches_sequential_read() {
    fastrand::seed(2002);
    let block_size = 64;
    let count = 1000u64;
    let values: Vec<i64> = (0..count)
        .map(|i| match i / 200 {
            0 => 7,
            1 => fastrand::i64(..),
            _ => fastrand::i64(-300..300),
        })
        .collect();
    let mut writer = BlockPackedWriter::new(Vec::new(), block_size).unwrap();
    for &v in &values {
        writer.add(v).unwrap();
    }
    writer.finish().unwrap();
    let bytes = writer.into_inner();

    for k in [0, 1, 63, 64, 65, 199, 200, 640, 999, 1000] {
        let mut iter = BlockPackedReaderIterator::new(bytes.as_slice(), block_size, count).unwrap();
        iter.skip_values(k).unwrap();
        assert_eq!(iter.ord(), k);
        let rest = iter.collect::<stowage_common::Result<Vec<_>>>().unwrap();
        assert_eq!(rest, values[k as usize..], "skip {k}");
    }

    // skipping in several steps lands on the same value
    let mut iter = BlockPackedReaderIterator::new(bytes.as_slice(), block_size, count).unwrap();
    for step in [3, 100, 64, 1, 300] {
        let before = iter.ord();
        iter.skip_values(step).unwrap();
        assert_eq!(iter.next_value().unwrap(), values[(before + step) as usize]);
    }
    assert!(iter.skip_values(count).is_err());
}

#[test]
fn test_monotonic_block_packed_round_trip() {
    fastrand::seed(3003);
    let mut value = i64::MIN / 2;
    let values: Vec<i64> = (0..5000)
        .map(|_| {
            value += fastrand::i64(0..1 << 30);
            value
        })
        .collect();
    for block_size in [64, 256, 4096] {
        let mut writer = MonotonicBlockPackedWriter::new(Vec::new(), block_size).unwrap();
        for &v in &values {
            writer.add(v).unwrap();
        }
        writer.finish().unwrap();
        let bytes = writer.into_inner();
        let reader =
            MonotonicBlockPackedReader::new(&mut bytes.as_slice(), block_size, values.len() as u64)
                .unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(reader.get(i as u64), v);
        }
    }
}

#[test]
fn test_direct_monotonic_bounds_and_search() {
    fastrand::seed(4004);
    for block_shift in [2, 5, 9] {
        let mut value = 0i64;
        let values: Vec<i64> = (0..2000)
            .map(|i| {
                // long flat runs followed by jumps
                if i % 97 == 0 {
                    value += fastrand::i64(0..1 << 40);
                } else if fastrand::bool() {
                    value += fastrand::i64(0..8);
                }
                value
            })
            .collect();

        let mut meta = Vec::new();
        let mut data = Vec::new();
        let mut writer =
            DirectMonotonicWriter::new(&mut meta, &mut data, values.len() as u64, block_shift)
                .unwrap();
        for &v in &values {
            writer.add(v).unwrap();
        }
        writer.finish().unwrap();
        let meta =
            DirectMonotonicMeta::load(&mut meta.as_slice(), values.len() as u64, block_shift)
                .unwrap();
        let reader = DirectMonotonicReader::new(&meta, &ByteSlice::from(data)).unwrap();

        for (i, &v) in values.iter().enumerate() {
            assert_eq!(reader.get(i as u64), v);
            let (lower, upper) = reader.bounds(i as u64);
            assert!(lower <= v && v <= upper, "shift {block_shift} index {i}");
        }
        for _ in 0..300 {
            let from = fastrand::usize(..values.len());
            let to = fastrand::usize(from..=values.len());
            let key = if fastrand::bool() && from < to {
                values[fastrand::usize(from..to)]
            } else {
                fastrand::i64(-10..value + 10)
            };
            let found = reader.binary_search(from as u64, to as u64, key).unwrap();
            let range = &values[from..to];
            if found >= 0 {
                assert!((from..to).contains(&(found as usize)));
                assert_eq!(values[found as usize], key);
            } else {
                assert!(!range.contains(&key));
                let insertion = (from + range.partition_point(|&v| v < key)) as i64;
                assert_eq!(found, -1 - insertion);
            }
        }
    }
}

#[test]
fn test_format_selection_is_deterministic() {
    for bits in 1..=64 {
        for ratio in [COMPACT, DEFAULT, FAST, FASTEST, 1.5, -1.0, 100.0] {
            for count in [None, Some(0), Some(1000), Some(usize::MAX)] {
                let first = FormatAndBits::fastest(count, bits, ratio);
                let second = FormatAndBits::fastest(count, bits, ratio);
                assert_eq!(first, second);
                assert!(first.bits_per_value >= bits);
                assert!(first.format.is_supported(first.bits_per_value));
            }
        }
    }
}
