use paste::paste;
use seq_macro::seq;

use crate::bulk::{
    BulkOperationPacked, Width, bulk_operation, decode_bytes, decode_u64,
    encode_bytes, encode_u64,
};
use crate::format::{Format, SINGLE_BLOCK_WIDTHS};

fn random_values(count: usize, bits_per_value: u32) -> Vec<u64> {
    let mask = stowage_bits::max_value(bits_per_value);
    (0..count).map(|_| fastrand::u64(..) & mask).collect()
}

fn check_specialized_matches_generic<const BITS: u32>() {
    let generic = BulkOperationPacked::new(BITS);
    for iterations in [1, 2, 7, 33] {
        let values = random_values(iterations * Width::<BITS>::LONG_VALUES, BITS);

        let mut generic_blocks = vec![0u64; iterations * Width::<BITS>::LONG_BLOCKS];
        generic.encode_u64(&values, &mut generic_blocks, iterations);
        let mut fixed_blocks = vec![0u64; generic_blocks.len()];
        encode_u64::<BITS>(&values, &mut fixed_blocks, iterations);
        assert_eq!(fixed_blocks, generic_blocks);

        let mut decoded = vec![0u64; values.len()];
        decode_u64::<BITS>(&generic_blocks, &mut decoded, iterations);
        assert_eq!(decoded, values);

        let values = random_values(iterations * Width::<BITS>::BYTE_VALUES, BITS);
        let mut generic_bytes = vec![0u8; iterations * Width::<BITS>::BYTE_BLOCKS];
        generic.encode_bytes(&values, &mut generic_bytes, iterations);
        let mut fixed_bytes = vec![0u8; generic_bytes.len()];
        encode_bytes::<BITS>(&values, &mut fixed_bytes, iterations);
        assert_eq!(fixed_bytes, generic_bytes);

        let mut generic_decoded = vec![0u64; values.len()];
        generic.decode_bytes(&generic_bytes, &mut generic_decoded, iterations);
        let mut fixed_decoded = vec![0u64; values.len()];
        decode_bytes::<BITS>(&generic_bytes, &mut fixed_decoded, iterations);
        assert_eq!(fixed_decoded, generic_decoded);
        assert_eq!(fixed_decoded, values);
    }
}

seq!(W in 1..=64 {
    paste! {
        #[test]
        fn [<test_specialized_matches_generic_ W>]() {
            fastrand::seed(W);
            check_specialized_matches_generic::<W>();
        }
    }
});

fn check_round_trip(format: Format, bits_per_value: u32) {
    let op = bulk_operation(format, bits_per_value).unwrap();
    for iterations in [1, 3, 10] {
        let values = random_values(iterations * op.long_value_count(), bits_per_value);
        let mut blocks = vec![0u64; iterations * op.long_block_count()];
        op.encode_u64(&values, &mut blocks, iterations);
        let mut decoded = vec![0u64; values.len()];
        op.decode_u64(&blocks, &mut decoded, iterations);
        assert_eq!(decoded, values, "{format:?} {bits_per_value}");

        let values = random_values(iterations * op.byte_value_count(), bits_per_value);
        let mut bytes = vec![0u8; iterations * op.byte_block_count()];
        op.encode_bytes(&values, &mut bytes, iterations);
        let mut decoded = vec![0u64; values.len()];
        op.decode_bytes(&bytes, &mut decoded, iterations);
        assert_eq!(decoded, values, "{format:?} {bits_per_value}");
    }
}

#[test]
fn test_packed_round_trip_all_widths() {
    fastrand::seed(640);
    for bits in 1..=64 {
        check_round_trip(Format::Packed, bits);
    }
}

#[test]
fn test_single_block_round_trip_all_widths() {
    fastrand::seed(140);
    for bits in SINGLE_BLOCK_WIDTHS {
        check_round_trip(Format::PackedSingleBlock, bits);
    }
}

#[test]
fn test_long_and_byte_layouts_agree() {
    fastrand::seed(3);
    for bits in 1..=64 {
        let op = bulk_operation(Format::Packed, bits).unwrap();
        let iterations = 2;
        let values = random_values(iterations * op.long_value_count(), bits);
        let mut blocks = vec![0u64; iterations * op.long_block_count()];
        op.encode_u64(&values, &mut blocks, iterations);
        let bytes: Vec<u8> = blocks.iter().flat_map(|b| b.to_be_bytes()).collect();

        let byte_iterations = values.len() / op.byte_value_count();
        let mut decoded = vec![0u64; values.len()];
        op.decode_bytes(&bytes, &mut decoded, byte_iterations);
        assert_eq!(decoded, values, "bits {bits}");
    }
}
