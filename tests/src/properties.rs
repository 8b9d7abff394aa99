//! # Property Tests
//!
//! Codec stability, compact-target invariants and order independence of
//! the final chain graph.

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use num_bigint::BigUint;
    use primitive_types::U256;
    use proptest::prelude::*;

    use zeta_header_sync::test_utils::*;
    use zeta_header_sync::{
        decode_target, double_sha256, parse_header, split_headers, target_work, BlockHash,
        ChainGraphStore, Header, InMemoryKVStore, PowError, HEADER_SIZE,
    };

    /// Genesis plus a small tree: a main line and a side branch.
    fn fixture_tree() -> &'static Vec<Header> {
        static TREE: OnceLock<Vec<Header>> = OnceLock::new();
        TREE.get_or_init(|| {
            let genesis = regtest_genesis();
            let main = mine_chain(&genesis.hash, 6, EASY_NBITS, 1);
            let side = mine_chain(&main[1].hash, 2, HARDER_NBITS, 100);
            let mut all = vec![genesis];
            all.extend(main);
            all.extend(side);
            all
        })
    }

    fn arb_nbits() -> impl Strategy<Value = [u8; 4]> {
        any::<u32>().prop_map(u32::to_le_bytes)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn header_bytes_roundtrip(raw in prop::array::uniform32(any::<u8>()), tail in prop::collection::vec(any::<u8>(), 48)) {
            let mut bytes = raw.to_vec();
            bytes.extend(tail);
            prop_assert_eq!(bytes.len(), HEADER_SIZE);

            let header = parse_header(&bytes).unwrap();
            prop_assert_eq!(header.hex(), hex::encode(&bytes));
            prop_assert_eq!(header.hash, BlockHash::from_wire_bytes(double_sha256(&bytes)));
            prop_assert_eq!(parse_header(&header.raw).unwrap(), header);
        }

        #[test]
        fn split_preserves_order(blob in prop::collection::vec(any::<u8>(), 0..6 * HEADER_SIZE)) {
            let result = split_headers(&blob);
            if blob.len() % HEADER_SIZE == 0 {
                let headers = result.unwrap();
                prop_assert_eq!(headers.len(), blob.len() / HEADER_SIZE);
                for (chunk, header) in blob.chunks_exact(HEADER_SIZE).zip(&headers) {
                    prop_assert_eq!(&header.raw[..], chunk);
                }
            } else {
                prop_assert!(result.is_err());
            }
        }

        #[test]
        fn negative_mantissa_rejected_after_shift(nbits in arb_nbits()) {
            let compact = u32::from_le_bytes(nbits);
            let exponent = compact >> 24;
            let mut mantissa = compact & 0x007f_ffff;
            if exponent <= 3 {
                mantissa >>= 8 * (3 - exponent);
            }
            let negative = compact & 0x0080_0000 != 0 && mantissa != 0;
            if negative {
                prop_assert_eq!(decode_target(nbits), Err(PowError::NegativeTarget));
            } else {
                prop_assert_ne!(decode_target(nbits), Err(PowError::NegativeTarget));
            }
        }

        #[test]
        fn small_exponent_shifts_right(mantissa in 0u32..0x0080_0000, exponent in 0u32..=3) {
            let nbits = (mantissa | (exponent << 24)).to_le_bytes();
            let expected = U256::from(mantissa >> (8 * (3 - exponent)));
            prop_assert_eq!(decode_target(nbits).unwrap(), expected);
        }

        #[test]
        fn larger_exponent_larger_target(mantissa in 1u32..0x0080_0000, exponent in 3u32..0x20) {
            let low = decode_target((mantissa | (exponent << 24)).to_le_bytes());
            let high = decode_target((mantissa | ((exponent + 1) << 24)).to_le_bytes());
            if let (Ok(low), Ok(high)) = (low, high) {
                prop_assert!(high > low);
                prop_assert_eq!(high, low << 8);
            }
        }

        #[test]
        fn harder_target_more_work(a in arb_nbits(), b in arb_nbits()) {
            if let (Ok(ta), Ok(tb)) = (decode_target(a), decode_target(b)) {
                if !ta.is_zero() && !tb.is_zero() && ta <= tb {
                    prop_assert!(target_work(a) >= target_work(b));
                }
            }
        }

        #[test]
        fn work_is_positive_for_usable_targets(nbits in arb_nbits()) {
            let work = target_work(nbits);
            match decode_target(nbits) {
                Ok(target) if !target.is_zero() => prop_assert!(work > BigUint::from(0u8)),
                _ => prop_assert_eq!(work, BigUint::from(0u8)),
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn arrival_order_does_not_change_final_graph(
            order in Just((0..fixture_tree().len()).collect::<Vec<_>>()).prop_shuffle()
        ) {
            let tree = fixture_tree();

            let mut reference = ChainGraphStore::open(InMemoryKVStore::new()).unwrap();
            prop_assert!(reference.batch_store(tree.clone()));

            let mut shuffled = ChainGraphStore::open(InMemoryKVStore::new()).unwrap();
            for i in &order {
                prop_assert!(shuffled.store(tree[*i].clone()));
            }
            shuffled.repair_floating();

            prop_assert!(shuffled.find_floating().is_empty());
            for header in tree {
                prop_assert_eq!(
                    shuffled.find_by_hash(&header.hash).map(|s| s.linkage),
                    reference.find_by_hash(&header.hash).map(|s| s.linkage)
                );
            }
            prop_assert_eq!(
                shuffled.find_heaviest().iter().map(|s| s.hash()).collect::<Vec<_>>(),
                reference.find_heaviest().iter().map(|s| s.hash()).collect::<Vec<_>>()
            );
        }
    }
}
