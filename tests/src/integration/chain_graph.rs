//! # Chain Graph Scenarios
//!
//! The store fed the way a network would feed it: duplicated, out of
//! order, on competing branches, with the occasional bad header.

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;
    use zeta_header_sync::test_utils::*;
    use zeta_header_sync::{
        header_work, BlockHash, ChainGraphStore, Checkpoint, HeaderLinkage, InMemoryKVStore,
        Network, MAINNET_GENESIS_HEX,
    };

    type Store = ChainGraphStore<InMemoryKVStore>;

    fn empty_store() -> Store {
        ChainGraphStore::open(InMemoryKVStore::new()).unwrap()
    }

    fn rooted_store() -> (Store, BlockHash) {
        let mut store = empty_store();
        let genesis = regtest_genesis();
        assert!(store.store(genesis.clone()));
        (store, genesis.hash)
    }

    // =============================================================================
    // IDEMPOTENCE AND REJECTION
    // =============================================================================

    #[test]
    fn test_storing_twice_changes_nothing() {
        let (mut store, root) = rooted_store();
        let header = mine_header(&root, EASY_NBITS, 10);

        assert!(store.store(header.clone()));
        let first = store.find_by_hash(&header.hash).unwrap();
        let len = store.len();

        assert!(store.store(header.hex().as_str()));
        assert!(store.store(header.raw.to_vec()));
        assert_eq!(store.len(), len);
        assert_eq!(store.find_by_hash(&header.hash).unwrap(), first);
    }

    #[test]
    fn test_insufficient_work_leaves_store_unchanged() {
        let (mut store, root) = rooted_store();
        let bad = invalid_work_header(&root);

        assert!(!store.store(bad.clone()));
        assert_eq!(store.len(), 1);
        assert!(store.find_by_hash(&bad.hash).is_none());
        assert!(store.find_floating().is_empty());
    }

    #[test]
    fn test_malformed_input_rejected() {
        let mut store = empty_store();
        assert!(!store.store("zz"));
        assert!(!store.store(&regtest_genesis().hex()[..158]));
        assert!(!store.store(vec![0u8; 81]));
        assert!(store.is_empty());
    }

    #[test]
    fn test_batch_with_one_bad_header_stores_nothing() {
        let (mut store, root) = rooted_store();
        let mut batch = mine_chain(&root, 3, EASY_NBITS, 20);
        batch.push(invalid_work_header(&batch[2].hash));

        assert!(!store.batch_store(batch.clone()));
        assert_eq!(store.len(), 1);
        for header in &batch {
            assert!(store.find_by_hash(&header.hash).is_none());
        }
    }

    #[test]
    fn test_conflicting_root_rejected() {
        let (mut store, _) = rooted_store();
        // Mainnet genesis also claims height 0
        assert!(!store.store(MAINNET_GENESIS_HEX));
        assert!(!store.store_checkpoint(MAINNET_GENESIS_HEX, 0, None));
        assert_eq!(store.find_by_height(0).len(), 1);
    }

    // =============================================================================
    // ANCESTRY
    // =============================================================================

    #[test]
    fn test_reverse_arrival_links_after_repair() {
        let (mut store, root) = rooted_store();
        let chain = mine_chain(&root, 6, EASY_NBITS, 30);

        for header in chain.iter().rev() {
            assert!(store.store(header.clone()));
        }
        // Only the first child found its parent on arrival
        assert_eq!(store.find_floating().len(), 5);
        assert_eq!(store.find_highest()[0].hash(), chain[0].hash);

        assert_eq!(store.repair_floating(), 5);
        assert!(store.find_floating().is_empty());

        for (i, header) in chain.iter().enumerate() {
            let stored = store.find_by_hash(&header.hash).unwrap();
            assert_eq!(stored.height(), Some(i as u64 + 1));
            assert_eq!(stored.accumulated_work(), BigUint::from(2u32 * (i as u32 + 2)));
        }
        assert_eq!(store.verify_linkage().unwrap(), 6);
    }

    #[test]
    fn test_missing_middle_header_repairs_descendants() {
        let (mut store, root) = rooted_store();
        let chain = mine_chain(&root, 5, EASY_NBITS, 40);

        let without_middle: Vec<_> = chain
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 2)
            .map(|(_, h)| h.clone())
            .collect();
        assert!(store.batch_store(without_middle));
        assert_eq!(store.find_floating().len(), 2);
        assert_eq!(store.find_highest()[0].height(), Some(2));

        assert!(store.store(chain[2].clone()));
        assert_eq!(store.repair_floating(), 2);
        assert_eq!(store.find_highest()[0].hash(), chain[4].hash);
        assert_eq!(store.find_by_height(5)[0].hash(), chain[4].hash);
    }

    #[test]
    fn test_checkpoint_anchors_mainnet_headers() {
        let mut store = empty_store();
        let cp = Checkpoint::hardcoded(500, MAINNET_500_HEX);
        assert!(store.store_checkpoint(cp.header_hex.as_str(), cp.height, cp.chain_work));

        // 502 arrives before 501
        assert!(store.store(MAINNET_502_HEX));
        assert!(store.store(MAINNET_501_HEX));
        assert_eq!(store.find_floating().len(), 1);
        store.repair_floating();

        let tip = &store.find_heaviest()[0];
        assert_eq!(tip.hash(), fixture(MAINNET_502_HEX).hash);
        assert_eq!(tip.height(), Some(502));
        assert_eq!(tip.accumulated_work(), BigUint::from(3 * DIFFICULTY_ONE_WORK));
    }

    #[test]
    fn test_checkpoint_with_chain_work() {
        let mut store = empty_store();
        let work = BigUint::from(1_000_000u32);
        assert!(store.store_checkpoint(MAINNET_500_HEX, 500, Some(work.clone())));
        assert!(store.store(MAINNET_501_HEX));

        let linked = store.find_by_height(501).pop().unwrap();
        assert_eq!(
            linked.linkage,
            HeaderLinkage::Linked {
                height: 501,
                accumulated_work: work + BigUint::from(DIFFICULTY_ONE_WORK),
            }
        );
    }

    #[test]
    fn test_network_checkpoints_are_valid_roots() {
        for network in [Network::Mainnet, Network::Testnet, Network::Regtest] {
            let mut store = empty_store();
            for cp in network.checkpoints() {
                assert!(
                    store.store_checkpoint(cp.header_hex.as_str(), cp.height, cp.chain_work.clone()),
                    "{} checkpoint at {}",
                    network,
                    cp.height
                );
            }
            let latest = network.latest_checkpoint();
            assert_eq!(store.find_highest()[0].height(), Some(latest.height));
        }
    }

    // =============================================================================
    // FORKS
    // =============================================================================

    #[test]
    fn test_heaviest_and_highest_diverge() {
        let (mut store, root) = rooted_store();
        let long_easy = mine_chain(&root, 5, EASY_NBITS, 100);
        let short_hard = mine_chain(&root, 2, HARDER_NBITS, 200);

        assert!(store.batch_store(long_easy.clone()));
        assert!(store.batch_store(short_hard.clone()));

        let highest = store.find_highest();
        assert_eq!(highest.len(), 1);
        assert_eq!(highest[0].hash(), long_easy[4].hash);
        assert_eq!(highest[0].accumulated_work(), BigUint::from(12u32));

        let heaviest = store.find_heaviest();
        assert_eq!(heaviest.len(), 1);
        assert_eq!(heaviest[0].hash(), short_hard[1].hash);
        assert_eq!(heaviest[0].height(), Some(2));
        assert_eq!(
            heaviest[0].accumulated_work(),
            BigUint::from(2u32) + header_work(&short_hard[0]) * 2u32
        );
    }

    #[test]
    fn test_equal_siblings_are_both_tips() {
        let (mut store, root) = rooted_store();
        let a = mine_header(&root, EASY_NBITS, 1_000);
        let b = mine_header(&root, EASY_NBITS, 2_000);
        assert!(store.store(a.clone()));
        assert!(store.store(b.clone()));

        let mut highest: Vec<_> = store.find_highest().iter().map(|s| s.hash()).collect();
        let mut heaviest: Vec<_> = store.find_heaviest().iter().map(|s| s.hash()).collect();
        let mut expected = vec![a.hash, b.hash];
        highest.sort_by_key(|h| *h.as_wire_bytes());
        heaviest.sort_by_key(|h| *h.as_wire_bytes());
        expected.sort_by_key(|h| *h.as_wire_bytes());

        assert_eq!(highest, expected);
        assert_eq!(heaviest, expected);
        assert_eq!(store.find_by_height(1).len(), 2);
    }

    #[test]
    fn test_reorg_to_heavier_branch() {
        let (mut store, root) = rooted_store();
        let main = mine_chain(&root, 3, EASY_NBITS, 300);
        assert!(store.batch_store(main.clone()));
        assert_eq!(store.find_heaviest()[0].hash(), main[2].hash);

        let fork = mine_chain(&main[0].hash, 1, HARDER_NBITS, 400);
        assert!(store.batch_store(fork.clone()));

        assert_eq!(store.find_heaviest()[0].hash(), fork[0].hash);
        assert_eq!(store.find_highest()[0].hash(), main[2].hash);
        // The old branch is kept
        assert!(store.find_by_hash(&main[2].hash).is_some());
    }
}
