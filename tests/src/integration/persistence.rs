//! # Persistence Scenarios
//!
//! The file-backed store across restarts.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tempfile::TempDir;

    use zeta_header_sync::test_utils::*;
    use zeta_header_sync::{
        ChainGraphStore, Checkpoint, FileBackedKVStore, HeaderSyncApi, HeaderSyncConfig,
        HeaderSyncService, MockHeaderSource,
    };

    #[test]
    fn test_floating_headers_survive_restart() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zeta_bitcoin_regtest.db");
        let genesis = regtest_genesis();
        let chain = mine_chain(&genesis.hash, 4, EASY_NBITS, 1);

        {
            let mut store = ChainGraphStore::open(FileBackedKVStore::open(&path).unwrap()).unwrap();
            assert!(store.store(genesis.clone()));
            assert!(store.store(chain[3].clone()));
            assert!(store.store(chain[2].clone()));
            assert_eq!(store.find_floating().len(), 2);
        }

        let mut store = ChainGraphStore::open(FileBackedKVStore::open(&path).unwrap()).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.find_floating().len(), 2);

        assert!(store.batch_store(chain[..2].to_vec()));
        assert_eq!(store.repair_floating(), 2);
        assert_eq!(store.find_heaviest()[0].hash(), chain[3].hash);
        assert_eq!(store.find_heaviest()[0].height(), Some(4));
    }

    #[tokio::test]
    async fn test_service_restart_resumes_catch_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("zeta_bitcoin_regtest.db");
        let genesis = regtest_genesis();
        let mut chain = vec![genesis.clone()];
        chain.extend(mine_chain(&genesis.hash, 14, EASY_NBITS, 1));
        let cp = Checkpoint::genesis(genesis.hex());

        // First run sees only part of the chain
        {
            let source = Arc::new(MockHeaderSource::with_headers(0, hex_list(&chain[..9])));
            let store = ChainGraphStore::open(FileBackedKVStore::open(&path).unwrap())
                .unwrap()
                .into_shared();
            let svc = HeaderSyncService::new(HeaderSyncConfig::for_testing(), store, source);
            let start = svc.bootstrap(&cp).await.unwrap();
            svc.catch_up(start).await.unwrap();
            assert_eq!(svc.best_tip().unwrap().height, 8);
        }

        let source = MockHeaderSource::with_headers(0, hex_list(&chain));
        let store = ChainGraphStore::open(FileBackedKVStore::open(&path).unwrap())
            .unwrap()
            .into_shared();
        let svc = HeaderSyncService::new(
            HeaderSyncConfig::for_testing(),
            store,
            Arc::new(source.clone()),
        );
        let start = svc.bootstrap(&cp).await.unwrap();
        assert_eq!(start, 8);

        svc.catch_up(start).await.unwrap();
        assert_eq!(source.requests()[0], (8, 10));
        assert_eq!(svc.best_tip().unwrap().height, 14);
    }
}
