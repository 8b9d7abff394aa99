//! # Sync Flow Scenarios
//!
//! The sync service driven end to end: bootstrap, paged catch-up, live
//! tips, and several sources voting through the quorum adapter.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use zeta_header_sync::test_utils::*;
    use zeta_header_sync::{
        ChainGraphStore, Checkpoint, Header, HeaderNotification, HeaderSource, HeaderSyncApi,
        HeaderSyncConfig, HeaderSyncService, InMemoryKVStore, MockHeaderSource,
        QuorumHeaderSource, QuorumSettings, SyncSupervisor, TipHeader,
    };

    fn regtest_chain(len: usize, start_ts: u32) -> Vec<Header> {
        let genesis = regtest_genesis();
        let mut chain = vec![genesis.clone()];
        chain.extend(mine_chain(&genesis.hash, len - 1, EASY_NBITS, start_ts));
        chain
    }

    fn service<S: HeaderSource + ?Sized + 'static>(
        source: Arc<S>,
    ) -> Arc<HeaderSyncService<S, InMemoryKVStore>> {
        let store = ChainGraphStore::open(InMemoryKVStore::new())
            .unwrap()
            .into_shared();
        Arc::new(HeaderSyncService::new(
            HeaderSyncConfig::for_testing(),
            store,
            source,
        ))
    }

    fn tip(header: &Header, height: u64) -> HeaderNotification {
        HeaderNotification::Single(TipHeader {
            hex: header.hex(),
            height,
        })
    }

    // =============================================================================
    // CATCH-UP
    // =============================================================================

    #[tokio::test]
    async fn test_pagination_requests_overlap() {
        let chain = regtest_chain(30, 1);
        let source = MockHeaderSource::with_headers(0, hex_list(&chain));
        let svc = service(Arc::new(source.clone()));

        let start = svc
            .bootstrap(&Checkpoint::genesis(chain[0].hex()))
            .await
            .unwrap();
        assert_eq!(start, 0);

        let report = svc.catch_up(start).await.unwrap();
        // 10-header pages overlapping by 2: 0-9, 8-17, 16-25, 24-29
        assert_eq!(
            source.requests(),
            vec![(0, 10), (8, 10), (16, 10), (24, 10)]
        );
        assert_eq!(report.pages_fetched, 4);
        assert_eq!(report.headers_received, 36);

        let best = svc.best_tip().unwrap();
        assert_eq!(best.height, 29);
        assert_eq!(best.hash, chain[29].hash);
    }

    #[tokio::test]
    async fn test_resume_after_restart_continues_from_tip() {
        let chain = regtest_chain(15, 1);
        let source = MockHeaderSource::with_headers(0, hex_list(&chain));
        let svc = service(Arc::new(source.clone()));
        let cp = Checkpoint::genesis(chain[0].hex());

        assert!(svc.store().lock().batch_store(chain[..8].to_vec()));
        let start = svc.bootstrap(&cp).await.unwrap();
        assert_eq!(start, 7);

        svc.catch_up(start).await.unwrap();
        assert_eq!(source.requests()[0], (7, 10));
        assert_eq!(svc.best_tip().unwrap().height, 14);
    }

    #[tokio::test]
    async fn test_catch_up_from_mid_chain_checkpoint() {
        let chain = regtest_chain(20, 1);
        // Source only serves from height 10 on
        let source = MockHeaderSource::with_headers(10, hex_list(&chain[10..]));
        let svc = service(Arc::new(source.clone()));

        let cp = Checkpoint::hardcoded(10, chain[10].hex());
        let start = svc.bootstrap(&cp).await.unwrap();
        assert_eq!(start, 10);

        svc.catch_up(start).await.unwrap();
        let best = svc.best_tip().unwrap();
        assert_eq!(best.height, 19);
        assert!(svc.store().lock().find_by_hash(&chain[5].hash).is_none());
    }

    // =============================================================================
    // LIVE TIP
    // =============================================================================

    #[tokio::test]
    async fn test_tip_ahead_of_catch_up_links_on_repair() {
        let chain = regtest_chain(12, 1);
        let svc = service(Arc::new(MockHeaderSource::default()));
        svc.bootstrap(&Checkpoint::genesis(chain[0].hex()))
            .await
            .unwrap();

        // The tip notification beats catch-up to the store
        assert_eq!(svc.handle_notification(&tip(&chain[11], 11)), 1);
        assert_eq!(svc.store().lock().find_floating().len(), 1);
        assert!(svc.best_tip().unwrap().height < 11);

        assert!(svc.store().lock().batch_store(chain[1..11].to_vec()));
        assert_eq!(svc.repair(), 1);
        assert_eq!(svc.best_tip().unwrap().hash, chain[11].hash);
    }

    #[tokio::test]
    async fn test_supervised_sync_follows_new_tips() {
        let chain = regtest_chain(8, 1);
        let source = MockHeaderSource::with_headers(0, hex_list(&chain[..6]));
        let svc = service(Arc::new(source.clone()));
        let start = svc
            .bootstrap(&Checkpoint::genesis(chain[0].hex()))
            .await
            .unwrap();

        let mut tips = svc.subscribe_tips();
        let mut supervisor = SyncSupervisor::new(Arc::clone(&svc));
        supervisor.start(start);

        let pusher = source.clone();
        let (h6, h7) = (chain[6].clone(), chain[7].clone());
        let signal = async move {
            loop {
                if tips.changed().await.is_err() {
                    return;
                }
                let height = tips.borrow().as_ref().map(|t| t.height);
                match height {
                    Some(5) => {
                        pusher.push(tip(&h6, 6));
                        pusher.push(tip(&h7, 7));
                    }
                    Some(7) => return,
                    _ => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(10), supervisor.run_until(signal))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(svc.best_tip().unwrap().hash, chain[7].hash);
    }

    // =============================================================================
    // QUORUM
    // =============================================================================

    #[tokio::test]
    async fn test_quorum_outvotes_lying_source() {
        let honest = regtest_chain(9, 1);
        let forged = regtest_chain(9, 5_000);

        let sources = vec![
            Arc::new(MockHeaderSource::with_headers(0, hex_list(&forged))),
            Arc::new(MockHeaderSource::with_headers(0, hex_list(&honest))),
            Arc::new(MockHeaderSource::with_headers(0, hex_list(&honest))),
        ];
        let quorum = QuorumHeaderSource::new(
            sources,
            QuorumSettings {
                fanout: 3,
                ..Default::default()
            },
        );
        let svc = service(Arc::new(quorum));
        svc.bootstrap(&Checkpoint::genesis(honest[0].hex()))
            .await
            .unwrap();
        svc.catch_up(0).await.unwrap();

        assert_eq!(svc.best_tip().unwrap().hash, honest[8].hash);
        assert!(svc.store().lock().find_by_hash(&forged[8].hash).is_none());
    }

    #[tokio::test]
    async fn test_quorum_survives_dead_source() {
        let chain = regtest_chain(5, 1);
        let dead = MockHeaderSource::failing();
        let sources = vec![
            Arc::new(dead),
            Arc::new(MockHeaderSource::with_headers(0, hex_list(&chain))),
        ];
        let quorum = QuorumHeaderSource::new(
            sources,
            QuorumSettings {
                fanout: 2,
                min_agreement: 1,
                ..Default::default()
            },
        );
        let svc = service(Arc::new(quorum));
        svc.catch_up(0).await.unwrap();
        assert_eq!(svc.best_tip().unwrap().height, 4);
    }

    #[tokio::test]
    async fn test_quorum_tip_needs_agreement() {
        let chain = regtest_chain(4, 1);
        let a = MockHeaderSource::with_headers(0, hex_list(&chain[..3]));
        let b = MockHeaderSource::with_headers(0, hex_list(&chain[..3]));
        let quorum = QuorumHeaderSource::new(
            vec![Arc::new(a.clone()), Arc::new(b.clone())],
            QuorumSettings::default(),
        );

        let mut subscription = quorum.subscribe_headers().await.unwrap();
        let next = tip(&chain[3], 3);

        a.push(next.clone());
        let early = tokio::time::timeout(Duration::from_millis(50), subscription.receiver.recv()).await;
        assert!(early.is_err(), "forwarded on a single sighting");

        b.push(next.clone());
        let forwarded = tokio::time::timeout(Duration::from_secs(2), subscription.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forwarded, next);
    }
}
