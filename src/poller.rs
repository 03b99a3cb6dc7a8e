// ============================================================================
// Poller : rafraîchissement périodique des données de marché
// ============================================================================
// Chaque source est interrogée immédiatement puis à chaque intervalle.
// Les résultats partent sur un channel std::sync::mpsc que la boucle
// d'événements vide avec try_recv (même principe que le worker de main.rs).
//
// Règles :
// - chaque tick est une tentative indépendante (pas de retry, pas de backoff)
// - chaque tick reçoit un numéro de séquence croissant
// - un tick encore en cours quand le suivant démarre est annulé
// - PollHandle::cancel() ou le Drop du handle arrêtent tout
// - Dataset::apply ignore un snapshot plus ancien que celui installé
//
// CONCEPTS RUST :
// 1. async_trait : méthode async dans un trait utilisé en dyn
// 2. JoinHandle::abort() : annulation coopérative d'une tâche tokio
// 3. Drop : le guard InFlight annule le tick quand il est remplacé
// ============================================================================

use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::models::{unique_by_id, MarketItem};

/// Source de données de marché
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Nom court pour les logs
    fn name(&self) -> &str;

    /// Récupère un snapshot complet
    async fn fetch(&self) -> Result<Vec<MarketItem>>;
}

/// Flux alimenté par un poller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    Crypto,
    Forex,
}

/// Résultat d'un tick
#[derive(Debug, Clone)]
pub enum PollEvent {
    Snapshot {
        feed: Feed,
        seq: u64,
        items: Vec<MarketItem>,
        at: DateTime<Utc>,
    },
    Failed {
        feed: Feed,
        seq: u64,
        error: String,
    },
}

impl PollEvent {
    pub fn feed(&self) -> Feed {
        match self {
            PollEvent::Snapshot { feed, .. } | PollEvent::Failed { feed, .. } => *feed,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            PollEvent::Snapshot { seq, .. } | PollEvent::Failed { seq, .. } => *seq,
        }
    }
}

// ============================================================================
// Poller
// ============================================================================

/// Tick en cours ; l'annule quand il est remplacé ou abandonné
struct InFlight(JoinHandle<()>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.0.is_finished() {
            self.0.abort();
        }
    }
}

/// Handle d'un poller démarré
///
/// Le poller s'arrête quand le handle est annulé ou droppé.
pub struct PollHandle {
    feed: Feed,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn feed(&self) -> Feed {
        self.feed
    }

    /// Arrête la boucle et le tick en cours
    pub fn cancel(&self) {
        if !self.task.is_finished() {
            info!(feed = ?self.feed, "Poller cancelled");
            self.task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct Poller;

impl Poller {
    /// Démarre un poller sur le runtime donné
    ///
    /// Le premier fetch part immédiatement, les suivants toutes les `every`.
    pub fn spawn(
        runtime: &Handle,
        feed: Feed,
        source: Arc<dyn MarketSource>,
        every: Duration,
        tx: Sender<PollEvent>,
    ) -> PollHandle {
        info!(feed = ?feed, source = source.name(), every_ms = every.as_millis() as u64, "Starting poller");

        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut in_flight: Option<InFlight> = None;
            let mut seq: u64 = 0;

            loop {
                ticker.tick().await;
                seq += 1;

                // Le tick précédent n'a pas fini : il est annulé (drop du guard)
                if let Some(previous) = in_flight.take() {
                    if !previous.0.is_finished() {
                        warn!(feed = ?feed, superseded = seq - 1, "Previous tick still in flight, aborting it");
                    }
                }

                let tick = tokio::spawn(run_tick(feed, seq, Arc::clone(&source), tx.clone()));
                in_flight = Some(InFlight(tick));
            }
        });

        PollHandle { feed, task }
    }
}

/// Un tick : fetch puis envoi du résultat
async fn run_tick(feed: Feed, seq: u64, source: Arc<dyn MarketSource>, tx: Sender<PollEvent>) {
    debug!(feed = ?feed, seq, source = source.name(), "Poll tick");

    let event = match source.fetch().await {
        Ok(items) => PollEvent::Snapshot {
            feed,
            seq,
            items: unique_by_id(items),
            at: Utc::now(),
        },
        Err(e) => {
            error!(feed = ?feed, seq, source = source.name(), error = ?e, "Market fetch failed");
            PollEvent::Failed {
                feed,
                seq,
                error: format!("{:#}", e),
            }
        }
    };

    if tx.send(event).is_err() {
        debug!(feed = ?feed, seq, "Receiver dropped, discarding poll result");
    }
}

// ============================================================================
// Dataset : dernier snapshot installé
// ============================================================================

/// Données d'un flux telles que vues par l'interface
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub items: Vec<MarketItem>,
    /// Séquence du snapshot installé (0 = aucun)
    pub seq: u64,
    /// Date du dernier snapshot réussi
    pub updated_at: Option<DateTime<Utc>>,
    /// Dernière erreur, tant qu'aucun snapshot plus récent n'est arrivé
    pub last_error: Option<String>,
    error_seq: u64,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applique un résultat de tick ; retourne true si l'état a changé
    ///
    /// Un résultat plus ancien que le snapshot installé est ignoré.
    /// Un échec conserve les items (données périmées mais disponibles).
    pub fn apply(&mut self, event: PollEvent) -> bool {
        match event {
            PollEvent::Snapshot { seq, items, at, feed } => {
                if seq <= self.seq {
                    debug!(feed = ?feed, seq, installed = self.seq, "Ignoring out-of-order snapshot");
                    return false;
                }
                self.items = items;
                self.seq = seq;
                self.updated_at = Some(at);
                if seq > self.error_seq {
                    self.last_error = None;
                }
                true
            }
            PollEvent::Failed { seq, error, feed } => {
                if seq <= self.seq || seq <= self.error_seq {
                    debug!(feed = ?feed, seq, installed = self.seq, "Ignoring out-of-order failure");
                    return false;
                }
                self.last_error = Some(error);
                self.error_seq = seq;
                true
            }
        }
    }

    /// true si le dernier tick a échoué
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }

    /// true tant qu'aucun tick n'a abouti
    pub fn is_loading(&self) -> bool {
        self.updated_at.is_none() && self.last_error.is_none()
    }
}

// ============================================================================
// Tests unitaires
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{self, Receiver};

    use crate::models::Category;

    fn item(id: &str, price: f64) -> MarketItem {
        MarketItem::new(id, id, id, Category::Major).with_quote(price, 0.0)
    }

    fn snapshot(seq: u64, items: Vec<MarketItem>) -> PollEvent {
        PollEvent::Snapshot {
            feed: Feed::Crypto,
            seq,
            items,
            at: Utc::now(),
        }
    }

    fn failure(seq: u64) -> PollEvent {
        PollEvent::Failed {
            feed: Feed::Crypto,
            seq,
            error: "timeout".into(),
        }
    }

    async fn collect_for(rx: &Receiver<PollEvent>, wait: Duration) -> Vec<PollEvent> {
        tokio::time::sleep(wait).await;
        rx.try_iter().collect()
    }

    /// Le premier appel est lent, les suivants immédiats
    struct SlowFirst {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketSource for SlowFirst {
        fn name(&self) -> &str {
            "slow-first"
        }

        async fn fetch(&self) -> Result<Vec<MarketItem>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(400)).await;
                return Ok(vec![item("slow", 1.0)]);
            }
            Ok(vec![item("fast", 2.0)])
        }
    }

    /// Réussit au premier appel puis échoue toujours
    struct FailsAfterFirst {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketSource for FailsAfterFirst {
        fn name(&self) -> &str {
            "fails-after-first"
        }

        async fn fetch(&self) -> Result<Vec<MarketItem>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(vec![item("btc", 100.0)]);
            }
            anyhow::bail!("connection refused")
        }
    }

    struct Constant;

    #[async_trait]
    impl MarketSource for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        async fn fetch(&self) -> Result<Vec<MarketItem>> {
            Ok(vec![item("btc", 1.0), item("btc", 2.0), item("eth", 3.0)])
        }
    }

    #[tokio::test]
    async fn test_superseded_tick_never_lands() {
        let (tx, rx) = mpsc::channel();
        let source = Arc::new(SlowFirst { calls: AtomicUsize::new(0) });
        let handle = Poller::spawn(
            &Handle::current(),
            Feed::Crypto,
            source,
            Duration::from_millis(50),
            tx,
        );

        let events = collect_for(&rx, Duration::from_millis(600)).await;
        handle.cancel();

        assert!(!events.is_empty());
        for event in &events {
            match event {
                PollEvent::Snapshot { seq, items, .. } => {
                    assert!(*seq > 1);
                    assert_eq!(items[0].id, "fast");
                }
                PollEvent::Failed { .. } => panic!("unexpected failure"),
            }
        }
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_data() {
        let (tx, rx) = mpsc::channel();
        let source = Arc::new(FailsAfterFirst { calls: AtomicUsize::new(0) });
        let handle = Poller::spawn(
            &Handle::current(),
            Feed::Forex,
            source,
            Duration::from_millis(30),
            tx,
        );

        let events = collect_for(&rx, Duration::from_millis(200)).await;
        drop(handle);

        let mut dataset = Dataset::new();
        for event in events {
            assert_eq!(event.feed(), Feed::Forex);
            dataset.apply(event);
        }

        assert_eq!(dataset.items.len(), 1);
        assert_eq!(dataset.items[0].id, "btc");
        assert_eq!(dataset.seq, 1);
        assert!(dataset.is_stale());
        assert!(dataset.last_error.as_deref().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_cancel_stops_events() {
        let (tx, rx) = mpsc::channel();
        let handle = Poller::spawn(
            &Handle::current(),
            Feed::Crypto,
            Arc::new(Constant),
            Duration::from_millis(20),
            tx,
        );

        let before = collect_for(&rx, Duration::from_millis(100)).await;
        assert!(!before.is_empty());

        handle.cancel();
        let _ = collect_for(&rx, Duration::from_millis(20)).await;
        let after = collect_for(&rx, Duration::from_millis(150)).await;
        assert!(after.is_empty());
        assert!(!handle.is_running());
    }

    #[tokio::test]
    async fn test_snapshot_ids_are_unique() {
        let (tx, rx) = mpsc::channel();
        let handle = Poller::spawn(
            &Handle::current(),
            Feed::Crypto,
            Arc::new(Constant),
            Duration::from_secs(60),
            tx,
        );

        let events = collect_for(&rx, Duration::from_millis(50)).await;
        handle.cancel();

        match &events[0] {
            PollEvent::Snapshot { seq, items, .. } => {
                assert_eq!(*seq, 1);
                let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
                assert_eq!(ids, vec!["btc", "eth"]);
                assert_eq!(items[0].price, 1.0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_dataset_ignores_older_snapshots() {
        let mut dataset = Dataset::new();
        assert!(dataset.is_loading());

        assert!(dataset.apply(snapshot(3, vec![item("new", 3.0)])));
        assert!(!dataset.apply(snapshot(2, vec![item("old", 2.0)])));
        assert!(!dataset.apply(snapshot(3, vec![item("dup", 3.0)])));

        assert_eq!(dataset.items[0].id, "new");
        assert_eq!(dataset.seq, 3);
        assert!(!dataset.is_loading());
    }

    #[test]
    fn test_dataset_failure_then_recovery() {
        let mut dataset = Dataset::new();
        dataset.apply(snapshot(1, vec![item("btc", 1.0)]));

        assert!(dataset.apply(failure(2)));
        assert!(dataset.is_stale());
        assert_eq!(dataset.items.len(), 1);

        // Un snapshot plus ancien que l'échec ne l'efface pas
        let mut late = dataset.clone();
        late.apply(failure(4));
        assert!(late.apply(snapshot(3, vec![item("btc", 3.0)])));
        assert!(late.is_stale());

        assert!(dataset.apply(snapshot(3, vec![item("btc", 2.0)])));
        assert!(!dataset.is_stale());
        assert_eq!(dataset.items[0].price, 2.0);
    }

    #[test]
    fn test_failure_before_any_data() {
        let mut dataset = Dataset::new();
        assert!(dataset.apply(failure(1)));
        assert!(dataset.items.is_empty());
        assert!(dataset.is_stale());
        assert!(!dataset.is_loading());
    }
}
