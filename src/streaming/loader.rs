//! Background node loading with a bounded worker pool

use crate::core::error::Error;
use crate::core::types::Result;
use crate::octree::NodeId;
use crate::point::PointRecord;
use crate::store::{NodeData, PagedStoreReader};
use crate::streaming::config::LoaderConfig;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// Request to load a node with priority
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest {
    pub id: NodeId,
    /// Higher loads first (projected size in pixels)
    pub priority: f64,
}

impl Eq for LoadRequest {}

impl PartialEq for LoadRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for LoadRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for LoadRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of a node load operation
#[derive(Debug)]
pub enum LoadResult<P> {
    /// Points read and decoded
    Loaded(NodeId, NodeData<P>),
    /// Read failed; the node may be requested again
    Failed(NodeId, Error),
}

impl<P> LoadResult<P> {
    pub fn id(&self) -> NodeId {
        match self {
            LoadResult::Loaded(id, _) | LoadResult::Failed(id, _) => *id,
        }
    }
}

enum Backend<P: PointRecord> {
    /// Dedicated tokio runtime feeding a bounded set of blocking reads
    Pool {
        request_tx: mpsc::UnboundedSender<LoadRequest>,
        result_rx: mpsc::UnboundedReceiver<LoadResult<P>>,
        _runtime: Runtime,
    },
    /// Reads run on the polling thread, in request order
    Inline { queue: VecDeque<NodeId> },
}

/// Loads node blobs off the update thread.
///
/// Tracks in-flight ids so repeated requests for the same node do not queue
/// a second read. Cancelled loads may still complete; their results are
/// dropped instead of being returned from [`poll_results`](Self::poll_results),
/// and the decoded blob is evicted from the reader cache.
pub struct NodeLoader<P: PointRecord> {
    reader: Arc<PagedStoreReader<P>>,
    backend: Backend<P>,
    /// Requested and not yet returned or cancelled
    pending: HashSet<NodeId>,
    /// Cancelled while in flight; results are discarded
    abandoned: HashSet<NodeId>,
}

impl<P: PointRecord> NodeLoader<P> {
    /// Create a loader backed by a worker pool
    ///
    /// # Arguments
    /// * `reader` - Store the nodes are read from
    /// * `config` - Pool settings (`max_concurrent_loads` of 0 is treated as 1)
    pub fn new(reader: Arc<PagedStoreReader<P>>, config: &LoaderConfig) -> Result<Self> {
        let max_concurrent = config.max_concurrent_loads.max(1);
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<LoadRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<LoadResult<P>>();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(max_concurrent)
            .thread_name("node-loader")
            .enable_all()
            .build()?;

        let worker_reader = Arc::clone(&reader);
        runtime.spawn(async move {
            Self::worker_loop(worker_reader, max_concurrent, &mut request_rx, result_tx).await;
        });

        Ok(Self {
            reader,
            backend: Backend::Pool {
                request_tx,
                result_rx,
                _runtime: runtime,
            },
            pending: HashSet::new(),
            abandoned: HashSet::new(),
        })
    }

    /// Create a loader that reads synchronously during [`poll_results`](Self::poll_results)
    pub fn inline(reader: Arc<PagedStoreReader<P>>) -> Self {
        Self {
            reader,
            backend: Backend::Inline {
                queue: VecDeque::new(),
            },
            pending: HashSet::new(),
            abandoned: HashSet::new(),
        }
    }

    /// Worker loop that processes load requests with concurrency control
    async fn worker_loop(
        reader: Arc<PagedStoreReader<P>>,
        max_concurrent: usize,
        request_rx: &mut mpsc::UnboundedReceiver<LoadRequest>,
        result_tx: mpsc::UnboundedSender<LoadResult<P>>,
    ) {
        use tokio::task::JoinSet;

        let mut active_tasks = JoinSet::new();
        let mut queued: BinaryHeap<LoadRequest> = BinaryHeap::new();
        let mut open = true;

        loop {
            tokio::select! {
                request = request_rx.recv(), if open => {
                    match request {
                        Some(request) => queued.push(request),
                        None => open = false,
                    }
                }

                Some(joined) = active_tasks.join_next(), if !active_tasks.is_empty() => {
                    match joined {
                        Ok(result) => {
                            if result_tx.send(result).is_err() {
                                break;
                            }
                        }
                        Err(e) => log::error!("Node loader task failed: {}", e),
                    }
                }

                else => break,
            }

            // Start the most important queued loads while there is capacity
            while active_tasks.len() < max_concurrent {
                let Some(request) = queued.pop() else {
                    break;
                };
                let reader = Arc::clone(&reader);
                active_tasks.spawn(async move { Self::load_task(reader, request.id).await });
            }
        }
    }

    /// Task that loads a single node on the blocking pool
    async fn load_task(reader: Arc<PagedStoreReader<P>>, id: NodeId) -> LoadResult<P> {
        let joined = tokio::task::spawn_blocking(move || reader.load_node(id)).await;
        match joined {
            Ok(Ok(data)) => LoadResult::Loaded(id, data),
            Ok(Err(e)) => LoadResult::Failed(id, e),
            Err(e) => LoadResult::Failed(
                id,
                Error::DiskReadFailure {
                    node: id,
                    source: std::io::Error::other(e.to_string()),
                },
            ),
        }
    }

    /// Request a node to be loaded
    ///
    /// Returns `false` if the node is already pending, `true` if it was
    /// queued or a cancelled in-flight load was reclaimed.
    pub fn request(&mut self, id: NodeId, priority: f64) -> bool {
        if self.pending.contains(&id) {
            return false;
        }

        // Still in flight from before the cancel; keep its result this time
        if self.abandoned.remove(&id) {
            self.pending.insert(id);
            return true;
        }

        match &mut self.backend {
            Backend::Pool { request_tx, .. } => {
                if request_tx.send(LoadRequest { id, priority }).is_err() {
                    log::error!("Node loader worker stopped, dropping request for node {}", id);
                    return false;
                }
            }
            Backend::Inline { queue } => queue.push_back(id),
        }
        self.pending.insert(id);
        log::trace!("Requested node {} (priority {:.1})", id, priority);
        true
    }

    /// Poll for completed load results (non-blocking)
    ///
    /// Returns all currently available results except those of cancelled
    /// loads. The inline backend performs its queued reads here.
    pub fn poll_results(&mut self) -> Vec<LoadResult<P>> {
        let mut raw = Vec::new();
        match &mut self.backend {
            Backend::Pool { result_rx, .. } => {
                while let Ok(result) = result_rx.try_recv() {
                    raw.push(result);
                }
            }
            Backend::Inline { queue } => {
                while let Some(id) = queue.pop_front() {
                    raw.push(match self.reader.load_node(id) {
                        Ok(data) => LoadResult::Loaded(id, data),
                        Err(e) => LoadResult::Failed(id, e),
                    });
                }
            }
        }

        let mut results = Vec::with_capacity(raw.len());
        for result in raw {
            let id = result.id();
            if self.abandoned.remove(&id) {
                if matches!(result, LoadResult::Loaded(..)) {
                    self.reader.evict(id);
                }
                log::trace!("Discarded abandoned load of node {}", id);
                continue;
            }
            self.pending.remove(&id);
            results.push(result);
        }
        results
    }

    /// Get the number of pending load requests
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get the number of cancelled loads whose results have not arrived yet
    pub fn abandoned_count(&self) -> usize {
        self.abandoned.len()
    }

    /// Check if a specific node is currently pending
    pub fn is_pending(&self, id: NodeId) -> bool {
        self.pending.contains(&id)
    }

    /// Cancel a pending load.
    ///
    /// A load already handed to the pool cannot be stopped; its result is
    /// discarded when it arrives.
    pub fn cancel(&mut self, id: NodeId) -> bool {
        if !self.pending.remove(&id) {
            return false;
        }
        match &mut self.backend {
            Backend::Inline { queue } => queue.retain(|&queued| queued != id),
            Backend::Pool { .. } => {
                self.abandoned.insert(id);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DVec3;
    use crate::octree::OctreeBuilder;
    use crate::point::Pos64;
    use crate::store::StoreWriter;
    use std::time::{Duration, Instant};

    fn open_store(dir: &std::path::Path) -> Arc<PagedStoreReader<Pos64>> {
        let points: Vec<Pos64> = (0..400)
            .map(|i| Pos64::new(DVec3::new((i % 20) as f64, (i / 20) as f64, (i % 7) as f64)))
            .collect();
        let tree = OctreeBuilder::with_capacity(50).build(points).unwrap();
        StoreWriter::default().write(&tree, dir).unwrap();
        Arc::new(PagedStoreReader::open(dir).unwrap())
    }

    fn populated(reader: &PagedStoreReader<Pos64>) -> Vec<NodeId> {
        reader
            .index()
            .entries
            .iter()
            .filter(|e| e.point_count > 0)
            .map(|e| e.node_id())
            .collect()
    }

    fn wait_for(loader: &mut NodeLoader<Pos64>, count: usize) -> Vec<LoadResult<Pos64>> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut results = Vec::new();
        while results.len() < count && Instant::now() < deadline {
            results.extend(loader.poll_results());
            std::thread::sleep(Duration::from_millis(5));
        }
        results
    }

    #[test]
    fn test_request_ordering() {
        let mut heap = BinaryHeap::new();
        heap.push(LoadRequest { id: NodeId(1), priority: 1.0 });
        heap.push(LoadRequest { id: NodeId(2), priority: 9.0 });
        assert_eq!(heap.pop().unwrap().id, NodeId(2));
    }

    #[test]
    fn test_inline_delivers_on_next_poll() {
        let dir = tempfile::tempdir().unwrap();
        let reader = open_store(dir.path());
        let ids = populated(&reader);
        let mut loader = NodeLoader::inline(Arc::clone(&reader));

        assert!(loader.request(ids[0], 1.0));
        assert!(!loader.request(ids[0], 2.0), "duplicate request suppressed");
        assert_eq!(loader.pending_count(), 1);

        let results = loader.poll_results();
        assert_eq!(results.len(), 1);
        match &results[0] {
            LoadResult::Loaded(id, data) => {
                assert_eq!(*id, ids[0]);
                assert_eq!(data.len() as u64, reader.node_point_count(ids[0]).unwrap());
            }
            LoadResult::Failed(id, e) => panic!("load of {id} failed: {e}"),
        }
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn test_inline_cancel_drops_request() {
        let dir = tempfile::tempdir().unwrap();
        let reader = open_store(dir.path());
        let ids = populated(&reader);
        let mut loader = NodeLoader::inline(reader);

        loader.request(ids[0], 1.0);
        loader.request(ids[1], 1.0);
        assert!(loader.cancel(ids[0]));
        assert!(!loader.cancel(ids[0]));

        let results = loader.poll_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id(), ids[1]);
    }

    #[test]
    fn test_inline_failure_reported() {
        let dir = tempfile::tempdir().unwrap();
        let reader = open_store(dir.path());
        let mut loader = NodeLoader::inline(reader);

        loader.request(NodeId(100_000), 1.0);
        let results = loader.poll_results();
        assert!(matches!(&results[0], LoadResult::Failed(_, Error::NodeNotFound(_))));
        assert!(!loader.is_pending(NodeId(100_000)));
    }

    #[test]
    fn test_pool_loads_all_requests() {
        let dir = tempfile::tempdir().unwrap();
        let reader = open_store(dir.path());
        let ids = populated(&reader);
        let mut loader = NodeLoader::new(Arc::clone(&reader), &LoaderConfig::default()).unwrap();

        for (i, &id) in ids.iter().enumerate() {
            assert!(loader.request(id, i as f64));
        }
        let results = wait_for(&mut loader, ids.len());
        assert_eq!(results.len(), ids.len());
        assert!(results.iter().all(|r| matches!(r, LoadResult::Loaded(..))));
        assert_eq!(loader.pending_count(), 0);
    }

    #[test]
    fn test_pool_discards_abandoned_results() {
        let dir = tempfile::tempdir().unwrap();
        let reader = open_store(dir.path());
        let ids = populated(&reader);
        let mut loader = NodeLoader::new(Arc::clone(&reader), &LoaderConfig::default()).unwrap();

        loader.request(ids[0], 1.0);
        loader.request(ids[1], 1.0);
        assert!(loader.cancel(ids[0]));
        assert!(!loader.is_pending(ids[0]));
        assert_eq!(loader.abandoned_count(), 1);

        let mut all: Vec<NodeId> = wait_for(&mut loader, 1).iter().map(|r| r.id()).collect();
        // Keep polling until the cancelled read has landed as well
        let deadline = Instant::now() + Duration::from_secs(10);
        while loader.abandoned_count() > 0 && Instant::now() < deadline {
            all.extend(loader.poll_results().iter().map(|r| r.id()));
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(all, vec![ids[1]]);
        assert_eq!(loader.abandoned_count(), 0);

        // The discarded blob does not linger in the reader cache
        assert!(!reader.is_cached(ids[0]));
        assert!(reader.is_cached(ids[1]));
        assert_eq!(reader.cached_count(), 1);
    }
}
