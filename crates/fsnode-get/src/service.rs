//! Get, Head and GetRange entry points.

use crate::exec::{Kind, Request};
use crate::local::LocalStorage;
use crate::metrics::GetMetrics;
use crate::prm::GetPrm;
use crate::remote::RemoteObjectClient;
use crate::traverser::{EpochSource, TraverserGenerator};
use crate::writer::{ObjectWriter, SimpleObjectWriter};
use fsnode_common::config::GetConfig;
use fsnode_common::{Error, Object, Range, Result};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Object retrieval service
pub struct GetService {
    pub(crate) local: Arc<dyn LocalStorage>,
    pub(crate) traversers: Arc<dyn TraverserGenerator>,
    pub(crate) client: Arc<dyn RemoteObjectClient>,
    pub(crate) epochs: Arc<dyn EpochSource>,
    pub(crate) config: GetConfig,
    pub(crate) metrics: GetMetrics,
}

impl GetService {
    pub fn new(
        local: Arc<dyn LocalStorage>,
        traversers: Arc<dyn TraverserGenerator>,
        client: Arc<dyn RemoteObjectClient>,
        epochs: Arc<dyn EpochSource>,
        config: GetConfig,
    ) -> Self {
        Self {
            local,
            traversers,
            client,
            epochs,
            config,
            metrics: GetMetrics::default(),
        }
    }

    #[must_use]
    pub const fn metrics(&self) -> &GetMetrics {
        &self.metrics
    }

    #[must_use]
    pub const fn config(&self) -> &GetConfig {
        &self.config
    }

    /// Stream the header and then the full payload into `writer`
    pub async fn get(&self, prm: &GetPrm, writer: &mut dyn ObjectWriter) -> Result<()> {
        self.run(prm, Kind::Get, writer).await
    }

    /// Whole object collected in memory
    pub async fn get_object(&self, prm: &GetPrm) -> Result<Object> {
        let mut writer = SimpleObjectWriter::new();
        self.get(prm, &mut writer).await?;
        writer
            .into_object()
            .ok_or_else(|| Error::internal(format!("no header produced for {}", prm.address)))
    }

    /// Object header; virtual objects are never assembled here
    pub async fn head(&self, prm: &GetPrm) -> Result<Object> {
        let mut writer = SimpleObjectWriter::new();
        self.run(prm, Kind::Head, &mut writer).await?;
        writer
            .header()
            .cloned()
            .ok_or_else(|| Error::internal(format!("no header produced for {}", prm.address)))
    }

    /// Stream bytes `range` of the logical payload into `writer`; no
    /// header is written
    pub async fn get_range(&self, prm: &GetPrm, range: Range, writer: &mut dyn ObjectWriter) -> Result<()> {
        self.run(prm, Kind::Range(range), writer).await
    }

    #[instrument(skip_all, fields(address = %prm.address, kind = ?kind))]
    async fn run(&self, prm: &GetPrm, kind: Kind, writer: &mut dyn ObjectWriter) -> Result<()> {
        GetMetrics::inc(&self.metrics.requests);
        let epoch = if prm.netmap_epoch == 0 {
            self.epochs.current_epoch()
        } else {
            prm.netmap_epoch
        };
        let request = Request {
            address: prm.address,
            raw: prm.raw,
            local: prm.local,
            epoch,
            kind,
            cancel: prm.cancel.clone(),
        };

        let result = self.execute(&request, writer).await;
        match &result {
            Ok(()) => debug!(epoch, "Request completed"),
            Err(e) => {
                if matches!(e, Error::ObjectNotFound(_)) {
                    GetMetrics::inc(&self.metrics.not_found);
                }
                debug!(epoch, error = %e, "Request failed");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteRequest;
    use crate::traverser::{FixedEpoch, NodeAddress, StaticTraverserGenerator};
    use async_trait::async_trait;
    use fsnode_common::{Address, ContainerId, ObjectId, ObjectType, OwnerId, SplitId, SplitInfo};
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct MemoryStorage {
        objects: HashMap<Address, Object>,
        virtuals: HashMap<Address, SplitInfo>,
        removed: HashSet<Address>,
        ranges: Mutex<Vec<(ObjectId, Range)>>,
        broken: bool,
    }

    impl MemoryStorage {
        fn with_object(mut self, obj: &Object) -> Self {
            self.objects.insert(obj.address(), obj.clone());
            self
        }

        fn with_split(mut self, split: &Split, info: SplitInfo) -> Self {
            for chunk in split.chunks.iter().chain([&split.link]) {
                self.objects.insert(chunk.address(), chunk.clone());
            }
            self.virtuals.insert(split.parent.address(), info);
            self
        }

        fn without(mut self, obj: &Object) -> Self {
            self.objects.remove(&obj.address());
            self
        }

        fn with_removed(mut self, address: Address) -> Self {
            self.removed.insert(address);
            self
        }

        fn broken(mut self) -> Self {
            self.broken = true;
            self
        }

        fn lookup(&self, address: &Address) -> Result<&Object> {
            if self.broken {
                return Err(Error::storage("get", address, "redb I/O failure"));
            }
            if self.removed.contains(address) {
                return Err(Error::AlreadyRemoved(*address));
            }
            if let Some(info) = self.virtuals.get(address) {
                return Err(Error::split_info(info.clone()));
            }
            self.objects
                .get(address)
                .ok_or(Error::ObjectNotFound(*address))
        }
    }

    impl LocalStorage for MemoryStorage {
        fn get(&self, address: &Address) -> Result<Object> {
            self.lookup(address).cloned()
        }

        fn head(&self, address: &Address, _raw: bool) -> Result<Object> {
            self.lookup(address).map(Object::cut_payload)
        }

        fn get_range(&self, address: &Address, range: &Range) -> Result<Vec<u8>> {
            let obj = self.lookup(address)?;
            self.ranges.lock().push((obj.object_id, *range));
            range
                .slice(obj.payload())
                .map(<[u8]>::to_vec)
                .ok_or(Error::RangeOutOfBounds {
                    offset: range.offset,
                    length: range.length,
                    size: obj.payload_length(),
                })
        }
    }

    #[derive(Default)]
    struct MockClient {
        nodes: HashMap<NodeAddress, MemoryStorage>,
        hanging: HashSet<NodeAddress>,
        calls: Mutex<Vec<NodeAddress>>,
    }

    impl MockClient {
        fn with_node(mut self, node: &str, storage: MemoryStorage) -> Self {
            self.nodes.insert(node.into(), storage);
            self
        }

        fn with_hanging(mut self, node: &str) -> Self {
            self.hanging.insert(node.into());
            self
        }

        fn calls(&self) -> Vec<NodeAddress> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl RemoteObjectClient for MockClient {
        async fn get(&self, node: &NodeAddress, request: &RemoteRequest) -> Result<Object> {
            self.calls.lock().push(node.clone());
            if self.hanging.contains(node) {
                std::future::pending::<()>().await;
            }
            let storage = self
                .nodes
                .get(node)
                .ok_or_else(|| Error::remote(node, "unreachable"))?;
            let address = &request.address;
            if request.head_only {
                return storage.head(address, request.raw);
            }
            match request.range {
                Some(range) => {
                    let mut obj = storage.head(address, true)?;
                    obj.payload = Some(storage.get_range(address, &range)?);
                    Ok(obj)
                }
                None => storage.get(address),
            }
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Write {
        Header(ObjectId),
        Chunk(Vec<u8>),
    }

    #[derive(Default)]
    struct RecordingWriter {
        writes: Vec<Write>,
    }

    impl RecordingWriter {
        fn headers(&self) -> Vec<ObjectId> {
            self.writes
                .iter()
                .filter_map(|w| match w {
                    Write::Header(id) => Some(*id),
                    Write::Chunk(_) => None,
                })
                .collect()
        }

        fn payload(&self) -> Vec<u8> {
            self.writes
                .iter()
                .filter_map(|w| match w {
                    Write::Chunk(data) => Some(data.as_slice()),
                    Write::Header(_) => None,
                })
                .collect::<Vec<_>>()
                .concat()
        }

        fn chunk_count(&self) -> usize {
            self.writes.len() - self.headers().len()
        }
    }

    impl ObjectWriter for RecordingWriter {
        fn write_header(&mut self, header: &Object) -> Result<()> {
            assert!(header.payload.is_none(), "header carries payload");
            self.writes.push(Write::Header(header.object_id));
            Ok(())
        }

        fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
            assert!(!chunk.is_empty(), "empty chunk written");
            self.writes.push(Write::Chunk(chunk.to_vec()));
            Ok(())
        }
    }

    struct Split {
        parent: Object,
        chunks: Vec<Object>,
        link: Object,
    }

    impl Split {
        fn last(&self) -> &Object {
            &self.chunks[self.chunks.len() - 1]
        }

        fn by_link(&self) -> SplitInfo {
            SplitInfo {
                split_id: self.link.split_id(),
                last_part: None,
                link: Some(self.link.object_id),
            }
        }

        fn by_last_part(&self) -> SplitInfo {
            SplitInfo {
                split_id: self.link.split_id(),
                last_part: Some(self.last().object_id),
                link: None,
            }
        }
    }

    fn split(sizes: &[usize]) -> Split {
        let cid = ContainerId::new(rand::random());
        let owner = OwnerId::new(rand::random());
        let split_id = SplitId::new();
        let parts: Vec<Vec<u8>> = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| (0..n).map(|b| (i * 64 + b) as u8).collect())
            .collect();
        let parent = Object::new(cid, owner, ObjectType::Regular).with_payload(parts.concat());

        let mut chunks: Vec<Object> = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            let mut chunk = Object::new(cid, owner, ObjectType::Regular)
                .with_payload(part.clone())
                .with_split_id(split_id);
            if let Some(prev) = chunks.last() {
                chunk = chunk.with_previous(prev.object_id);
            }
            chunk = if i + 1 == parts.len() {
                chunk.with_parent(&parent)
            } else {
                chunk.with_parent_id(parent.object_id)
            };
            chunks.push(chunk);
        }
        let link = Object::new(cid, owner, ObjectType::Regular)
            .with_split_id(split_id)
            .with_parent(&parent)
            .with_children(chunks.iter().map(|c| c.object_id).collect());
        Split {
            parent,
            chunks,
            link,
        }
    }

    fn regular(payload: &[u8]) -> Object {
        Object::new(
            ContainerId::new(rand::random()),
            OwnerId::new(rand::random()),
            ObjectType::Regular,
        )
        .with_payload(payload.to_vec())
    }

    fn service_with(
        local: Arc<MemoryStorage>,
        client: Arc<MockClient>,
        traversers: StaticTraverserGenerator,
        config: GetConfig,
    ) -> GetService {
        GetService::new(local, Arc::new(traversers), client, Arc::new(FixedEpoch(10)), config)
    }

    fn service(local: MemoryStorage) -> GetService {
        service_with(
            Arc::new(local),
            Arc::new(MockClient::default()),
            StaticTraverserGenerator::new(),
            GetConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_local_object() {
        let obj = regular(b"hello world");
        let svc = service(MemoryStorage::default().with_object(&obj));
        let prm = GetPrm::new(obj.address());

        let mut writer = RecordingWriter::default();
        svc.get(&prm, &mut writer).await.unwrap();
        assert_eq!(
            writer.writes,
            vec![Write::Header(obj.object_id), Write::Chunk(b"hello world".to_vec())]
        );

        assert_eq!(svc.head(&prm).await.unwrap(), obj.cut_payload());

        let mut writer = RecordingWriter::default();
        svc.get_range(&prm, Range::new(6, 5), &mut writer).await.unwrap();
        assert_eq!(writer.writes, vec![Write::Chunk(b"world".to_vec())]);

        let snapshot = svc.metrics().snapshot();
        assert_eq!(snapshot.requests, 3);
        assert_eq!(snapshot.local_hits, 3);
        assert_eq!(snapshot.remote_hits, 0);
    }

    #[tokio::test]
    async fn test_empty_payload_writes_header_only() {
        let obj = regular(b"");
        let svc = service(MemoryStorage::default().with_object(&obj));
        let mut writer = RecordingWriter::default();
        svc.get(&GetPrm::new(obj.address()), &mut writer).await.unwrap();
        assert_eq!(writer.writes, vec![Write::Header(obj.object_id)]);
    }

    #[tokio::test]
    async fn test_local_only_stays_local() {
        let obj = regular(b"remote");
        let client = Arc::new(MockClient::default().with_node("a", MemoryStorage::default().with_object(&obj)));
        let svc = service_with(
            Arc::new(MemoryStorage::default()),
            client.clone(),
            StaticTraverserGenerator::uniform(vec!["a".into()]),
            GetConfig::default(),
        );

        let prm = GetPrm::new(obj.address()).with_local(true);
        let err = svc.get_object(&prm).await.unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound(_)));
        assert!(client.calls().is_empty());
        assert_eq!(svc.metrics().snapshot().not_found, 1);
    }

    #[tokio::test]
    async fn test_removed_object_is_terminal() {
        let obj = regular(b"gone");
        let client = Arc::new(MockClient::default().with_node("a", MemoryStorage::default().with_object(&obj)));
        let svc = service_with(
            Arc::new(MemoryStorage::default().with_removed(obj.address())),
            client.clone(),
            StaticTraverserGenerator::uniform(vec!["a".into()]),
            GetConfig::default(),
        );

        let err = svc.get_object(&GetPrm::new(obj.address())).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyRemoved(_)));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_local_store_failure_is_not_retried_remotely() {
        let obj = regular(b"unreadable");
        let client = Arc::new(MockClient::default().with_node("a", MemoryStorage::default().with_object(&obj)));
        let svc = service_with(
            Arc::new(MemoryStorage::default().broken()),
            client.clone(),
            StaticTraverserGenerator::uniform(vec!["a".into()]),
            GetConfig::default(),
        );

        let err = svc.get_object(&GetPrm::new(obj.address())).await.unwrap_err();
        assert!(matches!(err, Error::Storage { .. }), "got {err:?}");
        assert!(err.to_string().contains("redb I/O failure"));
        assert!(client.calls().is_empty());
        assert_eq!(svc.metrics().snapshot().not_found, 0);
    }

    #[tokio::test]
    async fn test_remote_fallback_walks_nodes_in_order() {
        let obj = regular(b"stored elsewhere");
        let client = Arc::new(
            MockClient::default()
                .with_node("a", MemoryStorage::default())
                .with_node("c", MemoryStorage::default().with_object(&obj)),
        );
        let svc = service_with(
            Arc::new(MemoryStorage::default()),
            client.clone(),
            StaticTraverserGenerator::new()
                .with_epoch(10, vec![vec!["a".into(), "b".into()], vec!["c".into(), "d".into()]]),
            GetConfig::default(),
        );

        let mut writer = RecordingWriter::default();
        svc.get(&GetPrm::new(obj.address()), &mut writer).await.unwrap();
        assert_eq!(
            writer.writes,
            vec![Write::Header(obj.object_id), Write::Chunk(b"stored elsewhere".to_vec())]
        );
        assert_eq!(client.calls(), vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(svc.metrics().snapshot().remote_hits, 1);
    }

    #[tokio::test]
    async fn test_remote_removed_stops_traversal() {
        let obj = regular(b"gone");
        let client = Arc::new(
            MockClient::default()
                .with_node("a", MemoryStorage::default().with_removed(obj.address()))
                .with_node("b", MemoryStorage::default().with_object(&obj)),
        );
        let svc = service_with(
            Arc::new(MemoryStorage::default()),
            client.clone(),
            StaticTraverserGenerator::uniform(vec!["a".into(), "b".into()]),
            GetConfig::default(),
        );

        let err = svc.head(&GetPrm::new(obj.address())).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyRemoved(_)));
        assert_eq!(client.calls(), vec!["a".into()]);
    }

    #[tokio::test]
    async fn test_lookback_epochs() {
        let obj = regular(b"old placement");
        let client = Arc::new(MockClient::default().with_node("old", MemoryStorage::default().with_object(&obj)));
        let traversers = StaticTraverserGenerator::new()
            .with_epoch(10, vec![vec!["new".into()]])
            .with_epoch(9, vec![vec!["old".into()]]);
        let prm = GetPrm::new(obj.address());

        let shallow = service_with(
            Arc::new(MemoryStorage::default()),
            client.clone(),
            traversers.clone(),
            GetConfig {
                lookback_depth: 0,
                ..GetConfig::default()
            },
        );
        assert!(matches!(
            shallow.get_object(&prm).await,
            Err(Error::ObjectNotFound(_))
        ));
        assert_eq!(
            shallow.get_object(&prm.clone().with_epoch(9)).await.unwrap(),
            obj
        );

        let deep = service_with(
            Arc::new(MemoryStorage::default()),
            client.clone(),
            traversers,
            GetConfig {
                lookback_depth: 1,
                ..GetConfig::default()
            },
        );
        assert_eq!(deep.get_object(&prm).await.unwrap(), obj);
    }

    #[tokio::test]
    async fn test_assemble_via_link() {
        let s = split(&[10, 20, 30]);
        let svc = service(MemoryStorage::default().with_split(&s, s.by_link()));

        let mut writer = RecordingWriter::default();
        svc.get(&GetPrm::new(s.parent.address()), &mut writer).await.unwrap();
        assert_eq!(writer.headers(), vec![s.parent.object_id]);
        assert_eq!(writer.writes[0], Write::Header(s.parent.object_id));
        assert_eq!(writer.payload(), s.parent.payload());
        assert_eq!(writer.chunk_count(), 3);
        assert_eq!(svc.metrics().snapshot().assemblies, 1);
    }

    #[tokio::test]
    async fn test_assemble_via_last_part() {
        let s = split(&[10, 20, 30]);
        let svc = service(MemoryStorage::default().with_split(&s, s.by_last_part()));

        let obj = svc.get_object(&GetPrm::new(s.parent.address())).await.unwrap();
        assert_eq!(obj, s.parent);
    }

    #[tokio::test]
    async fn test_range_reads_only_overlapping_chunks() {
        let s = split(&[10, 20, 30]);
        let local = Arc::new(MemoryStorage::default().with_split(&s, s.by_link()));
        let svc = service_with(
            local.clone(),
            Arc::new(MockClient::default()),
            StaticTraverserGenerator::new(),
            GetConfig::default(),
        );

        let mut writer = RecordingWriter::default();
        svc.get_range(&GetPrm::new(s.parent.address()), Range::new(15, 10), &mut writer)
            .await
            .unwrap();
        assert!(writer.headers().is_empty());
        assert_eq!(writer.payload(), &s.parent.payload()[15..25]);
        assert_eq!(
            *local.ranges.lock(),
            vec![(s.chunks[1].object_id, Range::new(5, 10))]
        );
    }

    #[tokio::test]
    async fn test_range_across_chunks_via_last_part() {
        let s = split(&[10, 20, 30]);
        let svc = service(MemoryStorage::default().with_split(&s, s.by_last_part()));
        let prm = GetPrm::new(s.parent.address());

        for (offset, length) in [(5, 50), (0, 60), (10, 20), (59, 1), (30, 0)] {
            let mut writer = RecordingWriter::default();
            svc.get_range(&prm, Range::new(offset, length), &mut writer)
                .await
                .unwrap();
            let (from, to) = (offset as usize, (offset + length) as usize);
            assert_eq!(writer.payload(), &s.parent.payload()[from..to], "range {offset}+{length}");
        }

        let err = svc
            .get_range(&prm, Range::new(50, 11), &mut RecordingWriter::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RangeOutOfBounds { size: 60, .. }));
    }

    #[tokio::test]
    async fn test_raw_and_head_report_split_info() {
        let s = split(&[4, 4]);
        let svc = service(MemoryStorage::default().with_split(&s, s.by_link()));

        let mut writer = RecordingWriter::default();
        let err = svc
            .get(&GetPrm::new(s.parent.address()).with_raw(true), &mut writer)
            .await
            .unwrap_err();
        assert_eq!(err.as_split_info(), Some(&s.by_link()));
        assert!(writer.writes.is_empty());

        let err = svc.head(&GetPrm::new(s.parent.address())).await.unwrap_err();
        assert_eq!(err.as_split_info().and_then(|si| si.link), Some(s.link.object_id));
        assert_eq!(svc.metrics().snapshot().assemblies, 0);
    }

    #[tokio::test]
    async fn test_assembly_disabled() {
        let s = split(&[4, 4]);
        let svc = service_with(
            Arc::new(MemoryStorage::default().with_split(&s, s.by_link())),
            Arc::new(MockClient::default()),
            StaticTraverserGenerator::new(),
            GetConfig {
                assembly: false,
                ..GetConfig::default()
            },
        );
        let err = svc.get_object(&GetPrm::new(s.parent.address())).await.unwrap_err();
        assert!(err.as_split_info().is_some());
    }

    #[tokio::test]
    async fn test_remote_split_info_assembles_from_remote_chunks() {
        let s = split(&[7, 9, 11]);
        let client = Arc::new(
            MockClient::default().with_node("a", MemoryStorage::default().with_split(&s, s.by_link())),
        );
        let svc = service_with(
            Arc::new(MemoryStorage::default()),
            client.clone(),
            StaticTraverserGenerator::uniform(vec!["a".into()]),
            GetConfig::default(),
        );

        let obj = svc.get_object(&GetPrm::new(s.parent.address())).await.unwrap();
        assert_eq!(obj, s.parent);
        let snapshot = svc.metrics().snapshot();
        assert_eq!(snapshot.remote_hits, 4);
        assert_eq!(snapshot.assemblies, 1);
        assert_eq!(client.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_missing_chunk_fails_assembly() {
        let s = split(&[3, 3, 3]);
        let svc = service(
            MemoryStorage::default()
                .with_split(&s, s.by_link())
                .without(&s.chunks[1]),
        );
        let err = svc.get_object(&GetPrm::new(s.parent.address())).await.unwrap_err();
        assert!(matches!(err, Error::ObjectNotFound(_)));
        assert_eq!(svc.metrics().snapshot().not_found, 1);
    }

    #[tokio::test]
    async fn test_foreign_link_is_malformed() {
        let s = split(&[3, 3]);
        let other = split(&[2, 2]);
        let local = MemoryStorage::default()
            .with_split(&s, other.by_link())
            .with_object(&other.link);
        let svc = service(local);

        let err = svc.get_object(&GetPrm::new(s.parent.address())).await.unwrap_err();
        assert!(matches!(err, Error::MalformedChild { child, .. } if child == other.link.object_id));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let obj = regular(b"data");
        let svc = service(MemoryStorage::default().with_object(&obj));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = svc
            .get_object(&GetPrm::new(obj.address()).with_cancel(cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_remote_call() {
        let obj = regular(b"data");
        let client = Arc::new(MockClient::default().with_hanging("slow"));
        let svc = service_with(
            Arc::new(MemoryStorage::default()),
            client,
            StaticTraverserGenerator::uniform(vec!["slow".into()]),
            GetConfig {
                remote_timeout_ms: 60_000,
                ..GetConfig::default()
            },
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = svc
            .get_object(&GetPrm::new(obj.address()).with_cancel(cancel))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[tokio::test]
    async fn test_slow_node_times_out() {
        let obj = regular(b"data");
        let client = Arc::new(
            MockClient::default()
                .with_hanging("slow")
                .with_node("fast", MemoryStorage::default().with_object(&obj)),
        );
        let svc = service_with(
            Arc::new(MemoryStorage::default()),
            client.clone(),
            StaticTraverserGenerator::uniform(vec!["slow".into(), "fast".into()]),
            GetConfig {
                remote_timeout_ms: 20,
                ..GetConfig::default()
            },
        );

        assert_eq!(svc.get_object(&GetPrm::new(obj.address())).await.unwrap(), obj);
        assert_eq!(client.calls(), vec!["slow".into(), "fast".into()]);
    }
}
