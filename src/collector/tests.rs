use super::*;
use crate::analysis::Analyzer;
use crate::decoder::fixtures::*;
use crate::resolve::{NumericResolver, ServiceTable};
use crate::store;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::oneshot;
use tokio::time::sleep;

struct Running {
    addr: SocketAddr,
    stats: Arc<CollectorStats>,
    templates: TemplateCache,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<Result<()>>,
    writer: StoreWriter,
}

async fn start(store_path: &Path) -> Running {
    let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
    let store = BatchStore::open(store_path).expect("open store");
    let keys = KeySource::after(store.last_key());
    let (writer, handle) = StoreWriter::spawn(store, 8).expect("spawn writer");
    let collector = Collector::new(socket, NetflowDecoder, TemplateCache::new(), handle, keys);

    let addr = collector.local_addr().expect("local addr");
    let stats = collector.stats();
    let templates = collector.templates();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(collector.run(async {
        let _ = stopped.await;
    }));

    Running {
        addr,
        stats,
        templates,
        stop,
        task,
        writer,
    }
}

async fn wait_for(stats: &CollectorStats, done: impl Fn(&StatsSnapshot) -> bool) {
    for _ in 0..200 {
        if done(&stats.snapshot()) {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("collector stalled: {}", stats.snapshot());
}

async fn stop(running: Running) -> crate::store::WriterSummary {
    running.stop.send(()).expect("collector still running");
    running
        .task
        .await
        .expect("collector task")
        .expect("collector result");
    let writer = running.writer;
    tokio::task::spawn_blocking(move || writer.join())
        .await
        .expect("join task")
        .expect("writer summary")
}

async fn send(to: SocketAddr, datagram: &[u8]) {
    let exporter = UdpSocket::bind("127.0.0.1:0").await.expect("bind exporter");
    exporter.send_to(datagram, to).await.expect("send datagram");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ingests_and_pairs_an_exchange() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("flows.json");
    let running = start(&path).await;

    let datagram = v9_datagram(&[
        template_flowset(IPV4_TEMPLATE_ID, &IPV4_FIELDS),
        data_flowset(IPV4_TEMPLATE_ID, &https_exchange()),
    ]);
    send(running.addr, &datagram).await;
    wait_for(&running.stats, |s| s.batches == 1).await;

    let stats = running.stats.snapshot();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.records, 2);
    assert_eq!(stats.templates, 1);
    assert_eq!(running.templates.ids(), vec![IPV4_TEMPLATE_ID]);

    let summary = stop(running).await;
    assert_eq!(summary.batches_appended, 1);
    assert!(!summary.unsaved);

    let batches = store::load(&path).expect("load store");
    assert_eq!(batches.len(), 1);
    assert_eq!(batches.values().next().map(Vec::len), Some(2));

    let services: ServiceTable = [(443, "https".to_string())].into_iter().collect();
    let mut out = Vec::new();
    let report = Analyzer::new(NumericResolver::new(services))
        .analyze(&batches, &mut out)
        .expect("analyze");
    let text = String::from_utf8(out).expect("utf8");

    assert_eq!(report.connections, 1);
    assert!(text.contains("HTTPS   | 1.46K    | 1 sec     | 10.0.0.1 (10.0.0.1)"), "{text}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn templates_carry_over_between_datagrams() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("flows.json");
    let running = start(&path).await;

    send(
        running.addr,
        &v9_datagram(&[template_flowset(IPV4_TEMPLATE_ID, &IPV4_FIELDS)]),
    )
    .await;
    wait_for(&running.stats, |s| s.templates == 1).await;
    send(
        running.addr,
        &v9_datagram(&[data_flowset(IPV4_TEMPLATE_ID, &https_exchange())]),
    )
    .await;
    wait_for(&running.stats, |s| s.batches == 1).await;

    let summary = stop(running).await;
    assert_eq!(summary.batches_appended, 1, "template-only datagrams add no batch");
    assert_eq!(store::load(&path).expect("load").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_templates_and_garbage_do_not_stop_the_listener() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("flows.json");
    let running = start(&path).await;

    send(running.addr, &[0xde, 0xad, 0xbe, 0xef]).await;
    send(
        running.addr,
        &v9_datagram(&[data_flowset(999, &[vec![0u8; 16]])]),
    )
    .await;
    send(
        running.addr,
        &v9_datagram(&[
            template_flowset(IPV4_TEMPLATE_ID, &IPV4_FIELDS),
            data_flowset(IPV4_TEMPLATE_ID, &https_exchange()),
        ]),
    )
    .await;
    wait_for(&running.stats, |s| s.datagrams == 3 && s.batches == 1).await;

    let stats = running.stats.snapshot();
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.skipped_flowsets, 1);
    assert_eq!(stats.batches, 1);

    stop(running).await;
    let batches = store::load(&path).expect("load");
    let records = batches.values().next().expect("one batch");
    assert_eq!(
        records[1].src_addr,
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_batches_follow_existing_keys() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("flows.json");
    let mut existing = store::Batches::new();
    existing.insert(BatchKey::parse("4000000000.5").expect("key"), Vec::new());
    store::persist(&path, &existing).expect("seed store");

    let running = start(&path).await;
    send(
        running.addr,
        &v9_datagram(&[
            template_flowset(IPV4_TEMPLATE_ID, &IPV4_FIELDS),
            data_flowset(IPV4_TEMPLATE_ID, &https_exchange()),
        ]),
    )
    .await;
    wait_for(&running.stats, |s| s.batches == 1).await;
    stop(running).await;

    let keys: Vec<String> = store::load(&path)
        .expect("load")
        .keys()
        .map(|key| key.to_string())
        .collect();
    assert_eq!(keys, ["4000000000.5", "4000000000.500001"]);
}
