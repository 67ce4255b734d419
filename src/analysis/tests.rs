use super::*;
use crate::flow::FlowRecord;
use chrono::{Local, TimeZone};
use std::net::{IpAddr, Ipv4Addr};
use tempfile::tempdir;

fn flow(src: u8, dst: u8, ports: (u16, u16), in_bytes: u64) -> FlowRecord {
    FlowRecord::new(
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, src)),
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, dst)),
        in_bytes,
        1000,
        2000,
    )
    .expect("valid record")
    .with_ports(ports.0, ports.1)
}

fn key(text: &str) -> BatchKey {
    BatchKey::parse(text).expect("valid key")
}

fn services() -> ServiceTable {
    [(443, "https".to_string()), (22, "ssh".to_string())]
        .into_iter()
        .collect()
}

fn sample_batches() -> Batches {
    let mut batches = Batches::new();
    batches.insert(
        key("1700000100"),
        vec![flow(5, 6, (22, 40000), 90), flow(6, 5, (40000, 22), 30)],
    );
    batches.insert(
        key("1700000000.5"),
        vec![
            flow(2, 1, (51000, 443), 500),
            flow(1, 2, (443, 51000), 1500),
            flow(7, 8, (1, 2), 1),
        ],
    );
    batches
}

#[test]
fn renders_batches_in_key_order() {
    let analyzer = Analyzer::new(NumericResolver::new(services()));
    let mut out = Vec::new();

    let report = analyzer.analyze(&sample_batches(), &mut out).expect("analyze");

    let text = String::from_utf8(out).expect("utf8");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("HTTPS   | 1.46K    | 1 sec     | 10.0.0.1 (10.0.0.1) to 10.0.0.2 (10.0.0.2)"));
    assert!(lines[1].contains("SSH     | 90B      | 1 sec     | 10.0.0.5 (10.0.0.5) to 10.0.0.6 (10.0.0.6)"));
    assert!(lines[0].starts_with(&batch_timestamp(&key("1700000000.5"))));

    assert_eq!(
        report,
        AnalysisReport {
            batches: 2,
            records: 5,
            connections: 2,
            unpaired: 1,
            rejected: 0,
            filtered: 0,
        }
    );
}

#[test]
fn filter_hides_lines_but_counts_them() {
    let analyzer = Analyzer::new(NumericResolver::new(services()))
        .with_filter(ConnectionFilter::new("ssh"));
    let mut out = Vec::new();

    let report = analyzer.analyze(&sample_batches(), &mut out).expect("analyze");

    let text = String::from_utf8(out).expect("utf8");
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("SSH"));
    assert_eq!(report.connections, 2);
    assert_eq!(report.filtered, 1);
}

#[test]
fn timestamps_use_local_time() {
    let expected = Local
        .timestamp_opt(1_700_000_000, 0)
        .single()
        .expect("local time")
        .format("%Y-%m-%d %H:%M.%S")
        .to_string();

    assert_eq!(batch_timestamp(&key("1700000000.999")), expected);
}

#[test]
fn missing_store_is_reported_by_name() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("nope.json");

    let err = run(&AnalyzerConfig::new(&path), &mut io::sink()).unwrap_err();

    let missing = err.downcast_ref::<MissingStore>().expect("missing store error");
    assert_eq!(missing.to_string(), format!("File {} does not exist!", path.display()));
}

#[test]
fn run_reads_store_without_dns() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("flows.json");
    store::persist(&path, &sample_batches()).expect("persist");
    let services_path = dir.path().join("services");
    std::fs::write(&services_path, "https 443/tcp\nssh 22/tcp\n").expect("write services");

    let mut config = AnalyzerConfig::new(&path);
    config.resolve_hostnames = false;
    config.services = services_path;
    config.pairing = PairingMode::Verified;
    let mut out = Vec::new();

    let report = run(&config, &mut out).expect("run");

    assert_eq!(report.connections, 2);
    assert_eq!(report.unpaired, 1);
    assert_eq!(String::from_utf8(out).expect("utf8").lines().count(), 2);
}
