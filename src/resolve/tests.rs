use super::*;
use std::net::Ipv4Addr;
use std::path::Path;

const SERVICES: &str = "\
# Network services, Internet style
tcpmux          1/tcp                           # TCP port service multiplexer
http            80/tcp          www             # WorldWideWeb HTTP
https           443/tcp                         # http protocol over TLS/SSL
https           443/udp
kerberos        88/tcp          kerberos5 krb5  # Kerberos v5
kerberos-alt    88/udp
bogus           notaport/tcp
lonely
";

#[test]
fn parses_services_file_format() {
    let table = ServiceTable::parse(SERVICES);

    assert_eq!(table.lookup(80), Some("http"));
    assert_eq!(table.lookup(443), Some("https"));
    assert_eq!(table.lookup(1), Some("tcpmux"));
    assert_eq!(table.lookup(8080), None);
    assert_eq!(table.len(), 4);
}

#[test]
fn first_entry_for_a_port_wins() {
    let table = ServiceTable::parse(SERVICES);
    assert_eq!(table.lookup(88), Some("kerberos"));
}

#[test]
fn missing_services_file_is_empty() {
    let table = ServiceTable::load_or_empty(Path::new("/nonexistent/services"));
    assert!(table.is_empty());
}

#[test]
fn numeric_resolver_renders_literal_addresses() {
    let resolver = NumericResolver::new(ServiceTable::parse(SERVICES));
    let ip = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7));

    assert_eq!(resolver.hostname(ip), "192.0.2.7");
    assert_eq!(resolver.service(443).as_deref(), Some("https"));
    assert_eq!(resolver.service(9), None);
}

#[test]
fn resolver_works_through_references_and_boxes() {
    fn service_of(resolver: impl Resolver, port: u16) -> Option<String> {
        resolver.service(port)
    }

    let resolver = NumericResolver::new([(22, "ssh".to_string())].into_iter().collect());
    assert_eq!(service_of(&resolver, 22).as_deref(), Some("ssh"));

    let boxed: Box<dyn Resolver> = Box::new(resolver);
    assert_eq!(service_of(boxed, 22).as_deref(), Some("ssh"));
}
