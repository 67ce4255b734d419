//! Best-effort name lookups for reporting. Nothing here fails: an address
//! that does not resolve is shown as itself and an unknown port has no
//! service.

use dashmap::DashMap;
use dns_lookup::lookup_addr;
use std::net::IpAddr;
use tracing::trace;

mod services;

#[cfg(test)]
mod tests;

pub use services::ServiceTable;

pub trait Resolver {
    fn hostname(&self, ip: IpAddr) -> String;
    fn service(&self, port: u16) -> Option<String>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
    fn hostname(&self, ip: IpAddr) -> String {
        (**self).hostname(ip)
    }

    fn service(&self, port: u16) -> Option<String> {
        (**self).service(port)
    }
}

impl<R: Resolver + ?Sized> Resolver for Box<R> {
    fn hostname(&self, ip: IpAddr) -> String {
        (**self).hostname(ip)
    }

    fn service(&self, port: u16) -> Option<String> {
        (**self).service(port)
    }
}

/// Reverse DNS through the system resolver, memoized per address.
#[derive(Debug, Default)]
pub struct SystemResolver {
    services: ServiceTable,
    hostnames: DashMap<IpAddr, String>,
}

impl SystemResolver {
    pub fn new(services: ServiceTable) -> Self {
        Self {
            services,
            hostnames: DashMap::new(),
        }
    }
}

impl Resolver for SystemResolver {
    fn hostname(&self, ip: IpAddr) -> String {
        if let Some(cached) = self.hostnames.get(&ip) {
            return cached.clone();
        }
        let hostname = match lookup_addr(&ip) {
            Ok(name) if !name.is_empty() => name,
            Ok(_) => ip.to_string(),
            Err(error) => {
                trace!(%ip, %error, "Reverse lookup failed");
                ip.to_string()
            }
        };
        self.hostnames.insert(ip, hostname.clone());
        hostname
    }

    fn service(&self, port: u16) -> Option<String> {
        self.services.lookup(port).map(str::to_string)
    }
}

/// Skips DNS entirely; hosts are rendered as their literal address.
#[derive(Debug, Default, Clone)]
pub struct NumericResolver {
    services: ServiceTable,
}

impl NumericResolver {
    pub fn new(services: ServiceTable) -> Self {
        Self { services }
    }
}

impl Resolver for NumericResolver {
    fn hostname(&self, ip: IpAddr) -> String {
        ip.to_string()
    }

    fn service(&self, port: u16) -> Option<String> {
        self.services.lookup(port).map(str::to_string)
    }
}
