use std::fmt;
use std::net::IpAddr;

const KIB: f64 = 1024.0;

/// `"512B"`, `"1.46K"`, `"3.00M"`, `"1.25G"`.
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes}B");
    }
    let bytes = bytes as f64;
    if bytes / KIB < KIB {
        format!("{:.2}K", bytes / KIB)
    } else if bytes / KIB.powi(2) < KIB {
        format!("{:.2}M", bytes / KIB.powi(2))
    } else {
        format!("{:.2}G", bytes / KIB.powi(3))
    }
}

/// Renders milliseconds floored to whole seconds.
pub fn human_duration(millis: u64) -> String {
    let seconds = millis / 1000;
    if seconds < 60 {
        return format!("{seconds} sec");
    }
    if seconds > 3600 {
        return format!(
            "{}:{:02}.{:02} hours",
            seconds / 3600,
            seconds % 3600 / 60,
            seconds % 60
        );
    }
    format!("{:02}:{:02} min", seconds / 60, seconds % 60)
}

/// Display strings for one connection, resolved once and reused by both
/// filtering and the report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSummary {
    pub service: String,
    pub size: String,
    pub duration: String,
    pub src_host: String,
    pub src: IpAddr,
    pub src_port: Option<u16>,
    pub dest_host: String,
    pub dest: IpAddr,
    pub dest_port: Option<u16>,
}

impl ConnectionSummary {
    pub fn line(&self, timestamp: &str) -> String {
        format!(
            "{timestamp}: {:7} | {:8} | {:9} | {} ({}) to {} ({})",
            self.service.to_uppercase(),
            self.size,
            self.duration,
            self.src_host,
            self.src,
            self.dest_host,
            self.dest
        )
    }
}

impl fmt::Display for ConnectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} from {} to {}",
            self.service, self.size, self.duration, self.src_host, self.dest_host
        )
    }
}
