use super::ConnectionSummary;

/// Case-insensitive substring match over the rendered fields of a
/// connection. An empty query matches everything.
#[derive(Debug, Clone, Default)]
pub struct ConnectionFilter {
    needle: String,
}

impl ConnectionFilter {
    pub fn new(query: impl AsRef<str>) -> Self {
        let needle = query.as_ref().trim().to_lowercase();
        Self { needle }
    }

    pub fn matches_summary(&self, summary: &ConnectionSummary) -> bool {
        if self.is_match_all() {
            return true;
        }

        if self.matches(&summary.service) {
            return true;
        }

        if self.matches(&summary.src_host) || self.matches(&summary.dest_host) {
            return true;
        }

        if self.matches(&summary.src.to_string()) || self.matches(&summary.dest.to_string()) {
            return true;
        }

        [summary.src_port, summary.dest_port]
            .into_iter()
            .flatten()
            .any(|port| self.matches(&port.to_string()))
    }

    pub fn is_match_all(&self) -> bool {
        self.needle.is_empty()
    }

    fn matches(&self, value: &str) -> bool {
        value.to_lowercase().contains(&self.needle)
    }
}
