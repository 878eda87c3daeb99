//! Static route classification.
//!
//! Every inbound path maps to exactly one class. The table is built once
//! from configuration and consulted before any identity or tenant work;
//! adding a public route is a config change, not a code change.

use std::collections::HashMap;

use crate::config::RouteConfig;

/// Built-in public entries: health and metrics carry no user data.
pub const DEFAULT_PUBLIC_ROUTES: &[&str] = &["/api/health", "/metrics"];

/// Built-in webhook entries: payment-provider and identity-provider
/// callbacks cannot carry end-user session tokens.
pub const DEFAULT_WEBHOOK_ROUTES: &[&str] = &["/api/stripe/webhook", "/api/clerk/webhook"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Webhook,
    Protected,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Public => "public",
            RouteClass::Webhook => "webhook",
            RouteClass::Protected => "protected",
        }
    }
}

/// Classification table: exact paths plus `*`-suffixed prefixes.
#[derive(Debug, Clone)]
pub struct RouteTable {
    exact: HashMap<String, RouteClass>,
    prefixes: Vec<(String, RouteClass)>,
}

impl RouteTable {
    pub fn from_config(config: &RouteConfig) -> Self {
        let mut table = RouteTable {
            exact: HashMap::new(),
            prefixes: Vec::new(),
        };
        for path in &config.public_paths {
            table.insert(path, RouteClass::Public);
        }
        for path in &config.webhook_paths {
            table.insert(path, RouteClass::Webhook);
        }
        // Longest prefix wins when entries nest.
        table
            .prefixes
            .sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));
        table
    }

    fn insert(&mut self, entry: &str, class: RouteClass) {
        match entry.strip_suffix('*') {
            Some(prefix) => self.prefixes.push((prefix.to_string(), class)),
            None => {
                self.exact.insert(entry.to_string(), class);
            }
        }
    }

    /// Classify a request path. Unlisted paths are protected.
    pub fn classify(&self, path: &str) -> RouteClass {
        if let Some(class) = self.exact.get(path) {
            return *class;
        }
        for (prefix, class) in &self.prefixes {
            if path.starts_with(prefix.as_str()) {
                return *class;
            }
        }
        RouteClass::Protected
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::from_config(&RouteConfig {
            public_paths: DEFAULT_PUBLIC_ROUTES.iter().map(|s| s.to_string()).collect(),
            webhook_paths: DEFAULT_WEBHOOK_ROUTES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_classifies_builtin_routes() {
        let table = RouteTable::default();
        assert_eq!(table.classify("/api/health"), RouteClass::Public);
        assert_eq!(table.classify("/metrics"), RouteClass::Public);
        assert_eq!(table.classify("/api/stripe/webhook"), RouteClass::Webhook);
        assert_eq!(table.classify("/api/clerk/webhook"), RouteClass::Webhook);
    }

    #[test]
    fn unlisted_paths_default_to_protected() {
        let table = RouteTable::default();
        assert_eq!(table.classify("/api/dealerships"), RouteClass::Protected);
        assert_eq!(table.classify("/api/dashboard/overview"), RouteClass::Protected);
        assert_eq!(table.classify("/"), RouteClass::Protected);
        // Near-misses of public entries must not leak through.
        assert_eq!(table.classify("/api/health/extra"), RouteClass::Protected);
    }

    #[test]
    fn prefix_entries_match_by_prefix() {
        let table = RouteTable::from_config(&RouteConfig {
            public_paths: vec!["/api/public/*".to_string()],
            webhook_paths: vec!["/api/hooks/*".to_string(), "/api/hooks/ping".to_string()],
        });
        assert_eq!(table.classify("/api/public/pricing"), RouteClass::Public);
        assert_eq!(table.classify("/api/hooks/stripe"), RouteClass::Webhook);
        // Exact entries take precedence over prefixes.
        assert_eq!(table.classify("/api/hooks/ping"), RouteClass::Webhook);
        assert_eq!(table.classify("/api/publicity"), RouteClass::Protected);
    }

    #[test]
    fn longest_prefix_wins() {
        let table = RouteTable::from_config(&RouteConfig {
            public_paths: vec!["/api/v1/*".to_string()],
            webhook_paths: vec!["/api/v1/hooks/*".to_string()],
        });
        assert_eq!(table.classify("/api/v1/pricing"), RouteClass::Public);
        assert_eq!(table.classify("/api/v1/hooks/stripe"), RouteClass::Webhook);
    }
}
