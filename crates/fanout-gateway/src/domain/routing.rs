//! Declarative routing table.
//!
//! Maps the `{service}` path segment of `/api/{service}` to the ordered set
//! of upstreams a request is forwarded to. Built once at startup and shared
//! read-only.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::config::{ConfigError, GatewayConfig};
use super::upstream::Upstream;

/// Route name -> upstreams, in declaration order
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: BTreeMap<String, Vec<Arc<Upstream>>>,
}

impl RoutingTable {
    /// Resolve every route of a configuration into upstreams.
    ///
    /// Upstreams shared by several routes are the same `Arc`.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let services: HashMap<&str, Arc<Upstream>> = config
            .services
            .iter()
            .map(|s| {
                (
                    s.name.as_str(),
                    Arc::new(Upstream::from_config(s, &config.upstream.scheme)),
                )
            })
            .collect();

        let mut routes = BTreeMap::new();
        for (route, members) in &config.routes {
            let upstreams = members
                .iter()
                .map(|m| {
                    services
                        .get(m.as_str())
                        .cloned()
                        .ok_or_else(|| ConfigError::UnknownService {
                            route: route.clone(),
                            service: m.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            routes.insert(route.clone(), upstreams);
        }

        Ok(Self { routes })
    }

    /// Upstreams for a route. The name is trimmed before lookup.
    pub fn resolve(&self, route: &str) -> Option<&[Arc<Upstream>]> {
        self.routes
            .get(route.trim())
            .map(Vec::as_slice)
            .filter(|upstreams| !upstreams.is_empty())
    }

    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
