// src/routing/mod.rs - City Route Graph and Shortest-Route Search
//! # Route Engine
//!
//! Shipping distance between a warehouse and a destination is the shortest
//! known route over the city graph: cities are nodes, registered
//! [`CityRoute`](crate::core::types::CityRoute) records are bidirectional
//! weighted edges. The lifecycle engine consults a [`RouteResolver`] when a
//! warehouse is assigned; a missing route is an answer (`None`), never an
//! error.
//!
//! [`CachedRouteResolver`] fronts the graph with an LRU cache keyed on the
//! normalized city pair, since consoles re-resolve the same few corridors on
//! every order list render.

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::num::NonZeroUsize;
use tracing::debug;

use crate::core::types::{City, CityId, CityRoute};

/// Shortest route between two cities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    /// Cities along the route, endpoints included
    pub path: Vec<CityId>,
    /// Human-readable path (city names joined by arrows)
    pub path_label: String,
    /// Total route length in kilometers
    pub total_distance_km: f64,
    /// Number of intermediate cities
    pub transfers: usize,
}

/// Resolves the shortest route between two cities
pub trait RouteResolver: Send + Sync {
    /// Shortest route, or `None` when the cities are not connected
    fn shortest_route(&self, from: CityId, to: CityId) -> Option<RouteSummary>;

    /// Shortest distance in kilometers, or `None` when not connected
    fn distance_between(&self, from: CityId, to: CityId) -> Option<f64> {
        self.shortest_route(from, to)
            .map(|route| route.total_distance_km)
    }
}

/// Heap entry for the shortest-route search
///
/// Ordered by cost ascending (min-heap via reversed comparison). Costs are
/// validated-positive route sums and never NaN.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    cost: f64,
    city: CityId,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.city == other.city
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.city.cmp(&other.city))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The city network as an adjacency structure
#[derive(Debug, Clone, Default)]
pub struct CityGraph {
    adjacency: HashMap<CityId, Vec<(CityId, f64)>>,
    names: HashMap<CityId, String>,
}

impl CityGraph {
    /// Build the graph from city and route records
    ///
    /// Routes are bidirectional: one record adds an edge in both directions.
    /// Routes with a non-positive distance are skipped.
    pub fn new(cities: &[City], routes: &[CityRoute]) -> Self {
        let names = cities
            .iter()
            .map(|city| (city.city_id, city.name.clone()))
            .collect();

        let mut adjacency: HashMap<CityId, Vec<(CityId, f64)>> = HashMap::new();
        for route in routes {
            if route.distance_km <= 0.0 || !route.distance_km.is_finite() {
                debug!(route_id = route.route_id, "Skipping route with invalid distance");
                continue;
            }
            adjacency
                .entry(route.city_a)
                .or_default()
                .push((route.city_b, route.distance_km));
            adjacency
                .entry(route.city_b)
                .or_default()
                .push((route.city_a, route.distance_km));
        }

        Self { adjacency, names }
    }

    /// Name of a city, falling back to its id
    pub fn city_name(&self, city: CityId) -> String {
        self.names
            .get(&city)
            .cloned()
            .unwrap_or_else(|| format!("city {city}"))
    }

    fn summarize(&self, path: Vec<CityId>, total_distance_km: f64) -> RouteSummary {
        let path_label = path
            .iter()
            .map(|&city| self.city_name(city))
            .collect::<Vec<_>>()
            .join(" -> ");
        let transfers = path.len().saturating_sub(2);
        RouteSummary {
            path,
            path_label,
            total_distance_km,
            transfers,
        }
    }
}

impl RouteResolver for CityGraph {
    /// Dijkstra over the adjacency structure, minimizing total kilometers
    fn shortest_route(&self, from: CityId, to: CityId) -> Option<RouteSummary> {
        if from == to {
            // Same-city delivery: trivial zero-length route
            return Some(self.summarize(vec![from], 0.0));
        }
        if !self.adjacency.contains_key(&from) || !self.adjacency.contains_key(&to) {
            return None;
        }

        let mut best: HashMap<CityId, f64> = HashMap::new();
        let mut previous: HashMap<CityId, CityId> = HashMap::new();
        let mut heap = BinaryHeap::new();

        best.insert(from, 0.0);
        heap.push(HeapEntry {
            cost: 0.0,
            city: from,
        });

        while let Some(HeapEntry { cost, city }) = heap.pop() {
            if city == to {
                let mut path = vec![to];
                let mut current = to;
                while let Some(&prev) = previous.get(&current) {
                    path.push(prev);
                    current = prev;
                }
                path.reverse();
                return Some(self.summarize(path, cost));
            }
            if cost > best.get(&city).copied().unwrap_or(f64::INFINITY) {
                continue; // stale heap entry
            }
            if let Some(neighbors) = self.adjacency.get(&city) {
                for &(next, edge_km) in neighbors {
                    let next_cost = cost + edge_km;
                    if next_cost < best.get(&next).copied().unwrap_or(f64::INFINITY) {
                        best.insert(next, next_cost);
                        previous.insert(next, city);
                        heap.push(HeapEntry {
                            cost: next_cost,
                            city: next,
                        });
                    }
                }
            }
        }

        None
    }
}

/// LRU-cached wrapper around the city graph
///
/// Cache keys are normalized to the (min, max) city pair: routes are
/// bidirectional, so both query directions share one entry. The cached
/// summary's path is kept in the queried direction only on a miss; hits in
/// the reverse direction return the stored summary with the path reversed.
pub struct CachedRouteResolver {
    graph: CityGraph,
    cache: Mutex<LruCache<(CityId, CityId), Option<RouteSummary>>>,
}

impl CachedRouteResolver {
    /// Wrap a graph with a cache of the given capacity
    pub fn new(graph: CityGraph, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            graph,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The wrapped graph
    pub fn graph(&self) -> &CityGraph {
        &self.graph
    }

    fn orient(summary: RouteSummary, from: CityId, graph: &CityGraph) -> RouteSummary {
        if summary.path.first() == Some(&from) {
            return summary;
        }
        let mut path = summary.path;
        path.reverse();
        graph.summarize(path, summary.total_distance_km)
    }
}

impl RouteResolver for CachedRouteResolver {
    fn shortest_route(&self, from: CityId, to: CityId) -> Option<RouteSummary> {
        let key = (from.min(to), from.max(to));
        let cached = self.cache.lock().get(&key).cloned();
        if let Some(entry) = cached {
            return entry.map(|summary| Self::orient(summary, from, &self.graph));
        }

        let resolved = self.graph.shortest_route(from, to);
        self.cache.lock().put(key, resolved.clone());
        resolved
    }
}
