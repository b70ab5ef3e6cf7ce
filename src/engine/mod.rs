// src/engine/mod.rs - Operations Engines
//! # Operations Engines
//!
//! The two cooperating engines behind the console, wired together by
//! [`OpsEngine`]:
//!
//! - [`lifecycle::LifecycleEngine`] mutates single orders through the
//!   status state machine with its logistics side effects
//! - [`analytics`] turns a point-in-time record snapshot into labeled,
//!   chart-ready bucket series per scope
//!
//! Records flow one way through each: fetched records → engine → caller.
//! The engines share only the order-status vocabulary and the bucketing
//! rules.

pub mod analytics;
pub mod lifecycle;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::instrument;

use crate::core::auth::{ActorContext, Capability, CapabilityMap};
use crate::routing::RouteResolver;
use crate::storage::{OrderStore, RecordSource};
use crate::{EstoreError, EstoreResult};

use analytics::{AnalyzeGroup, Bucket, FacetFilter, Scope};
use lifecycle::LifecycleEngine;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the order-event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: 1024,
        }
    }
}

/// Counters across both engines
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Aggregation calls served
    pub aggregations: AtomicU64,
    /// Aggregation calls rejected for missing capability
    pub aggregations_denied: AtomicU64,
}

/// Facade wiring both engines to their collaborators
pub struct OpsEngine {
    lifecycle: Arc<LifecycleEngine>,
    records: Arc<dyn RecordSource>,
    capabilities: Arc<dyn CapabilityMap>,
    stats: EngineStats,
}

impl OpsEngine {
    /// Create the engine facade
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn OrderStore>,
        records: Arc<dyn RecordSource>,
        resolver: Arc<dyn RouteResolver>,
        capabilities: Arc<dyn CapabilityMap>,
    ) -> Self {
        let lifecycle = Arc::new(LifecycleEngine::new(
            config,
            store,
            records.clone(),
            resolver,
            capabilities.clone(),
        ));
        Self {
            lifecycle,
            records,
            capabilities,
            stats: EngineStats::default(),
        }
    }

    /// The order lifecycle engine
    pub fn lifecycle(&self) -> &Arc<LifecycleEngine> {
        &self.lifecycle
    }

    /// Whether the actor's department grants a capability
    pub fn grants(&self, actor: &ActorContext, capability: Capability) -> bool {
        self.capabilities.grants(actor.department, capability)
    }

    /// Engine counters
    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Run every analytics view registered for the scope
    ///
    /// Takes one snapshot and computes all of the scope's views from it, so
    /// the returned dashboard is internally consistent; a second call may
    /// observe different data. Every view key is always present - a filter
    /// matching nothing yields empty bucket lists, not missing keys.
    #[instrument(skip(self, filter, actor), fields(scope = %scope))]
    pub async fn aggregate(
        &self,
        scope: Scope,
        filter: &FacetFilter,
        actor: &ActorContext,
    ) -> EstoreResult<BTreeMap<&'static str, Vec<Bucket>>> {
        if !self
            .capabilities
            .grants(actor.department, Capability::ViewAnalytics)
        {
            self.stats.aggregations_denied.fetch_add(1, Ordering::Relaxed);
            return Err(EstoreError::AccessDenied(format!(
                "department {} cannot view analytics",
                actor.department
            )));
        }
        filter.validate()?;

        let snapshot = self.records.analytics_snapshot().await?;
        self.stats.aggregations.fetch_add(1, Ordering::Relaxed);
        Ok(analytics::aggregate(scope, &snapshot, filter))
    }

    /// Generic analyze breakdown: delivered order volume by the chosen grouping
    #[instrument(skip(self, filter, actor))]
    pub async fn analyze(
        &self,
        group: AnalyzeGroup,
        filter: &FacetFilter,
        actor: &ActorContext,
    ) -> EstoreResult<Vec<Bucket>> {
        if !self
            .capabilities
            .grants(actor.department, Capability::ViewAnalytics)
        {
            self.stats.aggregations_denied.fetch_add(1, Ordering::Relaxed);
            return Err(EstoreError::AccessDenied(format!(
                "department {} cannot view analytics",
                actor.department
            )));
        }
        filter.validate()?;

        let snapshot = self.records.analytics_snapshot().await?;
        self.stats.aggregations.fetch_add(1, Ordering::Relaxed);
        Ok(analytics::analyze_share(&snapshot, group, filter))
    }
}
