//! node to plan mapping and configuration lookup across plans
//!
//! Storage of plans is not handled here. A [PlanCache] hands out parsed plans by id and
//! [PlanLookup] answers "which plan deploys this node" and "what is the value of this key for
//! this node".
use crate::configuration::{ConfigurationValueNotFound, Scope};
use crate::plan::Plan;
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Source of parsed plans
pub trait PlanCache: Send + Sync {
    /// Ids of all known plans
    fn list(&self) -> Vec<String>;

    fn get(&self, id: &str) -> Option<Arc<Plan>>;
}

impl PlanCache for IndexMap<String, Arc<Plan>> {
    fn list(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn get(&self, id: &str) -> Option<Arc<Plan>> {
        IndexMap::get(self, id).cloned()
    }
}

pub struct PlanLookup<C> {
    cache: C,
}

impl<C: PlanCache> PlanLookup<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }

    /// First plan, in cache order, which has a node called `node`
    ///
    /// Plans whose nodes can't be parsed are skipped.
    pub fn find_plan(&self, node: &str) -> Option<Arc<Plan>> {
        self.cache.list().into_iter().find_map(|id| {
            tracing::debug!(plan = %id, node, "checking plan for node");
            let plan = self.cache.get(&id)?;
            match plan.find_node(node) {
                Ok(Some(_)) => {
                    tracing::debug!(plan = %id, node, "node found in plan");
                    Some(plan)
                }
                Ok(None) => None,
                Err(error) => {
                    tracing::debug!(plan = %id, %error, "skipping invalid plan");
                    None
                }
            }
        })
    }

    /// Value of `key` in the first of `sources` which has one
    ///
    /// `None` if no plan deploys `node`, its configuration is invalid or no source has the key.
    pub fn lookup<S: AsRef<str>>(
        &self,
        node: &str,
        key: &str,
        sources: &[S],
        scope: &Scope,
    ) -> Option<Value> {
        let plan = self.find_plan(node)?;
        let configuration = match plan.configuration() {
            Ok(configuration) => configuration,
            Err(error) => {
                tracing::debug!(node, %error, "invalid configuration");
                return None;
            }
        };

        sources.iter().find_map(|source| {
            let source = source.as_ref();
            tracing::debug!(source, key, "looking for data source");
            match configuration.lookup(source, key, scope) {
                Ok(value) => Some(value.clone()),
                Err(ConfigurationValueNotFound { .. }) => None,
            }
        })
    }
}
