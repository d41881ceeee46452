//! Vindex type registry and definition loading.
//!
//! The registry is an explicit value handed to whatever loads vindex
//! definitions; there is no process-wide registration. Tests and embedders can
//! build registries with only the types they need.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::VindexError;
use crate::params::VindexParams;
use crate::vindex::{
    LookupNonUnique, LookupUnique, LookupVindex, LOOKUP_NON_UNIQUE_TYPE, LOOKUP_UNIQUE_TYPE,
};

/// Builds a vindex named by the first argument from its option map.
pub type VindexConstructor = fn(&str, &VindexParams) -> Result<Arc<dyn LookupVindex>, VindexError>;

/// One vindex declaration, as found in a keyspace schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VindexDefinition {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub params: VindexParams,
    /// Table that owns the lookup rows, if declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

fn new_lookup(name: &str, params: &VindexParams) -> Result<Arc<dyn LookupVindex>, VindexError> {
    Ok(Arc::new(LookupNonUnique::new(name, params)?))
}

fn new_lookup_unique(
    name: &str,
    params: &VindexParams,
) -> Result<Arc<dyn LookupVindex>, VindexError> {
    Ok(Arc::new(LookupUnique::new(name, params)?))
}

/// Table of vindex constructors keyed by type name.
#[derive(Clone, Default)]
pub struct VindexRegistry {
    constructors: BTreeMap<String, VindexConstructor>,
}

impl VindexRegistry {
    /// Registry with no types.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with `lookup` and `lookup_unique`.
    pub fn with_lookup_types() -> Self {
        let mut registry = Self::empty();
        registry
            .constructors
            .insert(LOOKUP_NON_UNIQUE_TYPE.to_string(), new_lookup);
        registry
            .constructors
            .insert(LOOKUP_UNIQUE_TYPE.to_string(), new_lookup_unique);
        registry
    }

    pub fn register(
        &mut self,
        type_name: &str,
        constructor: VindexConstructor,
    ) -> Result<(), VindexError> {
        if self.constructors.contains_key(type_name) {
            return Err(VindexError::DuplicateVindexType {
                type_name: type_name.to_string(),
            });
        }
        self.constructors
            .insert(type_name.to_string(), constructor);
        Ok(())
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Builds one vindex.
    pub fn create(
        &self,
        type_name: &str,
        name: &str,
        params: &VindexParams,
    ) -> Result<Arc<dyn LookupVindex>> {
        let constructor =
            self.constructors
                .get(type_name)
                .ok_or_else(|| VindexError::UnknownVindexType {
                    type_name: type_name.to_string(),
                })?;
        Ok(constructor(name, params)?)
    }

    /// Builds every vindex in `definitions`.
    ///
    /// Any construction failure fails the whole load. Unknown options are
    /// logged and kept on each vindex for later inspection.
    pub fn load(&self, definitions: &BTreeMap<String, VindexDefinition>) -> Result<VindexSet> {
        let mut vindexes = BTreeMap::new();
        for (name, definition) in definitions {
            let vindex = self
                .create(&definition.type_name, name, &definition.params)
                .with_context(|| format!("build vindex '{name}' ({})", definition.type_name))?;
            if !vindex.unknown_params().is_empty() {
                warn!(
                    vindex = %name,
                    vindex_type = %definition.type_name,
                    unknown = ?vindex.unknown_params(),
                    "vindex definition has unknown params"
                );
            }
            vindexes.insert(name.clone(), vindex);
        }
        Ok(VindexSet { vindexes })
    }

    /// Parses a JSON object of `name -> definition` and builds every vindex.
    pub fn load_json(&self, raw: &str) -> Result<VindexSet> {
        let definitions: BTreeMap<String, VindexDefinition> =
            serde_json::from_str(raw).context("parse vindex definitions json")?;
        self.load(&definitions)
    }
}

/// Vindexes built from one set of definitions, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct VindexSet {
    vindexes: BTreeMap<String, Arc<dyn LookupVindex>>,
}

impl VindexSet {
    pub fn get(&self, name: &str) -> Option<&Arc<dyn LookupVindex>> {
        self.vindexes.get(name)
    }

    pub fn len(&self) -> usize {
        self.vindexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vindexes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn LookupVindex>)> {
        self.vindexes
            .iter()
            .map(|(name, vindex)| (name.as_str(), vindex))
    }

    /// Vindexes still in write-only mode.
    pub fn backfilling(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, vindex)| vindex.is_backfilling())
            .map(|(name, _)| name)
            .collect()
    }

    /// Unknown options per vindex, omitting vindexes without any.
    pub fn unknown_params(&self) -> BTreeMap<&str, &[String]> {
        self.iter()
            .filter(|(_, vindex)| !vindex.unknown_params().is_empty())
            .map(|(name, vindex)| (name, vindex.unknown_params()))
            .collect()
    }

    /// Signals backfill completion for `name`. Returns whether it transitioned.
    pub fn complete_backfill(&self, name: &str) -> Result<bool> {
        let vindex = self
            .get(name)
            .with_context(|| format!("vindex '{name}' is not defined"))?;
        Ok(vindex.complete_backfill())
    }
}
