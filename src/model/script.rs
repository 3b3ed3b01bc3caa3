//! Script registry
//!
//! Scripts are keyed on the server's `scriptId`. A collected script keeps
//! its identity but every other accessor fails with `StaleScript`.

use crate::protocol::domains::debugger::{GetScriptSourceParams, LocationValue, ScriptParsedEventData};
use crate::protocol::ids::ScriptId;
use crate::wip::client::ProtocolClient;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::{debug, info};

/// Position within a script (0-based)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub script_id: ScriptId,
    pub line: i64,
    pub column: Option<i64>,
}

impl SourceLocation {
    pub fn new(script_id: ScriptId, line: i64, column: Option<i64>) -> Self {
        Self {
            script_id,
            line,
            column,
        }
    }

    pub fn from_view(location: &LocationValue<'_>) -> Result<Self> {
        Ok(Self {
            script_id: location.script_id()?,
            line: location.line_number()?,
            column: location.column_number()?,
        })
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.column {
            Some(column) => write!(f, "{}:{}:{}", self.script_id, self.line, column),
            None => write!(f, "{}:{}", self.script_id, self.line),
        }
    }
}

/// Source range of a script within its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRange {
    pub start_line: i64,
    pub start_column: i64,
    pub end_line: i64,
    pub end_column: i64,
}

/// Loaded script
#[derive(Debug)]
pub struct Script {
    id: ScriptId,
    /// Registration order
    seq: u64,
    url: String,
    range: ScriptRange,
    has_source_map: bool,
    is_content_script: bool,
    failed_to_parse: bool,
    source: OnceLock<Arc<str>>,
    collected: AtomicBool,
}

impl Script {
    fn from_event(seq: u64, data: &ScriptParsedEventData<'_>, failed_to_parse: bool) -> Result<Self> {
        Ok(Self {
            id: data.script_id()?,
            seq,
            url: data.url()?.to_string(),
            range: ScriptRange {
                start_line: data.start_line()?,
                start_column: data.start_column()?,
                end_line: data.end_line()?,
                end_column: data.end_column()?,
            },
            has_source_map: data.source_map_url()?.is_some_and(|url| !url.is_empty()),
            is_content_script: data.is_content_script()?.unwrap_or(false),
            failed_to_parse,
            source: OnceLock::new(),
            collected: AtomicBool::new(false),
        })
    }

    /// Server-assigned id; valid even after collection
    pub fn id(&self) -> &ScriptId {
        &self.id
    }

    fn check(&self) -> Result<()> {
        if self.is_collected() {
            Err(Error::stale_script(self.id.as_str()))
        } else {
            Ok(())
        }
    }

    /// Source URL; empty for eval'd code
    pub fn url(&self) -> Result<&str> {
        self.check()?;
        Ok(&self.url)
    }

    pub fn range(&self) -> Result<ScriptRange> {
        self.check()?;
        Ok(self.range)
    }

    /// True when the script was compiled from a source map
    pub fn has_source_map(&self) -> Result<bool> {
        self.check()?;
        Ok(self.has_source_map)
    }

    pub fn is_content_script(&self) -> Result<bool> {
        self.check()?;
        Ok(self.is_content_script)
    }

    pub fn failed_to_parse(&self) -> Result<bool> {
        self.check()?;
        Ok(self.failed_to_parse)
    }

    /// Source text if already fetched
    pub fn cached_source(&self) -> Result<Option<Arc<str>>> {
        self.check()?;
        Ok(self.source.get().cloned())
    }

    pub fn is_collected(&self) -> bool {
        self.collected.load(Ordering::Acquire)
    }

    fn mark_collected(&self) {
        self.collected.store(true, Ordering::Release);
    }
}

/// Catalogue of live scripts
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    scripts: RwLock<HashMap<ScriptId, Arc<Script>>>,
    next_seq: AtomicU64,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script from `scriptParsed` or `scriptFailedToParse`
    ///
    /// A second report for a known id replaces the old script, which is
    /// marked collected.
    pub fn on_script_parsed(&self, data: &ScriptParsedEventData<'_>, failed_to_parse: bool) -> Result<Arc<Script>> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let script = Arc::new(Script::from_event(seq, data, failed_to_parse)?);

        debug!("Script parsed: {} {}", script.id, script.url);

        let previous = self
            .scripts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(script.id.clone(), Arc::clone(&script));
        if let Some(previous) = previous {
            previous.mark_collected();
        }

        Ok(script)
    }

    pub fn get(&self, id: &ScriptId) -> Option<Arc<Script>> {
        self.scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Live scripts in registration order
    pub fn list(&self) -> Vec<Arc<Script>> {
        let mut scripts: Vec<_> = self
            .scripts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        scripts.sort_by_key(|script| script.seq);
        scripts
    }

    /// Scripts whose URL equals `url`
    pub fn find_by_url(&self, url: &str) -> Vec<Arc<Script>> {
        self.list().into_iter().filter(|script| script.url == url).collect()
    }

    pub fn len(&self) -> usize {
        self.scripts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark every script collected and drop it from the registry
    pub fn collect_all(&self) -> Vec<Arc<Script>> {
        let drained: Vec<_> = self
            .scripts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, script)| script)
            .collect();

        for script in &drained {
            script.mark_collected();
        }
        if !drained.is_empty() {
            info!("Collected {} scripts", drained.len());
        }

        let mut drained = drained;
        drained.sort_by_key(|script| script.seq);
        drained
    }

    /// Source text, fetched with `Debugger.getScriptSource` on first use
    pub async fn source(&self, client: &ProtocolClient, id: &ScriptId) -> Result<Arc<str>> {
        let script = self.get(id).ok_or_else(|| Error::stale_script(id.as_str()))?;
        if let Some(source) = script.cached_source()? {
            return Ok(source);
        }

        debug!("Fetching source of script {}", id);
        let reply = client
            .call(GetScriptSourceParams {
                script_id: id.clone(),
            })
            .await?;
        let text: Arc<str> = Arc::from(reply.data()?.script_source()?);

        // Collected while the request was in flight
        script.check()?;
        Ok(Arc::clone(script.source.get_or_init(|| text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parsed(id: &str, url: &str) -> serde_json::Value {
        json!({
            "scriptId": id, "url": url,
            "startLine": 0, "startColumn": 0, "endLine": 10, "endColumn": 1
        })
    }

    #[test]
    fn test_register_and_list_in_order() {
        let registry = ScriptRegistry::new();
        for (id, url) in [("3", "http://site/b.js"), ("1", "http://site/a.js"), ("2", "")] {
            let payload = parsed(id, url);
            registry
                .on_script_parsed(&ScriptParsedEventData::parse(&payload).unwrap(), false)
                .unwrap();
        }

        let ids: Vec<_> = registry.list().iter().map(|s| s.id().as_str().to_string()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(registry.find_by_url("http://site/a.js").len(), 1);
    }

    #[test]
    fn test_source_map_flag() {
        let registry = ScriptRegistry::new();
        let mut payload = parsed("1", "http://site/app.min.js");
        payload["sourceMapURL"] = json!("app.min.js.map");
        let script = registry
            .on_script_parsed(&ScriptParsedEventData::parse(&payload).unwrap(), false)
            .unwrap();
        assert!(script.has_source_map().unwrap());
        assert!(!script.failed_to_parse().unwrap());
    }

    #[test]
    fn test_collected_script_is_stale() {
        let registry = ScriptRegistry::new();
        let payload = parsed("1", "http://site/a.js");
        let script = registry
            .on_script_parsed(&ScriptParsedEventData::parse(&payload).unwrap(), true)
            .unwrap();
        assert!(script.failed_to_parse().unwrap());

        let collected = registry.collect_all();
        assert_eq!(collected.len(), 1);
        assert!(registry.is_empty());

        // Identity survives, attributes do not
        assert_eq!(script.id().as_str(), "1");
        assert!(matches!(script.url(), Err(Error::StaleScript(ref id)) if id == "1"));
        assert!(script.range().is_err());
    }

    #[test]
    fn test_reparse_replaces_script() {
        let registry = ScriptRegistry::new();
        let payload = parsed("1", "http://site/a.js");
        let first = registry
            .on_script_parsed(&ScriptParsedEventData::parse(&payload).unwrap(), false)
            .unwrap();
        let second = registry
            .on_script_parsed(&ScriptParsedEventData::parse(&payload).unwrap(), false)
            .unwrap();

        assert!(first.is_collected());
        assert!(!second.is_collected());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_missing_field_rejects_script() {
        let registry = ScriptRegistry::new();
        let payload = json!({ "scriptId": "1", "url": "" });
        let err = registry
            .on_script_parsed(&ScriptParsedEventData::parse(&payload).unwrap(), false)
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolMissingField { .. }));
        assert!(registry.is_empty());
    }
}
