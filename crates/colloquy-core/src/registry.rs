//! Tool registry: accumulates and deduplicates descriptors advertised by
//! upstream providers.

use tokio::sync::watch;

use crate::protocol::ToolDescriptor;

/// Groups descriptors by derived category, categories ordered by first
/// appearance. Presentation-only; produces no state.
pub fn group_by_category(tools: &[ToolDescriptor]) -> Vec<(String, Vec<ToolDescriptor>)> {
    let mut groups: Vec<(String, Vec<ToolDescriptor>)> = Vec::new();
    for tool in tools {
        let category = tool.category().to_string();
        match groups.iter_mut().find(|(name, _)| *name == category) {
            Some((_, members)) => members.push(tool.clone()),
            None => groups.push((category, vec![tool.clone()])),
        }
    }
    groups
}

/// Deduplicated set of advertised tools, keyed on `name` alone.
///
/// Every `tools` frame conveys a provider's full current list, so a batch is
/// merged last-write-wins by name and the stored snapshot swapped wholesale.
/// Mutated only from the session task; observers get watch snapshots.
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    snapshot_tx: watch::Sender<Vec<ToolDescriptor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            tools: Vec::new(),
            snapshot_tx,
        }
    }

    /// Merge a validated batch. Duplicates within the batch or against the
    /// current snapshot resolve to the most recently received descriptor;
    /// provider identity is not part of the key.
    pub fn ingest(&mut self, batch: Vec<ToolDescriptor>) {
        for tool in batch {
            match self.tools.iter_mut().find(|t| t.name == tool.name) {
                Some(slot) => *slot = tool,
                None => self.tools.push(tool),
            }
        }
        let _ = self.snapshot_tx.send(self.tools.clone());
    }

    /// Current snapshot, ordered by first insertion of each surviving name.
    pub fn snapshot(&self) -> Vec<ToolDescriptor> {
        self.tools.clone()
    }

    pub fn by_category(&self) -> Vec<(String, Vec<ToolDescriptor>)> {
        group_by_category(&self.tools)
    }

    /// Subscribe to snapshot changes. The presentation layer is one
    /// subscriber among possible others (e.g. a test harness).
    pub fn subscribe(&self) -> watch::Receiver<Vec<ToolDescriptor>> {
        self.snapshot_tx.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
