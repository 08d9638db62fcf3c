use std::collections::BTreeMap;

use crate::adapter::AdapterSet;
use crate::model::{InstalledItem, ItemSource, UpdateStatus};

/// Runs every source's update check over its own items, then settles the
/// status of whatever the checks left undecided.
pub struct UpdateResolver {
    adapters: AdapterSet,
}

impl UpdateResolver {
    pub fn new(adapters: AdapterSet) -> Self {
        Self { adapters }
    }

    /// Checks `items` source by source and returns them, in their original
    /// order, with the number that have an update available.
    pub async fn resolve(&self, items: Vec<InstalledItem>) -> (Vec<InstalledItem>, usize) {
        let total = items.len();
        let mut groups: BTreeMap<ItemSource, Vec<(usize, InstalledItem)>> = BTreeMap::new();
        for (position, item) in items.into_iter().enumerate() {
            groups.entry(item.source).or_default().push((position, item));
        }

        let mut slots: Vec<Option<InstalledItem>> = (0..total).map(|_| None).collect();

        // Registration order, so the check sequence does not depend on enum order.
        for adapter in self.adapters.iter() {
            let Some(group) = groups.remove(&adapter.source()) else {
                continue;
            };
            let (positions, mut batch): (Vec<usize>, Vec<InstalledItem>) = group.into_iter().unzip();

            match adapter.check_updates(&mut batch).await {
                Ok(found) => {
                    tracing::debug!(source = %adapter.source(), items = batch.len(), found, "update check complete");
                    reconcile(&mut batch, adapter.exhaustive_check());
                }
                Err(err) => {
                    tracing::warn!(source = %adapter.source(), error = %err, "update check failed");
                    let message = format!("update check failed: {err}");
                    for item in batch.iter_mut().filter(|i| !i.status.is_definitive()) {
                        item.error_message = Some(message.clone());
                    }
                }
            }

            for (position, item) in positions.into_iter().zip(batch) {
                slots[position] = Some(item);
            }
        }

        // Items from sources without a registered adapter pass through unchecked.
        for (source, group) in groups {
            tracing::debug!(%source, items = group.len(), "no adapter registered for source");
            for (position, mut item) in group {
                reconcile(std::slice::from_mut(&mut item), false);
                slots[position] = Some(item);
            }
        }

        let items: Vec<InstalledItem> = slots.into_iter().flatten().collect();
        let updates = items.iter().filter(|i| i.has_update()).count();
        tracing::info!(items = items.len(), updates, "update check finished");
        (items, updates)
    }
}

/// Settles items their adapter left undecided.
///
/// Verdicts already reached are kept. Anything else is current when a latest
/// version is known or the source's check lists every outdated item, and
/// stays `Unknown` otherwise.
pub fn reconcile(items: &mut [InstalledItem], exhaustive: bool) {
    for item in items.iter_mut() {
        if item.status.is_definitive() {
            continue;
        }
        if !item.latest_version.is_empty() || exhaustive {
            item.status = UpdateStatus::UpToDate;
        } else {
            item.status = UpdateStatus::Unknown;
        }
    }
}
