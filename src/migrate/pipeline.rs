//! Diff, translate and write stages that rebuild one map in the new format.
//!
//! ```text
//! legacy diff ──[RowDiff]──▶ translator ──[TupleEdit]──▶ tree writer
//! ```
//!
//! Each stage runs on its own thread; the two channels are bounded, so a
//! slow writer throttles the diff walk. The diff yields keys in ascending
//! order and translation preserves order, so the writer sees a strictly
//! ascending key stream and can apply it in one forward pass.

use crossbeam::channel::{self, Receiver, Sender};

use super::translate::{TupleEdit, TupleTranslator};
use super::{CancelToken, MigrateError, TaskGroup};
use crate::Error;
use crate::core::{CoreError, NewTuple, TupleLayout};
use crate::legacy::{LegacyMap, RowDiff};
use crate::store::TupleMap;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pipeline {
    channel_capacity: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Pipeline {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// Applies the changes from `legacy_baseline` to `legacy_map` on top of
    /// `migrated_baseline` and returns the resulting map.
    ///
    /// The baselines must describe the same rows: when they do not, the
    /// caller passes empty maps for both and the whole map is rebuilt.
    pub fn migrate_index(
        &self,
        layout: &TupleLayout,
        legacy_baseline: &LegacyMap,
        legacy_map: &LegacyMap,
        migrated_baseline: &TupleMap,
        parent_cancel: &CancelToken,
    ) -> Result<TupleMap, Error> {
        if legacy_map.hash() == legacy_baseline.hash() {
            return Ok(migrated_baseline.clone());
        }
        let translator = TupleTranslator::new(layout.clone());
        let (diff_tx, diff_rx) = channel::bounded::<RowDiff>(self.channel_capacity);
        let (edit_tx, edit_rx) = channel::bounded::<TupleEdit>(self.channel_capacity);

        std::thread::scope(|scope| {
            let group = TaskGroup::new(scope, parent_cancel);
            let producer = group.spawn("migrate-diff", move |token| {
                produce_diffs(legacy_baseline, legacy_map, diff_tx, token)
            })?;
            let translate = group.spawn("migrate-translate", move |token| {
                translate_diffs(&translator, diff_rx, edit_tx, token)
            })?;
            let writer = group.spawn("migrate-write", move |token| {
                write_edits(migrated_baseline, edit_rx, token)
            })?;

            let produced = group.join(producer);
            let translated = group.join(translate);
            let written = group.join(writer);
            group.finish()?;
            let sent = produced?;
            translated?;
            let map = written?;
            tracing::trace!(changes = sent, rows = map.len(), "index map rebuilt");
            Ok(map)
        })
    }
}

/// [`Pipeline::migrate_index`] with the default channel capacity.
pub fn migrate_index(
    layout: &TupleLayout,
    legacy_baseline: &LegacyMap,
    legacy_map: &LegacyMap,
    migrated_baseline: &TupleMap,
    parent_cancel: &CancelToken,
) -> Result<TupleMap, Error> {
    Pipeline::default().migrate_index(
        layout,
        legacy_baseline,
        legacy_map,
        migrated_baseline,
        parent_cancel,
    )
}

fn produce_diffs(
    legacy_baseline: &LegacyMap,
    legacy_map: &LegacyMap,
    tx: Sender<RowDiff>,
    token: &CancelToken,
) -> Result<usize, Error> {
    let mut sent = 0usize;
    legacy_map.diff(legacy_baseline, |diff| {
        token.send(&tx, diff)?;
        sent += 1;
        Ok::<_, MigrateError>(())
    })?;
    Ok(sent)
}

fn translate_diffs(
    translator: &TupleTranslator,
    rx: Receiver<RowDiff>,
    tx: Sender<TupleEdit>,
    token: &CancelToken,
) -> Result<(), Error> {
    while let Some(diff) = token.recv(&rx)? {
        let edit = translator.translate_diff(&diff).map_err(CoreError::from)?;
        token.send(&tx, edit)?;
    }
    Ok(())
}

fn write_edits(
    baseline: &TupleMap,
    rx: Receiver<TupleEdit>,
    token: &CancelToken,
) -> Result<TupleMap, Error> {
    let mut editor = baseline.editor();
    let mut last: Option<NewTuple> = None;
    while let Some(edit) = token.recv(&rx)? {
        if let Some(prev) = &last
            && edit.key <= *prev
        {
            return Err(MigrateError::PipelineProtocol(format!(
                "key {} arrived after {}",
                edit.key, prev
            ))
            .into());
        }
        match edit.value {
            Some(value) => editor.put(edit.key.clone(), value),
            None => editor.delete(&edit.key),
        }
        last = Some(edit.key);
    }
    // Upstream may have closed its channel because it failed.
    if token.is_cancelled() {
        return Err(MigrateError::Cancelled.into());
    }
    Ok(editor.finish())
}
