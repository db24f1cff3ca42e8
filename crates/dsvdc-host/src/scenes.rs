//! Per-output scene table.
//!
//! Every output carries 128 scene entries (indices 0-127). Defaults:
//! the off presets 0-4 put all channels at their minimum, the on
//! presets 5-9 at their maximum, both with `dontCare=false` and a
//! smooth effect; every other index starts as `dontCare=true` so a
//! scene call does not touch the output until `saveScene` overwrites
//! the entry.

use std::collections::BTreeMap;

use crate::enums::SceneEffect;
use crate::persist::{SceneChannelRecord, SceneRecord};

pub const SCENE_COUNT: usize = 128;

/// Per-channel portion of a scene entry, keyed by channel dsIndex.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneChannel {
    pub value: f64,
    pub dont_care: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntry {
    pub dont_care: bool,
    pub ignore_local_priority: bool,
    pub effect: SceneEffect,
    pub channels: BTreeMap<u8, SceneChannel>,
}

impl SceneEntry {
    fn dont_care() -> Self {
        Self {
            dont_care: true,
            ignore_local_priority: false,
            effect: SceneEffect::Smooth,
            channels: BTreeMap::new(),
        }
    }

    fn preset(channels: &[(u8, f64)]) -> Self {
        Self {
            dont_care: false,
            ignore_local_priority: false,
            effect: SceneEffect::Smooth,
            channels: channels
                .iter()
                .map(|(idx, value)| {
                    (
                        *idx,
                        SceneChannel {
                            value: *value,
                            dont_care: false,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug)]
pub struct SceneTable {
    entries: Vec<SceneEntry>,
}

impl SceneTable {
    /// Build the default table for the given channels, each described
    /// by `(ds_index, min, max)`.
    pub fn with_defaults(channels: &[(u8, f64, f64)]) -> Self {
        let mins: Vec<(u8, f64)> = channels.iter().map(|(i, min, _)| (*i, *min)).collect();
        let maxs: Vec<(u8, f64)> = channels.iter().map(|(i, _, max)| (*i, *max)).collect();

        let mut entries = Vec::with_capacity(SCENE_COUNT);
        for index in 0..SCENE_COUNT {
            let entry = match index {
                // PRESET_0 and the area off scenes.
                0..=4 => SceneEntry::preset(&mins),
                // PRESET_1 and the area on scenes.
                5..=9 => SceneEntry::preset(&maxs),
                _ => SceneEntry::dont_care(),
            };
            entries.push(entry);
        }
        Self { entries }
    }

    pub fn get(&self, scene: u8) -> Option<&SceneEntry> {
        self.entries.get(scene as usize)
    }

    pub fn get_mut(&mut self, scene: u8) -> Option<&mut SceneEntry> {
        self.entries.get_mut(scene as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Overwrite entry `scene` with a snapshot of the given current
    /// channel values. `dontCare` is cleared; effect and
    /// ignoreLocalPriority are kept.
    pub fn save(&mut self, scene: u8, current: &[(u8, Option<f64>)]) {
        let Some(entry) = self.entries.get_mut(scene as usize) else {
            return;
        };
        entry.dont_care = false;
        entry.channels = current
            .iter()
            .filter_map(|(idx, value)| {
                value.map(|v| {
                    (
                        *idx,
                        SceneChannel {
                            value: v,
                            dont_care: false,
                        },
                    )
                })
            })
            .collect();
    }

    /// Channels to apply for a `callScene`, or `None` when the entry
    /// does not exist or is `dontCare` (call has no effect).
    pub fn channels_for_call(&self, scene: u8) -> Option<Vec<(u8, f64)>> {
        let entry = self.entries.get(scene as usize)?;
        if entry.dont_care {
            return None;
        }
        Some(
            entry
                .channels
                .iter()
                .filter(|(_, ch)| !ch.dont_care)
                .map(|(idx, ch)| (*idx, ch.value))
                .collect(),
        )
    }

    /// Ensure every channel in `channels` has a slot in the on/off
    /// preset entries (used when channels are added after output
    /// construction).
    pub fn extend_defaults(&mut self, channels: &[(u8, f64, f64)]) {
        for (idx, min, max) in channels {
            for scene in 0..=4u8 {
                if let Some(entry) = self.entries.get_mut(scene as usize) {
                    entry.channels.entry(*idx).or_insert(SceneChannel {
                        value: *min,
                        dont_care: false,
                    });
                }
            }
            for scene in 5..=9u8 {
                if let Some(entry) = self.entries.get_mut(scene as usize) {
                    entry.channels.entry(*idx).or_insert(SceneChannel {
                        value: *max,
                        dont_care: false,
                    });
                }
            }
        }
    }

    pub(crate) fn to_records(&self) -> Vec<SceneRecord> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| SceneRecord {
                index: index as u8,
                dont_care: entry.dont_care,
                ignore_local_priority: entry.ignore_local_priority,
                effect: entry.effect.into(),
                channels: entry
                    .channels
                    .iter()
                    .map(|(idx, ch)| {
                        (
                            *idx,
                            SceneChannelRecord {
                                value: ch.value,
                                dont_care: ch.dont_care,
                            },
                        )
                    })
                    .collect(),
            })
            .collect()
    }

    pub(crate) fn apply_records(&mut self, records: &[SceneRecord]) {
        for record in records {
            let Some(entry) = self.entries.get_mut(record.index as usize) else {
                continue;
            };
            entry.dont_care = record.dont_care;
            entry.ignore_local_priority = record.ignore_local_priority;
            entry.effect = SceneEffect::from_i64(record.effect).unwrap_or(SceneEffect::Smooth);
            entry.channels = record
                .channels
                .iter()
                .map(|(idx, ch)| {
                    (
                        *idx,
                        SceneChannel {
                            value: ch.value,
                            dont_care: ch.dont_care,
                        },
                    )
                })
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::scene;

    fn dimmer_table() -> SceneTable {
        // One brightness channel 0..100.
        SceneTable::with_defaults(&[(0, 0.0, 100.0)])
    }

    #[test]
    fn default_table_shape() {
        let table = dimmer_table();
        assert_eq!(table.len(), SCENE_COUNT);

        let off = table.get(scene::PRESET_0).unwrap();
        assert!(!off.dont_care);
        assert_eq!(off.effect, SceneEffect::Smooth);
        assert_eq!(off.channels[&0].value, 0.0);
        assert!(!off.channels[&0].dont_care);

        let on = table.get(scene::PRESET_1).unwrap();
        assert!(!on.dont_care);
        assert_eq!(on.channels[&0].value, 100.0);

        // Area variants follow their presets.
        assert_eq!(table.get(scene::AREA_1_OFF).unwrap().channels[&0].value, 0.0);
        assert_eq!(table.get(scene::AREA_4_ON).unwrap().channels[&0].value, 100.0);

        // Anything else defaults to dontCare.
        assert!(table.get(scene::PRESET_2).unwrap().dont_care);
        assert!(table.get(scene::PANIC).unwrap().dont_care);
        assert!(table.get(scene::INCREMENT).unwrap().dont_care);
    }

    #[test]
    fn save_clears_dont_care_and_snapshots() {
        let mut table = dimmer_table();
        table.save(scene::PRESET_2, &[(0, Some(73.0))]);
        let entry = table.get(scene::PRESET_2).unwrap();
        assert!(!entry.dont_care);
        assert_eq!(entry.channels[&0].value, 73.0);
        assert!(!entry.channels[&0].dont_care);

        assert_eq!(table.channels_for_call(scene::PRESET_2), Some(vec![(0, 73.0)]));
    }

    #[test]
    fn dont_care_call_has_no_channels() {
        let table = dimmer_table();
        assert!(table.channels_for_call(scene::PRESET_2).is_none());
        assert!(table.channels_for_call(200).is_none());
    }

    #[test]
    fn records_round_trip() {
        let mut table = dimmer_table();
        table.save(scene::PRESET_2, &[(0, Some(42.0))]);
        let records = table.to_records();
        assert_eq!(records.len(), SCENE_COUNT);

        let mut restored = dimmer_table();
        restored.apply_records(&records);
        assert_eq!(
            restored.get(scene::PRESET_2).unwrap(),
            table.get(scene::PRESET_2).unwrap()
        );
    }

    #[test]
    fn extend_defaults_covers_new_channels() {
        let mut table = dimmer_table();
        table.extend_defaults(&[(1, 100.0, 1000.0)]);
        assert_eq!(table.get(scene::PRESET_0).unwrap().channels[&1].value, 100.0);
        assert_eq!(table.get(scene::PRESET_1).unwrap().channels[&1].value, 1000.0);
    }
}
