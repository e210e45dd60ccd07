use rand::Rng;
use serde::Serialize;

use crate::{ConfigError, FrameTiming};

/// Whether a time-slot block grants transmit or receive-only slots.
#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::Display, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum BlockRole {
    /// Slots in which the group may transmit (and receive).
    Transmit,
    /// Slots in which the group only receives.
    Receive,
}

/// A block of slots recurring at a fixed interval through the frame.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct TimeSlotBlock {
    /// First slot of the block.
    pub offset: usize,
    /// Distance between consecutive slots of the block.
    pub interval: usize,
    /// Role of the block.
    pub role: BlockRole,
}

impl TimeSlotBlock {
    /// Parses a block given as `<set>-<index>-<rrn>`, e.g., `A-0-12`.
    ///
    /// The set is a letter naming one of the interleaved sets of the frame, the index is the
    /// starting slot within that set, and the recurrence rate number (1 to 15) determines how
    /// often the block repeats: RRN 15 takes every slot of the set, each lower number halves that.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BadTimeSlotBlock`] if the text does not follow the format or any of
    /// its fields is out of range for `frame`.
    pub fn parse(text: &str, role: BlockRole, frame: &FrameTiming) -> Result<Self, ConfigError> {
        let bad = || ConfigError::BadTimeSlotBlock(text.to_string());
        let mut fields = text.split('-');
        let (set, index, rrn) = match (fields.next(), fields.next(), fields.next(), fields.next())
        {
            (Some(set), Some(index), Some(rrn), None) => (set, index, rrn),
            _ => return Err(bad()),
        };
        let mut set_chars = set.chars();
        let set = match (set_chars.next(), set_chars.next()) {
            (Some(letter), None) if letter.is_ascii_alphabetic() => {
                (letter.to_ascii_uppercase() as u8 - b'A') as usize
            }
            _ => return Err(bad()),
        };
        let index: usize = index.parse().map_err(|_| bad())?;
        let rrn: u32 = rrn.parse().map_err(|_| bad())?;
        if set >= frame.sets_per_frame || index >= frame.slots_per_set() || !(1..=15).contains(&rrn)
        {
            return Err(bad());
        }
        Ok(Self {
            offset: index * frame.sets_per_frame + set,
            interval: (1 << (15 - rrn)) * frame.sets_per_frame,
            role,
        })
    }

    /// All slots of the frame covered by this block.
    pub fn slots(&self, slots_per_frame: usize) -> impl Iterator<Item = usize> {
        (self.offset..slots_per_frame).step_by(self.interval.max(1))
    }
}

/// The slots a group listens on and the subset in which it may transmit.
///
/// Both lists are sorted ascending and hold indices within the frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotTable {
    slots: Vec<usize>,
    transmit: Vec<usize>,
}

impl SlotTable {
    /// Expands explicit time-slot blocks across the frame.
    #[must_use]
    pub fn from_blocks(blocks: &[TimeSlotBlock], slots_per_frame: usize) -> Self {
        let mut slots = Vec::new();
        let mut transmit = Vec::new();
        for block in blocks {
            for slot in block.slots(slots_per_frame) {
                slots.push(slot);
                if block.role == BlockRole::Transmit {
                    transmit.push(slot);
                }
            }
        }
        slots.sort_unstable();
        transmit.sort_unstable();
        Self { slots, transmit }
    }

    /// Table of a relay pair: the source slots shifted by `offset`, wrapped around the frame.
    /// Every slot of a relay pair is a transmit slot.
    #[must_use]
    pub fn paired_relay(source: &[usize], offset: usize, slots_per_frame: usize) -> Self {
        let mut slots: Vec<usize> = source
            .iter()
            .map(|slot| (slot + offset) % slots_per_frame)
            .collect();
        slots.sort_unstable();
        Self {
            transmit: slots.clone(),
            slots,
        }
    }

    /// Lays out `group_slots` evenly spaced slots across a frame of `frame_slots` slots,
    /// starting at a random position within the first interval.
    pub fn generate<R: Rng + ?Sized>(
        rng: &mut R,
        frame_slots: usize,
        group_slots: usize,
    ) -> Vec<usize> {
        let interval = (frame_slots as f64 / group_slots as f64).max(1.0);
        let mut position = rng.gen_range(0.0..interval);
        (0..group_slots)
            .map(|_| {
                let slot = (position.floor() as usize).min(frame_slots - 1);
                position += interval;
                slot
            })
            .collect()
    }

    /// Builds the table for a generated or copied slot list.
    ///
    /// Without a per-unit count every slot is a transmit slot. A per-unit count of zero makes
    /// the group receive-only. Otherwise the group takes `per_unit` slots at an even stride
    /// through the list, starting at `ordinal`: the number of net group members before it that
    /// also have a per-unit allocation.
    #[must_use]
    pub fn with_transmit_subset(slots: Vec<usize>, per_unit: Option<usize>, ordinal: usize) -> Self {
        let transmit = match per_unit {
            None => slots.clone(),
            Some(0) => Vec::new(),
            Some(_) if slots.is_empty() => Vec::new(),
            Some(count) => {
                let stride = (slots.len() + count - 1) / count;
                let mut index = ordinal;
                let mut transmit = Vec::with_capacity(count);
                // A stride that does not divide the list wraps onto slots already taken; the
                // repeats are kept.
                for _ in 0..count {
                    if index >= slots.len() {
                        index %= slots.len();
                    }
                    transmit.push(slots[index]);
                    index += stride;
                }
                transmit.sort_unstable();
                transmit
            }
        };
        Self { slots, transmit }
    }

    /// All slots of the group.
    #[must_use]
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }

    /// Slots in which the group may transmit.
    #[must_use]
    pub fn transmit_slots(&self) -> &[usize] {
        &self.transmit
    }

    /// Whether the table has not been built yet (or was built empty).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaChaRng;
    use rstest::rstest;

    fn is_sorted(slots: &[usize]) -> bool {
        slots.windows(2).all(|w| w[0] <= w[1])
    }

    #[rstest]
    #[case("A-0-15", 0, 3)]
    #[case("b-2-15", 7, 3)]
    #[case("C-10-12", 32, 24)]
    #[case("A-511-1", 1533, 49152)]
    fn test_parse_block(#[case] text: &str, #[case] offset: usize, #[case] interval: usize) {
        let block = TimeSlotBlock::parse(text, BlockRole::Transmit, &FrameTiming::default());
        assert_eq!(
            block,
            Ok(TimeSlotBlock {
                offset,
                interval,
                role: BlockRole::Transmit
            })
        );
    }

    #[rstest]
    #[case("D-0-15")]
    #[case("A-512-15")]
    #[case("A-0-0")]
    #[case("A-0-16")]
    #[case("A-0")]
    #[case("A-0-1-2")]
    #[case("AB-0-1")]
    #[case("A_0_1")]
    #[case("1-0-1")]
    fn test_parse_bad_block(#[case] text: &str) {
        assert_eq!(
            TimeSlotBlock::parse(text, BlockRole::Receive, &FrameTiming::default()),
            Err(ConfigError::BadTimeSlotBlock(text.to_string()))
        );
    }

    #[test]
    fn test_from_blocks() {
        let blocks = [
            TimeSlotBlock {
                offset: 1,
                interval: 8,
                role: BlockRole::Transmit,
            },
            TimeSlotBlock {
                offset: 0,
                interval: 6,
                role: BlockRole::Receive,
            },
        ];
        let table = SlotTable::from_blocks(&blocks, 24);
        assert_eq!(table.slots(), &[0, 1, 6, 9, 12, 17, 18]);
        assert_eq!(table.transmit_slots(), &[1, 9, 17]);
    }

    #[test]
    fn test_paired_relay() {
        let table = SlotTable::paired_relay(&[2, 10, 20, 28], 6, 32);
        assert_eq!(table.slots(), &[2, 8, 16, 26]);
        assert_eq!(table.transmit_slots(), table.slots());
    }

    #[rstest]
    #[case(None, 10)]
    #[case(Some(0), 0)]
    #[case(Some(3), 3)]
    #[case(Some(10), 10)]
    fn test_transmit_subset_size(#[case] per_unit: Option<usize>, #[case] expected: usize) {
        let slots: Vec<usize> = (0..10).map(|s| s * 3).collect();
        let table = SlotTable::with_transmit_subset(slots, per_unit, 0);
        assert_eq!(table.transmit_slots().len(), expected);
        assert!(is_sorted(table.transmit_slots()));
    }

    #[test]
    fn test_transmit_subset_ordinal_shifts_selection() {
        let slots: Vec<usize> = (0..8).map(|s| s * 10).collect();
        let first = SlotTable::with_transmit_subset(slots.clone(), Some(2), 0);
        let second = SlotTable::with_transmit_subset(slots.clone(), Some(2), 1);
        let wrapped = SlotTable::with_transmit_subset(slots, Some(2), 7);
        assert_eq!(first.transmit_slots(), &[0, 40]);
        assert_eq!(second.transmit_slots(), &[10, 50]);
        assert_eq!(wrapped.transmit_slots(), &[30, 70]);
    }

    #[test]
    fn test_transmit_subset_wrap_repeats_slots() {
        let table = SlotTable::with_transmit_subset((0..10).collect(), Some(7), 0);
        assert_eq!(table.transmit_slots(), &[0, 0, 2, 2, 4, 6, 8]);

        // A repeated slot adds no time to the window.
        let timing = FrameTiming {
            slots_per_frame: 10,
            seconds_per_slot: 1.0,
            ..FrameTiming::default()
        };
        let window = timing.transmit_window(0.0, 2, table.transmit_slots());
        assert_eq!(window.slot, 0);
        assert!(float_cmp::approx_eq!(f64, window.complete, 1.0 - 0.001));
    }

    proptest! {
        #[test]
        fn test_generate(seed: u64, frame_slots in 1..2048_usize, ratio in 0.0..1.0_f64) {
            let group_slots = ((frame_slots as f64 * ratio) as usize).max(1);
            let mut rng = ChaChaRng::seed_from_u64(seed);
            let slots = SlotTable::generate(&mut rng, frame_slots, group_slots);
            prop_assert_eq!(slots.len(), group_slots);
            prop_assert!(slots.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(slots.iter().all(|&s| s < frame_slots));
        }

        #[test]
        fn test_paired_relay_in_frame(
            source in proptest::collection::btree_set(0..1536_usize, 1..100),
            offset in 1..1536_usize,
        ) {
            let source: Vec<usize> = source.into_iter().collect();
            let table = SlotTable::paired_relay(&source, offset, 1536);
            prop_assert!(is_sorted(table.slots()));
            prop_assert!(table.slots().iter().all(|&s| s < 1536));
            let mut expected: Vec<usize> = source.iter().map(|s| (s + offset) % 1536).collect();
            expected.sort_unstable();
            prop_assert_eq!(table.slots(), &expected[..]);
        }
    }
}
