use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Packing format limit of a slot group. Packed formats fit several logical slots' worth of
/// message data into a single physical slot.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    strum::EnumString,
    strum::Display,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PackingFormat {
    /// Standard packing, one logical slot per physical slot.
    #[strum(to_string = "standard", serialize = "std")]
    Standard,
    /// Packed-2 single pulse.
    #[strum(to_string = "p2sp", serialize = "packed-2-single-pulse")]
    P2sp,
    /// Packed-2 double pulse.
    #[strum(to_string = "p2dp", serialize = "packed-2-double-pulse")]
    P2dp,
    /// Packed-4 single pulse.
    #[strum(to_string = "p4sp", serialize = "packed-4-single-pulse")]
    P4sp,
}

impl Default for PackingFormat {
    fn default() -> Self {
        Self::Standard
    }
}

impl PackingFormat {
    /// How many standard slots are compressed into one physical slot.
    #[must_use]
    pub fn compression(self) -> usize {
        match self {
            Self::Standard => 1,
            Self::P2sp | Self::P2dp => 2,
            Self::P4sp => 4,
        }
    }
}

/// Start and stop of a transmission, and the last slot it occupies.
#[derive(Debug, PartialEq, Copy, Clone, Serialize)]
pub struct TransmitWindow {
    /// Absolute simulation time at which the transmission begins.
    pub begin: f64,
    /// Absolute simulation time at which the transmission completes.
    pub complete: f64,
    /// Index within the frame of the final occupied slot.
    pub slot: usize,
}

/// Timing parameters of the terminal's frame structure.
///
/// Defaults follow the usual Link-16 layout: 1536 slots of 7.8125 ms each (a 12 second frame),
/// arranged as three interleaved sets A, B, C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameTiming {
    /// Number of slots in one frame.
    pub slots_per_frame: usize,
    /// Duration of a single slot in seconds.
    pub seconds_per_slot: f64,
    /// Message bits carried by one slot at standard packing.
    pub bits_per_slot: usize,
    /// Number of interleaved slot sets in a frame.
    pub sets_per_frame: usize,
    /// Fraction of a slot subtracted from each stop time so that back-to-back transmissions
    /// do not collide on the slot boundary.
    pub stop_epsilon: f64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            slots_per_frame: 1536,
            seconds_per_slot: 0.007_812_5,
            bits_per_slot: 225,
            sets_per_frame: 3,
            stop_epsilon: 0.001,
        }
    }
}

impl FrameTiming {
    /// Checks that the parameters describe a usable frame.
    ///
    /// # Errors
    ///
    /// Fails if any count is zero, the slot duration is not positive, or the stop epsilon is
    /// outside `[0, 1)`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bad = |field: &str, requirement: &str, value: String| {
            Err(ConfigError::BadFrameTiming {
                field: field.to_string(),
                requirement: requirement.to_string(),
                value,
            })
        };
        if self.slots_per_frame == 0 {
            return bad("slots_per_frame", "at least 1", self.slots_per_frame.to_string());
        }
        if self.bits_per_slot == 0 {
            return bad("bits_per_slot", "at least 1", self.bits_per_slot.to_string());
        }
        if self.sets_per_frame == 0 {
            return bad("sets_per_frame", "at least 1", self.sets_per_frame.to_string());
        }
        if !(self.seconds_per_slot > 0.0 && self.seconds_per_slot.is_finite()) {
            return bad("seconds_per_slot", "positive", self.seconds_per_slot.to_string());
        }
        if !(0.0..1.0).contains(&self.stop_epsilon) {
            return bad("stop_epsilon", "in [0, 1)", self.stop_epsilon.to_string());
        }
        Ok(())
    }

    /// Length of one frame in seconds.
    #[must_use]
    pub fn seconds_per_frame(&self) -> f64 {
        self.slots_per_frame as f64 * self.seconds_per_slot
    }

    /// Number of slots in each set.
    #[must_use]
    pub fn slots_per_set(&self) -> usize {
        self.slots_per_frame / self.sets_per_frame
    }

    /// Number of slots needed to carry `size_bits` with the given packing limit.
    #[must_use]
    pub fn slots_needed(&self, size_bits: usize, packing: PackingFormat) -> usize {
        let standard = (size_bits + self.bits_per_slot - 1) / self.bits_per_slot;
        let compression = packing.compression();
        (standard + compression - 1) / compression
    }

    /// Computes when a transmission needing `slots_needed` slots can start and stop if it is
    /// requested at `time`, given the sorted table of slots the group may transmit in.
    ///
    /// A request made part way into a slot is assumed to start no earlier than the next slot.
    ///
    /// # Panics
    ///
    /// Panics if `transmit_slots` is empty.
    #[must_use]
    pub fn transmit_window(
        &self,
        time: f64,
        slots_needed: usize,
        transmit_slots: &[usize],
    ) -> TransmitWindow {
        assert!(
            !transmit_slots.is_empty(),
            "transmit window requested with an empty slot table"
        );
        let seconds_per_frame = self.seconds_per_frame();
        let offset = time % seconds_per_frame;
        let mut frame_start = time - offset;
        let mut current_slot = (offset / self.seconds_per_slot).ceil() as usize;
        if current_slot >= self.slots_per_frame {
            current_slot = 0;
            frame_start += seconds_per_frame;
        }

        let (mut index, begin) = match transmit_slots.iter().position(|&s| s >= current_slot) {
            Some(index) => (
                index,
                frame_start + transmit_slots[index] as f64 * self.seconds_per_slot,
            ),
            None => (
                0,
                frame_start + seconds_per_frame + transmit_slots[0] as f64 * self.seconds_per_slot,
            ),
        };

        let mut slot = transmit_slots[index];
        let mut elapsed = 1;
        for _ in 1..slots_needed {
            let previous = slot;
            index += 1;
            if index < transmit_slots.len() {
                slot = transmit_slots[index];
                elapsed += slot - previous;
            } else {
                index = 0;
                slot = transmit_slots[0];
                elapsed += self.slots_per_frame - previous + slot;
            }
        }

        let complete = begin + elapsed as f64 * self.seconds_per_slot
            - self.stop_epsilon * self.seconds_per_slot;
        TransmitWindow {
            begin,
            complete,
            slot,
        }
    }

    /// Start of the next single-slot transmission opportunity after `time`.
    ///
    /// # Panics
    ///
    /// Panics if `transmit_slots` is empty.
    #[must_use]
    pub fn next_transmit_time(&self, time: f64, transmit_slots: &[usize]) -> f64 {
        self.transmit_window(time + self.seconds_per_slot / 2.0, 1, transmit_slots)
            .begin
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use float_cmp::approx_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn frame(slots_per_frame: usize) -> FrameTiming {
        FrameTiming {
            slots_per_frame,
            seconds_per_slot: 1.0,
            bits_per_slot: 100,
            ..FrameTiming::default()
        }
    }

    #[rstest]
    #[case(PackingFormat::Standard, 3)]
    #[case(PackingFormat::P2sp, 2)]
    #[case(PackingFormat::P2dp, 2)]
    #[case(PackingFormat::P4sp, 1)]
    fn test_slots_needed(#[case] packing: PackingFormat, #[case] expected: usize) {
        assert_eq!(frame(16).slots_needed(250, packing), expected);
    }

    #[rstest]
    #[case("standard", PackingFormat::Standard)]
    #[case("std", PackingFormat::Standard)]
    #[case("p2sp", PackingFormat::P2sp)]
    #[case("packed-2-double-pulse", PackingFormat::P2dp)]
    #[case("packed-4-single-pulse", PackingFormat::P4sp)]
    fn test_parse_packing(#[case] input: &str, #[case] expected: PackingFormat) {
        assert_eq!(input.parse::<PackingFormat>(), Ok(expected));
    }

    #[test]
    fn test_default_frame_is_valid() {
        assert_eq!(FrameTiming::default().validate(), Ok(()));
        assert_eq!(frame(16).validate(), Ok(()));
    }

    #[rstest]
    #[case(FrameTiming { slots_per_frame: 0, ..FrameTiming::default() }, "slots_per_frame")]
    #[case(FrameTiming { bits_per_slot: 0, ..FrameTiming::default() }, "bits_per_slot")]
    #[case(FrameTiming { sets_per_frame: 0, ..FrameTiming::default() }, "sets_per_frame")]
    #[case(FrameTiming { seconds_per_slot: 0.0, ..FrameTiming::default() }, "seconds_per_slot")]
    #[case(FrameTiming { seconds_per_slot: -1.0, ..FrameTiming::default() }, "seconds_per_slot")]
    #[case(FrameTiming { seconds_per_slot: f64::NAN, ..FrameTiming::default() }, "seconds_per_slot")]
    #[case(FrameTiming { stop_epsilon: -0.1, ..FrameTiming::default() }, "stop_epsilon")]
    #[case(FrameTiming { stop_epsilon: 1.0, ..FrameTiming::default() }, "stop_epsilon")]
    fn test_invalid_frame(#[case] timing: FrameTiming, #[case] expected: &str) {
        match timing.validate() {
            Err(ConfigError::BadFrameTiming { field, .. }) => assert_eq!(field, expected),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_window_within_frame() {
        let window = frame(16).transmit_window(2.5, 2, &[1, 4, 5, 9]);
        assert!(approx_eq!(f64, window.begin, 4.0));
        assert!(approx_eq!(f64, window.complete, 6.0 - 0.001));
        assert_eq!(window.slot, 5);
    }

    #[test]
    fn test_window_on_slot_boundary_uses_that_slot() {
        let window = frame(16).transmit_window(4.0, 1, &[1, 4, 5, 9]);
        assert!(approx_eq!(f64, window.begin, 4.0));
        assert_eq!(window.slot, 4);
    }

    #[test]
    fn test_window_wraps_into_next_frame() {
        let window = frame(16).transmit_window(10.2, 3, &[1, 4, 5, 9]);
        assert!(approx_eq!(f64, window.begin, 17.0));
        // Slots 1, 4, 5 of the second frame.
        assert!(approx_eq!(f64, window.complete, 22.0 - 0.001));
        assert_eq!(window.slot, 5);
    }

    #[test]
    fn test_window_spans_frame_boundary() {
        let window = frame(16).transmit_window(8.5, 2, &[1, 9]);
        assert!(approx_eq!(f64, window.begin, 9.0));
        assert!(approx_eq!(f64, window.complete, 18.0 - 0.001));
        assert_eq!(window.slot, 1);
    }

    #[test]
    fn test_window_at_end_of_frame_rolls_over() {
        let window = frame(16).transmit_window(15.5, 1, &[0, 8]);
        assert!(approx_eq!(f64, window.begin, 16.0));
        assert_eq!(window.slot, 0);
    }

    #[test]
    fn test_back_to_back_windows_do_not_skip_slots() {
        let timing = frame(16);
        let table: Vec<usize> = (0..16).collect();
        let first = timing.transmit_window(0.0, 2, &table);
        let second = timing.transmit_window(first.complete, 2, &table);
        assert!(approx_eq!(f64, second.begin, 2.0));
    }

    #[test]
    fn test_next_transmit_time() {
        let timing = frame(16);
        assert!(approx_eq!(f64, timing.next_transmit_time(4.0, &[4, 8]), 8.0));
        assert!(approx_eq!(f64, timing.next_transmit_time(3.2, &[4, 8]), 4.0));
    }

    #[test]
    #[should_panic]
    fn test_empty_table_panics() {
        let _ = frame(16).transmit_window(0.0, 1, &[]);
    }

    fn sorted_table() -> impl Strategy<Value = Vec<usize>> {
        proptest::collection::btree_set(0..1536_usize, 1..64)
            .prop_map(|set| set.into_iter().collect())
    }

    proptest! {
        #[test]
        fn test_window_properties(
            time in 0.0..1000.0_f64,
            slots_needed in 1..8_usize,
            table in sorted_table(),
        ) {
            let timing = FrameTiming::default();
            let window = timing.transmit_window(time, slots_needed, &table);
            prop_assert!(window.begin <= window.complete);
            prop_assert!(window.begin >= time - 1e-9);
            prop_assert!(table.contains(&window.slot));
            prop_assert_eq!(window, timing.transmit_window(time, slots_needed, &table));
        }

        #[test]
        fn test_contiguous_window_length(
            time in 0.0..1000.0_f64,
            slots_needed in 1..32_usize,
        ) {
            let timing = FrameTiming::default();
            let table: Vec<usize> = (0..timing.slots_per_frame).collect();
            let window = timing.transmit_window(time, slots_needed, &table);
            let expected = slots_needed as f64 * timing.seconds_per_slot;
            let epsilon = timing.stop_epsilon * timing.seconds_per_slot;
            prop_assert!(((window.complete - window.begin) - expected).abs() <= epsilon * 1.01);
        }
    }
}
