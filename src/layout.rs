//! # Display Geometry
//!
//! Maps `(digit slot, segment)` pairs to contiguous emitter ranges on the
//! strip. Emitters are wired digit by digit, and within a digit segment by
//! segment in font bit order, so the index of sub-pixel `p` of segment `s`
//! in slot `d` is:
//!
//! ```text
//! d * emitters_per_digit + s * emitters_per_segment + p
//! ```
//!
//! Slot 0 is the ones place of numeric views; the most significant glyph
//! sits in slot `digit_count - 1`.

use crate::font::SEGMENTS_PER_GLYPH;
use std::ops::Range;
use thiserror::Error;

/// Geometry problems detected when building a layout.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout needs at least one digit slot")]
    NoDigits,

    #[error("layout needs at least one emitter per segment")]
    NoEmittersPerSegment,

    #[error("{digits} digits at {emitters_per_segment} emitters per segment overflow")]
    TooLarge {
        digits: usize,
        emitters_per_segment: usize,
    },

    #[error("{digits} digits need {required} emitters but the strip has {available}")]
    TooFewEmitters {
        digits: usize,
        required: usize,
        available: usize,
    },
}

/// Emitters needed to back `digit_count` digits.
fn required_emitters(
    digit_count: usize,
    emitters_per_segment: usize,
) -> Result<usize, LayoutError> {
    digit_count
        .checked_mul(SEGMENTS_PER_GLYPH)
        .and_then(|n| n.checked_mul(emitters_per_segment))
        .ok_or(LayoutError::TooLarge {
            digits: digit_count,
            emitters_per_segment,
        })
}

/// Immutable display geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayLayout {
    digit_count: usize,
    emitters_per_segment: usize,
    total_emitters: usize,
}

impl DisplayLayout {
    /// Build a layout, checking the strip is long enough for every digit.
    ///
    /// Extra emitters past the last digit are allowed; they are kept off.
    pub fn new(
        digit_count: usize,
        emitters_per_segment: usize,
        total_emitters: usize,
    ) -> Result<Self, LayoutError> {
        if digit_count == 0 {
            return Err(LayoutError::NoDigits);
        }
        if emitters_per_segment == 0 {
            return Err(LayoutError::NoEmittersPerSegment);
        }

        let required = required_emitters(digit_count, emitters_per_segment)?;
        if total_emitters < required {
            return Err(LayoutError::TooFewEmitters {
                digits: digit_count,
                required,
                available: total_emitters,
            });
        }

        Ok(Self {
            digit_count,
            emitters_per_segment,
            total_emitters,
        })
    }

    /// Layout with exactly enough emitters for `digit_count` digits.
    pub fn compact(digit_count: usize, emitters_per_segment: usize) -> Result<Self, LayoutError> {
        let total = required_emitters(digit_count, emitters_per_segment)?;
        Self::new(digit_count, emitters_per_segment, total)
    }

    pub fn digit_count(&self) -> usize {
        self.digit_count
    }

    pub fn emitters_per_segment(&self) -> usize {
        self.emitters_per_segment
    }

    pub fn emitters_per_digit(&self) -> usize {
        SEGMENTS_PER_GLYPH * self.emitters_per_segment
    }

    pub fn total_emitters(&self) -> usize {
        self.total_emitters
    }

    /// Emitters lit by `segment` of `digit_slot`.
    ///
    /// Out-of-range arguments are a caller bug: debug builds panic, release
    /// builds get an empty range so nothing is drawn.
    pub fn emitter_range(&self, digit_slot: usize, segment: usize) -> Range<usize> {
        debug_assert!(
            digit_slot < self.digit_count,
            "digit slot {digit_slot} out of range (0..{})",
            self.digit_count
        );
        debug_assert!(
            segment < SEGMENTS_PER_GLYPH,
            "segment {segment} out of range (0..{SEGMENTS_PER_GLYPH})"
        );
        if digit_slot >= self.digit_count || segment >= SEGMENTS_PER_GLYPH {
            return 0..0;
        }

        let start = digit_slot * self.emitters_per_digit() + segment * self.emitters_per_segment;
        start..start + self.emitters_per_segment
    }

    /// All emitters belonging to `digit_slot`.
    pub fn digit_range(&self, digit_slot: usize) -> Range<usize> {
        debug_assert!(
            digit_slot < self.digit_count,
            "digit slot {digit_slot} out of range (0..{})",
            self.digit_count
        );
        if digit_slot >= self.digit_count {
            return 0..0;
        }

        let start = digit_slot * self.emitters_per_digit();
        start..start + self.emitters_per_digit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layouts() -> Vec<DisplayLayout> {
        vec![
            DisplayLayout::compact(1, 1).unwrap(),
            DisplayLayout::compact(2, 1).unwrap(),
            DisplayLayout::compact(5, 2).unwrap(),
            DisplayLayout::new(4, 3, 100).unwrap(),
            DisplayLayout::compact(8, 4).unwrap(),
        ]
    }

    #[test]
    fn index_formula() {
        let layout = DisplayLayout::compact(5, 2).unwrap();
        assert_eq!(layout.emitters_per_digit(), 14);
        assert_eq!(layout.emitter_range(0, 0), 0..2);
        assert_eq!(layout.emitter_range(0, 6), 12..14);
        assert_eq!(layout.emitter_range(1, 0), 14..16);
        assert_eq!(layout.emitter_range(4, 3), 4 * 14 + 6..4 * 14 + 8);
    }

    #[test]
    fn segment_ranges_are_disjoint_across_all_slots() {
        for layout in layouts() {
            let mut owner = vec![None; layout.total_emitters()];
            for slot in 0..layout.digit_count() {
                for segment in 0..SEGMENTS_PER_GLYPH {
                    let range = layout.emitter_range(slot, segment);
                    assert_eq!(range.len(), layout.emitters_per_segment());
                    for i in range {
                        assert!(
                            owner[i].is_none(),
                            "emitter {i} claimed by {:?} and {:?}",
                            owner[i],
                            (slot, segment)
                        );
                        owner[i] = Some((slot, segment));
                    }
                }
            }
            let claimed = owner.iter().filter(|o| o.is_some()).count();
            assert_eq!(claimed, layout.digit_count() * layout.emitters_per_digit());
        }
    }

    #[test]
    fn digit_range_covers_its_segments() {
        for layout in layouts() {
            for slot in 0..layout.digit_count() {
                let digit = layout.digit_range(slot);
                for segment in 0..SEGMENTS_PER_GLYPH {
                    let range = layout.emitter_range(slot, segment);
                    assert!(digit.start <= range.start && range.end <= digit.end);
                }
                assert!(digit.end <= layout.total_emitters());
            }
        }
    }

    #[test]
    fn rejects_short_strip() {
        assert_eq!(
            DisplayLayout::new(5, 2, 69),
            Err(LayoutError::TooFewEmitters {
                digits: 5,
                required: 70,
                available: 69
            })
        );
        assert_eq!(DisplayLayout::new(0, 2, 70), Err(LayoutError::NoDigits));
        assert_eq!(
            DisplayLayout::new(5, 0, 70),
            Err(LayoutError::NoEmittersPerSegment)
        );
    }

    #[test]
    fn rejects_geometry_that_overflows() {
        let huge = usize::MAX / 4;
        assert_eq!(
            DisplayLayout::new(huge, 2, 70),
            Err(LayoutError::TooLarge {
                digits: huge,
                emitters_per_segment: 2
            })
        );
        assert_eq!(
            DisplayLayout::compact(3, huge),
            Err(LayoutError::TooLarge {
                digits: 3,
                emitters_per_segment: huge
            })
        );
        // Would wrap to a small requirement without the overflow check
        let wraps = usize::MAX / SEGMENTS_PER_GLYPH + 1;
        assert!(DisplayLayout::new(wraps, 1, usize::MAX).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "digit slot")]
    fn out_of_range_slot_panics_in_debug() {
        let layout = DisplayLayout::compact(2, 1).unwrap();
        let _ = layout.emitter_range(2, 0);
    }
}
