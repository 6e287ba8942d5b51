//! # View Cycling and Segment Rendering
//!
//! Turns the shared counters into lit segments. The display cycles through a
//! fixed list of [`View`]s, each shown for one time window; which view is up
//! depends only on elapsed time, never on how often the renderer ticks.
//!
//! Every tick repaints the whole frame: clear to the off color, draw each
//! digit slot, then commit once.

use crate::config::{rgb, ViewConfig, DEFAULT_COLOR};
use crate::font::{Glyph, SEGMENTS_PER_GLYPH};
use crate::frame::{EmitterBus, FrameBuffer};
use crate::layout::DisplayLayout;
use crate::scheduler::{Millis, Work};
use crate::SharedCounters;
use smart_leds::RGB8;

/// What a view shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewContent {
    Counter(String),
    Sum(Vec<String>),
    Text(String),
}

/// One entry of the view cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    pub content: ViewContent,
    pub color: RGB8,
}

impl View {
    pub fn counter(name: impl Into<String>, color: RGB8) -> Self {
        Self {
            content: ViewContent::Counter(name.into()),
            color,
        }
    }

    pub fn sum<S: Into<String>>(names: impl IntoIterator<Item = S>, color: RGB8) -> Self {
        Self {
            content: ViewContent::Sum(names.into_iter().map(Into::into).collect()),
            color,
        }
    }

    pub fn text(text: impl Into<String>, color: RGB8) -> Self {
        Self {
            content: ViewContent::Text(text.into()),
            color,
        }
    }
}

impl From<&ViewConfig> for View {
    fn from(config: &ViewConfig) -> Self {
        let color = |c: &Option<[u8; 3]>| rgb(c.unwrap_or(DEFAULT_COLOR));
        match config {
            ViewConfig::Counter { counter, color: c } => View::counter(counter.clone(), color(c)),
            ViewConfig::Sum { counters, color: c } => View::sum(counters.clone(), color(c)),
            ViewConfig::Text { text, color: c } => View::text(text.clone(), color(c)),
        }
    }
}

/// Index of the view shown at `elapsed` into a cycle of `count` views, each
/// lasting `window`.
pub fn select_view(elapsed: Millis, window: Millis, count: usize) -> usize {
    debug_assert!(window > 0 && count > 0);
    if window == 0 || count == 0 {
        return 0;
    }
    ((elapsed / window) % count as Millis) as usize
}

/// Largest value that fits in `digits` decimal places.
pub fn max_displayable(digits: usize) -> u64 {
    u32::try_from(digits)
        .ok()
        .and_then(|d| 10u64.checked_pow(d))
        .map_or(u64::MAX, |p| p - 1)
}

/// Zero-padded, right-aligned decimal digits, indexed by slot (slot 0 is the
/// ones place). Values that do not fit show as all nines.
pub fn format_number(value: u64, digits: usize) -> Vec<Glyph> {
    let mut rest = value.min(max_displayable(digits));
    (0..digits)
        .map(|_| {
            let glyph = Glyph::digit((rest % 10) as u8);
            rest /= 10;
            glyph
        })
        .collect()
}

/// A message laid out left to right, indexed by slot. The first character
/// lands in the most significant slot; short text is padded with blanks and
/// long text is cut off.
pub fn format_text(text: &str, digits: usize) -> Vec<Glyph> {
    let mut glyphs: Vec<Glyph> = text
        .chars()
        .map(Glyph::from_char)
        .chain(std::iter::repeat(Glyph::BLANK))
        .take(digits)
        .collect();
    glyphs.reverse();
    glyphs
}

/// Light one glyph into its digit slot. Unlit segments are set to `off`.
pub fn draw_glyph<B: EmitterBus>(
    frame: &mut FrameBuffer<B>,
    layout: &DisplayLayout,
    slot: usize,
    glyph: Glyph,
    color: RGB8,
    off: RGB8,
) {
    for segment in 0..SEGMENTS_PER_GLYPH {
        let c = if glyph.lights(segment) { color } else { off };
        frame.fill_range(layout.emitter_range(slot, segment), c);
    }
}

/// Periodic task that paints the current view.
pub struct ViewCycler<B> {
    layout: DisplayLayout,
    frame: FrameBuffer<B>,
    views: Vec<View>,
    window: Millis,
    off: RGB8,
    counters: SharedCounters,
    current: Option<usize>,
}

impl<B: EmitterBus> ViewCycler<B> {
    pub fn new(
        layout: DisplayLayout,
        bus: B,
        views: Vec<View>,
        window: std::time::Duration,
        off: RGB8,
        counters: SharedCounters,
    ) -> Self {
        Self {
            layout,
            frame: FrameBuffer::new(layout.total_emitters(), bus),
            views,
            window: window.as_millis() as Millis,
            off,
            counters,
            current: None,
        }
    }

    /// Index of the view painted by the last render.
    pub fn current_view(&self) -> Option<usize> {
        self.current
    }

    /// Blank the whole strip and commit it.
    pub fn blank(&mut self) {
        self.frame.clear_all(self.off);
        if let Err(e) = self.frame.commit() {
            log::warn!("Could not blank display: {}", e);
        }
    }

    /// Glyphs for `view`, indexed by slot.
    pub fn glyphs_for(&self, view: &View) -> Vec<Glyph> {
        let digits = self.layout.digit_count();
        let counters = self.counters.borrow();
        let value = match &view.content {
            ViewContent::Text(text) => return format_text(text, digits),
            ViewContent::Counter(name) => counters.get(name).unwrap_or(0),
            ViewContent::Sum(names) => counters.sum(names.iter().map(String::as_str)),
        };
        format_number(value, digits)
    }

    /// Paint the view due at `elapsed` and commit it.
    pub fn render_at(&mut self, elapsed: Millis) {
        if self.views.is_empty() {
            return;
        }

        let index = select_view(elapsed, self.window, self.views.len());
        let view = &self.views[index];
        let glyphs = self.glyphs_for(view);

        if self.current != Some(index) {
            let shown: String = glyphs.iter().rev().map(|g| g.to_char()).collect();
            log::info!("Showing view {} [{}]", index, shown);
            if let ViewContent::Counter(_) | ViewContent::Sum(_) = view.content {
                if glyphs.iter().all(|&g| g == Glyph::digit(9)) {
                    log::warn!("View {} may be saturated at {}", index, shown);
                }
            }
            self.current = Some(index);
        }

        let color = view.color;
        self.frame.clear_all(self.off);
        for (slot, glyph) in glyphs.into_iter().enumerate() {
            draw_glyph(&mut self.frame, &self.layout, slot, glyph, color, self.off);
        }

        match self.frame.commit() {
            Ok(()) => log::trace!("Committed frame for view {}", index),
            Err(e) => log::warn!("Frame commit failed: {}", e),
        }
    }
}

impl<B: EmitterBus> Work for ViewCycler<B> {
    fn run(&mut self, now: Millis) {
        self.render_at(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MemoryBus;
    use crate::{shared_counters, CounterState};
    use std::time::Duration;

    const ON: RGB8 = RGB8 { r: 255, g: 0, b: 255 };
    const OFF: RGB8 = RGB8 { r: 0, g: 0, b: 0 };

    fn chars(glyphs: &[Glyph]) -> String {
        glyphs.iter().rev().map(|g| g.to_char()).collect()
    }

    #[test]
    fn view_selection_by_window() {
        for t in 0..5 {
            assert_eq!(select_view(t, 5, 3), 0);
        }
        for t in 5..10 {
            assert_eq!(select_view(t, 5, 3), 1);
        }
        for t in 10..15 {
            assert_eq!(select_view(t, 5, 3), 2);
        }
        assert_eq!(select_view(15, 5, 3), 0);
        assert_eq!(select_view(5_000, 5_000, 3), 1);
    }

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(chars(&format_number(0, 5)), "00000");
        assert_eq!(chars(&format_number(42, 5)), "00042");
        assert_eq!(format_number(42, 5)[0], Glyph::digit(2));
        assert_eq!(format_number(42, 5)[1], Glyph::digit(4));
        assert_eq!(chars(&format_number(99_999, 5)), "99999");
    }

    #[test]
    fn oversized_numbers_saturate() {
        assert_eq!(chars(&format_number(123_456, 5)), "99999");
        assert_eq!(max_displayable(1), 9);
        assert_eq!(max_displayable(25), u64::MAX);
        assert_eq!(format_number(u64::MAX, 20).len(), 20);
    }

    #[test]
    fn text_is_left_aligned() {
        assert_eq!(chars(&format_text("Go", 5)), "Go   ");
        assert_eq!(chars(&format_text("HELLO WORLD", 5)), "HELLO");
        assert_eq!(chars(&format_text("a.b", 3)), "a b");
    }

    fn cycler(bus: MemoryBus) -> ViewCycler<MemoryBus> {
        let counters = shared_counters(CounterState::new(["a", "b"]));
        counters
            .borrow_mut()
            .reassign(|n| if n == "a" { 42 } else { 8 }, chrono::Utc::now());
        ViewCycler::new(
            DisplayLayout::compact(5, 2).unwrap(),
            bus,
            vec![
                View::counter("a", ON),
                View::sum(["a", "b"], ON),
                View::text("-", ON),
            ],
            Duration::from_millis(5_000),
            OFF,
            counters,
        )
    }

    fn lit_slots(frame: &[RGB8], layout: &DisplayLayout) -> Vec<u8> {
        (0..layout.digit_count())
            .map(|slot| {
                (0..SEGMENTS_PER_GLYPH).fold(0u8, |mask, s| {
                    let lit = layout.emitter_range(slot, s).all(|i| frame[i] == ON);
                    mask | (u8::from(lit) << s)
                })
            })
            .collect()
    }

    #[test]
    fn renders_counter_view_into_slots() {
        let bus = MemoryBus::new();
        let mut cycler = cycler(bus.clone());
        cycler.render_at(0);

        assert_eq!(bus.commit_count(), 1);
        let frame = bus.last_frame().unwrap();
        let layout = DisplayLayout::compact(5, 2).unwrap();
        let masks = lit_slots(&frame, &layout);
        let expected: Vec<u8> = format_number(42, 5).iter().map(|g| g.mask()).collect();
        assert_eq!(masks, expected);
    }

    #[test]
    fn each_tick_commits_exactly_once() {
        let bus = MemoryBus::new();
        let mut cycler = cycler(bus.clone());
        for t in (0..15_000).step_by(100) {
            cycler.render_at(t);
        }
        assert_eq!(bus.commit_count(), 150);
    }

    #[test]
    fn rendering_is_idempotent_within_a_window() {
        let bus = MemoryBus::new();
        let mut cycler = cycler(bus.clone());
        cycler.render_at(5_000);
        cycler.render_at(9_999);
        let frames = bus.frames();
        assert_eq!(frames[0], frames[1]);
        assert_eq!(cycler.current_view(), Some(1));
    }

    #[test]
    fn switching_views_clears_previous_segments() {
        let bus = MemoryBus::new();
        let mut cycler = cycler(bus.clone());
        cycler.render_at(0);
        cycler.render_at(10_000);

        let frame = bus.last_frame().unwrap();
        let layout = DisplayLayout::compact(5, 2).unwrap();
        let masks = lit_slots(&frame, &layout);
        // "-    ": dash in the most significant slot only
        assert_eq!(masks, vec![0, 0, 0, 0, Glyph::DASH.mask()]);
        let lit = frame.iter().filter(|&&c| c == ON).count();
        assert_eq!(lit, 2);
    }

    #[test]
    fn sum_view_adds_counters() {
        let cycler = cycler(MemoryBus::new());
        let glyphs = cycler.glyphs_for(&View::sum(["a", "b"], ON));
        assert_eq!(chars(&glyphs), "00050");
    }

    #[test]
    fn view_from_config_uses_default_color() {
        let view = View::from(&ViewConfig::Counter {
            counter: "a".to_string(),
            color: None,
        });
        assert_eq!(view, View::counter("a", rgb(DEFAULT_COLOR)));
    }
}
