//! # Frame Buffer and Emitter Bus
//!
//! The frame buffer holds one color per emitter and is only pushed to the
//! physical chain by [`FrameBuffer::commit`], which hands the whole array to
//! an [`EmitterBus`] in one call. Renderers mutate the buffer freely between
//! commits; the bus never sees a half-drawn frame.

use crate::layout::DisplayLayout;
use smart_leds::RGB8;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

/// Failure pushing a frame to the emitter chain.
#[derive(Error, Debug)]
pub enum BusError {
    #[error("bus write failed: {0}")]
    Write(String),

    #[error("bus IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque sink for complete frames.
pub trait EmitterBus {
    /// Push every emitter color, in strip order, to the physical chain.
    fn flush(&mut self, colors: &[RGB8]) -> Result<(), BusError>;
}

impl<B: EmitterBus + ?Sized> EmitterBus for Box<B> {
    fn flush(&mut self, colors: &[RGB8]) -> Result<(), BusError> {
        (**self).flush(colors)
    }
}

/// Emitter colors for one strip plus the bus they are committed to.
pub struct FrameBuffer<B> {
    pixels: Vec<RGB8>,
    bus: B,
}

impl<B: EmitterBus> FrameBuffer<B> {
    /// A buffer of `len` emitters, all off.
    pub fn new(len: usize, bus: B) -> Self {
        Self {
            pixels: vec![RGB8::default(); len],
            bus,
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[RGB8] {
        &self.pixels
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Set one emitter. Out-of-range indices trap in debug builds and are
    /// ignored in release builds.
    pub fn set_emitter(&mut self, index: usize, color: RGB8) {
        debug_assert!(
            index < self.pixels.len(),
            "emitter {index} out of range (0..{})",
            self.pixels.len()
        );
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    /// Set a contiguous run of emitters.
    pub fn fill_range(&mut self, range: std::ops::Range<usize>, color: RGB8) {
        for index in range {
            self.set_emitter(index, color);
        }
    }

    pub fn clear_all(&mut self, color: RGB8) {
        self.pixels.fill(color);
    }

    /// Push the whole buffer to the bus.
    pub fn commit(&mut self) -> Result<(), BusError> {
        self.bus.flush(&self.pixels)
    }
}

/// Bus that keeps every committed frame in memory.
///
/// Clones share the same history, so a test can keep one handle while the
/// renderer owns another.
#[derive(Clone, Default)]
pub struct MemoryBus {
    frames: Rc<RefCell<Vec<Vec<RGB8>>>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit_count(&self) -> usize {
        self.frames.borrow().len()
    }

    pub fn last_frame(&self) -> Option<Vec<RGB8>> {
        self.frames.borrow().last().cloned()
    }

    pub fn frames(&self) -> Vec<Vec<RGB8>> {
        self.frames.borrow().clone()
    }
}

impl EmitterBus for MemoryBus {
    fn flush(&mut self, colors: &[RGB8]) -> Result<(), BusError> {
        self.frames.borrow_mut().push(colors.to_vec());
        Ok(())
    }
}

/// Development bus that prints frames as seven-segment ASCII art.
///
/// Only frames that differ from the previous one are printed.
pub struct ConsoleBus<W> {
    layout: DisplayLayout,
    off: RGB8,
    out: W,
    last: Option<Vec<RGB8>>,
}

impl ConsoleBus<std::io::Stdout> {
    pub fn stdout(layout: DisplayLayout, off: RGB8) -> Self {
        Self::new(layout, off, std::io::stdout())
    }
}

impl<W: Write> ConsoleBus<W> {
    pub fn new(layout: DisplayLayout, off: RGB8, out: W) -> Self {
        Self {
            layout,
            off,
            out,
            last: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EmitterBus for ConsoleBus<W> {
    fn flush(&mut self, colors: &[RGB8]) -> Result<(), BusError> {
        if self.last.as_deref() == Some(colors) {
            return Ok(());
        }

        let art = ascii_frame(&self.layout, colors, self.off);
        self.out.write_all(art.as_bytes())?;
        self.out.flush()?;
        self.last = Some(colors.to_vec());
        Ok(())
    }
}

/// Render a frame as three rows of seven-segment art, most significant
/// slot on the left.
///
/// A segment counts as lit when any of its emitters differs from `off`.
pub fn ascii_frame(layout: &DisplayLayout, colors: &[RGB8], off: RGB8) -> String {
    let lit = |slot: usize, segment: usize| {
        layout
            .emitter_range(slot, segment)
            .any(|i| colors.get(i).is_some_and(|&c| c != off))
    };
    let pick = |on: bool, c: char| if on { c } else { ' ' };

    let mut rows = [String::new(), String::new(), String::new()];
    for slot in (0..layout.digit_count()).rev() {
        rows[0].push(' ');
        rows[0].push(pick(lit(slot, 1), '_'));
        rows[0].push(' ');

        rows[1].push(pick(lit(slot, 2), '|'));
        rows[1].push(pick(lit(slot, 3), '_'));
        rows[1].push(pick(lit(slot, 0), '|'));

        rows[2].push(pick(lit(slot, 6), '|'));
        rows[2].push(pick(lit(slot, 5), '_'));
        rows[2].push(pick(lit(slot, 4), '|'));

        for row in rows.iter_mut() {
            row.push(' ');
        }
    }

    let mut art = rows.join("\n");
    art.push('\n');
    art
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
pub use hardware::{Ws2812SpiBus, SPI_FREQUENCY_HZ};

#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hardware {
    use super::{BusError, EmitterBus};
    use embedded_hal::spi::SpiBus;
    use smart_leds::RGB8;

    /// SPI clock the encoding below is timed for.
    pub const SPI_FREQUENCY_HZ: u32 = 3_200_000;

    /// Zero bytes sent after a frame to hold the line low for the latch.
    const RESET_BYTES: usize = 40;

    /// WS2812-style chain driven from a plain SPI MOSI line.
    ///
    /// Every data bit becomes one SPI nibble: `1110` for a one, `1000` for a
    /// zero. Colors go out in GRB order.
    pub struct Ws2812SpiBus<SPI> {
        spi: SPI,
        buffer: Vec<u8>,
    }

    impl<SPI: SpiBus> Ws2812SpiBus<SPI> {
        pub fn new(spi: SPI) -> Self {
            Self {
                spi,
                buffer: Vec::new(),
            }
        }

        fn encode(&mut self, colors: &[RGB8]) {
            self.buffer.clear();
            for color in colors {
                for byte in [color.g, color.r, color.b] {
                    for pair in (0..4).rev() {
                        let bits = byte >> (pair * 2);
                        let hi = if bits & 0b10 != 0 { 0xE0 } else { 0x80 };
                        let lo = if bits & 0b01 != 0 { 0x0E } else { 0x08 };
                        self.buffer.push(hi | lo);
                    }
                }
            }
            self.buffer.extend(std::iter::repeat(0).take(RESET_BYTES));
        }
    }

    impl<SPI: SpiBus> EmitterBus for Ws2812SpiBus<SPI> {
        fn flush(&mut self, colors: &[RGB8]) -> Result<(), BusError> {
            self.encode(colors);
            self.spi
                .write(&self.buffer)
                .map_err(|e| BusError::Write(format!("{e:?}")))?;
            self.spi
                .flush()
                .map_err(|e| BusError::Write(format!("{e:?}")))
        }
    }
}
