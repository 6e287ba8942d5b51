//! # Seven-Segment Glyph Font
//!
//! A dense 64-entry table mapping every renderable glyph to a 7-bit segment
//! mask. Each bit lights one segment of a digit slot:
//!
//! ```text
//!      ─1─
//!     2   0
//!      ─3─
//!     6   4
//!      ─5─
//! ```
//!
//! | bit | segment       |
//! |-----|---------------|
//! | 0   | top-right     |
//! | 1   | top           |
//! | 2   | top-left      |
//! | 3   | middle        |
//! | 4   | bottom-right  |
//! | 5   | bottom        |
//! | 6   | bottom-left   |
//!
//! Glyph codes are canonicalised so the table can be indexed directly:
//! digits `0-9` → 0-9, `A-Z` → 10-35, `a-z` → 36-61, `-` → 62, space → 63.
//! Anything else falls back to the blank entry at index 63.

/// Number of segments in a glyph.
pub const SEGMENTS_PER_GLYPH: usize = 7;

/// Index of the blank entry, also used for unsupported characters.
pub const BLANK_INDEX: usize = 63;

const DASH_INDEX: usize = 62;

/// Segment masks indexed by canonical glyph code.
pub static FONT: [u8; 64] = [
    // 0-9
    0b111_0111, // 0
    0b001_0001, // 1
    0b110_1011, // 2
    0b011_1011, // 3
    0b001_1101, // 4
    0b011_1110, // 5
    0b111_1110, // 6
    0b001_0011, // 7
    0b111_1111, // 8
    0b011_1111, // 9
    // A-Z
    0b101_1111, // A
    0b111_1100, // B (b)
    0b110_0110, // C
    0b111_1001, // D (d)
    0b110_1110, // E
    0b100_1110, // F
    0b111_0110, // G
    0b101_1101, // H
    0b100_0100, // I
    0b111_0001, // J
    0b101_1110, // K
    0b110_0100, // L
    0b101_0010, // M
    0b101_1000, // N (n)
    0b111_0111, // O
    0b100_1111, // P
    0b001_1111, // Q (q)
    0b100_1000, // R (r)
    0b011_1110, // S
    0b110_1100, // T (t)
    0b111_0101, // U
    0b111_0000, // V (u)
    0b010_0101, // W
    0b101_1101, // X
    0b011_1101, // Y
    0b110_1011, // Z
    // a-z
    0b111_1011, // a
    0b111_1100, // b
    0b110_1000, // c
    0b111_1001, // d
    0b110_1111, // e
    0b100_1110, // f
    0b011_1111, // g
    0b101_1100, // h
    0b100_0000, // i
    0b011_0001, // j
    0b101_1110, // k
    0b100_0100, // l
    0b101_0010, // m
    0b101_1000, // n
    0b111_1000, // o
    0b100_1111, // p
    0b001_1111, // q
    0b100_1000, // r
    0b011_1110, // s
    0b110_1100, // t
    0b111_0000, // u
    0b111_0000, // v
    0b010_0101, // w
    0b101_1101, // x
    0b011_1101, // y
    0b110_1011, // z
    // punctuation
    0b000_1000, // -
    0b000_0000, // space / unknown
];

/// A renderable character, stored as its canonical table index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Glyph(u8);

impl Glyph {
    pub const BLANK: Glyph = Glyph(BLANK_INDEX as u8);
    pub const DASH: Glyph = Glyph(DASH_INDEX as u8);

    /// Canonicalise a character. Unsupported characters become [`Glyph::BLANK`].
    pub fn from_char(c: char) -> Self {
        let index = match c {
            '0'..='9' => c as u8 - b'0',
            'A'..='Z' => c as u8 - b'A' + 10,
            'a'..='z' => c as u8 - b'a' + 36,
            '-' => DASH_INDEX as u8,
            _ => BLANK_INDEX as u8,
        };
        Glyph(index)
    }

    /// Glyph for a single decimal digit. Values above 9 wrap to their last digit.
    pub fn digit(n: u8) -> Self {
        Glyph(n % 10)
    }

    /// Canonical table index (0-63).
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Segment mask for this glyph.
    pub fn mask(self) -> u8 {
        FONT[self.index()]
    }

    /// Whether `segment` (0-6) is lit for this glyph.
    pub fn lights(self, segment: usize) -> bool {
        debug_assert!(segment < SEGMENTS_PER_GLYPH, "segment {segment} out of range");
        self.mask() & (1 << segment) != 0
    }

    /// The character this glyph renders, for previews and logs.
    pub fn to_char(self) -> char {
        match self.0 {
            n @ 0..=9 => (b'0' + n) as char,
            n @ 10..=35 => (b'A' + n - 10) as char,
            n @ 36..=61 => (b'a' + n - 36) as char,
            62 => '-',
            _ => ' ',
        }
    }
}

impl From<char> for Glyph {
    fn from(c: char) -> Self {
        Glyph::from_char(c)
    }
}

/// Segment mask for any character. Total: unsupported input maps to blank.
pub fn mask(c: char) -> u8 {
    Glyph::from_char(c).mask()
}

/// First glyph in table order whose mask equals `mask`.
///
/// Several letters share a shape with a digit (`O`/`0`, `S`/`5`, `g`/`9`),
/// so digits always win the lookup.
pub fn decode(mask: u8) -> Option<Glyph> {
    FONT.iter()
        .position(|&m| m == mask & 0x7F)
        .map(|i| Glyph(i as u8))
}
