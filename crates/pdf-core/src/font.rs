//! Standard 14 font handling
//!
//! Text is drawn with the non-embedded standard Type1 fonts and
//! `WinAnsiEncoding`, so no font program has to be shipped with the
//! document and every viewer renders the same metrics.

use lopdf::{Dictionary, Object};

/// One of the standard Type1 fonts every PDF viewer provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
    HelveticaBold,
}

impl StandardFont {
    /// The PostScript name written to `/BaseFont`
    pub fn base_font(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
        }
    }

    /// Build the font dictionary for this font
    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Font".to_vec()));
        dict.set("Subtype", Object::Name(b"Type1".to_vec()));
        dict.set("BaseFont", Object::Name(self.base_font().as_bytes().to_vec()));
        dict.set("Encoding", Object::Name(b"WinAnsiEncoding".to_vec()));
        dict
    }
}

/// WinAnsi code points 0x80..=0x9F (None = undefined)
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

fn encode_char(ch: char) -> Option<u8> {
    match ch {
        ' '..='~' => Some(ch as u8),
        '\t' => Some(b' '),
        '\u{00A0}'..='\u{00FF}' => Some(ch as u32 as u8),
        _ => WIN_ANSI_HIGH
            .iter()
            .position(|c| *c == Some(ch))
            .map(|i| 0x80 + i as u8),
    }
}

/// Encode text as WinAnsi bytes
///
/// Characters outside the encoding are replaced with `?`.
///
/// # Returns
/// The encoded bytes and the number of replaced characters
pub fn encode_win_ansi(text: &str) -> (Vec<u8>, usize) {
    let mut replaced = 0;
    let bytes = text
        .chars()
        .map(|ch| {
            encode_char(ch).unwrap_or_else(|| {
                replaced += 1;
                b'?'
            })
        })
        .collect();
    (bytes, replaced)
}

/// Decode WinAnsi bytes back into a string
pub fn decode_win_ansi(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x80..=0x9F => WIN_ANSI_HIGH[(b - 0x80) as usize].unwrap_or('?'),
            _ => b as char,
        })
        .collect()
}
