use std::borrow::Cow;
use std::ops::Deref;

use crate::constants::REPLACEMENT_CHARACTER;

/// Decoded text handed to the font engine: one 32-bit scalar per character.
///
/// Encoding details stay on the caller's side of this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodePoints<'a>(Cow<'a, [u32]>);

impl<'a> CodePoints<'a> {
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn into_owned(self) -> CodePoints<'static> {
        CodePoints(Cow::Owned(self.0.into_owned()))
    }

    /// Decode UTF-16, replacing unpaired surrogates with U+FFFD.
    pub fn from_utf16_lossy(units: &[u16]) -> CodePoints<'static> {
        let decoded = char::decode_utf16(units.iter().copied())
            .map(|r| r.map_or(REPLACEMENT_CHARACTER, u32::from))
            .collect::<Vec<_>>();
        CodePoints(Cow::Owned(decoded))
    }
}

impl Deref for CodePoints<'_> {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        &self.0
    }
}

impl From<&str> for CodePoints<'static> {
    fn from(text: &str) -> Self {
        CodePoints(Cow::Owned(text.chars().map(u32::from).collect()))
    }
}

impl From<&String> for CodePoints<'static> {
    fn from(text: &String) -> Self {
        CodePoints::from(text.as_str())
    }
}

impl From<String> for CodePoints<'static> {
    fn from(text: String) -> Self {
        CodePoints::from(text.as_str())
    }
}

impl<'a> From<&'a [u32]> for CodePoints<'a> {
    fn from(codepoints: &'a [u32]) -> Self {
        CodePoints(Cow::Borrowed(codepoints))
    }
}

impl<'a> From<&'a Vec<u32>> for CodePoints<'a> {
    fn from(codepoints: &'a Vec<u32>) -> Self {
        CodePoints(Cow::Borrowed(codepoints.as_slice()))
    }
}

impl From<Vec<u32>> for CodePoints<'static> {
    fn from(codepoints: Vec<u32>) -> Self {
        CodePoints(Cow::Owned(codepoints))
    }
}

impl From<&[char]> for CodePoints<'static> {
    fn from(chars: &[char]) -> Self {
        CodePoints(Cow::Owned(chars.iter().copied().map(u32::from).collect()))
    }
}

impl From<char> for CodePoints<'static> {
    fn from(c: char) -> Self {
        CodePoints(Cow::Owned(vec![u32::from(c)]))
    }
}
