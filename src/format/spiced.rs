//! Three-delimiter split and join.
//!
//! Each delimiter must occur exactly once, checked in order: pepper on the
//! whole string, chilli on what follows pepper, oignon on what follows chilli.

use super::Delimiters;
use crate::error::FormatError;

/// Borrowed hex segments of a packed string. Padding is dropped.
#[derive(Debug, PartialEq, Eq)]
pub struct Segments<'a> {
    pub tag: &'a str,
    pub content: &'a str,
    pub iv: &'a str,
}

pub fn join(delimiters: &Delimiters, tag: &str, content: &str, iv: &str, padding: &str) -> String {
    let mut out = String::with_capacity(
        tag.len()
            + content.len()
            + iv.len()
            + padding.len()
            + delimiters.pepper().len()
            + delimiters.chilli().len()
            + delimiters.oignon().len(),
    );
    out.push_str(tag);
    out.push_str(delimiters.pepper());
    out.push_str(content);
    out.push_str(delimiters.chilli());
    out.push_str(iv);
    out.push_str(delimiters.oignon());
    out.push_str(padding);
    out
}

pub fn split<'a>(packed: &'a str, delimiters: &Delimiters) -> Result<Segments<'a>, FormatError> {
    let (tag, rest) = split_exactly_once(packed, delimiters.pepper(), "pepper")?;
    let (content, rest) = split_exactly_once(rest, delimiters.chilli(), "chilli")?;
    let (iv, _padding) = split_exactly_once(rest, delimiters.oignon(), "oignon")?;
    Ok(Segments { tag, content, iv })
}

fn split_exactly_once<'a>(
    s: &'a str,
    delimiter: &str,
    name: &'static str,
) -> Result<(&'a str, &'a str), FormatError> {
    let mut parts = s.split(delimiter);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(head), Some(tail), None) => Ok((head, tail)),
        _ => Err(FormatError::Delimiter(name)),
    }
}
