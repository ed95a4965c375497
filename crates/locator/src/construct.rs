use crate::error::{Error, ErrorKind, Result};
use crate::{ESCAPE, ResourceLocator, SEPARATOR, Scheme};
use std::str::FromStr;

impl FromStr for Scheme {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" => Ok(Scheme::File),
            "http" => Ok(Scheme::Http),
            "https" => Ok(Scheme::Https),
            _ => exn::bail!(ErrorKind::UnsupportedScheme(s.to_string())),
        }
    }
}

impl FromStr for ResourceLocator {
    type Err = Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            exn::bail!(ErrorKind::Empty);
        }
        let mut segments = split(s)?.into_iter();
        // `split` never returns an empty list for non-empty input.
        let first = segments.next().unwrap_or_default();
        let Some((scheme, path)) = first.split_once("://") else {
            exn::bail!(ErrorKind::MissingScheme(s.to_string()));
        };
        if path.is_empty() {
            exn::bail!(ErrorKind::EmptySegment(s.to_string()));
        }
        Ok(Self { scheme: scheme.parse()?, path: path.to_string(), members: segments.collect() })
    }
}

impl TryFrom<&str> for ResourceLocator {
    type Error = Error;
    fn try_from(value: &str) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Split the string form into unescaped segments.
fn split(input: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => exn::bail!(ErrorKind::DanglingEscape(input.to_string())),
            },
            SEPARATOR => segments.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    segments.push(current);
    if segments.iter().any(String::is_empty) {
        exn::bail!(ErrorKind::EmptySegment(input.to_string()));
    }
    Ok(segments)
}

pub(crate) fn escape(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for c in segment.chars() {
        if c == SEPARATOR || c == ESCAPE {
            escaped.push(ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}
