//! Text wrapper
//!
//! A compilable unit is a sequence of length-prefixed sections: one
//! `//@extern` section per visible declaration followed by the `//@unit`
//! section holding the fragment being compiled.
//!
//! ```text
//! //@extern $Snip1_0 6
//! int x;
//! //@unit $Snip2_0 34
//! int timesx(int v) { return v * x; }
//! ```

use std::fmt::Write;

use crate::service::{CompilationUnit, PositionMap, WrapRequest, Wrapper};

const EXTERN: &str = "//@extern";
const UNIT: &str = "//@unit";

/// Wraps fragments into sectioned compilation units
#[derive(Debug, Default, Clone, Copy)]
pub struct TextWrapper;

impl TextWrapper {
    pub fn new() -> Self {
        Self
    }
}

impl Wrapper for TextWrapper {
    fn wrap(
        &self,
        request: &WrapRequest<'_>,
    ) -> CompilationUnit {
        let mut source = String::new();
        for entry in request.context {
            let _ = writeln!(source, "{} {} {}", EXTERN, entry.class_name, entry.fragment.len());
            source.push_str(&entry.fragment);
            source.push('\n');
        }
        let _ = writeln!(source, "{} {} {}", UNIT, request.class_name, request.fragment.len());
        let start = source.len();
        source.push_str(request.fragment);

        CompilationUnit {
            class_name: request.class_name.to_string(),
            source,
            map: PositionMap::new(start, request.fragment.len()),
        }
    }
}

/// One section of a wrapped unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    pub class_name: &'a str,
    pub text: &'a str,
    /// Offset of `text` in the unit
    pub offset: usize,
}

/// Parsed unit: visible declarations and the unit's own fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections<'a> {
    pub externs: Vec<Section<'a>>,
    pub unit: Section<'a>,
}

/// Malformed unit text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed compilation unit at offset {offset}: {reason}")]
pub struct MalformedUnit {
    pub offset: usize,
    pub reason: String,
}

/// Split a wrapped unit back into its sections
pub fn parse_sections(source: &str) -> Result<Sections<'_>, MalformedUnit> {
    let malformed = |offset: usize, reason: &str| MalformedUnit {
        offset,
        reason: reason.to_string(),
    };

    let mut externs = Vec::new();
    let mut offset = 0;
    while offset < source.len() {
        let line_end = source[offset..]
            .find('\n')
            .map(|i| offset + i)
            .ok_or_else(|| malformed(offset, "missing section header"))?;
        let header: Vec<&str> = source[offset..line_end].split(' ').collect();
        let [marker, class_name, len] = header.as_slice() else {
            return Err(malformed(offset, "bad section header"));
        };
        let len: usize = len.parse().map_err(|_| malformed(offset, "bad section length"))?;
        let start = line_end + 1;
        let end = start
            .checked_add(len)
            .ok_or_else(|| malformed(start, "section runs past the end"))?;
        let text = source
            .get(start..end)
            .ok_or_else(|| malformed(start, "section runs past the end"))?;
        let section = Section {
            class_name,
            text,
            offset: start,
        };

        match *marker {
            EXTERN => externs.push(section),
            UNIT if end == source.len() => return Ok(Sections { externs, unit: section }),
            UNIT => return Err(malformed(end, "text after the unit section")),
            _ => return Err(malformed(offset, "unknown section marker")),
        }
        offset = end + 1;
    }
    Err(malformed(source.len(), "missing unit section"))
}
