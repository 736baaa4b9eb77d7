//! Date headers for file names.
//!
//! A date header is a `YYMMDD` prefix followed by a separator. Existing
//! dates in a name (`20240305`, `2024.03.05`, `24-03-05`, `240305`, ...)
//! are normalized into that prefix instead of being duplicated, so applying
//! the header twice gives the same name.

use std::fmt;
use std::sync::LazyLock;

use chrono::{Datelike, Local, NaiveDate};
use regex::Regex;

use crate::config::DateFormat;

/// A calendar date rendered as `YYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DateHeader {
    date: NaiveDate,
}

impl DateHeader {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }

    pub fn today() -> Self {
        Self::new(Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }
}

impl fmt::Display for DateHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}{:02}{:02}",
            self.date.year().rem_euclid(100),
            self.date.month(),
            self.date.day()
        )
    }
}

/// A date token found inside a file stem.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    end: usize,
    header: DateHeader,
}

static RE_COMPACT_LONG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{4})([0-9]{2})([0-9]{2})").unwrap());
static RE_SEPARATED_LONG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{4})([._-])([0-9]{2})([._-])([0-9]{2})").unwrap()
});
static RE_SEPARATED_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{2})([._-])([0-9]{2})([._-])([0-9]{2})").unwrap()
});
static RE_COMPACT_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]{2})([0-9]{2})([0-9]{2})").unwrap());

/// Applies date headers using an explicit set of recognized date formats.
#[derive(Debug, Clone)]
pub struct FilenameDater {
    formats: Vec<DateFormat>,
    separator: String,
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '_' | '-' | '(' | ')' | '[' | ']' | ',')
}

fn regex_for(format: DateFormat) -> &'static Regex {
    match format {
        DateFormat::CompactLong => &RE_COMPACT_LONG,
        DateFormat::SeparatedLong => &RE_SEPARATED_LONG,
        DateFormat::SeparatedShort => &RE_SEPARATED_SHORT,
        DateFormat::CompactShort => &RE_COMPACT_SHORT,
    }
}

impl FilenameDater {
    pub fn new(formats: &[DateFormat], separator: &str) -> Self {
        let mut unique: Vec<DateFormat> = Vec::with_capacity(formats.len());
        for &format in formats {
            if !unique.contains(&format) {
                unique.push(format);
            }
        }

        Self {
            formats: unique,
            separator: separator.to_string(),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Returns `filename` with exactly one leading date header.
    ///
    /// `fallback` is used when the name carries no recognizable date.
    pub fn apply(&self, filename: &str, fallback: DateHeader) -> String {
        let (stem, ext) = split_extension(filename);

        let (header, rest) = match self.candidates(stem).first() {
            Some(c) if c.start == 0 => (c.header, stem[c.end..].to_string()),
            Some(c) => (c.header, remove_token(stem, c.start, c.end)),
            None => (fallback, stem.to_string()),
        };

        let rest = rest.trim_start_matches(is_delimiter);
        let rest = self.strip_date(rest, header);
        let rest = rest.trim_start_matches(is_delimiter);

        if rest.is_empty() {
            format!("{}{}", header, ext)
        } else {
            format!("{}{}{}{}", header, self.separator, rest, ext)
        }
    }

    /// The date a name already carries, if any.
    pub fn detect(&self, filename: &str) -> Option<DateHeader> {
        let (stem, _) = split_extension(filename);
        self.candidates(stem).first().map(|c| c.header)
    }

    /// True when the name starts with a valid `YYMMDD` followed by a
    /// delimiter (or nothing), i.e. it was already processed.
    pub fn has_canonical_header(&self, filename: &str) -> bool {
        let (stem, _) = split_extension(filename);
        RE_COMPACT_SHORT
            .captures(stem)
            .filter(|caps| caps.get(0).map(|m| m.start()) == Some(0))
            .and_then(|caps| {
                let end = caps.get(0)?.end();
                if !follows_delimited(stem, end) {
                    return None;
                }
                short_date(&caps[1], &caps[2], &caps[3])
            })
            .is_some()
    }

    /// Candidates ordered leftmost first, longer tokens first at equal positions.
    fn candidates(&self, stem: &str) -> Vec<Candidate> {
        let mut found = Vec::new();

        for &format in &self.formats {
            for caps in regex_for(format).captures_iter(stem) {
                let Some(whole) = caps.get(0) else { continue };
                let (start, end) = (whole.start(), whole.end());

                let header = match format {
                    DateFormat::CompactLong => long_date(&caps[1], &caps[2], &caps[3]),
                    DateFormat::CompactShort => short_date(&caps[1], &caps[2], &caps[3]),
                    DateFormat::SeparatedLong => {
                        if caps[2] != caps[4] {
                            continue;
                        }
                        long_date(&caps[1], &caps[3], &caps[5])
                    }
                    DateFormat::SeparatedShort => {
                        if caps[2] != caps[4] {
                            continue;
                        }
                        short_date(&caps[1], &caps[3], &caps[5])
                    }
                };
                let Some(header) = header else { continue };

                if is_bounded(stem, start, end, format) {
                    found.push(Candidate { start, end, header });
                }
            }
        }

        // The canonical prefix is recognized even when `yymmdd` is disabled.
        if !self.formats.contains(&DateFormat::CompactShort) {
            if let Some(caps) = RE_COMPACT_SHORT.captures(stem) {
                if let Some(whole) = caps.get(0) {
                    if whole.start() == 0 && follows_delimited(stem, whole.end()) {
                        if let Some(header) = short_date(&caps[1], &caps[2], &caps[3]) {
                            found.push(Candidate {
                                start: 0,
                                end: whole.end(),
                                header,
                            });
                        }
                    }
                }
            }
        }

        found.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| (b.end - b.start).cmp(&(a.end - a.start)))
        });
        found
    }

    /// Removes every further occurrence of `header` from `rest`.
    fn strip_date(&self, rest: &str, header: DateHeader) -> String {
        let mut rest = rest.to_string();
        while let Some(c) = self
            .candidates(&rest)
            .into_iter()
            .find(|c| c.header == header)
        {
            rest = if c.start == 0 {
                rest[c.end..].trim_start_matches(is_delimiter).to_string()
            } else {
                remove_token(&rest, c.start, c.end)
            };
        }
        rest
    }
}

impl Default for FilenameDater {
    fn default() -> Self {
        Self::new(&DateFormat::ALL, "_")
    }
}

/// Convenience wrapper using every recognized format and `_` as separator.
pub fn add_date_header(filename: &str, today: NaiveDate) -> String {
    FilenameDater::default().apply(filename, DateHeader::new(today))
}

/// Splits `name` into stem and extension (with its dot). A trailing
/// all-digit segment such as the `05` in `2024.03.05` is not an extension.
/// A leading-dot name like `.x` is all extension, so the split is the same
/// once a header has been prepended.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => {
            let ext = &name[pos + 1..];
            if ext.is_empty() || ext.chars().all(|c| c.is_ascii_digit()) {
                (name, "")
            } else {
                (&name[..pos], &name[pos..])
            }
        }
        _ => (name, ""),
    }
}

fn long_date(year: &str, month: &str, day: &str) -> Option<DateHeader> {
    let year: i32 = year.parse().ok()?;
    if !(1900..=2099).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?).map(DateHeader::new)
}

fn short_date(year: &str, month: &str, day: &str) -> Option<DateHeader> {
    let year: i32 = year.parse().ok()?;
    NaiveDate::from_ymd_opt(2000 + year, month.parse().ok()?, day.parse().ok()?)
        .map(DateHeader::new)
}

fn follows_delimited(stem: &str, end: usize) -> bool {
    stem[end..].chars().next().is_none_or(is_delimiter)
}

fn is_bounded(stem: &str, start: usize, end: usize, format: DateFormat) -> bool {
    let next = stem[end..].chars().next();

    if start == 0 {
        return match format {
            DateFormat::CompactShort => next.is_none_or(is_delimiter),
            _ => next.is_none_or(|c| !c.is_ascii_digit()),
        };
    }

    let prev = stem[..start].chars().next_back();
    prev.is_some_and(is_delimiter) && next.is_none_or(is_delimiter)
}

/// Cuts `stem[start..end]` out and rejoins the two sides with the
/// delimiter that preceded the token.
fn remove_token(stem: &str, start: usize, end: usize) -> String {
    let before = &stem[..start];
    let after = &stem[end..];

    let before_trimmed = before.trim_end_matches(is_delimiter);
    let after_trimmed = after.trim_start_matches(is_delimiter);

    if before_trimmed.is_empty() {
        return after_trimmed.to_string();
    }
    if after_trimmed.is_empty() {
        return before_trimmed.to_string();
    }

    let joiner = before[before_trimmed.len()..]
        .chars()
        .find(|c| matches!(c, ' ' | '_' | '-'))
        .unwrap_or(' ');

    format!("{}{}{}", before_trimmed, joiner, after_trimmed)
}
