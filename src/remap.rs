use eyre::{Context, Result};
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Ordered pattern -> replacement pairs.
///
/// Order matters: every replacement sees the output of the ones before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemapTable {
    entries: Vec<(String, String)>,
}

impl RemapTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair; a pattern that is already present keeps its position
    pub fn insert(&mut self, pattern: impl Into<String>, replacement: impl Into<String>) {
        let pattern = pattern.into();
        let replacement = replacement.into();
        match self.entries.iter_mut().find(|(p, _)| *p == pattern) {
            Some(entry) => entry.1 = replacement,
            None => self.entries.push((pattern, replacement)),
        }
    }

    /// Append the pairs of `other` after these
    pub fn extend(&mut self, other: RemapTable) {
        for (pattern, replacement) in other.entries {
            self.insert(pattern, replacement);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }
}

impl<P: Into<String>, R: Into<String>> FromIterator<(P, R)> for RemapTable {
    fn from_iter<I: IntoIterator<Item = (P, R)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (pattern, replacement) in iter {
            table.insert(pattern, replacement);
        }
        table
    }
}

impl Serialize for RemapTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (pattern, replacement) in &self.entries {
            map.serialize_entry(pattern, replacement)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RemapTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = RemapTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a map of pattern to replacement")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RemapTable, A::Error> {
                let mut table = RemapTable::new();
                while let Some((pattern, replacement)) = access.next_entry::<String, String>()? {
                    table.insert(pattern, replacement);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// Applies a remap table to converted lines.
///
/// Patterns are regular expressions; replacements may reference capture
/// groups as `$1` or `${name}`.
#[derive(Debug, Clone, Default)]
pub struct Remapper {
    rules: Vec<(Regex, String)>,
}

impl Remapper {
    /// Compile every pattern of the table
    pub fn new(table: &RemapTable) -> Result<Self> {
        let rules = table
            .iter()
            .map(|(pattern, replacement)| {
                let regex = Regex::new(pattern).with_context(|| format!("Invalid remap pattern: {}", pattern))?;
                Ok((regex, replacement.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn convert_line(&self, line: &str) -> String {
        let mut line = line.to_string();
        for (regex, replacement) in &self.rules {
            line = regex.replace_all(&line, replacement.as_str()).into_owned();
        }
        line
    }

    pub fn convert_source<S: AsRef<str>>(&self, lines: &[S]) -> Vec<String> {
        lines.iter().map(|line| self.convert_line(line.as_ref())).collect()
    }
}
