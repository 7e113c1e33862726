use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The five directive tokens recognised in one kind of file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keywords {
    #[serde(rename = "if")]
    pub if_: String,
    pub elseif: String,
    #[serde(rename = "else")]
    pub else_: String,
    pub endif: String,
    /// Marks a line that is currently commented out
    pub eval: String,
}

/// Classification of a single source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `if`, with everything after the token
    If(&'a str),
    /// `elseif`, with everything after the token
    ElseIf(&'a str),
    Else,
    EndIf,
    /// Any line that is not a block directive, including eval-tagged lines
    Code,
}

impl Keywords {
    pub fn new(
        if_: impl Into<String>,
        elseif: impl Into<String>,
        else_: impl Into<String>,
        endif: impl Into<String>,
        eval: impl Into<String>,
    ) -> Self {
        Self {
            if_: if_.into(),
            elseif: elseif.into(),
            else_: else_.into(),
            endif: endif.into(),
            eval: eval.into(),
        }
    }

    /// Tokens in the order they are tried when classifying a line
    fn by_priority(&self) -> [(&'static str, &str); 5] {
        [
            ("if", self.if_.as_str()),
            ("elseif", self.elseif.as_str()),
            ("else", self.else_.as_str()),
            ("endif", self.endif.as_str()),
            ("eval", self.eval.as_str()),
        ]
    }

    /// Classify an already trimmed line
    pub fn classify<'l>(&self, trimmed: &'l str) -> Directive<'l> {
        if let Some(rest) = trimmed.strip_prefix(self.if_.as_str()) {
            Directive::If(rest)
        } else if let Some(rest) = trimmed.strip_prefix(self.elseif.as_str()) {
            Directive::ElseIf(rest)
        } else if trimmed.starts_with(self.else_.as_str()) {
            Directive::Else
        } else if trimmed.starts_with(self.endif.as_str()) {
            Directive::EndIf
        } else {
            Directive::Code
        }
    }

    /// Check that every token is set and that no token shadows a later one.
    ///
    /// Lines are matched by prefix in priority order, so a token that is a
    /// prefix of a lower-priority token would make the latter unreachable.
    pub fn validate(&self) -> Result<()> {
        let tokens = self.by_priority();
        for (name, token) in &tokens {
            if token.is_empty() {
                return Err(eyre::eyre!("Keyword '{}' must not be empty", name));
            }
        }
        for (i, (name, token)) in tokens.iter().enumerate() {
            for (later, later_token) in &tokens[i + 1..] {
                if later_token.starts_with(*token) {
                    return Err(eyre::eyre!(
                        "Keyword '{}' ({}) is a prefix of '{}' ({}) and would hide it",
                        name,
                        token,
                        later,
                        later_token
                    ));
                }
            }
        }
        Ok(())
    }
}

impl Default for Keywords {
    fn default() -> Self {
        Self::new("//#if", "//#elseif", "//#else", "//#endif", "//$$")
    }
}

/// Keyword sets keyed by file extension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HashMap<String, Keywords>", into = "HashMap<String, Keywords>")]
pub struct KeywordRegistry {
    by_extension: HashMap<String, Keywords>,
    default: Keywords,
}

impl KeywordRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register keywords for an extension such as `json`, `.json` or `d.ts`
    pub fn register(&mut self, extension: &str, keywords: Keywords) {
        self.by_extension.insert(normalize_extension(extension), keywords);
    }

    /// Merge `other` into this registry, `other` winning on conflicts
    pub fn extend(&mut self, other: KeywordRegistry) {
        self.by_extension.extend(other.by_extension);
    }

    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Keywords)> {
        self.by_extension.iter().map(|(ext, kw)| (ext.as_str(), kw))
    }

    /// Resolve the keywords for a file name, falling back to the default set.
    ///
    /// The longest registered extension the name ends with wins, so `d.ts`
    /// is preferred over `ts` for `types.d.ts`.
    pub fn for_file(&self, file_name: Option<&str>) -> &Keywords {
        let Some(name) = file_name.map(|n| n.trim().to_lowercase()) else {
            return &self.default;
        };

        self.by_extension
            .iter()
            .filter(|(ext, _)| has_extension(&name, ext))
            .max_by_key(|(ext, _)| ext.len())
            .map(|(_, keywords)| keywords)
            .unwrap_or(&self.default)
    }

    /// Validate every registered keyword set
    pub fn validate(&self) -> Result<()> {
        for (ext, keywords) in &self.by_extension {
            keywords
                .validate()
                .map_err(|e| eyre::eyre!("Invalid keywords for extension '{}': {}", ext, e))?;
        }
        Ok(())
    }
}

impl From<HashMap<String, Keywords>> for KeywordRegistry {
    fn from(raw: HashMap<String, Keywords>) -> Self {
        let mut registry = Self::new();
        for (ext, keywords) in raw {
            registry.register(&ext, keywords);
        }
        registry
    }
}

impl From<KeywordRegistry> for HashMap<String, Keywords> {
    fn from(registry: KeywordRegistry) -> Self {
        registry.by_extension
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Whether `name` ends with `.ext` and has something before that dot
fn has_extension(name: &str, ext: &str) -> bool {
    name.len() > ext.len() + 1 && name.ends_with(ext) && name[..name.len() - ext.len()].ends_with('.')
}
