//! Code block extraction from model responses.
//!
//! A response is scanned with a fixed, ordered list of delimiter patterns.
//! The first pattern that matches wins and only its first match is used.

use std::sync::LazyLock;

use regex::Regex;

/// Language the assistant is asked to write.
pub const DEFAULT_LANGUAGE: &str = "python";

static PYTHON: LazyLock<CodeExtractor> = LazyLock::new(|| {
    CodeExtractor::new(DEFAULT_LANGUAGE).expect("python block patterns are valid")
});

/// How a leading language tag inside the captured block is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagStripping {
    /// Strip whenever the block starts with the tag, even inside an identifier
    /// (`python_var` becomes `_var`).
    #[default]
    Naive,
    /// Strip only when the tag is followed by whitespace or ends the block.
    WordBoundary,
}

/// Ordered set of block patterns for one target language.
#[derive(Debug, Clone)]
pub struct CodeExtractor {
    language: String,
    patterns: Vec<Regex>,
    stripping: TagStripping,
}

impl CodeExtractor {
    /// Build the pattern list for `language`.
    ///
    /// Patterns, in priority order:
    /// 1. ```` ```<language>\n...\n``` ````
    /// 2. ```` ```\n...\n``` ````
    /// 3. `%%\n...\n%%`
    /// 4. `"""..."""`
    /// 5. `'''...'''`
    pub fn new(language: &str) -> Result<Self, regex::Error> {
        let sources = [
            format!(r"(?s)```{}\n(.*?)\n```", regex::escape(language)),
            r"(?s)```\n(.*?)\n```".to_string(),
            r"(?s)%%\n(.*?)\n%%".to_string(),
            r#"(?s)"""(.*?)""""#.to_string(),
            r"(?s)'''(.*?)'''".to_string(),
        ];

        let patterns = sources
            .iter()
            .map(|source| Regex::new(source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            language: language.to_string(),
            patterns,
            stripping: TagStripping::default(),
        })
    }

    pub fn with_stripping(mut self, stripping: TagStripping) -> Self {
        self.stripping = stripping;
        self
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Return the first code block found in `response`, or `None`.
    ///
    /// An empty or whitespace-only block is still a match and yields `""`.
    pub fn extract(&self, response: &str) -> Option<String> {
        let captured = self
            .patterns
            .iter()
            .find_map(|pattern| pattern.captures(response))?
            .get(1)?
            .as_str()
            .trim();

        Some(self.strip_language_tag(captured).to_string())
    }

    fn strip_language_tag<'a>(&self, code: &'a str) -> &'a str {
        let Some(rest) = code.strip_prefix(self.language.as_str()) else {
            return code;
        };

        match self.stripping {
            TagStripping::Naive => rest.trim_start(),
            TagStripping::WordBoundary => {
                if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                    rest.trim_start()
                } else {
                    code
                }
            }
        }
    }
}

/// Shared extractor for the default language.
pub fn python_extractor() -> &'static CodeExtractor {
    &PYTHON
}

/// Extract the first Python code block from a response.
pub fn extract_python_code(response: &str) -> Option<String> {
    PYTHON.extract(response)
}
