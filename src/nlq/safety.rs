use regex::{Regex, RegexBuilder};

/// Rejects SQL that mentions a denied statement keyword anywhere in its text.
///
/// The scan is deliberately blunt: literals and comments are included and a
/// single hit rejects the whole query.
#[derive(Debug, Clone)]
pub struct SafetyValidator {
    keywords: Vec<(Regex, String)>,
}

impl SafetyValidator {
    pub fn new(denied_keywords: &[String]) -> Result<Self, regex::Error> {
        let keywords = denied_keywords
            .iter()
            .map(|keyword| {
                let keyword = keyword.trim().to_uppercase();
                RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&keyword)))
                    .case_insensitive(true)
                    .build()
                    .map(|re| (re, keyword))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { keywords })
    }

    /// First denied keyword found in `sql`, if any.
    pub fn find_violation(&self, sql: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|(re, _)| re.is_match(sql))
            .map(|(_, keyword)| keyword.as_str())
    }
}
