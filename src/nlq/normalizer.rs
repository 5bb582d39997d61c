use regex::{Captures, Regex};
use tracing::debug;

use super::sql_text::{quote_ident, segments, SegmentKind};
use super::types::Dialect;
use crate::config::TableMapping;

/// Rewrites colloquial table references after `FROM`/`JOIN` to canonical
/// quoted identifiers. Only code segments are touched.
#[derive(Debug, Clone)]
pub struct TableNameNormalizer {
    rules: Vec<(Regex, String)>,
}

impl TableNameNormalizer {
    pub fn new(mappings: &[TableMapping]) -> Result<Self, regex::Error> {
        let rules = mappings
            .iter()
            .map(|mapping| {
                let pattern = format!(r"(?i)\b(FROM|JOIN)(\s+)({})\b", mapping.pattern);
                Regex::new(&pattern).map(|re| (re, mapping.canonical.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    pub fn normalize(&self, sql: &str, dialect: Dialect) -> String {
        let mut out = String::with_capacity(sql.len() + 32);

        for segment in segments(sql) {
            if segment.kind != SegmentKind::Code {
                out.push_str(segment.text);
                continue;
            }

            let mut text = segment.text.to_string();
            for (re, canonical) in &self.rules {
                let replacement = quote_ident(canonical, dialect);
                let rewritten = re.replace_all(&text, |caps: &Captures| {
                    let whole = &caps[0];
                    let end = caps.get(0).map(|m| m.end()).unwrap_or(0);
                    // `leads.id` or `lead(` are not bare table references
                    match text[end..].chars().next() {
                        Some('.') | Some('(') => whole.to_string(),
                        _ => format!("{}{}{}", &caps[1], &caps[2], replacement),
                    }
                });
                if let std::borrow::Cow::Owned(rewritten) = rewritten {
                    debug!("Normalized table reference to {}", replacement);
                    text = rewritten;
                }
            }
            out.push_str(&text);
        }

        out
    }
}
