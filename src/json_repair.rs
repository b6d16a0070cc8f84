//! Recovery of JSON payloads from free-form model output.
//!
//! Model responses arrive wrapped in code fences, sprinkled with LaTeX (`\frac`, `\times`) whose
//! backslashes are not valid JSON escapes, and occasionally with raw control characters inside
//! string literals. [`JsonResponseParser::repair`] rewrites such text into a parseable candidate.
//! Repairing its own output again changes nothing.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;

use crate::errors::GenerationError;

/// Backslash commands that are treated as literal LaTeX rather than JSON escapes. Several of them
/// start with a valid escape letter (`\f`, `\t`, `\b`, `\n`, `\r`), so they must be promoted
/// before escape sequences are considered.
const LATEX_COMMANDS: &[&str] = &[
    "Omega", "omega", "alpha", "beta", "gamma", "Gamma", "delta", "Delta", "epsilon",
    "varepsilon", "theta", "Theta", "tau", "lambda", "Lambda", "mu", "nu", "pi", "Pi", "rho",
    "sigma", "Sigma", "phi", "Phi", "psi", "Psi", "chi", "eta", "zeta", "xi", "kappa", "times",
    "div", "cdot", "pm", "mp", "le", "leq", "ge", "geq", "ne", "neq", "approx", "equiv", "sim",
    "propto", "frac", "dfrac", "tfrac", "sqrt", "sum", "prod", "int", "oint", "lim", "infty",
    "partial", "nabla", "forall", "exists", "neg", "not", "in", "notin", "subset", "subseteq",
    "cup", "cap", "emptyset", "to", "rightarrow", "Rightarrow", "leftarrow", "Leftarrow",
    "leftrightarrow", "implies", "iff", "left", "right", "langle", "rangle", "text", "textbf",
    "textit", "mathbf", "mathrm", "mathcal", "mathbb", "boldsymbol", "bar", "hat", "vec", "dot",
    "ddot", "tilde", "overline", "underline", "binom", "log", "ln", "exp", "sin", "cos", "tan",
    "sec", "csc", "cot", "max", "min", "det", "top", "perp", "parallel", "angle", "triangle",
    "circ", "degree", "ldots", "cdots", "quad", "qquad", "newline", "begin", "end", "hbar",
];

/// Characters that may legally follow a backslash in a JSON string.
const VALID_ESCAPES: &[char] = &['"', '\\', '/', 'b', 'f', 'n', 'r', 't'];

fn fence_patterns() -> Option<&'static (Regex, Regex)> {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let open = Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").ok()?;
            let close = Regex::new(r"\s*```\s*$").ok()?;
            Some((open, close))
        })
        .as_ref()
}

/// Centralized JSON response parser with repair and extraction fallbacks
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResponseParser;

impl JsonResponseParser {
    /// Rewrite raw model text into a JSON candidate.
    ///
    /// Order matters: fences are stripped, known LaTeX commands are promoted to `\\cmd`, valid
    /// escapes are kept as-is, and every other lone backslash is doubled. Raw control characters
    /// inside string literals are escaped. The function is idempotent. Valid JSON is not always
    /// left untouched: a valid escape that starts a known command (`"\tan"`) is promoted too.
    pub fn repair(raw: &str) -> String {
        let stripped = Self::strip_fences(raw);
        let chars: Vec<char> = stripped.chars().collect();
        let mut out = String::with_capacity(stripped.len() + 16);
        let mut in_string = false;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\\' => {
                    let run = chars[i..].iter().take_while(|&&ch| ch == '\\').count();
                    for _ in 0..run / 2 {
                        out.push_str("\\\\");
                    }
                    i += run;
                    if run % 2 == 0 {
                        continue;
                    }

                    let word: String = chars[i..]
                        .iter()
                        .take_while(|ch| ch.is_ascii_alphabetic())
                        .collect();
                    if !word.is_empty() && LATEX_COMMANDS.contains(&word.as_str()) {
                        out.push_str("\\\\");
                        continue;
                    }

                    match chars.get(i) {
                        Some(&next) if VALID_ESCAPES.contains(&next) => {
                            out.push('\\');
                            out.push(next);
                            i += 1;
                        }
                        Some('u') if Self::is_unicode_escape(&chars[i + 1..]) => {
                            out.push('\\');
                            out.extend(&chars[i..i + 5]);
                            i += 5;
                        }
                        _ => out.push_str("\\\\"),
                    }
                }
                '"' => {
                    in_string = !in_string;
                    out.push(c);
                    i += 1;
                }
                c if in_string && (c as u32) < 0x20 => {
                    match c {
                        '\n' => out.push_str("\\n"),
                        '\r' => out.push_str("\\r"),
                        '\t' => out.push_str("\\t"),
                        other => out.push_str(&format!("\\u{:04x}", other as u32)),
                    }
                    i += 1;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        out
    }

    fn strip_fences(raw: &str) -> String {
        let trimmed = raw.trim();
        match fence_patterns() {
            Some((open, close)) => {
                let without_open = open.replace(trimmed, "");
                close.replace(&without_open, "").trim().to_string()
            }
            None => trimmed.to_string(),
        }
    }

    fn is_unicode_escape(rest: &[char]) -> bool {
        rest.len() >= 4 && rest[..4].iter().all(|ch| ch.is_ascii_hexdigit())
    }

    /// Locate the first top-level `{...}` or `[...]` block in `text`.
    ///
    /// Brackets inside string literals are ignored. If the block never closes, the span from the
    /// first opener to the last matching closer is returned instead.
    pub fn extract_json_block(text: &str) -> Option<&str> {
        let start = text.find(['{', '['])?;
        let opener = text[start..].chars().next()?;
        let closer = if opener == '{' { '}' } else { ']' };

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (offset, ch) in text[start..].char_indices() {
            if in_string {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    in_string = false;
                }
                continue;
            }
            match ch {
                '"' => in_string = true,
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(&text[start..start + offset + ch.len_utf8()]);
                    }
                }
                _ => {}
            }
        }

        let end = text.rfind(closer)?;
        (end > start).then(|| &text[start..=end])
    }

    /// Repair and parse model output into a JSON value.
    pub fn parse_value(raw: &str) -> Result<Value, GenerationError> {
        let repaired = Self::repair(raw);
        if repaired.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        match serde_json::from_str::<Value>(&repaired) {
            Ok(value) => Ok(value),
            Err(strict_err) => {
                let block = Self::extract_json_block(&repaired).ok_or_else(|| {
                    GenerationError::MalformedOutput(format!(
                        "no JSON block found: {}",
                        strict_err
                    ))
                })?;
                serde_json::from_str::<Value>(block)
                    .map_err(|e| GenerationError::MalformedOutput(e.to_string()))
            }
        }
    }

    /// Parse JSON response into a specific type with error handling
    pub fn parse_json_response<T>(raw: &str) -> Result<T, GenerationError>
    where
        T: DeserializeOwned,
    {
        let value = Self::parse_value(raw)?;
        serde_json::from_value(value).map_err(|e| GenerationError::MalformedOutput(e.to_string()))
    }
}
