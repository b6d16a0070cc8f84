/// Turns uploaded bytes into plain text. An empty string means nothing could be extracted.
pub trait DocumentExtractor: Send + Sync {
    fn extract_text(&self, content: &[u8]) -> String;
}

/// Treats the upload as UTF-8 text. Invalid sequences are replaced and NUL bytes dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl DocumentExtractor for PlainTextExtractor {
    fn extract_text(&self, content: &[u8]) -> String {
        String::from_utf8_lossy(content)
            .chars()
            .filter(|c| *c != '\0')
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Title shown for a study set built from `file_name`: the name without a `.pdf`/`.txt` suffix.
pub fn derive_title(file_name: &str) -> String {
    let name = file_name.trim();
    let lowered = name.to_lowercase();
    let stem = [".pdf", ".txt"]
        .iter()
        .find(|ext| lowered.ends_with(*ext))
        .map(|ext| &name[..name.len() - ext.len()])
        .unwrap_or(name)
        .trim();
    if stem.is_empty() {
        "Untitled Study Set".to_string()
    } else {
        stem.to_string()
    }
}
