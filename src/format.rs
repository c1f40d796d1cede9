//! Display Formatting Module
//!
//! Human-readable file sizes and caption templates for inline results.

const SIZE_UNITS: [&str; 7] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB"];

/// Renders a byte count with two decimals in the largest fitting unit
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, SIZE_UNITS[unit])
}

/// Errors raised while rendering a caption template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptionError {
    #[error("unknown placeholder {{{0}}}")]
    UnknownPlaceholder(String),
    #[error("positional placeholders are not supported")]
    Positional,
    #[error("format specifiers are not supported: {{{0}}}")]
    FormatSpec(String),
    #[error("unmatched '{0}' in caption template")]
    UnmatchedBrace(char),
}

/// Values available to a caption template
#[derive(Debug, Clone, Copy)]
pub struct CaptionFields<'a> {
    pub file_name: &'a str,
    pub file_size: &'a str,
    pub file_caption: &'a str,
}

impl<'a> CaptionFields<'a> {
    fn get(&self, name: &str) -> Result<&'a str, CaptionError> {
        match name {
            "file_name" => Ok(self.file_name),
            "file_size" => Ok(self.file_size),
            "file_caption" => Ok(self.file_caption),
            _ => Err(CaptionError::UnknownPlaceholder(name.to_string())),
        }
    }
}

/// Substitutes `{file_name}`, `{file_size}` and `{file_caption}` into a template.
///
/// `{{` and `}}` produce literal braces. Anything else inside braces is an error.
pub fn render_caption(template: &str, fields: &CaptionFields<'_>) -> Result<String, CaptionError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(CaptionError::UnmatchedBrace('{')),
                        Some(ch) => name.push(ch),
                    }
                }

                if name.contains([':', '!']) {
                    return Err(CaptionError::FormatSpec(name));
                }
                if name.is_empty() || name.chars().all(|ch| ch.is_ascii_digit()) {
                    return Err(CaptionError::Positional);
                }
                out.push_str(fields.get(&name)?);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(CaptionError::UnmatchedBrace('}')),
            _ => out.push(c),
        }
    }

    Ok(out)
}
