use std::fmt;

/// A copy of an input line limited to a fixed number of bytes.
///
/// Text longer than the capacity is cut at the last character boundary
/// that still fits, so the stored value is always valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedLine {
    text: String,
    truncated: bool,
}

impl BoundedLine {
    pub fn new(text: &str, capacity: usize) -> Self {
        if text.len() <= capacity {
            return Self {
                text: text.to_string(),
                truncated: false,
            };
        }
        let mut end = capacity;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            text: text[..end].to_string(),
            truncated: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn was_truncated(&self) -> bool {
        self.truncated
    }
}

impl fmt::Display for BoundedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_line_is_kept() {
        let line = BoundedLine::new("sleep 5 &", 80);
        assert_eq!(line.as_str(), "sleep 5 &");
        assert!(!line.was_truncated());
    }

    #[test]
    fn test_long_line_is_truncated() {
        let line = BoundedLine::new("abcdefgh", 5);
        assert_eq!(line.as_str(), "abcde");
        assert!(line.was_truncated());
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // 'é' is two bytes; cutting at 2 would split it.
        let line = BoundedLine::new("aé", 2);
        assert_eq!(line.as_str(), "a");
        assert!(line.was_truncated());
    }
}
