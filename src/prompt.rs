/// Free text describing the scene to generate.
///
/// Input longer than the limit is truncated, never rejected. Lengths are counted
/// in characters, not bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt {
    text: String,
    max_chars: usize,
    truncated: bool,
}

impl Prompt {
    pub fn new(max_chars: usize) -> Self {
        Self {
            text: String::new(),
            max_chars,
            truncated: false,
        }
    }

    /// Replaces the text, truncating it to the limit.
    pub fn set(&mut self, text: &str) -> &Self {
        match text.char_indices().nth(self.max_chars) {
            Some((cut, _)) => {
                log::debug!("Prompt truncated to {} characters", self.max_chars);
                self.text = text[..cut].to_string();
                self.truncated = true;
            }
            None => {
                self.text = text.to_string();
                self.truncated = false;
            }
        }
        self
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// No trimming: whitespace counts as content.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether the last `set` dropped characters.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    /// Live counter, e.g. `"42/500 characters"`.
    pub fn counter(&self) -> String {
        format!("{}/{} characters", self.char_count(), self.max_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_text_within_limit() {
        let mut prompt = Prompt::new(500);
        prompt.set("wireless headphones, cafe");
        assert_eq!(prompt.as_str(), "wireless headphones, cafe");
        assert!(!prompt.was_truncated());
        assert_eq!(prompt.counter(), "25/500 characters");
    }

    #[test]
    fn truncates_on_char_boundary() {
        let mut prompt = Prompt::new(3);
        prompt.set("café au lait");
        assert_eq!(prompt.as_str(), "caf");
        prompt.set("ééééé");
        assert_eq!(prompt.as_str(), "ééé");
        assert_eq!(prompt.char_count(), 3);
        assert!(prompt.was_truncated());
    }

    #[test]
    fn exact_limit_is_not_truncated() {
        let mut prompt = Prompt::new(4);
        prompt.set("abcd");
        assert_eq!(prompt.as_str(), "abcd");
        assert!(!prompt.was_truncated());
    }

    #[test]
    fn whitespace_is_not_empty() {
        let mut prompt = Prompt::new(500);
        assert!(prompt.is_empty());
        prompt.set(" ");
        assert!(!prompt.is_empty());
    }
}
