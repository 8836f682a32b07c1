//! Process-wide window title with per-item fragments

/// Window title built from a base plus one bracketed fragment per item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTitle {
    text: String,
}

impl WindowTitle {
    pub fn new(base: impl Into<String>) -> Self {
        Self { text: base.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Append `" [<label>]"` and return the fragment for later removal
    pub fn append(&mut self, label: &str) -> String {
        let fragment = format!(" [{}]", label);
        self.text.push_str(&fragment);
        fragment
    }

    /// Remove the first exact occurrence of `fragment`
    pub fn remove(&mut self, fragment: &str) -> bool {
        match self.text.find(fragment) {
            Some(start) => {
                self.text.replace_range(start..start + fragment.len(), "");
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_then_remove_restores_title() {
        let mut title = WindowTitle::new("broadcast");
        let screen = title.append("Display 1");
        let camera = title.append("FaceTime HD Camera");
        assert_eq!(title.as_str(), "broadcast [Display 1] [FaceTime HD Camera]");

        assert!(title.remove(&screen));
        assert_eq!(title.as_str(), "broadcast [FaceTime HD Camera]");
        assert!(title.remove(&camera));
        assert_eq!(title.as_str(), "broadcast");
        assert!(!title.remove(&camera));
    }

    #[test]
    fn test_duplicate_labels_remove_one_at_a_time() {
        let mut title = WindowTitle::new("t");
        let a = title.append("cam");
        let b = title.append("cam");
        assert!(title.remove(&b));
        assert_eq!(title.as_str(), "t [cam]");
        assert!(title.remove(&a));
        assert_eq!(title.as_str(), "t");
    }
}
