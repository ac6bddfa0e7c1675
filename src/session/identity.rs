use serde::{Deserialize, Serialize};

/// The signed-in practitioner as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque per-user id; keys the counters record
    pub uid: String,

    /// Exact identity string (sign-in e-mail)
    pub email: String,

    /// Provider-supplied display name, if any
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Name shown to the workflow engine.
    ///
    /// Falls back to the e-mail local part, e.g. `jane.doe@clinic.org` ->
    /// `Jane Doe`.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return name.to_string();
            }
        }

        let local = self.email.split('@').next().unwrap_or_default();
        let words: Vec<String> = local
            .split(['.', '_', '-'])
            .filter(|w| !w.is_empty())
            .map(capitalize)
            .collect();

        if words.is_empty() {
            self.email.clone()
        } else {
            words.join(" ")
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_from_email() {
        let identity = Identity::new("u1", "jane.doe@clinic.org");
        assert_eq!(identity.display_name(), "Jane Doe");

        let identity = Identity::new("u2", "DR_SMITH-JONES@clinic.org");
        assert_eq!(identity.display_name(), "Dr Smith Jones");
    }

    #[test]
    fn test_explicit_display_name_wins() {
        let identity = Identity::new("u1", "jd@clinic.org").with_display_name("Dr. Jane Doe");
        assert_eq!(identity.display_name(), "Dr. Jane Doe");
    }

    #[test]
    fn test_blank_display_name_falls_back() {
        let identity = Identity::new("u1", "mark@clinic.org").with_display_name("  ");
        assert_eq!(identity.display_name(), "Mark");
    }
}
