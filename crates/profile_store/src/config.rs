use serde::{Deserialize, Serialize};

pub const DEFAULT_EDITOR: &str = "code";

/// How a bare `whats_next` invocation collects the follow-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Ask a running broker.
    #[default]
    #[serde(rename = "")]
    Unset,
    /// Run the input session in the calling process.
    Native,
    /// Ask a running broker.
    Server,
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub editor: String,
    #[serde(default)]
    pub selected_profile: String,
    #[serde(default)]
    pub mode: Mode,
}

impl Config {
    /// Explicit override, then the configured editor, then [`DEFAULT_EDITOR`].
    #[must_use]
    pub fn editor_or_default(&self, explicit: Option<&str>) -> String {
        explicit
            .filter(|value| !value.trim().is_empty())
            .or_else(|| Some(self.editor.as_str()).filter(|value| !value.trim().is_empty()))
            .unwrap_or(DEFAULT_EDITOR)
            .to_string()
    }

    #[must_use]
    pub fn selected_profile(&self) -> Option<&str> {
        Some(self.selected_profile.as_str()).filter(|name| !name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{Config, Mode};

    #[test]
    fn parses_camel_case_fields_and_empty_mode() {
        let config: Config = serde_json::from_str(
            r#"{"editor":"vim","selectedProfile":"work","mode":""}"#,
        )
        .expect("config should parse");
        assert_eq!(config.editor, "vim");
        assert_eq!(config.selected_profile(), Some("work"));
        assert_eq!(config.mode, Mode::Unset);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{"mode":"native"}"#).expect("parse");
        assert_eq!(config.mode, Mode::Native);
        assert_eq!(config.selected_profile(), None);
        assert_eq!(config.editor_or_default(None), "code");
    }

    #[test]
    fn editor_precedence() {
        let config = Config {
            editor: "nvim".to_string(),
            ..Config::default()
        };
        assert_eq!(config.editor_or_default(Some("emacs")), "emacs");
        assert_eq!(config.editor_or_default(Some(" ")), "nvim");
        assert_eq!(config.editor_or_default(None), "nvim");
    }

    #[test]
    fn serializes_with_original_field_names() {
        let config = Config {
            editor: String::new(),
            selected_profile: "work".to_string(),
            mode: Mode::Server,
        };
        let json = serde_json::to_string(&config).expect("serialize");
        assert_eq!(json, r#"{"editor":"","selectedProfile":"work","mode":"server"}"#);
    }
}
