//! Key definitions for synthesized keyboard input

/// Everything the input domain needs to synthesize one key press
#[derive(Debug, Clone, Copy)]
pub struct KeyDefinition {
    /// DOM `key` value
    pub key: &'static str,
    /// DOM `code` value
    pub code: &'static str,
    /// Windows virtual key code
    pub key_code: u32,
    /// Text produced by the key, if any
    pub text: Option<&'static str>,
}

/// Named keys accepted by the press-key interaction
pub static KEY_DEFINITIONS: phf::Map<&'static str, KeyDefinition> = phf::phf_map! {
    "Enter" => KeyDefinition { key: "Enter", code: "Enter", key_code: 13, text: Some("\r") },
    "Tab" => KeyDefinition { key: "Tab", code: "Tab", key_code: 9, text: None },
    "Escape" => KeyDefinition { key: "Escape", code: "Escape", key_code: 27, text: None },
    "Backspace" => KeyDefinition { key: "Backspace", code: "Backspace", key_code: 8, text: None },
    "Delete" => KeyDefinition { key: "Delete", code: "Delete", key_code: 46, text: None },
    "Space" => KeyDefinition { key: " ", code: "Space", key_code: 32, text: Some(" ") },
    "ArrowUp" => KeyDefinition { key: "ArrowUp", code: "ArrowUp", key_code: 38, text: None },
    "ArrowDown" => KeyDefinition { key: "ArrowDown", code: "ArrowDown", key_code: 40, text: None },
    "ArrowLeft" => KeyDefinition { key: "ArrowLeft", code: "ArrowLeft", key_code: 37, text: None },
    "ArrowRight" => KeyDefinition { key: "ArrowRight", code: "ArrowRight", key_code: 39, text: None },
    "Home" => KeyDefinition { key: "Home", code: "Home", key_code: 36, text: None },
    "End" => KeyDefinition { key: "End", code: "End", key_code: 35, text: None },
    "PageUp" => KeyDefinition { key: "PageUp", code: "PageUp", key_code: 33, text: None },
    "PageDown" => KeyDefinition { key: "PageDown", code: "PageDown", key_code: 34, text: None },
};

/// Look up a named key
pub fn lookup(name: &str) -> Option<&'static KeyDefinition> {
    KEY_DEFINITIONS.get(name)
}
