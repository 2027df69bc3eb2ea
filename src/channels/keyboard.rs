//! Reply keyboards in the VK bot keyboard JSON format.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonColor {
    Primary,
    Secondary,
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: String,
    pub label: String,
}

/// A text button; pressing it sends its label as a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub action: ButtonAction,
    pub color: ButtonColor,
}

impl Button {
    pub fn text(label: &str, color: ButtonColor) -> Self {
        Self {
            action: ButtonAction {
                kind: "text".to_string(),
                payload: String::new(),
                label: label.to_string(),
            },
            color,
        }
    }

    pub fn label(&self) -> &str {
        &self.action.label
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub one_time: bool,
    /// Rows of buttons.
    pub buttons: Vec<Vec<Button>>,
}

impl Keyboard {
    /// A persistent keyboard with one button per row.
    pub fn column(buttons: Vec<Button>) -> Self {
        Self {
            one_time: false,
            buttons: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.buttons.iter().flatten().map(Button::label)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_vk_format() {
        let kb = Keyboard::column(vec![
            Button::text("Да", ButtonColor::Positive),
            Button::text("Нет", ButtonColor::Negative),
        ]);
        let value: serde_json::Value = serde_json::from_str(&kb.to_json()).unwrap();

        assert_eq!(value["one_time"], false);
        assert_eq!(value["buttons"][0][0]["action"]["type"], "text");
        assert_eq!(value["buttons"][0][0]["action"]["label"], "Да");
        assert_eq!(value["buttons"][0][0]["action"]["payload"], "");
        assert_eq!(value["buttons"][0][0]["color"], "positive");
        assert_eq!(value["buttons"][1][0]["color"], "negative");
    }

    #[test]
    fn labels_walk_rows_in_order() {
        let kb = Keyboard::column(vec![
            Button::text("a", ButtonColor::Primary),
            Button::text("b", ButtonColor::Secondary),
        ]);
        assert_eq!(kb.labels().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
