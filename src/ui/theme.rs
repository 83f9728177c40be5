use ratatui::style::{Color, Modifier, Style};

/// Styles used when drawing markdown blocks and transcript entries.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub text_style: Style,
    pub heading_style: Style,
    pub bullet_style: Style,
    pub code_style: Style,
    pub inline_code_style: Style,

    // Table cards
    pub card_label_style: Style,
    pub card_separator_style: Style,
    pub card_value_style: Style,
    pub card_lead_style: Style,

    // Transcript chrome
    pub user_prefix_style: Style,
    pub model_prefix_style: Style,
    pub citation_style: Style,
    pub error_style: Style,
}

impl Theme {
    pub fn dark_default() -> Self {
        Theme {
            text_style: Style::default().fg(Color::White),
            heading_style: Style::default()
                .fg(Color::LightYellow)
                .add_modifier(Modifier::BOLD),
            bullet_style: Style::default().fg(Color::Yellow),
            code_style: Style::default().fg(Color::Gray).bg(Color::Rgb(30, 30, 30)),
            inline_code_style: Style::default().fg(Color::LightCyan),

            card_label_style: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
            card_separator_style: Style::default().fg(Color::DarkGray),
            card_value_style: Style::default().fg(Color::White),
            card_lead_style: Style::default()
                .fg(Color::LightYellow)
                .add_modifier(Modifier::BOLD),

            user_prefix_style: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            model_prefix_style: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
            citation_style: Style::default().fg(Color::Blue),
            error_style: Style::default().fg(Color::LightRed),
        }
    }

    pub fn light() -> Self {
        Theme {
            text_style: Style::default().fg(Color::Black),
            heading_style: Style::default()
                .fg(Color::Rgb(128, 64, 0))
                .add_modifier(Modifier::BOLD),
            bullet_style: Style::default().fg(Color::Rgb(128, 64, 0)),
            code_style: Style::default().fg(Color::Black).bg(Color::Rgb(235, 235, 235)),
            inline_code_style: Style::default().fg(Color::Blue),

            card_label_style: Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
            card_separator_style: Style::default().fg(Color::Gray),
            card_value_style: Style::default().fg(Color::Black),
            card_lead_style: Style::default()
                .fg(Color::Rgb(128, 64, 0))
                .add_modifier(Modifier::BOLD),

            user_prefix_style: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::BOLD),
            model_prefix_style: Style::default()
                .fg(Color::Rgb(128, 64, 0))
                .add_modifier(Modifier::BOLD),
            citation_style: Style::default().fg(Color::Blue),
            error_style: Style::default().fg(Color::Red),
        }
    }

    /// Modifiers only, no colors. Used when stdout is not a terminal.
    pub fn monochrome() -> Self {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        Theme {
            text_style: Style::default(),
            heading_style: bold,
            bullet_style: Style::default(),
            code_style: Style::default(),
            inline_code_style: Style::default(),

            card_label_style: bold,
            card_separator_style: Style::default(),
            card_value_style: Style::default(),
            card_lead_style: bold,

            user_prefix_style: bold,
            model_prefix_style: bold,
            citation_style: Style::default(),
            error_style: bold,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "dark" | "default" | "default-dark" => Self::dark_default(),
            "light" => Self::light(),
            "plain" | "mono" | "monochrome" => Self::monochrome(),
            // Fallback
            _ => Self::dark_default(),
        }
    }
}
