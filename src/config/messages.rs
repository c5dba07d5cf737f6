//! Reply templates.
//!
//! Every text the bot sends can be overridden from the environment. Templates
//! use `{name}` placeholders; the ones that only depend on settings are
//! filled in once at load time, the per-user ones when a reply is built.

use serde::{Deserialize, Serialize};

use super::BotSettings;

/// Reply templates used by the command handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Messages {
    pub start: String,
    pub help: String,
    pub select_marker_color: String,
    pub insert_separator: String,
    /// Contains `{m_color}`.
    pub marker_color_updated: String,
    /// Contains `{c_separator}`.
    pub separator_updated: String,
    pub color_timeout: String,
    pub separator_timeout: String,
    pub end_conversation: String,
    pub edl_file_error: String,
    pub upload_edl_file: String,
    pub ram_full: String,
    pub error: String,
    pub donate: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            start: "Hi! Send me an .edl file exported from DaVinci Resolve and I will turn its \
                    markers into a chapter list.\n\n\
                    Use {MARKERS_COLOR_BUTTON} to pick the marker color and \
                    {CHAPTERS_SEPARATOR_BUTTON} to pick the separator. \
                    Prompts expire after {GLOBAL_TTL} seconds. \
                    Press {HELP_BUTTON} for more."
                .to_owned(),
            help: "1. Add markers to your timeline in DaVinci Resolve.\n\
                   2. Export them as an EDL file (Timeline > Export > Timeline Markers to EDL).\n\
                   3. Send the file here.\n\n\
                   Only markers of your chosen color become chapters. \
                   /color and /separator change your settings, /end cancels a prompt. \
                   Prompts expire after {GLOBAL_TTL} seconds."
                .to_owned(),
            select_marker_color: "Choose the marker color:".to_owned(),
            insert_separator: "Send the separator to put between time and title:".to_owned(),
            marker_color_updated: "Marker color set to {m_color}.".to_owned(),
            separator_updated: "Chapter separator set to {c_separator}.".to_owned(),
            color_timeout: "No color chosen within {ttl} seconds, nothing changed.".to_owned(),
            separator_timeout: "No separator received within {ttl} seconds, nothing changed."
                .to_owned(),
            end_conversation: "Ok, nothing changed.".to_owned(),
            edl_file_error: "Could not find any chapter in this file. \
                             Check the marker color and that the file is a marker EDL."
                .to_owned(),
            upload_edl_file: "Please upload a file with the .edl extension.".to_owned(),
            ram_full: "The server is busy right now, please try again in a few minutes."
                .to_owned(),
            error: "Something went wrong, please try again.".to_owned(),
            donate: "If this bot saves you time, consider supporting it.".to_owned(),
        }
    }
}

impl Messages {
    /// Loads templates from the environment, falling back to the defaults,
    /// and fills in the placeholders that depend on `settings`.
    #[must_use]
    pub fn from_env_with_defaults(settings: &BotSettings) -> Self {
        let defaults = Self::default();
        let var = |name: &str, default: String| std::env::var(name).unwrap_or(default);

        let messages = Self {
            start: var("START_MESSAGE", defaults.start),
            help: var("HELP_MESSAGE", defaults.help),
            select_marker_color: var("SELECT_MARKERS_COLOR_MESSAGE", defaults.select_marker_color),
            insert_separator: var("INSERT_SEPARATOR_MESSAGE", defaults.insert_separator),
            marker_color_updated: var("MARKERS_COLOR_UPDATED_MESSAGE", defaults.marker_color_updated),
            separator_updated: var("CHAPTERS_SEPARATOR_UPDATED_MESSAGE", defaults.separator_updated),
            color_timeout: var("COLOR_TIMEOUT_MESSAGE", defaults.color_timeout),
            separator_timeout: var("SEPARATOR_TIMEOUT_MESSAGE", defaults.separator_timeout),
            end_conversation: var("END_CONVERSATION_MESSAGE", defaults.end_conversation),
            edl_file_error: var("EDL_FILE_ERROR_MESSAGE", defaults.edl_file_error),
            upload_edl_file: var("UPLOAD_EDL_FILE_MESSAGE", defaults.upload_edl_file),
            ram_full: var("RAM_FULL_MESSAGE", defaults.ram_full),
            error: var("ERROR_MESSAGE", defaults.error),
            donate: var("DONATE_MESSAGE", defaults.donate),
        };

        messages.resolved(settings)
    }

    /// Fills in the settings-dependent placeholders.
    #[must_use]
    pub fn resolved(self, settings: &BotSettings) -> Self {
        let ttl = settings.conversation_ttl_secs.to_string();
        let buttons = &settings.buttons;
        let fill = |template: String| {
            render(
                &template,
                &[
                    ("ttl", &ttl),
                    ("GLOBAL_TTL", &ttl),
                    ("MARKERS_COLOR_BUTTON", &buttons.marker_color),
                    ("CHAPTERS_SEPARATOR_BUTTON", &buttons.separator),
                    ("HELP_BUTTON", &buttons.help),
                ],
            )
        };

        Self {
            start: fill(self.start),
            help: fill(self.help),
            color_timeout: fill(self.color_timeout),
            separator_timeout: fill(self.separator_timeout),
            ..self
        }
    }

    /// Builds the "color updated" reply.
    #[must_use]
    pub fn marker_color_updated(&self, color: &str) -> String {
        render(&self.marker_color_updated, &[("m_color", color)])
    }

    /// Builds the "separator updated" reply.
    #[must_use]
    pub fn separator_updated(&self, separator: &str) -> String {
        render(&self.separator_updated, &[("c_separator", separator)])
    }
}

/// Replaces `{name}` placeholders in a single pass, so substituted values
/// are never scanned for further placeholders.
fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let substituted = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        if let Some((value, close)) = substituted {
            out.push_str(value);
            rest = &after[close + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_known_and_unknown_placeholders() {
        assert_eq!(render("a {x} b {y}", &[("x", "1")]), "a 1 b {y}");
        assert_eq!(render("{x}{x}", &[("x", "ab")]), "abab");
        assert_eq!(render("no braces", &[("x", "1")]), "no braces");
        assert_eq!(render("open { only", &[]), "open { only");
    }

    #[test]
    fn test_render_does_not_rescan_values() {
        assert_eq!(render("{c_separator}", &[("c_separator", "{c_separator}")]), "{c_separator}");
    }

    #[test]
    fn test_resolved_fills_settings_placeholders() {
        let settings = BotSettings {
            conversation_ttl_secs: 45,
            ..BotSettings::default()
        };
        let messages = Messages::default().resolved(&settings);

        assert!(messages.color_timeout.contains("45 seconds"));
        assert!(messages.help.contains("45 seconds"));
        assert!(messages.start.contains(&settings.buttons.marker_color));
        assert!(!messages.start.contains("{HELP_BUTTON}"));
        // Per-user placeholders survive until reply time.
        assert!(messages.marker_color_updated.contains("{m_color}"));
    }

    #[test]
    fn test_per_user_replies() {
        let messages = Messages::default();
        assert_eq!(messages.marker_color_updated("Mint"), "Marker color set to Mint.");
        assert_eq!(messages.separator_updated("{ttl}"), "Chapter separator set to {ttl}.");
    }
}
