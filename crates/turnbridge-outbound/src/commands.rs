/// Slash commands intercepted before the normal send path. Commands never
/// carry images; callers strip attachments when a command matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashCommand {
    New,
    Fork,
    Review,
    Resume,
    Status,
    Mcp,
    Export,
    Import,
    Lsp,
    Share,
}

impl SlashCommand {
    const TABLE: [(&'static str, SlashCommand); 10] = [
        ("/new", SlashCommand::New),
        ("/fork", SlashCommand::Fork),
        ("/review", SlashCommand::Review),
        ("/resume", SlashCommand::Resume),
        ("/status", SlashCommand::Status),
        ("/mcp", SlashCommand::Mcp),
        ("/export", SlashCommand::Export),
        ("/import", SlashCommand::Import),
        ("/lsp", SlashCommand::Lsp),
        ("/share", SlashCommand::Share),
    ];

    pub fn prefix(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(_, command)| *command == self)
            .map(|(prefix, _)| *prefix)
            .unwrap_or("/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    /// Text after the command token, trimmed. Empty for a bare command.
    pub rest: String,
}

/// Match `text` against the fixed command table. The command must be the
/// first whitespace-delimited token; `/newer thing` is not `/new`.
pub fn parse_slash_command(text: &str) -> Option<ParsedCommand> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('/') {
        return None;
    }
    let token_end = trimmed
        .find(char::is_whitespace)
        .unwrap_or(trimmed.len());
    let token = &trimmed[..token_end];
    let command = SlashCommand::TABLE
        .iter()
        .find(|(prefix, _)| *prefix == token)
        .map(|(_, command)| *command)?;
    Some(ParsedCommand {
        command,
        rest: trimmed[token_end..].trim().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::{parse_slash_command, SlashCommand};

    #[test]
    fn bare_commands_parse_with_empty_rest() {
        let parsed = parse_slash_command("/new").expect("parsed");
        assert_eq!(parsed.command, SlashCommand::New);
        assert_eq!(parsed.rest, "");
    }

    #[test]
    fn trailing_text_is_preserved_and_trimmed() {
        let parsed = parse_slash_command("/new   fix the login bug  ").expect("parsed");
        assert_eq!(parsed.command, SlashCommand::New);
        assert_eq!(parsed.rest, "fix the login bug");
    }

    #[test]
    fn prefix_must_be_a_whole_token() {
        assert!(parse_slash_command("/newer thing").is_none());
        assert!(parse_slash_command("say /new").is_none());
        assert!(parse_slash_command("plain text").is_none());
    }

    #[test]
    fn every_table_entry_round_trips() {
        for (prefix, command) in SlashCommand::TABLE {
            let parsed = parse_slash_command(prefix).expect("parsed");
            assert_eq!(parsed.command, command);
            assert_eq!(command.prefix(), prefix);
        }
    }
}
