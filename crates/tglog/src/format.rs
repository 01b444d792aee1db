//! Message decoration.
//!
//! Bodies are rendered as a Markdown code block headed by the sink title so
//! log output keeps its alignment in the chat client.

const FENCE: &str = "```";

/// Wrap `body` for a create or edit request.
pub fn render_message(title: &str, body: &str) -> String {
    format!("{FENCE}\n{title}\n\n{body}\n{FENCE}")
}

/// Text of a freshly created message before its first edit.
pub fn render_placeholder(title: &str) -> String {
    format!("{FENCE}\nInitializing {title}\n{FENCE}")
}

/// Bytes [`render_message`] adds around a body.
pub fn decoration_len(title: &str) -> usize {
    render_message(title, "").len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_message() {
        assert_eq!(render_message("app", "a\nb"), "```\napp\n\na\nb\n```");
    }

    #[test]
    fn test_render_placeholder() {
        assert_eq!(render_placeholder("app"), "```\nInitializing app\n```");
    }

    #[test]
    fn test_decoration_len() {
        assert_eq!(decoration_len("tglog"), 15);
        assert_eq!(
            render_message("tglog", "xyz").len(),
            decoration_len("tglog") + 3
        );
    }
}
