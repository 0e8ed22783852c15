//! IRC line parsing and outbound line building.
//!
//! ```text
//! [@tags] [:prefix] COMMAND [params...] [:trailing]
//! ```

use crate::transport::TransportEvent;

/// `RPL_WELCOME`
const RPL_WELCOME: &str = "001";
/// `ERR_NICKNAMEINUSE`
const ERR_NICKNAMEINUSE: &str = "433";

/// CTCP payloads (`ACTION`, `VERSION`, ...) are wrapped in this byte.
const CTCP_DELIM: char = '\u{1}';

/// One parsed protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine {
    pub prefix: Option<String>,
    /// Uppercased command or three-digit numeric.
    pub command: String,
    pub params: Vec<String>,
}

impl IrcLine {
    /// Parse a raw line. Returns `None` for blank lines or a missing command.
    pub fn parse(raw: &str) -> Option<IrcLine> {
        let mut rest = raw.trim_end_matches(['\r', '\n']);

        // Message tags are not used by the bot
        if rest.starts_with('@') {
            rest = rest.split_once(' ').map_or("", |(_, r)| r);
        }
        rest = rest.trim_start_matches(' ');

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, r) = stripped.split_once(' ').unwrap_or((stripped, ""));
            prefix = Some(p.to_string());
            rest = r.trim_start_matches(' ');
        }

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, r) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = r;
        }

        Some(IrcLine {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// Nickname part of a `nick!user@host` prefix.
    pub fn source_nick(&self) -> Option<&str> {
        let prefix = self.prefix.as_deref()?;
        let nick = prefix.split(['!', '@']).next().unwrap_or(prefix);
        (!nick.is_empty()).then_some(nick)
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Map to a transport event, if the bot cares about this line.
    pub fn to_event(&self) -> Option<TransportEvent> {
        match self.command.as_str() {
            RPL_WELCOME => Some(TransportEvent::Welcome),
            ERR_NICKNAMEINUSE => Some(TransportEvent::NicknameInUse),
            "PRIVMSG" => {
                let sender = self.source_nick()?.trim().to_string();
                let target = self.param(0)?;
                let text = self.param(1)?;
                if text.starts_with(CTCP_DELIM) {
                    return None;
                }
                if is_channel_name(target) {
                    Some(TransportEvent::ChannelMessage {
                        sender,
                        channel: target.to_string(),
                        text: text.to_string(),
                    })
                } else {
                    Some(TransportEvent::DirectMessage {
                        sender,
                        text: text.to_string(),
                    })
                }
            }
            _ => None,
        }
    }
}

/// Channel names start with one of the RFC 2812 channel prefixes.
pub fn is_channel_name(target: &str) -> bool {
    target.starts_with(['#', '&', '+', '!'])
}

/// Strip line breaks and NULs, then cut `text` to at most `max_bytes` on a
/// char boundary.
pub fn clean_outbound(text: &str, max_bytes: usize) -> String {
    let mut out = String::with_capacity(text.len().min(max_bytes));
    for ch in text.chars().filter(|c| !matches!(c, '\r' | '\n' | '\0')) {
        if out.len() + ch.len_utf8() > max_bytes {
            break;
        }
        out.push(ch);
    }
    out
}

pub fn nick_command(nickname: &str) -> String {
    format!("NICK {nickname}")
}

pub fn user_command(nickname: &str) -> String {
    format!("USER {nickname} 0 * :{nickname}")
}

pub fn join_command(channel: &str) -> String {
    format!("JOIN {channel}")
}

pub fn privmsg_command(target: &str, text: &str) -> String {
    format!("PRIVMSG {target} :{text}")
}

pub fn pong_command(token: &str) -> String {
    format!("PONG :{token}")
}

pub fn quit_command(message: &str) -> String {
    format!("QUIT :{message}")
}

/// Whether a raw outbound line ends the session.
pub fn is_quit(raw: &str) -> bool {
    raw.split(' ').next() == Some("QUIT")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg() {
        let line = IrcLine::parse(":jane!~jane@host.example PRIVMSG #chan :hello there\r\n").unwrap();
        assert_eq!(line.prefix.as_deref(), Some("jane!~jane@host.example"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params, vec!["#chan", "hello there"]);
        assert_eq!(line.source_nick(), Some("jane"));
    }

    #[test]
    fn test_parse_without_prefix() {
        let line = IrcLine::parse("PING :irc.example.net").unwrap();
        assert_eq!(line.prefix, None);
        assert_eq!(line.command, "PING");
        assert_eq!(line.param(0), Some("irc.example.net"));
    }

    #[test]
    fn test_parse_with_tags_and_numeric() {
        let line =
            IrcLine::parse("@time=2024-01-01T00:00:00Z :irc.example.net 433 * bot :Nickname is already in use")
                .unwrap();
        assert_eq!(line.command, "433");
        assert_eq!(line.params, vec!["*", "bot", "Nickname is already in use"]);
        assert_eq!(line.to_event(), Some(TransportEvent::NicknameInUse));
    }

    #[test]
    fn test_parse_blank() {
        assert!(IrcLine::parse("").is_none());
        assert!(IrcLine::parse("\r\n").is_none());
        assert!(IrcLine::parse(":prefix.only").is_none());
    }

    #[test]
    fn test_welcome_event() {
        let line = IrcLine::parse(":irc.example.net 001 bot :Welcome to the network").unwrap();
        assert_eq!(line.to_event(), Some(TransportEvent::Welcome));
    }

    #[test]
    fn test_channel_and_direct_messages() {
        let line = IrcLine::parse(":jane!j@h PRIVMSG #chan :http://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(
            line.to_event(),
            Some(TransportEvent::ChannelMessage {
                sender: "jane".into(),
                channel: "#chan".into(),
                text: "http://youtu.be/dQw4w9WgXcQ".into(),
            })
        );

        let line = IrcLine::parse(":jane!j@h PRIVMSG bot :hi").unwrap();
        assert_eq!(
            line.to_event(),
            Some(TransportEvent::DirectMessage {
                sender: "jane".into(),
                text: "hi".into(),
            })
        );
    }

    #[test]
    fn test_ctcp_ignored() {
        let line = IrcLine::parse(":jane!j@h PRIVMSG #chan :\u{1}ACTION waves\u{1}").unwrap();
        assert_eq!(line.to_event(), None);
    }

    #[test]
    fn test_other_commands_ignored() {
        let line = IrcLine::parse(":jane!j@h JOIN #chan").unwrap();
        assert_eq!(line.to_event(), None);
    }

    #[test]
    fn test_clean_outbound() {
        assert_eq!(clean_outbound("Title: a\r\nQUIT :x", 400), "Title: aQUIT :x");
        assert_eq!(clean_outbound("abcdef", 4), "abcd");
        // 'é' is two bytes; never split it
        assert_eq!(clean_outbound("abé", 3), "ab");
    }

    #[test]
    fn test_command_builders() {
        assert_eq!(nick_command("bot_"), "NICK bot_");
        assert_eq!(user_command("bot"), "USER bot 0 * :bot");
        assert_eq!(join_command("#chan"), "JOIN #chan");
        assert_eq!(privmsg_command("jane", "Title: x"), "PRIVMSG jane :Title: x");
        assert_eq!(pong_command("irc.example.net"), "PONG :irc.example.net");
        assert_eq!(quit_command("bye"), "QUIT :bye");
    }

    #[test]
    fn test_is_quit() {
        assert!(is_quit("QUIT :bye"));
        assert!(!is_quit("PRIVMSG #chan :QUIT :bye"));
        assert!(!is_quit("QUITTER"));
    }
}
