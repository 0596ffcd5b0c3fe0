//! Terminal input: turns typed lines into client commands

use shared::BROADCAST_ROUTE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send `body` on `route`
    Send { route: String, body: Vec<u8> },
    /// Close the session and exit
    Quit,
    /// Switch the route used for plain lines
    SetRoute(String),
    Ignore,
}

/// Interprets lines typed by the user.
///
/// Plain lines are sent on the current route. Lines starting with `/` are
/// commands: `/quit`, `/route <name>`, `/to <route> <text>`. A line of `//`
/// followed by text sends the text with a single leading slash.
pub struct InputParser {
    route: String,
}

impl InputParser {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn parse(&mut self, line: &str) -> Command {
        let line = line.trim_end_matches(&['\r', '\n'][..]);

        if let Some(escaped) = line.strip_prefix("//") {
            return self.send_on_current(format!("/{}", escaped));
        }

        let Some(command) = line.strip_prefix('/') else {
            if line.is_empty() {
                return Command::Ignore;
            }
            return self.send_on_current(line.to_string());
        };

        let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
        match name {
            "quit" | "exit" => Command::Quit,
            "route" if !rest.trim().is_empty() => {
                self.route = rest.trim().to_string();
                Command::SetRoute(self.route.clone())
            }
            "to" => match rest.split_once(' ') {
                Some((route, text)) if !route.is_empty() => Command::Send {
                    route: route.to_string(),
                    body: text.as_bytes().to_vec(),
                },
                _ => Command::Ignore,
            },
            _ => Command::Ignore,
        }
    }

    fn send_on_current(&self, text: String) -> Command {
        Command::Send {
            route: self.route.clone(),
            body: text.into_bytes(),
        }
    }
}

impl Default for InputParser {
    fn default() -> Self {
        Self::new(BROADCAST_ROUTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line_uses_broadcast_route() {
        let mut parser = InputParser::default();
        assert_eq!(
            parser.parse("hello there\n"),
            Command::Send {
                route: "sendMessage".to_string(),
                body: b"hello there".to_vec(),
            }
        );
    }

    #[test]
    fn test_empty_line_is_ignored() {
        let mut parser = InputParser::default();
        assert_eq!(parser.parse(""), Command::Ignore);
        assert_eq!(parser.parse("\r\n"), Command::Ignore);
    }

    #[test]
    fn test_quit() {
        let mut parser = InputParser::default();
        assert_eq!(parser.parse("/quit"), Command::Quit);
        assert_eq!(parser.parse("/exit"), Command::Quit);
    }

    #[test]
    fn test_route_switch() {
        let mut parser = InputParser::default();
        assert_eq!(parser.parse("/route ping"), Command::SetRoute("ping".to_string()));
        assert_eq!(parser.route(), "ping");
        assert!(matches!(parser.parse("hi"), Command::Send { route, .. } if route == "ping"));
    }

    #[test]
    fn test_route_without_name_is_ignored() {
        let mut parser = InputParser::default();
        assert_eq!(parser.parse("/route"), Command::Ignore);
        assert_eq!(parser.route(), "sendMessage");
    }

    #[test]
    fn test_one_off_route() {
        let mut parser = InputParser::default();
        assert_eq!(
            parser.parse("/to $default hi all"),
            Command::Send {
                route: "$default".to_string(),
                body: b"hi all".to_vec(),
            }
        );
        assert_eq!(parser.route(), "sendMessage");
    }

    #[test]
    fn test_escaped_slash() {
        let mut parser = InputParser::default();
        assert_eq!(
            parser.parse("//shrug"),
            Command::Send {
                route: "sendMessage".to_string(),
                body: b"/shrug".to_vec(),
            }
        );
    }
}
