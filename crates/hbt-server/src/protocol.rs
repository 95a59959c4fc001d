//! Newline-separated request framing and dispatch onto a graph.
//!
//! A request is everything the client writes before closing its side of the
//! connection: the command word followed by its arguments, one per line.
//!
//! ```text
//! track\n<session>\n<dir>\n<cmd>
//! hint\n<session>\n<dir>
//! end\n<session>
//! del\n<session>\n<dir>\n<cmd>
//! ```
//!
//! Only `hint` produces a response.

use crate::error::ProtocolError;
use hbt_graph::SuggestionGraph;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Track {
        session: String,
        dir: String,
        cmd: String,
    },
    Hint {
        session: String,
        dir: String,
    },
    End {
        session: String,
    },
    Delete {
        session: String,
        dir: String,
        cmd: String,
    },
}

fn check_arity<S: AsRef<str>>(args: &[S], expected: usize) -> Result<(), ProtocolError> {
    if args.len() != expected {
        return Err(ProtocolError::WrongArity {
            command: args[0].as_ref().to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

impl Request {
    /// Parse split fields. `args[0]` is the command word; arity counts
    /// include it.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, ProtocolError> {
        let Some(command) = args.first().map(AsRef::as_ref) else {
            return Err(ProtocolError::MissingCommand);
        };
        let field = |i: usize| args[i].as_ref().to_string();
        match command {
            "" => Err(ProtocolError::MissingCommand),
            "track" => {
                check_arity(args, 4)?;
                Ok(Request::Track {
                    session: field(1),
                    dir: field(2),
                    cmd: field(3),
                })
            }
            "hint" => {
                check_arity(args, 3)?;
                Ok(Request::Hint {
                    session: field(1),
                    dir: field(2),
                })
            }
            "end" => {
                check_arity(args, 2)?;
                Ok(Request::End { session: field(1) })
            }
            "del" => {
                check_arity(args, 4)?;
                Ok(Request::Delete {
                    session: field(1),
                    dir: field(2),
                    cmd: field(3),
                })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }

    /// Decode a raw request body. Invalid UTF-8 is replaced, and a single
    /// trailing newline is ignored.
    pub fn from_wire(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let text = String::from_utf8_lossy(bytes);
        let text = text.strip_suffix('\n').unwrap_or(&text);
        let args: Vec<&str> = text.split('\n').collect();
        Self::parse(&args)
    }

    /// Encode in the framing [`Request::from_wire`] understands.
    pub fn to_wire(&self) -> String {
        let fields: Vec<&str> = match self {
            Request::Track { session, dir, cmd } => vec!["track", session, dir, cmd],
            Request::Hint { session, dir } => vec!["hint", session, dir],
            Request::End { session } => vec!["end", session],
            Request::Delete { session, dir, cmd } => vec!["del", session, dir, cmd],
        };
        fields.join("\n")
    }

    pub fn command(&self) -> &'static str {
        match self {
            Request::Track { .. } => "track",
            Request::Hint { .. } => "hint",
            Request::End { .. } => "end",
            Request::Delete { .. } => "del",
        }
    }

    pub fn session(&self) -> &str {
        match self {
            Request::Track { session, .. }
            | Request::Hint { session, .. }
            | Request::End { session }
            | Request::Delete { session, .. } => session,
        }
    }

    pub fn expects_reply(&self) -> bool {
        matches!(self, Request::Hint { .. })
    }

    /// Whether the request changes state that ends up on disk.
    pub fn mutates_graph(&self) -> bool {
        matches!(self, Request::Track { .. } | Request::Delete { .. })
    }
}

/// Run `request` against `graph`. Returns the reply, if the command has one.
pub fn dispatch<G: SuggestionGraph + ?Sized>(request: Request, graph: &mut G) -> Option<String> {
    match request {
        Request::Track { session, dir, cmd } => {
            graph.track(&session, &dir, &cmd);
            None
        }
        Request::Hint { session, dir } => Some(graph.hint(&session, &dir)),
        Request::End { session } => {
            graph.end(&session);
            None
        }
        Request::Delete { session, dir, cmd } => {
            graph.delete(&session, &dir, &cmd);
            None
        }
    }
}

/// Parse and dispatch in one go.
pub fn process_command<S, G>(args: &[S], graph: &mut G) -> Result<Option<String>, ProtocolError>
where
    S: AsRef<str>,
    G: SuggestionGraph + ?Sized,
{
    let request = Request::parse(args)?;
    Ok(dispatch(request, graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hbt_graph::{Graph, GraphConfig, NO_SUGGESTION};

    fn graph() -> Graph {
        Graph::new(GraphConfig::default())
    }

    #[test]
    fn test_parse_each_command() {
        assert_eq!(
            Request::parse(&["track", "s", "/d", "make"]).unwrap(),
            Request::Track {
                session: "s".into(),
                dir: "/d".into(),
                cmd: "make".into()
            }
        );
        assert_eq!(
            Request::parse(&["hint", "s", "/d"]).unwrap(),
            Request::Hint {
                session: "s".into(),
                dir: "/d".into()
            }
        );
        assert_eq!(
            Request::parse(&["end", "s"]).unwrap(),
            Request::End { session: "s".into() }
        );
        assert_eq!(
            Request::parse(&["del", "s", "/d", "make"]).unwrap(),
            Request::Delete {
                session: "s".into(),
                dir: "/d".into(),
                cmd: "make".into()
            }
        );
    }

    #[test]
    fn test_parse_wrong_arity() {
        let err = Request::parse(&["track", "s", "/d"]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::WrongArity {
                command: "track".into(),
                expected: 4,
                got: 3
            }
        );
        assert_eq!(
            err.to_string(),
            "wrong number of arguments for track, expected 4, got 3"
        );
        assert!(Request::parse(&["hint", "s", "/d", "extra"]).is_err());
        assert!(Request::parse(&["end"]).is_err());
    }

    #[test]
    fn test_parse_missing_and_unknown() {
        let empty: [&str; 0] = [];
        assert_eq!(Request::parse(&empty), Err(ProtocolError::MissingCommand));
        assert_eq!(Request::parse(&[""]), Err(ProtocolError::MissingCommand));
        assert_eq!(
            Request::parse(&["fly", "s"]),
            Err(ProtocolError::UnknownCommand("fly".into()))
        );
    }

    #[test]
    fn test_from_wire() {
        let r = Request::from_wire(b"track\n42\n/home/me\ngit status").unwrap();
        assert_eq!(r.command(), "track");
        assert_eq!(r.session(), "42");

        // Trailing newline is tolerated.
        let r = Request::from_wire(b"hint\n42\n/home/me\n").unwrap();
        assert!(r.expects_reply());

        assert_eq!(Request::from_wire(b""), Err(ProtocolError::MissingCommand));
    }

    #[test]
    fn test_to_wire_is_parseable() {
        let r = Request::Delete {
            session: "7".into(),
            dir: "/tmp".into(),
            cmd: "rm -rf build".into(),
        };
        assert_eq!(r.to_wire(), "del\n7\n/tmp\nrm -rf build");
        assert_eq!(Request::from_wire(r.to_wire().as_bytes()).unwrap(), r);
    }

    #[test]
    fn test_mutates_graph() {
        assert!(Request::parse(&["track", "s", "d", "c"]).unwrap().mutates_graph());
        assert!(Request::parse(&["del", "s", "d", "c"]).unwrap().mutates_graph());
        assert!(!Request::parse(&["hint", "s", "d"]).unwrap().mutates_graph());
        assert!(!Request::parse(&["end", "s"]).unwrap().mutates_graph());
    }

    #[test]
    fn test_process_command_round() {
        let mut g = graph();
        assert_eq!(process_command(&["track", "s", "/d", "make"], &mut g), Ok(None));
        assert_eq!(
            process_command(&["hint", "s", "/d"], &mut g),
            Ok(Some("make".to_string()))
        );
        assert_eq!(process_command(&["del", "s", "/d", "make"], &mut g), Ok(None));
        assert_eq!(
            process_command(&["hint", "s", "/d"], &mut g),
            Ok(Some(NO_SUGGESTION.to_string()))
        );
        assert_eq!(process_command(&["end", "s"], &mut g), Ok(None));
    }

    #[test]
    fn test_process_command_error_leaves_graph_untouched() {
        let mut g = graph();
        assert!(process_command(&["track", "s", "/d"], &mut g).is_err());
        assert!(g.is_empty());
    }

    #[test]
    fn test_dispatch_through_trait_object() {
        let mut g = graph();
        let dyn_g: &mut dyn SuggestionGraph = &mut g;
        dispatch(
            Request::Track {
                session: "s".into(),
                dir: "/d".into(),
                cmd: "ls".into(),
            },
            dyn_g,
        );
        assert_eq!(g.edge("/d", "ls").unwrap().hits(), 1);
    }
}
