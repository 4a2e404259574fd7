use crate::Error;
use crate::statement::Statement;

pub const RDFA_CONTENT_TYPE: &str = "text/html+rdfa";
pub const MICRODATA_CONTENT_TYPE: &str = "text/html+microdata";

/// A pull-based source of statements.
///
/// ```no_run
/// # use htmlrdf::{Decoder, Document, RdfaDecoder};
/// # let document = Document::parse(b"", Default::default()).unwrap();
/// let mut decoder = RdfaDecoder::new(&document, Default::default());
/// while decoder.advance() {
///     println!("{}", decoder.current().unwrap());
/// }
/// if let Some(error) = decoder.error() {
///     eprintln!("{error}");
/// }
/// ```
pub trait Decoder {
    /// Moves to the next statement, returning `false` once there are none
    /// left or extraction has failed.
    fn advance(&mut self) -> bool;

    /// The statement moved to by the last successful [`Decoder::advance`].
    fn current(&self) -> Option<&Statement>;

    /// The error that ended extraction, if any. Once set, it stays set.
    fn error(&self) -> Option<&Error>;

    fn content_type(&self) -> &'static str;
}

/// The shared "walk once, then replay" state of a decoder.
#[derive(Debug, Default)]
pub(crate) enum Replay {
    #[default]
    Pending,
    Draining {
        rest: std::vec::IntoIter<Statement>,
        current: Option<Statement>,
    },
    // the error is moved out when the decoder is used as an iterator
    Failed(Option<Error>),
}

impl Replay {
    pub(crate) fn advance(&mut self, walk: impl FnOnce() -> Result<Vec<Statement>, Error>) -> bool {
        if let Replay::Pending = self {
            *self = match walk() {
                Ok(statements) => {
                    tracing::debug!(count = statements.len(), "extracted statements");
                    Replay::Draining {
                        rest: statements.into_iter(),
                        current: None,
                    }
                }
                Err(error) => {
                    tracing::debug!(%error, "extraction failed");
                    Replay::Failed(Some(error))
                }
            };
        }

        match self {
            Replay::Draining { rest, current } => {
                *current = rest.next();
                current.is_some()
            }
            Replay::Pending | Replay::Failed(_) => false,
        }
    }

    pub(crate) fn current(&self) -> Option<&Statement> {
        match self {
            Replay::Draining { current, .. } => current.as_ref(),
            Replay::Pending | Replay::Failed(_) => None,
        }
    }

    pub(crate) fn error(&self) -> Option<&Error> {
        match self {
            Replay::Failed(error) => error.as_ref(),
            Replay::Pending | Replay::Draining { .. } => None,
        }
    }

    /// [`Iterator::next`] in terms of [`Replay::advance`]: a failure is
    /// yielded once, after which iteration ends.
    pub(crate) fn next(
        &mut self,
        walk: impl FnOnce() -> Result<Vec<Statement>, Error>,
    ) -> Option<Result<Statement, Error>> {
        if self.advance(walk) {
            if let Replay::Draining { current, .. } = self {
                return current.take().map(Ok);
            }
        }

        match self {
            Replay::Failed(error) => error.take().map(Err),
            Replay::Pending | Replay::Draining { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(n: usize) -> Statement {
        Statement::new(oxrdf::Triple::new(
            oxrdf::NamedNode::new_unchecked(format!("http://example.org/{n}")),
            oxrdf::NamedNode::new_unchecked("http://example.org/p"),
            oxrdf::Literal::from(n.to_string()),
        ))
    }

    #[test]
    fn walks_only_once() {
        let mut replay = Replay::default();
        let mut walks = 0;
        let mut walk = || {
            walks += 1;
            Ok(vec![statement(0), statement(1)])
        };

        assert!(replay.advance(&mut walk));
        assert_eq!(replay.current(), Some(&statement(0)));
        assert!(replay.advance(&mut walk));
        assert_eq!(replay.current(), Some(&statement(1)));
        assert!(!replay.advance(&mut walk));
        assert!(!replay.advance(&mut walk));
        assert_eq!(replay.current(), None);
        assert_eq!(walks, 1);
    }

    #[test]
    fn failure_is_sticky() {
        let mut replay = Replay::default();
        let fail = || {
            Err(Error::InvalidBase {
                source: oxiri::Iri::parse("nope").unwrap_err(),
                base: "nope".to_string(),
            })
        };

        assert!(!replay.advance(fail));
        assert!(replay.error().is_some());
        assert!(!replay.advance(|| Ok(vec![statement(0)])));
        assert!(replay.error().is_some());

        assert!(matches!(
            replay.next(|| Ok(Vec::new())),
            Some(Err(Error::InvalidBase { .. }))
        ));
        assert!(replay.next(|| Ok(Vec::new())).is_none());
    }
}
