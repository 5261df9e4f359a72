use crate::task::TaskError;
use std::fmt;

/// Tri-state result capsule: nothing yet, a value, or a captured failure.
///
/// An `Outcome` is how a task's result crosses suspension points and thread
/// boundaries. A failure sits inside the capsule untouched until a consumer
/// asks for the value, at which point it is handed back as an `Err`.
///
/// Outcomes are move-only so that a value or failure is consumed exactly once.
///
/// ```
/// use tessera::Outcome;
///
/// let ok: Outcome<u32> = Outcome::from(Ok(7));
/// assert!(ok.is_value());
/// assert_eq!(ok.value().unwrap(), 7);
///
/// let empty: Outcome<u32> = Outcome::default();
/// assert!(empty.value().is_err());
/// ```
#[derive(Default)]
pub enum Outcome<T> {
    /// Not populated yet.
    #[default]
    Empty,

    /// The computation produced a value.
    Value(T),

    /// The computation failed.
    Failure(anyhow::Error),
}

impl<T> Outcome<T> {
    /// Returns true if the capsule has not been populated.
    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty)
    }

    /// Returns true if the capsule holds a value.
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    /// Returns true if the capsule holds a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Extracts the value, or hands back the captured failure.
    ///
    /// An empty capsule yields [`TaskError::NoValue`], which is never confused
    /// with a failure raised by the computation itself.
    pub fn value(self) -> anyhow::Result<T> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Failure(err) => Err(err),
            Outcome::Empty => Err(TaskError::NoValue.into()),
        }
    }

    /// Borrows the value, if any.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Borrows the captured failure, if any.
    pub fn failure(&self) -> Option<&anyhow::Error> {
        match self {
            Outcome::Failure(err) => Some(err),
            _ => None,
        }
    }

    /// Takes the content out, leaving the capsule empty.
    pub fn take(&mut self) -> Outcome<T> {
        std::mem::take(self)
    }

    /// Maps a value with `f`, passing failures and emptiness through.
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Value(value) => Outcome::Value(f(value)),
            Outcome::Failure(err) => Outcome::Failure(err),
            Outcome::Empty => Outcome::Empty,
        }
    }

    /// Populates an empty capsule. Populating twice is a logic error.
    pub(crate) fn fill(&mut self, res: anyhow::Result<T>) {
        debug_assert!(self.is_empty(), "outcome populated twice");
        *self = Outcome::from(res);
    }
}

impl<T> From<anyhow::Result<T>> for Outcome<T> {
    fn from(res: anyhow::Result<T>) -> Self {
        match res {
            Ok(value) => Outcome::Value(value),
            Err(err) => Outcome::Failure(err),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Outcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Empty => f.write_str("Empty"),
            Outcome::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Outcome::Failure(err) => f.debug_tuple("Failure").field(err).finish(),
        }
    }
}
