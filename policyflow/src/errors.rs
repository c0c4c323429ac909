//! Error types for the policyflow framework.
//!
//! Every outcome that travels through a policy chain carries an [`Error`]: a
//! cheaply cloneable, type-erased handle around the user's own error value.
//! The framework adds two error types of its own:
//!
//! - [`RetriesExceededError`] when a retry policy runs out of attempts or time
//! - [`PolicyError`] for invalid configuration and cancelled calls

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A type-erased, cloneable error flowing through a policy chain.
///
/// Any `std::error::Error + Send + Sync + 'static` converts into an `Error`,
/// so user functions can use `?` directly. The value is held as a shared
/// [`anyhow::Error`]: it keeps its identity, can be recovered with
/// [`Error::downcast_ref`], and can be searched for along the source chain
/// with [`Error::find`] and [`Error::is`].
#[derive(Clone)]
pub struct Error {
    inner: Arc<anyhow::Error>,
}

impl Error {
    /// Wraps an error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::from_anyhow(anyhow::Error::new(error))
    }

    /// Creates an error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::from_anyhow(anyhow::Error::msg(message.into()))
    }

    /// Shares an existing [`anyhow::Error`].
    #[must_use]
    pub fn from_anyhow(error: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(error),
        }
    }

    /// Returns the underlying [`anyhow::Error`].
    #[must_use]
    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.inner
    }

    /// Returns the wrapped error as a standard error trait object.
    #[must_use]
    pub fn as_std(&self) -> &(dyn StdError + Send + Sync + 'static) {
        <anyhow::Error as AsRef<dyn StdError + Send + Sync + 'static>>::as_ref(&self.inner)
    }

    /// Iterates over the wrapped error and its chain of sources.
    pub fn chain(&self) -> anyhow::Chain<'_> {
        self.inner.chain()
    }

    /// Returns the innermost error of the source chain.
    #[must_use]
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        self.inner.root_cause()
    }

    /// Downcasts the top-level error to a concrete type.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.inner.downcast_ref::<E>()
    }

    /// Finds the first error of type `E` anywhere in the source chain.
    #[must_use]
    pub fn find<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.chain()
            .find_map(|error: &(dyn StdError + 'static)| error.downcast_ref::<E>())
    }

    /// Returns true if any error in the source chain equals `target`.
    #[must_use]
    pub fn is<E>(&self, target: &E) -> bool
    where
        E: StdError + PartialEq + 'static,
    {
        self.chain()
            .any(|error: &(dyn StdError + 'static)| error.downcast_ref::<E>() == Some(target))
    }

    /// Returns true if the source chain contains an error of type `E`.
    #[must_use]
    pub fn is_type<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.find::<E>().is_some()
    }

    /// Returns true if both handles point at the same error value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<E> From<E> for Error
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl AsRef<dyn StdError + Send + Sync + 'static> for Error {
    fn as_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.as_std()
    }
}

impl From<Error> for Box<dyn StdError + Send + Sync + 'static> {
    fn from(error: Error) -> Self {
        Box::new(SharedError(error))
    }
}

/// Boxed view of a shared error, for callers that work with `Box<dyn Error>`.
#[derive(Debug)]
struct SharedError(Error);

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for SharedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.as_std().source()
    }
}

/// Returned when a retry policy gives up while still facing a handled failure.
///
/// The last handled error, if the last attempt produced one, is available
/// through [`RetriesExceededError::cause`] and as the error's `source()`, so
/// chain-aware inspection such as [`Error::is`] still finds it.
#[derive(Debug, Clone)]
pub struct RetriesExceededError {
    attempts: u32,
    cause: Option<Error>,
}

impl RetriesExceededError {
    /// Creates a new exhaustion error.
    #[must_use]
    pub fn new(attempts: u32, cause: Option<Error>) -> Self {
        Self { attempts, cause }
    }

    /// Returns the number of attempts made before giving up.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Returns the last handled error, if the final attempt failed with one.
    ///
    /// `None` means the final attempt returned a result that the policy
    /// classified as a failure.
    #[must_use]
    pub fn cause(&self) -> Option<&Error> {
        self.cause.as_ref()
    }

    /// Consumes the error and returns its cause.
    #[must_use]
    pub fn into_cause(self) -> Option<Error> {
        self.cause
    }
}

impl fmt::Display for RetriesExceededError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "retries exceeded after {} attempts", self.attempts)?;
        if let Some(ref cause) = self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

impl StdError for RetriesExceededError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        let cause: &(dyn StdError + 'static) = self.cause.as_ref()?.as_std();
        Some(cause)
    }
}

/// Errors raised by the framework itself rather than by user operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// A policy builder was given an invalid combination of options.
    #[error("invalid policy configuration: {0}")]
    InvalidConfig(String),

    /// The call was cancelled before its first attempt.
    #[error("execution cancelled: {0}")]
    Cancelled(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("connection refused")]
    struct Refused;

    #[derive(Debug, Error)]
    #[error("request failed")]
    struct RequestFailed {
        #[source]
        source: Refused,
    }

    #[test]
    fn test_error_preserves_identity() {
        let error = Error::new(Refused);
        assert_eq!(error.downcast_ref::<Refused>(), Some(&Refused));
        assert_eq!(error.to_string(), "connection refused");
    }

    #[test]
    fn test_error_is_walks_chain() {
        let error = Error::new(RequestFailed { source: Refused });
        assert!(error.is(&Refused));
        assert!(error.downcast_ref::<Refused>().is_none());
        assert!(error.find::<Refused>().is_some());
        assert_eq!(error.root_cause().to_string(), "connection refused");
        assert_eq!(error.chain().count(), 2);
    }

    #[test]
    fn test_error_clone_shares_value() {
        let error = Error::msg("boom");
        let clone = error.clone();
        assert!(error.ptr_eq(&clone));
        assert!(!error.ptr_eq(&Error::msg("boom")));
    }

    #[test]
    fn test_retries_exceeded_unwraps_to_cause() {
        let exceeded = RetriesExceededError::new(3, Some(Error::new(Refused)));
        assert_eq!(
            exceeded.to_string(),
            "retries exceeded after 3 attempts: connection refused"
        );

        let error = Error::new(exceeded);
        assert!(error.is_type::<RetriesExceededError>());
        assert!(error.is(&Refused));
        assert_eq!(
            error
                .downcast_ref::<RetriesExceededError>()
                .map(RetriesExceededError::attempts),
            Some(3)
        );
    }

    #[test]
    fn test_retries_exceeded_without_cause() {
        let exceeded = RetriesExceededError::new(2, None);
        assert_eq!(exceeded.to_string(), "retries exceeded after 2 attempts");
        assert!(exceeded.source().is_none());
    }

    #[test]
    fn test_message_error() {
        let error = Error::msg("boom");
        assert_eq!(error.to_string(), "boom");
        assert_eq!(error.chain().count(), 1);
        assert_eq!(error.root_cause().to_string(), "boom");
    }

    #[test]
    fn test_from_anyhow_keeps_context() {
        let error = Error::from_anyhow(anyhow::Error::new(Refused).context("dialing backend"));
        assert_eq!(error.to_string(), "dialing backend");
        assert!(error.is(&Refused));
        assert_eq!(error.as_anyhow().chain().count(), 2);
    }

    #[test]
    fn test_policy_error_display() {
        let error = PolicyError::InvalidConfig("max_retries must be >= -1".to_string());
        assert_eq!(
            error.to_string(),
            "invalid policy configuration: max_retries must be >= -1"
        );
    }

    #[test]
    fn test_boxed_error_keeps_message_and_sources() {
        let error = Error::new(RequestFailed { source: Refused });
        let boxed: Box<dyn StdError + Send + Sync> = error.into();
        assert_eq!(boxed.to_string(), "request failed");
        assert_eq!(
            boxed.source().map(ToString::to_string),
            Some("connection refused".to_string())
        );
    }
}
