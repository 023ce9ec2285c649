use thiserror::Error;

/// Errors that can occur when unbinding targets from a delegate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// No slot of the delegate is bound to a receiver at the given address.
    #[error("no slot is bound to the receiver at address {address:#x}")]
    NotBound {
        /// Address of the receiver that was looked up.
        address: usize,
    },

    /// The slot of a handle no longer exists, either because it was unbound through other
    /// means, because its receiver was dropped or because the delegate itself was dropped.
    #[error("the slot referenced by the handle is no longer bound")]
    Detached,
}

/// A specialized `Result` type for delegate operations, returning the crate's [`Error`] type
/// as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn not_bound_reports_address() {
        let error = Error::NotBound { address: 0xbeef };

        assert_eq!(
            error.to_string(),
            "no slot is bound to the receiver at address 0xbeef"
        );
    }

    #[test]
    fn detached_is_error() {
        let result: Result<()> = Err(Error::Detached);

        assert!(matches!(result, Err(Error::Detached)));
    }
}
