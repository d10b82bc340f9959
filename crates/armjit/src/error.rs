use thiserror::Error;

/// `UnimplementedOpcode`/`VerificationFailure` are fatal assertions inside
/// translation/optimization/emission, not recoverable `Error` values — they
/// indicate a bug in this crate, not a guest-triggerable condition, and are
/// raised via `panic!`/`debug_assert!` at the point they're detected.
/// `DecodeMiss` and a cache miss on a link are normal control flow, not
/// errors either. The only condition a caller can legitimately observe
/// and needs to handle is a host callback reporting it can't continue.
#[derive(Debug, Error)]
pub enum Error {
    #[error("host callback reported an unrecoverable fault: {0}")]
    Callback(String),
}
