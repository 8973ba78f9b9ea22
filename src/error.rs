use std::fmt;

/// Invariant violations surfaced by the core itself.
///
/// These are distinct from `io::Error`: they indicate a misuse of the
/// contract between components (double-attach, detach of something never
/// attached, an overread) rather than an environmental failure. In a
/// correct composition none of these should ever be observed; they exist so
/// that misuse fails loudly instead of silently corrupting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// `EventLoop::detach` was called with an fd that has no registration.
    NoSuchRegistration,
    /// A pipe already has a source (or sink) attached.
    EndpointAlreadyAttached,
    /// The endpoint being operated on is not currently attached to a pipe.
    EndpointDetached,
    /// `source_write` was attempted on a pipe that is not writable.
    PipeNotWritable,
    /// `sink_read` was asked for more bytes than the pipe currently holds.
    Overread,
    /// `sink_read`/`sink_drop` were called with a length of zero.
    InvalidLength,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            CoreError::NoSuchRegistration => "no registration for the given fd",
            CoreError::EndpointAlreadyAttached => "pipe already has an endpoint of that role attached",
            CoreError::EndpointDetached => "endpoint is not attached to a pipe",
            CoreError::PipeNotWritable => "pipe is not writable",
            CoreError::Overread => "requested length exceeds buffered length",
            CoreError::InvalidLength => "length must be greater than zero",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for CoreError {}
