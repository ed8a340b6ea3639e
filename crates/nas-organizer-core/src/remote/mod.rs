//! Script execution on the NAS.

pub mod channel;
pub mod process;

pub use channel::{CancellationToken, ExecResult, RemoteChannel, UNKNOWN_EXIT_STATUS};
pub use process::{ProcessChannel, Transport};
