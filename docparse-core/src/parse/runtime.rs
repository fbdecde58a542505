use std::future::Future;

use snafu::ResultExt;
use tokio::runtime::Builder;

use crate::error::{DocparseError, RuntimeSnafu};

/// Drives `future` to completion on a fresh multi-thread runtime.
///
/// The runtime is shut down in the background afterwards, so a forward pass
/// that outlived its timeout does not keep the caller waiting.
pub fn block_on<F: Future>(future: F) -> Result<F::Output, DocparseError> {
    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .context(RuntimeSnafu)?;

    let output = runtime.block_on(future);
    runtime.shutdown_background();

    Ok(output)
}
