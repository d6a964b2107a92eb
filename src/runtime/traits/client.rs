//! Per-device client

use super::Runtime;
use crate::error::Result;

/// Handle through which work reaches one device
pub trait RuntimeClient<R: Runtime>: Clone + Send + Sync {
    /// Device this client drives
    fn device(&self) -> &R::Device;

    /// Block until all work queued by this client has finished
    ///
    /// An asynchronous fault from an earlier call surfaces here.
    fn synchronize(&self) -> Result<()>;

    /// Raw allocator, used for scratch memory outside the buffer manager
    fn allocator(&self) -> &R::Allocator;
}
