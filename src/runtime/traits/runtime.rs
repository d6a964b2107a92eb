//! Backend identity

use crate::error::Result;

/// A backend: where matrix buffers live and who solves on them
///
/// Everything is static dispatch; the operators are generic over the client
/// and compiled once per backend.
///
/// - `Device`: one memory space (heap, GPU 0, GPU 1, ...)
/// - `Client`: stream, library handles and buffer manager for one device
/// - `Allocator`: raw memory behind the buffer manager and solver scratch
///
/// ```
/// use densolve::prelude::*;
///
/// let device = CpuRuntime::default_device();
/// let ptr = CpuRuntime::allocate(16, &device)?;
/// CpuRuntime::copy_to_device(bytemuck::cast_slice(&[1.0f32, 2.0, 3.0, 4.0]), ptr, &device)?;
/// let mut back = [0.0f32; 4];
/// CpuRuntime::copy_from_device(ptr, bytemuck::cast_slice_mut(&mut back), &device)?;
/// CpuRuntime::deallocate(ptr, 16, &device);
/// assert_eq!(back, [1.0, 2.0, 3.0, 4.0]);
/// # Ok::<(), densolve::error::Error>(())
/// ```
pub trait Runtime: Clone + Send + Sync + 'static {
    /// Device identifier type
    type Device: super::Device;

    /// Client for dispatching operations
    type Client: super::RuntimeClient<Self>;

    /// Memory allocator type
    type Allocator: crate::runtime::Allocator;

    /// Short backend name used in logs
    fn name() -> &'static str;

    /// Allocate device memory
    ///
    /// Returns a device pointer (u64), or `0` for a zero-sized request.
    /// Returns `Err(OutOfMemory)` if allocation fails. Never retries.
    fn allocate(size_bytes: usize, device: &Self::Device) -> Result<u64>;

    /// Deallocate device memory
    fn deallocate(ptr: u64, size_bytes: usize, device: &Self::Device);

    /// Copy data from host to device
    ///
    /// Returns `Err(Transfer)` if the copy fails.
    fn copy_to_device(src: &[u8], dst: u64, device: &Self::Device) -> Result<()>;

    /// Copy data from device to host
    ///
    /// Returns `Err(Transfer)` if the copy fails.
    fn copy_from_device(src: u64, dst: &mut [u8], device: &Self::Device) -> Result<()>;

    /// Copy data within device (device to device)
    ///
    /// Returns `Err(Transfer)` if the copy fails.
    fn copy_within_device(
        src: u64,
        dst: u64,
        size_bytes: usize,
        device: &Self::Device,
    ) -> Result<()>;

    /// Get the default device
    fn default_device() -> Self::Device;

    /// Get the default client for a device
    ///
    /// Fails with `Err(Backend)` if the device context or a library handle
    /// cannot be created.
    fn default_client(device: &Self::Device) -> Result<Self::Client>;
}
