//! Device Buffer Manager
//!
//! Owns every matrix-sized allocation an operator makes. A [`DeviceBuffer`] is
//! a column-major `f32` matrix in device memory that frees itself exactly once:
//! either on `Drop` or through [`BufferManager::release`], which consumes it.
//! Ownership transfer to a caller is a plain move.

use super::{Allocator, Runtime};
use crate::error::{Error, Result, TransferDirection};
use crate::tensor::{HostMatrix, MatrixDims};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const F32_SIZE: usize = std::mem::size_of::<f32>();

/// Live/total counters shared by a manager and every buffer it issued
#[derive(Debug, Default)]
pub(crate) struct BufferStats {
    live_buffers: AtomicUsize,
    live_bytes: AtomicUsize,
    total_allocations: AtomicUsize,
}

impl BufferStats {
    fn acquired(&self, bytes: usize) {
        self.live_buffers.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.total_allocations.fetch_add(1, Ordering::Relaxed);
    }

    fn released(&self, bytes: usize) {
        self.live_buffers.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }
}

fn byte_len(rows: usize, cols: usize) -> Result<usize> {
    rows.checked_mul(cols)
        .and_then(|n| n.checked_mul(F32_SIZE))
        .ok_or(Error::OutOfMemory { size: usize::MAX })
}

/// Column-major `f32` matrix resident in device memory
///
/// Exclusively owned. Dropping the buffer returns its memory to the allocator
/// it came from.
pub struct DeviceBuffer<R: Runtime> {
    ptr: u64,
    rows: usize,
    cols: usize,
    device: R::Device,
    allocator: R::Allocator,
    stats: Arc<BufferStats>,
}

impl<R: Runtime> DeviceBuffer<R> {
    /// Raw device pointer (0 for an empty matrix)
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.ptr
    }

    /// Number of rows
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// True if the matrix has no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocation size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.len() * F32_SIZE
    }

    /// Device the buffer lives on
    #[inline]
    pub fn device(&self) -> &R::Device {
        &self.device
    }

    /// Download the column-major contents
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        let mut out = vec![0.0f32; self.len()];
        R::copy_from_device(self.ptr, bytemuck::cast_slice_mut(&mut out), &self.device)?;
        Ok(out)
    }

    /// Overwrite the contents with column-major `data`
    pub fn copy_from_slice(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != self.len() {
            return Err(Error::transfer(
                TransferDirection::HostToDevice,
                data.len() * F32_SIZE,
                format!(
                    "source has {} elements, {}x{} buffer holds {}",
                    data.len(),
                    self.rows,
                    self.cols,
                    self.len()
                ),
            ));
        }
        R::copy_to_device(bytemuck::cast_slice(data), self.ptr, &self.device)
    }
}

impl<R: Runtime> MatrixDims for DeviceBuffer<R> {
    fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

impl<R: Runtime> Drop for DeviceBuffer<R> {
    fn drop(&mut self) {
        let bytes = self.size_in_bytes();
        log::trace!(
            "{}: release {}x{} buffer at 0x{:x} ({} bytes)",
            R::name(),
            self.rows,
            self.cols,
            self.ptr,
            bytes
        );
        self.allocator.deallocate(self.ptr, bytes);
        self.stats.released(bytes);
    }
}

impl<R: Runtime> fmt::Debug for DeviceBuffer<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("runtime", &R::name())
            .field("device", &self.device)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("ptr", &format_args!("0x{:x}", self.ptr))
            .finish()
    }
}

/// Allocates, uploads, downloads and releases device matrices
///
/// Clones share the allocator and the ownership counters.
pub struct BufferManager<R: Runtime> {
    device: R::Device,
    allocator: R::Allocator,
    stats: Arc<BufferStats>,
}

impl<R: Runtime> Clone for BufferManager<R> {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            allocator: self.allocator.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<R: Runtime> fmt::Debug for BufferManager<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferManager")
            .field("runtime", &R::name())
            .field("device", &self.device)
            .field("live_buffers", &self.live_buffers())
            .field("live_bytes", &self.live_bytes())
            .finish()
    }
}

impl<R: Runtime> BufferManager<R> {
    /// Create a manager that allocates through `allocator`
    pub fn new(device: R::Device, allocator: R::Allocator) -> Self {
        Self {
            device,
            allocator,
            stats: Arc::new(BufferStats::default()),
        }
    }

    /// Device this manager allocates on
    pub fn device(&self) -> &R::Device {
        &self.device
    }

    /// Allocate an uninitialized `rows x cols` buffer
    ///
    /// Fails with `OutOfMemory`; no pooling and no retry.
    pub fn allocate(&self, rows: usize, cols: usize) -> Result<DeviceBuffer<R>> {
        let bytes = byte_len(rows, cols)?;
        let ptr = self.allocator.allocate(bytes)?;
        self.stats.acquired(bytes);
        log::trace!(
            "{}: allocate {}x{} buffer at 0x{:x} ({} bytes)",
            R::name(),
            rows,
            cols,
            ptr,
            bytes
        );
        Ok(DeviceBuffer {
            ptr,
            rows,
            cols,
            device: self.device.clone(),
            allocator: self.allocator.clone(),
            stats: Arc::clone(&self.stats),
        })
    }

    /// Copy a host matrix to a new column-major device buffer
    ///
    /// The buffer is released again if the copy faults.
    pub fn upload(&self, host: &HostMatrix) -> Result<DeviceBuffer<R>> {
        let (rows, cols) = host.dims();
        let mut buf = self.allocate(rows, cols)?;
        buf.copy_from_slice(&host.col_major_data())?;
        Ok(buf)
    }

    /// Copy a device buffer back to a column-major host matrix
    pub fn download(&self, buf: &DeviceBuffer<R>) -> Result<HostMatrix> {
        HostMatrix::from_col_major(buf.rows, buf.cols, buf.to_vec()?)
    }

    /// Device-to-device clone
    pub fn copy(&self, src: &DeviceBuffer<R>) -> Result<DeviceBuffer<R>> {
        let dst = self.allocate(src.rows, src.cols)?;
        R::copy_within_device(src.ptr, dst.ptr, src.size_in_bytes(), &self.device)?;
        Ok(dst)
    }

    /// Release a buffer now instead of at end of scope
    pub fn release(&self, buf: DeviceBuffer<R>) {
        drop(buf);
    }

    /// Buffers issued by this manager (or its clones) not yet released
    pub fn live_buffers(&self) -> usize {
        self.stats.live_buffers.load(Ordering::Relaxed)
    }

    /// Bytes held by live buffers
    pub fn live_bytes(&self) -> usize {
        self.stats.live_bytes.load(Ordering::Relaxed)
    }

    /// Buffers ever issued
    pub fn total_allocations(&self) -> usize {
        self.stats.total_allocations.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::cpu::{CpuDevice, CpuRuntime};

    fn manager(device: CpuDevice) -> BufferManager<CpuRuntime> {
        crate::runtime::cpu::CpuClient::new(device).buffers().clone()
    }

    #[test]
    fn test_upload_download_is_column_major() {
        let mgr = manager(CpuDevice::new());
        let host = HostMatrix::from_rows(&[&[1.0, 2.0], &[3.0, 4.0], &[5.0, 6.0]]).unwrap();
        let buf = mgr.upload(&host).unwrap();
        assert_eq!(buf.dims(), (3, 2));
        assert_eq!(buf.to_vec().unwrap(), vec![1.0, 3.0, 5.0, 2.0, 4.0, 6.0]);

        let back = mgr.download(&buf).unwrap();
        assert_eq!(back.to_row_major(), host);
    }

    #[test]
    fn test_release_updates_counters() {
        let mgr = manager(CpuDevice::new());
        let a = mgr.allocate(4, 4).unwrap();
        let b = mgr.allocate(2, 1).unwrap();
        assert_eq!(mgr.live_buffers(), 2);
        assert_eq!(mgr.live_bytes(), (16 + 2) * 4);

        mgr.release(a);
        assert_eq!(mgr.live_buffers(), 1);
        drop(b);
        assert_eq!(mgr.live_buffers(), 0);
        assert_eq!(mgr.live_bytes(), 0);
        assert_eq!(mgr.total_allocations(), 2);
    }

    #[test]
    fn test_copy_is_independent() {
        let mgr = manager(CpuDevice::new());
        let mut a = mgr.allocate(2, 2).unwrap();
        a.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = mgr.copy(&a).unwrap();
        a.copy_from_slice(&[0.0; 4]).unwrap();
        assert_eq!(b.to_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_copy_from_slice_length_mismatch() {
        let mgr = manager(CpuDevice::new());
        let mut a = mgr.allocate(2, 2).unwrap();
        let err = a.copy_from_slice(&[1.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            Error::Transfer {
                direction: TransferDirection::HostToDevice,
                ..
            }
        ));
    }

    #[test]
    fn test_out_of_memory_leaves_nothing_live() {
        let mgr = manager(CpuDevice::with_memory_limit(64));
        let _a = mgr.allocate(4, 4).unwrap();
        let err = mgr.allocate(1, 1).unwrap_err();
        assert!(matches!(err, Error::OutOfMemory { size: 4 }));
        assert_eq!(mgr.live_buffers(), 1);
    }

    #[test]
    fn test_empty_buffer() {
        let mgr = manager(CpuDevice::new());
        let e = mgr.allocate(0, 3).unwrap();
        assert!(e.is_empty());
        assert_eq!(e.ptr(), 0);
        assert!(e.to_vec().unwrap().is_empty());
    }
}
