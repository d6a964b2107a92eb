//! Device identity

/// A memory space that matrix buffers live in
///
/// Buffers remember their device so they can free themselves on drop.
pub trait Device: Clone + Send + Sync + std::fmt::Debug + 'static {
    /// Ordinal within the backend
    fn id(&self) -> usize;

    /// Label used in logs, e.g. `cuda:0`
    fn name(&self) -> String {
        format!("device:{}", self.id())
    }
}
