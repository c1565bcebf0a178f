// ── Reactive device store ──
//
// Connection state and per-command request status with push-based change
// notification.

mod device_store;
mod requests;

pub use device_store::DeviceStore;
pub use requests::RequestTracker;
