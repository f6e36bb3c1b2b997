pub mod conn_handle;
pub mod manager;

pub use conn_handle::{ConnCommand, ConnHandle, ConnId};
pub use manager::{ConnManager, EventHandler, NetEvent, ThreadedConnManager};
