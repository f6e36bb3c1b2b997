use std::sync::mpsc::Sender;

/// Identifier of one peer connection, unique for the lifetime of a
/// connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(pub usize);

/// Commands consumed by a connection's writer thread, in FIFO order.
#[derive(Debug)]
pub enum ConnCommand {
    Send(Vec<u8>),
    Close,
}

/// Handle to one established connection.
///
/// `write` enqueues bytes without blocking; the queue drains in order on
/// the connection's writer. `disconnect` closes the socket. Both are
/// fire-and-forget: once the connection is gone the commands land
/// nowhere, and the owner finds out through a `ConnectionLost` event.
#[derive(Debug, Clone)]
pub struct ConnHandle {
    id: ConnId,
    commands: Sender<ConnCommand>,
}

impl ConnHandle {
    pub fn new(id: ConnId, commands: Sender<ConnCommand>) -> Self {
        Self { id, commands }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Queues `data` to be written to the peer.
    pub fn write(&self, data: Vec<u8>) {
        let _ = self.commands.send(ConnCommand::Send(data));
    }

    /// Closes the connection.
    pub fn disconnect(&self) {
        let _ = self.commands.send(ConnCommand::Close);
    }

    pub(crate) fn commands_sender(&self) -> Sender<ConnCommand> {
        self.commands.clone()
    }
}
