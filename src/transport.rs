/// The non-blocking send/disconnect/timer primitives a transport
/// adapter supplies to an `Instance`.
///
/// Collapses the original's three free-function callback pointers
/// (`httpdPlatSendData`, `httpdPlatDisconnect`, `httpdPlatDisableTimeout`)
/// into one trait object the engine is handed per event. Implementing a
/// real adapter (TCP, TLS, a mock for tests) is out of scope for this
/// crate; only the boundary lives here.
pub trait Transport {
    /// Attempt to hand `bytes` to the underlying socket/stream.
    /// Returns `false` if the transport's own send buffer is full; the
    /// engine queues the data in its per-connection backlog and retries
    /// on the next `Instance::on_sent` event.
    fn send(&mut self, bytes: &[u8]) -> bool;

    /// Tear down the connection. Called once a handler has asked to
    /// close (non-chunked `Done`) and the send buffer has drained.
    fn disconnect(&mut self);

    /// Suspend the idle/read timeout for this connection. Called when a
    /// handler installs a raw receive callback (`ConnContext::set_recv_handler`)
    /// and is expected to hold the connection open indefinitely.
    fn disable_timeout(&mut self);

    /// Whether the underlying socket/stream has already gone away.
    /// `Connection` tracks gone-ness itself once `Instance::on_disconnect`
    /// runs and never queries this during normal operation; it exists so
    /// an adapter's own bookkeeping stays queryable from outside the
    /// engine.
    fn is_gone(&self) -> bool;
}
