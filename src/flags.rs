use bitflags::bitflags;

bitflags! {
    /// Per-connection state bits, replacing the original's hand-rolled
    /// `HFL_*` integer bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ConnFlags: u8 {
        /// Request line declared HTTP/1.1.
        const HTTP11 = 0b0000_0001;
        /// Response framing is chunked transfer-encoding.
        const CHUNKED = 0b0000_0010;
        /// `end_headers` has been called; subsequent `send` calls write body.
        const SENDING_BODY = 0b0000_0100;
        /// Disconnect once the current send buffer has drained.
        const DISCON_AFTER_SENT = 0b0000_1000;
        /// Transfer mode is `TransferMode::None`; omit the `Connection:`
        /// header line entirely.
        const NO_CONNECTION_STR = 0b0001_0000;
    }
}
