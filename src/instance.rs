//! Fixed-capacity connection pool and the per-event entry points a
//! transport adapter drives.
//!
//! Grounded on `HttpdInstance`/`httpdConnectCb`/`httpdFindConnData`/
//! `httpdDisconCb` in the original. The original's `platLock`/
//! `platUnlock` callback pair (a caller-supplied mutex) becomes a plain
//! `std::sync::Mutex` held for the duration of each event.

use std::sync::Mutex;

use log::warn;

use crate::conn::Connection;
use crate::error::HttpdError;
use crate::limits::Limits;
use crate::route::Route;
use crate::transport::Transport;

pub struct Instance {
    limits: Limits,
    routes: &'static [Route],
    slots: Mutex<Vec<Option<Connection>>>,
}

impl Instance {
    pub fn new(routes: &'static [Route], limits: Limits) -> Self {
        let n = limits.max_connections;
        Instance {
            limits,
            routes,
            slots: Mutex::new((0..n).map(|_| None).collect()),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn routes(&self) -> &'static [Route] {
        self.routes
    }

    /// Allocates a slot for a newly-accepted `(ip, port)` pair.
    /// Returns `Err(HttpdError::PoolExhausted)` if every slot is busy;
    /// the transport adapter should reject the accept in that case.
    pub fn on_connect(&self, remote_ip: [u8; 4], remote_port: u16) -> Result<usize, HttpdError> {
        let mut slots = self.slots.lock().unwrap();
        let idx = slots
            .iter()
            .position(|c| c.is_none())
            .ok_or(HttpdError::PoolExhausted)?;
        slots[idx] = Some(Connection::new(idx, remote_ip, remote_port, &self.limits));
        Ok(idx)
    }

    pub fn on_recv(&self, transport: &mut dyn Transport, remote_ip: [u8; 4], remote_port: u16, data: &[u8]) {
        let mut slots = self.slots.lock().unwrap();
        match find_slot_mut(&mut slots, remote_ip, remote_port) {
            Some(conn) => conn.on_recv(self, transport, data),
            None => {
                warn!("{}", HttpdError::UnknownConnection);
                transport.disconnect();
            }
        }
    }

    pub fn on_sent(&self, transport: &mut dyn Transport, remote_ip: [u8; 4], remote_port: u16) {
        let mut slots = self.slots.lock().unwrap();
        match find_slot_mut(&mut slots, remote_ip, remote_port) {
            Some(conn) => conn.resume(self, transport),
            None => {
                warn!("{}", HttpdError::UnknownConnection);
                transport.disconnect();
            }
        }
    }

    /// Tears the connection down: invokes its handler once more with
    /// `is_gone() == true` (so the handler can release whatever it was
    /// holding), then frees the slot. Note the ordering relative to the
    /// original: `httpdRetireConn` clears the connection's pool slot
    /// *after* the `Connection` has already been freed, a use-after-free
    /// in the original C. Here the slot entry is taken out of the pool
    /// *before* `teardown` runs, so there is no window where a
    /// concurrent lookup could observe a freed connection through a
    /// still-populated slot.
    pub fn on_disconnect(&self, transport: &mut dyn Transport, remote_ip: [u8; 4], remote_port: u16) {
        let mut slots = self.slots.lock().unwrap();
        let idx = slots
            .iter()
            .position(|c| matches!(c, Some(conn) if conn.matches(remote_ip, remote_port)));
        match idx {
            Some(idx) => {
                let mut conn = slots[idx].take().expect("slot located above");
                drop(slots);
                conn.teardown(self, transport);
            }
            None => {
                warn!("{}", HttpdError::UnknownConnection);
                transport.disconnect();
            }
        }
    }
}

fn find_slot_mut(slots: &mut [Option<Connection>], ip: [u8; 4], port: u16) -> Option<&mut Connection> {
    slots.iter_mut().flatten().find(|c| c.matches(ip, port))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::route::RouteArg;

    static ROUTES: &[Route] = &[];

    #[test]
    fn pool_exhausts_after_max_connections() {
        let instance = Instance::new(ROUTES, Limits { max_connections: 1, ..Limits::default() });
        assert!(instance.on_connect([127, 0, 0, 1], 1).is_ok());
        assert!(matches!(
            instance.on_connect([127, 0, 0, 1], 2),
            Err(HttpdError::PoolExhausted)
        ));
    }

    #[test]
    fn slot_is_freed_on_disconnect() {
        struct NullTransport;
        impl Transport for NullTransport {
            fn send(&mut self, _: &[u8]) -> bool {
                true
            }
            fn disconnect(&mut self) {}
            fn disable_timeout(&mut self) {}
            fn is_gone(&self) -> bool {
                false
            }
        }
        let instance = Instance::new(ROUTES, Limits { max_connections: 1, ..Limits::default() });
        instance.on_connect([127, 0, 0, 1], 1).unwrap();
        let mut t = NullTransport;
        instance.on_disconnect(&mut t, [127, 0, 0, 1], 1);
        assert!(instance.on_connect([127, 0, 0, 1], 2).is_ok());
    }

    #[test]
    fn route_arg_is_copy() {
        let a = RouteArg::Str("x");
        let b = a;
        matches!(a, RouteArg::Str(_));
        matches!(b, RouteArg::Str(_));
    }
}
