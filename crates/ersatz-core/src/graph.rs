//! Connection graph over the registry.
//!
//! Edges are stored on both endpoints. Only [`link`](PortRegistry::link) and
//! [`unlink`](PortRegistry::unlink) touch the adjacency lists, so every edge is
//! either present on both sides or on neither.

use crate::error::{ConnectionError, Error, Result};
use crate::matcher::PortMatcher;
use crate::port::{DataType, PortFlags, PortHandle};
use crate::registry::PortRegistry;
use smallvec::SmallVec;

impl PortRegistry {
    fn link(&mut self, a: PortHandle, b: PortHandle) -> Result<()> {
        self.get_mut(a)?.connections.push(b);
        self.get_mut(b)?.connections.push(a);
        Ok(())
    }

    fn unlink(&mut self, a: PortHandle, b: PortHandle) -> Result<()> {
        self.get_mut(a)?.connections.retain(|h| *h != b);
        self.get_mut(b)?.connections.retain(|h| *h != a);
        Ok(())
    }

    fn check_connectable(&self, a: PortHandle, b: PortHandle) -> Result<()> {
        let pa = self.get(a)?;
        let pb = self.get(b)?;
        let reason = if a == b {
            Some(ConnectionError::SelfConnection)
        } else if pa.data_type() != pb.data_type() {
            Some(ConnectionError::TypeMismatch)
        } else if pa.flags().is_input() && pb.flags().is_input() {
            Some(ConnectionError::BothInputs)
        } else if pa.flags().is_output() && pb.flags().is_output() {
            Some(ConnectionError::BothOutputs)
        } else if pa.connections.contains(&b) {
            Some(ConnectionError::AlreadyConnected)
        } else {
            None
        };
        match reason {
            Some(reason) => Err(Error::InvalidConnection {
                src: pa.name.clone(),
                dst: pb.name.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Connects an output to an input. Argument order does not matter.
    pub(crate) fn connect(&mut self, a: PortHandle, b: PortHandle) -> Result<()> {
        self.check_connectable(a, b)?;
        self.link(a, b)
    }

    /// Removes the edge if present. Returns whether an edge was removed.
    pub(crate) fn disconnect(&mut self, a: PortHandle, b: PortHandle) -> Result<bool> {
        self.get(b)?;
        if !self.get(a)?.connections.contains(&b) {
            return Ok(false);
        }
        self.unlink(a, b)?;
        Ok(true)
    }

    /// Removes every edge of `a`, returning the former peers.
    pub(crate) fn disconnect_all(&mut self, a: PortHandle) -> Result<SmallVec<[PortHandle; 4]>> {
        let peers = self.get(a)?.connections.clone();
        for &peer in &peers {
            self.unlink(a, peer)?;
        }
        Ok(peers)
    }

    pub(crate) fn is_connected(&self, a: PortHandle) -> Result<bool> {
        Ok(!self.get(a)?.connections.is_empty())
    }

    pub(crate) fn is_connected_to(&self, a: PortHandle, b: PortHandle) -> Result<bool> {
        Ok(self.get(a)?.connections.contains(&b))
    }

    /// True iff any peer is a physical port.
    pub(crate) fn is_physically_connected(&self, a: PortHandle) -> Result<bool> {
        let port = self.get(a)?;
        Ok(port.connections.iter().any(|&peer| {
            self.get(peer)
                .map(|p| p.flags().is_physical())
                .unwrap_or(false)
        }))
    }

    pub(crate) fn connection_names(&self, a: PortHandle) -> Result<Vec<String>> {
        let port = self.get(a)?;
        Ok(port
            .connections
            .iter()
            .filter_map(|&peer| self.get(peer).ok().map(|p| p.name.clone()))
            .collect())
    }

    /// Names of ports passing every predicate, in registration order.
    pub(crate) fn find_ports<M: PortMatcher>(
        &self,
        matcher: &M,
        data_type: Option<DataType>,
        flags: PortFlags,
    ) -> Vec<String> {
        self.handles()
            .filter_map(|h| self.get(h).ok())
            .filter(|p| data_type.map_or(true, |dt| p.data_type() == dt))
            .filter(|p| p.flags().contains(flags))
            .filter(|p| matcher.matches(&p.name))
            .map(|p| p.name.clone())
            .collect()
    }
}
