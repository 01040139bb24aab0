mod error;
mod types;

pub use error::{MeshError, MeshResult};
pub use types::{NewTransferNotification, Peer, PeerStatus};

use parking_lot::RwLock;
use std::collections::HashMap;

/// Access to the mesh network membership service
pub trait PeerResolver: Send + Sync {
    fn is_enabled(&self) -> MeshResult<bool>;

    fn get_peers(&self) -> MeshResult<Vec<Peer>>;

    /// Let the receiving side know a transfer is on its way
    fn notify_new_transfer(&self, notification: NewTransferNotification) -> MeshResult<()>;
}

/// Index peers by every name a user may refer to them with: IP, hostname and public key
pub fn peer_lookup(peers: Vec<Peer>) -> HashMap<String, Peer> {
    let mut lookup = HashMap::with_capacity(peers.len() * 3);
    for peer in peers {
        lookup.insert(peer.ip.clone(), peer.clone());
        lookup.insert(peer.hostname.clone(), peer.clone());
        lookup.insert(peer.pubkey.clone(), peer);
    }
    lookup
}

/// Peer list kept in memory, used when the daemon is configured with a fixed mesh
pub struct StaticPeerResolver {
    enabled: bool,
    peers: RwLock<Vec<Peer>>,
}

impl StaticPeerResolver {
    pub fn new(enabled: bool, peers: Vec<Peer>) -> Self {
        Self {
            enabled,
            peers: RwLock::new(peers),
        }
    }

    pub fn set_peers(&self, peers: Vec<Peer>) {
        *self.peers.write() = peers;
    }
}

impl PeerResolver for StaticPeerResolver {
    fn is_enabled(&self) -> MeshResult<bool> {
        Ok(self.enabled)
    }

    fn get_peers(&self) -> MeshResult<Vec<Peer>> {
        Ok(self.peers.read().clone())
    }

    fn notify_new_transfer(&self, notification: NewTransferNotification) -> MeshResult<()> {
        tracing::debug!(
            identifier = %notification.identifier,
            file_count = notification.file_count,
            "New transfer notification"
        );
        Ok(())
    }
}
