//! Interaction-model server registry.
//!
//! Maps `(endpoint, cluster)` to the live server object answering
//! interaction-model requests for it. The registry never owns a server: the
//! lifecycle that constructed it does, and registrations hold a `Weak`.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use log::debug;
use parking_lot::Mutex;
use rs_matter::error::{Error, ErrorCode};

use super::data_model::AttrValue;
use super::ids::{AttrId, ClusterId, CmdId, EndptId};

/// A cluster server instance reachable through the interaction model.
pub trait ClusterServer: Send + Sync {
    fn endpoint(&self) -> EndptId;

    fn cluster_id(&self) -> ClusterId;

    fn data_version(&self) -> u32;

    fn read_attribute(&self, attribute: AttrId) -> Result<AttrValue, Error>;

    /// Invoke a command; returns the response payload for commands that have one.
    fn invoke(&self, command: CmdId, args: &[AttrValue]) -> Result<Option<AttrValue>, Error>;
}

/// A registration request: the path served and a non-owning server reference.
#[derive(Clone)]
pub struct ClusterRegistration {
    pub endpoint: EndptId,
    pub cluster: ClusterId,
    pub server: Weak<dyn ClusterServer>,
}

impl ClusterRegistration {
    pub fn new<S: ClusterServer + 'static>(server: &Arc<S>) -> Self {
        let weak: Weak<dyn ClusterServer> = Arc::downgrade(server) as Weak<dyn ClusterServer>;
        Self {
            endpoint: server.endpoint(),
            cluster: server.cluster_id(),
            server: weak,
        }
    }
}

/// Register/unregister calls made by the cluster lifecycle code.
pub trait ServerRegistry: Send + Sync {
    fn register(&self, registration: ClusterRegistration) -> Result<(), Error>;

    fn unregister(&self, endpoint: EndptId, cluster: ClusterId) -> Result<(), Error>;
}

/// In-memory registry used by the node runtime.
#[derive(Default)]
pub struct InteractionModelRegistry {
    servers: Mutex<HashMap<(EndptId, ClusterId), Weak<dyn ClusterServer>>>,
}

impl InteractionModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live server for a path, if one is registered and still alive.
    pub fn server_for(&self, endpoint: EndptId, cluster: ClusterId) -> Option<Arc<dyn ClusterServer>> {
        self.servers
            .lock()
            .get(&(endpoint, cluster))
            .and_then(|server| server.upgrade())
    }

    pub fn is_registered(&self, endpoint: EndptId, cluster: ClusterId) -> bool {
        self.servers.lock().contains_key(&(endpoint, cluster))
    }

    pub fn len(&self) -> usize {
        self.servers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read_attribute(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        attribute: AttrId,
    ) -> Result<AttrValue, Error> {
        self.server_for(endpoint, cluster)
            .ok_or(ErrorCode::ClusterNotFound)?
            .read_attribute(attribute)
    }

    pub fn invoke(
        &self,
        endpoint: EndptId,
        cluster: ClusterId,
        command: CmdId,
        args: &[AttrValue],
    ) -> Result<Option<AttrValue>, Error> {
        self.server_for(endpoint, cluster)
            .ok_or(ErrorCode::ClusterNotFound)?
            .invoke(command, args)
    }
}

impl ServerRegistry for InteractionModelRegistry {
    fn register(&self, registration: ClusterRegistration) -> Result<(), Error> {
        let mut servers = self.servers.lock();
        let key = (registration.endpoint, registration.cluster);
        if servers.contains_key(&key) {
            return Err(ErrorCode::Duplicate.into());
        }
        debug!(
            "Registered server for endpoint {} cluster 0x{:04X}",
            key.0, key.1
        );
        servers.insert(key, registration.server);
        Ok(())
    }

    fn unregister(&self, endpoint: EndptId, cluster: ClusterId) -> Result<(), Error> {
        match self.servers.lock().remove(&(endpoint, cluster)) {
            Some(_) => {
                debug!(
                    "Unregistered server for endpoint {} cluster 0x{:04X}",
                    endpoint, cluster
                );
                Ok(())
            }
            None => Err(ErrorCode::NotFound.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl ClusterServer for Fixed {
        fn endpoint(&self) -> EndptId {
            0
        }

        fn cluster_id(&self) -> ClusterId {
            0x0033
        }

        fn data_version(&self) -> u32 {
            1
        }

        fn read_attribute(&self, attribute: AttrId) -> Result<AttrValue, Error> {
            match attribute {
                0x01 => Ok(AttrValue::U16(3)),
                _ => Err(ErrorCode::AttributeNotFound.into()),
            }
        }

        fn invoke(&self, _command: CmdId, _args: &[AttrValue]) -> Result<Option<AttrValue>, Error> {
            Err(ErrorCode::InvalidCommand.into())
        }
    }

    #[test]
    fn test_register_routes_reads() {
        let registry = InteractionModelRegistry::new();
        let server = Arc::new(Fixed);
        registry.register(ClusterRegistration::new(&server)).unwrap();

        assert_eq!(
            registry.read_attribute(0, 0x0033, 0x01).unwrap(),
            AttrValue::U16(3)
        );
        assert_eq!(
            registry.read_attribute(0, 0x0034, 0x01).unwrap_err().code(),
            ErrorCode::ClusterNotFound
        );
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let registry = InteractionModelRegistry::new();
        let server = Arc::new(Fixed);
        registry.register(ClusterRegistration::new(&server)).unwrap();

        let err = registry
            .register(ClusterRegistration::new(&server))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Duplicate);

        registry.unregister(0, 0x0033).unwrap();
        let err = registry.unregister(0, 0x0033).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_registration_does_not_own_server() {
        let registry = InteractionModelRegistry::new();
        let server = Arc::new(Fixed);
        registry.register(ClusterRegistration::new(&server)).unwrap();
        drop(server);

        assert!(registry.is_registered(0, 0x0033));
        assert!(registry.server_for(0, 0x0033).is_none());
    }
}
