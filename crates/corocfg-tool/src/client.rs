//! Library access behind a seam the commands can be tested against.

use std::sync::mpsc::{self, Receiver};

use corocfg::{
    Callbacks, CfgError, CfgHandle, Connector, DispatchMode, NodeAddresses, RetryPolicy,
    RingStatus, ShutdownFlags, ShutdownReply, SocketConnector, retry_on_try_again,
};
use corocfg_config::Config;
use tracing::debug;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Operations the tool performs on one open handle.
pub(crate) trait ClusterClient {
    fn local_node(&self) -> Result<u32, CfgError>;
    fn ring_status(&self) -> Result<Vec<RingStatus>, CfgError>;
    fn reenable_rings(&self) -> Result<(), CfgError>;
    fn node_addresses(&self, nodeid: u32, max: usize) -> Result<NodeAddresses, CfgError>;
    fn kill_node(&self, nodeid: u32, reason: &str) -> Result<(), CfgError>;
    fn shutdown(&self, flags: ShutdownFlags) -> Result<(), CfgError>;
    fn load_service(&self, name: &str, version: u32) -> Result<(), CfgError>;
    fn unload_service(&self, name: &str, version: u32) -> Result<(), CfgError>;
    /// Blocks until the cluster asks this client about a shutdown.
    fn next_shutdown_request(&self) -> Result<ShutdownFlags, CfgError>;
    fn answer_shutdown(&self, reply: ShutdownReply) -> Result<(), CfgError>;
    /// Finalizes the handle.
    fn close(&self) -> Result<(), CfgError>;
}

/// Opens clients from resolved configuration.
pub(crate) trait ClientFactory {
    fn connect(&self, config: &Config) -> Result<Box<dyn ClusterClient>, CfgError>;
}

/// Connects through the socket transport.
pub(crate) struct SocketClientFactory;

impl ClientFactory for SocketClientFactory {
    fn connect(&self, config: &Config) -> Result<Box<dyn ClusterClient>, CfgError> {
        let connector = SocketConnector::from_config(config);
        debug!(
            target: CLIENT_TARGET,
            endpoint = %connector.endpoint(),
            "connecting to the configuration service"
        );
        HandleClient::open(&connector, RetryPolicy::from(config))
            .map(|client| Box::new(client) as Box<dyn ClusterClient>)
    }
}

/// [`ClusterClient`] over a library handle; every call retries backpressure.
pub(crate) struct HandleClient {
    handle: CfgHandle,
    policy: RetryPolicy,
    requests: Receiver<ShutdownFlags>,
}

impl HandleClient {
    pub(crate) fn open(connector: &dyn Connector, policy: RetryPolicy) -> Result<Self, CfgError> {
        let (sender, requests) = mpsc::channel();
        let callbacks = Callbacks::new().on_shutdown(move |handle, flags| {
            if sender.send(flags).is_err() {
                debug!(target: CLIENT_TARGET, handle = %handle, "shutdown request dropped");
            }
        });
        let handle = retry_on_try_again(&policy, || {
            CfgHandle::initialize(connector, callbacks.clone())
        })?;
        Ok(Self {
            handle,
            policy,
            requests,
        })
    }

    fn retry<T>(
        &self,
        mut op: impl FnMut(CfgHandle) -> Result<T, CfgError>,
    ) -> Result<T, CfgError> {
        let handle = self.handle;
        retry_on_try_again(&self.policy, || op(handle))
    }
}

impl ClusterClient for HandleClient {
    fn local_node(&self) -> Result<u32, CfgError> {
        self.retry(CfgHandle::local_get)
    }

    fn ring_status(&self) -> Result<Vec<RingStatus>, CfgError> {
        self.retry(CfgHandle::ring_status_get)
    }

    fn reenable_rings(&self) -> Result<(), CfgError> {
        self.retry(CfgHandle::ring_reenable)
    }

    fn node_addresses(&self, nodeid: u32, max: usize) -> Result<NodeAddresses, CfgError> {
        self.retry(|handle| handle.get_node_addrs(nodeid, max))
    }

    fn kill_node(&self, nodeid: u32, reason: &str) -> Result<(), CfgError> {
        self.retry(|handle| handle.kill_node(nodeid, reason))
    }

    fn shutdown(&self, flags: ShutdownFlags) -> Result<(), CfgError> {
        self.retry(|handle| handle.try_shutdown(flags))
    }

    fn load_service(&self, name: &str, version: u32) -> Result<(), CfgError> {
        self.retry(|handle| handle.service_load(name, version))
    }

    fn unload_service(&self, name: &str, version: u32) -> Result<(), CfgError> {
        self.retry(|handle| handle.service_unload(name, version))
    }

    fn next_shutdown_request(&self) -> Result<ShutdownFlags, CfgError> {
        loop {
            if let Ok(flags) = self.requests.try_recv() {
                return Ok(flags);
            }
            self.handle.dispatch(DispatchMode::One)?;
        }
    }

    fn answer_shutdown(&self, reply: ShutdownReply) -> Result<(), CfgError> {
        self.retry(|handle| handle.replyto_shutdown(reply))
    }

    fn close(&self) -> Result<(), CfgError> {
        self.handle.finalize()
    }
}
