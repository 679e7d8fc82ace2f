//! Payment router
//!
//! Maps a (network, payment token) pair to its treasury and makes sure the
//! wallet is on the right chain before anything is sent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chain_gateway::{timed, ChainGateway};
use epo_core::{
    GatewayError, NetworkId, NetworkParams, RouteError, RouterConfig, TokenSymbol, TreasuryRoute,
};
use tokio::sync::Mutex;

/// Route key with identifiers normalized, whatever their origin
fn route_key(network: &NetworkId, token: &TokenSymbol) -> (NetworkId, TokenSymbol) {
    (NetworkId::new(network.as_str()), TokenSymbol::new(token.as_str()))
}

pub struct PaymentRouter {
    routes: HashMap<(NetworkId, TokenSymbol), TreasuryRoute>,
    networks: HashMap<NetworkId, NetworkParams>,
    gateway: Arc<dyn ChainGateway>,
    switch_timeout: Duration,
    /// Held for the duration of one `ensure_network`
    switching: Mutex<()>,
}

impl PaymentRouter {
    pub fn new(config: &RouterConfig, gateway: Arc<dyn ChainGateway>) -> Self {
        let routes = config
            .treasuries
            .iter()
            .map(|r| (route_key(&r.network, &r.token), r.clone()))
            .collect();
        let networks = config
            .networks
            .iter()
            .map(|n| (NetworkId::new(n.network.as_str()), n.clone()))
            .collect();
        Self {
            routes,
            networks,
            gateway,
            switch_timeout: Duration::from_secs(config.switch_timeout_secs),
            switching: Mutex::new(()),
        }
    }

    /// Treasury for a payment pair. Never guesses a fallback.
    pub fn resolve_treasury(
        &self,
        network: &NetworkId,
        token: &TokenSymbol,
    ) -> Result<TreasuryRoute, RouteError> {
        self.routes
            .get(&route_key(network, token))
            .cloned()
            .ok_or_else(|| RouteError::RouteNotConfigured {
                network: network.clone(),
                token: token.clone(),
            })
    }

    pub fn network_params(&self, network: &NetworkId) -> Result<&NetworkParams, RouteError> {
        self.networks
            .get(&NetworkId::new(network.as_str()))
            .ok_or_else(|| RouteError::NetworkNotConfigured {
                network: network.clone(),
            })
    }

    /// All configured payment routes, ordered by network then token
    pub fn routes(&self) -> Vec<TreasuryRoute> {
        let mut routes: Vec<TreasuryRoute> = self.routes.values().cloned().collect();
        routes.sort_by(|a, b| (&a.network, &a.token).cmp(&(&b.network, &b.token)));
        routes
    }

    /// Ensure the wallet is connected to `target`.
    ///
    /// Returns immediately when it already is. Otherwise requests a switch; a
    /// wallet that does not know the chain is asked to add it and the switch is
    /// retried once. A user rejection ends the attempt. Overlapping calls fail
    /// with [`RouteError::SwitchInProgress`].
    pub async fn ensure_network(&self, target: &NetworkId) -> Result<(), RouteError> {
        let params = self.network_params(target)?;
        let chain_id = params.chain_id;

        let _guard = self
            .switching
            .try_lock()
            .map_err(|_| RouteError::SwitchInProgress)?;

        let limit = self.switch_timeout;
        let active = timed(limit, self.gateway.active_network()).await?;
        if active == chain_id {
            return Ok(());
        }

        tracing::info!(network = %target, from = active, to = chain_id, "Requesting network switch");
        match timed(limit, self.gateway.request_network_switch(chain_id)).await {
            Ok(()) => {}
            Err(GatewayError::NetworkUnknown) => {
                tracing::info!(network = %target, "Wallet does not know network, requesting add");
                timed(limit, self.gateway.request_add_network(params)).await?;
                timed(limit, self.gateway.request_network_switch(chain_id)).await?;
            }
            Err(e) => {
                tracing::warn!(network = %target, "Network switch failed: {}", e);
                return Err(e.into());
            }
        }

        let actual = timed(limit, self.gateway.active_network()).await?;
        if actual != chain_id {
            return Err(RouteError::SwitchNotConfirmed {
                expected: chain_id,
                actual,
            });
        }
        Ok(())
    }
}
