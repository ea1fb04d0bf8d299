//! The host's side of a contributor stream action.
//!
//! A streaming host applies the contributor's own flow change first, then
//! invokes the router's callback inside the same transaction. If the callback
//! rejects, the whole action is reverted. `HostDriver` reproduces that
//! sequence against a `StreamHost` so the router can run in-process.
//!
//! # Flow
//! ```text
//! create/update:  inbound flow change → callback → (reject) → revert inbound
//! delete:         inbound flow removed → callback (cannot reject)
//! ```

use alloy::primitives::Address;

use crate::router::engine::{RoutingEngine, Termination};
use crate::router::error::{RouterError, RouterResult};
use crate::streaming::host::StreamHost;
use crate::streaming::types::{FlowRate, HostError};

/// Drives lifecycle callbacks the way the host would.
pub struct HostDriver<'a, H> {
    engine: &'a mut RoutingEngine<H>,
}

impl<'a, H: StreamHost> HostDriver<'a, H> {
    pub fn new(engine: &'a mut RoutingEngine<H>) -> Self {
        Self { engine }
    }

    /// Open `contributor`'s stream to the router, then route it.
    pub fn create_stream(
        &mut self,
        contributor: Address,
        token: Address,
        rate: FlowRate,
        metadata: &[u8],
    ) -> RouterResult<()> {
        if token != self.engine.host().token() {
            return self.engine.on_stream_created(contributor, token, rate, metadata);
        }
        let router = self.engine.address();
        self.engine
            .host_mut()
            .create_flow(contributor, router, rate)
            .map_err(|e| inbound_error(contributor, e))?;

        if let Err(rejection) = self.engine.on_stream_created(contributor, token, rate, metadata) {
            if let Err(e) = self.engine.host_mut().delete_flow(contributor, router) {
                tracing::error!(%contributor, error = %e, "Failed to revert rejected inbound stream");
            }
            return Err(rejection);
        }
        Ok(())
    }

    /// Change `contributor`'s inbound rate, then let the router follow.
    pub fn update_stream(
        &mut self,
        contributor: Address,
        token: Address,
        rate: FlowRate,
        metadata: &[u8],
    ) -> RouterResult<()> {
        if token != self.engine.host().token() {
            return self.engine.on_stream_updated(contributor, token, rate, metadata);
        }
        let router = self.engine.address();
        let previous = self.engine.host().flow_rate(contributor, router);
        if previous.is_zero() {
            return Err(RouterError::UnknownStream(contributor));
        }
        self.engine
            .host_mut()
            .update_flow(contributor, router, rate)
            .map_err(|e| inbound_error(contributor, e))?;

        if let Err(rejection) = self.engine.on_stream_updated(contributor, token, rate, metadata) {
            if let Err(e) = self.engine.host_mut().update_flow(contributor, router, previous) {
                tracing::error!(%contributor, error = %e, "Failed to revert rejected inbound update");
            }
            return Err(rejection);
        }
        Ok(())
    }

    /// Close `contributor`'s inbound stream. The callback always runs.
    pub fn delete_stream(&mut self, contributor: Address, token: Address) -> Termination {
        if token == self.engine.host().token() {
            let router = self.engine.address();
            if let Err(e) = self.engine.host_mut().delete_flow(contributor, router) {
                tracing::debug!(%contributor, error = %e, "No inbound flow to close");
            }
        }
        self.engine.on_stream_terminated(contributor, token)
    }
}

fn inbound_error(contributor: Address, err: HostError) -> RouterError {
    match err {
        HostError::InvalidRate(rate) => RouterError::InvalidFlowRate(rate),
        HostError::FlowExists { .. } => RouterError::StreamExists(contributor),
        HostError::FlowNotFound { .. } => RouterError::UnknownStream(contributor),
        other => RouterError::Host(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::router::error::RecipientFault;
    use crate::router::metadata::encode_intent;
    use crate::streaming::memory::MemoryHost;

    const OWNER: Address = Address::with_last_byte(0xa0);
    const ROUTER: Address = Address::with_last_byte(0xa1);
    const TOKEN: Address = Address::with_last_byte(0xa2);
    const X: Address = Address::with_last_byte(0x10);
    const C1: Address = Address::with_last_byte(0x01);

    fn engine() -> RoutingEngine<MemoryHost> {
        let config = RouterConfig {
            owner: OWNER,
            address: ROUTER,
            token: TOKEN,
            snapshot_path: None,
        };
        let mut engine = RoutingEngine::new(&config, MemoryHost::new(TOKEN));
        engine.initialize_distribution(OWNER).unwrap();
        engine.register_recipient(OWNER, X).unwrap();
        engine
    }

    #[test]
    fn test_rejected_create_reverts_inbound() {
        let mut engine = engine();
        let stranger = Address::with_last_byte(0x55);
        let err = HostDriver::new(&mut engine)
            .create_stream(C1, TOKEN, FlowRate::new(10), &encode_intent(stranger))
            .unwrap_err();

        assert_eq!(err, RouterError::InvalidRecipient(RecipientFault::Unregistered(stranger)));
        assert_eq!(engine.host().flows().count(), 0);
        assert_eq!(engine.net_router_flow(), FlowRate::ZERO);
    }

    #[test]
    fn test_rejected_update_restores_previous_rate() {
        let mut engine = engine();
        let mut driver = HostDriver::new(&mut engine);
        driver.create_stream(C1, TOKEN, FlowRate::new(10), &encode_intent(X)).unwrap();
        let err = driver
            .update_stream(C1, TOKEN, FlowRate::new(99), &encode_intent(Address::with_last_byte(0x56)))
            .unwrap_err();

        assert_eq!(err.kind(), "invalid_recipient");
        assert_eq!(engine.host().flow_rate(C1, ROUTER), FlowRate::new(10));
        assert_eq!(engine.net_router_flow(), FlowRate::ZERO);
    }

    #[test]
    fn test_host_errors_map_to_router_errors() {
        let mut engine = engine();
        let mut driver = HostDriver::new(&mut engine);
        assert_eq!(
            driver.create_stream(C1, TOKEN, FlowRate::ZERO, &encode_intent(X)),
            Err(RouterError::InvalidFlowRate(FlowRate::ZERO))
        );
        assert_eq!(
            driver.update_stream(C1, TOKEN, FlowRate::new(5), &[]),
            Err(RouterError::UnknownStream(C1))
        );
        driver.create_stream(C1, TOKEN, FlowRate::new(5), &encode_intent(X)).unwrap();
        assert_eq!(
            driver.create_stream(C1, TOKEN, FlowRate::new(5), &encode_intent(X)),
            Err(RouterError::StreamExists(C1))
        );
    }

    #[test]
    fn test_delete_always_reaches_router() {
        let mut engine = engine();
        let mut driver = HostDriver::new(&mut engine);
        driver.create_stream(C1, TOKEN, FlowRate::new(10), &encode_intent(X)).unwrap();

        assert!(matches!(driver.delete_stream(C1, TOKEN), Termination::Closed { .. }));
        assert_eq!(driver.delete_stream(C1, TOKEN), Termination::Ignored);
        assert_eq!(engine.host().flows().count(), 0);
        assert_eq!(engine.anomalies().len(), 1);
    }
}
