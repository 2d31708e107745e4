//! Interceptors that see every envelope on its way out and back in.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};
use suds_util::{soap::Envelope, transport::Headers};

/// What a handler wants the rest of the chain to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    Continue,
    /// Skip the remaining handlers. The request is still sent.
    Stop,
}

/// One direction of a call as handlers see it.
#[derive(Debug)]
pub struct Exchange<'a> {
    pub envelope: &'a mut Envelope,
    pub headers: &'a mut Headers,
    pub outgoing: bool,
}

pub type Handler = dyn Fn(&mut Exchange<'_>) -> ControlFlow + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Handlers in registration order.
#[derive(Default)]
pub struct HandlerChain {
    next: AtomicU64,
    handlers: Mutex<Vec<(HandlerId, Arc<Handler>)>>,
}

impl HandlerChain {
    pub fn add<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&mut Exchange<'_>) -> ControlFlow + Send + Sync + 'static,
    {
        let id = HandlerId(self.next.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        id
    }

    /// Returns whether the handler was registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn run(&self, exchange: &mut Exchange<'_>) {
        // Snapshot so handlers can register or remove handlers themselves.
        let handlers: Vec<Arc<Handler>> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            if handler(exchange) == ControlFlow::Stop {
                break;
            }
        }
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerChain").field("handlers", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chain: &HandlerChain) {
        let mut envelope = Envelope::empty();
        let mut headers = Headers::new();

        chain.run(&mut Exchange {
            envelope: &mut envelope,
            headers: &mut headers,
            outgoing: true,
        });
    }

    #[test]
    fn runs_in_order_until_stopped() {
        let chain = HandlerChain::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for (name, flow) in [("a", ControlFlow::Continue), ("b", ControlFlow::Stop), ("c", ControlFlow::Continue)] {
            let seen = seen.clone();
            chain.add(move |_: &mut Exchange<'_>| {
                seen.lock().unwrap().push(name);
                flow
            });
        }

        run(&chain);
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn removed_handlers_stop_running() {
        let chain = HandlerChain::default();
        let seen = Arc::new(Mutex::new(0));

        let counter = seen.clone();
        let id = chain.add(move |_: &mut Exchange<'_>| {
            *counter.lock().unwrap() += 1;
            ControlFlow::Continue
        });

        run(&chain);
        assert!(chain.remove(id));
        assert!(!chain.remove(id));
        run(&chain);

        assert_eq!(*seen.lock().unwrap(), 1);
        assert!(chain.is_empty());
    }
}
