use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Node {
    cancelled: AtomicBool,
    parent: Option<Arc<Node>>,
}

impl Node {
    fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }
}

/// Cancellation signal shared by the executor, the pacer and the watchdog.
/// Clones observe the same state. Purely advisory: only loops that poll
/// it are affected.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    node: Arc<Node>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` only for the call that moved the
    /// signal out of the active state; later calls are no-ops.
    pub fn cancel(&self) -> bool {
        self.node
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.node.is_cancelled()
    }

    /// A signal that is cancelled whenever `self` is, but whose own
    /// cancellation is not seen by `self` or its other clones.
    pub fn child(&self) -> Self {
        Self {
            node: Arc::new(Node {
                cancelled: AtomicBool::new(false),
                parent: Some(self.node.clone()),
            }),
        }
    }
}
