/*!
    Cooperative cancellation.

    Blocking loops check a [`CancelFlag`] once per iteration and unwind
    through their normal cleanup when it is set.
*/

use std::sync::Arc;

use tokio::sync::watch;

use crate::{Error, Result};

/**
    Sets every [`CancelFlag`] handed out by it.
*/
#[derive(Clone, Debug)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Canceller {
    fn default() -> Self {
        Self::new()
    }
}

impl Canceller {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn flag(&self) -> CancelFlag {
        CancelFlag {
            sources: vec![self.tx.subscribe()],
        }
    }
}

/**
    Read side of one or more [`Canceller`]s. Set once any of them cancels.
*/
#[derive(Clone, Debug)]
pub struct CancelFlag {
    sources: Vec<watch::Receiver<bool>>,
}

impl CancelFlag {
    /// A flag nothing can set.
    pub fn never() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.sources.iter().any(|rx| *rx.borrow())
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /**
        A new canceller whose flags are also set by this one. Used to stop
        sibling tasks when one of them fails.
    */
    pub fn child(&self) -> (Canceller, CancelFlag) {
        let canceller = Canceller::new();
        let mut flag = canceller.flag();
        flag.sources.extend(self.sources.iter().cloned());
        (canceller, flag)
    }
}
