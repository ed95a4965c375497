use async_channel as chan;

/// Unbounded multi-producer queue that results are posted to from worker
/// threads and drained by whoever owns the mailbox, either by polling, by
/// blocking, or from async code.
#[derive(Debug)]
pub struct Mailbox<T> {
    tx: chan::Sender<T>,
    rx: chan::Receiver<T>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone(), rx: self.rx.clone() }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = chan::unbounded();
        Self { tx, rx }
    }

    pub fn post(&self, message: T) {
        // Both ends live as long as any clone, so the channel never closes
        // and an unbounded channel is never full.
        if self.tx.try_send(message).is_err() {
            tracing::warn!("mailbox closed; message discarded");
        }
    }

    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Block the current thread until a message arrives. Do not call from
    /// async code.
    pub fn recv_blocking(&self) -> Option<T> {
        self.rx.recv_blocking().ok()
    }

    pub async fn recv(&self) -> Option<T> {
        self.rx.recv().await.ok()
    }

    /// Everything posted so far, in posting order.
    pub fn drain(&self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
