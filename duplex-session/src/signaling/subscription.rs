use tokio::sync::mpsc;

/// Push feed of store changes. Dropping or cancelling it unregisters the
/// listener; the store prunes it on its next delivery.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx }
    }

    /// Next change, or `None` once the store side is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn cancel(mut self) {
        self.rx.close();
    }
}
