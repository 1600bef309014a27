//! `TcpServerConsumer` — owns a listening socket and a reactor that
//! spawns one `ServerSession` per accepted connection. Mirrors
//! `src/socket/server.rs`'s accept-loop shape: `start()` is a plain
//! (non-async) call made from within an already-running tokio runtime,
//! spawning the accept loop as a background task; `shutdown()` aborts
//! it.

use std::sync::Mutex;
use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::broker::engine::Broker;
use crate::carrier::Carrier;
use crate::random::RandomFactory;
use crate::server::session::ServerSession;

use super::Consumer;

/// TCP-backed consumer: every accepted connection gets its own
/// `ServerSession` task driving the wire protocol against a shared
/// broker and random factory.
pub struct TcpServerConsumer {
    listener: Mutex<Option<TcpListener>>,
    broker: Arc<Broker<Carrier>>,
    random: Arc<RandomFactory>,
    accept_handle: Mutex<Option<JoinHandle<()>>>,
}

impl TcpServerConsumer {
    /// Binds `addr` immediately; the accept loop itself only starts on
    /// `start()`.
    pub async fn bind(
        addr: &str,
        broker: Arc<Broker<Carrier>>,
        random: Arc<RandomFactory>,
    ) -> std::io::Result<Arc<Self>> {
        let listener = TcpListener::bind(addr).await?;
        info!("tcp consumer listening on {addr}");
        Ok(Arc::new(Self {
            listener: Mutex::new(Some(listener)),
            broker,
            random,
            accept_handle: Mutex::new(None),
        }))
    }

    async fn accept_loop(listener: TcpListener, broker: Arc<Broker<Carrier>>, random: Arc<RandomFactory>) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    info!("tcp consumer accepted connection from {peer}");
                    let broker = Arc::clone(&broker);
                    let random = Arc::clone(&random);
                    tokio::spawn(async move {
                        let session = ServerSession::new(stream, broker, random);
                        session.run().await;
                    });
                }
                Err(e) => {
                    log::warn!("tcp consumer accept error: {e}");
                    break;
                }
            }
        }
    }
}

impl Consumer for TcpServerConsumer {
    fn start(&self) {
        let mut guard = self.accept_handle.lock().expect("tcp consumer handle mutex poisoned");
        if guard.is_some() {
            return; // already started
        }
        let listener = self
            .listener
            .lock()
            .expect("tcp consumer listener mutex poisoned")
            .take()
            .expect("TcpServerConsumer::start called more than once after listener was taken");
        let broker = Arc::clone(&self.broker);
        let random = Arc::clone(&self.random);
        *guard = Some(tokio::spawn(Self::accept_loop(listener, broker, random)));
    }

    fn shutdown(&self) {
        if let Some(handle) = self.accept_handle.lock().expect("tcp consumer handle mutex poisoned").take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire;

    #[tokio::test]
    async fn test_bind_and_get_seed_round_trip() {
        let broker: Arc<Broker<Carrier>> = Broker::new();
        let random = RandomFactory::with_seed(55);
        let consumer = TcpServerConsumer::bind("127.0.0.1:0", Arc::clone(&broker), Arc::clone(&random))
            .await
            .unwrap();
        let addr = {
            let guard = consumer.listener.lock().unwrap();
            guard.as_ref().unwrap().local_addr().unwrap()
        };
        consumer.start();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        wire::write_frame(&mut stream, "getSeed").await.unwrap();
        let reply = wire::read_frame(&mut stream).await.unwrap().unwrap();
        assert_eq!(reply, random.seed().to_string());

        consumer.shutdown();
    }
}
