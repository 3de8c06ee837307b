//! Pairing lifecycle controller.
//!
//! One controller instance drives one HTTP-triggered pairing attempt:
//! request a pairing code, wait for the remote side to complete linking,
//! deliver the captured credentials, then remove all local state. The whole
//! flow after the code response is driven by connection-state events from
//! the gateway rather than direct control flow.

use super::{display_session_id, random_blob_name, BlobUploader, Outgoing, SessionClient};
use crate::config::BrandingConfig;
use crate::error::{DeliveryError, SetupError};
use crate::supervisor::{RestartReason, Supervisor};
use credential_store::{CredentialBundle, CredentialStore, StoreError, CREDS_FILE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use wa_client::{ConnectionState, SessionEvent};

/// Warning sent after the session id itself.
const SHARE_WARNING: &str = "🛑 *Do not share this code with anyone* 🛑";

/// Fixed delays of the pairing flow.
#[derive(Debug, Clone)]
pub struct SessionTiming {
    /// Settle time between binding the session and requesting a code.
    pub pair_delay: Duration,
    /// Grace period for trailing credential updates before upload.
    pub flush_grace: Duration,
    /// Pause between flagging cleanup and removing local state.
    pub cleanup_delay: Duration,
    /// Wait after a transient disconnect before handling further events.
    pub reconnect_backoff: Duration,
}

/// Controller for a single pairing attempt.
pub struct PairingSession {
    client: Arc<dyn SessionClient>,
    uploader: Arc<dyn BlobUploader>,
    store: CredentialStore,
    branding: BrandingConfig,
    timing: SessionTiming,
    supervisor: Arc<Supervisor>,
    /// Set once cleanup begins; suppresses reconnect handling and further
    /// credential persistence.
    stop_retry: AtomicBool,
}

impl PairingSession {
    pub fn new(
        client: Arc<dyn SessionClient>,
        uploader: Arc<dyn BlobUploader>,
        store: CredentialStore,
        branding: BrandingConfig,
        timing: SessionTiming,
        supervisor: Arc<Supervisor>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            uploader,
            store,
            branding,
            timing,
            supervisor,
            stop_retry: AtomicBool::new(false),
        })
    }

    /// Requesting phase: bind the session to fresh credential state and
    /// obtain the pairing code returned to the HTTP caller.
    ///
    /// The code is issued at most once per attempt; later connection events
    /// never re-request one.
    pub async fn request_code(&self, number: &str) -> Result<String, SetupError> {
        let bundle = self.store.load().await?;
        let registered = self
            .client
            .bind(&bundle)
            .await
            .map_err(SetupError::Client)?;

        if registered {
            // A fresh per-request store can only be registered if the
            // gateway session already belongs to someone else.
            return Err(SetupError::AlreadyLinked);
        }

        // Let the freshly bound session settle before asking for a code.
        sleep(self.timing.pair_delay).await;

        let code = self
            .client
            .pairing_code(number)
            .await
            .map_err(SetupError::Client)?;
        info!(number = %number, "Pairing code issued");
        Ok(code)
    }

    /// Awaiting-link phase: consume session events until the attempt
    /// terminates.
    ///
    /// Delivery runs as a concurrent task so connection events observed
    /// while the upload is in flight are still handled (gated by
    /// `stop_retry` once cleanup starts). The loop ends when delivery
    /// completes, on an unauthorized disconnect, or when the event channel
    /// closes.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<SessionEvent>) {
        let mut delivery: Option<JoinHandle<()>> = None;

        loop {
            let event = if let Some(task) = delivery.as_mut() {
                let next = tokio::select! {
                    _ = task => None,
                    event = events.recv() => Some(event),
                };
                match next {
                    // Delivering finished (success or logged failure).
                    None => {
                        delivery = None;
                        break;
                    }
                    Some(Some(event)) => event,
                    Some(None) => break,
                }
            } else {
                match events.recv().await {
                    Some(event) => event,
                    None => break,
                }
            };

            match event {
                SessionEvent::Creds { creds, keys } => {
                    if self.stop_retry.load(Ordering::SeqCst) {
                        continue;
                    }
                    let bundle = CredentialBundle { creds, keys };
                    if let Err(e) = self.store.persist(&bundle).await {
                        warn!(error = %e, "Failed to persist credential update");
                    }
                }
                SessionEvent::Connection(update) => match update.state {
                    ConnectionState::Open => {
                        if self.stop_retry.load(Ordering::SeqCst) || delivery.is_some() {
                            continue;
                        }
                        info!("Link established, delivering session credentials");
                        let session = Arc::clone(&self);
                        delivery = Some(tokio::spawn(async move {
                            session.deliver_and_cleanup(update.account).await;
                        }));
                    }
                    ConnectionState::Close if self.stop_retry.load(Ordering::SeqCst) => {
                        // Cleanup already in progress.
                    }
                    ConnectionState::Close => {
                        if update.is_unauthorized() {
                            error!("Unauthorized during pairing; not retrying");
                            self.cleanup().await;
                            break;
                        }
                        warn!(
                            status = ?update.status_code,
                            "Connection closed; awaiting gateway reconnect"
                        );
                        sleep(self.timing.reconnect_backoff).await;
                    }
                    ConnectionState::Connecting => {}
                },
            }
        }

        if let Some(task) = delivery.take() {
            let _ = task.await;
        }
        debug!("Pairing session finished");
    }

    async fn deliver_and_cleanup(&self, account: Option<String>) {
        if let Err(e) = self.deliver(account).await {
            error!(error = %e, "Failed to deliver session credentials");
            self.supervisor.request_restart(RestartReason::DeliveryFailure);
        }
        self.cleanup().await;
    }

    /// Delivering phase: upload the captured bundle and message the linked
    /// account its session id.
    async fn deliver(&self, account: Option<String>) -> Result<(), DeliveryError> {
        // Let trailing credential updates land before reading the bundle.
        sleep(self.timing.flush_grace).await;

        let account = account.ok_or(DeliveryError::MissingAccount)?;
        let recipient = wa_client::normalize_jid(&account);

        let creds = match self.store.read_file(CREDS_FILE).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound(_)) => return Err(DeliveryError::MissingCredentials),
            Err(e) => return Err(e.into()),
        };

        let name = format!("{}.json", random_blob_name());
        let locator = self
            .uploader
            .upload(creds, &name)
            .await
            .map_err(DeliveryError::Upload)?;
        let session_id = display_session_id(&locator).to_string();

        let caption = format!(
            "*{bot}*\n\n👉 {session_id} 👈\n\n*This is your Session ID*\n\n> {bot}",
            bot = self.branding.bot_name
        );

        self.client
            .send(
                &recipient,
                Outgoing::Image {
                    url: self.branding.image_url.clone(),
                    caption,
                },
            )
            .await
            .map_err(DeliveryError::Send)?;
        self.client
            .send(&recipient, Outgoing::Text(session_id))
            .await
            .map_err(DeliveryError::Send)?;
        self.client
            .send(&recipient, Outgoing::Text(SHARE_WARNING.to_string()))
            .await
            .map_err(DeliveryError::Send)?;

        info!(recipient = %recipient, "Session credentials delivered");
        Ok(())
    }

    /// Cleanup phase: flag retries off, wait briefly, remove local state,
    /// and release the gateway session.
    async fn cleanup(&self) {
        self.stop_retry.store(true, Ordering::SeqCst);
        sleep(self.timing.cleanup_delay).await;
        self.store.delete().await;
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "Gateway disconnect after cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupervisorConfig;
    use crate::session::MockBlobUploader;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use wa_client::ConnectionUpdate;

    struct FakeClient {
        registered: bool,
        fail_pairing: bool,
        pair_calls: AtomicUsize,
        sent: Mutex<Vec<(String, Outgoing)>>,
        disconnects: AtomicUsize,
    }

    impl FakeClient {
        fn new() -> Self {
            Self {
                registered: false,
                fail_pairing: false,
                pair_calls: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
                disconnects: AtomicUsize::new(0),
            }
        }

        fn sent(&self) -> Vec<(String, Outgoing)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SessionClient for FakeClient {
        async fn bind(&self, _bundle: &CredentialBundle) -> anyhow::Result<bool> {
            Ok(self.registered)
        }

        async fn pairing_code(&self, _number: &str) -> anyhow::Result<String> {
            self.pair_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_pairing {
                anyhow::bail!("gateway not ready");
            }
            Ok("ABCD-1234".into())
        }

        async fn send(&self, recipient: &str, message: Outgoing) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((recipient.into(), message));
            Ok(())
        }

        async fn disconnect(&self) -> anyhow::Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_timing() -> SessionTiming {
        SessionTiming {
            pair_delay: Duration::from_millis(1),
            flush_grace: Duration::from_millis(5),
            cleanup_delay: Duration::from_millis(1),
            reconnect_backoff: Duration::from_millis(5),
        }
    }

    fn test_branding() -> BrandingConfig {
        BrandingConfig {
            bot_name: "WA PAIR".into(),
            image_url: "https://example.com/banner.jpg".into(),
        }
    }

    fn uploader_returning_link() -> MockBlobUploader {
        let mut uploader = MockBlobUploader::new();
        uploader
            .expect_upload()
            .returning(|_, _| Ok("https://mega.nz/file/XYZ123".to_string()));
        uploader
    }

    fn session_with(
        client: Arc<FakeClient>,
        uploader: MockBlobUploader,
        store: CredentialStore,
    ) -> Arc<PairingSession> {
        PairingSession::new(
            client,
            Arc::new(uploader),
            store,
            test_branding(),
            test_timing(),
            Supervisor::new(SupervisorConfig::default()),
        )
    }

    fn creds_event() -> SessionEvent {
        SessionEvent::Creds {
            creds: json!({"registered": true, "me": {"id": "94771234567:7@s.whatsapp.net"}}),
            keys: [("pre-key-1".to_string(), json!({"public": "abc"}))]
                .into_iter()
                .collect(),
        }
    }

    fn open_event() -> SessionEvent {
        SessionEvent::Connection(ConnectionUpdate {
            state: ConnectionState::Open,
            account: Some("94771234567:7@s.whatsapp.net".into()),
            status_code: None,
        })
    }

    fn close_event(status_code: u16) -> SessionEvent {
        SessionEvent::Connection(ConnectionUpdate {
            state: ConnectionState::Close,
            account: None,
            status_code: Some(status_code),
        })
    }

    #[tokio::test]
    async fn test_request_code_issues_exactly_one_code() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(FakeClient::new());
        let session = session_with(
            client.clone(),
            MockBlobUploader::new(),
            CredentialStore::new(dir.path().join("s")),
        );

        let code = session.request_code("94771234567").await.unwrap();
        assert_eq!(code, "ABCD-1234");
        assert_eq!(client.pair_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_request_code_rejects_already_linked_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeClient::new();
        fake.registered = true;
        let client = Arc::new(fake);
        let session = session_with(
            client.clone(),
            MockBlobUploader::new(),
            CredentialStore::new(dir.path().join("s")),
        );

        let err = session.request_code("94771234567").await.unwrap_err();
        assert!(matches!(err, SetupError::AlreadyLinked));
        assert_eq!(client.pair_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_request_code_propagates_client_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut fake = FakeClient::new();
        fake.fail_pairing = true;
        let client = Arc::new(fake);
        let session = session_with(
            client,
            MockBlobUploader::new(),
            CredentialStore::new(dir.path().join("s")),
        );

        let err = session.request_code("94771234567").await.unwrap_err();
        assert!(matches!(err, SetupError::Client(_)));
    }

    #[tokio::test]
    async fn test_open_delivers_three_messages_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("s"));
        let client = Arc::new(FakeClient::new());
        let session = session_with(client.clone(), uploader_returning_link(), store.clone());

        let (tx, rx) = mpsc::channel(8);
        tx.send(creds_event()).await.unwrap();
        tx.send(open_event()).await.unwrap();
        drop(tx);

        session.run(rx).await;

        let sent = client.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].0, "94771234567@s.whatsapp.net");
        match &sent[0].1 {
            Outgoing::Image { url, caption } => {
                assert_eq!(url, "https://example.com/banner.jpg");
                assert!(caption.contains("XYZ123"));
                assert!(caption.contains("WA PAIR"));
            }
            other => panic!("expected image message, got {other:?}"),
        }
        assert_eq!(sent[1].1, Outgoing::Text("XYZ123".into()));
        assert_eq!(sent[2].1, Outgoing::Text(SHARE_WARNING.into()));

        // Local state never survives cleanup.
        assert!(!store.dir().exists());
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("s"));
        let client = Arc::new(FakeClient::new());

        let mut uploader = MockBlobUploader::new();
        uploader
            .expect_upload()
            .returning(|_, _| Err(anyhow::anyhow!("storage login failed")));

        let session = session_with(client.clone(), uploader, store.clone());

        let (tx, rx) = mpsc::channel(8);
        tx.send(creds_event()).await.unwrap();
        tx.send(open_event()).await.unwrap();
        drop(tx);

        session.run(rx).await;

        assert!(client.sent().is_empty());
        assert!(!store.dir().exists());
    }

    #[tokio::test]
    async fn test_missing_credentials_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("s"));
        let client = Arc::new(FakeClient::new());
        let session = session_with(client.clone(), MockBlobUploader::new(), store.clone());

        // Open without any prior credential update.
        let (tx, rx) = mpsc::channel(8);
        tx.send(open_event()).await.unwrap();
        drop(tx);

        session.run(rx).await;

        assert!(client.sent().is_empty());
        assert!(!store.dir().exists());
    }

    #[tokio::test]
    async fn test_unauthorized_close_terminates_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("s"));
        let client = Arc::new(FakeClient::new());
        let session = session_with(client.clone(), MockBlobUploader::new(), store.clone());

        let (tx, rx) = mpsc::channel(8);
        tx.send(creds_event()).await.unwrap();
        tx.send(close_event(401)).await.unwrap();
        // Keep the sender alive: termination must come from the 401, not
        // from channel closure.
        let run = tokio::spawn(session.run(rx));
        tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("run should terminate on unauthorized close")
            .unwrap();
        drop(tx);

        assert!(client.sent().is_empty());
        assert!(!store.dir().exists());
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_close_keeps_waiting_for_link() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("s"));
        let client = Arc::new(FakeClient::new());
        let session = session_with(client.clone(), uploader_returning_link(), store.clone());

        let (tx, rx) = mpsc::channel(8);
        tx.send(creds_event()).await.unwrap();
        // Stream error, then the gateway reconnects on its own and links.
        tx.send(close_event(428)).await.unwrap();
        tx.send(open_event()).await.unwrap();
        drop(tx);

        session.run(rx).await;

        // The transient close never re-requested pairing and delivery still
        // happened once the link opened.
        assert_eq!(client.pair_calls.load(Ordering::SeqCst), 0);
        assert_eq!(client.sent().len(), 3);
        assert!(!store.dir().exists());
    }
}
