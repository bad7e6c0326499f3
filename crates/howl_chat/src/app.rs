//! Chat application state and the event queue feeding it
//!
//! `ChatApp` is owned by a single task. Download, load and inference run in the
//! background and report back as `AppEvent`s; only `ChatApp::apply` turns those
//! into visible changes (status, transcript, lifecycle state).

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::chat::{ChatMessage, Transcript};
use crate::config::ChatConfig;
use crate::error::{HowlError, Result};
use crate::model::{DownloadProgress, ModelFetcher, ModelHandle, ModelLoader};
use crate::router::InferenceRouter;
use crate::state::ModelState;

pub const IDLE_STATUS: &str = "Idle";
pub const DOWNLOADING_STATUS: &str = "Downloading model...";
pub const LOADING_STATUS: &str = "Loading model...";
pub const READY_STATUS: &str = "Model Ready!";
pub const READY_MESSAGE: &str = "Model is ready. Type something to start chatting!";

/// Results of background work, delivered to the owning task
#[derive(Debug)]
pub enum AppEvent {
    Progress(DownloadProgress),
    /// Download finished; the artifact is being loaded.
    Loading,
    ModelReady(ModelHandle),
    /// Setup gave up; carries the status line to show.
    ModelFailed(String),
    Reply(String),
}

pub type EventSender = mpsc::UnboundedSender<AppEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<AppEvent>;

pub struct ChatApp {
    config: ChatConfig,
    state: ModelState,
    status: String,
    progress: Option<DownloadProgress>,
    transcript: Transcript,
    router: InferenceRouter,
    events: EventSender,
}

impl ChatApp {
    /// Create the app and the receiving end of its event queue.
    pub fn new(config: ChatConfig) -> (Self, EventReceiver) {
        let (events, rx) = mpsc::unbounded_channel();
        let router = InferenceRouter::new(&config);
        let app = Self {
            config,
            state: ModelState::NotLoaded,
            status: IDLE_STATUS.to_string(),
            progress: None,
            transcript: Transcript::new(),
            router,
            events,
        };
        (app, rx)
    }

    /// Download the artifact and load it, in the background.
    pub fn start_model_setup(
        &mut self,
        fetcher: ModelFetcher,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<JoinHandle<()>> {
        self.state.transition(ModelState::Downloading)?;
        self.status = DOWNLOADING_STATUS.to_string();
        if let Err(e) = loader.available() {
            return Err(self.fail_setup(e));
        }

        let events = self.events.clone();
        Ok(tokio::spawn(fetch_and_load(fetcher, loader, events)))
    }

    /// Load an artifact that is already on disk, skipping the download.
    pub fn start_local_load(
        &mut self,
        path: impl Into<PathBuf>,
        loader: Arc<dyn ModelLoader>,
    ) -> Result<JoinHandle<()>> {
        self.state.transition(ModelState::Loading)?;
        self.status = LOADING_STATUS.to_string();
        if let Err(e) = loader.available() {
            return Err(self.fail_setup(e));
        }

        let events = self.events.clone();
        Ok(tokio::spawn(load_and_report(path.into(), loader, events)))
    }

    /// Post a user message and start answering it.
    ///
    /// Blank input is ignored and returns `None`. The reply arrives later as
    /// `AppEvent::Reply`.
    pub fn submit(&mut self, input: &str) -> Option<JoinHandle<()>> {
        if input.trim().is_empty() {
            return None;
        }

        self.transcript
            .push(ChatMessage::user(format!("You: {}", input)));

        let router = self.router.clone();
        let events = self.events.clone();
        let input = input.to_string();

        Some(tokio::spawn(async move {
            let reply = match tokio::task::spawn_blocking(move || router.respond(&input)).await
            {
                Ok(reply) => reply,
                Err(e) => HowlError::Inference(e.to_string()).to_string(),
            };
            // The receiver is gone only when the app is shutting down.
            let _ = events.send(AppEvent::Reply(reply));
        }))
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }

    /// Apply one background result.
    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::Progress(progress) => self.progress = Some(progress),
            AppEvent::Loading => match self.state.transition(ModelState::Loading) {
                Ok(()) => self.status = LOADING_STATUS.to_string(),
                Err(e) => warn!("Ignoring load start: {}", e),
            },
            AppEvent::ModelReady(handle) => self.install_model(handle),
            AppEvent::ModelFailed(status) => match self.state.transition(ModelState::Failed) {
                Ok(()) => {
                    error!("Model setup failed: {}", status);
                    self.status = status;
                }
                Err(e) => warn!("Ignoring failure report: {}", e),
            },
            AppEvent::Reply(reply) => self
                .transcript
                .push(ChatMessage::system(format!("Howl: {}", reply))),
        }
    }

    /// Mark setup as failed before any background work was started.
    fn fail_setup(&mut self, e: HowlError) -> HowlError {
        error!("Model setup failed: {}", e);
        if let Err(transition) = self.state.transition(ModelState::Failed) {
            warn!("Ignoring failure report: {}", transition);
        }
        self.status = e.to_string();
        e
    }

    fn install_model(&mut self, handle: ModelHandle) {
        if let Err(e) = self.state.transition(ModelState::Loaded) {
            warn!("Ignoring loaded model: {}", e);
            return;
        }
        if !self.router.install(handle.clone()) {
            warn!("A model is already installed, ignoring {}", handle.path().display());
            return;
        }

        info!(
            "Model ready ({}, {})",
            handle.backend(),
            handle.path().display()
        );
        self.status = READY_STATUS.to_string();
        self.transcript.push(ChatMessage::system(READY_MESSAGE));
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn state(&self) -> ModelState {
        self.state
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn progress(&self) -> Option<DownloadProgress> {
        self.progress
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn router(&self) -> &InferenceRouter {
        &self.router
    }
}

async fn fetch_and_load(fetcher: ModelFetcher, loader: Arc<dyn ModelLoader>, events: EventSender) {
    let progress_events = events.clone();
    let fetched = fetcher
        .fetch(move |progress| {
            let _ = progress_events.send(AppEvent::Progress(progress));
        })
        .await;

    match fetched {
        Ok(download) => {
            let _ = events.send(AppEvent::Loading);
            load_and_report(download.local_path, loader, events).await;
        }
        Err(e) => {
            let _ = events.send(AppEvent::ModelFailed(e.to_string()));
        }
    }
}

async fn load_and_report(path: PathBuf, loader: Arc<dyn ModelLoader>, events: EventSender) {
    let loaded = tokio::task::spawn_blocking(move || loader.load(&path)).await;

    let event = match loaded {
        Ok(Ok(handle)) => AppEvent::ModelReady(handle),
        Ok(Err(e)) => AppEvent::ModelFailed(e.to_string()),
        Err(e) => AppEvent::ModelFailed(HowlError::ModelLoad(e.to_string()).to_string()),
    };
    let _ = events.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Origin;
    use crate::config::FetchConfig;
    use crate::model::test_server::{refused_url, serve_once};
    use crate::router::stub::stub_handle;
    use crate::router::NOT_LOADED_REPLY;
    use std::path::Path;
    use tempfile::tempdir;

    fn drain(app: &mut ChatApp, rx: &mut EventReceiver) {
        while let Ok(event) = rx.try_recv() {
            app.apply(event);
        }
    }

    fn fetcher_for(url: String, dir: &Path) -> ModelFetcher {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        ModelFetcher::with_client(FetchConfig::new(url, dir), client)
    }

    fn stub_loader(reply: Option<&'static str>) -> Arc<dyn ModelLoader> {
        Arc::new(move |_path: &Path| -> Result<ModelHandle> { Ok(stub_handle(reply)) })
    }

    fn failing_loader() -> Arc<dyn ModelLoader> {
        Arc::new(|_path: &Path| -> Result<ModelHandle> {
            Err(HowlError::ModelLoad("unsupported format".into()))
        })
    }

    struct NoBackend;

    impl ModelLoader for NoBackend {
        fn available(&self) -> Result<()> {
            Err(HowlError::BackendUnavailable)
        }

        fn load(&self, path: &Path) -> Result<ModelHandle> {
            panic!("load called for {}", path.display());
        }
    }

    #[tokio::test]
    async fn test_send_before_load_gets_placeholder() {
        let (mut app, mut rx) = ChatApp::new(ChatConfig::default());
        assert_eq!(app.state(), ModelState::NotLoaded);

        app.submit("hello").unwrap().await.unwrap();
        drain(&mut app, &mut rx);

        let texts: Vec<_> = app
            .transcript()
            .messages()
            .iter()
            .map(|m| m.text.clone())
            .collect();
        assert_eq!(
            texts,
            vec![
                "You: hello".to_string(),
                format!("Howl: {}", NOT_LOADED_REPLY)
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let (mut app, _rx) = ChatApp::new(ChatConfig::default());
        assert!(app.submit("").is_none());
        assert!(app.submit("   ").is_none());
        assert!(app.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_length_counts_sends_since_clear() {
        let (mut app, _rx) = ChatApp::new(ChatConfig::default());
        let rounds: [&[usize]; 4] = [&[3], &[2, 0], &[0, 5, 1], &[4, 4, 4]];

        for round in rounds {
            for &sends in round {
                app.clear();
                for i in 0..sends {
                    app.submit(&format!("message {}", i));
                }
                assert_eq!(app.transcript().len(), sends);
                assert_eq!(app.transcript().count_from(Origin::User), sends);
            }
        }
    }

    #[tokio::test]
    async fn test_clear_with_no_messages() {
        let (mut app, _rx) = ChatApp::new(ChatConfig::default());
        app.clear();
        assert!(app.transcript().is_empty());
        assert_eq!(app.transcript().render(), "");
    }

    #[tokio::test]
    async fn test_download_failure_never_loads() {
        let temp_dir = tempdir().unwrap();
        let (mut app, mut rx) = ChatApp::new(ChatConfig::default());
        let fetcher = fetcher_for(refused_url().await, temp_dir.path());

        let task = app
            .start_model_setup(fetcher, stub_loader(Some("unused")))
            .unwrap();
        assert_eq!(app.status(), DOWNLOADING_STATUS);
        assert_eq!(app.state(), ModelState::Downloading);

        task.await.unwrap();
        drain(&mut app, &mut rx);

        assert_eq!(app.state(), ModelState::Failed);
        assert!(app.status().starts_with("Download failed:"));
        assert!(!app.router().is_loaded());
        assert!(app.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_setup_then_chat() {
        let temp_dir = tempdir().unwrap();
        let (mut app, mut rx) = ChatApp::new(ChatConfig::default());
        let fetcher = fetcher_for(serve_once("200 OK", b"GGUF").await, temp_dir.path());

        app.start_model_setup(fetcher, stub_loader(Some("Hello, human.")))
            .unwrap()
            .await
            .unwrap();
        drain(&mut app, &mut rx);

        assert_eq!(app.state(), ModelState::Loaded);
        assert_eq!(app.status(), READY_STATUS);
        assert_eq!(app.progress().map(|p| p.bytes_done), Some(4));
        assert_eq!(app.transcript().messages()[0].text, READY_MESSAGE);

        app.submit("hello").unwrap().await.unwrap();
        drain(&mut app, &mut rx);

        let last = app.transcript().messages().last().unwrap();
        assert_eq!(last.origin, Origin::System);
        assert_eq!(last.text, "Howl: Hello, human.");
    }

    #[tokio::test]
    async fn test_load_failure_reports_status() {
        let temp_dir = tempdir().unwrap();
        let (mut app, mut rx) = ChatApp::new(ChatConfig::default());
        let fetcher = fetcher_for(serve_once("200 OK", b"GGUF").await, temp_dir.path());

        app.start_model_setup(fetcher, failing_loader())
            .unwrap()
            .await
            .unwrap();
        drain(&mut app, &mut rx);

        assert_eq!(app.state(), ModelState::Failed);
        assert_eq!(app.status(), "Failed to load model: unsupported format");
    }

    #[tokio::test]
    async fn test_local_load_skips_download() {
        let (mut app, mut rx) = ChatApp::new(ChatConfig::default());

        app.start_local_load("model.gguf", stub_loader(Some("hi")))
            .unwrap()
            .await
            .unwrap();
        drain(&mut app, &mut rx);

        assert_eq!(app.state(), ModelState::Loaded);
        assert!(app.progress().is_none());
    }

    #[tokio::test]
    async fn test_setup_cannot_restart_after_load() {
        let temp_dir = tempdir().unwrap();
        let (mut app, mut rx) = ChatApp::new(ChatConfig::default());
        app.start_local_load("model.gguf", stub_loader(Some("hi")))
            .unwrap()
            .await
            .unwrap();
        drain(&mut app, &mut rx);

        let fetcher = fetcher_for(refused_url().await, temp_dir.path());
        let err = app
            .start_model_setup(fetcher, stub_loader(Some("again")))
            .unwrap_err();
        assert!(matches!(err, HowlError::InvalidTransition { .. }));
        assert_eq!(app.state(), ModelState::Loaded);
    }

    #[tokio::test]
    async fn test_second_model_ready_is_ignored() {
        let (mut app, _rx) = ChatApp::new(ChatConfig::default());
        app.start_local_load("model.gguf", stub_loader(Some("first")))
            .unwrap();

        app.apply(AppEvent::ModelReady(stub_handle(Some("first"))));
        app.apply(AppEvent::ModelReady(stub_handle(Some("second"))));

        assert_eq!(app.transcript().count_from(Origin::System), 1);
        assert_eq!(app.router().respond("x"), "first");
    }

    #[tokio::test]
    async fn test_setup_without_backend_skips_download() {
        let temp_dir = tempdir().unwrap();
        let (mut app, mut rx) = ChatApp::new(ChatConfig::default());
        let url = serve_once("200 OK", b"GGUF").await;
        let fetcher = fetcher_for(url, temp_dir.path());

        let err = app
            .start_model_setup(fetcher, Arc::new(NoBackend))
            .unwrap_err();
        assert!(matches!(err, HowlError::BackendUnavailable));
        drain(&mut app, &mut rx);

        assert_eq!(app.state(), ModelState::Failed);
        assert_eq!(
            app.status(),
            "Failed to load model: inference backend not compiled in"
        );
        assert!(app.progress().is_none());
        assert!(!temp_dir.path().join("model.gguf").exists());
        assert!(!temp_dir.path().join("model.gguf.part").exists());
        assert!(app.transcript().is_empty());
    }

    #[tokio::test]
    async fn test_local_load_without_backend_fails_at_once() {
        let (mut app, mut rx) = ChatApp::new(ChatConfig::default());

        let err = app
            .start_local_load("model.gguf", Arc::new(NoBackend))
            .unwrap_err();
        assert!(matches!(err, HowlError::BackendUnavailable));
        drain(&mut app, &mut rx);

        assert_eq!(app.state(), ModelState::Failed);
        assert_eq!(app.status(), err.to_string());

        app.submit("hello").unwrap().await.unwrap();
        drain(&mut app, &mut rx);
        let last = app.transcript().messages().last().unwrap();
        assert_eq!(last.text, format!("Howl: {}", NOT_LOADED_REPLY));
    }
}
