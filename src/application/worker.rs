use crate::application::orchestrator::Orchestrator;
use crate::domain::progress::{progress_channel, ProgressReceiver};
use crate::domain::request::RunRequest;
use std::io;
use std::path::PathBuf;
use std::thread::JoinHandle;
use tokio::sync::mpsc;

/// What a desktop-style front-end hears from a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerMessage {
    Status(String),
    Progress(u8),
    /// Directory holding the output file.
    Finished(PathBuf),
    /// Always followed by `Progress(0)`.
    Failed(String),
}

/// One run on a dedicated OS thread with its own runtime.
pub struct RunWorker {
    thread: JoinHandle<()>,
    messages: mpsc::UnboundedReceiver<WorkerMessage>,
}

impl RunWorker {
    pub fn spawn(orchestrator: Orchestrator, request: RunRequest) -> io::Result<Self> {
        let (tx, messages) = mpsc::unbounded_channel();
        let thread = std::thread::Builder::new()
            .name(String::from("audiostem-run"))
            .spawn(move || run_on_thread(orchestrator, request, tx))?;
        Ok(Self { thread, messages })
    }

    /// Next message, or `None` once the run has ended and everything was read.
    /// Must not be called from inside an async context.
    pub fn recv_blocking(&mut self) -> Option<WorkerMessage> {
        self.messages.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<WorkerMessage> {
        self.messages.recv().await
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) {
        if self.thread.join().is_err() {
            tracing::error!("run thread panicked");
        }
    }
}

fn run_on_thread(
    orchestrator: Orchestrator,
    request: RunRequest,
    out: mpsc::UnboundedSender<WorkerMessage>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            fail(&out, format!("cannot start runtime: {}", e));
            return;
        }
    };

    runtime.block_on(async {
        let (tx, rx) = progress_channel();
        let (result, ()) = tokio::join!(orchestrator.run(&request, Some(tx)), forward(rx, &out));
        match result {
            Ok(path) => {
                let dir = path.parent().map(PathBuf::from).unwrap_or(path);
                let _ = out.send(WorkerMessage::Finished(dir));
            }
            Err(e) => fail(&out, e.to_string()),
        }
    });
}

async fn forward(mut rx: ProgressReceiver, out: &mpsc::UnboundedSender<WorkerMessage>) {
    while let Some(event) = rx.recv().await {
        let _ = out.send(WorkerMessage::Status(event.label));
        let _ = out.send(WorkerMessage::Progress(event.percent));
    }
}

fn fail(out: &mpsc::UnboundedSender<WorkerMessage>, message: String) {
    let _ = out.send(WorkerMessage::Failed(message));
    let _ = out.send(WorkerMessage::Progress(0));
}
