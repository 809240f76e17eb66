use crate::config::{ActionsConfig, Config};
use crate::filter::{ScanOrchestrator, ScanResult};
use crate::message::MessageNode;
use indymilter::{run, Actions, Callbacks, Config as IndyConfig, Context, ContextActions, EomContext, Status};
use std::ffi::CString;
use std::sync::Arc;
use tokio::net::UnixListener;

pub struct Milter {
    engine: Arc<ScanOrchestrator>,
    actions: Arc<ActionsConfig>,
    max_body_size: usize,
}

/// Raw message accumulated over one SMTP transaction.
#[derive(Debug, Default)]
pub struct Session {
    headers: Vec<u8>,
    body: Vec<u8>,
    truncated: bool,
}

impl Session {
    fn add_header(&mut self, name: &str, value: &str) {
        self.headers.extend_from_slice(name.as_bytes());
        self.headers.extend_from_slice(b": ");
        self.headers.extend_from_slice(value.as_bytes());
        self.headers.extend_from_slice(b"\r\n");
    }

    /// Buffer a body chunk, keeping at most `limit` bytes. Anything past the
    /// limit is dropped and the buffered prefix is scanned on its own.
    fn append_body(&mut self, chunk: &[u8], limit: usize) {
        let room = limit.saturating_sub(self.body.len());
        if chunk.len() > room {
            if !self.truncated {
                log::warn!("Message body exceeds {} bytes, scanning the first {} only", limit, limit);
                self.truncated = true;
            }
            self.body.extend_from_slice(&chunk[..room]);
        } else {
            self.body.extend_from_slice(chunk);
        }
    }

    fn raw_message(&self) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.headers.len() + self.body.len() + 2);
        raw.extend_from_slice(&self.headers);
        raw.extend_from_slice(b"\r\n");
        raw.extend_from_slice(&self.body);
        raw
    }
}

/// What to do with a message once it has been scanned.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept,
    Tag { headers: Vec<(String, String)> },
    Reject,
}

impl Verdict {
    pub fn from_result(result: &ScanResult, actions: &ActionsConfig) -> Self {
        if !result.hit {
            return Verdict::Accept;
        }

        if let Some(threshold) = actions.reject_threshold {
            if result.score >= threshold {
                return Verdict::Reject;
            }
        }

        let categories = result
            .categories
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let part = result
            .triggering_part
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_default();

        Verdict::Tag {
            headers: vec![
                (actions.score_header.clone(), format!("{:.2}", result.score)),
                (actions.part_header.clone(), format!("{} ({})", part, categories)),
            ],
        }
    }
}

/// Parse and scan a complete raw message. Messages that cannot be parsed are
/// accepted; the failure is logged.
pub fn verdict_for_message(engine: &ScanOrchestrator, actions: &ActionsConfig, raw: &[u8]) -> Verdict {
    let root = match MessageNode::parse(raw) {
        Ok(root) => root,
        Err(e) => {
            log::warn!("Unable to parse message, accepting: {:#}", e);
            return Verdict::Accept;
        }
    };

    let result = engine.evaluate(&root);
    log::debug!(
        "Scan finished: score {:.2}, {} of {} candidate part(s) examined",
        result.score,
        result.candidates_examined,
        result.candidates_found
    );
    Verdict::from_result(&result, actions)
}

impl Milter {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let engine = Arc::new(config.build_orchestrator()?);
        Ok(Milter {
            engine,
            actions: Arc::new(config.actions.clone()),
            max_body_size: config.max_body_size,
        })
    }

    pub async fn run(&self, socket_path: &str) -> anyhow::Result<()> {
        log::info!("Starting milter on: {}", socket_path);
        // Remove existing socket if it exists
        if std::path::Path::new(socket_path).exists() {
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        let engine = self.engine.clone();
        let actions = self.actions.clone();
        let max_body_size = self.max_body_size;

        let callbacks = Callbacks::<Session>::new()
            .on_mail(|ctx, _sender| Box::pin(handle_mail(ctx)))
            .on_header(|ctx, name, value| Box::pin(handle_header(ctx, name, value)))
            .on_body(move |ctx, chunk| Box::pin(handle_body(ctx, chunk, max_body_size)))
            .on_eom(move |ctx| Box::pin(handle_eom(engine.clone(), actions.clone(), ctx)))
            .on_abort(|ctx| Box::pin(handle_abort(ctx)));

        // Configure indymilter to enable ADD_HEADER action
        let config = IndyConfig {
            actions: Actions::ADD_HEADER,
            ..Default::default()
        };

        run(listener, callbacks, config, tokio::signal::ctrl_c()).await?;
        Ok(())
    }
}

async fn handle_mail(ctx: &mut Context<Session>) -> Status {
    ctx.data = Some(Session::default());
    Status::Continue
}

async fn handle_header(ctx: &mut Context<Session>, name: CString, value: CString) -> Status {
    let name = name.to_string_lossy();
    let value = value.to_string_lossy();
    log::debug!("Header: {}: {}", name, value);
    ctx.data.get_or_insert_with(Session::default).add_header(&name, &value);
    Status::Continue
}

async fn handle_body(ctx: &mut Context<Session>, chunk: bytes::Bytes, max_body_size: usize) -> Status {
    ctx.data
        .get_or_insert_with(Session::default)
        .append_body(&chunk, max_body_size);
    Status::Continue
}

async fn handle_abort(ctx: &mut Context<Session>) -> Status {
    ctx.data = None;
    Status::Continue
}

async fn handle_eom(
    engine: Arc<ScanOrchestrator>,
    actions: Arc<ActionsConfig>,
    ctx: &mut EomContext<Session>,
) -> Status {
    log::info!("End of message - scanning attachments");

    let Some(session) = ctx.data.take() else {
        return Status::Accept;
    };

    match verdict_for_message(&engine, &actions, &session.raw_message()) {
        Verdict::Accept => {
            log::info!("Accepting message");
            Status::Accept
        }
        Verdict::Reject => {
            log::info!("Rejecting message with embedded script attachment");
            Status::Reject
        }
        Verdict::Tag { headers } => {
            for (name, value) in headers {
                log::info!("Tagging message: {}: {}", name, value);
                if let Err(e) = ctx.actions.add_header(name, value).await {
                    log::error!("Failed to add header: {}", e);
                }
            }
            Status::Accept
        }
    }
}
