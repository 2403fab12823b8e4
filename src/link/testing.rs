//! Scripted in-memory transport for link and loop tests

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{FrameConnection, Transport};

pub const SAMUS: &[u8] = b"{\"Name\":\"Samus\"}\n";

/// Behaviour of one dial attempt and, if it succeeds, of its connection
#[derive(Debug, Clone)]
pub enum Script {
    /// Dial is refused
    Refuse,
    /// Dial never completes
    Hang,
    /// Dial fails with an arbitrary error
    DialError(ErrorKind),
    /// Each read pops one reply; `None` never answers, running out is EOF
    Responses { replies: Vec<Option<Vec<u8>>> },
    /// Every read fails with a reset
    ResetOnRead,
    /// Writes never flush
    StallWrites,
}

impl Script {
    /// A game that answers every request
    pub fn healthy() -> Self {
        Script::Responses {
            replies: vec![Some(SAMUS.to_vec()); 64],
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<Mutex<usize>>,
    dials: Arc<Mutex<usize>>,
}

impl ScriptedTransport {
    /// Dial attempts consume `scripts` in order; once exhausted every dial
    /// is refused
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        }
    }

    pub fn sent_frames(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.sent.clone()
    }

    pub fn closed_count(&self) -> Arc<Mutex<usize>> {
        self.closed.clone()
    }

    pub fn dial_count(&self) -> Arc<Mutex<usize>> {
        self.dials.clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    type Conn = ScriptedConnection;

    async fn connect(&self, _host: &str, _port: u16) -> std::io::Result<Self::Conn> {
        *self.dials.lock() += 1;
        let script = self.scripts.lock().pop_front().unwrap_or(Script::Refuse);

        match script {
            Script::Refuse => Err(ErrorKind::ConnectionRefused.into()),
            Script::Hang => std::future::pending().await,
            Script::DialError(kind) => Err(kind.into()),
            behaviour => Ok(ScriptedConnection {
                replies: match &behaviour {
                    Script::Responses { replies } => replies.clone().into(),
                    _ => VecDeque::new(),
                },
                behaviour,
                sent: self.sent.clone(),
                closed: self.closed.clone(),
            }),
        }
    }
}

#[derive(Debug)]
pub struct ScriptedConnection {
    behaviour: Script,
    replies: VecDeque<Option<Vec<u8>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<Mutex<usize>>,
}

#[async_trait]
impl FrameConnection for ScriptedConnection {
    async fn send(&mut self, frame: &[u8]) -> std::io::Result<()> {
        if matches!(self.behaviour, Script::StallWrites) {
            std::future::pending::<()>().await;
        }
        self.sent.lock().push(frame.to_vec());
        Ok(())
    }

    async fn recv(&mut self) -> std::io::Result<Vec<u8>> {
        if matches!(self.behaviour, Script::ResetOnRead) {
            return Err(ErrorKind::ConnectionReset.into());
        }
        match self.replies.pop_front() {
            Some(Some(frame)) => Ok(frame),
            Some(None) => std::future::pending().await,
            None => Err(ErrorKind::UnexpectedEof.into()),
        }
    }

    async fn close(&mut self) {
        *self.closed.lock() += 1;
    }
}
