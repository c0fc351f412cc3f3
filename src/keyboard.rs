//! Key events read from a terminal.
//!
//! Without a window to deliver key presses, keys are read
//! byte by byte from a reader (usually stdin) on a
//! background thread and handed to the session loop over a
//! channel, so polling never blocks the frame loop.
//!
//! SIGINT and SIGTERM can be routed into the same channel
//! as a quit event, so the session still closes its sinks.

use std::io::{self, Read};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use tracing::debug;

use crate::input::InputEvent;

/// Non-blocking source of input events.
pub struct KeyEvents {
    tx: Sender<InputEvent>,
    rx: Receiver<InputEvent>,
}

impl KeyEvents {
    /// Read keys from `rdr` on a detached thread. The thread
    /// exits at end of input or once the receiver is gone.
    pub fn spawn<R: Read + Send + 'static>(rdr: R) -> io::Result<Self> {
        let (tx, rx) = unbounded();
        let keys = tx.clone();
        thread::Builder::new()
            .name("keyboard".into())
            .spawn(move || {
                for byte in rdr.bytes() {
                    let byte = match byte {
                        Ok(b) => b,
                        Err(e) => {
                            debug!("key reader stopped: {}", e);
                            break;
                        }
                    };
                    let event = InputEvent::from_key(byte);
                    if event == InputEvent::None {
                        continue;
                    }
                    if keys.send(event).is_err() {
                        break;
                    }
                }
            })?;
        Ok(KeyEvents { tx, rx })
    }

    /// Turn SIGINT / SIGTERM into [`InputEvent::Quit`]. Can
    /// only be installed once per process.
    pub fn quit_on_signal(&self) -> Result<(), ctrlc::Error> {
        let quit = self.quitter();
        ctrlc::set_handler(move || quit())
    }

    fn quitter(&self) -> impl Fn() + Send + 'static {
        let tx = self.tx.clone();
        move || {
            if tx.send(InputEvent::Quit).is_ok() {
                debug!("termination signal received");
            }
        }
    }

    pub fn stdin() -> io::Result<Self> {
        KeyEvents::spawn(io::stdin())
    }

    /// The next pending event, or [`InputEvent::None`].
    pub fn poll(&self) -> InputEvent {
        match self.rx.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => InputEvent::None,
        }
    }
}
