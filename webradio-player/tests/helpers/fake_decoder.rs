//! In-memory decoder speaking the remote-control protocol
//!
//! Answers commands the way the real decoder does: `LOAD` with `@P 2`,
//! `STOP` with `@P 0`, `PAUSE` with `@P 1`/`@P 2` and `SAMPLE` with a
//! position line. End of track is simulated with [`FakeDecoder::finish_track`].

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use webradio_player::DecoderSupervisor;

pub struct FakeDecoder {
    loads: Arc<AtomicUsize>,
    hold_loads: Arc<AtomicBool>,
    commands: Arc<Mutex<Vec<String>>>,
    inject: mpsc::UnboundedSender<String>,
    handle: JoinHandle<()>,
}

impl FakeDecoder {
    /// Attach a fresh fake decoder to `decoder`
    pub async fn attach(decoder: &DecoderSupervisor) -> Self {
        let (supervisor_writer, commands_in) = tokio::io::duplex(4096);
        let (output, supervisor_reader) = tokio::io::duplex(4096);

        let loads = Arc::new(AtomicUsize::new(0));
        let hold_loads = Arc::new(AtomicBool::new(false));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let (inject, inject_rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(run(
            commands_in,
            output,
            inject_rx,
            Arc::clone(&loads),
            Arc::clone(&hold_loads),
            Arc::clone(&commands),
        ));

        decoder
            .attach(supervisor_writer, supervisor_reader)
            .await
            .expect("Failed to attach fake decoder");

        Self {
            loads,
            hold_loads,
            commands,
            inject,
            handle,
        }
    }

    /// Number of LOAD/LOADLIST commands received
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Stop answering loads; acknowledge them with `emit("@P 2")`
    pub fn hold_loads(&self) {
        self.hold_loads.store(true, Ordering::SeqCst);
    }

    /// All command lines received so far
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Report the end of the current track
    pub fn finish_track(&self) {
        self.emit("@P 0");
    }

    /// Write an arbitrary output line
    pub fn emit(&self, line: &str) {
        self.inject
            .send(line.to_string())
            .expect("Fake decoder is gone");
    }

    /// Simulate a crash: the output closes without an answer
    pub fn kill(&self) {
        self.handle.abort();
    }
}

impl Drop for FakeDecoder {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    commands_in: DuplexStream,
    mut output: DuplexStream,
    mut inject: mpsc::UnboundedReceiver<String>,
    loads: Arc<AtomicUsize>,
    hold_loads: Arc<AtomicBool>,
    commands: Arc<Mutex<Vec<String>>>,
) {
    let mut lines = BufReader::new(commands_in).lines();
    let mut paused = false;

    loop {
        let reply = tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    commands.lock().unwrap().push(line.clone());
                    let verb = line.split_whitespace().next().unwrap_or_default();
                    match verb {
                        "LOAD" | "LOADLIST" => {
                            loads.fetch_add(1, Ordering::SeqCst);
                            paused = false;
                            (!hold_loads.load(Ordering::SeqCst)).then_some("@P 2")
                        }
                        "STOP" => Some("@P 0"),
                        "PAUSE" => {
                            paused = !paused;
                            Some(if paused { "@P 1" } else { "@P 2" })
                        }
                        "SAMPLE" => Some("@SAMPLE 25 100"),
                        "QUIT" => break,
                        _ => None,
                    }
                    .map(str::to_string)
                }
                _ => break,
            },
            Some(line) = inject.recv() => Some(line),
        };

        if let Some(reply) = reply {
            // Frame lines are noise the supervisor must skip
            let text = format!("@F 1 2 0.01 0.02\n{}\n", reply);
            if output.write_all(text.as_bytes()).await.is_err() {
                break;
            }
        }
    }
}
