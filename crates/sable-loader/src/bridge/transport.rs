// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Message transports: channel pairs for in-process remotes, and
//! newline-delimited JSON over pipes for child processes.

use super::protocol::Envelope;
use crate::error::Result;
use crossbeam::channel::{self, Receiver, Sender};
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::thread;

/// One side of a connection.
#[derive(Debug)]
pub struct Transport {
    pub(crate) outbound: Sender<Envelope>,
    pub(crate) inbound: Receiver<Envelope>,
}

impl Transport {
    /// Two connected in-process ends.
    pub fn in_process_pair() -> (Transport, Transport) {
        let (a_tx, a_rx) = channel::unbounded();
        let (b_tx, b_rx) = channel::unbounded();
        (
            Transport {
                outbound: a_tx,
                inbound: b_rx,
            },
            Transport {
                outbound: b_tx,
                inbound: a_rx,
            },
        )
    }

    /// Spawns `program` and talks to it over its stdin and stdout. The
    /// child's stderr is inherited.
    pub fn spawn_child<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<(Transport, Child)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        tracing::info!(pid = child.id(), "spawned remote process");
        Ok((Self::from_streams(BufReader::new(stdout), stdin), child))
    }

    /// The child's end: this process's stdin and stdout.
    pub fn stdio() -> Transport {
        Self::from_streams(BufReader::new(std::io::stdin()), std::io::stdout())
    }

    /// Frames envelopes as JSON lines over a byte stream pair. A reader and
    /// a writer thread move lines to and from channels; either side closing
    /// disconnects the channels.
    pub fn from_streams<R, W>(reader: R, mut writer: W) -> Transport
    where
        R: BufRead + Send + 'static,
        W: Write + Send + 'static,
    {
        let (out_tx, out_rx) = channel::unbounded::<Envelope>();
        let (in_tx, in_rx) = channel::unbounded::<Envelope>();

        thread::spawn(move || {
            for envelope in out_rx {
                let written = serde_json::to_writer(&mut writer, &envelope)
                    .map_err(std::io::Error::from)
                    .and_then(|()| writer.write_all(b"\n"))
                    .and_then(|()| writer.flush());
                if let Err(e) = written {
                    tracing::debug!(error = %e, "bridge writer closed");
                    break;
                }
            }
        });

        thread::spawn(move || {
            for line in reader.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::debug!(error = %e, "bridge reader closed");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Envelope>(&line) {
                    Ok(envelope) => {
                        if in_tx.send(envelope).is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "dropping malformed bridge message"),
                }
            }
        });

        Transport {
            outbound: out_tx,
            inbound: in_rx,
        }
    }

    /// Sends an envelope; false once the peer is gone.
    pub fn send(&self, envelope: Envelope) -> bool {
        self.outbound.send(envelope).is_ok()
    }

    /// Blocks for the next envelope; `None` once the peer is gone.
    pub fn recv(&self) -> Option<Envelope> {
        self.inbound.recv().ok()
    }
}

fn missing_pipe(name: &str) -> std::io::Error {
    std::io::Error::other(format!("child {name} was not captured"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::Event;
    use std::io::Cursor;

    #[test]
    fn test_in_process_pair() {
        let (a, b) = Transport::in_process_pair();
        assert!(a.send(Envelope::Event {
            event: Event::Quit { status: "OK".into() }
        }));
        assert!(matches!(
            b.recv(),
            Some(Envelope::Event { event: Event::Quit { .. } })
        ));
        drop(a);
        assert!(b.recv().is_none());
    }

    #[test]
    fn test_json_lines_reader_skips_garbage() {
        let input = "not json\n\n{\"kind\":\"event\",\"event\":{\"type\":\"quit\",\"status\":\"done\"}}\n";
        let transport = Transport::from_streams(Cursor::new(input.as_bytes().to_vec()), std::io::sink());
        assert_eq!(
            transport.recv(),
            Some(Envelope::Event {
                event: Event::Quit {
                    status: "done".into()
                }
            })
        );
        assert_eq!(transport.recv(), None);
    }
}
