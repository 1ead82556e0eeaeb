// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Request/reply correlation over a [`Transport`].

use super::protocol::{Envelope, Event, Reply, Request, RequestId};
use super::transport::Transport;
use crate::error::{LoaderError, Result};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// A request or event from the peer.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Must be answered with [`Endpoint::reply`]
    Request {
        /// Correlation id
        id: RequestId,
        /// Payload
        request: Request,
    },
    /// One-way
    Event(Event),
}

type Pending = Arc<Mutex<HashMap<RequestId, Sender<Reply>>>>;

/// Our end of a bridge connection.
///
/// A reader thread hands each reply to the one-shot channel of the request
/// it answers, so any number of requests may be in flight. Everything else
/// is queued for [`recv`](Self::recv).
#[derive(Debug)]
pub struct Endpoint {
    outbound: Sender<Envelope>,
    incoming: Receiver<Incoming>,
    pending: Pending,
    next_id: AtomicU64,
}

impl Endpoint {
    /// Starts routing messages from `transport`.
    pub fn new(transport: Transport) -> Self {
        let Transport { outbound, inbound } = transport;
        let (incoming_tx, incoming) = channel::unbounded();
        let pending: Pending = Arc::default();

        let routes = pending.clone();
        thread::spawn(move || {
            for envelope in inbound {
                let forwarded = match envelope {
                    Envelope::Reply { id, reply } => {
                        match routes.lock().remove(&id) {
                            Some(waiter) => {
                                if waiter.send(reply).is_err() {
                                    tracing::debug!(id, "requester stopped waiting");
                                }
                            }
                            None => tracing::warn!(id, "reply to unknown request"),
                        }
                        continue;
                    }
                    Envelope::Request { id, request } => Incoming::Request { id, request },
                    Envelope::Event { event } => Incoming::Event(event),
                };
                if incoming_tx.send(forwarded).is_err() {
                    break;
                }
            }
            // Dropping the senders fails every waiting request.
            routes.lock().clear();
            tracing::debug!("bridge peer disconnected");
        });

        Self {
            outbound,
            incoming,
            pending,
            next_id: AtomicU64::new(1),
        }
    }

    /// Sends `request` and blocks until its reply arrives. Requests and
    /// events that arrive first are handed to `dispatch`.
    pub fn request(&self, request: Request, dispatch: &mut dyn FnMut(Incoming)) -> Result<Reply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (waiter, reply) = channel::bounded(1);
        self.pending.lock().insert(id, waiter);

        tracing::trace!(id, ?request, "bridge request");
        if self.outbound.send(Envelope::Request { id, request }).is_err() {
            self.pending.lock().remove(&id);
            return Err(disconnected());
        }

        loop {
            channel::select! {
                recv(reply) -> reply => return reply.map_err(|_| disconnected()),
                recv(self.incoming) -> message => match message {
                    Ok(message) => dispatch(message),
                    // The reader is gone; a reply may still have been routed.
                    Err(_) => return reply.try_recv().map_err(|_| disconnected()),
                },
            }
        }
    }

    /// Answers a request from the peer.
    pub fn reply(&self, id: RequestId, reply: Reply) -> Result<()> {
        self.send(Envelope::Reply { id, reply })
    }

    /// Sends a one-way event.
    pub fn send_event(&self, event: Event) -> Result<()> {
        self.send(Envelope::Event { event })
    }

    fn send(&self, envelope: Envelope) -> Result<()> {
        self.outbound.send(envelope).map_err(|_| disconnected())
    }

    /// Blocks for the next request or event; `None` once the peer is gone.
    pub fn recv(&self) -> Option<Incoming> {
        self.incoming.recv().ok()
    }

    /// The next request or event, if one is queued.
    pub fn try_recv(&self) -> Option<Incoming> {
        self.incoming.try_recv().ok()
    }

    /// Number of requests awaiting replies.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}

fn disconnected() -> LoaderError {
    LoaderError::remote("bridge peer disconnected")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::protocol::{CallOutcome, RequireResponse};
    use serde_json::json;

    #[test]
    fn test_events_arriving_before_the_reply_are_dispatched() {
        let (ours, theirs) = Transport::in_process_pair();
        let endpoint = Endpoint::new(ours);

        let peer = thread::spawn(move || {
            let Some(Envelope::Request { id, .. }) = theirs.recv() else {
                panic!("expected a request");
            };
            theirs.send(Envelope::Event {
                event: Event::Message {
                    name: "progress".into(),
                    args: vec![json!(50)],
                },
            });
            theirs.send(Envelope::Reply {
                id,
                reply: Reply::Require(RequireResponse::NotFound),
            });
        });

        let mut seen = Vec::new();
        let reply = endpoint
            .request(
                Request::Require {
                    base_path: None,
                    identifier: "x".into(),
                },
                &mut |message| seen.push(message),
            )
            .unwrap();
        peer.join().unwrap();

        assert_eq!(reply, Reply::Require(RequireResponse::NotFound));
        assert_eq!(
            seen,
            [Incoming::Event(Event::Message {
                name: "progress".into(),
                args: vec![json!(50)]
            })]
        );
        assert_eq!(endpoint.in_flight(), 0);
    }

    #[test]
    fn test_disconnect_fails_waiting_request() {
        let (ours, theirs) = Transport::in_process_pair();
        let endpoint = Endpoint::new(ours);
        let peer = thread::spawn(move || {
            let _ = theirs.recv();
            drop(theirs);
        });
        let err = endpoint
            .request(
                Request::Call {
                    name: "x".into(),
                    args: vec![],
                },
                &mut |_| {},
            )
            .unwrap_err();
        peer.join().unwrap();
        assert!(matches!(err, LoaderError::RemoteProcess { .. }));
    }

    #[test]
    fn test_reply_shapes() {
        let (ours, theirs) = Transport::in_process_pair();
        let endpoint = Endpoint::new(ours);
        endpoint
            .reply(3, Reply::Call(CallOutcome::ReturnValue(json!(true))))
            .unwrap();
        assert_eq!(
            theirs.recv(),
            Some(Envelope::Reply {
                id: 3,
                reply: Reply::Call(CallOutcome::ReturnValue(json!(true)))
            })
        );
    }
}
