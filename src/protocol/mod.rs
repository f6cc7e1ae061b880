//! This module provides abstractions for working with protocols.
//!
//! Both sides of a verification, the aggregation server and the verifier,
//! are written as explicit state machines implementing [Protocol]. You feed
//! them the messages you receive, and poke them to learn what they want to
//! send next. This keeps the cryptography independent from how bytes actually
//! move: the same sessions run in memory with [run_two_party_protocol], or
//! over a socket with the drivers in [crate::transport].
use serde::Serialize;
use thiserror::Error;

use crate::compat::CurveError;

/// Represents an error which can happen when running a protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A curve operation failed, e.g. a peer sent a point not on the curve.
    #[error("curve operation failed: {0}")]
    Curve(#[from] CurveError),
    /// A message had the wrong size for the round it arrived in.
    #[error("malformed message: expected {expected} bytes, found {found}")]
    MalformedMessage { expected: usize, found: usize },
    /// Some assertion in the protocol failed.
    #[error("assertion failed {0}")]
    AssertionFailed(String),
}

/// Represents an error which can happen when *initializing* a protocol,
/// or setting up the state it runs on.
///
/// These are related to bad parameters, and things like that.
#[derive(Debug, Error)]
pub enum InitializationError {
    /// The parameters are inconsistent, or don't match another party's.
    #[error("bad parameters: {0}")]
    BadParameters(String),
    /// Some serialized state could not be decoded.
    #[error("bad encoding: {0}")]
    BadEncoding(String),
    /// Precomputation hit a degenerate value.
    #[error("precomputation failed: {0}")]
    Curve(#[from] CurveError),
}

/// Represents a participant in the protocol.
///
/// Each participant should be uniquely identified by some number, which this
/// struct holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Hash)]
pub struct Participant(u32);

impl From<Participant> for u32 {
    fn from(p: Participant) -> Self {
        p.0
    }
}

impl From<u32> for Participant {
    fn from(x: u32) -> Self {
        Participant(x)
    }
}

/// Represents the data making up a message.
///
/// Messages are raw frames of a fixed size per round, with no header.
pub type MessageData = Vec<u8>;

/// Represents an action by a participant in the protocol.
///
/// The basic flow is that each participant receives messages from other participants,
/// and then reacts with some kind of action.
///
/// This action can consist of sending a message, doing nothing, etc.
///
/// Eventually, the participant returns a value, ending the protocol.
#[derive(Debug, Clone)]
pub enum Action<T> {
    /// Don't do anything.
    Wait,
    /// Send a private message to another participant.
    SendPrivate(Participant, MessageData),
    /// End the protocol by returning a value.
    Return(T),
}

/// A trait for protocols.
///
/// Basically, this represents a struct for the behavior of a single participant
/// in a protocol. The idea is that the computation of that participant is driven
/// mainly by receiving messages from other participants.
pub trait Protocol {
    type Output;

    /// Poke the protocol, receiving a new action.
    ///
    /// The idea is that the protocol should be poked until it returns an error,
    /// or it returns an action with a return value, or it returns a wait action.
    ///
    /// Upon returning a wait action, that protocol will not advance any further
    /// until a new message arrives.
    fn poke(&mut self) -> Result<Action<Self::Output>, ProtocolError>;

    /// Inform the protocol of a new message.
    ///
    /// Problems with the message are reported by the next call to [Protocol::poke].
    fn message(&mut self, from: Participant, data: MessageData);
}

/// Run a two party protocol to completion, synchronously.
///
/// This is mainly a testing utility: in practice each side runs on a
/// different machine, and the transport drives it.
///
/// This fails if both sides end up waiting on each other.
pub fn run_two_party_protocol<T0, T1>(
    p0: Participant,
    p1: Participant,
    prot0: &mut dyn Protocol<Output = T0>,
    prot1: &mut dyn Protocol<Output = T1>,
) -> Result<(T0, T1), ProtocolError> {
    let mut active0 = true;
    // The number of consecutive wait actions, across both sides.
    let mut idle = 0;

    let mut out0 = None;
    let mut out1 = None;

    loop {
        match (&out0, &out1) {
            (Some(_), Some(_)) => break,
            // Once a side has returned, only the other one gets poked.
            (Some(_), None) => active0 = false,
            (None, Some(_)) => active0 = true,
            (None, None) => {}
        }
        if idle >= 2 {
            return Err(ProtocolError::AssertionFailed(
                "both participants are waiting".to_string(),
            ));
        }
        if active0 {
            match prot0.poke()? {
                Action::Wait => {
                    active0 = false;
                    idle += 1;
                    continue;
                }
                Action::SendPrivate(to, m) if to == p1 => prot1.message(p0, m),
                Action::Return(out) => out0 = Some(out),
                // Ignore other actions, which means sending private messages to other people.
                _ => {}
            }
        } else {
            match prot1.poke()? {
                Action::Wait => {
                    active0 = true;
                    idle += 1;
                    continue;
                }
                Action::SendPrivate(to, m) if to == p0 => prot0.message(p1, m),
                Action::Return(out) => out1 = Some(out),
                _ => {}
            }
        }
        idle = 0;
    }

    match (out0, out1) {
        (Some(out0), Some(out1)) => Ok((out0, out1)),
        _ => Err(ProtocolError::AssertionFailed(
            "protocol ended without output".to_string(),
        )),
    }
}
