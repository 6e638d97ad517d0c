//! Protocol states and the transition table
//!
//! The table is the whole definition of which bus sequences are legal. Every
//! `(state, event)` pair without a rule is a protocol violation.

use crate::types::EventKind;
use std::fmt;

/// Decoder protocol state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Waiting for a clean bus boundary (entry state)
    Sync,
    /// Bus released, between transactions
    Idle,
    /// Start condition seen, waiting for the address
    Started,
    /// Address acknowledged for a read
    Reading,
    /// Address acknowledged for a write
    Writing,
    /// Address not acknowledged
    Nak,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Sync => "Sync",
            State::Idle => "Idle",
            State::Started => "Started",
            State::Reading => "Reading",
            State::Writing => "Writing",
            State::Nak => "Nak",
        };
        f.write_str(name)
    }
}

/// Side effect attached to a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartBit,
    WriteAddressAck,
    WriteAddressNak,
    ReadAddressAck,
    ReadAddressNak,
    AddData,
    ClearMessage,
    EmitMessage,
    /// Close the current transaction and open the next one without a stop
    RepeatedStart,
}

/// One rule of the transition table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: State,
    pub event: EventKind,
    pub to: State,
    pub action: Option<Action>,
}

const fn rule(from: State, event: EventKind, to: State, action: Option<Action>) -> Transition {
    Transition {
        from,
        event,
        to,
        action,
    }
}

use self::Action as A;
use self::State as S;
use crate::types::EventKind as E;

/// The complete transition table, consulted in order
pub static TRANSITIONS: &[Transition] = &[
    // Resynchronization: only framing events matter until a boundary is seen
    rule(S::Sync, E::StartBit, S::Started, Some(A::StartBit)),
    rule(S::Sync, E::RepeatedStartBit, S::Started, Some(A::StartBit)),
    rule(S::Sync, E::StopBit, S::Idle, None),
    rule(S::Sync, E::WriteAddressAck, S::Sync, None),
    rule(S::Sync, E::WriteAddressNak, S::Sync, None),
    rule(S::Sync, E::ReadAddressAck, S::Sync, None),
    rule(S::Sync, E::ReadAddressNak, S::Sync, None),
    rule(S::Sync, E::DataAck, S::Sync, None),
    rule(S::Sync, E::DataNak, S::Sync, None),
    rule(S::Idle, E::StartBit, S::Started, Some(A::StartBit)),
    rule(S::Started, E::WriteAddressAck, S::Writing, Some(A::WriteAddressAck)),
    rule(S::Started, E::WriteAddressNak, S::Nak, Some(A::WriteAddressNak)),
    rule(S::Started, E::ReadAddressAck, S::Reading, Some(A::ReadAddressAck)),
    rule(S::Started, E::ReadAddressNak, S::Nak, Some(A::ReadAddressNak)),
    rule(S::Started, E::StopBit, S::Idle, Some(A::ClearMessage)),
    rule(S::Writing, E::DataAck, S::Writing, Some(A::AddData)),
    rule(S::Writing, E::DataNak, S::Writing, Some(A::AddData)),
    rule(S::Writing, E::StopBit, S::Idle, Some(A::EmitMessage)),
    rule(S::Writing, E::RepeatedStartBit, S::Started, Some(A::RepeatedStart)),
    rule(S::Reading, E::DataAck, S::Reading, Some(A::AddData)),
    rule(S::Reading, E::DataNak, S::Reading, Some(A::AddData)),
    rule(S::Reading, E::StopBit, S::Idle, Some(A::EmitMessage)),
    rule(S::Reading, E::RepeatedStartBit, S::Started, Some(A::RepeatedStart)),
    rule(S::Nak, E::StopBit, S::Idle, Some(A::EmitMessage)),
];

/// Find the rule for `(state, event)`; `None` means the event is illegal here
pub fn lookup(state: State, event: EventKind) -> Option<&'static Transition> {
    TRANSITIONS
        .iter()
        .find(|rule| rule.from == state && rule.event == event)
}
