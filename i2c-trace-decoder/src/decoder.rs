//! Main decoder API
//!
//! [`Decoder`] is the bus-event state machine: it is fed one event at a time,
//! validates the event against the transition table, runs the attached action
//! and surfaces a [`Transaction`] when a transaction addressed to the filtered
//! device closes. [`TraceDecoder`] drives a decoder over a whole trace.

use crate::config::{DecoderConfig, RepeatedStartPolicy};
use crate::formats::CsvTraceReader;
use crate::transitions::{self, Action, State};
use crate::types::{format_time, BusEvent, DecoderError, Direction, Position, Result, Transaction};
use std::fs::File;
use std::path::Path;

/// Counters describing what a decoder did with its input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Events fed to `process`, including discarded and rejected ones
    pub events: u64,
    /// Events dropped because the cutoff passed while idle
    pub discarded: u64,
    /// Transactions opened by a start condition
    pub opened: u64,
    /// Transactions closed by a stop before any address was seen
    pub aborted: u64,
    /// Transactions closed with an address
    pub closed: u64,
    /// Closed transactions that matched the address filter
    pub emitted: u64,
    /// Closed transactions dropped by the address filter
    pub filtered: u64,
}

#[derive(Debug, Clone, PartialEq)]
struct Header {
    direction: Direction,
    address: u32,
    address_text: String,
    nak: bool,
}

/// The in-progress transaction
#[derive(Debug, Clone, Default, PartialEq)]
struct Message {
    start_time: Option<f64>,
    header: Option<Header>,
    data: Vec<String>,
}

impl Message {
    fn finish(self) -> Option<Transaction> {
        let header = self.header?;
        Some(Transaction {
            start_time: self.start_time,
            direction: header.direction,
            address: header.address,
            address_text: header.address_text,
            nak: header.nak,
            data: self.data,
        })
    }

    fn render(&self) -> String {
        match self.clone().finish() {
            Some(transaction) => transaction.to_string(),
            None => self
                .start_time
                .map(|time| format!("{} ", format_time(time)))
                .unwrap_or_default(),
        }
    }
}

/// I2C bus-event decoder for a single trace
pub struct Decoder {
    config: DecoderConfig,
    state: State,
    message: Option<Message>,
    stats: DecoderStats,
}

impl Decoder {
    /// Create a decoder in the `Sync` state
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            state: State::Sync,
            message: None,
            stats: DecoderStats::default(),
        }
    }

    /// Current protocol state
    pub fn state(&self) -> State {
        self.state
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Text of the in-progress transaction, empty outside a transaction
    pub fn message(&self) -> String {
        self.message.as_ref().map(Message::render).unwrap_or_default()
    }

    /// Feed one event to the state machine
    ///
    /// Returns the transaction closed by this event if it is addressed to the
    /// filtered device. Once the cutoff time has passed, events seen while idle
    /// are dropped without inspection; an open transaction still runs to its
    /// stop condition.
    ///
    /// An error leaves the state unchanged and is fatal to the trace: the caller
    /// must not keep feeding this decoder.
    pub fn process(&mut self, event: &BusEvent) -> Result<Option<Transaction>> {
        self.stats.events += 1;
        log::trace!("{}: {} {:?} in {}", event.position, event.name, event.data, self.state);

        if event.time > self.config.timeout && self.state == State::Idle {
            if self.stats.discarded == 0 {
                log::warn!(
                    "{}: cutoff {} passed, ignoring further transactions",
                    event.position,
                    self.config.timeout
                );
            }
            self.stats.discarded += 1;
            return Ok(None);
        }

        let rule = event
            .kind()
            .and_then(|kind| transitions::lookup(self.state, kind))
            .ok_or_else(|| DecoderError::ProtocolViolation {
                position: event.position.clone(),
                state: self.state,
                event: event.name.clone(),
            })?;

        let emitted = match rule.action {
            Some(action) => self.run(action, event)?,
            None => None,
        };

        if rule.to != self.state {
            log::debug!("{}: {} -> {} on {}", event.position, self.state, rule.to, rule.event);
        }
        self.state = rule.to;
        Ok(emitted)
    }

    /// Parse one comma-separated record and feed it to the state machine
    pub fn process_line(&mut self, line: &str, position: Position) -> Result<Option<Transaction>> {
        let event = BusEvent::parse_line(line, position)?;
        self.process(&event)
    }

    fn run(&mut self, action: Action, event: &BusEvent) -> Result<Option<Transaction>> {
        match action {
            Action::StartBit => {
                self.open(event.time);
                Ok(None)
            }
            Action::WriteAddressAck => self.address(event, Direction::Write, false),
            Action::WriteAddressNak => self.address(event, Direction::Write, true),
            Action::ReadAddressAck => self.address(event, Direction::Read, false),
            Action::ReadAddressNak => self.address(event, Direction::Read, true),
            Action::AddData => {
                self.message
                    .get_or_insert_with(Message::default)
                    .data
                    .push(event.data.clone());
                Ok(None)
            }
            Action::ClearMessage => {
                if self.message.take().is_some() {
                    self.stats.aborted += 1;
                }
                Ok(None)
            }
            Action::EmitMessage => Ok(self.emit()),
            Action::RepeatedStart => {
                let emitted = self.emit();
                if self.config.repeated_start == RepeatedStartPolicy::EmitAndRestamp {
                    self.open(event.time);
                }
                Ok(emitted)
            }
        }
    }

    fn open(&mut self, time: f64) {
        self.stats.opened += 1;
        self.message = Some(Message {
            start_time: Some(time),
            ..Message::default()
        });
    }

    fn address(
        &mut self,
        event: &BusEvent,
        direction: Direction,
        nak: bool,
    ) -> Result<Option<Transaction>> {
        let address = parse_hex(&event.data).ok_or_else(|| DecoderError::MalformedAddress {
            position: event.position.clone(),
            value: event.data.clone(),
        })?;

        self.message.get_or_insert_with(Message::default).header = Some(Header {
            direction,
            address,
            address_text: event.data.clone(),
            nak,
        });
        Ok(None)
    }

    /// Close the in-progress transaction, surfacing it if the address matches
    fn emit(&mut self) -> Option<Transaction> {
        let transaction = self.message.take()?.finish()?;
        self.stats.closed += 1;

        if self.config.matches(transaction.address) {
            self.stats.emitted += 1;
            Some(transaction)
        } else {
            self.stats.filtered += 1;
            None
        }
    }
}

fn parse_hex(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok()
}

/// Iterator that drives a [`Decoder`] over a stream of bus events
///
/// Yields only surfaced transactions. The first error ends the iteration.
pub struct TraceDecoder<I> {
    events: I,
    decoder: Decoder,
    failed: bool,
}

impl<I> TraceDecoder<I>
where
    I: Iterator<Item = Result<BusEvent>>,
{
    pub fn new(events: I, config: DecoderConfig) -> Self {
        Self {
            events,
            decoder: Decoder::new(config),
            failed: false,
        }
    }

    /// The underlying decoder, for its state and statistics
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }
}

impl<I> Iterator for TraceDecoder<I>
where
    I: Iterator<Item = Result<BusEvent>>,
{
    type Item = Result<Transaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let result = match self.events.next()? {
                Ok(event) => self.decoder.process(&event),
                Err(e) => Err(e),
            };

            match result {
                Ok(Some(transaction)) => return Some(Ok(transaction)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Open a CSV trace export and decode it lazily
///
/// # Example
/// ```no_run
/// use i2c_trace_decoder::{decode_file, DecoderConfig};
/// use std::path::Path;
///
/// let config = DecoderConfig::new(0x20).with_timeout(2.0);
/// for transaction in decode_file(Path::new("capture.csv"), config).unwrap() {
///     match transaction {
///         Ok(transaction) => println!("{}", transaction),
///         Err(e) => eprintln!("{}", e),
///     }
/// }
/// ```
pub fn decode_file(
    path: &Path,
    config: DecoderConfig,
) -> Result<TraceDecoder<CsvTraceReader<File>>> {
    log::info!("Decoding trace file: {:?}", path);
    let records = CsvTraceReader::from_path(path)?;
    Ok(TraceDecoder::new(records, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(decoder: &mut Decoder, records: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let position = Position::new("test", i as u64 + 2);
            if let Some(tx) = decoder.process_line(record, position).unwrap() {
                out.push(tx.to_string());
            }
        }
        out
    }

    const WRITE_0X20: &[&str] = &[
        "0.1,Start Bit",
        "0.2,Write Address + ACK,0x20",
        "0.3,Data + ACK,0x00",
        "0.4,Stop Bit",
    ];

    #[test]
    fn test_full_write_transaction() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        let out = feed(&mut decoder, WRITE_0X20);
        assert_eq!(out, vec!["0.10000000 Write 0x20 DATA 0x00 "]);
        assert_eq!(decoder.state(), State::Idle);
        assert_eq!(decoder.message(), "");
    }

    #[test]
    fn test_filtered_transaction() {
        let mut decoder = Decoder::new(DecoderConfig::new(0xff));
        let out = feed(&mut decoder, WRITE_0X20);
        assert!(out.is_empty());
        let stats = decoder.stats();
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.emitted, 0);
    }

    #[test]
    fn test_message_tracks_progress() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        feed(&mut decoder, &WRITE_0X20[..1]);
        assert_eq!(decoder.state(), State::Started);
        assert_eq!(decoder.message(), "0.10000000 ");
        feed(&mut decoder, &WRITE_0X20[1..3]);
        assert_eq!(decoder.message(), "0.10000000 Write 0x20 DATA 0x00 ");
    }

    #[test]
    fn test_read_and_nak_transactions() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x48));
        let out = feed(
            &mut decoder,
            &[
                "1.0,Start Bit",
                "1.1,Read Address + ACK,0x48",
                "1.2,Data + ACK,0x12",
                "1.3,Data + NAK,0x34",
                "1.4,Stop Bit",
                "2.0,Start Bit",
                "2.1,Write Address + NAK,0x48",
                "2.2,Stop Bit",
            ],
        );
        assert_eq!(
            out,
            vec![
                "1.00000000 Read  0x48 DATA 0x12 0x34 ",
                "2.00000000 Write 0x48 NAK ",
            ]
        );
    }

    #[test]
    fn test_start_then_stop_is_cleared() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        let out = feed(&mut decoder, &["0.1,Start Bit", "0.2,Stop Bit"]);
        assert!(out.is_empty());
        assert_eq!(decoder.state(), State::Idle);
        assert_eq!(decoder.message(), "");
        assert_eq!(decoder.stats().aborted, 1);
    }

    #[test]
    fn test_resync_from_stop_bit() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        let out = feed(
            &mut decoder,
            &["0.0,Data + ACK,0x11", "0.1,Stop Bit", "0.2,Start Bit"],
        );
        assert!(out.is_empty());
        assert_eq!(decoder.state(), State::Started);
    }

    #[test]
    fn test_double_start_is_a_violation() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        feed(&mut decoder, &["0.1,Start Bit"]);
        let err = decoder
            .process_line("0.2,Start Bit", Position::new("test", 3))
            .unwrap_err();
        match &err {
            DecoderError::ProtocolViolation { state, event, .. } => {
                assert_eq!(*state, State::Started);
                assert_eq!(event, "Start Bit");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.to_string(), "test:3: unexpected \"Start Bit\" in state Started");
        assert_eq!(decoder.state(), State::Started);
    }

    #[test]
    fn test_unknown_event_is_a_violation() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        let err = decoder
            .process_line("0.1,Glitch", Position::new("test", 2))
            .unwrap_err();
        assert!(matches!(err, DecoderError::ProtocolViolation { state: State::Sync, .. }));
    }

    #[test]
    fn test_malformed_address() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        feed(&mut decoder, &["0.1,Start Bit"]);
        let err = decoder
            .process_line("0.2,Write Address + ACK,zz", Position::new("test", 3))
            .unwrap_err();
        assert!(matches!(err, DecoderError::MalformedAddress { .. }));
        assert_eq!(decoder.state(), State::Started);
    }

    #[test]
    fn test_repeated_start_restamps_next_transaction() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        let out = feed(
            &mut decoder,
            &[
                "0.1,Start Bit",
                "0.2,Write Address + ACK,0x20",
                "0.3,Data + ACK,0x10",
                "0.4,Repeated Start Bit",
                "0.5,Read Address + ACK,0x20",
                "0.6,Data + NAK,0xAB",
                "0.7,Stop Bit",
            ],
        );
        assert_eq!(
            out,
            vec![
                "0.10000000 Write 0x20 DATA 0x10 ",
                "0.40000000 Read  0x20 DATA 0xAB ",
            ]
        );
    }

    #[test]
    fn test_repeated_start_after_read() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        let out = feed(
            &mut decoder,
            &[
                "0.1,Start Bit",
                "0.2,Read Address + ACK,0x20",
                "0.3,Data + ACK,0x01",
                "0.4,Repeated Start Bit",
            ],
        );
        assert_eq!(out, vec!["0.10000000 Read  0x20 DATA 0x01 "]);
        assert_eq!(decoder.state(), State::Started);
        assert_eq!(decoder.message(), "0.40000000 ");

        let out = feed(&mut decoder, &["0.5,Write Address + ACK,0x20", "0.6,Stop Bit"]);
        assert_eq!(out, vec!["0.40000000 Write 0x20 DATA "]);
        assert_eq!(decoder.state(), State::Idle);
    }

    #[test]
    fn test_repeated_start_while_syncing_opens_transaction() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        let out = feed(&mut decoder, &["0.05,Data + ACK,0x11", "0.1,Repeated Start Bit"]);
        assert!(out.is_empty());
        assert_eq!(decoder.state(), State::Started);
        assert_eq!(decoder.message(), "0.10000000 ");

        let out = feed(&mut decoder, &["0.2,Write Address + NAK,0x20", "0.3,Stop Bit"]);
        assert_eq!(out, vec!["0.10000000 Write 0x20 NAK "]);
        assert_eq!(decoder.stats().opened, 1);
    }

    #[test]
    fn test_rejected_events_are_counted() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        feed(&mut decoder, &["0.1,Start Bit"]);
        assert!(decoder.process_line("0.2,Bogus", Position::new("test", 3)).is_err());
        assert_eq!(decoder.stats().events, 2);
    }

    #[test]
    fn test_repeated_start_emit_only() {
        let config = DecoderConfig::new(0x20).with_repeated_start(RepeatedStartPolicy::EmitOnly);
        let mut decoder = Decoder::new(config);
        let out = feed(
            &mut decoder,
            &[
                "0.1,Start Bit",
                "0.2,Write Address + ACK,0x20",
                "0.3,Data + ACK,0x10",
                "0.4,Repeated Start Bit",
            ],
        );
        assert_eq!(out, vec!["0.10000000 Write 0x20 DATA 0x10 "]);
        assert_eq!(decoder.state(), State::Started);
        assert_eq!(decoder.message(), "");

        let out = feed(
            &mut decoder,
            &["0.5,Read Address + ACK,0x20", "0.6,Data + NAK,0xAB", "0.7,Stop Bit"],
        );
        assert_eq!(out, vec!["Read  0x20 DATA 0xAB "]);
    }

    #[test]
    fn test_cutoff_only_applies_while_idle() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20).with_timeout(0.25));
        let out = feed(
            &mut decoder,
            &[
                "0.0,Stop Bit",
                "0.1,Start Bit",
                "0.2,Write Address + ACK,0x20",
                "0.3,Data + ACK,0x01",
                "0.4,Stop Bit",
                "0.5,Start Bit",
                "0.6,Write Address + ACK,0x20",
                "0.7,Stop Bit",
                "0.8,not even an event",
            ],
        );
        assert_eq!(out, vec!["0.10000000 Write 0x20 DATA 0x01 "]);
        assert_eq!(decoder.state(), State::Idle);
        assert_eq!(decoder.stats().discarded, 4);
    }

    #[test]
    fn test_emit_twice_never_double_emits() {
        let mut decoder = Decoder::new(DecoderConfig::new(0x20));
        feed(&mut decoder, &WRITE_0X20[..3]);
        assert!(decoder.emit().is_some());
        assert!(decoder.emit().is_none());
        assert_eq!(decoder.stats().emitted, 1);
    }

    #[test]
    fn test_trace_decoder_stops_after_error() {
        let events = vec![
            BusEvent::parse_line("0.1,Start Bit", Position::new("t", 2)),
            BusEvent::parse_line("0.2,Start Bit", Position::new("t", 3)),
            BusEvent::parse_line("0.3,Stop Bit", Position::new("t", 4)),
        ];
        let mut trace = TraceDecoder::new(events.into_iter(), DecoderConfig::new(0x20));
        assert!(matches!(trace.next(), Some(Err(DecoderError::ProtocolViolation { .. }))));
        assert!(trace.next().is_none());
        assert_eq!(trace.decoder().state(), State::Started);
    }
}
