/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Wire framing over an ordered, reliable byte stream.
//!
//! Each message is framed as `length:VLQ, tag:1, body:bytes`, where `length` counts
//! the tag and body. Bodies of belief, transact, result, and data-reply messages are
//! canonical cell encodings; query and missing-data bodies carry a message id and a
//! hash.
//!
//! Back-pressure is explicit: [`FrameWriter::write_message`] refuses a message that
//! does not fit the remaining buffer and returns `false` ("unsent"); the caller
//! retries later without allocating a new message id. Nothing is ever silently
//! dropped, and a frame is either fully buffered or not at all.

use std::collections::VecDeque;

use crate::cell::{decode, encode, encoding::write_unsigned_vlq, Cell, Hash};
use crate::error::{CoreError, Result};
use crate::types::data_types::{BufferSize, MessageId};

use super::messages::Message;

/// Parse a VLQ at the front of `bytes`. `Ok(None)` means the buffer ends mid-number
/// and more bytes are needed.
fn read_vlq_prefix(bytes: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut acc: u128 = 0;
    for (i, byte) in bytes.iter().enumerate() {
        if i >= 10 {
            return Err(CoreError::BadFormat("overlong VLQ"));
        }
        if i == 1 && bytes[0] & 0x7F == 0 {
            return Err(CoreError::BadFormat("non-minimal VLQ"));
        }
        acc = (acc << 7) | (byte & 0x7F) as u128;
        if byte & 0x80 == 0 {
            if acc > u64::MAX as u128 {
                return Err(CoreError::BadFormat("VLQ out of range"));
            }
            return Ok(Some((acc as u64, i + 1)));
        }
    }
    Ok(None)
}

fn read_hash(bytes: &[u8]) -> Result<(Hash, &[u8])> {
    if bytes.len() < Hash::LENGTH {
        return Err(CoreError::BadFormat("truncated hash"));
    }
    let mut array = [0u8; Hash::LENGTH];
    array.copy_from_slice(&bytes[..Hash::LENGTH]);
    Ok((Hash::new(array), &bytes[Hash::LENGTH..]))
}

fn read_id(bytes: &[u8]) -> Result<(MessageId, &[u8])> {
    match read_vlq_prefix(bytes)? {
        Some((id, consumed)) => Ok((MessageId::new(id), &bytes[consumed..])),
        None => Err(CoreError::BadFormat("truncated message id")),
    }
}

/// Serialize a message as `tag` followed by its body (without the outer length).
pub fn encode_message(message: &Message) -> Vec<u8> {
    let mut out = vec![message.tag()];
    match message {
        Message::Belief(belief) => {
            out.extend_from_slice(&encode(&Cell::Belief(belief.clone())));
        }
        Message::Query { id, hash } => {
            write_unsigned_vlq(&mut out, id.int());
            out.extend_from_slice(&hash.bytes());
        }
        Message::Transact { id, transaction } => {
            write_unsigned_vlq(&mut out, id.int());
            out.extend_from_slice(&encode(&Cell::Signed(transaction.clone())));
        }
        Message::Result(result) => {
            out.extend_from_slice(&encode(&Cell::TxResult(result.clone())));
        }
        Message::StatusRequest { id } => {
            write_unsigned_vlq(&mut out, id.int());
        }
        Message::Status { id, belief_hash, state_hash } => {
            write_unsigned_vlq(&mut out, id.int());
            out.extend_from_slice(&belief_hash.bytes());
            out.extend_from_slice(&state_hash.bytes());
        }
        Message::MissingData { id, hash } => {
            write_unsigned_vlq(&mut out, id.int());
            out.extend_from_slice(&hash.bytes());
        }
        Message::DataReply { id, cells } => {
            write_unsigned_vlq(&mut out, id.int());
            write_unsigned_vlq(&mut out, cells.len() as u64);
            for cell in cells {
                write_unsigned_vlq(&mut out, cell.len() as u64);
                out.extend_from_slice(cell);
            }
        }
        Message::Challenge { id, token } => {
            write_unsigned_vlq(&mut out, id.int());
            out.extend_from_slice(&encode(&Cell::Blob(token.clone())));
        }
        Message::Response { id, signed } => {
            write_unsigned_vlq(&mut out, id.int());
            out.extend_from_slice(&encode(&Cell::Signed(signed.clone())));
        }
    }
    out
}

/// Parse a message from `tag` plus body.
pub fn decode_message(frame: &[u8]) -> Result<Message> {
    let (&tag, body) = frame
        .split_first()
        .ok_or(CoreError::BadFormat("empty frame"))?;
    match tag {
        1 => Ok(Message::Belief(decode(body)?.as_belief()?.clone())),
        2 => {
            let (id, rest) = read_id(body)?;
            let (hash, rest) = read_hash(rest)?;
            if !rest.is_empty() {
                return Err(CoreError::BadFormat("trailing bytes in query"));
            }
            Ok(Message::Query { id, hash })
        }
        3 => {
            let (id, rest) = read_id(body)?;
            Ok(Message::Transact { id, transaction: decode(rest)?.as_signed()?.clone() })
        }
        4 => {
            let result = match decode(body)? {
                Cell::TxResult(result) => result,
                _ => return Err(CoreError::BadFormat("result body is not a result cell")),
            };
            Ok(Message::Result(result))
        }
        5 => {
            let (id, rest) = read_id(body)?;
            if !rest.is_empty() {
                return Err(CoreError::BadFormat("trailing bytes in status request"));
            }
            Ok(Message::StatusRequest { id })
        }
        6 => {
            let (id, rest) = read_id(body)?;
            let (belief_hash, rest) = read_hash(rest)?;
            let (state_hash, rest) = read_hash(rest)?;
            if !rest.is_empty() {
                return Err(CoreError::BadFormat("trailing bytes in status"));
            }
            Ok(Message::Status { id, belief_hash, state_hash })
        }
        7 => {
            let (id, rest) = read_id(body)?;
            let (hash, rest) = read_hash(rest)?;
            if !rest.is_empty() {
                return Err(CoreError::BadFormat("trailing bytes in missing data"));
            }
            Ok(Message::MissingData { id, hash })
        }
        8 => {
            let (id, mut rest) = read_id(body)?;
            let Some((count, consumed)) = read_vlq_prefix(rest)? else {
                return Err(CoreError::BadFormat("truncated data reply"));
            };
            rest = &rest[consumed..];
            let mut cells = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let Some((len, consumed)) = read_vlq_prefix(rest)? else {
                    return Err(CoreError::BadFormat("truncated data reply"));
                };
                rest = &rest[consumed..];
                if rest.len() < len as usize {
                    return Err(CoreError::BadFormat("truncated data reply"));
                }
                cells.push(rest[..len as usize].to_vec());
                rest = &rest[len as usize..];
            }
            if !rest.is_empty() {
                return Err(CoreError::BadFormat("trailing bytes in data reply"));
            }
            Ok(Message::DataReply { id, cells })
        }
        9 => {
            let (id, rest) = read_id(body)?;
            let token = match decode(rest)? {
                Cell::Blob(token) => token,
                _ => return Err(CoreError::BadFormat("challenge token is not a blob")),
            };
            Ok(Message::Challenge { id, token })
        }
        10 => {
            let (id, rest) = read_id(body)?;
            Ok(Message::Response { id, signed: decode(rest)?.as_signed()?.clone() })
        }
        _ => Err(CoreError::BadFormat("unknown message tag")),
    }
}

/// Frames outgoing messages into a bounded buffer ahead of the transport.
pub struct FrameWriter {
    buf: VecDeque<u8>,
    capacity: usize,
}

impl FrameWriter {
    pub fn new(capacity: BufferSize) -> FrameWriter {
        FrameWriter { buf: VecDeque::new(), capacity: capacity.int() as usize }
    }

    /// Buffer a message for sending. Returns `false` ("unsent") when the frame does
    /// not fit; the caller retries with the same message later.
    pub fn write_message(&mut self, message: &Message) -> bool {
        let payload = encode_message(message);
        let mut frame = Vec::with_capacity(payload.len() + 10);
        write_unsigned_vlq(&mut frame, payload.len() as u64);
        frame.extend_from_slice(&payload);
        if self.buf.len() + frame.len() > self.capacity {
            return false;
        }
        self.buf.extend(frame);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Take up to `max` buffered bytes for the transport to carry.
    pub fn drain(&mut self, max: usize) -> Vec<u8> {
        let n = max.min(self.buf.len());
        self.buf.drain(..n).collect()
    }
}

/// Reassembles frames from the byte stream and decodes messages out of them.
pub struct FrameReader {
    buf: VecDeque<u8>,
}

impl FrameReader {
    pub fn new() -> FrameReader {
        FrameReader { buf: VecDeque::new() }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().copied());
    }

    /// Decode the next complete message, or `Ok(None)` if the stream has not yet
    /// delivered one. A `BadFormat` error means the stream is corrupt and the
    /// connection must be closed.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        let contiguous: Vec<u8> = self.buf.iter().copied().collect();
        let Some((length, consumed)) = read_vlq_prefix(&contiguous)? else {
            return Ok(None);
        };
        if contiguous.len() - consumed < length as usize {
            return Ok(None);
        }
        let frame = &contiguous[consumed..consumed + length as usize];
        let message = decode_message(frame)?;
        self.buf.drain(..consumed + length as usize);
        Ok(Some(message))
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        FrameReader::new()
    }
}
