// Packed route codec
// This file decodes the quoting service's packed route byte format into the
// typed route model, and encodes the exact inverse for tooling and tests
//
// Wire layout (all multi-byte integers big-endian):
//   split:  0xFFFF | count:u8 | { len:u16 | single-route blob | alloc:32B }*
//   single: hop_count:u8 | { action:u8 | token_in:20B | token_out:20B |
//                            payload_len:u16 | payload }*

use alloy_primitives::{Address, Bytes, U256};

use crate::errors::DomainError;
use crate::router::routes::{
    ActionKind, DecodedRoute, PoolPayload, RouteHop, SubRoute, MAX_HOPS, MAX_SPLITS,
};

/// Two-byte marker opening a split route. A single route can never alias it:
/// its first byte is a hop count bounded by MAX_HOPS.
pub const SPLIT_SENTINEL: [u8; 2] = [0xFF, 0xFF];

const CL_PAYLOAD_LEN: usize = 67;
const BIN_PAYLOAD_LEN: usize = 63;
const VAULT_PAYLOAD_LEN: usize = 21;

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], DomainError> {
        if self.remaining() < n {
            return Err(DomainError::malformed_route(
                format!("truncated route: expected {n} bytes for {what}"),
                format!("offset {}, {} bytes left", self.pos, self.remaining()),
            ));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8, DomainError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16_be(&mut self, what: &str) -> Result<u16, DomainError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn address(&mut self, what: &str) -> Result<Address, DomainError> {
        Ok(Address::from_slice(self.take(20, what)?))
    }

    fn u256_be(&mut self, what: &str) -> Result<U256, DomainError> {
        Ok(U256::from_be_slice(self.take(32, what)?))
    }
}

/// Decode a packed route. Fails with `MalformedRoute` on inconsistent
/// lengths, unknown action codes, out-of-bound counts, or trailing bytes.
pub fn decode(bytes: &[u8]) -> Result<DecodedRoute, DomainError> {
    if bytes.len() >= 2 && bytes[..2] == SPLIT_SENTINEL {
        return decode_split(&bytes[2..]);
    }
    let mut r = Reader::new(bytes);
    let route = decode_single(&mut r)?;
    if r.remaining() != 0 {
        return Err(DomainError::malformed_route(
            "trailing bytes after route",
            format!("{} bytes past offset {}", r.remaining(), r.pos),
        ));
    }
    Ok(route)
}

fn decode_split(body: &[u8]) -> Result<DecodedRoute, DomainError> {
    let mut r = Reader::new(body);
    let count = r.u8("sub-route count")? as usize;
    if !(2..=MAX_SPLITS).contains(&count) {
        return Err(DomainError::malformed_route(
            format!("invalid sub-route count {count}"),
            format!("allowed 2..={MAX_SPLITS}"),
        ));
    }
    let mut subs = Vec::with_capacity(count);
    for i in 0..count {
        let len = r.u16_be("sub-route length")? as usize;
        let blob = r.take(len, "sub-route blob")?;
        let mut nested = Reader::new(blob);
        let route = decode_single(&mut nested)
            .map_err(|e| e.with_details(format!("sub-route {i}")))?;
        if nested.remaining() != 0 {
            return Err(DomainError::malformed_route(
                "sub-route length does not match its hops",
                format!("sub-route {i}: {} bytes unconsumed", nested.remaining()),
            ));
        }
        let hops = match route {
            DecodedRoute::Single(hops) => hops,
            // decode_single never yields a split
            DecodedRoute::Split(_) => unreachable!(),
        };
        let amount_in = r.u256_be("sub-route allocation")?;
        subs.push(SubRoute { hops, amount_in });
    }
    if r.remaining() != 0 {
        return Err(DomainError::malformed_route(
            "trailing bytes after split route",
            format!("{} bytes unconsumed", r.remaining()),
        ));
    }
    Ok(DecodedRoute::Split(subs))
}

fn decode_single(r: &mut Reader<'_>) -> Result<DecodedRoute, DomainError> {
    let hop_count = r.u8("hop count")? as usize;
    if !(1..=MAX_HOPS).contains(&hop_count) {
        return Err(DomainError::malformed_route(
            format!("invalid hop count {hop_count}"),
            format!("allowed 1..={MAX_HOPS}"),
        ));
    }
    let mut hops = Vec::with_capacity(hop_count);
    for i in 0..hop_count {
        let code = r.u8("action code")?;
        let action = ActionKind::from_wire_code(code).ok_or_else(|| {
            DomainError::malformed_route(
                format!("unknown action code 0x{code:02x}"),
                format!("hop {i}"),
            )
        })?;
        let token_in = r.address("token_in")?;
        let token_out = r.address("token_out")?;
        let payload_len = r.u16_be("payload length")? as usize;
        let payload_bytes = r.take(payload_len, "pool payload")?;
        let payload = decode_payload(action, payload_bytes, i)?;
        hops.push(RouteHop::new(action, token_in, token_out, payload));
    }
    Ok(DecodedRoute::Single(hops))
}

fn decode_payload(action: ActionKind, bytes: &[u8], hop: usize) -> Result<PoolPayload, DomainError> {
    let expect = |want: usize| -> Result<(), DomainError> {
        if bytes.len() != want {
            return Err(DomainError::malformed_route(
                format!("payload length {} does not match action layout", bytes.len()),
                format!("hop {hop}: {action:?} expects {want} bytes"),
            ));
        }
        Ok(())
    };
    match action {
        ActionKind::SwapCl => {
            expect(CL_PAYLOAD_LEN)?;
            let token0 = Address::from_slice(&bytes[0..20]);
            let token1 = Address::from_slice(&bytes[20..40]);
            let fee = u32::from_be_bytes([0, bytes[40], bytes[41], bytes[42]]);
            let tick_spacing = i24_from_be(&bytes[43..46]);
            let hooks = Address::from_slice(&bytes[46..66]);
            let zero_for_one = decode_bool(bytes[66], hop)?;
            Ok(PoolPayload::SwapCl {
                token0,
                token1,
                fee,
                tick_spacing,
                hooks,
                zero_for_one,
            })
        }
        ActionKind::SwapBin => {
            expect(BIN_PAYLOAD_LEN)?;
            let token0 = Address::from_slice(&bytes[0..20]);
            let token1 = Address::from_slice(&bytes[20..40]);
            let bin_step = u16::from_be_bytes([bytes[40], bytes[41]]);
            let hooks = Address::from_slice(&bytes[42..62]);
            let zero_for_one = decode_bool(bytes[62], hop)?;
            Ok(PoolPayload::SwapBin {
                token0,
                token1,
                bin_step,
                hooks,
                zero_for_one,
            })
        }
        ActionKind::Wrap | ActionKind::Unwrap => {
            expect(VAULT_PAYLOAD_LEN)?;
            let vault = Address::from_slice(&bytes[0..20]);
            let use_buffer = decode_bool(bytes[20], hop)?;
            Ok(PoolPayload::Vault { vault, use_buffer })
        }
    }
}

fn decode_bool(byte: u8, hop: usize) -> Result<bool, DomainError> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(DomainError::malformed_route(
            format!("invalid boolean byte 0x{other:02x}"),
            format!("hop {hop}"),
        )),
    }
}

fn i24_from_be(bytes: &[u8]) -> i32 {
    let raw = u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]);
    // sign-extend from 24 bits
    if raw & 0x80_0000 != 0 {
        (raw | 0xFF00_0000) as i32
    } else {
        raw as i32
    }
}

/// Encode a typed route back into the packed byte format. Exact inverse of
/// [`decode`] for any route decode accepts.
pub fn encode(route: &DecodedRoute) -> Result<Bytes, DomainError> {
    let mut out = Vec::new();
    match route {
        DecodedRoute::Single(hops) => encode_single(hops, &mut out)?,
        DecodedRoute::Split(subs) => {
            if !(2..=MAX_SPLITS).contains(&subs.len()) {
                return Err(DomainError::malformed_route(
                    format!("invalid sub-route count {}", subs.len()),
                    format!("allowed 2..={MAX_SPLITS}"),
                ));
            }
            out.extend_from_slice(&SPLIT_SENTINEL);
            out.push(subs.len() as u8);
            for sub in subs {
                let mut blob = Vec::new();
                encode_single(&sub.hops, &mut blob)?;
                if blob.len() > u16::MAX as usize {
                    return Err(DomainError::malformed_route(
                        "sub-route blob exceeds u16 length",
                        format!("{} bytes", blob.len()),
                    ));
                }
                out.extend_from_slice(&(blob.len() as u16).to_be_bytes());
                out.extend_from_slice(&blob);
                out.extend_from_slice(&sub.amount_in.to_be_bytes::<32>());
            }
        }
    }
    Ok(Bytes::from(out))
}

fn encode_single(hops: &[RouteHop], out: &mut Vec<u8>) -> Result<(), DomainError> {
    if !(1..=MAX_HOPS).contains(&hops.len()) {
        return Err(DomainError::malformed_route(
            format!("invalid hop count {}", hops.len()),
            format!("allowed 1..={MAX_HOPS}"),
        ));
    }
    out.push(hops.len() as u8);
    for hop in hops {
        out.push(hop.action.wire_code());
        out.extend_from_slice(hop.token_in.as_slice());
        out.extend_from_slice(hop.token_out.as_slice());
        let payload = encode_payload(&hop.payload)?;
        out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&payload);
    }
    Ok(())
}

fn encode_payload(payload: &PoolPayload) -> Result<Vec<u8>, DomainError> {
    let mut out = Vec::new();
    match payload {
        PoolPayload::SwapCl {
            token0,
            token1,
            fee,
            tick_spacing,
            hooks,
            zero_for_one,
        } => {
            if *fee > 0xFF_FFFF {
                return Err(DomainError::malformed_route(
                    format!("fee {fee} exceeds 24 bits"),
                    "cl payload",
                ));
            }
            if !(-0x80_0000..0x80_0000).contains(tick_spacing) {
                return Err(DomainError::malformed_route(
                    format!("tick spacing {tick_spacing} exceeds 24 bits"),
                    "cl payload",
                ));
            }
            out.extend_from_slice(token0.as_slice());
            out.extend_from_slice(token1.as_slice());
            out.extend_from_slice(&fee.to_be_bytes()[1..]);
            out.extend_from_slice(&(*tick_spacing as u32).to_be_bytes()[1..]);
            out.extend_from_slice(hooks.as_slice());
            out.push(*zero_for_one as u8);
        }
        PoolPayload::SwapBin {
            token0,
            token1,
            bin_step,
            hooks,
            zero_for_one,
        } => {
            out.extend_from_slice(token0.as_slice());
            out.extend_from_slice(token1.as_slice());
            out.extend_from_slice(&bin_step.to_be_bytes());
            out.extend_from_slice(hooks.as_slice());
            out.push(*zero_for_one as u8);
        }
        PoolPayload::Vault { vault, use_buffer } => {
            out.extend_from_slice(vault.as_slice());
            out.push(*use_buffer as u8);
        }
    }
    Ok(out)
}
