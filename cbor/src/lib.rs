/*!
A CBOR (RFC 8949) codec for protocol data that must round-trip exactly.

Decoding works in place over a byte slice: every parse reports how many bytes
it consumed, and whether the item it read was in shortest form (definite
lengths, minimal integer and float widths). Callers use that flag to decide
whether an input was canonical. Encoding always produces shortest form.
*/
#![no_std]
extern crate alloc;

pub mod decode;
pub mod encode;

mod decode_seq;
