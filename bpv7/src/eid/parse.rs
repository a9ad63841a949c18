use super::*;
use percent_encoding::percent_decode_str;
use winnow::{
    ModalResult, Parser,
    ascii::dec_uint,
    combinator::{alt, preceded, separated_pair, terminated},
    token::take_while,
};

// RFC 3986 reg-name: unreserved, sub-delims and percent-encoded octets
fn is_reg_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-._~!$&'()*+,;=%".contains(c)
}

fn ipn_ssp(input: &mut &str) -> ModalResult<Eid> {
    separated_pair(dec_uint, '.', dec_uint)
        .try_map(|(node, service)| Eid::ipn(node, service))
        .parse_next(input)
}

fn node_name(input: &mut &str) -> ModalResult<Box<str>> {
    take_while(1.., is_reg_name_char)
        .try_map(|s: &str| percent_decode_str(s).decode_utf8().map(|s| Box::<str>::from(s)))
        .parse_next(input)
}

fn dtn_ssp(input: &mut &str) -> ModalResult<Eid> {
    let node_and_demux = (
        terminated(node_name, '/'),
        take_while(0.., is_vchar).map(|s: &str| Box::<str>::from(s)),
    )
        .map(|(node_name, demux)| Eid::Dtn { node_name, demux });

    alt(("none".value(Eid::Null), preceded("//", node_and_demux))).parse_next(input)
}

fn eid(input: &mut &str) -> ModalResult<Eid> {
    alt((preceded("dtn:", dtn_ssp), preceded("ipn:", ipn_ssp))).parse_next(input)
}

/// Parses the scheme-specific part of a `dtn` EID, as carried in CBOR.
pub(super) fn parse_dtn_ssp(s: &str) -> Result<Eid, Error> {
    dtn_ssp.parse(s).map_err(|e| Error::ParseError(e.to_string()))
}

impl core::str::FromStr for Eid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        eid.parse(s).map_err(|e| Error::ParseError(e.to_string()))
    }
}

impl TryFrom<&str> for Eid {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}
