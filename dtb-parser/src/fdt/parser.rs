use nom::{
    branch::alt,
    bytes::complete::{tag, take, take_until},
    combinator::{map, value, verify},
    multi::many_till,
    number::complete::{be_u32, be_u64},
    sequence::{pair, preceded, terminated, tuple},
};

use crate::fdt::{Header, MemoryReservation};

pub(super) type Input<'a> = &'a [u8];

pub(super) type IResult<'a, T> = nom::IResult<Input<'a>, T>;

pub(super) const FDT_MAGIC: u32 = 0xd00d_feed;

pub(super) const HEADER_SIZE: usize = 40;

const FDT_BEGIN_NODE: u32 = 0x1;
const FDT_END_NODE: u32 = 0x2;
const FDT_PROP: u32 = 0x3;
const FDT_NOP: u32 = 0x4;
const FDT_END: u32 = 0x9;

/// A single item of the structure block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Token<'a> {
    BeginNode(&'a [u8]),
    EndNode,
    Prop { name_offset: u32, value: &'a [u8] },
    Nop,
    End,
}

/// Parse the fixed-size blob header.
///
/// Only the layout is checked here; magic and version are validated by the caller so
/// that they can be reported with the offending values.
pub(super) fn header(input: Input) -> IResult<Header> {
    map(
        tuple((
            be_u32, be_u32, be_u32, be_u32, be_u32, be_u32, be_u32, be_u32, be_u32, be_u32,
        )),
        |(
            magic,
            total_size,
            off_dt_struct,
            off_dt_strings,
            off_mem_rsvmap,
            version,
            last_comp_version,
            boot_cpuid_phys,
            size_dt_strings,
            size_dt_struct,
        )| Header {
            magic,
            total_size,
            off_dt_struct,
            off_dt_strings,
            off_mem_rsvmap,
            version,
            last_comp_version,
            boot_cpuid_phys,
            size_dt_strings,
            size_dt_struct,
        },
    )(input)
}

/// Parse the memory reservation block up to and including its all-zero terminator.
pub(super) fn reservations(input: Input) -> IResult<Vec<MemoryReservation>> {
    map(
        many_till(
            map(pair(be_u64, be_u64), |(address, size)| MemoryReservation {
                address,
                size,
            }),
            verify(pair(be_u64, be_u64), |&(address, size): &(u64, u64)| {
                address == 0 && size == 0
            }),
        ),
        |(entries, _)| entries,
    )(input)
}

/// Parse the next token of the structure block, including its payload and padding.
pub(super) fn token(input: Input) -> IResult<Token> {
    alt((
        map(
            preceded(kind(FDT_BEGIN_NODE), aligned(cstring)),
            Token::BeginNode,
        ),
        value(Token::EndNode, kind(FDT_END_NODE)),
        preceded(kind(FDT_PROP), prop),
        value(Token::Nop, kind(FDT_NOP)),
        value(Token::End, kind(FDT_END)),
    ))(input)
}

/// Match a token marker of the given kind.
fn kind<'a>(expected: u32) -> impl FnMut(Input<'a>) -> IResult<'a, u32> {
    verify(be_u32, move |found: &u32| *found == expected)
}

/// Parse the payload of an `FDT_PROP` token.
fn prop(input: Input) -> IResult<Token> {
    let lengths: IResult<(u32, u32)> = pair(be_u32, be_u32)(input);
    let (input, (len, name_offset)) = lengths?;
    let (input, value) = aligned(take(len as usize))(input)?;

    Ok((input, Token::Prop { name_offset, value }))
}

/// Parse a NUL-terminated byte string, returning it without the terminator.
pub(super) fn cstring(input: Input) -> IResult<&[u8]> {
    terminated(take_until(&b"\0"[..]), tag(&b"\0"[..]))(input)
}

/// Run `parser`, then skip the padding needed to bring the consumed length up to a
/// multiple of four bytes.
fn aligned<'a, F, O>(mut parser: F) -> impl FnMut(Input<'a>) -> IResult<'a, O>
where
    F: FnMut(Input<'a>) -> IResult<'a, O>,
{
    move |input: Input<'a>| {
        let (rest, output) = parser(input)?;
        let consumed = input.len() - rest.len();
        let padding: IResult<'a, Input<'a>> = take((4 - consumed % 4) % 4)(rest);
        let (rest, _) = padding?;
        Ok((rest, output))
    }
}
