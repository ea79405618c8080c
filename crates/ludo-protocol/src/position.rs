//! Integer encoding of token positions.
//!
//! ```text
//!   at home          -1
//!   ring cell c      c            (1..=52, shared by every color)
//!   home stretch s   base + s     (s in 1..=5)
//!   finished         base + 6
//!
//!   base: red 100, green 200, blue 300, yellow 400
//! ```
//!
//! Clients depend on these exact values. Decoding is strict: a value in
//! another color's range is rejected rather than guessed at.

use ludo_engine::{Color, HOME_STRETCH_LENGTH, Position, RING_LENGTH};

use crate::ProtocolError;

/// Wire value of a token at home.
pub const WIRE_AT_HOME: i16 = -1;

/// First value of `color`'s home-stretch range (exclusive).
fn stretch_base(color: Color) -> i16 {
    (color.index() as i16 + 1) * 100
}

/// Encodes a position of one of `color`'s tokens.
pub fn encode_position(color: Color, position: Position) -> i16 {
    match position {
        Position::AtHome => WIRE_AT_HOME,
        Position::OnRing(cell) => cell as i16,
        Position::OnHomeStretch(step) => stretch_base(color) + step as i16,
        Position::Finished => stretch_base(color) + HOME_STRETCH_LENGTH as i16,
    }
}

/// Decodes a wire value for one of `color`'s tokens.
///
/// # Errors
/// [`ProtocolError::InvalidPosition`] for anything outside the four ranges
/// above, including another color's stretch range.
pub fn decode_position(color: Color, raw: i16) -> Result<Position, ProtocolError> {
    let base = stretch_base(color);
    let stretch = HOME_STRETCH_LENGTH as i16;
    match raw {
        WIRE_AT_HOME => Ok(Position::AtHome),
        c if (1..=RING_LENGTH as i16).contains(&c) => Ok(Position::OnRing(c as u8)),
        v if v == base + stretch => Ok(Position::Finished),
        v if (base + 1..base + stretch).contains(&v) => Ok(Position::OnHomeStretch((v - base) as u8)),
        _ => Err(ProtocolError::InvalidPosition { color, raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_fixed_values() {
        assert_eq!(encode_position(Color::Red, Position::AtHome), -1);
        assert_eq!(encode_position(Color::Yellow, Position::AtHome), -1);
        assert_eq!(encode_position(Color::Green, Position::OnRing(52)), 52);
        assert_eq!(encode_position(Color::Red, Position::OnHomeStretch(1)), 101);
        assert_eq!(encode_position(Color::Red, Position::Finished), 106);
        assert_eq!(encode_position(Color::Green, Position::OnHomeStretch(3)), 203);
        assert_eq!(encode_position(Color::Blue, Position::Finished), 306);
        assert_eq!(encode_position(Color::Yellow, Position::OnHomeStretch(5)), 405);
    }

    #[test]
    fn test_every_well_formed_position_decodes_back() {
        let mut all = vec![Position::AtHome, Position::Finished];
        all.extend((1..=RING_LENGTH).map(Position::OnRing));
        all.extend((1..HOME_STRETCH_LENGTH).map(Position::OnHomeStretch));

        for color in Color::ALL {
            for pos in &all {
                let raw = encode_position(color, *pos);
                assert_eq!(decode_position(color, raw).unwrap(), *pos, "{color} {raw}");
            }
        }
    }

    #[test]
    fn test_stretch_ranges_are_disjoint() {
        for a in Color::ALL {
            for b in Color::ALL.into_iter().filter(|b| *b != a) {
                let raw = encode_position(a, Position::OnHomeStretch(2));
                assert!(decode_position(b, raw).is_err(), "{b} accepted {raw}");
            }
        }
    }

    #[test]
    fn test_decode_rejects_out_of_range() {
        for raw in [0, -2, 53, 100, 107, 199, 500, i16::MAX] {
            assert!(matches!(
                decode_position(Color::Red, raw),
                Err(ProtocolError::InvalidPosition { raw: r, .. }) if r == raw
            ));
        }
    }
}
