use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};
use std::str::FromStr;

/// Represents a single square on the chess board (0-63).
///
/// Internally stores index 0-63 where:
/// - 0 = a1, 7 = h1
/// - 56 = a8, 63 = h8
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub const A1: Square = Square(0);
    pub const B1: Square = Square(1);
    pub const C1: Square = Square(2);
    pub const D1: Square = Square(3);
    pub const E1: Square = Square(4);
    pub const F1: Square = Square(5);
    pub const G1: Square = Square(6);
    pub const H1: Square = Square(7);
    pub const A8: Square = Square(56);
    pub const B8: Square = Square(57);
    pub const C8: Square = Square(58);
    pub const D8: Square = Square(59);
    pub const E8: Square = Square(60);
    pub const F8: Square = Square(61);
    pub const G8: Square = Square(62);
    pub const H8: Square = Square(63);

    /// Creates a new Square if the index is valid (0-63).
    pub const fn new(idx: u8) -> Option<Self> {
        if idx < 64 { Some(Square(idx)) } else { None }
    }

    /// Builds a square from zero-based file and rank.
    pub const fn from_coords(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && rank < 8 {
            Some(Square(rank * 8 + file))
        } else {
            None
        }
    }

    /// Returns the internal index value (0-63).
    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Zero-based file (0 = a).
    #[inline]
    pub const fn file_index(self) -> u8 {
        self.0 % 8
    }

    /// Zero-based rank (0 = rank 1).
    #[inline]
    pub const fn rank_index(self) -> u8 {
        self.0 / 8
    }

    /// Returns the file ('a'-'h') of this square.
    pub fn file(&self) -> char {
        (b'a' + self.file_index()) as char
    }

    /// Returns the rank (1-8) of this square.
    pub fn rank(&self) -> u8 {
        self.rank_index() + 1
    }

    /// Iterate all 64 squares from a1 to h8.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64).map(Square)
    }
}

/// Parse algebraic notation like "e4" into a Square.
///
/// # Examples
/// ```
/// # use peer_chess::game_state::Square;
/// let square: Square = "e4".parse().unwrap();
/// assert_eq!(square.value(), 28);
/// ```
impl FromStr for Square {
    type Err = SquareParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(SquareParseError::WrongLength);
        };

        let file = file.to_ascii_lowercase();
        if !('a'..='h').contains(&file) {
            return Err(SquareParseError::BadFile);
        }
        let rank = rank.to_digit(10).ok_or(SquareParseError::BadRank)?;
        if !(1..=8).contains(&rank) {
            return Err(SquareParseError::BadRank);
        }

        let idx = ((rank as u8 - 1) * 8) + (file as u8 - b'a');
        Ok(Square(idx))
    }
}

/// Display square in algebraic notation (e.g., "e4").
impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

/// Error type for parsing square notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SquareParseError {
    #[error("square must be 2 characters (e.g., 'e4')")]
    WrongLength,
    #[error("file must be a-h")]
    BadFile,
    #[error("rank must be 1-8")]
    BadRank,
}

/// A set of squares packed into 64 bits.
///
/// Each bit represents one square: bit 0 = a1, bit 63 = h8.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bitboard(u64);

impl Bitboard {
    pub const EMPTY: Bitboard = Bitboard(0);
    pub const FULL: Bitboard = Bitboard(u64::MAX);

    /// Creates a new bitboard with the given value.
    #[inline]
    pub const fn new(value: u64) -> Self {
        Bitboard(value)
    }

    #[inline]
    pub const fn from_square(square: Square) -> Self {
        Bitboard(1 << square.0)
    }

    /// Returns the underlying u64 value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline]
    pub const fn contains(self, square: Square) -> bool {
        self.0 & (1 << square.0) != 0
    }

    #[inline]
    pub fn set(&mut self, square: Square) {
        self.0 |= 1 << square.value();
    }

    #[inline]
    pub fn clear(&mut self, square: Square) {
        self.0 &= !(1 << square.value());
    }

    /// Toggles the bit at the given square.
    #[inline]
    pub fn toggle(&mut self, square: Square) {
        self.0 ^= 1 << square.value();
    }

    /// Lowest set square, if any.
    #[inline]
    pub fn first(self) -> Option<Square> {
        if self.0 == 0 {
            None
        } else {
            Some(Square(self.0.trailing_zeros() as u8))
        }
    }

    /// The square if exactly one bit is set.
    pub fn single_square(self) -> Option<Square> {
        if self.count() == 1 { self.first() } else { None }
    }

    pub fn squares(self) -> Squares {
        Squares(self.0)
    }
}

impl BitAnd for Bitboard {
    type Output = Bitboard;

    fn bitand(self, rhs: Self) -> Self::Output {
        Bitboard(self.0 & rhs.0)
    }
}

impl BitAndAssign for Bitboard {
    fn bitand_assign(&mut self, rhs: Self) {
        self.0 &= rhs.0;
    }
}

impl BitOr for Bitboard {
    type Output = Bitboard;

    fn bitor(self, rhs: Self) -> Self::Output {
        Bitboard(self.0 | rhs.0)
    }
}

impl BitOrAssign for Bitboard {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Not for Bitboard {
    type Output = Bitboard;

    fn not(self) -> Self::Output {
        Bitboard(!self.0)
    }
}

impl From<Square> for Bitboard {
    fn from(square: Square) -> Self {
        Bitboard::from_square(square)
    }
}

impl FromIterator<Square> for Bitboard {
    fn from_iter<I: IntoIterator<Item = Square>>(iter: I) -> Self {
        let mut bb = Bitboard::EMPTY;
        for square in iter {
            bb.set(square);
        }
        bb
    }
}

impl IntoIterator for Bitboard {
    type Item = Square;
    type IntoIter = Squares;

    fn into_iter(self) -> Self::IntoIter {
        self.squares()
    }
}

impl fmt::Debug for Bitboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitboard({:#018X})", self.0)
    }
}

/// Iterator over the set squares of a [`Bitboard`], lowest first.
#[derive(Debug, Clone)]
pub struct Squares(u64);

impl Iterator for Squares {
    type Item = Square;

    fn next(&mut self) -> Option<Square> {
        if self.0 == 0 {
            return None;
        }
        let idx = self.0.trailing_zeros() as u8;
        self.0 &= self.0 - 1;
        Some(Square(idx))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for Squares {}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn sq(s: &str) -> Square {
        s.parse().expect("valid square")
    }

    #[test]
    fn test_square_creation() {
        assert!(Square::new(0).is_some());
        assert!(Square::new(63).is_some());
        assert!(Square::new(64).is_none());
        assert!(Square::new(255).is_none());
    }

    #[test]
    fn test_square_file_rank() {
        let e4 = Square::new(28).unwrap();
        assert_eq!(e4.file(), 'e');
        assert_eq!(e4.rank(), 4);
        assert_eq!(e4.file_index(), 4);
        assert_eq!(e4.rank_index(), 3);
    }

    #[test_case("a1", 0)]
    #[test_case("h1", 7)]
    #[test_case("a8", 56)]
    #[test_case("h8", 63)]
    #[test_case("E4", 28; "uppercase")]
    fn test_square_from_str(input: &str, idx: u8) {
        assert_eq!(input.parse::<Square>().unwrap().value(), idx);
    }

    #[test_case("", SquareParseError::WrongLength)]
    #[test_case("abc", SquareParseError::WrongLength)]
    #[test_case("i1", SquareParseError::BadFile)]
    #[test_case("a9", SquareParseError::BadRank)]
    #[test_case("a0", SquareParseError::BadRank)]
    fn test_square_from_str_invalid(input: &str, expected: SquareParseError) {
        assert_eq!(input.parse::<Square>(), Err(expected));
    }

    #[test]
    fn test_square_roundtrip() {
        for square in Square::all() {
            let parsed: Square = square.to_string().parse().unwrap();
            assert_eq!(square, parsed);
        }
    }

    #[test]
    fn test_from_coords_rejects_off_board() {
        assert_eq!(Square::from_coords(4, 3), Some(sq("e4")));
        assert_eq!(Square::from_coords(8, 0), None);
        assert_eq!(Square::from_coords(0, 8), None);
    }

    #[test]
    fn test_bitboard_toggle() {
        let mut bb = Bitboard::EMPTY;
        bb.toggle(Square::A1);
        assert_eq!(bb.value(), 1);
        bb.toggle(Square::A1);
        assert!(bb.is_empty());
    }

    #[test]
    fn test_bitboard_iterates_lowest_first() {
        let bb: Bitboard = [Square::H8, Square::A1, Square::H1].into_iter().collect();
        assert_eq!(bb.value(), 0x8000000000000081);
        assert_eq!(
            bb.squares().collect::<Vec<_>>(),
            vec![Square::A1, Square::H1, Square::H8]
        );
        assert_eq!(bb.squares().len(), 3);
    }

    #[test]
    fn test_single_square() {
        assert_eq!(Bitboard::from(sq("d4")).single_square(), Some(sq("d4")));
        let two: Bitboard = [sq("d4"), sq("d5")].into_iter().collect();
        assert_eq!(two.single_square(), None);
        assert_eq!(Bitboard::EMPTY.single_square(), None);
    }

    #[test]
    fn test_set_and_clear() {
        let mut bb = Bitboard::EMPTY;
        bb.set(sq("c3"));
        bb.set(sq("c3"));
        assert_eq!(bb.count(), 1);
        bb.clear(sq("c3"));
        bb.clear(sq("c3"));
        assert!(bb.is_empty());
    }
}
