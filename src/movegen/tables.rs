//! Boundary masks and step tables.
//!
//! Every single-square step is a shift of the source bitboard. Before shifting, the source is
//! masked with the files/ranks the step would wrap across, so a knight on the h-file can never
//! land on the a-file of the next rank. Sliding rays repeat the same masked step.

use crate::game_state::Bitboard;

pub const FILE_A: u64 = 0x0101_0101_0101_0101;
pub const FILE_B: u64 = 0x0202_0202_0202_0202;
pub const FILE_G: u64 = 0x4040_4040_4040_4040;
pub const FILE_H: u64 = 0x8080_8080_8080_8080;

pub const RANK_1: u64 = 0x0000_0000_0000_00FF;
pub const RANK_2: u64 = 0x0000_0000_0000_FF00;
pub const RANK_7: u64 = 0x00FF_0000_0000_0000;
pub const RANK_8: u64 = 0xFF00_0000_0000_0000;

const NOT_FILE_A: u64 = !FILE_A;
const NOT_FILE_H: u64 = !FILE_H;
const NOT_FILE_AB: u64 = !(FILE_A | FILE_B);
const NOT_FILE_GH: u64 = !(FILE_G | FILE_H);

/// A single step: shift amount plus the mask of source squares allowed to take it.
#[derive(Debug, Clone, Copy)]
pub struct Step {
    shift: i8,
    mask: u64,
}

impl Step {
    const fn new(shift: i8, mask: u64) -> Self {
        Self { shift, mask }
    }

    #[inline]
    pub const fn apply_raw(self, bits: u64) -> u64 {
        let src = bits & self.mask;
        if self.shift >= 0 {
            src << self.shift
        } else {
            src >> (-self.shift)
        }
    }

    #[inline]
    pub const fn apply(self, bb: Bitboard) -> Bitboard {
        Bitboard::new(self.apply_raw(bb.value()))
    }
}

pub const NORTH: Step = Step::new(8, !RANK_8);
pub const SOUTH: Step = Step::new(-8, !RANK_1);
pub const EAST: Step = Step::new(1, NOT_FILE_H);
pub const WEST: Step = Step::new(-1, NOT_FILE_A);
pub const NORTH_EAST: Step = Step::new(9, NOT_FILE_H & !RANK_8);
pub const NORTH_WEST: Step = Step::new(7, NOT_FILE_A & !RANK_8);
pub const SOUTH_EAST: Step = Step::new(-7, NOT_FILE_H & !RANK_1);
pub const SOUTH_WEST: Step = Step::new(-9, NOT_FILE_A & !RANK_1);

pub const ROOK_DIRS: [Step; 4] = [NORTH, SOUTH, EAST, WEST];
pub const BISHOP_DIRS: [Step; 4] = [NORTH_EAST, NORTH_WEST, SOUTH_EAST, SOUTH_WEST];
pub const QUEEN_DIRS: [Step; 8] = [
    NORTH, SOUTH, EAST, WEST, NORTH_EAST, NORTH_WEST, SOUTH_EAST, SOUTH_WEST,
];

pub const KNIGHT_STEPS: [Step; 8] = [
    Step::new(17, NOT_FILE_H & !(RANK_7 | RANK_8)),
    Step::new(15, NOT_FILE_A & !(RANK_7 | RANK_8)),
    Step::new(10, NOT_FILE_GH & !RANK_8),
    Step::new(6, NOT_FILE_AB & !RANK_8),
    Step::new(-15, NOT_FILE_H & !(RANK_1 | RANK_2)),
    Step::new(-17, NOT_FILE_A & !(RANK_1 | RANK_2)),
    Step::new(-6, NOT_FILE_GH & !RANK_1),
    Step::new(-10, NOT_FILE_AB & !RANK_1),
];

/// Knight attacks from each square.
pub static KNIGHT_ATTACKS: [u64; 64] = leaper_table(&KNIGHT_STEPS);

/// King attacks from each square.
pub static KING_ATTACKS: [u64; 64] = leaper_table(&QUEEN_DIRS);

/// Pawn capture squares, indexed `[color][square]` with 0 = white.
pub static PAWN_ATTACKS: [[u64; 64]; 2] = [
    leaper_table(&[NORTH_EAST, NORTH_WEST]),
    leaper_table(&[SOUTH_EAST, SOUTH_WEST]),
];

const fn leaper_table(steps: &[Step]) -> [u64; 64] {
    let mut table = [0u64; 64];
    let mut sq = 0;
    while sq < 64 {
        let bit = 1u64 << sq;
        let mut attack = 0u64;
        let mut i = 0;
        while i < steps.len() {
            attack |= steps[i].apply_raw(bit);
            i += 1;
        }
        table[sq] = attack;
        sq += 1;
    }
    table
}

/// Walk each direction from `from` until the edge or the first occupied square, inclusive.
pub fn slide(from: Bitboard, dirs: &[Step], occupied: Bitboard) -> Bitboard {
    let mut out = Bitboard::EMPTY;
    for &dir in dirs {
        let mut cur = from;
        loop {
            cur = dir.apply(cur);
            if cur.is_empty() {
                break;
            }
            out |= cur;
            if !(cur & occupied).is_empty() {
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_state::Square;
    use test_case::test_case;

    fn bb(squares: &[&str]) -> Bitboard {
        squares
            .iter()
            .map(|s| s.parse::<Square>().expect("valid square"))
            .collect()
    }

    #[test_case("a1", &["b3", "c2"]; "corner")]
    #[test_case("h4", &["g2", "f3", "f5", "g6"]; "h file does not wrap")]
    #[test_case("b8", &["a6", "c6", "d7"]; "top edge")]
    #[test_case("d4", &["c2", "e2", "b3", "f3", "b5", "f5", "c6", "e6"]; "center")]
    fn knight_attacks_respect_edges(from: &str, expected: &[&str]) {
        let sq: Square = from.parse().unwrap();
        assert_eq!(Bitboard::new(KNIGHT_ATTACKS[sq.index()]), bb(expected));
    }

    #[test_case("a1", &["a2", "b1", "b2"]; "corner")]
    #[test_case("h5", &["g4", "g5", "g6", "h4", "h6"]; "h file")]
    fn king_attacks_respect_edges(from: &str, expected: &[&str]) {
        let sq: Square = from.parse().unwrap();
        assert_eq!(Bitboard::new(KING_ATTACKS[sq.index()]), bb(expected));
    }

    #[test]
    fn pawn_attacks_are_masked_on_file_edges() {
        let a2: Square = "a2".parse().unwrap();
        let h7: Square = "h7".parse().unwrap();
        assert_eq!(Bitboard::new(PAWN_ATTACKS[0][a2.index()]), bb(&["b3"]));
        assert_eq!(Bitboard::new(PAWN_ATTACKS[1][h7.index()]), bb(&["g6"]));
    }

    #[test]
    fn slide_stops_on_blocker_inclusive() {
        let from = bb(&["a1"]);
        let occupied = bb(&["a3", "c1"]);
        assert_eq!(slide(from, &ROOK_DIRS, occupied), bb(&["a2", "a3", "b1", "c1"]));
    }

    #[test]
    fn slide_on_empty_board_reaches_edges() {
        let rays = slide(bb(&["d4"]), &BISHOP_DIRS, Bitboard::EMPTY);
        assert_eq!(rays.count(), 13);
        assert!(rays.contains("h8".parse().unwrap()));
        assert!(rays.contains("a1".parse().unwrap()));
        assert!(rays.contains("a7".parse().unwrap()));
        assert!(rays.contains("g1".parse().unwrap()));
    }
}
