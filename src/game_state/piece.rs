use std::fmt;

/// Side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White = 0,
    Black = 1,
}

impl Color {
    pub const ALL: [Color; 2] = [Color::White, Color::Black];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub const fn opposite(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    pub const fn from_index(idx: u8) -> Option<Color> {
        match idx {
            0 => Some(Color::White),
            1 => Some(Color::Black),
            _ => None,
        }
    }

    /// Rank (zero-based) where this side's pawns promote.
    #[inline]
    pub const fn promotion_rank(self) -> u8 {
        match self {
            Color::White => 7,
            Color::Black => 0,
        }
    }

    /// Rank (zero-based) this side's pawns start on.
    #[inline]
    pub const fn pawn_rank(self) -> u8 {
        match self {
            Color::White => 1,
            Color::Black => 6,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Color::White => "white",
            Color::Black => "black",
        })
    }
}

/// Piece type without color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

/// A colored piece, or `Empty`.
///
/// The ordinal doubles as the wire value and as the sort key of kill lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PieceKind {
    WhitePawn = 0,
    WhiteKnight = 1,
    WhiteBishop = 2,
    WhiteRook = 3,
    WhiteQueen = 4,
    WhiteKing = 5,
    BlackPawn = 6,
    BlackKnight = 7,
    BlackBishop = 8,
    BlackRook = 9,
    BlackQueen = 10,
    BlackKing = 11,
    Empty = 12,
}

impl PieceKind {
    /// The twelve concrete kinds, in ordinal order.
    pub const ALL: [PieceKind; 12] = [
        PieceKind::WhitePawn,
        PieceKind::WhiteKnight,
        PieceKind::WhiteBishop,
        PieceKind::WhiteRook,
        PieceKind::WhiteQueen,
        PieceKind::WhiteKing,
        PieceKind::BlackPawn,
        PieceKind::BlackKnight,
        PieceKind::BlackBishop,
        PieceKind::BlackRook,
        PieceKind::BlackQueen,
        PieceKind::BlackKing,
    ];

    pub const fn new(color: Color, role: Role) -> PieceKind {
        let base = match color {
            Color::White => 0,
            Color::Black => 6,
        };
        let offset = match role {
            Role::Pawn => 0,
            Role::Knight => 1,
            Role::Bishop => 2,
            Role::Rook => 3,
            Role::Queen => 4,
            Role::King => 5,
        };
        PieceKind::ALL[base + offset]
    }

    pub const fn from_index(idx: u8) -> Option<PieceKind> {
        if idx < 12 {
            Some(PieceKind::ALL[idx as usize])
        } else if idx == 12 {
            Some(PieceKind::Empty)
        } else {
            None
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn color(self) -> Option<Color> {
        match self as u8 {
            0..=5 => Some(Color::White),
            6..=11 => Some(Color::Black),
            _ => None,
        }
    }

    pub const fn role(self) -> Option<Role> {
        match self {
            PieceKind::WhitePawn | PieceKind::BlackPawn => Some(Role::Pawn),
            PieceKind::WhiteKnight | PieceKind::BlackKnight => Some(Role::Knight),
            PieceKind::WhiteBishop | PieceKind::BlackBishop => Some(Role::Bishop),
            PieceKind::WhiteRook | PieceKind::BlackRook => Some(Role::Rook),
            PieceKind::WhiteQueen | PieceKind::BlackQueen => Some(Role::Queen),
            PieceKind::WhiteKing | PieceKind::BlackKing => Some(Role::King),
            PieceKind::Empty => None,
        }
    }

    #[inline]
    pub fn is(self, role: Role) -> bool {
        self.role() == Some(role)
    }

    /// Kinds a pawn of `color` may promote to.
    pub fn promotions(color: Color) -> [PieceKind; 4] {
        [Role::Queen, Role::Rook, Role::Bishop, Role::Knight].map(|role| PieceKind::new(color, role))
    }

    /// FEN letter, uppercase for white. `Empty` renders as '.'.
    pub fn char(self) -> char {
        let c = match self.role() {
            Some(Role::Pawn) => 'p',
            Some(Role::Knight) => 'n',
            Some(Role::Bishop) => 'b',
            Some(Role::Rook) => 'r',
            Some(Role::Queen) => 'q',
            Some(Role::King) => 'k',
            None => return '.',
        };
        if self.color() == Some(Color::White) {
            c.to_ascii_uppercase()
        } else {
            c
        }
    }

    /// Parse a promotion letter (`q`, `r`, `b`, `n`) for the given side.
    pub fn from_promotion_char(color: Color, c: char) -> Option<PieceKind> {
        let role = match c.to_ascii_lowercase() {
            'q' => Role::Queen,
            'r' => Role::Rook,
            'b' => Role::Bishop,
            'n' => Role::Knight,
            _ => return None,
        };
        Some(PieceKind::new(color, role))
    }
}
